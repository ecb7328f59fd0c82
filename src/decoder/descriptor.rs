use std::io::{Read, Seek};

use log::debug;

use super::codec::Codec;
use super::tag_reader::TagReader;
use crate::tags::{
    CompressionMethod, ExtraSamples, PhotometricInterpretation, PlanarConfiguration, Predictor,
    SampleFormat, Tag,
};
use crate::{TiffError, TiffFormatError, TiffResult, TiffUnsupportedError};

/// How the pixels of an image are cut into blocks on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockLayout {
    /// Horizontal bands of `rows_per_strip` rows spanning the full width.
    Strips { rows_per_strip: u32 },
    /// A grid of `tile_width` x `tile_height` tiles, padded at the right and bottom edges.
    Tiles { tile_width: u32, tile_height: u32 },
}

/// Everything needed to interpret the pixel data of an image, resolved once from its tags.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageDescriptor {
    pub width: u32,
    pub height: u32,
    /// Bits of every sample, uniform across channels.
    pub bits_per_sample: u16,
    pub samples_per_pixel: u16,
    pub sample_format: SampleFormat,
    pub photometric: PhotometricInterpretation,
    pub planar_configuration: PlanarConfiguration,
    pub compression: CompressionMethod,
    pub predictor: Predictor,
    pub layout: BlockLayout,
    /// The `ExtraSamples` values in declared order, empty if the tag is absent.
    pub extra_samples: Vec<ExtraSamples>,
    pub has_alpha: bool,
    /// Color channels are already scaled by alpha. Only meaningful if `has_alpha`.
    pub premultiplied_alpha: bool,
}

impl ImageDescriptor {
    /// Reads the tags describing the image and checks that `codec` can decode it.
    pub(crate) fn resolve<R: Read + Seek>(
        tags: &mut TagReader<'_, R>,
        codec: &dyn Codec,
    ) -> TiffResult<ImageDescriptor> {
        let width = tags.require_tag_u32(Tag::ImageWidth)?;
        let height = tags.require_tag_u32(Tag::ImageLength)?;
        if width == 0 || height == 0 {
            return Err(TiffFormatError::InvalidDimensions(width, height).into());
        }

        // The color model can not be guessed, unlike the legacy bilevel defaults below.
        let photometric = tags
            .find_tag_u16(Tag::PhotometricInterpretation)?
            .map(PhotometricInterpretation::from_u16_exhaustive)
            .ok_or(TiffError::MissingRequiredTag(Tag::PhotometricInterpretation))?;

        let compression = tags
            .find_tag_u16(Tag::Compression)?
            .map_or(CompressionMethod::None, CompressionMethod::from_u16_exhaustive);

        let samples_per_pixel = tags.find_tag_u16(Tag::SamplesPerPixel)?.unwrap_or(1);
        if samples_per_pixel == 0 {
            return Err(TiffFormatError::SamplesPerPixelIsZero.into());
        }

        let bits: Vec<u16> = tags
            .find_tag_uint_vec(Tag::BitsPerSample)?
            .unwrap_or_else(|| vec![1]);
        let bits_per_sample = uniform_bits(bits, samples_per_pixel)?;

        let formats: Vec<SampleFormat> = tags
            .find_tag_uint_vec(Tag::SampleFormat)?
            .map(|vals: Vec<u16>| {
                vals.into_iter()
                    .map(SampleFormat::from_u16_exhaustive)
                    .collect()
            })
            .unwrap_or_else(|| vec![SampleFormat::Uint]);
        let sample_format = match formats.first() {
            Some(&first) if formats.iter().all(|&f| f == first) => first,
            _ => {
                return Err(
                    TiffUnsupportedError::SampleFormat(formats, bits_per_sample).into(),
                )
            }
        };

        let planar_configuration = tags
            .find_tag_u16(Tag::PlanarConfiguration)?
            .map_or(
                PlanarConfiguration::Chunky,
                PlanarConfiguration::from_u16_exhaustive,
            );

        let predictor = tags
            .find_tag_u16(Tag::Predictor)?
            .map_or(Predictor::None, Predictor::from_u16_exhaustive);

        let layout = if tags.ifd.contains(Tag::TileWidth) || tags.ifd.contains(Tag::TileLength) {
            let tile_width = tags.require_tag_u32(Tag::TileWidth)?;
            let tile_height = tags.require_tag_u32(Tag::TileLength)?;
            if tile_width == 0 || tile_height == 0 {
                return Err(TiffFormatError::InvalidTileDimensions(tile_width, tile_height).into());
            }
            BlockLayout::Tiles {
                tile_width,
                tile_height,
            }
        } else {
            // Absent or oversized (commonly 2^32 - 1) means the whole image is one strip.
            let rows_per_strip = tags.find_tag_u32(Tag::RowsPerStrip)?.unwrap_or(height);
            if rows_per_strip == 0 {
                return Err(TiffFormatError::RowsPerStripIsZero.into());
            }
            BlockLayout::Strips {
                rows_per_strip: rows_per_strip.min(height),
            }
        };

        let extra_samples: Vec<ExtraSamples> = tags
            .find_tag_uint_vec::<u16>(Tag::ExtraSamples)?
            .unwrap_or_default()
            .into_iter()
            .map(ExtraSamples::from_u16_exhaustive)
            .collect();

        let (has_alpha, premultiplied_alpha) = match extra_samples.first() {
            Some(ExtraSamples::AssociatedAlpha) => (true, true),
            Some(ExtraSamples::UnassociatedAlpha) => (true, false),
            _ => (false, false),
        };

        let descriptor = ImageDescriptor {
            width,
            height,
            bits_per_sample,
            samples_per_pixel,
            sample_format,
            photometric,
            planar_configuration,
            compression,
            predictor,
            layout,
            extra_samples,
            has_alpha,
            premultiplied_alpha,
        };

        descriptor.check_supported(codec)?;
        debug!("resolved {descriptor:?}");
        Ok(descriptor)
    }

    /// Rejects combinations this decoder chooses not to decode.
    fn check_supported(&self, codec: &dyn Codec) -> TiffResult<()> {
        let color_channels = self
            .photometric
            .color_channels()
            .ok_or(TiffUnsupportedError::Photometric(self.photometric))?;

        if self.samples_per_pixel < color_channels {
            return Err(TiffUnsupportedError::SamplesPerPixel(
                self.photometric,
                self.samples_per_pixel,
            )
            .into());
        }

        let implied_extra = usize::from(self.samples_per_pixel - color_channels);
        if !self.extra_samples.is_empty() && self.extra_samples.len() != implied_extra {
            return Err(
                TiffUnsupportedError::ExtraSamples(self.extra_samples.len(), implied_extra).into(),
            );
        }

        match (self.sample_format, self.bits_per_sample) {
            (SampleFormat::Uint | SampleFormat::Int, 8 | 16 | 32 | 64) => {}
            (SampleFormat::IEEEFP, 32 | 64) => {}
            (SampleFormat::Uint, bits) => {
                return Err(TiffUnsupportedError::BitsPerSample(vec![bits]).into())
            }
            (format, bits) => {
                return Err(TiffUnsupportedError::SampleFormat(vec![format], bits).into())
            }
        }

        if let PlanarConfiguration::Unknown(_) = self.planar_configuration {
            return Err(TiffUnsupportedError::PlanarConfiguration(self.planar_configuration).into());
        }

        match (self.predictor, self.sample_format) {
            (Predictor::None, _)
            | (Predictor::Horizontal, SampleFormat::Uint | SampleFormat::Int)
            | (Predictor::FloatingPoint, SampleFormat::IEEEFP) => {}
            (predictor, format) => {
                return Err(TiffUnsupportedError::Predictor(predictor, format).into())
            }
        }

        if !codec.supports(self.compression) {
            return Err(TiffUnsupportedError::Compression(self.compression).into());
        }

        if self.compression == CompressionMethod::ModernJPEG {
            if self.sample_format != SampleFormat::Uint {
                return Err(TiffUnsupportedError::SampleFormat(
                    vec![self.sample_format],
                    self.bits_per_sample,
                )
                .into());
            }
            if self.bits_per_sample != 8 {
                return Err(TiffUnsupportedError::JpegBitDepth(self.bits_per_sample).into());
            }
        }

        Ok(())
    }

    pub fn is_tiled(&self) -> bool {
        matches!(self.layout, BlockLayout::Tiles { .. })
    }

    /// Tile width in pixels, 0 for striped images.
    pub fn tile_width(&self) -> u32 {
        match self.layout {
            BlockLayout::Tiles { tile_width, .. } => tile_width,
            BlockLayout::Strips { .. } => 0,
        }
    }

    /// Tile height in pixels, 0 for striped images.
    pub fn tile_height(&self) -> u32 {
        match self.layout {
            BlockLayout::Tiles { tile_height, .. } => tile_height,
            BlockLayout::Strips { .. } => 0,
        }
    }

    /// Rows per strip, `None` for tiled images.
    pub fn rows_per_strip(&self) -> Option<u32> {
        match self.layout {
            BlockLayout::Strips { rows_per_strip } => Some(rows_per_strip),
            BlockLayout::Tiles { .. } => None,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_sample() * usize::from(self.samples_per_pixel)
    }

    /// Number of separately stored sample planes.
    pub fn planes(&self) -> u16 {
        match self.planar_configuration {
            PlanarConfiguration::Planar => self.samples_per_pixel,
            _ => 1,
        }
    }

    /// Samples per pixel within one stored block.
    pub fn samples_per_block_pixel(&self) -> u16 {
        self.samples_per_pixel / self.planes()
    }

    /// Byte length of the fully decoded image.
    pub fn image_bytes(&self) -> TiffResult<usize> {
        usize::try_from(self.width)?
            .checked_mul(usize::try_from(self.height)?)
            .and_then(|n| n.checked_mul(self.bytes_per_pixel()))
            .ok_or(TiffError::LimitsExceeded)
    }
}

/// Collapses per-sample bit depths into the single depth this decoder supports.
fn uniform_bits(bits: Vec<u16>, samples_per_pixel: u16) -> TiffResult<u16> {
    let first = match bits.first() {
        Some(&first) if bits.len() == 1 || bits.len() == usize::from(samples_per_pixel) => first,
        _ => {
            return Err(TiffFormatError::InconsistentSizesEncountered(
                Tag::BitsPerSample,
                bits.len(),
                samples_per_pixel,
            )
            .into())
        }
    };

    if bits.iter().any(|&b| b != first) {
        return Err(TiffUnsupportedError::BitsPerSample(bits).into());
    }
    Ok(first)
}
