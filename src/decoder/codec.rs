//! Decompression backends for the compression methods of block data.

use std::fmt;
use std::io::Read;

use super::stream::PackBitsReader;
use crate::tags::CompressionMethod;

/// Error type of [`Codec`] implementations.
pub type CodecError = Box<dyn std::error::Error + Send + Sync>;

/// Decompresses the data of single blocks.
///
/// Implementations are shared by all decode workers and must not hold per-block state.
pub trait Codec: Send + Sync + fmt::Debug {
    /// Whether `method` can be decompressed by this codec.
    fn supports(&self, method: CompressionMethod) -> bool;

    /// Decompresses one block.
    ///
    /// `expected_len` is the decoded size a well-formed block has. Implementations may stop
    /// shortly after producing that many bytes; the caller validates the length.
    fn decompress(
        &self,
        method: CompressionMethod,
        input: &[u8],
        expected_len: usize,
    ) -> Result<Vec<u8>, CodecError>;
}

/// The codec backed by the compression features of this crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCodec;

impl Codec for DefaultCodec {
    fn supports(&self, method: CompressionMethod) -> bool {
        match method {
            CompressionMethod::None | CompressionMethod::PackBits => true,
            #[cfg(feature = "lzw")]
            CompressionMethod::LZW => true,
            #[cfg(feature = "deflate")]
            CompressionMethod::Deflate | CompressionMethod::OldDeflate => true,
            #[cfg(feature = "jpeg")]
            CompressionMethod::ModernJPEG => true,
            #[cfg(feature = "zstd")]
            CompressionMethod::ZSTD => true,
            _ => false,
        }
    }

    fn decompress(
        &self,
        method: CompressionMethod,
        input: &[u8],
        expected_len: usize,
    ) -> Result<Vec<u8>, CodecError> {
        // One byte beyond the expected length is enough to detect oversized output.
        let limit = expected_len as u64 + 1;
        let mut out = Vec::with_capacity(expected_len);

        match method {
            CompressionMethod::None => out.extend_from_slice(input),
            CompressionMethod::PackBits => {
                PackBitsReader::new(input, input.len() as u64)
                    .take(limit)
                    .read_to_end(&mut out)?;
            }
            #[cfg(feature = "lzw")]
            CompressionMethod::LZW => {
                super::stream::LZWReader::new(input)
                    .take(limit)
                    .read_to_end(&mut out)?;
            }
            #[cfg(feature = "deflate")]
            CompressionMethod::Deflate | CompressionMethod::OldDeflate => {
                flate2::read::ZlibDecoder::new(input)
                    .take(limit)
                    .read_to_end(&mut out)?;
            }
            #[cfg(feature = "jpeg")]
            CompressionMethod::ModernJPEG => out = decode_jpeg(input)?,
            #[cfg(feature = "zstd")]
            CompressionMethod::ZSTD => {
                zstd::stream::read::Decoder::new(input)?
                    .take(limit)
                    .read_to_end(&mut out)?;
            }
            method => return Err(format!("no decoder for {method:?}").into()),
        }

        Ok(out)
    }
}

/// Splices the shared `JPEGTables` stream in front of an abbreviated block stream.
///
/// The tables end with EOI and the block starts with SOI, both markers are dropped.
pub(crate) fn merge_jpeg_tables(tables: &[u8], block: &[u8]) -> Vec<u8> {
    let tables = tables.strip_suffix(&[0xFF, 0xD9]).unwrap_or(tables);
    let block = block.strip_prefix(&[0xFF, 0xD8]).unwrap_or(block);

    let mut merged = Vec::with_capacity(tables.len() + block.len());
    merged.extend_from_slice(tables);
    merged.extend_from_slice(block);
    merged
}

/// Component count declared by the first frame header of a JPEG stream.
#[cfg_attr(not(feature = "jpeg"), allow(dead_code))]
fn jpeg_components(data: &[u8]) -> Option<u8> {
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        match marker {
            // Fill bytes.
            0xFF => pos += 1,
            // Markers without a length field.
            0x01 | 0xD0..=0xD9 => pos += 2,
            // Start of frame, except DHT, JPG and DAC which share the range.
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                return data.get(pos + 9).copied();
            }
            _ => {
                let len = usize::from(u16::from_be_bytes([data[pos + 2], data[pos + 3]]));
                pos += 2 + len;
            }
        }
    }
    None
}

#[cfg(feature = "jpeg")]
fn decode_jpeg(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    use zune_core::colorspace::ColorSpace;
    use zune_core::options::DecoderOptions;

    // Photometric interpretation is applied by the caller, the color model of the stream is kept.
    let colorspace = match jpeg_components(input) {
        Some(1) => ColorSpace::Luma,
        _ => ColorSpace::RGB,
    };
    let options = DecoderOptions::default().jpeg_set_out_colorspace(colorspace);
    let mut decoder = zune_jpeg::JpegDecoder::new_with_options(input, options);
    decoder
        .decode()
        .map_err(|err| format!("{err:?}").into())
}
