use std::io::{Read, Seek};
use std::ops::Range;
use std::sync::Arc;

use log::{debug, warn};

use self::assemble::{assemble, Region};
use self::blocks::BlockGrid;
use self::dispatch::{BlockDecoder, CompressedBlock};
use self::header::TiffHeader;
use self::stream::SmartReader;
use self::tag_reader::TagReader;
use crate::tags::{ByteOrder, CompressionMethod, Tag};
use crate::{Directory, TiffError, TiffFormatError, TiffResult, UsageError};

pub use self::blocks::Block;
pub use self::buffer::PixelBuffer;
pub use self::codec::{Codec, CodecError, DefaultCodec};
pub use self::descriptor::{BlockLayout, ImageDescriptor};
pub use self::dispatch::CancelToken;

mod assemble;
mod blocks;
mod buffer;
mod codec;
mod descriptor;
mod dispatch;
pub mod header;
pub mod ifd;
mod predictor;
mod stream;
mod tag_reader;

/// Decoding limits
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Limits {
    /// The maximum size of a decoded image or region in bytes, the default is 256MiB.
    pub decoding_buffer_size: usize,
    /// The maximum size of any ifd value in bytes, the default is 1MiB.
    pub ifd_value_size: usize,
    /// The maximum size of the compressed or decompressed data of a single block, the default
    /// is 128MiB.
    pub intermediate_buffer_size: usize,
}

impl Limits {
    /// A configuration that does not impose any limits.
    ///
    /// This is a good start if the caller only wants to impose selective limits, contrary to the
    /// default limits which allows selectively disabling limits.
    ///
    /// Note that this configuration is likely to crash on excessively large images since,
    /// naturally, the machine running the program does not have infinite memory.
    pub fn unlimited() -> Limits {
        Limits {
            decoding_buffer_size: usize::MAX,
            ifd_value_size: usize::MAX,
            intermediate_buffer_size: usize::MAX,
        }
    }
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            decoding_buffer_size: 256 * 1024 * 1024,
            intermediate_buffer_size: 128 * 1024 * 1024,
            ifd_value_size: 1024 * 1024,
        }
    }
}

/// Settings applied when opening a [`Reader`].
#[derive(Clone, Debug)]
pub struct ReaderOptions {
    limits: Limits,
    threads: usize,
    codec: Arc<dyn Codec>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions {
            limits: Limits::default(),
            threads: 0,
            codec: Arc::new(DefaultCodec),
        }
    }
}

impl ReaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Number of decode workers, 0 uses the global rayon pool.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Replaces the decompression backends.
    ///
    /// The codec also decides which compression methods are accepted when the image is opened.
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Opens a TIFF stream with these options, see [`Reader::open`].
    pub fn open<R: Read + Seek>(self, source: R) -> TiffResult<Reader<R>> {
        Reader::open_with(source, self)
    }
}

/// A TIFF image opened for decoding.
///
/// Header, first directory and descriptor are read by [`Reader::open`] and do not change
/// afterwards. Every decode reads the blocks it needs from the stream again.
#[derive(Debug)]
pub struct Reader<R> {
    reader: SmartReader<R>,
    header: TiffHeader,
    ifd: Directory,
    descriptor: ImageDescriptor,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
    jpeg_tables: Option<Vec<u8>>,
    limits: Limits,
    codec: Arc<dyn Codec>,
    pool: Option<rayon::ThreadPool>,
}

impl<R: Read + Seek> Reader<R> {
    /// Opens a TIFF stream with default options.
    ///
    /// Parses the header and the first image file directory, and resolves the
    /// [`ImageDescriptor`]. Images using an encoding that can not be decoded are rejected here
    /// with [`TiffError::UnsupportedEncoding`].
    pub fn open(source: R) -> TiffResult<Reader<R>> {
        Self::open_with(source, ReaderOptions::default())
    }

    pub fn open_with(source: R, options: ReaderOptions) -> TiffResult<Reader<R>> {
        let ReaderOptions {
            limits,
            threads,
            codec,
        } = options;

        let mut reader = SmartReader::wrap(source, ByteOrder::LittleEndian)?;
        let header = TiffHeader::read(&mut reader)?;
        reader.byte_order = header.byte_order;
        debug!(
            "{:?} {} header, first directory at {} of {} bytes",
            header.byte_order,
            if header.bigtiff { "BigTIFF" } else { "TIFF" },
            header.ifd_offset,
            reader.len()
        );

        let ifd = ifd::read_directory(&mut reader, header.bigtiff, header.ifd_offset)?;
        if ifd.next().is_some() {
            warn!("only the first of several images is read");
        }

        let mut tags = TagReader {
            reader: &mut reader,
            ifd: &ifd,
            limits: &limits,
            bigtiff: header.bigtiff,
        };
        let descriptor = ImageDescriptor::resolve(&mut tags, &*codec)?;

        let (offsets_tag, counts_tag) = BlockGrid::new(&descriptor).table_tags();
        let offsets = tags.require_tag_uint_vec(offsets_tag)?;
        let byte_counts = tags.require_tag_uint_vec(counts_tag)?;

        let jpeg_tables = match descriptor.compression {
            CompressionMethod::ModernJPEG => tags
                .find_tag_u8_vec(Tag::JPEGTables)?
                .map(check_jpeg_tables)
                .transpose()?,
            _ => None,
        };

        let pool = match threads {
            0 => None,
            n => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|idx| format!("tiff-block-{idx}"))
                    .build()
                    .map_err(|err| UsageError::ThreadPool(err.to_string()))?,
            ),
        };

        Ok(Reader {
            reader,
            header,
            ifd,
            descriptor,
            offsets,
            byte_counts,
            jpeg_tables,
            limits,
            codec,
            pool,
        })
    }

    /// The decoded description of the image. Does not touch the stream.
    pub fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    /// The raw tag directory of the image.
    pub fn directory(&self) -> &Directory {
        &self.ifd
    }

    /// Whether the file declares images after the first one.
    pub fn more_images(&self) -> bool {
        self.ifd.next().is_some()
    }

    /// The strips or tiles of the image, in the order of the offset table.
    pub fn blocks(&self) -> TiffResult<Vec<Block>> {
        BlockGrid::new(&self.descriptor).locate(&self.offsets, &self.byte_counts)
    }

    /// Decodes the full image.
    pub fn decode(&mut self) -> TiffResult<PixelBuffer> {
        self.decode_with(&CancelToken::new())
    }

    pub fn decode_with(&mut self, cancel: &CancelToken) -> TiffResult<PixelBuffer> {
        let region = Region::full(&self.descriptor);
        self.decode_blocks(region, cancel)
    }

    /// Decodes the pixels of `rows` x `cols`, reading only the blocks intersecting them.
    ///
    /// The region must be non-empty and lie within the image.
    pub fn decode_region(
        &mut self,
        rows: Range<u32>,
        cols: Range<u32>,
    ) -> TiffResult<PixelBuffer> {
        self.decode_region_with(rows, cols, &CancelToken::new())
    }

    pub fn decode_region_with(
        &mut self,
        rows: Range<u32>,
        cols: Range<u32>,
        cancel: &CancelToken,
    ) -> TiffResult<PixelBuffer> {
        let region = Region { rows, cols };
        if !region.is_valid_for(&self.descriptor) {
            return Err(UsageError::InvalidRegion(region.rows, region.cols).into());
        }
        self.decode_blocks(region, cancel)
    }

    fn decode_blocks(&mut self, region: Region, cancel: &CancelToken) -> TiffResult<PixelBuffer> {
        let descriptor = &self.descriptor;
        let grid = BlockGrid::new(descriptor);
        let blocks = grid.locate(&self.offsets, &self.byte_counts)?;
        let (grid_rows, grid_cols) = grid.covering(&region.rows, &region.cols);
        let total = blocks.len();

        let out_len = usize::try_from(region.width())?
            .checked_mul(usize::try_from(region.height())?)
            .and_then(|n| n.checked_mul(descriptor.bytes_per_pixel()))
            .ok_or(TiffError::LimitsExceeded)?;
        if out_len > self.limits.decoding_buffer_size {
            return Err(TiffError::LimitsExceeded);
        }

        let block_pixel_bytes =
            usize::from(descriptor.samples_per_block_pixel()) * descriptor.bytes_per_sample();
        let mut compressed = Vec::new();
        for block in blocks
            .into_iter()
            .filter(|b| grid_rows.contains(&b.row) && grid_cols.contains(&b.col))
        {
            if cancel.is_cancelled() {
                return Err(TiffError::Cancelled);
            }

            let decoded_len = (block.stored_width as usize)
                .checked_mul(block.nominal_height as usize)
                .and_then(|n| n.checked_mul(block_pixel_bytes))
                .ok_or(TiffError::LimitsExceeded)?;
            if block.byte_count > self.limits.intermediate_buffer_size as u64
                || decoded_len > self.limits.intermediate_buffer_size
            {
                return Err(TiffError::LimitsExceeded);
            }

            let data = self.reader.read_at(block.offset, block.byte_count)?;
            compressed.push(CompressedBlock { block, data });
        }
        debug!(
            "decoding {} of {} blocks for rows {:?}, columns {:?}",
            compressed.len(),
            total,
            region.rows,
            region.cols
        );

        let block_decoder = BlockDecoder {
            descriptor,
            byte_order: self.header.byte_order,
            codec: &*self.codec,
            jpeg_tables: self.jpeg_tables.as_deref(),
        };
        let decoded = block_decoder.decode_all(self.pool.as_ref(), compressed, cancel)?;
        if cancel.is_cancelled() {
            return Err(TiffError::Cancelled);
        }

        let mut out = vec![0; out_len];
        assemble(descriptor, &region, &decoded, &mut out);

        Ok(PixelBuffer::new(
            region.width(),
            region.height(),
            descriptor.samples_per_pixel,
            descriptor.bits_per_sample,
            descriptor.sample_format,
            out,
        ))
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

fn check_jpeg_tables(tables: Vec<u8>) -> TiffResult<Vec<u8>> {
    if tables.len() < 4 || tables[..2] != [0xFF, 0xD8] {
        return Err(TiffFormatError::InvalidJpegTables.into());
    }
    Ok(tables)
}
