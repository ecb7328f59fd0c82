//! Reading TIFF images for ingestion pipelines
//!
//! TIFF (Tagged Image File Format) stores pixels either in horizontal strips or in a grid of
//! tiles, with one tag directory describing geometry, sample encoding and color model. This
//! crate resolves that directory into one immutable [`ImageDescriptor`] and decodes the image
//! into a chunky, native-endian [`PixelBuffer`] regardless of the physical layout.
//!
//! ```no_run
//! # fn main() -> tiff_ingest::TiffResult<()> {
//! let file = std::io::BufReader::new(std::fs::File::open("image.tif")?);
//! let mut reader = tiff_ingest::Reader::open(file)?;
//!
//! let descriptor = reader.descriptor().clone();
//! println!("{}x{}, tiled: {}", descriptor.width, descriptor.height, descriptor.is_tiled());
//!
//! let pixels = reader.decode()?;
//! assert_eq!(pixels.as_bytes().len(), descriptor.image_bytes()?);
//! # Ok(())
//! # }
//! ```
//!
//! # Related Links
//! * <https://web.archive.org/web/20210108073850/https://www.adobe.io/open/standards/TIFF.html>
//!   - The TIFF specification

pub mod decoder;
mod directory;
mod error;
pub mod tags;

pub use self::decoder::{
    Block, BlockLayout, CancelToken, Codec, CodecError, DefaultCodec, ImageDescriptor, Limits,
    PixelBuffer, Reader, ReaderOptions,
};
pub use self::directory::Directory;
pub use self::error::{
    HeaderError, TiffError, TiffFormatError, TiffResult, TiffUnsupportedError, UsageError,
};
