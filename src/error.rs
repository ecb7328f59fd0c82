use std::io;
use std::num::TryFromIntError;

use quick_error::quick_error;

use crate::tags::{
    CompressionMethod, PhotometricInterpretation, PlanarConfiguration, Predictor, SampleFormat,
    Tag,
};

quick_error! {
    /// Tiff error kinds.
    #[derive(Debug)]
    #[non_exhaustive]
    pub enum TiffError {
        /// The first bytes of the stream are not a TIFF header.
        MalformedHeader(err: HeaderError) {
            display("Malformed header: {}", err)
            from()
        }
        /// A read at `offset` of `length` bytes goes beyond the `available` bytes of the stream.
        TruncatedData(offset: u64, length: u64, available: u64) {
            display("Truncated data: {} bytes at offset {} exceed the stream length of {} bytes",
                length, offset, available)
        }
        /// A tag needed to interpret the image is absent.
        MissingRequiredTag(tag: Tag) {
            display("Required tag {} not found", tag)
        }
        /// A required tag uses a value type code that is not defined by TIFF.
        UnsupportedTagType(tag: Tag, type_code: u16) {
            display("Tag {} has unsupported value type {}", tag, type_code)
        }
        /// The image is well-formed but uses an encoding this decoder does not decode.
        UnsupportedEncoding(err: TiffUnsupportedError) {
            display("Unsupported encoding: {}", err)
            from()
        }
        /// An offset or byte count array does not match the computed block grid.
        ///
        /// `expected` is `usize::MAX` for a grid with more blocks than a `usize` counts.
        InconsistentBlockTable(tag: Tag, expected: usize, actual: usize) {
            display("Block table {} holds {} entries, the block grid needs {}", tag, actual, expected)
        }
        /// A codec produced a different amount of bytes than the block geometry requires.
        CodecLengthMismatch(block: usize, expected: usize, actual: usize) {
            display("Block {} decompressed to {} bytes, expected {}", block, actual, expected)
        }
        /// A codec rejected the data of a block.
        Codec(block: usize, method: CompressionMethod, message: String) {
            display("Block {} could not be decompressed with {:?}: {}", block, method, message)
        }
        /// The structure of the file is invalid beyond the categories above.
        FormatError(err: TiffFormatError) {
            display("Format error: {}", err)
            from()
        }
        /// An I/O Error occurred while decoding the image
        IoError(err: io::Error) {
            display("{}", err)
            source(err)
            from()
        }
        /// The limits of the decoder were exceeded.
        LimitsExceeded {
            display("The Decoder limits are exceeded")
        }
        /// An integer conversion to or from a platform size failed.
        IntSizeError {
            display("Platform or format size limits exceeded")
            from(TryFromIntError)
        }
        /// The decoder was used incorrectly.
        UsageError(err: UsageError) {
            display("Usage error: {}", err)
            from()
        }
        /// The decode was cancelled through its `CancelToken`.
        Cancelled {
            display("The decode was cancelled")
        }
    }
}

quick_error! {
    /// The reason a header was rejected.
    #[derive(Debug, Clone, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum HeaderError {
        /// The stream ended within the header.
        TooShort {
            display("the stream is shorter than a TIFF header")
        }
        /// The first two bytes are neither `II` nor `MM`.
        ByteOrderMarker(marker: [u8; 2]) {
            display("byte order marker {:02x?} is neither II nor MM", marker)
        }
        /// The version field is neither 42 (TIFF) nor 43 (BigTIFF).
        Version(version: u16) {
            display("version {} is not a TIFF version", version)
        }
        /// The BigTIFF offset size or reserved field hold unexpected values.
        BigTiffLayout(offset_size: u16, reserved: u16) {
            display("BigTIFF offset size {} with reserved field {}", offset_size, reserved)
        }
    }
}

quick_error! {
    /// The image format is not formatted properly.
    #[derive(Debug, Clone, PartialEq)]
    #[non_exhaustive]
    pub enum TiffFormatError {
        InvalidDimensions(width: u32, height: u32) {
            display("Invalid dimensions: {}x{}.", width, height)
        }
        InvalidTileDimensions(width: u32, height: u32) {
            display("Invalid tile dimensions: {}x{}.", width, height)
        }
        RowsPerStripIsZero {
            display("Rows per strip is zero.")
        }
        SamplesPerPixelIsZero {
            display("Samples per pixel is zero")
        }
        InconsistentSizesEncountered(tag: Tag, count: usize, samples_per_pixel: u16) {
            display("Tag {} holds {} values for {} samples per pixel", tag, count, samples_per_pixel)
        }
        InvalidTagValueType(tag: Tag) {
            display("Tag {} has an invalid value type", tag)
        }
        InvalidTag {
            display("Image contains invalid tag")
        }
        ImageFileDirectoryNotFound {
            display("Image file directory not found.")
        }
        EmptyDirectory {
            display("The image file directory holds no entries.")
        }
        InvalidJpegTables {
            display("The JPEG tables are not a JPEG stream.")
        }
    }
}

quick_error! {
    /// The Decoder does not support this image format
    #[derive(Debug, Clone, PartialEq)]
    #[non_exhaustive]
    pub enum TiffUnsupportedError {
        Photometric(interpretation: PhotometricInterpretation) {
            display("Photometric interpretation {:?} is not supported", interpretation)
        }
        BitsPerSample(bits: Vec<u16>) {
            display("Bits per sample {:?} are not supported", bits)
        }
        SampleFormat(format: Vec<SampleFormat>, bits: u16) {
            display("Sample format {:?} with {} bits is not supported", format, bits)
        }
        Compression(method: CompressionMethod) {
            display("Compression method {:?} is unsupported", method)
        }
        PlanarConfiguration(config: PlanarConfiguration) {
            display("Planar configuration {:?} is unsupported", config)
        }
        Predictor(predictor: Predictor, format: SampleFormat) {
            display("Predictor {:?} is unsupported for {:?} samples", predictor, format)
        }
        SamplesPerPixel(interpretation: PhotometricInterpretation, samples: u16) {
            display("{} samples per pixel do not fit photometric interpretation {:?}",
                samples, interpretation)
        }
        ExtraSamples(declared: usize, expected: usize) {
            display("{} extra samples are declared but the pixel layout implies {}",
                declared, expected)
        }
        JpegBitDepth(bits: u16) {
            display("JPEG compressed data with {} bits per sample is unsupported", bits)
        }
    }
}

quick_error! {
    /// User attempted to use the Decoder in a way that is incompatible with a specific image.
    #[derive(Debug, Clone, PartialEq, Eq)]
    #[non_exhaustive]
    pub enum UsageError {
        InvalidRegion(rows: std::ops::Range<u32>, cols: std::ops::Range<u32>) {
            display("Region rows {:?}, columns {:?} is empty or outside of the image", rows, cols)
        }
        ThreadPool(message: String) {
            display("The worker pool could not be created: {}", message)
        }
    }
}

impl TiffError {
    /// Map an unexpected end of file while reading `length` bytes at `offset`.
    pub(crate) fn from_read(err: io::Error, offset: u64, length: u64, available: u64) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => TiffError::TruncatedData(offset, length, available),
            _ => TiffError::IoError(err),
        }
    }
}

/// Result of an image decoding/encoding process
pub type TiffResult<T> = Result<T, TiffError>;
