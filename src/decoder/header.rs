use std::io::{self, Read};

use super::stream::{EndianReader, SliceReader};
use crate::tags::ByteOrder;
use crate::{HeaderError, TiffResult};

/// The fixed part at the start of every TIFF file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TiffHeader {
    pub byte_order: ByteOrder,
    /// Whether the file uses the BigTIFF layout with 64-bit offsets.
    pub bigtiff: bool,
    /// Absolute offset of the first image file directory.
    pub ifd_offset: u64,
}

impl TiffHeader {
    /// Longest header layout (BigTIFF).
    pub const MAX_LEN: usize = 16;

    /// Parses the header from the first bytes of a stream.
    ///
    /// Classic TIFF needs 8 bytes, BigTIFF 16.
    pub fn parse(bytes: &[u8]) -> TiffResult<TiffHeader> {
        let byte_order = match bytes.get(..2) {
            Some(b"II") => ByteOrder::LittleEndian,
            Some(b"MM") => ByteOrder::BigEndian,
            Some(&[a, b]) => return Err(HeaderError::ByteOrderMarker([a, b]).into()),
            _ => return Err(HeaderError::TooShort.into()),
        };

        let mut reader = SliceReader::new(&bytes[2..], byte_order);
        let version = reader.read_u16().map_err(too_short)?;
        let (bigtiff, ifd_offset) = match version {
            42 => (false, u64::from(reader.read_u32().map_err(too_short)?)),
            43 => {
                // Bytesize of offsets, always 8 for now, and a reserved constant 0.
                let offset_size = reader.read_u16().map_err(too_short)?;
                let reserved = reader.read_u16().map_err(too_short)?;
                if offset_size != 8 || reserved != 0 {
                    return Err(HeaderError::BigTiffLayout(offset_size, reserved).into());
                }
                (true, reader.read_u64().map_err(too_short)?)
            }
            other => return Err(HeaderError::Version(other).into()),
        };

        Ok(TiffHeader {
            byte_order,
            bigtiff,
            ifd_offset,
        })
    }

    /// Reads and parses the header at the start of `reader`.
    pub fn read<R: Read>(reader: &mut R) -> TiffResult<TiffHeader> {
        let mut buf = Vec::with_capacity(Self::MAX_LEN);
        reader
            .by_ref()
            .take(Self::MAX_LEN as u64)
            .read_to_end(&mut buf)?;
        Self::parse(&buf)
    }
}

fn too_short(_: io::Error) -> HeaderError {
    HeaderError::TooShort
}
