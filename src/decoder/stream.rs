//! All IO functionality needed for TIFF decoding

use std::io::{self, Read, Seek, Take};

use crate::tags::ByteOrder;
use crate::{TiffError, TiffResult};

macro_rules! read_fn {
    ($name:ident, $type:ty) => {
        /// reads an $type
        #[inline(always)]
        fn $name(&mut self) -> Result<$type, io::Error> {
            let mut n = [0u8; std::mem::size_of::<$type>()];
            self.read_exact(&mut n)?;
            Ok(match self.byte_order() {
                ByteOrder::LittleEndian => <$type>::from_le_bytes(n),
                ByteOrder::BigEndian => <$type>::from_be_bytes(n),
            })
        }
    };
}

/// Reader that is aware of the byte order.
pub trait EndianReader: Read {
    /// Byte order that should be adhered to
    fn byte_order(&self) -> ByteOrder;

    read_fn!(read_u16, u16);
    read_fn!(read_i8, i8);
    read_fn!(read_i16, i16);
    read_fn!(read_u32, u32);
    read_fn!(read_i32, i32);
    read_fn!(read_u64, u64);
    read_fn!(read_i64, i64);
    read_fn!(read_f32, f32);
    read_fn!(read_f64, f64);
}

///
/// ## PackBits Reader
///

enum PackBitsReaderState {
    Header,
    Literal,
    Repeat { value: u8 },
}

/// Reader that unpacks Apple's `PackBits` format
pub struct PackBitsReader<R: Read> {
    reader: Take<R>,
    state: PackBitsReaderState,
    count: usize,
}

impl<R: Read> PackBitsReader<R> {
    /// Wraps a reader
    pub fn new(reader: R, length: u64) -> Self {
        Self {
            reader: reader.take(length),
            state: PackBitsReaderState::Header,
            count: 0,
        }
    }
}

impl<R: Read> Read for PackBitsReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while let PackBitsReaderState::Header = self.state {
            if self.reader.limit() == 0 {
                return Ok(0);
            }
            let mut header: [u8; 1] = [0];
            self.reader.read_exact(&mut header)?;
            let h = header[0] as i8;
            if (-127..=-1).contains(&h) {
                let mut data: [u8; 1] = [0];
                self.reader.read_exact(&mut data)?;
                self.state = PackBitsReaderState::Repeat { value: data[0] };
                self.count = (1 - h as isize) as usize;
            } else if h >= 0 {
                self.state = PackBitsReaderState::Literal;
                self.count = h as usize + 1;
            } else {
                // h = -128 is a no-op.
            }
        }

        let length = buf.len().min(self.count);
        let actual = match self.state {
            PackBitsReaderState::Literal => self.reader.read(&mut buf[..length])?,
            PackBitsReaderState::Repeat { value } => {
                for b in &mut buf[..length] {
                    *b = value;
                }

                length
            }
            PackBitsReaderState::Header => unreachable!(),
        };

        if actual == 0 && length > 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "packbits literal run ends early",
            ));
        }

        self.count -= actual;
        if self.count == 0 {
            self.state = PackBitsReaderState::Header;
        }
        Ok(actual)
    }
}

///
/// ## LZW Reader
///

/// Reader that decompresses LZW streams
#[cfg(feature = "lzw")]
pub struct LZWReader<'a> {
    input: &'a [u8],
    decoder: weezl::decode::Decoder,
}

#[cfg(feature = "lzw")]
impl<'a> LZWReader<'a> {
    /// Wraps a slice of compressed data.
    pub fn new(input: &'a [u8]) -> LZWReader<'a> {
        Self {
            input,
            decoder: weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8),
        }
    }
}

#[cfg(feature = "lzw")]
impl Read for LZWReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let result = self.decoder.decode_bytes(self.input, buf);
            self.input = &self.input[result.consumed_in..];

            match result.status {
                Ok(weezl::LzwStatus::Ok) => {
                    if result.consumed_out == 0 {
                        continue;
                    } else {
                        return Ok(result.consumed_out);
                    }
                }
                // Many writers omit the end code, running out of input ends the stream as well.
                Ok(weezl::LzwStatus::NoProgress) | Ok(weezl::LzwStatus::Done) => {
                    return Ok(result.consumed_out);
                }
                Err(err) => return Err(io::Error::new(io::ErrorKind::InvalidData, err)),
            }
        }
    }
}

///
/// ## SmartReader Reader
///

/// Random access reader that is aware of the byte order and of the length of the stream.
///
/// Every read at an absolute offset is checked against the stream length first, so a truncated
/// file surfaces as [`TiffError::TruncatedData`] instead of a short buffer.
#[derive(Debug)]
pub struct SmartReader<R> {
    reader: R,
    pub byte_order: ByteOrder,
    len: u64,
}

impl<R: Read + Seek> SmartReader<R> {
    /// Wraps a reader, measuring the length of the stream.
    pub fn wrap(mut reader: R, byte_order: ByteOrder) -> io::Result<SmartReader<R>> {
        let len = reader.seek(io::SeekFrom::End(0))?;
        reader.seek(io::SeekFrom::Start(0))?;
        Ok(SmartReader {
            reader,
            byte_order,
            len,
        })
    }

    /// Total number of bytes of the underlying stream.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Fails with `TruncatedData` unless `length` bytes at `offset` lie within the stream.
    pub fn check_range(&self, offset: u64, length: u64) -> TiffResult<()> {
        match offset.checked_add(length) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(TiffError::TruncatedData(offset, length, self.len)),
        }
    }

    pub fn goto_offset(&mut self, offset: u64) -> io::Result<()> {
        self.seek(io::SeekFrom::Start(offset)).map(|_| ())
    }

    /// Reads exactly `length` bytes at the absolute `offset`.
    pub fn read_at(&mut self, offset: u64, length: u64) -> TiffResult<Vec<u8>> {
        self.check_range(offset, length)?;
        let mut buf = vec![0; usize::try_from(length)?];
        self.goto_offset(offset)?;
        self.reader
            .read_exact(&mut buf)
            .map_err(|err| TiffError::from_read(err, offset, length, self.len))?;
        Ok(buf)
    }
}

impl<R> SmartReader<R> {
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> EndianReader for SmartReader<R> {
    #[inline(always)]
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }
}

impl<R: Read> Read for SmartReader<R> {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R: Seek> Seek for SmartReader<R> {
    #[inline]
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }
}

/// Endian-aware reader over an in-memory value field.
pub(crate) struct SliceReader<'a> {
    cursor: io::Cursor<&'a [u8]>,
    byte_order: ByteOrder,
}

impl<'a> SliceReader<'a> {
    pub fn new(bytes: &'a [u8], byte_order: ByteOrder) -> Self {
        SliceReader {
            cursor: io::Cursor::new(bytes),
            byte_order,
        }
    }
}

impl Read for SliceReader<'_> {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl EndianReader for SliceReader<'_> {
    #[inline(always)]
    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }
}
