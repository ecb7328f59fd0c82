//! Function for reading TIFF tags

use std::borrow::Cow;
use std::io::{Read, Seek};
use std::num::NonZeroU64;

use log::{debug, warn};

use super::stream::{EndianReader, SliceReader, SmartReader};
use super::Limits;
use crate::tags::{ByteOrder, Tag, Type};
use crate::{Directory, TiffError, TiffFormatError, TiffResult};

use self::Value::{
    Ascii, Byte, Double, Float, Ifd, IfdBig, List, Rational, SRational, Short, Signed, SignedBig,
    SignedByte, SignedShort, Unsigned, UnsignedBig,
};

/// A tag value, decoded according to the type of its entry.
///
/// Entries with a count of one decode to the scalar variant, all others to a [`Value::List`].
#[allow(unused_qualifications)]
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    Byte(u8),
    Short(u16),
    SignedByte(i8),
    SignedShort(i16),
    Signed(i32),
    SignedBig(i64),
    Unsigned(u32),
    UnsignedBig(u64),
    Float(f32),
    Double(f64),
    List(Vec<Value>),
    Rational(u32, u32),
    SRational(i32, i32),
    Ascii(String),
    Ifd(u32),
    IfdBig(u64),
}

impl Value {
    pub fn into_u16(self) -> TiffResult<u16> {
        match self {
            Byte(val) => Ok(val.into()),
            Short(val) => Ok(val),
            Unsigned(val) => Ok(u16::try_from(val)?),
            UnsignedBig(val) => Ok(u16::try_from(val)?),
            List(mut vec) if vec.len() == 1 => vec.remove(0).into_u16(),
            _ => Err(TiffFormatError::InvalidTag.into()),
        }
    }

    pub fn into_u32(self) -> TiffResult<u32> {
        match self {
            Byte(val) => Ok(val.into()),
            Short(val) => Ok(val.into()),
            Unsigned(val) => Ok(val),
            UnsignedBig(val) => Ok(u32::try_from(val)?),
            Ifd(val) => Ok(val),
            IfdBig(val) => Ok(u32::try_from(val)?),
            List(mut vec) if vec.len() == 1 => vec.remove(0).into_u32(),
            _ => Err(TiffFormatError::InvalidTag.into()),
        }
    }

    pub fn into_u64(self) -> TiffResult<u64> {
        match self {
            Byte(val) => Ok(val.into()),
            Short(val) => Ok(val.into()),
            Unsigned(val) => Ok(val.into()),
            UnsignedBig(val) => Ok(val),
            Ifd(val) => Ok(val.into()),
            IfdBig(val) => Ok(val),
            List(mut vec) if vec.len() == 1 => vec.remove(0).into_u64(),
            _ => Err(TiffFormatError::InvalidTag.into()),
        }
    }

    pub fn into_string(self) -> TiffResult<String> {
        match self {
            Ascii(val) => Ok(val),
            _ => Err(TiffFormatError::InvalidTag.into()),
        }
    }

    pub fn into_u8_vec(self) -> TiffResult<Vec<u8>> {
        match self {
            List(vec) => vec
                .into_iter()
                .map(|v| match v {
                    Byte(val) => Ok(val),
                    _ => Err(TiffFormatError::InvalidTag.into()),
                })
                .collect(),
            Byte(val) => Ok(vec![val]),
            _ => Err(TiffFormatError::InvalidTag.into()),
        }
    }

    pub fn into_u64_vec(self) -> TiffResult<Vec<u64>> {
        match self {
            List(vec) => vec.into_iter().map(Value::into_u64).collect(),
            Rational(numerator, denominator) => Ok(vec![numerator.into(), denominator.into()]),
            val => Ok(vec![val.into_u64()?]),
        }
    }
}

/// One record of an image file directory.
///
/// The type is kept as its raw code: an entry whose type is not defined by TIFF only becomes an
/// error once a reader asks for its value.
#[derive(Clone)]
pub struct Entry {
    type_code: u16,
    count: u64,
    offset: [u8; 8],
}

impl ::std::fmt::Debug for Entry {
    fn fmt(&self, fmt: &mut ::std::fmt::Formatter) -> Result<(), ::std::fmt::Error> {
        fmt.write_str(&format!(
            "Entry {{ type_: {:?}, count: {:?}, offset: {:?} }}",
            Type::from_u16(self.type_code),
            self.count,
            &self.offset
        ))
    }
}

impl Entry {
    pub fn new(type_code: u16, count: u32, offset: [u8; 4]) -> Entry {
        let mut field = [0; 8];
        field[..4].copy_from_slice(&offset);
        Entry::new_u64(type_code, count.into(), field)
    }

    pub fn new_u64(type_code: u16, count: u64, offset: [u8; 8]) -> Entry {
        Entry {
            type_code,
            count,
            offset,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// The value type of this entry, if it is a type defined by TIFF.
    pub fn field_type(&self) -> Option<Type> {
        Type::from_u16(self.type_code)
    }

    fn require_type(&self, tag: Tag) -> TiffResult<Type> {
        self.field_type()
            .ok_or(TiffError::UnsupportedTagType(tag, self.type_code))
    }

    #[inline(always)]
    fn offset(&self, bigtiff: bool, bo: ByteOrder) -> TiffResult<u64> {
        let mut r = SliceReader::new(&self.offset, bo);
        if bigtiff {
            Ok(r.read_u64()?)
        } else {
            Ok(r.read_u32()?.into())
        }
    }

    /// Resolves the value of this entry, reading indirected values from the stream.
    pub(crate) fn val<R: Read + Seek>(
        &self,
        tag: Tag,
        limits: &Limits,
        bigtiff: bool,
        reader: &mut SmartReader<R>,
    ) -> TiffResult<Value> {
        let type_ = self.require_type(tag)?;
        let bo = reader.byte_order;
        let value_bytes = type_.value_bytes(self.count)?;
        let inline_len = if bigtiff { 8 } else { 4 };

        let bytes = if value_bytes <= inline_len {
            Cow::Borrowed(&self.offset[..usize::try_from(value_bytes)?])
        } else {
            if value_bytes > u64::try_from(limits.ifd_value_size)? {
                return Err(TiffError::LimitsExceeded);
            }
            let offset = self.offset(bigtiff, bo)?;
            Cow::Owned(reader.read_at(offset, value_bytes)?)
        };

        decode_values(type_, self.count, &bytes, bo)
    }
}

fn decode_values(type_: Type, count: u64, bytes: &[u8], bo: ByteOrder) -> TiffResult<Value> {
    if type_ == Type::ASCII {
        let mut out = bytes.to_vec();
        // Strings may be null-terminated, so we trim anything downstream of the null byte
        if let Some(first) = out.iter().position(|&b| b == 0) {
            out.truncate(first);
        }
        return String::from_utf8(out)
            .map(Ascii)
            .map_err(|_| TiffFormatError::InvalidTag.into());
    }

    let mut r = SliceReader::new(bytes, bo);
    let mut read_one = || -> TiffResult<Value> {
        Ok(match type_ {
            Type::BYTE | Type::UNDEFINED => {
                let mut buf = [0; 1];
                r.read_exact(&mut buf)?;
                Byte(buf[0])
            }
            Type::SBYTE => SignedByte(r.read_i8()?),
            Type::SHORT => Short(r.read_u16()?),
            Type::SSHORT => SignedShort(r.read_i16()?),
            Type::LONG => Unsigned(r.read_u32()?),
            Type::SLONG => Signed(r.read_i32()?),
            Type::FLOAT => Float(r.read_f32()?),
            Type::DOUBLE => Double(r.read_f64()?),
            Type::RATIONAL => Rational(r.read_u32()?, r.read_u32()?),
            Type::SRATIONAL => SRational(r.read_i32()?, r.read_i32()?),
            Type::IFD => Ifd(r.read_u32()?),
            Type::LONG8 => UnsignedBig(r.read_u64()?),
            Type::SLONG8 => SignedBig(r.read_i64()?),
            Type::IFD8 => IfdBig(r.read_u64()?),
            Type::ASCII => unreachable!(),
        })
    };

    if count == 1 {
        return read_one();
    }

    let mut v = Vec::with_capacity(usize::try_from(count)?);
    for _ in 0..count {
        v.push(read_one()?);
    }
    Ok(List(v))
}

/// Reads the directory at `offset`.
///
/// Entries are kept unresolved; their values are fetched on demand through the
/// [`TagReader`](super::tag_reader::TagReader).
pub(crate) fn read_directory<R: Read + Seek>(
    reader: &mut SmartReader<R>,
    bigtiff: bool,
    offset: u64,
) -> TiffResult<Directory> {
    if offset == 0 {
        return Err(TiffFormatError::ImageFileDirectoryNotFound.into());
    }

    let bo = reader.byte_order;
    let (count_len, entry_len, next_len) = if bigtiff { (8, 20, 8) } else { (2, 12, 4) };

    let count_bytes = reader.read_at(offset, count_len)?;
    let mut r = SliceReader::new(&count_bytes, bo);
    let num_tags = if bigtiff {
        r.read_u64()?
    } else {
        r.read_u16()?.into()
    };
    if num_tags == 0 {
        return Err(TiffFormatError::EmptyDirectory.into());
    }

    let table_len = num_tags
        .checked_mul(entry_len)
        .and_then(|n| n.checked_add(next_len))
        .ok_or(TiffError::LimitsExceeded)?;
    let table = reader.read_at(offset + count_len, table_len)?;
    let mut r = SliceReader::new(&table, bo);

    let mut dir = Directory::empty();
    for _ in 0..num_tags {
        let tag = Tag::from_u16_exhaustive(r.read_u16()?);
        let type_code = r.read_u16()?;
        let entry = if bigtiff {
            let count = r.read_u64()?;
            let mut field = [0; 8];
            r.read_exact(&mut field)?;
            Entry::new_u64(type_code, count, field)
        } else {
            let count = r.read_u32()?;
            let mut field = [0; 4];
            r.read_exact(&mut field)?;
            Entry::new(type_code, count, field)
        };

        if entry.field_type().is_none() {
            warn!("{tag} has unknown value type {type_code}, kept unresolved");
        }
        dir.insert(tag, entry);
    }

    let next = if bigtiff {
        r.read_u64()?
    } else {
        r.read_u32()?.into()
    };
    dir.next_ifd = NonZeroU64::new(next);

    debug!(
        "read directory at {offset} with {} entries, next directory at {next}",
        dir.len()
    );
    Ok(dir)
}
