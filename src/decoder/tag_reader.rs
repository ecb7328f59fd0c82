use std::io::{Read, Seek};

use super::ifd::Value;
use super::stream::SmartReader;
use super::Limits;
use crate::tags::Tag;
use crate::{Directory, TiffError, TiffFormatError, TiffResult};

/// Resolves the values of directory entries against the stream.
pub(crate) struct TagReader<'lt, R> {
    pub(crate) reader: &'lt mut SmartReader<R>,
    pub(crate) ifd: &'lt Directory,
    pub(crate) limits: &'lt Limits,
    pub(crate) bigtiff: bool,
}

impl<'lt, R: Read + Seek> TagReader<'lt, R> {
    pub(crate) fn find_tag(&mut self, tag: Tag) -> TiffResult<Option<Value>> {
        let entry = match self.ifd.get(tag) {
            None => return Ok(None),
            Some(entry) => entry,
        };

        entry
            .val(tag, self.limits, self.bigtiff, self.reader)
            .map(Some)
    }

    pub(crate) fn require_tag(&mut self, tag: Tag) -> TiffResult<Value> {
        match self.find_tag(tag)? {
            Some(val) => Ok(val),
            None => Err(TiffError::MissingRequiredTag(tag)),
        }
    }

    pub(crate) fn find_tag_u16(&mut self, tag: Tag) -> TiffResult<Option<u16>> {
        self.find_tag(tag)?
            .map(|v| v.into_u16().map_err(|_| invalid_type(tag)))
            .transpose()
    }

    pub(crate) fn require_tag_u32(&mut self, tag: Tag) -> TiffResult<u32> {
        self.require_tag(tag)?
            .into_u32()
            .map_err(|_| invalid_type(tag))
    }

    pub(crate) fn find_tag_u32(&mut self, tag: Tag) -> TiffResult<Option<u32>> {
        self.find_tag(tag)?
            .map(|v| v.into_u32().map_err(|_| invalid_type(tag)))
            .transpose()
    }

    pub(crate) fn find_tag_uint_vec<T: TryFrom<u64>>(
        &mut self,
        tag: Tag,
    ) -> TiffResult<Option<Vec<T>>> {
        self.find_tag(tag)?
            .map(|v| v.into_u64_vec().map_err(|_| invalid_type(tag)))
            .transpose()?
            .map(|v| {
                v.into_iter()
                    .map(|u| T::try_from(u).map_err(|_| invalid_type(tag)))
                    .collect()
            })
            .transpose()
    }

    pub(crate) fn require_tag_uint_vec<T: TryFrom<u64>>(&mut self, tag: Tag) -> TiffResult<Vec<T>> {
        self.find_tag_uint_vec(tag)?
            .ok_or(TiffError::MissingRequiredTag(tag))
    }

    pub(crate) fn find_tag_u8_vec(&mut self, tag: Tag) -> TiffResult<Option<Vec<u8>>> {
        self.find_tag(tag)?
            .map(|v| v.into_u8_vec().map_err(|_| invalid_type(tag)))
            .transpose()
    }
}

fn invalid_type(tag: Tag) -> TiffError {
    TiffFormatError::InvalidTagValueType(tag).into()
}
