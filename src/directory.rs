use core::fmt;
use std::{collections::BTreeMap, num::NonZeroU64};

use crate::{decoder::ifd::Entry, tags::Tag};

/// An Image File Directory (IFD).
///
/// A directory maps integer tag ids to [`Entry`]s. The entries hold the type, count and the
/// inline value or the offset of the value somewhere in the file; values are resolved on demand
/// by the reader.
///
/// Only the first directory of a file is read, [`Self::next`] merely records whether the file
/// holds more images.
#[doc(alias = "IFD")]
pub struct Directory {
    /// There are at most `u16::MAX` entries in any single classic directory, the count is stored
    /// as a 2-byte value. The order in the file is implied to be ascending by tag value (the
    /// decoder does not mind unordered entries).
    pub(crate) entries: BTreeMap<u16, Entry>,
    pub(crate) next_ifd: Option<NonZeroU64>,
}

impl Directory {
    /// Create a directory in an initial state without entries.
    pub fn empty() -> Self {
        Directory {
            entries: BTreeMap::new(),
            next_ifd: None,
        }
    }

    /// Retrieve the entry associated with a tag.
    pub fn get(&self, tag: Tag) -> Option<&Entry> {
        self.entries.get(&tag.to_u16())
    }

    /// Check if the directory contains a specified tag.
    pub fn contains(&self, tag: Tag) -> bool {
        self.entries.contains_key(&tag.to_u16())
    }

    /// Iterate over all known and unknown tags in this directory.
    pub fn iter(&self) -> impl Iterator<Item = (Tag, &Entry)> + '_ {
        self.entries
            .iter()
            .map(|(k, v)| (Tag::from_u16_exhaustive(*k), v))
    }

    /// Insert an entry, replacing an earlier entry for the same tag.
    pub fn insert(&mut self, tag: Tag, entry: Entry) -> Option<Entry> {
        self.entries.insert(tag.to_u16(), entry)
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are any entries in this directory.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the offset of the next IFD, if it was defined.
    pub fn next(&self) -> Option<u64> {
        self.next_ifd.map(NonZeroU64::get)
    }
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field(
                "entries",
                &self
                    .entries
                    .iter()
                    .map(|(k, v)| (Tag::from_u16_exhaustive(*k), v))
                    .collect::<Vec<_>>(),
            )
            .field("next_ifd", &self.next_ifd)
            .finish()
    }
}
