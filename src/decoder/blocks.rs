use std::ops::Range;

use super::descriptor::{BlockLayout, ImageDescriptor};
use crate::tags::Tag;
use crate::{TiffError, TiffResult};

/// One strip or tile of compressed data and where its pixels land in the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    /// Position in the offset and byte count tables.
    pub index: usize,
    /// Sample plane of the block, always 0 for chunky images.
    pub plane: u16,
    /// Row of the block in the block grid.
    pub row: u32,
    /// Column of the block in the block grid.
    pub col: u32,
    /// Absolute file offset of the compressed data.
    pub offset: u64,
    /// Length of the compressed data.
    pub byte_count: u64,
    /// Pixel column of the top left corner.
    pub x: u32,
    /// Pixel row of the top left corner.
    pub y: u32,
    /// Width in pixels that lies within the image.
    pub width: u32,
    /// Height in pixels that lies within the image.
    pub height: u32,
    /// Width of a decoded row in pixels, including tile padding.
    pub stored_width: u32,
    /// Rows the codec must deliver, including tile padding.
    pub stored_height: u32,
    /// Rows a padded encoder may have written for the block.
    pub nominal_height: u32,
}

/// The partition of an image into equally sized blocks.
///
/// Strips are blocks spanning the full image width, so both layouts share this grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockGrid {
    pub image_width: u32,
    pub image_height: u32,
    pub block_width: u32,
    pub block_height: u32,
    pub across: u32,
    pub down: u32,
    pub planes: u16,
    pub tiled: bool,
}

impl BlockGrid {
    pub(crate) fn new(descriptor: &ImageDescriptor) -> BlockGrid {
        let (block_width, block_height, tiled) = match descriptor.layout {
            BlockLayout::Strips { rows_per_strip } => (descriptor.width, rows_per_strip, false),
            BlockLayout::Tiles {
                tile_width,
                tile_height,
            } => (tile_width, tile_height, true),
        };

        BlockGrid {
            image_width: descriptor.width,
            image_height: descriptor.height,
            block_width,
            block_height,
            across: descriptor.width.div_ceil(block_width),
            down: descriptor.height.div_ceil(block_height),
            planes: descriptor.planes(),
            tiled,
        }
    }

    /// `None` if the count does not fit a `usize`.
    pub(crate) fn blocks_per_plane(&self) -> Option<usize> {
        usize::try_from(self.across)
            .ok()?
            .checked_mul(usize::try_from(self.down).ok()?)
    }

    /// Number of blocks of all planes, `None` if the count does not fit a `usize`.
    pub(crate) fn len(&self) -> Option<usize> {
        self.blocks_per_plane()?
            .checked_mul(usize::from(self.planes))
    }

    /// Tags holding the offset and byte count tables for this layout.
    pub(crate) fn table_tags(&self) -> (Tag, Tag) {
        if self.tiled {
            (Tag::TileOffsets, Tag::TileByteCounts)
        } else {
            (Tag::StripOffsets, Tag::StripByteCounts)
        }
    }

    /// Pairs every block of the grid with its table entries.
    ///
    /// Blocks are ordered like the tables: plane by plane, each plane in row-major order. A grid
    /// too large to count can not match any table, the expected length is then `usize::MAX`.
    pub(crate) fn locate(&self, offsets: &[u64], byte_counts: &[u64]) -> TiffResult<Vec<Block>> {
        let (offsets_tag, counts_tag) = self.table_tags();
        let (per_plane, expected) = match (self.blocks_per_plane(), self.len()) {
            (Some(per_plane), Some(expected)) => (per_plane, expected),
            _ => {
                return Err(TiffError::InconsistentBlockTable(
                    offsets_tag,
                    usize::MAX,
                    offsets.len(),
                ))
            }
        };
        if offsets.len() != expected {
            return Err(TiffError::InconsistentBlockTable(
                offsets_tag,
                expected,
                offsets.len(),
            ));
        }
        if byte_counts.len() != expected {
            return Err(TiffError::InconsistentBlockTable(
                counts_tag,
                expected,
                byte_counts.len(),
            ));
        }

        let blocks = (0..expected)
            .map(|index| {
                let plane = (index / per_plane) as u16;
                let in_plane = index % per_plane;
                let row = (in_plane / self.across as usize) as u32;
                let col = (in_plane % self.across as usize) as u32;
                self.block(index, plane, row, col, offsets[index], byte_counts[index])
            })
            .collect();
        Ok(blocks)
    }

    fn block(
        &self,
        index: usize,
        plane: u16,
        row: u32,
        col: u32,
        offset: u64,
        byte_count: u64,
    ) -> Block {
        let x = col * self.block_width;
        let y = row * self.block_height;
        let width = self.block_width.min(self.image_width - x);
        let height = self.block_height.min(self.image_height - y);

        // Tiles are always stored padded. Strips only hold their rows, though some writers pad
        // the last one up to the full strip height.
        let stored_height = if self.tiled { self.block_height } else { height };

        Block {
            index,
            plane,
            row,
            col,
            offset,
            byte_count,
            x,
            y,
            width,
            height,
            stored_width: self.block_width,
            stored_height,
            nominal_height: self.block_height,
        }
    }

    /// Grid rows and columns of the blocks touched by a pixel region.
    pub(crate) fn covering(
        &self,
        rows: &Range<u32>,
        cols: &Range<u32>,
    ) -> (Range<u32>, Range<u32>) {
        let grid_rows = rows.start / self.block_height..rows.end.div_ceil(self.block_height);
        let grid_cols = cols.start / self.block_width..cols.end.div_ceil(self.block_width);
        (grid_rows, grid_cols)
    }
}
