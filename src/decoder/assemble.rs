use std::ops::Range;

use super::descriptor::ImageDescriptor;
use super::dispatch::DecodedBlock;

/// A rectangle of the image in pixel coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Region {
    pub rows: Range<u32>,
    pub cols: Range<u32>,
}

impl Region {
    pub(crate) fn full(descriptor: &ImageDescriptor) -> Region {
        Region {
            rows: 0..descriptor.height,
            cols: 0..descriptor.width,
        }
    }

    pub(crate) fn width(&self) -> u32 {
        self.cols.end - self.cols.start
    }

    pub(crate) fn height(&self) -> u32 {
        self.rows.end - self.rows.start
    }

    /// Whether the region is non-empty and lies within the image.
    pub(crate) fn is_valid_for(&self, descriptor: &ImageDescriptor) -> bool {
        self.rows.start < self.rows.end
            && self.cols.start < self.cols.end
            && self.rows.end <= descriptor.height
            && self.cols.end <= descriptor.width
    }
}

/// Copies the pixels of decoded blocks into a chunky buffer covering `region`.
///
/// `out` must hold `region` in interleaved layout. Padding of edge blocks and pixels outside the
/// region are skipped. Planar blocks scatter their single sample into every pixel.
pub(crate) fn assemble(
    descriptor: &ImageDescriptor,
    region: &Region,
    blocks: &[DecodedBlock],
    out: &mut [u8],
) {
    let sample_bytes = descriptor.bytes_per_sample();
    let pixel_bytes = descriptor.bytes_per_pixel();
    let out_row_bytes = region.width() as usize * pixel_bytes;
    let block_pixel_bytes = usize::from(descriptor.samples_per_block_pixel()) * sample_bytes;
    let planar = descriptor.planes() > 1;

    for DecodedBlock { block, data } in blocks {
        let cols = block.x.max(region.cols.start)..(block.x + block.width).min(region.cols.end);
        let rows = block.y.max(region.rows.start)..(block.y + block.height).min(region.rows.end);
        if cols.is_empty() || rows.is_empty() {
            continue;
        }

        let span = (cols.end - cols.start) as usize;
        let src_row_bytes = block.stored_width as usize * block_pixel_bytes;
        let src_col = (cols.start - block.x) as usize * block_pixel_bytes;
        let dst_col = (cols.start - region.cols.start) as usize * pixel_bytes;

        for y in rows {
            let src_start = (y - block.y) as usize * src_row_bytes + src_col;
            let dst_start = (y - region.rows.start) as usize * out_row_bytes + dst_col;
            let src = &data[src_start..][..span * block_pixel_bytes];
            let dst = &mut out[dst_start..][..span * pixel_bytes];

            if planar {
                let plane_offset = usize::from(block.plane) * sample_bytes;
                for (sample, pixel) in src
                    .chunks_exact(sample_bytes)
                    .zip(dst.chunks_exact_mut(pixel_bytes))
                {
                    pixel[plane_offset..][..sample_bytes].copy_from_slice(sample);
                }
            } else {
                dst.copy_from_slice(src);
            }
        }
    }
}
