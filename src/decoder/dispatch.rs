//! Parallel decompression of blocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{trace, warn};
use rayon::prelude::*;
use rayon::ThreadPool;

use super::blocks::Block;
use super::codec::{merge_jpeg_tables, Codec};
use super::descriptor::ImageDescriptor;
use super::predictor::{rev_fp_predict, rev_hpredict};
use crate::tags::{ByteOrder, CompressionMethod, Predictor};
use crate::{TiffError, TiffResult};

/// Cooperative cancellation of a running decode.
///
/// Clones share the flag. Workers check it before every block, a cancelled decode returns
/// [`TiffError::Cancelled`] without assembling a partial image.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Compressed bytes of a block, read from the stream.
pub(crate) struct CompressedBlock {
    pub block: Block,
    pub data: Vec<u8>,
}

/// Samples of a block in native byte order with any predictor reverted.
///
/// Holds exactly `stored_width * stored_height` pixels of the block's samples.
pub(crate) struct DecodedBlock {
    pub block: Block,
    pub data: Vec<u8>,
}

/// Everything a worker needs besides the block itself.
pub(crate) struct BlockDecoder<'a> {
    pub descriptor: &'a ImageDescriptor,
    pub byte_order: ByteOrder,
    pub codec: &'a dyn Codec,
    pub jpeg_tables: Option<&'a [u8]>,
}

impl BlockDecoder<'_> {
    /// Decodes all blocks on `pool`, or on the global pool if there is none.
    ///
    /// The result keeps the order of `blocks`. The first failing block fails the whole decode.
    pub(crate) fn decode_all(
        &self,
        pool: Option<&ThreadPool>,
        blocks: Vec<CompressedBlock>,
        cancel: &CancelToken,
    ) -> TiffResult<Vec<DecodedBlock>> {
        let run = || {
            blocks
                .into_par_iter()
                .map(|compressed| {
                    if cancel.is_cancelled() {
                        return Err(TiffError::Cancelled);
                    }
                    self.decode(compressed)
                })
                .collect::<TiffResult<Vec<_>>>()
        };

        match pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }

    /// Byte length of a decoded block with `rows` rows.
    fn block_len(&self, block: &Block, rows: u32) -> usize {
        block.stored_width as usize
            * rows as usize
            * usize::from(self.descriptor.samples_per_block_pixel())
            * self.descriptor.bytes_per_sample()
    }

    pub(crate) fn decode(&self, compressed: CompressedBlock) -> TiffResult<DecodedBlock> {
        let CompressedBlock { block, data } = compressed;
        let method = self.descriptor.compression;
        let expected = self.block_len(&block, block.stored_height);
        let padded = self.block_len(&block, block.nominal_height);

        let merged;
        let input = match (method, self.jpeg_tables) {
            (CompressionMethod::ModernJPEG, Some(tables)) => {
                merged = merge_jpeg_tables(tables, &data);
                &merged[..]
            }
            _ => &data[..],
        };

        let mut out = self
            .codec
            .decompress(method, input, padded)
            .map_err(|err| TiffError::Codec(block.index, method, err.to_string()))?;
        trace!(
            "block {} decompressed {} -> {} bytes",
            block.index,
            input.len(),
            out.len()
        );

        if out.len() != expected {
            if out.len() == padded {
                warn!(
                    "block {} holds {} padding rows, discarding them",
                    block.index,
                    block.nominal_height - block.stored_height
                );
                out.truncate(expected);
            } else {
                return Err(TiffError::CodecLengthMismatch(block.index, expected, out.len()));
            }
        }

        self.revert_encoding(&block, &mut out);
        Ok(DecodedBlock { block, data: out })
    }

    fn revert_encoding(&self, block: &Block, data: &mut [u8]) {
        let bytes = self.descriptor.bytes_per_sample();
        let width = block.stored_width as usize;
        let samples = usize::from(self.descriptor.samples_per_block_pixel());

        match self.descriptor.predictor {
            Predictor::FloatingPoint => rev_fp_predict(data, bytes, width, samples),
            Predictor::Horizontal => {
                self.byte_order.to_native(bytes, data);
                rev_hpredict(data, bytes, width, samples);
            }
            _ => self.byte_order.to_native(bytes, data),
        }
    }
}
