//! Reversal of the differencing predictors applied before compression.
//!
//! All functions work on a single decoded block of `width` pixels per row with `samples`
//! interleaved samples each.

macro_rules! rev_hpredict_as {
    ($buf:expr, $ty:ty, $row_len:expr, $samples:expr) => {{
        const WIDTH: usize = std::mem::size_of::<$ty>();
        let mut values: Vec<$ty> = Vec::with_capacity($row_len);
        for row in $buf.chunks_exact_mut($row_len * WIDTH) {
            values.clear();
            values.extend(row.chunks_exact(WIDTH).map(|chunk| {
                let mut bytes = [0u8; WIDTH];
                bytes.copy_from_slice(chunk);
                <$ty>::from_ne_bytes(bytes)
            }));

            for i in $samples..$row_len {
                values[i] = values[i].wrapping_add(values[i - $samples]);
            }

            for (chunk, value) in row.chunks_exact_mut(WIDTH).zip(&values) {
                chunk.copy_from_slice(&value.to_ne_bytes());
            }
        }
    }};
}

/// Undoes horizontal differencing of native-endian integer samples in place.
///
/// Signed samples wrap exactly like unsigned ones of the same width, so only the width matters.
pub(crate) fn rev_hpredict(buf: &mut [u8], bytes_per_sample: usize, width: usize, samples: usize) {
    let row_len = width * samples;
    if row_len == 0 {
        return;
    }

    match bytes_per_sample {
        1 => rev_hpredict_as!(buf, u8, row_len, samples),
        2 => rev_hpredict_as!(buf, u16, row_len, samples),
        4 => rev_hpredict_as!(buf, u32, row_len, samples),
        8 => rev_hpredict_as!(buf, u64, row_len, samples),
        _ => {}
    }
}

/// Undoes the floating point predictor in place, leaving native-endian samples.
///
/// Each row was stored as byte planes, most significant byte first, with horizontal differencing
/// over the bytes. The stored data does not depend on the file byte order.
pub(crate) fn rev_fp_predict(
    buf: &mut [u8],
    bytes_per_sample: usize,
    width: usize,
    samples: usize,
) {
    let row_increment = width * samples;
    let row_bytes = row_increment * bytes_per_sample;
    if row_bytes == 0 {
        return;
    }

    let mut copy = vec![0u8; row_bytes];
    for row in buf.chunks_exact_mut(row_bytes) {
        copy.copy_from_slice(row);

        for i in samples..row_bytes {
            copy[i] = copy[i].wrapping_add(copy[i - samples]);
        }

        for (sample, out) in row.chunks_exact_mut(bytes_per_sample).enumerate() {
            for (byte, dst) in out.iter_mut().enumerate() {
                *dst = copy[row_increment * byte + sample];
            }
            // The planes were most significant first.
            if cfg!(target_endian = "little") {
                out.reverse();
            }
        }
    }
}
