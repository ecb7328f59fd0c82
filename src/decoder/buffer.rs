use crate::tags::SampleFormat;

/// Decoded pixels in interleaved layout and native byte order.
///
/// Rows are stored top to bottom without padding, each pixel holds `samples_per_pixel` samples
/// in the order they are declared by the file.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    samples_per_pixel: u16,
    bits_per_sample: u16,
    sample_format: SampleFormat,
    data: Vec<u8>,
}

macro_rules! typed_copy {
    ($name:ident, $ty:ty, $format:pat) => {
        /// Copies the samples into a typed vector, `None` if the samples are of another type.
        pub fn $name(&self) -> Option<Vec<$ty>> {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            if usize::from(self.bits_per_sample) != WIDTH * 8
                || !matches!(self.sample_format, $format)
            {
                return None;
            }

            let mut bytes = [0u8; WIDTH];
            Some(
                self.data
                    .chunks_exact(WIDTH)
                    .map(|chunk| {
                        bytes.copy_from_slice(chunk);
                        <$ty>::from_ne_bytes(bytes)
                    })
                    .collect(),
            )
        }
    };
}

impl PixelBuffer {
    pub(crate) fn new(
        width: u32,
        height: u32,
        samples_per_pixel: u16,
        bits_per_sample: u16,
        sample_format: SampleFormat,
        data: Vec<u8>,
    ) -> Self {
        PixelBuffer {
            width,
            height,
            samples_per_pixel,
            bits_per_sample,
            sample_format,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn samples_per_pixel(&self) -> u16 {
        self.samples_per_pixel
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    /// Raw bytes of all samples.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// The samples of the pixel at column `x` and row `y`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let pixel_bytes =
            usize::from(self.samples_per_pixel) * usize::from(self.bits_per_sample / 8);
        let start = (y as usize * self.width as usize + x as usize) * pixel_bytes;
        self.data.get(start..start + pixel_bytes)
    }

    typed_copy!(to_u16_vec, u16, SampleFormat::Uint);
    typed_copy!(to_u32_vec, u32, SampleFormat::Uint);
    typed_copy!(to_u64_vec, u64, SampleFormat::Uint);
    typed_copy!(to_i8_vec, i8, SampleFormat::Int);
    typed_copy!(to_i16_vec, i16, SampleFormat::Int);
    typed_copy!(to_i32_vec, i32, SampleFormat::Int);
    typed_copy!(to_i64_vec, i64, SampleFormat::Int);
    typed_copy!(to_f32_vec, f32, SampleFormat::IEEEFP);
    typed_copy!(to_f64_vec, f64, SampleFormat::IEEEFP);
}
