//! A minimal TIFF writer for synthesizing test images in memory.
#![allow(dead_code)]

use std::io::Write;

#[derive(Clone, Copy, Debug)]
pub enum Layout {
    Strips(u32),
    Tiles(u32, u32),
}

#[derive(Clone, Copy, Debug)]
pub enum Compression {
    None,
    Deflate,
    Lzw,
    PackBits,
}

impl Compression {
    fn code(self) -> u32 {
        match self {
            Compression::None => 1,
            Compression::Lzw => 5,
            Compression::Deflate => 8,
            Compression::PackBits => 0x8005,
        }
    }

    fn compress(self, data: Vec<u8>) -> Vec<u8> {
        match self {
            Compression::None => data,
            Compression::Deflate => {
                let mut encoder =
                    flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(&data).unwrap();
                encoder.finish().unwrap()
            }
            Compression::Lzw => {
                weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
                    .encode(&data)
                    .unwrap()
            }
            Compression::PackBits => {
                // Literal runs only, which every PackBits reader has to handle.
                let mut out = Vec::new();
                for chunk in data.chunks(128) {
                    out.push((chunk.len() - 1) as u8);
                    out.extend_from_slice(chunk);
                }
                out
            }
        }
    }
}

/// A TIFF file together with the position of its first block.
pub struct Fixture {
    pub bytes: Vec<u8>,
    pub data_start: usize,
}

/// Describes the image to write. Samples are passed chunky and in native byte order.
#[derive(Clone, Debug)]
pub struct TiffBuilder {
    pub big_endian: bool,
    pub width: u32,
    pub height: u32,
    pub bits_per_sample: u16,
    pub samples_per_pixel: u16,
    pub sample_format: u16,
    pub photometric: Option<u16>,
    pub extra_samples: Vec<u16>,
    pub planar: bool,
    pub layout: Layout,
    pub compression: Compression,
    /// Horizontal differencing, 8-bit samples only.
    pub horizontal_predictor: bool,
    /// Write the last strip with all `rows_per_strip` rows.
    pub pad_last_strip: bool,
    /// Leave the last entry out of the offset table.
    pub short_offsets: bool,
}

impl TiffBuilder {
    pub fn new(width: u32, height: u32, samples_per_pixel: u16, bits_per_sample: u16) -> Self {
        TiffBuilder {
            big_endian: false,
            width,
            height,
            bits_per_sample,
            samples_per_pixel,
            sample_format: 1,
            photometric: Some(if samples_per_pixel >= 3 { 2 } else { 1 }),
            extra_samples: vec![],
            planar: false,
            layout: Layout::Strips(height),
            compression: Compression::None,
            horizontal_predictor: false,
            pad_last_strip: false,
            short_offsets: false,
        }
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn planar(mut self) -> Self {
        self.planar = true;
        self
    }

    pub fn extra_samples(mut self, extra: &[u16]) -> Self {
        self.extra_samples = extra.to_vec();
        self
    }

    fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Block dimensions and grid size.
    fn grid(&self) -> (u32, u32, u32, u32) {
        let (bw, bh) = match self.layout {
            Layout::Strips(rows) => (self.width, rows),
            Layout::Tiles(tw, th) => (tw, th),
        };
        (bw, bh, self.width.div_ceil(bw), self.height.div_ceil(bh))
    }

    fn u16_bytes(&self, v: u16) -> [u8; 2] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    fn u32_bytes(&self, v: u32) -> [u8; 4] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    /// Cuts the image into blocks in the order of the offset table.
    fn blocks(&self, samples: &[u8]) -> Vec<Vec<u8>> {
        let bps = self.bytes_per_sample();
        let spp = usize::from(self.samples_per_pixel);
        assert_eq!(
            samples.len(),
            self.width as usize * self.height as usize * spp * bps
        );

        let (bw, bh, across, down) = self.grid();
        let planes = if self.planar { spp } else { 1 };
        let block_samples = spp / planes;
        let swap = self.big_endian != cfg!(target_endian = "big");

        let mut blocks = Vec::new();
        for plane in 0..planes {
            for row in 0..down {
                for col in 0..across {
                    let x0 = col * bw;
                    let y0 = row * bh;
                    let rows = match self.layout {
                        Layout::Tiles(..) => bh,
                        Layout::Strips(_) if self.pad_last_strip => bh,
                        Layout::Strips(_) => bh.min(self.height - y0),
                    };

                    let mut data = Vec::new();
                    for y in y0..y0 + rows {
                        let mut line = Vec::new();
                        for x in x0..x0 + bw {
                            for s in 0..block_samples {
                                let sample = plane + s;
                                if x < self.width && y < self.height {
                                    let at = ((y as usize * self.width as usize + x as usize)
                                        * spp
                                        + sample)
                                        * bps;
                                    let mut value = samples[at..at + bps].to_vec();
                                    if swap {
                                        value.reverse();
                                    }
                                    line.extend(value);
                                } else {
                                    line.extend(std::iter::repeat(0).take(bps));
                                }
                            }
                        }
                        if self.horizontal_predictor {
                            assert_eq!(bps, 1);
                            for i in (block_samples..line.len()).rev() {
                                line[i] = line[i].wrapping_sub(line[i - block_samples]);
                            }
                        }
                        data.extend(line);
                    }
                    blocks.push(self.compression.compress(data));
                }
            }
        }
        blocks
    }

    pub fn build(&self, samples: &[u8]) -> Fixture {
        const SHORT: u16 = 3;
        const LONG: u16 = 4;

        let blocks = self.blocks(samples);
        let mut offsets_len = blocks.len();
        if self.short_offsets {
            offsets_len -= 1;
        }
        let spp = usize::from(self.samples_per_pixel);

        let (offsets_tag, counts_tag) = match self.layout {
            Layout::Strips(_) => (273, 279),
            Layout::Tiles(..) => (324, 325),
        };

        // (tag, type, values), offsets are patched in once the layout is known.
        let mut entries: Vec<(u16, u16, Vec<u32>)> = vec![
            (256, LONG, vec![self.width]),
            (257, LONG, vec![self.height]),
            (258, SHORT, vec![u32::from(self.bits_per_sample); spp]),
            (259, SHORT, vec![self.compression.code()]),
            (277, SHORT, vec![u32::from(self.samples_per_pixel)]),
            (284, SHORT, vec![if self.planar { 2 } else { 1 }]),
            (339, SHORT, vec![u32::from(self.sample_format); spp]),
            (offsets_tag, LONG, vec![0; offsets_len]),
            (
                counts_tag,
                LONG,
                blocks.iter().map(|b| b.len() as u32).collect(),
            ),
        ];
        if let Some(photometric) = self.photometric {
            entries.push((262, SHORT, vec![u32::from(photometric)]));
        }
        if !self.extra_samples.is_empty() {
            entries.push((
                338,
                SHORT,
                self.extra_samples.iter().map(|&v| u32::from(v)).collect(),
            ));
        }
        if self.horizontal_predictor {
            entries.push((317, SHORT, vec![2]));
        }
        match self.layout {
            Layout::Strips(rows) => entries.push((278, LONG, vec![rows])),
            Layout::Tiles(tw, th) => {
                entries.push((322, LONG, vec![tw]));
                entries.push((323, LONG, vec![th]));
            }
        }
        entries.sort_by_key(|e| e.0);

        let value_len = |ty: u16, count: usize| count * if ty == SHORT { 2 } else { 4 };
        let ifd_len = 2 + 12 * entries.len() + 4;
        let external_len: usize = entries
            .iter()
            .map(|(_, ty, vals)| value_len(*ty, vals.len()))
            .filter(|&len| len > 4)
            .sum();
        let data_start = 8 + ifd_len + external_len;

        let mut position = data_start;
        let block_offsets: Vec<u32> = blocks
            .iter()
            .map(|b| {
                let offset = position as u32;
                position += b.len();
                offset
            })
            .collect();
        for entry in entries.iter_mut() {
            if entry.0 == offsets_tag {
                entry.2 = block_offsets[..offsets_len].to_vec();
            }
        }

        let mut out = Vec::new();
        out.extend_from_slice(if self.big_endian { b"MM" } else { b"II" });
        out.extend_from_slice(&self.u16_bytes(42));
        out.extend_from_slice(&self.u32_bytes(8));

        let mut external = Vec::new();
        let mut external_offset = 8 + ifd_len;
        out.extend_from_slice(&self.u16_bytes(entries.len() as u16));
        for (tag, ty, vals) in &entries {
            let mut value = Vec::new();
            for &v in vals {
                if *ty == SHORT {
                    value.extend_from_slice(&self.u16_bytes(v as u16));
                } else {
                    value.extend_from_slice(&self.u32_bytes(v));
                }
            }

            out.extend_from_slice(&self.u16_bytes(*tag));
            out.extend_from_slice(&self.u16_bytes(*ty));
            out.extend_from_slice(&self.u32_bytes(vals.len() as u32));
            if value.len() <= 4 {
                value.resize(4, 0);
                out.extend_from_slice(&value);
            } else {
                out.extend_from_slice(&self.u32_bytes(external_offset as u32));
                external_offset += value.len();
                external.extend(value);
            }
        }
        out.extend_from_slice(&[0; 4]);
        out.extend(external);
        assert_eq!(out.len(), data_start);

        for block in blocks {
            out.extend(block);
        }

        Fixture {
            bytes: out,
            data_start,
        }
    }
}

/// Deterministic 8-bit samples.
pub fn pattern_u8(width: u32, height: u32, spp: u16) -> Vec<u8> {
    let count = width as usize * height as usize * usize::from(spp);
    (0..count).map(|i| (i * 7 + i / 251) as u8).collect()
}

/// Deterministic 16-bit samples in native byte order.
pub fn pattern_u16(width: u32, height: u32, spp: u16) -> Vec<u8> {
    let count = width as usize * height as usize * usize::from(spp);
    (0..count)
        .flat_map(|i| ((i * 263) as u16).to_ne_bytes())
        .collect()
}

/// Deterministic 32-bit float samples in native byte order.
pub fn pattern_f32(width: u32, height: u32, spp: u16) -> Vec<u8> {
    let count = width as usize * height as usize * usize::from(spp);
    (0..count)
        .flat_map(|i| (i as f32 * 0.25 - 100.0).to_ne_bytes())
        .collect()
}
