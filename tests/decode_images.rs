extern crate tiff_ingest;

mod common;

use std::io::Cursor;

use common::{pattern_f32, pattern_u16, pattern_u8, Compression, Layout, TiffBuilder};
use tiff_ingest::tags::{PhotometricInterpretation, SampleFormat, Tag};
use tiff_ingest::{
    CancelToken, ImageDescriptor, Limits, Reader, ReaderOptions, TiffError, TiffUnsupportedError,
    UsageError,
};

const SIZE: u32 = 256;

fn open(bytes: Vec<u8>) -> Reader<Cursor<Vec<u8>>> {
    Reader::open(Cursor::new(bytes)).expect("Cannot open test image")
}

/// Builds the image, decodes it and checks the pixels against the input samples.
fn roundtrip(builder: &TiffBuilder, samples: &[u8]) -> Reader<Cursor<Vec<u8>>> {
    let fixture = builder.build(samples);
    let mut reader = open(fixture.bytes);
    let pixels = reader.decode().expect("Cannot decode test image");
    assert_eq!(pixels.width(), builder.width);
    assert_eq!(pixels.height(), builder.height);
    assert_eq!(pixels.as_bytes(), samples);
    reader
}

fn crop(
    samples: &[u8],
    width: u32,
    pixel_bytes: usize,
    rows: std::ops::Range<u32>,
    cols: std::ops::Range<u32>,
) -> Vec<u8> {
    let mut out = Vec::new();
    for y in rows {
        let start = (y as usize * width as usize + cols.start as usize) * pixel_bytes;
        let end = (y as usize * width as usize + cols.end as usize) * pixel_bytes;
        out.extend_from_slice(&samples[start..end]);
    }
    out
}

/// Checks geometry, layout and color model of an opened image against what was written.
fn assert_descriptor(
    descriptor: &ImageDescriptor,
    builder: &TiffBuilder,
    photometric: PhotometricInterpretation,
) {
    assert_eq!(descriptor.width, builder.width);
    assert_eq!(descriptor.height, builder.height);
    assert_eq!(descriptor.bits_per_sample, builder.bits_per_sample);
    assert_eq!(descriptor.samples_per_pixel, builder.samples_per_pixel);
    assert_eq!(descriptor.photometric, photometric);

    match builder.layout {
        Layout::Tiles(tile_width, tile_height) => {
            assert!(descriptor.is_tiled());
            assert_eq!(descriptor.tile_width(), tile_width);
            assert_eq!(descriptor.tile_height(), tile_height);
            assert_eq!(descriptor.rows_per_strip(), None);
        }
        Layout::Strips(rows) => {
            assert!(!descriptor.is_tiled());
            assert_eq!(descriptor.tile_width(), 0);
            assert_eq!(descriptor.tile_height(), 0);
            assert_eq!(descriptor.rows_per_strip(), Some(rows.min(builder.height)));
        }
    }
}

fn assert_alpha(descriptor: &ImageDescriptor, premultiplied: bool) {
    assert!(descriptor.has_alpha);
    assert_eq!(descriptor.premultiplied_alpha, premultiplied);
}

fn assert_no_alpha(descriptor: &ImageDescriptor) {
    assert!(!descriptor.has_alpha);
    assert!(!descriptor.premultiplied_alpha);
}

fn both_layouts(builder: TiffBuilder) -> [TiffBuilder; 2] {
    [
        builder.clone().layout(Layout::Strips(32)),
        builder.layout(Layout::Tiles(SIZE, SIZE)),
    ]
}

#[test]
fn test_rgba8() {
    let samples = pattern_u8(SIZE, SIZE, 4);
    for builder in both_layouts(TiffBuilder::new(SIZE, SIZE, 4, 8).extra_samples(&[2])) {
        let reader = roundtrip(&builder, &samples);
        let descriptor = reader.descriptor();
        assert_descriptor(descriptor, &builder, PhotometricInterpretation::RGB);
        assert_alpha(descriptor, false);
    }
}

#[test]
fn test_rgb8() {
    let samples = pattern_u8(SIZE, SIZE, 3);
    for builder in both_layouts(TiffBuilder::new(SIZE, SIZE, 3, 8)) {
        let reader = roundtrip(&builder, &samples);
        let descriptor = reader.descriptor();
        assert_descriptor(descriptor, &builder, PhotometricInterpretation::RGB);
        assert_no_alpha(descriptor);
        assert_eq!(descriptor.image_bytes().unwrap(), samples.len());
    }
}

#[test]
fn test_gray8() {
    let samples = pattern_u8(SIZE, SIZE, 1);
    for builder in both_layouts(TiffBuilder::new(SIZE, SIZE, 1, 8)) {
        let reader = roundtrip(&builder, &samples);
        let descriptor = reader.descriptor();
        assert_descriptor(descriptor, &builder, PhotometricInterpretation::BlackIsZero);
        assert_no_alpha(descriptor);
    }
}

#[test]
fn test_gray16() {
    let samples = pattern_u16(SIZE, SIZE, 1);
    for builder in both_layouts(TiffBuilder::new(SIZE, SIZE, 1, 16)) {
        let mut reader = open(builder.build(&samples).bytes);
        assert_descriptor(
            reader.descriptor(),
            &builder,
            PhotometricInterpretation::BlackIsZero,
        );
        assert_no_alpha(reader.descriptor());

        let pixels = reader.decode().unwrap();
        let expected: Vec<u16> = samples
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(pixels.to_u16_vec(), Some(expected));
    }
}

#[test]
fn test_gray32f() {
    let samples = pattern_f32(SIZE, SIZE, 1);
    let mut builder = TiffBuilder::new(SIZE, SIZE, 1, 32);
    builder.sample_format = 3;
    for builder in both_layouts(builder) {
        let mut reader = open(builder.build(&samples).bytes);
        assert_descriptor(
            reader.descriptor(),
            &builder,
            PhotometricInterpretation::BlackIsZero,
        );
        assert_no_alpha(reader.descriptor());
        assert_eq!(reader.descriptor().sample_format, SampleFormat::IEEEFP);

        let pixels = reader.decode().unwrap();
        let values = pixels.to_f32_vec().unwrap();
        assert_eq!(values[0], -100.0);
        assert_eq!(values[5], -98.75);
        assert_eq!(pixels.as_bytes(), &samples[..]);
    }
}

#[test]
fn descriptor_is_stable() {
    let samples = pattern_u8(64, 48, 3);
    let builder = TiffBuilder::new(64, 48, 3, 8).layout(Layout::Tiles(32, 16));
    let mut reader = open(builder.build(&samples).bytes);

    let before = reader.descriptor().clone();
    assert!(before.is_tiled());
    assert_eq!((before.tile_width(), before.tile_height()), (32, 16));

    reader.decode().unwrap();
    assert_eq!(reader.descriptor(), &before);
    assert_eq!(reader.descriptor(), &before);
}

#[test]
fn single_strip_compressions() {
    let samples = pattern_u8(40, 30, 3);
    for compression in [
        Compression::None,
        Compression::Deflate,
        Compression::Lzw,
        Compression::PackBits,
    ] {
        let builder = TiffBuilder::new(40, 30, 3, 8).compression(compression);
        let reader = roundtrip(&builder, &samples);
        assert_eq!(reader.descriptor().rows_per_strip(), Some(30));
        assert_eq!(reader.blocks().unwrap().len(), 1);
    }
}

#[test]
fn compressed_tiles() {
    let samples = pattern_u16(70, 50, 1);
    for compression in [Compression::Deflate, Compression::Lzw, Compression::PackBits] {
        let builder = TiffBuilder::new(70, 50, 1, 16)
            .layout(Layout::Tiles(32, 32))
            .compression(compression);
        roundtrip(&builder, &samples);
    }
}

#[test]
fn truncated_block_data() {
    let samples = pattern_u8(32, 32, 1);
    let fixture = TiffBuilder::new(32, 32, 1, 8)
        .layout(Layout::Strips(8))
        .build(&samples);
    let mut bytes = fixture.bytes;
    bytes.truncate(fixture.data_start);

    let mut reader = open(bytes);
    assert_eq!(reader.descriptor().width, 32);
    match reader.decode() {
        Err(TiffError::TruncatedData(offset, length, available)) => {
            assert_eq!(offset, fixture.data_start as u64);
            assert_eq!(length, 8 * 32);
            assert_eq!(available, fixture.data_start as u64);
        }
        other => panic!("expected truncated data, got {other:?}"),
    }
}

#[test]
fn short_offset_table() {
    let samples = pattern_u8(32, 32, 1);
    let mut builder = TiffBuilder::new(32, 32, 1, 8).layout(Layout::Strips(8));
    builder.short_offsets = true;

    let mut reader = open(builder.build(&samples).bytes);
    assert!(matches!(
        reader.decode(),
        Err(TiffError::InconsistentBlockTable(Tag::StripOffsets, 4, 3))
    ));
    assert!(reader.blocks().is_err());
}

#[test]
fn planar_configurations() {
    let samples = pattern_u8(50, 20, 3);
    for layout in [Layout::Strips(7), Layout::Tiles(16, 16)] {
        let builder = TiffBuilder::new(50, 20, 3, 8).layout(layout).planar();
        let reader = roundtrip(&builder, &samples);
        let blocks = reader.blocks().unwrap();
        assert_eq!(blocks.last().unwrap().plane, 2);
    }

    let samples = pattern_u16(33, 17, 4);
    let builder = TiffBuilder::new(33, 17, 4, 16)
        .extra_samples(&[2])
        .layout(Layout::Tiles(16, 16))
        .planar()
        .big_endian();
    roundtrip(&builder, &samples);
}

#[test]
fn edge_tiles_are_clipped() {
    let samples = pattern_u8(100, 70, 3);
    let builder = TiffBuilder::new(100, 70, 3, 8).layout(Layout::Tiles(64, 64));
    let reader = roundtrip(&builder, &samples);

    let blocks = reader.blocks().unwrap();
    assert_eq!(blocks.len(), 4);
    let corner = blocks[3];
    assert_eq!((corner.x, corner.y), (64, 64));
    assert_eq!((corner.width, corner.height), (36, 6));
}

#[test]
fn regions() {
    let samples = pattern_u8(100, 70, 3);
    for layout in [Layout::Tiles(16, 16), Layout::Strips(10)] {
        let builder = TiffBuilder::new(100, 70, 3, 8).layout(layout);
        let mut reader = open(builder.build(&samples).bytes);

        for (rows, cols) in [(0..70, 0..100), (5..37, 17..18), (64..70, 90..100)] {
            let pixels = reader.decode_region(rows.clone(), cols.clone()).unwrap();
            assert_eq!(pixels.width(), cols.end - cols.start);
            assert_eq!(pixels.height(), rows.end - rows.start);
            assert_eq!(pixels.as_bytes(), crop(&samples, 100, 3, rows, cols));
        }
    }
}

#[test]
fn invalid_regions() {
    let samples = pattern_u8(20, 20, 1);
    let mut reader = open(TiffBuilder::new(20, 20, 1, 8).build(&samples).bytes);
    for (rows, cols) in [(0..0, 0..20), (0..21, 0..20), (3..3, 0..1), (0..1, 19..21)] {
        assert!(matches!(
            reader.decode_region(rows, cols),
            Err(TiffError::UsageError(UsageError::InvalidRegion(..)))
        ));
    }
}

#[test]
fn big_endian_files() {
    let samples = pattern_u16(30, 20, 3);
    for layout in [Layout::Strips(6), Layout::Tiles(16, 16)] {
        let builder = TiffBuilder::new(30, 20, 3, 16)
            .layout(layout)
            .compression(Compression::Deflate)
            .big_endian();
        roundtrip(&builder, &samples);
    }
}

#[test]
fn missing_photometric() {
    let samples = pattern_u8(8, 8, 1);
    let mut builder = TiffBuilder::new(8, 8, 1, 8);
    builder.photometric = None;
    assert!(matches!(
        Reader::open(Cursor::new(builder.build(&samples).bytes)),
        Err(TiffError::MissingRequiredTag(Tag::PhotometricInterpretation))
    ));
}

#[test]
fn palette_is_unsupported() {
    let samples = pattern_u8(8, 8, 1);
    let mut builder = TiffBuilder::new(8, 8, 1, 8);
    builder.photometric = Some(3);
    assert!(matches!(
        Reader::open(Cursor::new(builder.build(&samples).bytes)),
        Err(TiffError::UnsupportedEncoding(
            TiffUnsupportedError::Photometric(PhotometricInterpretation::RGBPalette)
        ))
    ));
}

#[test]
fn alpha_rules() {
    let samples = pattern_u8(8, 8, 4);
    let reader = open(
        TiffBuilder::new(8, 8, 4, 8)
            .extra_samples(&[1])
            .build(&samples)
            .bytes,
    );
    assert_alpha(reader.descriptor(), true);

    let reader = open(
        TiffBuilder::new(8, 8, 4, 8)
            .extra_samples(&[0])
            .build(&samples)
            .bytes,
    );
    assert_no_alpha(reader.descriptor());

    let gray_alpha = pattern_u8(8, 8, 2);
    let builder = TiffBuilder::new(8, 8, 2, 8).extra_samples(&[2]);
    let reader = roundtrip(&builder, &gray_alpha);
    assert_descriptor(
        reader.descriptor(),
        &builder,
        PhotometricInterpretation::BlackIsZero,
    );
    assert_alpha(reader.descriptor(), false);
}

#[test]
fn padded_last_strip() {
    let samples = pattern_u8(16, 10, 1);
    let mut builder = TiffBuilder::new(16, 10, 1, 8)
        .layout(Layout::Strips(4))
        .compression(Compression::Deflate);
    builder.pad_last_strip = true;
    roundtrip(&builder, &samples);
}

#[test]
fn horizontal_predictor() {
    let samples = pattern_u8(37, 21, 3);
    for layout in [Layout::Strips(5), Layout::Tiles(16, 16)] {
        let mut builder = TiffBuilder::new(37, 21, 3, 8)
            .layout(layout)
            .compression(Compression::Lzw);
        builder.horizontal_predictor = true;
        roundtrip(&builder, &samples);
    }
}

#[test]
fn cancelled_decode() {
    let samples = pattern_u8(64, 64, 1);
    let builder = TiffBuilder::new(64, 64, 1, 8).layout(Layout::Tiles(16, 16));
    let mut reader = open(builder.build(&samples).bytes);

    let cancel = CancelToken::new();
    cancel.cancel();
    assert!(matches!(
        reader.decode_with(&cancel),
        Err(TiffError::Cancelled)
    ));

    // The reader stays usable.
    assert_eq!(reader.decode().unwrap().as_bytes(), &samples[..]);
}

#[test]
fn dedicated_worker_pool() {
    let samples = pattern_u8(64, 64, 3);
    let builder = TiffBuilder::new(64, 64, 3, 8)
        .layout(Layout::Tiles(16, 16))
        .compression(Compression::Deflate);
    let mut reader = ReaderOptions::new()
        .with_threads(2)
        .open(Cursor::new(builder.build(&samples).bytes))
        .unwrap();
    assert_eq!(reader.decode().unwrap().as_bytes(), &samples[..]);
}

#[test]
fn decoding_buffer_limit() {
    let samples = pattern_u8(64, 64, 3);
    let builder = TiffBuilder::new(64, 64, 3, 8);
    let mut limits = Limits::default();
    limits.decoding_buffer_size = 64 * 64 * 3 - 1;
    let mut reader = ReaderOptions::new()
        .with_limits(limits)
        .open(Cursor::new(builder.build(&samples).bytes))
        .unwrap();

    assert!(matches!(reader.decode(), Err(TiffError::LimitsExceeded)));
    assert!(reader.decode_region(0..10, 0..10).is_ok());
}
