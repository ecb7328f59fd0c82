#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut limits = tiff_ingest::Limits::default();
    limits.decoding_buffer_size = 1_000_000;
    limits.ifd_value_size = 1_000_000;
    limits.intermediate_buffer_size = 1_000_000;

    let options = tiff_ingest::ReaderOptions::new()
        .with_limits(limits)
        .with_threads(1);
    let mut reader = match options.open(std::io::Cursor::new(data)) {
        Ok(reader) => reader,
        Err(_) => return,
    };

    let _ = reader.decode();
});
