#![no_main]

use image_compressor::engine::{decode_image, detect_exif_orientation};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Both must return errors for garbage, never panic
    let _ = detect_exif_orientation(data);
    let _ = decode_image(data);
});
