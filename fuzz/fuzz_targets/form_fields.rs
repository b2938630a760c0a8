#![no_main]

use arbitrary::Arbitrary;
use image_compressor::request::{CompressionRequest, FormField};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Field {
    name: u8,
    value: String,
}

const NAMES: [&str; 15] = [
    "quality",
    "trimEnabled",
    "trimMode",
    "resizeEnabled",
    "resizeMode",
    "resizeWidth",
    "resizeHeight",
    "resizePercentage",
    "evenDimensionsEnabled",
    "evenDimensionsMode",
    "paddingWidthSide",
    "paddingHeightSide",
    "appendFilenameEnabled",
    "appendFilenameText",
    "image",
];

fuzz_target!(|fields: Vec<Field>| {
    let mut form: Vec<FormField> = fields
        .into_iter()
        .map(|f| FormField::text(NAMES[f.name as usize % NAMES.len()], f.value))
        .collect();
    form.push(FormField::file("image", vec![0u8; 4], "image/png", None));

    let request = CompressionRequest::from_fields(form).expect("image field is present");
    let options = request.options;
    assert!((1..=100).contains(&options.quality));
    if let Some(p) = options.resize_percentage {
        assert!((1..=400).contains(&p));
    }
    assert_ne!(options.resize_width, Some(0));
    assert_ne!(options.resize_height, Some(0));
});
