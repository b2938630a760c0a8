#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use image::{DynamicImage, RgbaImage};
use image_compressor::engine::{make_even, plan_resize, resize_exact, trim};
use image_compressor::ops::{
    EvenDimensionsMode, HeightSide, ProcessingOptions, ResizeMode, TrimMode, WidthSide,
};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct StageSeed {
    width: u8,
    height: u8,
    trim: Option<u8>,
    percentage: Option<u16>,
    resize_width: Option<u16>,
    resize_height: Option<u16>,
    even: Option<(bool, bool, bool)>,
}

fn build_image(data: &[u8], width: u8, height: u8) -> DynamicImage {
    let w = (width as u32 % 64).max(1);
    let h = (height as u32 % 64).max(1);
    let buffer: Vec<u8> = (0..(w * h * 4) as usize)
        .map(|i| data.get(i % data.len().max(1)).copied().unwrap_or(0))
        .collect();
    let rgba = RgbaImage::from_raw(w, h, buffer)
        .unwrap_or_else(|| RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 255])));
    DynamicImage::ImageRgba8(rgba)
}

fuzz_target!(|data: &[u8]| {
    let mut unstructured = Unstructured::new(data);
    let seed = match StageSeed::arbitrary(&mut unstructured) {
        Ok(seed) => seed,
        Err(_) => return,
    };
    let mut img = build_image(data, seed.width, seed.height);

    if let Some(mode) = seed.trim {
        let mode = match mode % 3 {
            0 => TrimMode::Transparency,
            1 => TrimMode::White,
            _ => TrimMode::Both,
        };
        img = trim(img, mode);
    }

    let opts = ProcessingOptions {
        resize_enabled: true,
        resize_mode: if seed.percentage.is_some() {
            ResizeMode::Percentage
        } else {
            ResizeMode::Manual
        },
        resize_percentage: seed.percentage.map(|p| u32::from(p % 401)),
        resize_width: seed.resize_width.map(|w| u32::from(w % 512)),
        resize_height: seed.resize_height.map(|h| u32::from(h % 512)),
        ..Default::default()
    };
    if let Ok(Some(plan)) = plan_resize((img.width(), img.height()), &opts) {
        match resize_exact(img, plan.width, plan.height) {
            Ok(resized) => img = resized,
            Err(_) => return,
        }
    }

    if let Some((remove, right, top)) = seed.even {
        let mode = if remove {
            EvenDimensionsMode::Remove
        } else {
            EvenDimensionsMode::Add
        };
        let wside = if right { WidthSide::Right } else { WidthSide::Left };
        let hside = if top { HeightSide::Top } else { HeightSide::Bottom };
        if let Ok((out, _)) = make_even(img, mode, wside, hside, !remove) {
            assert_eq!(out.width() % 2, 0);
            assert_eq!(out.height() % 2, 0);
        }
    }
});
