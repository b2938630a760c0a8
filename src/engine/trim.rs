// src/engine/trim.rs
//
// Border trimming. A border row/column is one in which every pixel matches
// the border predicate:
// - transparency: alpha == 0
// - white: opaque #FFFFFF (alpha == 255)
//
// `Both` runs the transparency pass, crops into a fresh owned buffer, and
// only then runs the white pass against that buffer. The passes are never
// merged into one predicate.

use crate::ops::TrimMode;
use image::{DynamicImage, GenericImageView, Rgba};

/// Pixel rectangle kept after trimming.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    fn covers(&self, width: u32, height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == width && self.height == height
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Border {
    Transparent,
    White,
}

impl Border {
    #[inline]
    fn matches(self, px: Rgba<u8>) -> bool {
        match self {
            Border::Transparent => px.0[3] == 0,
            Border::White => px.0 == [255, 255, 255, 255],
        }
    }
}

/// Find the smallest rectangle containing every non-border pixel.
///
/// Returns None when the whole image is border (nothing would remain).
pub fn content_bounds(img: &DynamicImage, border: Border) -> Option<Bounds> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    // A fully opaque image cannot have a transparent border.
    if border == Border::Transparent && !img.color().has_alpha() {
        return Some(Bounds {
            x: 0,
            y: 0,
            width,
            height,
        });
    }

    let rgba;
    let view = match img {
        DynamicImage::ImageRgba8(buf) => buf,
        other => {
            rgba = other.to_rgba8();
            &rgba
        }
    };
    let is_border_row = |y: u32| (0..width).all(|x| border.matches(*view.get_pixel(x, y)));

    let top = (0..height).find(|&y| !is_border_row(y))?;
    let bottom = (top..height).rev().find(|&y| !is_border_row(y))?;

    let is_border_col =
        |x: u32| (top..=bottom).all(|y| border.matches(*view.get_pixel(x, y)));
    let left = (0..width).find(|&x| !is_border_col(x))?;
    let right = (left..width).rev().find(|&x| !is_border_col(x))?;

    Some(Bounds {
        x: left,
        y: top,
        width: right - left + 1,
        height: bottom - top + 1,
    })
}

/// One trim pass. The image is returned untouched when there is no border
/// or when it is all border.
pub fn trim_pass(img: DynamicImage, border: Border) -> DynamicImage {
    let (width, height) = img.dimensions();
    match content_bounds(&img, border) {
        Some(b) if !b.covers(width, height) => img.crop_imm(b.x, b.y, b.width, b.height),
        _ => img,
    }
}

/// Apply the trim stage for `mode`.
pub fn trim(img: DynamicImage, mode: TrimMode) -> DynamicImage {
    match mode {
        TrimMode::Transparency => trim_pass(img, Border::Transparent),
        TrimMode::White => trim_pass(img, Border::White),
        TrimMode::Both => {
            let materialized = trim_pass(img, Border::Transparent);
            trim_pass(materialized, Border::White)
        }
    }
}
