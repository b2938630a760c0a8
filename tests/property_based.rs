use image::{DynamicImage, GenericImageView, Rgba, RgbaImage, RgbImage};
use image_compressor::engine::{
    calc_resize_dimensions, make_even, plan_resize, resize_exact, trim, trim_pass, Border,
};
use image_compressor::ops::{
    EvenDimensionsMode, HeightSide, ProcessingOptions, ResizeMode, TrimMode, WidthSide,
};
use image_compressor::request::parse_int;
use proptest::prelude::*;

fn create_test_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

/// `inner` opaque content surrounded by `pad` transparent pixels on each side.
fn transparent_framed(inner_w: u32, inner_h: u32, pad: (u32, u32, u32, u32)) -> DynamicImage {
    let (left, top, right, bottom) = pad;
    let (w, h) = (inner_w + left + right, inner_h + top + bottom);
    DynamicImage::ImageRgba8(RgbaImage::from_fn(w, h, |x, y| {
        if x >= left && x < left + inner_w && y >= top && y < top + inner_h {
            Rgba([30, 60, 90, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    }))
}

fn side_strategy() -> impl Strategy<Value = (WidthSide, HeightSide)> {
    (
        prop_oneof![Just(WidthSide::Left), Just(WidthSide::Right)],
        prop_oneof![Just(HeightSide::Top), Just(HeightSide::Bottom)],
    )
}

fn padding_strategy() -> impl Strategy<Value = (u32, u32, u32, u32)> {
    (0u32..=6, 0u32..=6, 0u32..=6, 0u32..=6)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_even_add_always_even(
        w in 1u32..=48,
        h in 1u32..=48,
        (wside, hside) in side_strategy(),
        transparent in any::<bool>(),
    ) {
        let (out, adjustment) = make_even(
            create_test_image(w, h),
            EvenDimensionsMode::Add,
            wside,
            hside,
            transparent,
        ).unwrap();
        let (ow, oh) = out.dimensions();
        prop_assert_eq!(ow % 2, 0);
        prop_assert_eq!(oh % 2, 0);
        prop_assert_eq!(ow, if w % 2 == 1 { w + 1 } else { w });
        prop_assert_eq!(oh, if h % 2 == 1 { h + 1 } else { h });
        prop_assert_eq!(adjustment.is_some(), w % 2 == 1 || h % 2 == 1);
    }

    #[test]
    fn prop_even_remove_always_even(
        w in 2u32..=48,
        h in 2u32..=48,
        (wside, hside) in side_strategy(),
    ) {
        let (out, _) = make_even(
            create_test_image(w, h),
            EvenDimensionsMode::Remove,
            wside,
            hside,
            false,
        ).unwrap();
        let (ow, oh) = out.dimensions();
        prop_assert_eq!(ow, if w % 2 == 1 { w - 1 } else { w });
        prop_assert_eq!(oh, if h % 2 == 1 { h - 1 } else { h });
    }

    #[test]
    fn prop_manual_fill_hits_exact_dimensions(
        orig_w in 1u32..=48,
        orig_h in 1u32..=48,
        target_w in 1u32..=96,
        target_h in 1u32..=96,
    ) {
        let (w, h) = calc_resize_dimensions(orig_w, orig_h, Some(target_w), Some(target_h));
        prop_assert_eq!((w, h), (target_w, target_h));
        let resized = resize_exact(create_test_image(orig_w, orig_h), w, h).unwrap();
        prop_assert_eq!(resized.dimensions(), (target_w, target_h));
    }

    #[test]
    fn prop_single_axis_resize_keeps_requested_axis(
        orig_w in 1u32..=200,
        orig_h in 1u32..=200,
        target in 1u32..=400,
    ) {
        let (w, h) = calc_resize_dimensions(orig_w, orig_h, Some(target), None);
        prop_assert_eq!(w, target);
        prop_assert!(h >= 1);
        let (w, h) = calc_resize_dimensions(orig_w, orig_h, None, Some(target));
        prop_assert_eq!(h, target);
        prop_assert!(w >= 1);
    }

    #[test]
    fn prop_full_percentage_is_identity(w in 1u32..=4000, h in 1u32..=4000) {
        let opts = ProcessingOptions {
            resize_enabled: true,
            resize_mode: ResizeMode::Percentage,
            resize_percentage: Some(100),
            ..Default::default()
        };
        let plan = plan_resize((w, h), &opts).unwrap().unwrap();
        prop_assert_eq!((plan.width, plan.height), (w, h));
    }

    #[test]
    fn prop_percentage_never_below_one_pixel(
        w in 1u32..=64,
        h in 1u32..=64,
        pct in 1u32..=400,
    ) {
        let opts = ProcessingOptions {
            resize_enabled: true,
            resize_mode: ResizeMode::Percentage,
            resize_percentage: Some(pct),
            ..Default::default()
        };
        let plan = plan_resize((w, h), &opts).unwrap().unwrap();
        prop_assert!(plan.width >= 1 && plan.height >= 1);
    }

    #[test]
    fn prop_transparent_trim_finds_content(
        inner_w in 1u32..=12,
        inner_h in 1u32..=12,
        pad in padding_strategy(),
    ) {
        let img = transparent_framed(inner_w, inner_h, pad);
        let trimmed = trim(img, TrimMode::Transparency);
        prop_assert_eq!(trimmed.dimensions(), (inner_w, inner_h));
    }

    #[test]
    fn prop_both_trim_on_transparent_frame_is_idempotent(
        inner_w in 1u32..=12,
        inner_h in 1u32..=12,
        pad in padding_strategy(),
    ) {
        let img = transparent_framed(inner_w, inner_h, pad);
        let once = trim(img, TrimMode::Both);
        // The white pass has nothing to remove
        let white_only = trim_pass(once.clone(), Border::White);
        prop_assert_eq!(white_only.dimensions(), once.dimensions());
        let twice = trim(once.clone(), TrimMode::Both);
        prop_assert_eq!(twice.dimensions(), once.dimensions());
        prop_assert_eq!(twice.to_rgba8().into_raw(), once.to_rgba8().into_raw());
    }

    #[test]
    fn prop_parse_int_matches_plain_integers(n in -100_000i64..=100_000) {
        prop_assert_eq!(parse_int(&n.to_string()), Some(n));
        prop_assert_eq!(parse_int(&format!("{n}px")), Some(n));
    }

    #[test]
    fn prop_parse_int_never_panics(s in ".*") {
        let _ = parse_int(&s);
    }
}
