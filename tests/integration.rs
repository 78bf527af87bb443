use std::sync::atomic::AtomicBool;

use image::{GrayImage, Luma};
use irregular_watershed::region::connected_components;
use irregular_watershed::{
    BinaryMask, Connectivity, EdmWatershed, Error, Polarity, ProcessOptions, SeparationEngine,
    ShrinkStrategy, Watershed,
};

fn disk(cx: i64, cy: i64, r: i64) -> impl Fn(u32, u32) -> bool {
    move |x, y| {
        let (dx, dy) = (i64::from(x) - cx, i64::from(y) - cy);
        dx * dx + dy * dy <= r * r
    }
}

/// Two disks joined by a three-pixel-high bar.
fn dumbbell() -> BinaryMask {
    let (a, b) = (disk(12, 14, 10), disk(40, 14, 10));
    BinaryMask::from_fn(53, 29, |x, y| {
        a(x, y) || b(x, y) || ((20..33).contains(&x) && (13..16).contains(&y))
    })
}

/// A solid 60x24 block with a 6-wide, 10-deep bite taken from the top.
fn bitten_block() -> BinaryMask {
    BinaryMask::from_fn(66, 30, |x, y| {
        let block = (3..63).contains(&x) && (3..27).contains(&y);
        let bite = (30..36).contains(&x) && (3..13).contains(&y);
        block && !bite
    })
}

/// Two disks on the main diagonal joined by a three-pixel-wide diagonal bar.
fn diagonal_dumbbell() -> BinaryMask {
    let (a, b) = (disk(14, 14, 10), disk(41, 41, 10));
    BinaryMask::from_fn(56, 56, |x, y| {
        a(x, y) || b(x, y) || (x.abs_diff(y) <= 1 && (20..=35).contains(&x))
    })
}

/// A bitten block rotated by 45 degrees: 69 long, 25 wide, with a bite
/// across the middle of one long side.
fn rotated_bitten_block() -> BinaryMask {
    BinaryMask::from_fn(80, 80, |x, y| {
        let along = i64::from(x) + i64::from(y) - 79;
        let across = i64::from(x) - i64::from(y);
        let block = along.abs() <= 34 && across.abs() <= 12;
        let bite = along.abs() <= 4 && across >= 2;
        block && !bite
    })
}

fn fixed(cycles: u32) -> ProcessOptions {
    ProcessOptions {
        strategy: ShrinkStrategy::from_params(cycles, 0.0).unwrap(),
        ..ProcessOptions::default()
    }
}

#[test]
fn genuine_neck_stays_separated() {
    let mask = dumbbell();
    let split = EdmWatershed::default()
        .split(&mask, Connectivity::Eight)
        .unwrap();
    assert_eq!(connected_components(&split, Connectivity::Eight).len(), 2);

    let engine = SeparationEngine::new();
    let correction = engine.correct(&mask, &fixed(3)).unwrap();

    assert_eq!(correction.mask, split);
    assert_eq!(correction.report.seams, 1);
    assert_eq!(correction.report.artifact_seams, 0);
}

#[test]
fn false_neck_at_indentation_is_healed() {
    let mask = bitten_block();
    let split = EdmWatershed::default()
        .split(&mask, Connectivity::Eight)
        .unwrap();
    assert_eq!(connected_components(&split, Connectivity::Eight).len(), 2);

    let engine = SeparationEngine::new();
    let correction = engine.correct(&mask, &fixed(2)).unwrap();

    assert_eq!(correction.mask, mask);
    assert_eq!(
        connected_components(&correction.mask, Connectivity::Eight).len(),
        1
    );
    assert_eq!(correction.report.artifact_seams, 1);
    assert_eq!(correction.report.separator_pixels, mask.count() - split.count());
}

fn four_connected(opts: ProcessOptions) -> ProcessOptions {
    ProcessOptions {
        connectivity: Connectivity::Four,
        ..opts
    }
}

#[test]
fn genuine_neck_stays_separated_with_four_connectivity() {
    let mask = dumbbell();
    let split = EdmWatershed::default()
        .split(&mask, Connectivity::Four)
        .unwrap();
    assert_eq!(connected_components(&split, Connectivity::Four).len(), 2);

    let correction = SeparationEngine::new()
        .correct(&mask, &four_connected(fixed(3)))
        .unwrap();

    assert_eq!(correction.mask, split);
    assert_eq!(correction.report.seams, 1);
    assert_eq!(correction.report.artifact_seams, 0);
}

#[test]
fn false_neck_is_healed_with_four_connectivity() {
    let mask = bitten_block();
    let correction = SeparationEngine::new()
        .correct(&mask, &four_connected(fixed(2)))
        .unwrap();

    assert_eq!(correction.mask, mask);
    assert_eq!(correction.report.seams, 1);
    assert_eq!(correction.report.artifact_seams, 1);
}

#[test]
fn diagonal_genuine_neck_is_one_seam() {
    let mask = diagonal_dumbbell();
    let split = EdmWatershed::default()
        .split(&mask, Connectivity::Four)
        .unwrap();
    assert_eq!(connected_components(&split, Connectivity::Four).len(), 2);

    let correction = SeparationEngine::new()
        .correct(&mask, &four_connected(fixed(3)))
        .unwrap();

    assert_eq!(correction.mask, split);
    assert_eq!(correction.report.seams, 1);
    assert_eq!(correction.report.artifact_seams, 0);
}

#[test]
fn diagonal_false_necks_are_healed_with_four_connectivity() {
    let mask = rotated_bitten_block();
    let split = EdmWatershed::default()
        .split(&mask, Connectivity::Four)
        .unwrap();
    assert!(connected_components(&split, Connectivity::Four).len() > 1);

    let correction = SeparationEngine::new()
        .correct(&mask, &four_connected(fixed(2)))
        .unwrap();

    assert_eq!(correction.mask, mask);
    assert!(correction.report.seams > 0);
    assert_eq!(correction.report.artifact_seams, correction.report.seams);
    assert_eq!(
        connected_components(&correction.mask, Connectivity::Four).len(),
        1
    );
}

#[test]
fn diagonal_false_neck_is_healed_with_eight_connectivity() {
    let mask = rotated_bitten_block();
    let correction = SeparationEngine::new().correct(&mask, &fixed(2)).unwrap();

    assert_eq!(correction.mask, mask);
    assert_eq!(correction.report.seams, 1);
    assert_eq!(correction.report.artifact_seams, 1);
}

#[test]
fn convexity_driven_core_heals_false_neck() {
    let mask = bitten_block();
    let opts = ProcessOptions {
        strategy: ShrinkStrategy::from_params(1, 0.8).unwrap(),
        ..ProcessOptions::default()
    };

    let correction = SeparationEngine::new().correct(&mask, &opts).unwrap();

    assert_eq!(correction.mask, mask);
    assert_eq!(correction.report.frozen_regions, 1);
}

#[test]
fn inverted_polarity_gives_identical_output() {
    let engine = SeparationEngine::new();
    let bright = bitten_block().to_gray(Polarity::BrightForeground);
    let mut dark = bright.clone();
    image::imageops::invert(&mut dark);

    let opts = fixed(2);
    let dark_opts = ProcessOptions {
        polarity: opts.polarity.inverted(),
        ..fixed(2)
    };

    let (from_bright, _) = engine.correct_image(&bright, &opts).unwrap();
    let (mut from_dark, _) = engine.correct_image(&dark, &dark_opts).unwrap();
    image::imageops::invert(&mut from_dark);

    assert_eq!(from_bright, from_dark);
}

#[test]
fn non_binary_input_is_rejected() {
    let mut img = GrayImage::new(10, 10);
    img.put_pixel(4, 4, Luma([200]));
    let err = SeparationEngine::new()
        .correct_image(&img, &ProcessOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::NotBinary { x: 4, y: 4, value: 200 }));
}

#[test]
fn stack_slices_are_independent() {
    let engine = SeparationEngine::new();
    let good = bitten_block().to_gray(Polarity::BrightForeground);
    let mut bad = good.clone();
    bad.put_pixel(0, 0, Luma([7]));

    let slices = vec![good.clone(), bad, good.clone()];
    let results = engine.correct_stack(&slices, &fixed(2), &AtomicBool::new(false));

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().0, good);
    assert!(results[1].is_err());
    assert_eq!(results[2].as_ref().unwrap().0, good);
}

#[test]
fn process_file_round_trips_through_png() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("dumbbell.png");
    let output = dir.path().join("out").join("dumbbell.png");
    dumbbell()
        .to_gray(Polarity::BrightForeground)
        .save(&input)
        .unwrap();

    let result = SeparationEngine::new().process_file(&input, &output, &fixed(3));
    assert!(result.success, "{}", result.message);

    let written = image::open(&output).unwrap().to_luma8();
    let written = BinaryMask::from_gray(&written, Polarity::BrightForeground).unwrap();
    assert_eq!(connected_components(&written, Connectivity::Eight).len(), 2);
}

#[test]
fn process_directory_skips_unsupported_files() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let mask = bitten_block().to_gray(Polarity::BrightForeground);
    mask.save(dir.path().join("a.png")).unwrap();
    mask.save(dir.path().join("b.bmp")).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a mask").unwrap();

    let results = SeparationEngine::new().process_directory(dir.path(), &out, &fixed(2));

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.success));
    assert!(out.join("a.png").exists());
    assert!(out.join("b.bmp").exists());
}

#[test]
fn process_file_reports_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let result = SeparationEngine::new().process_file(
        &dir.path().join("missing.png"),
        &dir.path().join("out.png"),
        &ProcessOptions::default(),
    );
    assert!(!result.success);
    assert!(result.message.starts_with("Failed to load"));
}
