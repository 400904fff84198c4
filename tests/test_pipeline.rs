// tests/test_pipeline.rs — End-to-end tests of the streaming equalizer.
//
// Frames go in as timed sample streams (via `raster`) and come back out
// as frames, so everything here goes through the public API only.

use clahe_stream::buffers::IDENTITY_LUT;
use clahe_stream::image::{Image, YuvFrame};
use clahe_stream::raster::{process_frames, RasterScan, RasterTiming};
use clahe_stream::reference;
use clahe_stream::tile::TileGrid;
use clahe_stream::{ClaheConfig, ClahePipeline, Controls, Error, Sample};

// ===== Helpers =====

fn pipeline(config: ClaheConfig) -> ClahePipeline {
    let mut p = ClahePipeline::new(config).unwrap();
    p.settle().unwrap();
    p
}

/// Textured scene: gradient plus a few bright and dark blocks.
fn scene(w: usize, h: usize) -> Image {
    Image::from_fn(w, h, |x, y| {
        let base = 60 + (x * 80 / w + y * 40 / h) as u8;
        if (x / 8 + y / 8) % 5 == 0 {
            base.saturating_add(90)
        } else if (x * 7 + y * 3) % 11 == 0 {
            base / 2
        } else {
            base
        }
    })
}

fn grid_of(p: &ClahePipeline) -> TileGrid {
    p.grid().clone()
}

// ===== Frame-to-frame behaviour =====

#[test]
fn first_frame_passes_through_identity() {
    let mut p = pipeline(ClaheConfig::with_size(64, 48, 4, 3));
    let frame = YuvFrame::from_luma(scene(64, 48));
    let out = process_frames(&mut p, &[frame.clone()], RasterTiming::default()).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0], frame);
}

#[test]
fn second_pass_matches_whole_frame_model() {
    let mut p = pipeline(ClaheConfig::with_size(64, 48, 4, 3));
    let frame = YuvFrame::from_luma(scene(64, 48));
    let out = process_frames(&mut p, &[frame.clone(), frame.clone()], RasterTiming::default()).unwrap();
    assert_eq!(out.len(), 2);

    let expected = reference::equalize_frame(&frame.y, &grid_of(&p), &p.controls());
    assert_eq!(out[1].y, expected);
    assert_ne!(out[1].y, frame.y);
}

#[test]
fn uneven_grid_matches_whole_frame_model() {
    // 50 / 4 → 13,13,13,11 and 30 / 4 → 8,8,8,6.
    let mut p = pipeline(ClaheConfig::with_size(50, 30, 4, 4));
    let frame = YuvFrame::from_luma(scene(50, 30));
    let out = process_frames(&mut p, &[frame.clone(), frame.clone()], RasterTiming::default()).unwrap();
    let expected = reference::equalize_frame(&frame.y, &grid_of(&p), &p.controls());
    assert_eq!(out[1].y, expected);
}

#[test]
fn frame_n_uses_tables_of_frame_n_minus_1() {
    let mut p = pipeline(ClaheConfig::with_size(64, 64, 2, 2));
    let a = YuvFrame::from_luma(scene(64, 64));
    let b = YuvFrame::from_luma(Image::from_fn(64, 64, |x, y| ((x * 3 + y) % 256) as u8));
    let out = process_frames(&mut p, &[a.clone(), b.clone()], RasterTiming::default()).unwrap();

    let grid = grid_of(&p);
    let luts = reference::tile_luts(&a.y, &grid, p.controls().clip_threshold);
    let stage = clahe_stream::mapping::MappingStage::new(grid.clone());
    let expected = Image::from_fn(64, 64, |x, y| {
        stage.map(&luts, &grid.locate(x, y), b.y.get(x, y), &p.controls())
    });
    assert_eq!(out[1].y, expected);
}

#[test]
fn chroma_is_carried_unchanged() {
    let mut p = pipeline(ClaheConfig::with_size(32, 32, 2, 2));
    let frame = YuvFrame::new(
        scene(32, 32),
        Image::from_fn(32, 32, |x, _| x as u8 * 4),
        Image::from_fn(32, 32, |_, y| 255 - y as u8),
    );
    let out = process_frames(&mut p, &[frame.clone(), frame.clone()], RasterTiming::default()).unwrap();
    for f in &out {
        assert_eq!(f.u, frame.u);
        assert_eq!(f.v, frame.v);
    }
}

// ===== Ping-pong isolation =====

#[test]
fn ready_tables_hold_while_next_frame_accumulates() {
    let mut p = pipeline(ClaheConfig::with_size(32, 32, 2, 2));
    let timing = RasterTiming { h_blank: 2, v_blank: 8 };
    let a = YuvFrame::from_luma(scene(32, 32));
    let b = YuvFrame::from_luma(Image::from_fn(32, 32, |x, y| (x * 8 + y) as u8));
    process_frames(&mut p, &[a.clone()], timing).unwrap();

    let grid = grid_of(&p);
    let luts_a = reference::tile_luts(&a.y, &grid, 3);
    let ready_a: Vec<_> = (0..4).map(|t| *p.ready_lut(t)).collect();
    assert_eq!(ready_a, luts_a);

    // Everything but the last pixel of frame b.
    let samples: Vec<Sample> = RasterScan::new(&b, timing).collect();
    let last_active = samples.iter().rposition(|s| s.is_active()).unwrap();
    for s in &samples[..last_active] {
        p.tick(*s).unwrap();
        for t in 0..4 {
            assert_eq!(p.ready_lut(t), &luts_a[t]);
        }
    }
    assert_eq!(p.live_count(0), grid.tile_pixel_count(0));
    assert_eq!(p.live_count(3), grid.tile_pixel_count(3) - 1);
    for s in &samples[last_active..] {
        p.tick(*s).unwrap();
    }
    assert_eq!(p.live_count(3), 0);
    let luts_b = reference::tile_luts(&b.y, &grid, 3);
    for t in 0..4 {
        assert_eq!(p.ready_lut(t), &luts_b[t]);
    }
}

// ===== Histogram correctness under hazards =====

#[test]
fn constant_frame_exercises_coalescing() {
    let mut p = pipeline(ClaheConfig::with_size(32, 16, 2, 1));
    let frame = YuvFrame::from_luma(Image::filled(32, 16, 77));
    process_frames(&mut p, &[frame], RasterTiming::default()).unwrap();
    let grid = grid_of(&p);
    for t in 0..2 {
        let hist = p.ready_histogram(t);
        assert_eq!(hist[77], grid.tile_pixel_count(t));
        assert_eq!(hist.iter().sum::<u32>(), grid.tile_pixel_count(t));
    }
    assert!(p.stats().hazards.coalesced > 0);
}

#[test]
fn alternating_values_exercise_forwarding() {
    let mut p = pipeline(ClaheConfig::with_size(32, 16, 2, 1));
    let img = Image::from_fn(32, 16, |x, _| if x % 2 == 0 { 10 } else { 200 });
    process_frames(&mut p, &[YuvFrame::from_luma(img.clone())], RasterTiming::default()).unwrap();
    let grid = grid_of(&p);
    assert_eq!(
        (0..2).map(|t| *p.ready_histogram(t)).collect::<Vec<_>>(),
        reference::tile_histograms(&img, &grid)
    );
    assert!(p.stats().hazards.forwarded > 0);
}

#[test]
fn histograms_exact_for_every_latency() {
    let img = scene(40, 24);
    for latency in 1..=8 {
        let config = ClaheConfig {
            accumulator_latency: latency,
            ..ClaheConfig::with_size(40, 24, 3, 2)
        };
        let mut p = pipeline(config);
        process_frames(&mut p, &[YuvFrame::from_luma(img.clone())], RasterTiming::default()).unwrap();
        let grid = grid_of(&p);
        let expected = reference::tile_histograms(&img, &grid);
        for (t, hist) in expected.iter().enumerate() {
            assert_eq!(p.ready_histogram(t), hist, "latency {latency}, tile {t}");
        }
    }
}

// ===== Known tables =====

#[test]
fn one_of_each_value_gives_identity() {
    // 16x16 tiles: every intensity exactly once per tile.
    let mut p = pipeline(ClaheConfig::with_size(32, 16, 2, 1));
    let img = Image::from_fn(32, 16, |x, y| ((x % 16) + 16 * y) as u8);
    process_frames(&mut p, &[YuvFrame::from_luma(img)], RasterTiming::default()).unwrap();
    assert_eq!(p.ready_lut(0), &IDENTITY_LUT);
    assert_eq!(p.ready_lut(1), &IDENTITY_LUT);
}

#[test]
fn fifty_six_per_bin_gives_identity() {
    // 128x112 = 14336 = 56 * 256.
    let mut p = pipeline(ClaheConfig::with_size(128, 112, 1, 1));
    let img = Image::from_fn(128, 112, |x, y| ((y * 128 + x) % 256) as u8);
    process_frames(&mut p, &[YuvFrame::from_luma(img)], RasterTiming::default()).unwrap();
    let lut = p.ready_lut(0);
    assert_eq!(&lut[..3], &[0, 1, 2]);
    assert_eq!(lut[255], 255);
    assert!(lut.windows(2).all(|w| w[0] <= w[1]));
}

// ===== Controls =====

#[test]
fn equalization_off_is_passthrough() {
    let mut p = pipeline(ClaheConfig::with_size(32, 32, 2, 2));
    let frame = YuvFrame::from_luma(scene(32, 32));
    process_frames(&mut p, &[frame.clone()], RasterTiming::default()).unwrap();
    p.set_controls(Controls {
        equalization_enabled: false,
        ..p.controls()
    });
    let out = process_frames(&mut p, &[frame.clone()], RasterTiming::default()).unwrap();
    assert_eq!(out[0], frame);
}

#[test]
fn interpolation_off_uses_own_tile() {
    let config = ClaheConfig {
        interpolation_enabled: false,
        ..ClaheConfig::with_size(32, 32, 2, 2)
    };
    let mut p = pipeline(config);
    let frame = YuvFrame::from_luma(scene(32, 32));
    let out = process_frames(&mut p, &[frame.clone(), frame.clone()], RasterTiming::default()).unwrap();
    let grid = grid_of(&p);
    let luts = reference::tile_luts(&frame.y, &grid, 3);
    for y in 0..32 {
        for x in 0..32 {
            let t = grid.locate(x, y).index;
            assert_eq!(out[1].y.get(x, y), luts[t][frame.y.get(x, y) as usize]);
        }
    }
}

#[test]
fn bilinear_blending_hides_tile_seams() {
    // Smooth ramp: any jump at a tile boundary comes from the tables.
    let img = Image::from_fn(64, 64, |x, y| 40 + x as u8 + y as u8 / 8);
    let frame = YuvFrame::from_luma(img);
    let mut outputs = Vec::new();
    for interpolation_enabled in [false, true] {
        let config = ClaheConfig {
            interpolation_enabled,
            ..ClaheConfig::with_size(64, 64, 2, 2)
        };
        let mut p = pipeline(config);
        let out = process_frames(&mut p, &[frame.clone(), frame.clone()], RasterTiming::default()).unwrap();
        outputs.push(reference::seam_score(&out[1].y, &grid_of(&p)));
    }
    let (nearest, bilinear) = (outputs[0], outputs[1]);
    assert!(bilinear < nearest / 2.0, "bilinear {bilinear:.2} vs nearest {nearest:.2}");
}

#[test]
fn clip_threshold_change_waits_for_frame_boundary() {
    let mut p = pipeline(ClaheConfig::with_size(32, 32, 2, 2));
    let frame = YuvFrame::from_luma(scene(32, 32));
    let mut samples = RasterScan::new(&frame, RasterTiming::default());
    p.tick(samples.next().unwrap()).unwrap();
    let relaxed = Controls {
        clip_threshold: 40,
        ..p.controls()
    };
    p.set_controls(relaxed);
    assert_eq!(p.controls().clip_threshold, 3);
    for s in samples {
        p.tick(s).unwrap();
    }
    assert_eq!(p.controls().clip_threshold, 40);
    // The finished frame was still built with the old threshold.
    let luts = reference::tile_luts(&frame.y, &grid_of(&p), 3);
    assert_eq!(p.ready_lut(0), &luts[0]);
}

// ===== Spread clip/CDF work =====

#[test]
fn budgeted_engine_finishes_inside_blanking() {
    let config = ClaheConfig {
        cdf_steps_per_tick: 2,
        ..ClaheConfig::with_size(16, 16, 2, 2)
    };
    let mut p = pipeline(config);
    let frame = YuvFrame::from_luma(scene(16, 16));
    let timing = RasterTiming { h_blank: 0, v_blank: 16 };
    let out = process_frames(&mut p, &[frame.clone(), frame.clone()], timing).unwrap();
    let expected = reference::equalize_frame(&frame.y, &grid_of(&p), &p.controls());
    assert_eq!(out[1].y, expected);
}

#[test]
fn short_blanking_overruns_the_engine() {
    let config = ClaheConfig {
        cdf_steps_per_tick: 1,
        ..ClaheConfig::with_size(16, 16, 2, 2)
    };
    let mut p = pipeline(config);
    let frame = YuvFrame::from_luma(scene(16, 16));
    let timing = RasterTiming { h_blank: 0, v_blank: 2 };
    let err = process_frames(&mut p, &[frame.clone(), frame], timing).unwrap_err();
    assert!(matches!(err, Error::FrameOverrun { tile: 0 }), "{err}");
    assert!(p.is_halted());
}

#[test]
fn next_frame_waits_for_every_table() {
    // 12x1 frame, two 6-pixel tiles. After the last pixel the engine needs
    // 12 steps; 4 ticks of blanking flip tile 0 but leave tile 1 behind.
    let config = ClaheConfig {
        cdf_steps_per_tick: 1,
        ..ClaheConfig::with_size(12, 1, 2, 1)
    };
    let a = YuvFrame::from_luma(Image::from_fn(12, 1, |x, _| 20 + x as u8 * 9));
    let b = YuvFrame::from_luma(Image::filled(12, 1, 200));

    let mut p = pipeline(config.clone());
    let short = RasterTiming { h_blank: 0, v_blank: 4 };
    let err = process_frames(&mut p, &[a.clone(), b.clone()], short).unwrap_err();
    assert!(matches!(err, Error::FrameOverrun { tile: 1 }), "{err}");
    assert!(p.is_halted());

    // With enough blanking every pixel of b sees only the tables of a.
    let mut p = pipeline(config);
    let long = RasterTiming { h_blank: 0, v_blank: 12 };
    let out = process_frames(&mut p, &[a.clone(), b.clone()], long).unwrap();
    let grid = grid_of(&p);
    let luts = reference::tile_luts(&a.y, &grid, p.controls().clip_threshold);
    let stage = clahe_stream::mapping::MappingStage::new(grid.clone());
    let expected = Image::from_fn(12, 1, |x, y| {
        stage.map(&luts, &grid.locate(x, y), b.y.get(x, y), &p.controls())
    });
    assert_eq!(out[1].y, expected);
}

// ===== Reset and timing errors =====

#[test]
fn reset_mid_frame_resumes_at_next_frame() {
    let mut p = pipeline(ClaheConfig::with_size(8, 8, 2, 2));
    let timing = RasterTiming { h_blank: 4, v_blank: 20 };
    let frame = YuvFrame::from_luma(scene(8, 8));
    let samples: Vec<Sample> = RasterScan::new(&frame, timing).collect();

    for s in &samples {
        p.tick(*s).unwrap();
    }
    // Three rows into the next frame.
    for s in &samples[..36] {
        p.tick(*s).unwrap();
    }
    p.reset();
    for s in &samples[36..] {
        match p.tick(*s) {
            Ok(_) | Err(Error::NotReady { .. }) => {}
            Err(e) => panic!("unexpected error after reset: {e}"),
        }
    }
    assert!(p.is_ready());
    assert!(!p.is_halted());
    // The interrupted tail was not counted.
    assert!((0..4).all(|t| p.live_count(t) == 0));

    let out = process_frames(&mut p, &[frame.clone(), frame.clone()], timing).unwrap();
    assert_eq!(out[0], frame);
    let expected = reference::equalize_frame(&frame.y, &grid_of(&p), &p.controls());
    assert_eq!(out[1].y, expected);
}

#[test]
fn long_row_is_reported() {
    let mut p = pipeline(ClaheConfig::with_size(8, 4, 2, 2));
    for _ in 0..10 {
        p.tick(Sample::active(1)).unwrap();
    }
    let err = p.tick(Sample::h_blank()).unwrap_err();
    assert!(matches!(err, Error::LongRow { y: 0, got: 10, expected: 8 }), "{err}");
    assert!(p.is_halted());
}

#[test]
fn samples_before_sweep_are_rejected() {
    let mut p = ClahePipeline::new(ClaheConfig::with_size(32, 32, 4, 4)).unwrap();
    assert_eq!(p.ticks_until_ready(), 16);
    p.tick(Sample::IDLE).unwrap();
    assert_eq!(p.ticks_until_ready(), 15);
    assert!(matches!(p.tick(Sample::active(3)), Err(Error::NotReady { remaining: 15 })));
    p.settle().unwrap();
    assert!(p.is_ready());
    p.tick(Sample::active(3)).unwrap();
}

#[test]
fn short_row_halts_until_reset() {
    let mut p = pipeline(ClaheConfig::with_size(8, 4, 2, 2));
    for _ in 0..5 {
        p.tick(Sample::active(1)).unwrap();
    }
    let err = p.tick(Sample::h_blank()).unwrap_err();
    assert!(matches!(err, Error::ShortRow { y: 0, got: 5, expected: 8 }), "{err}");
    assert!(p.is_halted());
    assert!(matches!(p.tick(Sample::IDLE), Err(Error::Halted)));

    p.reset();
    p.settle().unwrap();
    let frame = YuvFrame::from_luma(scene(8, 4));
    let out = process_frames(&mut p, &[frame.clone()], RasterTiming::default()).unwrap();
    assert_eq!(out[0], frame);
}

#[test]
fn too_many_rows_overflow() {
    let mut p = pipeline(ClaheConfig::with_size(4, 2, 1, 1));
    for _ in 0..8 {
        p.tick(Sample::active(1)).unwrap();
    }
    let err = p.tick(Sample::active(1)).unwrap_err();
    assert!(matches!(err, Error::FrameOverrun { .. } | Error::RasterOverflow { .. }), "{err}");
    assert!(p.is_halted());
}

#[test]
fn wrong_frame_size_is_rejected() {
    let mut p = pipeline(ClaheConfig::with_size(16, 16, 2, 2));
    let frame = YuvFrame::from_luma(scene(16, 8));
    let err = process_frames(&mut p, &[frame], RasterTiming::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::DimensionMismatch { got_w: 16, got_h: 8, want_w: 16, want_h: 16 }
    ));
    assert!(!p.is_halted());
}
