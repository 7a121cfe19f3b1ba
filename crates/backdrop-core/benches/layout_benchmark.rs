//! Benchmarks for backdrop-core hot paths
//!
//! Run with: cargo bench -p backdrop-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use backdrop_core::config::{PlayerOptions, VimeoOptions, YouTubeOptions};
use backdrop_core::layout::compute_geometry;

const WIDESCREEN: f64 = 16.0 / 9.0;

// ============================================================================
// Layout
// ============================================================================

fn bench_compute_geometry(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_geometry");

    let containers = [
        ("landscape", 1920.0, 600.0),
        ("portrait", 390.0, 844.0),
        ("exact", 1280.0, 720.0),
    ];

    for (name, width, height) in containers {
        group.bench_with_input(BenchmarkId::new("cover", name), &(width, height), |b, &(w, h)| {
            b.iter(|| compute_geometry(black_box(w), black_box(h), WIDESCREEN, false, true))
        });
    }

    group.bench_function("force_aspect", |b| {
        b.iter(|| compute_geometry(black_box(1366.0), black_box(0.0), WIDESCREEN, true, true))
    });

    group.finish();
}

fn bench_resize_storm(c: &mut Criterion) {
    // A window drag delivers a few hundred resize signals
    c.bench_function("resize_storm_300", |b| {
        b.iter(|| {
            let mut last = None;
            for step in 0..300 {
                let width = 320.0 + step as f64 * 5.0;
                last = Some(compute_geometry(black_box(width), 720.0, WIDESCREEN, false, true));
            }
            last
        })
    });
}

// ============================================================================
// Configuration
// ============================================================================

fn bench_player_vars(c: &mut Criterion) {
    let youtube = YouTubeOptions {
        video_id: "M7lc1UVf-VE".into(),
        ..Default::default()
    };
    let vimeo = VimeoOptions {
        video_id: "76979871".into(),
        ..Default::default()
    };
    let options = PlayerOptions::default();

    c.bench_function("youtube_player_vars", |b| {
        b.iter(|| youtube.resolved_player_vars(black_box(&options)))
    });

    c.bench_function("vimeo_embed_url", |b| b.iter(|| vimeo.embed_url(black_box(&options))));
}

fn bench_options_parse(c: &mut Criterion) {
    let json = r#"{
        "ratio": 1.778,
        "forceAspect": false,
        "vimeo": { "videoId": "76979871", "playerVars": { "color": "ff0179" } }
    }"#;

    c.bench_function("options_from_json", |b| {
        b.iter(|| PlayerOptions::from_json(black_box(json)))
    });
}

criterion_group!(
    benches,
    bench_compute_geometry,
    bench_resize_storm,
    bench_player_vars,
    bench_options_parse,
);

criterion_main!(benches);
