//! Performance benchmarks for the effect pipeline
//!
//! Run with: cargo bench -p resonant-audio --bench pipeline_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use resonant_audio::{DspController, Engine};
use resonant_core::LocalFileStore;
use std::f32::consts::PI;
use std::sync::Arc;

const SAMPLE_RATE: f32 = 48000.0;

/// Interleaved stereo 1kHz sine
fn generate_test_signal(frames: usize) -> Vec<f32> {
    (0..frames)
        .flat_map(|i| {
            let value = 0.5 * (2.0 * PI * 1000.0 * i as f32 / SAMPLE_RATE).sin();
            [value, value]
        })
        .collect()
}

fn engine() -> Engine {
    Engine::new(
        SAMPLE_RATE,
        Arc::new(LocalFileStore::new(std::env::temp_dir())),
    )
}

fn bench_single_effects(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_effects");
    let frames = 1024;
    let input = generate_test_signal(frames);
    group.throughput(Throughput::Elements(frames as u64));

    let setups: Vec<(&str, fn(&mut Engine))> = vec![
        ("output_only", |_| {}),
        ("bass_boost", |e| {
            e.set_bass_boost(true, 8.0);
        }),
        ("stereo_widener", |e| {
            e.set_stereo_enhancement(true, 80.0);
        }),
        ("crossfeed", |e| {
            e.set_crossfeed(true, 1);
        }),
        ("vacuum_tube", |e| {
            e.set_vacuum_tube(true, 4.0);
        }),
        ("reverb", |e| {
            e.set_reverb(true, 6);
        }),
        ("multi_equalizer_fir", |e| {
            e.set_multi_equalizer(
                true,
                0,
                0,
                "25;40;63;100;160;250;400;630;1000;1600;2500;4000;6300;10000;16000;\
                 6;5;4;2;0;-1;-2;0;1;2;3;4;3;2;1",
            );
        }),
    ];

    for (name, setup) in setups {
        group.bench_with_input(BenchmarkId::new("1024 frames", name), &input, |b, input| {
            let mut engine = engine();
            setup(&mut engine);
            let mut output = vec![0.0f32; input.len()];
            b.iter(|| engine.process_f32(black_box(input), black_box(&mut output)));
        });
    }

    group.finish();
}

fn bench_buffer_formats(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_formats");
    let frames = 1024;
    group.throughput(Throughput::Elements(frames as u64));

    let input_f32 = generate_test_signal(frames);
    let input_i16: Vec<i16> = input_f32.iter().map(|s| (s * 32767.0) as i16).collect();
    let input_i32: Vec<i32> = input_f32
        .iter()
        .map(|s| (f64::from(*s) * 2147483647.0) as i32)
        .collect();

    group.bench_function("i16", |b| {
        let mut engine = engine();
        engine.set_bass_boost(true, 6.0);
        let mut output = vec![0i16; input_i16.len()];
        b.iter(|| engine.process_i16(black_box(&input_i16), black_box(&mut output)));
    });

    group.bench_function("i32", |b| {
        let mut engine = engine();
        engine.set_bass_boost(true, 6.0);
        let mut output = vec![0i32; input_i32.len()];
        b.iter(|| engine.process_i32(black_box(&input_i32), black_box(&mut output)));
    });

    group.bench_function("f32", |b| {
        let mut engine = engine();
        engine.set_bass_boost(true, 6.0);
        let mut output = vec![0.0f32; input_f32.len()];
        b.iter(|| engine.process_f32(black_box(&input_f32), black_box(&mut output)));
    });

    group.finish();
}

fn bench_buffer_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_buffer_sizes");

    for frames in [64usize, 256, 1024, 4096] {
        let input = generate_test_signal(frames);
        group.throughput(Throughput::Elements(frames as u64));
        group.bench_with_input(BenchmarkId::from_parameter(frames), &input, |b, input| {
            let mut engine = engine();
            engine.set_bass_boost(true, 6.0);
            engine.set_crossfeed(true, 0);
            engine.set_reverb(true, 2);
            let mut output = vec![0.0f32; input.len()];
            b.iter(|| engine.process_f32(black_box(input), black_box(&mut output)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_effects,
    bench_buffer_formats,
    bench_buffer_sizes
);
criterion_main!(benches);
