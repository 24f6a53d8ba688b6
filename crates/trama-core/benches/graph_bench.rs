use criterion::{Criterion, black_box, criterion_group, criterion_main};
use trama_core::{ExternalValue, GraphConfig, Plug, Renderer, Signal};

const BLOCK: usize = 512;

fn config() -> GraphConfig {
    GraphConfig::new(44_100.0, BLOCK).unwrap()
}

fn render(renderer: &mut Renderer, buffer: &mut [f32]) {
    let mut channels = [buffer];
    renderer.process_block(&mut channels);
}

fn bench_arithmetic_chain(c: &mut Criterion) {
    let gain = ExternalValue::new(0.5);
    let mut graph = Signal::from(gain.clone());
    for i in 0..16 {
        graph = graph * Signal::from(ExternalValue::new(0.99)) + (i as f32 * 0.01);
    }
    let mut renderer = Renderer::new(config(), graph);
    let mut buffer = vec![0.0f32; BLOCK];

    c.bench_function("arithmetic_chain_16", |b| {
        b.iter(|| {
            render(&mut renderer, &mut buffer);
            black_box(buffer[0]);
        });
    });
}

fn bench_wide_mix(c: &mut Criterion) {
    let mut wide = Signal::from(ExternalValue::new(0.01));
    for i in 1..64 {
        wide = wide.append(Signal::from(ExternalValue::new(i as f32 * 0.01)));
    }
    let mut renderer = Renderer::new(config(), wide.mix_scaled());
    let mut buffer = vec![0.0f32; BLOCK];

    c.bench_function("mix_64_channels", |b| {
        b.iter(|| {
            render(&mut renderer, &mut buffer);
            black_box(buffer[0]);
        });
    });
}

fn bench_control_rate_slope(c: &mut Criterion) {
    let value = ExternalValue::new(0.0);
    let mut renderer = Renderer::new(config(), Signal::from(value.clone()).kr());
    let mut buffer = vec![0.0f32; BLOCK];
    let mut flip = 0.0f32;

    c.bench_function("control_rate_slope", |b| {
        b.iter(|| {
            flip = 1.0 - flip;
            value.set(flip);
            render(&mut renderer, &mut buffer);
            black_box(buffer[BLOCK - 1]);
        });
    });
}

fn bench_plug_crossfade(c: &mut Criterion) {
    let a = Signal::from(ExternalValue::new(0.25));
    let b_src = Signal::from(ExternalValue::new(0.75));
    let plug = Plug::new(config(), 1, a.clone(), true);
    let mut renderer = Renderer::new(config(), plug.signal());
    let mut buffer = vec![0.0f32; BLOCK];
    let mut toggle = false;

    c.bench_function("plug_crossfade", |b| {
        b.iter(|| {
            toggle = !toggle;
            let next = if toggle { b_src.clone() } else { a.clone() };
            plug.set_source(next, false, 0.05);
            render(&mut renderer, &mut buffer);
            black_box(buffer[0]);
        });
    });
}

criterion_group!(
    benches,
    bench_arithmetic_chain,
    bench_wide_mix,
    bench_control_rate_slope,
    bench_plug_crossfade
);
criterion_main!(benches);
