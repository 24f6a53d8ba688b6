//! Texture demo: crossfading and overlapping spawned voices.
//!
//! Run with: cargo run -p trama-events --example texture_demo

use trama_core::{GraphConfig, Renderer, Signal};
use trama_events::{Spawn, overlap_texture, xfade_texture};
use trama_units::{DoneAction, Line, SinOsc, WhiteNoise};

fn rms(block: &[f32]) -> f32 {
    let sum: f32 = block.iter().map(|s| s * s).sum();
    (sum / block.len() as f32).sqrt()
}

fn render_levels(config: GraphConfig, root: Signal, blocks: usize) -> Vec<f32> {
    let mut renderer = Renderer::new(config, root);
    let mut out = vec![0.0f32; config.block_size()];
    (0..blocks)
        .map(|_| {
            renderer.process_block(&mut [out.as_mut_slice()]);
            rms(&out)
        })
        .collect()
}

fn main() {
    let config = GraphConfig::new(44_100.0, 512).expect("valid config");

    // --- Plain spawner: a ping every 100 ms ---
    println!("=== Spawn: 200 ms sine pings every 100 ms ===\n");

    let spawn = Spawn::new(
        config,
        1,
        0.1,
        Some(8),
        Box::new(|ctl| {
            let freq = 330.0 * (ctl.event_index() + 1) as f32;
            SinOsc::ar(freq, 0.0) * Line::ar(0.4, 0.0, 0.2, DoneAction::DeleteWhenDone)
        }),
    );
    println!("Block | RMS");
    println!("------+-------");
    for (i, level) in render_levels(config, spawn.signal(), 24).iter().enumerate() {
        println!("{i:>5} | {level:.4}");
    }

    // --- Crossfade texture: detuned tones handing over to each other ---
    println!("\n=== XFade texture: 0.5 s fades, 1 s sustain ===\n");

    let texture = xfade_texture(
        config,
        1,
        0.5,
        1.0,
        Some(4),
        Box::new(|ctl| SinOsc::ar(220.0 + 40.0 * ctl.event_index() as f32, 0.0) * 0.5),
    );
    println!("Block | RMS");
    println!("------+-------");
    for (i, level) in render_levels(config, texture.signal(), 32).iter().enumerate() {
        if i % 4 == 0 {
            println!("{i:>5} | {level:.4}");
        }
    }

    // --- Overlap texture: dense noise bed ---
    println!("\n=== Overlap texture: density 3 noise grains ===\n");

    let grains = overlap_texture(
        config,
        1,
        0.25,
        0.5,
        3.0,
        Some(12),
        Box::new(|ctl| WhiteNoise::ar(ctl.event_index() as u64 + 1) * 0.2),
    );
    println!("Block | RMS | voices");
    println!("------+--------+-------");
    let mut renderer = Renderer::new(config, grains.signal());
    let mut out = vec![0.0f32; config.block_size()];
    for i in 0..40 {
        renderer.process_block(&mut [out.as_mut_slice()]);
        if i % 4 == 0 {
            println!("{:>5} | {:.4} | {}", i, rms(&out), grains.num_voices());
        }
    }
}
