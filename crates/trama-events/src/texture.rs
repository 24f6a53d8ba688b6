//! Texture constructors: spawners whose events are automatically
//! wrapped in crossfade envelopes.
//!
//! Each constructor takes a plain event closure and returns a spawner
//! whose voices fade in, sustain, and fade out on a fixed schedule, so
//! the summed output is a continuously evolving texture. The shapes
//! mirror the classic crossfade/overlap patterns: a Welch fade keeps
//! the sum of two crossing envelopes close to unity.

use alloc::boxed::Box;

use trama_core::{GraphConfig, Signal};
use trama_units::{DoneAction, Env, EnvCurve, EnvGen};

use crate::event::Event;
use crate::spawn::Spawn;
use crate::tspawn::TSpawn;

/// A texture where each event sustains alone and crossfades into the
/// next: fade in over `transition`, hold for `sustain`, fade out over
/// `transition`, with the next event starting as the fade-out begins.
#[must_use]
pub fn xfade_texture(
    config: GraphConfig,
    num_channels: usize,
    transition: f32,
    sustain: f32,
    max_repeats: Option<usize>,
    mut event: Event,
) -> Spawn {
    let next_time = f64::from(transition) + f64::from(sustain);
    Spawn::new(
        config,
        num_channels,
        next_time,
        max_repeats,
        Box::new(move |ctl| {
            let body = event(ctl);
            ctl.set_next_time(f64::from(transition) + f64::from(sustain));
            let env = Env::new(
                alloc::vec![0.0, 1.0, 1.0, 0.0],
                alloc::vec![transition, sustain, transition],
                EnvCurve::Welch,
            );
            body * EnvGen::kr(env, DoneAction::DeleteWhenDone)
        }),
    )
}

/// A texture of overlapping events.
///
/// `density` is the average number of events sounding at once; the
/// spawn interval is the envelope duration divided by it. The very
/// first event skips its fade-in so the texture starts at full level.
#[must_use]
pub fn overlap_texture(
    config: GraphConfig,
    num_channels: usize,
    transition: f32,
    sustain: f32,
    density: f32,
    max_repeats: Option<usize>,
    mut event: Event,
) -> Spawn {
    let next_time = f64::from(2.0 * transition + sustain) / f64::from(density);
    Spawn::new(
        config,
        num_channels,
        next_time,
        max_repeats,
        Box::new(move |ctl| {
            let body = event(ctl);
            let fade_in = if ctl.event_index() == 0 { 0.0 } else { transition };
            let env = Env::new(
                alloc::vec![0.0, 1.0, 1.0, 0.0],
                alloc::vec![fade_in, sustain, transition],
                EnvCurve::Welch,
            );
            body * EnvGen::kr(env, DoneAction::DeleteWhenDone)
        }),
    )
}

/// A trigger-driven crossfade: each trigger fades a new event in over
/// `transition` while every previous event is released and fades out.
#[must_use]
pub fn trig_xfade(
    config: GraphConfig,
    num_channels: usize,
    trig: impl Into<Signal>,
    transition: f32,
    max_repeats: Option<usize>,
    mut event: Event,
) -> TSpawn {
    TSpawn::new(
        config,
        num_channels,
        trig,
        max_repeats,
        Box::new(move |ctl| {
            let body = event(ctl);
            ctl.release_previous_events();
            let env = Env::new(
                alloc::vec![0.0, 1.0, 0.0],
                alloc::vec![transition, transition],
                EnvCurve::Welch,
            )
            .release_at(1);
            body * EnvGen::kr(env, DoneAction::DeleteWhenDone)
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use trama_core::Renderer;

    fn render(renderer: &mut Renderer, len: usize) -> Vec<f32> {
        let mut out = alloc::vec![0.0f32; len];
        renderer.process_block(&mut [out.as_mut_slice()]);
        out
    }

    #[test]
    fn xfade_schedule_matches_the_envelope() {
        let config = GraphConfig::with_control_block_size(100.0, 32, 4).unwrap();
        // fade 0.16 s, sustain 0.16 s: events every 32 samples
        let spawn = xfade_texture(config, 1, 0.16, 0.16, None, Box::new(|_| Signal::from(1.0)));
        let mut renderer = Renderer::new(config, spawn.signal());

        render(&mut renderer, 32);
        assert_eq!(spawn.events_spawned(), 1);
        render(&mut renderer, 32);
        assert_eq!(spawn.events_spawned(), 2, "next event as the fade-out starts");
    }

    #[test]
    fn crossfade_keeps_the_level_near_unity() {
        let config = GraphConfig::with_control_block_size(100.0, 32, 4).unwrap();
        let spawn = xfade_texture(config, 1, 0.16, 0.16, None, Box::new(|_| Signal::from(1.0)));
        let mut renderer = Renderer::new(config, spawn.signal());

        render(&mut renderer, 32); // first fade-in, alone
        render(&mut renderer, 32); // first sustains, second fades in over its fade-out

        // third block: event two fading out, event three fading in;
        // crossing Welch fades sum between 1 and sqrt(2)
        let out = render(&mut renderer, 32);
        for &sample in &out[4..] {
            assert!(sample > 0.9 && sample < 1.45, "crossfade sum near unity, got {sample}");
        }
    }

    #[test]
    fn overlap_first_event_skips_the_fade_in() {
        let config = GraphConfig::with_control_block_size(100.0, 32, 4).unwrap();
        let spawn = overlap_texture(
            config,
            1,
            0.16,
            0.32,
            2.0,
            None,
            Box::new(|_| Signal::from(1.0)),
        );
        let mut renderer = Renderer::new(config, spawn.signal());

        let out = render(&mut renderer, 32);
        assert!((out[8] - 1.0).abs() < 1e-3, "already at full level");
    }

    #[test]
    fn trig_xfade_releases_the_previous_event() {
        let config = GraphConfig::with_control_block_size(100.0, 32, 4).unwrap();
        let tspawn = trig_xfade(config, 1, 0.0_f32, 0.16, None, Box::new(|_| Signal::from(1.0)));
        let mut renderer = Renderer::new(config, tspawn.signal());

        tspawn.trigger();
        render(&mut renderer, 32); // fade in
        render(&mut renderer, 32); // sustain at the release node
        assert_eq!(tspawn.num_voices(), 1);

        tspawn.trigger();
        render(&mut renderer, 32); // old voice fades out, new fades in
        render(&mut renderer, 32); // old voice finishes
        render(&mut renderer, 32); // husk pruned
        assert_eq!(tspawn.num_voices(), 1, "previous voice was released and pruned");
    }
}
