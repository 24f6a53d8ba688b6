//! Oscillators.
//!
//! Phase accumulates in `f64` so long renders do not drift; output is
//! `f32`. Frequency inputs are full signals, pulled per block, so any
//! graph output can frequency-modulate an oscillator. A multichannel
//! frequency input expands into one independent oscillator per
//! channel.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use trama_core::{BlockId, NodeRef, RenderContext, Signal, Unit, UnitCore};

const TAU: f64 = core::f64::consts::TAU;

fn wrap_phase(phase: f64) -> f64 {
    if (0.0..1.0).contains(&phase) {
        phase
    } else {
        phase - libm::floor(phase)
    }
}

/// Sawtooth phase ramp from 0 to 1 at the given frequency.
pub struct Phasor {
    core: UnitCore,
    phase: f64,
}

impl Phasor {
    /// One ramp per channel of `freq`, all starting at phase 0.
    #[must_use]
    pub fn ar(freq: impl Into<Signal>) -> Signal {
        let freq = freq.into();
        let nodes: Vec<NodeRef> = (0..freq.num_channels())
            .map(|channel| Self::node(freq.channel_signal(channel), 0.0))
            .collect();
        Signal::from_nodes(nodes)
    }

    /// Creates a single ramp node with an explicit starting phase in
    /// `[0, 1)`.
    #[must_use]
    pub fn node(freq: Signal, phase: f32) -> NodeRef {
        Rc::new(RefCell::new(Phasor {
            core: UnitCore::new(alloc::vec![freq]),
            phase: wrap_phase(f64::from(phase)),
        }))
    }
}

impl Unit for Phasor {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "phasor"
    }
    fn process(
        &mut self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        channel: usize,
        should_delete: &mut bool,
    ) {
        let reciprocal_sample_rate = ctx.config().reciprocal_sample_rate();
        let freq = self.core.inputs()[0].process_for_channel(ctx, block_id, channel, should_delete);
        let freq = freq.read();
        let mut out = self.core.output().write();
        for (i, sample) in out.iter_mut().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            {
                *sample = self.phase as f32;
            }
            self.phase = wrap_phase(self.phase + f64::from(freq[i]) * reciprocal_sample_rate);
        }
    }
}

/// Sine oscillator.
pub struct SinOsc {
    core: UnitCore,
    phase: f64,
}

impl SinOsc {
    /// One oscillator per channel of `freq`, all starting at `phase`
    /// (in cycles, `[0, 1)`).
    #[must_use]
    pub fn ar(freq: impl Into<Signal>, phase: f32) -> Signal {
        let freq = freq.into();
        let nodes: Vec<NodeRef> = (0..freq.num_channels())
            .map(|channel| Self::node(freq.channel_signal(channel), phase))
            .collect();
        Signal::from_nodes(nodes)
    }

    /// Creates a single oscillator node.
    #[must_use]
    pub fn node(freq: Signal, phase: f32) -> NodeRef {
        Rc::new(RefCell::new(SinOsc {
            core: UnitCore::new(alloc::vec![freq]),
            phase: wrap_phase(f64::from(phase)),
        }))
    }
}

impl Unit for SinOsc {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "sinosc"
    }
    fn process(
        &mut self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        channel: usize,
        should_delete: &mut bool,
    ) {
        let reciprocal_sample_rate = ctx.config().reciprocal_sample_rate();
        let freq = self.core.inputs()[0].process_for_channel(ctx, block_id, channel, should_delete);
        let freq = freq.read();
        let mut out = self.core.output().write();
        for (i, sample) in out.iter_mut().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            {
                *sample = libm::sin(self.phase * TAU) as f32;
            }
            self.phase = wrap_phase(self.phase + f64::from(freq[i]) * reciprocal_sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trama_core::{GraphConfig, Renderer};

    fn render(signal: Signal, len: usize) -> Vec<f32> {
        let config = GraphConfig::new(44_100.0, len).unwrap();
        let mut renderer = Renderer::new(config, signal);
        let mut out = alloc::vec![0.0f32; len];
        renderer.process_block(&mut [out.as_mut_slice()]);
        out
    }

    #[test]
    fn phasor_ramps_at_one_cycle_per_period() {
        // 44100 / 64 Hz completes one cycle in exactly 64 samples
        let freq = 44_100.0 / 64.0;
        let out = render(Phasor::ar(freq), 64);
        assert_eq!(out[0], 0.0);
        assert!((out[32] - 0.5).abs() < 1e-4);
        assert!(out[63] < 1.0);
    }

    #[test]
    fn phasor_phase_is_continuous_across_blocks() {
        let config = GraphConfig::new(44_100.0, 32).unwrap();
        let mut renderer = Renderer::new(config, Phasor::ar(44_100.0 / 64.0));
        let mut first = [0.0f32; 32];
        let mut second = [0.0f32; 32];
        renderer.process_block(&mut [&mut first]);
        renderer.process_block(&mut [&mut second]);
        assert!((second[0] - 0.5).abs() < 1e-4, "resumes where it left off");
    }

    #[test]
    fn sine_starts_at_its_phase_offset() {
        let out = render(SinOsc::ar(440.0, 0.25), 8);
        assert!((out[0] - 1.0).abs() < 1e-6, "quarter cycle is the peak");
    }

    #[test]
    fn multichannel_freq_expands_to_independent_oscillators() {
        let freq = Signal::from_values(&[44_100.0 / 64.0, 44_100.0 / 32.0]);
        let phasor = Phasor::ar(freq);
        assert_eq!(phasor.num_channels(), 2);

        let config = GraphConfig::new(44_100.0, 32).unwrap();
        let mut renderer = Renderer::new(config, phasor);
        let mut left = [0.0f32; 32];
        let mut right = [0.0f32; 32];
        renderer.process_block(&mut [&mut left, &mut right]);
        assert!((left[16] - 0.25).abs() < 1e-4);
        assert!((right[16] - 0.5).abs() < 1e-4);
    }
}
