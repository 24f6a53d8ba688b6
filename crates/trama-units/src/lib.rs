//! Unit generators for the trama engine.
//!
//! A small catalog of sources and envelopes exercising the full node
//! contract of `trama-core`: multichannel expansion, control-rate
//! variants, release/steal handling, and done actions. Oscillators
//! accumulate phase in `f64` and emit `f32` samples.
//!
//! ```
//! use trama_core::{GraphConfig, Renderer, Signal};
//! use trama_units::{Asr, DoneAction, SinOsc};
//!
//! let config = GraphConfig::new(44_100.0, 64).unwrap();
//! let tone = SinOsc::ar(440.0, 0.0) * Asr::ar(0.01, 0.5, 0.2, DoneAction::DeleteWhenDone);
//! let mut renderer = Renderer::new(config, tone);
//! let mut out = [0.0f32; 64];
//! renderer.process_block(&mut [&mut out]);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod env;
pub mod noise;
pub mod osc;

pub use env::{Asr, DoneAction, Env, EnvCurve, EnvGen, EnvGenK, Line};
pub use noise::WhiteNoise;
pub use osc::{Phasor, SinOsc};
