//! Event spawning, voice allocation and textures for the trama engine.
//!
//! Everything here turns discrete events into voices inside a running
//! signal graph. [`Spawn`] fires an event closure on a sample-accurate
//! schedule, [`TSpawn`] fires it on trigger crossings, and [`Voicer`]
//! keys voices to note-on/note-off pairs with optional polyphony
//! stealing. The [`texture`] constructors wrap event closures in
//! crossfade envelopes for continuously evolving layers.
//!
//! ```
//! use trama_core::{GraphConfig, Renderer};
//! use trama_events::Spawn;
//! use trama_units::{DoneAction, Line, SinOsc};
//!
//! let config = GraphConfig::new(44_100.0, 64).unwrap();
//! let spawn = Spawn::new(
//!     config,
//!     1,
//!     0.25,
//!     Some(4),
//!     Box::new(|ctl| {
//!         let freq = 220.0 * (ctl.event_index() + 1) as f32;
//!         SinOsc::ar(freq, 0.0) * Line::ar(0.5, 0.0, 0.2, DoneAction::DeleteWhenDone)
//!     }),
//! );
//! let mut renderer = Renderer::new(config, spawn.signal());
//! let mut out = [0.0f32; 64];
//! renderer.process_block(&mut [&mut out]);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod event;
pub mod spawn;
pub mod texture;
pub mod tspawn;
pub mod voicer;

pub use event::{Event, EventControl};
pub use spawn::{Spawn, SpawnUnit};
pub use texture::{overlap_texture, trig_xfade, xfade_texture};
pub use tspawn::{TSpawn, TSpawnUnit};
pub use voicer::{NoteEvent, StealMode, VoiceEvent, Voicer, VoicerUnit};
