//! Trama Core - a block-based unit-generator graph engine
//!
//! This crate provides the engine underneath trama: reference-counted
//! multichannel signals pulled block-by-block through a graph of
//! single-channel unit generators, with sample-accurate lifetimes.
//!
//! # Core Abstractions
//!
//! ## Signals and Nodes
//!
//! - [`Signal`] - multichannel handle over graph nodes, with operator
//!   overloading, channel expansion and mixdown
//! - [`Unit`] - object-safe trait implemented by every node
//! - [`UnitCore`] - per-node bookkeeping (inputs, output block, rate,
//!   block-id stamps, deletion schedule, user data)
//! - [`SignalBlock`] - shared sample buffer exchanged between nodes
//!
//! ## Graph Evaluation
//!
//! Rendering is a pull: the host asks the root [`Signal`] for a block,
//! and each node processes its inputs exactly once per block id. Block
//! ids advance by the block size every callback, so a node scheduled
//! for deletion on one block is replaced by a silent [`NullUnit`] on
//! the next, across all channels at once.
//!
//! - [`Renderer`] - host facade: prepare, process, copy out, advance
//! - [`RenderContext`] - engine configuration plus the node [`Deleter`]
//! - [`GraphConfig`] - sample rate, block size, control-rate period
//!
//! ## Dynamic Patching
//!
//! - [`Plug`] - re-patchable signal source with linear crossfade
//! - [`ExternalValue`] - shared control value re-read once per block
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (allocation is still required for
//! graph structure). Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! trama-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use trama_core::{GraphConfig, Renderer, Signal};
//!
//! let config = GraphConfig::new(44_100.0, 512).unwrap();
//! let root = Signal::from(0.25) * Signal::from(2.0);
//! let mut renderer = Renderer::new(config, root);
//!
//! let mut left = [0.0f32; 512];
//! renderer.process_block(&mut [&mut left]);
//! assert!((left[0] - 0.5).abs() < 1e-6);
//! ```
//!
//! # Design Principles
//!
//! - **Single render thread**: nodes are `Rc<RefCell<_>>`; structural
//!   mutation from other threads must be externally synchronized
//! - **Never null**: silent sentinel nodes stand in for absent sources
//! - **Deferred teardown**: retired nodes go through a [`Deleter`] so
//!   reclamation can happen off the hot path

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod block;
pub mod config;
pub mod deleter;
pub mod mix;
pub mod node;
pub mod ops;
pub mod plug;
pub mod proxy;
pub mod release;
pub mod render;
pub mod scalar;
pub mod signal;

pub use block::SignalBlock;
pub use config::{ConfigError, GraphConfig};
pub use deleter::{DeferredDeleter, Deleter, ImmediateDeleter};
pub use mix::MixUnit;
pub use node::{BlockId, NodeRef, Rate, Unit, UnitCore, UserData, prepare_node, process_node};
pub use ops::{BinOp, BinaryUnit, BinaryUnitK, ControlSlope, UnOp, UnaryUnit};
pub use plug::{Plug, PlugUnit};
pub use proxy::{ProxyUnit, fan_out};
pub use release::Releasable;
pub use render::{RenderContext, Renderer};
pub use scalar::{ConstUnit, ExternalUnit, ExternalUnitK, ExternalValue, NullUnit};
pub use signal::Signal;
