//! Noise sources.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use trama_core::{BlockId, NodeRef, RenderContext, Signal, Unit, UnitCore};

/// Uniform white noise in `[-1, 1)`.
///
/// The generator is a self-contained xorshift PRNG seeded at
/// construction, so renders are reproducible and no state is shared
/// between noise nodes.
pub struct WhiteNoise {
    core: UnitCore,
    state: u64,
}

impl WhiteNoise {
    /// A single noise channel.
    #[must_use]
    pub fn ar(seed: u64) -> Signal {
        Signal::from_node(Self::node(seed))
    }

    /// Creates a noise node.
    #[must_use]
    pub fn node(seed: u64) -> NodeRef {
        Rc::new(RefCell::new(WhiteNoise {
            core: UnitCore::new(Vec::new()),
            // xorshift locks up on an all-zero state
            state: seed | 1,
        }))
    }

    fn next(&mut self) -> f32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        {
            ((x >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0) as f32
        }
    }
}

impl Unit for WhiteNoise {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "whitenoise"
    }
    fn process(
        &mut self,
        _ctx: &mut RenderContext,
        _block_id: BlockId,
        _channel: usize,
        _should_delete: &mut bool,
    ) {
        let out = self.core.output().clone();
        for sample in out.write().iter_mut() {
            *sample = self.next();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trama_core::{GraphConfig, Renderer};

    fn render(seed: u64, len: usize) -> Vec<f32> {
        let config = GraphConfig::new(44_100.0, len).unwrap();
        let mut renderer = Renderer::new(config, WhiteNoise::ar(seed));
        let mut out = alloc::vec![0.0f32; len];
        renderer.process_block(&mut [out.as_mut_slice()]);
        out
    }

    #[test]
    fn stays_in_range() {
        for sample in render(0xBAD5_EED, 1024) {
            assert!((-1.0..1.0).contains(&sample));
        }
    }

    #[test]
    fn seeding_is_reproducible() {
        assert_eq!(render(42, 64), render(42, 64));
        assert_ne!(render(42, 64), render(43, 64));
    }

    #[test]
    fn roughly_zero_mean() {
        let samples = render(7, 8192);
        let mean: f32 = samples.iter().sum::<f32>() / samples.len() as f32;
        assert!(mean.abs() < 0.05);
    }
}
