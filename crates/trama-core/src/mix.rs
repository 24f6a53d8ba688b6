//! Channel mixdown.
//!
//! [`MixUnit`] collapses a multichannel source into one channel by
//! summation, optionally scaled by the reciprocal channel count. The
//! `allow_auto_delete` flag decides whether completion inside the
//! mixed source may propagate to whatever owns the mixer; event units
//! mix their voices with it off, so a finished voice silences itself
//! without tearing the spawner down.

use alloc::rc::Rc;
use core::cell::RefCell;

use crate::node::{BlockId, NodeRef, Unit, UnitCore};
use crate::render::RenderContext;
use crate::signal::Signal;

/// Sums every channel of its source into a single output channel.
pub struct MixUnit {
    core: UnitCore,
    scale: f32,
    allow_auto_delete: bool,
}

impl MixUnit {
    /// Creates a mixdown node over `source`.
    ///
    /// With `scaled`, the sum is multiplied by `1 / num_channels`.
    #[must_use]
    pub fn node(source: Signal, allow_auto_delete: bool, scaled: bool) -> NodeRef {
        let scale = if scaled {
            1.0 / source.num_channels() as f32
        } else {
            1.0
        };
        Rc::new(RefCell::new(MixUnit {
            core: UnitCore::new(alloc::vec![source]),
            scale,
            allow_auto_delete,
        }))
    }
}

impl Unit for MixUnit {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "mix"
    }
    fn process(
        &mut self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        _channel: usize,
        should_delete: &mut bool,
    ) {
        self.core.output().fill(0.0);
        let source = &self.core.inputs()[0];
        let num_channels = source.num_channels();
        for channel in 0..num_channels {
            let mut local = false;
            let flag: &mut bool = if self.allow_auto_delete {
                should_delete
            } else {
                &mut local
            };
            let block = source.process_for_channel(ctx, block_id, channel, flag);
            let input = block.read();
            let mut out = self.core.output().write();
            for (sample, &value) in out.iter_mut().zip(input.iter()) {
                *sample += value * self.scale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::node::{prepare_node, process_node};
    use crate::release::Releasable;

    fn ctx() -> RenderContext {
        RenderContext::new(GraphConfig::new(44_100.0, 64).unwrap())
    }

    /// Outputs a constant and finishes on its first block.
    struct OneShot {
        core: UnitCore,
        state: Releasable,
    }

    impl OneShot {
        fn node() -> NodeRef {
            Rc::new(RefCell::new(OneShot {
                core: UnitCore::new(alloc::vec![]),
                state: Releasable::new(),
            }))
        }
    }

    impl Unit for OneShot {
        fn core(&self) -> &UnitCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut UnitCore {
            &mut self.core
        }
        fn name(&self) -> &'static str {
            "oneshot"
        }
        fn process(
            &mut self,
            _ctx: &mut RenderContext,
            _block_id: BlockId,
            _channel: usize,
            should_delete: &mut bool,
        ) {
            self.core.output().fill(1.0);
            self.state.mark_done();
            *should_delete = true;
        }
        fn releasable(&mut self) -> Option<&mut Releasable> {
            Some(&mut self.state)
        }
    }

    #[test]
    fn sums_without_scaling_by_default() {
        let mut ctx = ctx();
        let node = MixUnit::node(Signal::from_values(&[1.0, 2.0]), true, false);
        prepare_node(&node, &mut ctx, 4, 0);
        let mut flag = false;
        let block = process_node(&node, &mut ctx, 0, 0, &mut flag);
        assert_eq!(block.to_vec(), [3.0; 4]);
    }

    #[test]
    fn completion_is_confined_when_auto_delete_is_off() {
        let mut ctx = ctx();
        let voice = Signal::from_node(OneShot::node());
        let guarded = MixUnit::node(voice.clone().append(Signal::from(0.0)), false, false);
        prepare_node(&guarded, &mut ctx, 4, 0);
        let mut flag = false;
        process_node(&guarded, &mut ctx, 0, 0, &mut flag);
        assert!(!flag, "completion must not escape the mixer");
        // the voice itself still got scheduled
        assert!(voice
            .channel_node(0)
            .borrow()
            .core()
            .is_scheduled_for_deletion());
    }

    #[test]
    fn completion_propagates_when_allowed() {
        let mut ctx = ctx();
        let node = MixUnit::node(
            Signal::from_node(OneShot::node()).append(Signal::from(0.0)),
            true,
            false,
        );
        prepare_node(&node, &mut ctx, 4, 0);
        let mut flag = false;
        process_node(&node, &mut ctx, 0, 0, &mut flag);
        assert!(flag);
    }
}
