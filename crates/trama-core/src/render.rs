//! Render context and host facade.
//!
//! [`RenderContext`] carries everything the graph needs while it runs:
//! the immutable [`GraphConfig`] and the [`Deleter`] that receives
//! retired nodes. [`Renderer`] is the host-facing wrapper that owns a
//! root [`Signal`], advances the block id by the block size every
//! callback, and copies the rendered channels into host buffers.

use alloc::boxed::Box;

use crate::config::GraphConfig;
use crate::deleter::{Deleter, ImmediateDeleter};
use crate::node::{BlockId, NodeRef};
use crate::signal::Signal;

/// Per-engine state threaded through every prepare and process call.
pub struct RenderContext {
    config: GraphConfig,
    deleter: Box<dyn Deleter>,
}

impl RenderContext {
    /// Creates a context that drops retired nodes immediately.
    #[must_use]
    pub fn new(config: GraphConfig) -> Self {
        Self::with_deleter(config, Box::new(ImmediateDeleter))
    }

    /// Creates a context with a custom disposal strategy.
    #[must_use]
    pub fn with_deleter(config: GraphConfig, deleter: Box<dyn Deleter>) -> Self {
        Self { config, deleter }
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Hands a retired node to the deleter.
    pub fn dispose(&mut self, node: NodeRef) {
        self.deleter.dispose(node);
    }

    /// Reclaims any queued nodes. Call between render passes.
    pub fn flush_deleter(&mut self) {
        self.deleter.flush();
    }
}

/// Host facade over a root signal.
///
/// `process_block` renders one block per call. The number of samples
/// comes from the host buffers, which may be shorter than the
/// configured block size; the block id always advances by the number
/// of samples actually rendered so that ids keep counting samples.
pub struct Renderer {
    ctx: RenderContext,
    root: Signal,
    block_id: BlockId,
}

impl Renderer {
    /// Creates a renderer over `root` with immediate node disposal.
    #[must_use]
    pub fn new(config: GraphConfig, root: Signal) -> Self {
        Self::with_deleter(config, root, Box::new(ImmediateDeleter))
    }

    /// Creates a renderer with a custom disposal strategy.
    #[must_use]
    pub fn with_deleter(config: GraphConfig, root: Signal, deleter: Box<dyn Deleter>) -> Self {
        Self {
            ctx: RenderContext::with_deleter(config, deleter),
            root,
            block_id: 0,
        }
    }

    /// The render context.
    #[must_use]
    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    /// Mutable render context, for host-side deleter flushes.
    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.ctx
    }

    /// The root signal being rendered.
    #[must_use]
    pub fn root(&self) -> &Signal {
        &self.root
    }

    /// Swaps the root signal. Takes effect on the next block.
    pub fn set_root(&mut self, root: Signal) {
        self.root = root;
    }

    /// Block id of the next render pass.
    #[must_use]
    pub fn current_block_id(&self) -> BlockId {
        self.block_id
    }

    /// Renders one block into the host channel buffers.
    ///
    /// All buffers must share one length; that length is the block
    /// size for this pass. Root channels wrap if the host asks for
    /// more channels than the root signal has.
    pub fn process_block(&mut self, outputs: &mut [&mut [f32]]) {
        let Some(first) = outputs.first() else {
            return;
        };
        let block_size = first.len();
        if block_size == 0 {
            return;
        }
        debug_assert!(
            outputs.iter().all(|out| out.len() == block_size),
            "host channel buffers must share one length"
        );

        let block_id = self.block_id;
        self.root.prepare_for_block(&mut self.ctx, block_size, block_id);
        for (channel, out) in outputs.iter_mut().enumerate() {
            let mut should_delete = false;
            let block =
                self.root
                    .process_for_channel(&mut self.ctx, block_id, channel, &mut should_delete);
            block.copy_to(out);
        }
        self.block_id += block_size as BlockId;
    }

    /// Renders one channel of the current block, for hosts that pull
    /// channels individually.
    ///
    /// Preparation is deduplicated per block id, so pulling several
    /// channels of the same block prepares the graph once. The block id
    /// does not move; call [`advance`](Self::advance) after the last
    /// channel of the callback.
    pub fn process_channel(&mut self, channel: usize, out: &mut [f32]) {
        let block_size = out.len();
        if block_size == 0 {
            return;
        }
        let block_id = self.block_id;
        self.root.prepare_for_block(&mut self.ctx, block_size, block_id);
        let mut should_delete = false;
        let block =
            self.root
                .process_for_channel(&mut self.ctx, block_id, channel, &mut should_delete);
        block.copy_to(out);
    }

    /// Moves the block id forward by `block_size` samples, ending a
    /// per-channel render pass.
    pub fn advance(&mut self, block_size: usize) {
        self.block_id += block_size as BlockId;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_id_counts_samples() {
        let config = GraphConfig::new(44_100.0, 64).unwrap();
        let mut renderer = Renderer::new(config, Signal::from(0.5));

        let mut out = [0.0f32; 64];
        renderer.process_block(&mut [&mut out]);
        assert_eq!(renderer.current_block_id(), 64);
        assert_eq!(out[63], 0.5);

        let mut short = [0.0f32; 16];
        renderer.process_block(&mut [&mut short]);
        assert_eq!(renderer.current_block_id(), 80);
    }

    #[test]
    fn per_channel_pulls_match_the_block_call() {
        let config = GraphConfig::new(44_100.0, 8).unwrap();
        let root = Signal::from(1.0).append(Signal::from(2.0));
        let mut renderer = Renderer::new(config, root);

        let mut a = [0.0f32; 8];
        let mut b = [0.0f32; 8];
        renderer.process_channel(0, &mut a);
        renderer.process_channel(1, &mut b);
        renderer.advance(8);
        assert_eq!(a[0], 1.0);
        assert_eq!(b[0], 2.0);
        assert_eq!(renderer.current_block_id(), 8);
    }

    #[test]
    fn channels_wrap_over_the_root() {
        let config = GraphConfig::new(44_100.0, 8).unwrap();
        let root = Signal::from(1.0).append(Signal::from(2.0));
        let mut renderer = Renderer::new(config, root);

        let mut a = [0.0f32; 8];
        let mut b = [0.0f32; 8];
        let mut c = [0.0f32; 8];
        renderer.process_block(&mut [&mut a, &mut b, &mut c]);
        assert_eq!(a[0], 1.0);
        assert_eq!(b[0], 2.0);
        assert_eq!(c[0], 1.0, "third host channel wraps to root channel 0");
    }
}
