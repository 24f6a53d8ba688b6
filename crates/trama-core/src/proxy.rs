//! Proxy output channels.
//!
//! A node owns exactly one output channel, but some generators are
//! inherently multichannel: a plug crossfades every channel of its
//! source in one pass, a spawner mixes voices into all of its channels
//! at once. Such an owner computes everything during its single
//! process pass and publishes channels `1..n` through [`ProxyUnit`]s
//! that share the owner's extra output blocks.
//!
//! Ownership is one-way: proxies hold an `Rc` to the owner, the owner
//! holds only the shared blocks. Proxy and owner lifetimes stay in
//! lock step through the all-or-nothing null swap in
//! [`Signal::prepare_for_block`](crate::signal::Signal::prepare_for_block).

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::block::SignalBlock;
use crate::node::{BlockId, NodeRef, Unit, UnitCore, prepare_node, process_node};
use crate::render::RenderContext;

/// A secondary output channel of a proxy-owning node.
///
/// Pulling the proxy pulls the owner (idempotent per block id), after
/// which the shared output block already holds this channel's samples.
pub struct ProxyUnit {
    core: UnitCore,
    owner: NodeRef,
}

impl ProxyUnit {
    /// Creates a proxy over `block`, which must be one of the owner's
    /// published channel blocks.
    #[must_use]
    pub fn node(owner: NodeRef, block: SignalBlock) -> NodeRef {
        let mut core = UnitCore::new(Vec::new());
        core.set_output(block);
        Rc::new(RefCell::new(ProxyUnit { core, owner }))
    }
}

impl Unit for ProxyUnit {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "proxy"
    }
    fn process(
        &mut self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        channel: usize,
        should_delete: &mut bool,
    ) {
        let _ = process_node(&self.owner, ctx, block_id, channel, should_delete);
    }
    fn prepare(&mut self, ctx: &mut RenderContext, block_size: usize, block_id: BlockId) {
        prepare_node(&self.owner, ctx, block_size, block_id);
    }
    fn release(&mut self) {
        self.owner.borrow_mut().release();
    }
    fn steal(&mut self, forced: bool) {
        self.owner.borrow_mut().steal(forced);
    }
}

/// Builds the channel array for a proxy owner: the owner itself is
/// channel 0, and each extra block gets a proxy.
#[must_use]
pub fn fan_out(owner: NodeRef, extra_blocks: &[SignalBlock]) -> Vec<NodeRef> {
    let mut nodes = Vec::with_capacity(extra_blocks.len() + 1);
    nodes.push(owner.clone());
    for block in extra_blocks {
        nodes.push(ProxyUnit::node(owner.clone(), block.clone()));
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::signal::Signal;

    /// Writes `base` into channel 0 and `base + 1` into channel 1.
    struct TwoChannel {
        core: UnitCore,
        second: SignalBlock,
        base: f32,
        passes: usize,
    }

    impl TwoChannel {
        fn new(base: f32) -> Rc<RefCell<TwoChannel>> {
            Rc::new(RefCell::new(TwoChannel {
                core: UnitCore::new(Vec::new()),
                second: SignalBlock::default(),
                base,
                passes: 0,
            }))
        }
    }

    impl Unit for TwoChannel {
        fn core(&self) -> &UnitCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut UnitCore {
            &mut self.core
        }
        fn name(&self) -> &'static str {
            "two_channel"
        }
        fn prepare(&mut self, _ctx: &mut RenderContext, block_size: usize, _block_id: BlockId) {
            self.second.resize(block_size);
        }
        fn process(
            &mut self,
            _ctx: &mut RenderContext,
            _block_id: BlockId,
            _channel: usize,
            _should_delete: &mut bool,
        ) {
            self.passes += 1;
            self.core.output().fill(self.base);
            self.second.fill(self.base + 1.0);
        }
    }

    #[test]
    fn proxies_share_the_owner_pass() {
        let mut ctx = RenderContext::new(GraphConfig::new(44_100.0, 64).unwrap());
        let concrete = TwoChannel::new(5.0);
        let second = concrete.borrow().second.clone();
        let owner: NodeRef = concrete.clone();
        let mut signal = Signal::from_nodes(fan_out(owner, &[second]));
        assert_eq!(signal.num_channels(), 2);

        signal.prepare_for_block(&mut ctx, 4, 0);
        let mut flag = false;
        let ch0 = signal.process_for_channel(&mut ctx, 0, 0, &mut flag);
        let ch1 = signal.process_for_channel(&mut ctx, 0, 1, &mut flag);
        assert_eq!(ch0.to_vec(), [5.0; 4]);
        assert_eq!(ch1.to_vec(), [6.0; 4]);
        assert_eq!(concrete.borrow().passes, 1, "owner processed once");
    }

    #[test]
    fn proxy_first_pull_still_runs_the_owner() {
        let mut ctx = RenderContext::new(GraphConfig::new(44_100.0, 64).unwrap());
        let concrete = TwoChannel::new(1.0);
        let second = concrete.borrow().second.clone();
        let mut signal = Signal::from_nodes(fan_out(concrete.clone(), &[second]));

        signal.prepare_for_block(&mut ctx, 4, 0);
        let mut flag = false;
        // pull the proxy channel before the owner channel
        let ch1 = signal.process_for_channel(&mut ctx, 0, 1, &mut flag);
        assert_eq!(ch1.to_vec(), [2.0; 4]);
        assert_eq!(concrete.borrow().passes, 1);
    }
}
