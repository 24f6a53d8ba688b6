//! The node model.
//!
//! Every unit generator is a [`Unit`] behind an `Rc<RefCell<_>>`
//! ([`NodeRef`]). A node owns exactly one output channel; multichannel
//! generators expose extra channels through proxies. Shared per-node
//! state lives in [`UnitCore`].
//!
//! # The block protocol
//!
//! The host assigns each render pass a monotonically increasing block
//! id (advanced by the block size, so ids count samples since start).
//! [`process_node`] is idempotent per `(node, block id)`: the first
//! pull runs [`Unit::process`], later pulls return the already-written
//! output block. [`prepare_node`] is the matching idempotent pass that
//! sizes output buffers, propagates user data downstream, and fires
//! done notifications, before any processing happens.
//!
//! # Deletion
//!
//! Deletion is two-phase. When processing reports completion through
//! the `should_delete` flag, the wrapper records the current block id
//! on the node. On the *next* block's prepare pass the owning signal
//! sees `should_be_deleted_now` and swaps every channel of that signal
//! to a [`NullUnit`](crate::scalar::NullUnit) at once, handing the old
//! nodes to the context's deleter.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::block::SignalBlock;
use crate::release::Releasable;
use crate::render::RenderContext;
use crate::signal::Signal;

/// Sample-counting identifier of a render pass.
pub type BlockId = u64;

/// Shared handle to a graph node.
pub type NodeRef = Rc<RefCell<dyn Unit>>;

/// Processing rate of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rate {
    /// One value per sample.
    Audio,
    /// One value per control period, sloped across samples.
    Control,
}

/// Opaque tag propagated from a node to everything upstream of it.
///
/// The event layer uses this to address voices inside a spawned
/// subgraph, e.g. to release the envelope belonging to one note.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UserData(pub i32);

impl UserData {
    /// "No tag": nodes with this value do not overwrite their inputs' tags.
    pub const NONE: UserData = UserData(0x7FFF_FFFF);
    /// Reserved tag for a voice that is in the middle of being stolen.
    pub const STEALING: UserData = UserData(0x7FFF_FFFE);

    /// Returns `true` for the [`UserData::NONE`] sentinel.
    #[must_use]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Returns `true` for the [`UserData::STEALING`] sentinel.
    #[must_use]
    pub fn is_stealing(self) -> bool {
        self == Self::STEALING
    }
}

impl Default for UserData {
    fn default() -> Self {
        Self::NONE
    }
}

/// Per-node bookkeeping shared by all [`Unit`] implementations.
#[derive(Default)]
pub struct UnitCore {
    inputs: Vec<Signal>,
    output: SignalBlock,
    rate: Rate,
    last_processed: Option<BlockId>,
    last_prepared: Option<BlockId>,
    scheduled: bool,
    delete_after: BlockId,
    user_data: UserData,
}

impl Default for Rate {
    fn default() -> Self {
        Rate::Audio
    }
}

impl UnitCore {
    /// Creates audio-rate bookkeeping over the given inputs.
    #[must_use]
    pub fn new(inputs: Vec<Signal>) -> Self {
        Self::with_rate(inputs, Rate::Audio)
    }

    /// Creates bookkeeping with an explicit rate tag.
    #[must_use]
    pub fn with_rate(inputs: Vec<Signal>, rate: Rate) -> Self {
        Self {
            inputs,
            output: SignalBlock::default(),
            rate,
            last_processed: None,
            last_prepared: None,
            scheduled: false,
            delete_after: 0,
            user_data: UserData::NONE,
        }
    }

    /// Input signals, in argument order.
    #[must_use]
    pub fn inputs(&self) -> &[Signal] {
        &self.inputs
    }

    /// Mutable access to the input signals.
    pub fn inputs_mut(&mut self) -> &mut Vec<Signal> {
        &mut self.inputs
    }

    /// The node's output block.
    #[must_use]
    pub fn output(&self) -> &SignalBlock {
        &self.output
    }

    /// Replaces the output block. Proxies use this to share storage
    /// with their owner.
    pub fn set_output(&mut self, output: SignalBlock) {
        self.output = output;
    }

    /// The node's rate tag.
    #[must_use]
    pub fn rate(&self) -> Rate {
        self.rate
    }

    /// The propagated user-data tag.
    #[must_use]
    pub fn user_data(&self) -> UserData {
        self.user_data
    }

    /// Sets the user-data tag; it flows into the inputs on the next
    /// prepare pass.
    pub fn set_user_data(&mut self, user_data: UserData) {
        self.user_data = user_data;
    }

    /// Block id of the last completed process pass.
    #[must_use]
    pub fn last_processed(&self) -> Option<BlockId> {
        self.last_processed
    }

    /// Marks deletion as requested during `block_id`. The node keeps
    /// rendering for the remainder of that block.
    pub fn schedule_deletion(&mut self, block_id: BlockId) {
        self.scheduled = true;
        self.delete_after = block_id;
    }

    /// Returns `true` once deletion has been requested.
    #[must_use]
    pub fn is_scheduled_for_deletion(&self) -> bool {
        self.scheduled
    }

    /// Returns `true` when a scheduled node has outlived the block it
    /// was scheduled in, i.e. it is safe to swap it for a null node.
    #[must_use]
    pub fn should_be_deleted_now(&self, block_id: BlockId) -> bool {
        self.scheduled && block_id > self.delete_after
    }
}

/// Object-safe trait implemented by every unit generator.
///
/// A node fills its single output channel in [`Unit::process`], pulling
/// its inputs through their [`Signal`] handles. `channel` is the
/// channel index the *caller* wants; a node passes it through to its
/// inputs unchanged so that channel expansion wraps correctly at every
/// level of the graph.
pub trait Unit {
    /// Shared bookkeeping.
    fn core(&self) -> &UnitCore;

    /// Mutable shared bookkeeping.
    fn core_mut(&mut self) -> &mut UnitCore;

    /// Short static name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Fills the output block for `block_id`.
    ///
    /// Implementations set `*should_delete = true` when the node has
    /// finished and wants its owning signal torn down; the wrapper
    /// records the schedule, and the swap happens next block.
    fn process(
        &mut self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        channel: usize,
        should_delete: &mut bool,
    );

    /// Hook run once per block after buffers are sized and inputs are
    /// prepared. Most nodes need nothing here.
    fn prepare(&mut self, ctx: &mut RenderContext, block_size: usize, block_id: BlockId) {
        let _ = (ctx, block_size, block_id);
    }

    /// Returns a single-channel specialization for `channel`, or
    /// `None` if the node is already channel-agnostic.
    fn get_channel(&self, channel: usize) -> Option<NodeRef> {
        let _ = channel;
        None
    }

    /// Returns a control-rate variant, or `None` if the node is
    /// already suitable for control-rate use.
    fn to_control(&self) -> Option<NodeRef> {
        None
    }

    /// Returns `true` for the silent sentinel node.
    fn is_null(&self) -> bool {
        false
    }

    /// The compile-time constant this node outputs, if any. Drives
    /// operator elision and constant folding.
    fn const_value(&self) -> Option<f32> {
        None
    }

    /// Release/steal state, for nodes that support graceful shutdown.
    fn releasable(&mut self) -> Option<&mut Releasable> {
        None
    }

    /// Requests a graceful fade-out. The default forwards to every
    /// input; envelope-style nodes override this to begin their
    /// release segment instead.
    fn release(&mut self) {
        for input in self.core_mut().inputs_mut() {
            input.release();
        }
    }

    /// Requests an immediate shutdown. `forced` skips even the
    /// single-block fade. The default forwards to every input.
    fn steal(&mut self, forced: bool) {
        for input in self.core_mut().inputs_mut() {
            input.steal(forced);
        }
    }
}

/// Pulls one block out of a node, processing it at most once per block id.
///
/// Returns a handle to the node's output block. When the node reports
/// completion through the flag, the deletion schedule is recorded here
/// so the owning signal can retire it on the next prepare pass.
pub fn process_node(
    node: &NodeRef,
    ctx: &mut RenderContext,
    block_id: BlockId,
    channel: usize,
    should_delete: &mut bool,
) -> SignalBlock {
    let mut unit = node.borrow_mut();
    if unit.core().last_processed() != Some(block_id) {
        unit.core_mut().last_processed = Some(block_id);
        let mut finished = *should_delete;
        unit.process(ctx, block_id, channel, &mut finished);
        if finished && !unit.core().is_scheduled_for_deletion() {
            unit.core_mut().schedule_deletion(block_id);
        }
        *should_delete = finished;
    }
    unit.core().output().clone()
}

/// Prepares a node for `block_id`, at most once per block id.
///
/// Sizes the output block, pushes the node's user-data tag into its
/// inputs, recursively prepares them (which also performs their
/// null-swap pass), runs the node's own [`Unit::prepare`] hook, and
/// finally fires a pending done notification for releasable nodes.
pub fn prepare_node(
    node: &NodeRef,
    ctx: &mut RenderContext,
    block_size: usize,
    block_id: BlockId,
) {
    let mut unit = node.borrow_mut();
    if unit.core().last_prepared == Some(block_id) {
        return;
    }
    unit.core_mut().last_prepared = Some(block_id);
    unit.core().output().resize(block_size);

    let user_data = unit.core().user_data();
    for input in unit.core_mut().inputs_mut() {
        if !user_data.is_none() {
            input.set_user_data(user_data);
        }
        input.prepare_for_block(ctx, block_size, block_id);
    }

    unit.prepare(ctx, block_size, block_id);

    if let Some(state) = unit.releasable() {
        state.notify_done(user_data);
    }
}
