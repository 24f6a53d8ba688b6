//! Scalar and external-value nodes.
//!
//! [`NullUnit`] is the silent sentinel that stands in wherever the
//! graph would otherwise hold nothing: empty signals, torn-down
//! voices, absorbed operands. [`ConstUnit`] carries a compile-time
//! constant and is what scalar-to-signal conversions produce.
//! [`ExternalValue`] is the sanctioned way for a host control surface
//! to feed a slowly varying value into the graph: the node re-reads
//! the shared cell once per block.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use crate::node::{BlockId, NodeRef, Rate, Unit, UnitCore};
use crate::ops::ControlSlope;
use crate::render::RenderContext;

/// The silent sentinel node. Always outputs zeros; reports itself null.
pub struct NullUnit {
    core: UnitCore,
}

impl NullUnit {
    /// Creates a null node.
    #[must_use]
    pub fn node() -> NodeRef {
        Rc::new(RefCell::new(NullUnit {
            core: UnitCore::new(Vec::new()),
        }))
    }
}

impl Unit for NullUnit {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "null"
    }
    fn process(
        &mut self,
        _ctx: &mut RenderContext,
        _block_id: BlockId,
        _channel: usize,
        _should_delete: &mut bool,
    ) {
        self.core.output().fill(0.0);
    }
    fn is_null(&self) -> bool {
        true
    }
    fn const_value(&self) -> Option<f32> {
        Some(0.0)
    }
}

/// A node that outputs one constant value.
pub struct ConstUnit {
    core: UnitCore,
    value: f32,
}

impl ConstUnit {
    /// Creates a constant node.
    #[must_use]
    pub fn node(value: f32) -> NodeRef {
        Rc::new(RefCell::new(ConstUnit {
            core: UnitCore::new(Vec::new()),
            value,
        }))
    }
}

impl Unit for ConstUnit {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "const"
    }
    fn process(
        &mut self,
        _ctx: &mut RenderContext,
        _block_id: BlockId,
        _channel: usize,
        _should_delete: &mut bool,
    ) {
        self.core.output().fill(self.value);
    }
    fn const_value(&self) -> Option<f32> {
        Some(self.value)
    }
}

/// A control value shared between the host and the graph.
///
/// Cloning aliases the same cell. The graph-side node samples the cell
/// once per block, so host writes take effect at the next block
/// boundary. Single-writer is assumed; this is a value channel, not a
/// synchronization primitive.
#[derive(Clone, Debug, Default)]
pub struct ExternalValue {
    value: Rc<Cell<f32>>,
}

impl ExternalValue {
    /// Creates a shared value.
    #[must_use]
    pub fn new(initial: f32) -> Self {
        Self {
            value: Rc::new(Cell::new(initial)),
        }
    }

    /// Reads the current value.
    #[must_use]
    pub fn get(&self) -> f32 {
        self.value.get()
    }

    /// Writes a new value; the graph sees it next block.
    pub fn set(&self, value: f32) {
        self.value.set(value);
    }
}

/// Audio-rate node over an [`ExternalValue`]: holds the value sampled
/// at the top of each block for the whole block.
pub struct ExternalUnit {
    core: UnitCore,
    source: ExternalValue,
}

impl ExternalUnit {
    /// Creates a node reading from `source`.
    #[must_use]
    pub fn node(source: ExternalValue) -> NodeRef {
        Rc::new(RefCell::new(ExternalUnit {
            core: UnitCore::new(Vec::new()),
            source,
        }))
    }
}

impl Unit for ExternalUnit {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "external"
    }
    fn process(
        &mut self,
        _ctx: &mut RenderContext,
        _block_id: BlockId,
        _channel: usize,
        _should_delete: &mut bool,
    ) {
        self.core.output().fill(self.source.get());
    }
    fn to_control(&self) -> Option<NodeRef> {
        Some(ExternalUnitK::node(self.source.clone()))
    }
}

/// Control-rate node over an [`ExternalValue`]: samples at control
/// period boundaries and slopes linearly toward each new value.
pub struct ExternalUnitK {
    core: UnitCore,
    source: ExternalValue,
    slope: ControlSlope,
}

impl ExternalUnitK {
    /// Creates a control-rate node reading from `source`.
    #[must_use]
    pub fn node(source: ExternalValue) -> NodeRef {
        let slope = ControlSlope::new(source.get());
        Rc::new(RefCell::new(ExternalUnitK {
            core: UnitCore::with_rate(Vec::new(), Rate::Control),
            source,
            slope,
        }))
    }
}

impl Unit for ExternalUnitK {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "external.kr"
    }
    fn process(
        &mut self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        _channel: usize,
        _should_delete: &mut bool,
    ) {
        let target = self.source.get();
        let control_block_size = ctx.config().control_block_size();
        let mut out = self.core.output().write();
        self.slope
            .run(&mut out, block_id, control_block_size, |_| target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::node::{prepare_node, process_node};

    fn ctx() -> RenderContext {
        RenderContext::new(GraphConfig::with_control_block_size(44_100.0, 64, 16).unwrap())
    }

    #[test]
    fn null_is_silent_and_null() {
        let mut ctx = ctx();
        let node = NullUnit::node();
        prepare_node(&node, &mut ctx, 4, 0);
        let mut flag = false;
        let block = process_node(&node, &mut ctx, 0, 0, &mut flag);
        assert_eq!(block.to_vec(), [0.0; 4]);
        assert!(node.borrow().is_null());
    }

    #[test]
    fn external_value_is_sampled_once_per_block() {
        let mut ctx = ctx();
        let value = ExternalValue::new(0.25);
        let node = ExternalUnit::node(value.clone());
        prepare_node(&node, &mut ctx, 4, 0);
        let mut flag = false;
        process_node(&node, &mut ctx, 0, 0, &mut flag);

        value.set(0.75);
        // same block id: cached output, host write invisible
        let block = process_node(&node, &mut ctx, 0, 0, &mut flag);
        assert_eq!(block.to_vec(), [0.25; 4]);

        prepare_node(&node, &mut ctx, 4, 4);
        let block = process_node(&node, &mut ctx, 4, 0, &mut flag);
        assert_eq!(block.to_vec(), [0.75; 4]);
    }

    #[test]
    fn control_variant_slopes_toward_new_values() {
        let mut ctx = ctx();
        let value = ExternalValue::new(0.0);
        let node = ExternalUnitK::node(value.clone());

        value.set(16.0);
        prepare_node(&node, &mut ctx, 32, 0);
        let mut flag = false;
        let block = process_node(&node, &mut ctx, 0, 0, &mut flag);
        let samples = block.to_vec();
        // one control period (16 samples) of linear slope, then flat
        assert_eq!(samples[0], 0.0);
        assert!((samples[8] - 8.0).abs() < 1e-4);
        assert_eq!(samples[16], 16.0);
        assert_eq!(samples[31], 16.0);
    }
}
