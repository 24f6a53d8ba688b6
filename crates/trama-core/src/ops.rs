//! Arithmetic nodes.
//!
//! One generic node pair covers every arithmetic operator:
//! [`BinaryUnit`] applies a zero-sized [`BinOp`] per sample, and
//! [`BinaryUnitK`] is its control-rate sibling that evaluates the
//! operator once per control period and slopes linearly between
//! values. [`UnaryUnit`] does the same for one-operand maps.
//!
//! Channel expansion happens in the owning [`Signal`]: a binary signal
//! has `max(lhs, rhs)` channels of identical nodes, and each node
//! resolves its inputs with the incoming channel index, so a mono
//! operand wraps against a stereo one sample-for-sample.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::marker::PhantomData;

use crate::node::{BlockId, NodeRef, Rate, Unit, UnitCore};
use crate::render::RenderContext;
use crate::signal::Signal;

/// A sample-wise binary operator.
pub trait BinOp: 'static {
    /// Diagnostic name.
    const NAME: &'static str;
    /// When `true`, a null operand yields the other operand; when
    /// `false` the operator is absorbing and the result is null.
    const NULL_IS_IDENTITY: bool = true;
    /// Applies the operator to one sample pair.
    fn apply(lhs: f32, rhs: f32) -> f32;
    /// Left operand value for which the result equals the right operand.
    fn left_identity() -> Option<f32> {
        None
    }
    /// Right operand value for which the result equals the left operand.
    fn right_identity() -> Option<f32> {
        None
    }
}

/// A sample-wise unary operator.
pub trait UnOp: 'static {
    /// Diagnostic name.
    const NAME: &'static str;
    /// Applies the operator to one sample.
    fn apply(value: f32) -> f32;
}

macro_rules! bin_op {
    ($name:ident, $label:literal, $apply:expr) => {
        #[doc = concat!("The `", $label, "` operator.")]
        pub struct $name;
        impl BinOp for $name {
            const NAME: &'static str = $label;
            fn apply(lhs: f32, rhs: f32) -> f32 {
                let f: fn(f32, f32) -> f32 = $apply;
                f(lhs, rhs)
            }
        }
    };
}

/// The `+` operator.
pub struct Add;
impl BinOp for Add {
    const NAME: &'static str = "add";
    fn apply(lhs: f32, rhs: f32) -> f32 {
        lhs + rhs
    }
    fn left_identity() -> Option<f32> {
        Some(0.0)
    }
    fn right_identity() -> Option<f32> {
        Some(0.0)
    }
}

/// The `-` operator.
pub struct Sub;
impl BinOp for Sub {
    const NAME: &'static str = "sub";
    fn apply(lhs: f32, rhs: f32) -> f32 {
        lhs - rhs
    }
    fn right_identity() -> Option<f32> {
        Some(0.0)
    }
}

/// The `*` operator. Null operands absorb: silence times anything is
/// silence.
pub struct Mul;
impl BinOp for Mul {
    const NAME: &'static str = "mul";
    const NULL_IS_IDENTITY: bool = false;
    fn apply(lhs: f32, rhs: f32) -> f32 {
        lhs * rhs
    }
    fn left_identity() -> Option<f32> {
        Some(1.0)
    }
    fn right_identity() -> Option<f32> {
        Some(1.0)
    }
}

/// The `/` operator. Null operands absorb.
pub struct Div;
impl BinOp for Div {
    const NAME: &'static str = "div";
    const NULL_IS_IDENTITY: bool = false;
    fn apply(lhs: f32, rhs: f32) -> f32 {
        lhs / rhs
    }
    fn right_identity() -> Option<f32> {
        Some(1.0)
    }
}

bin_op!(Min, "min", |a, b| if a > b { b } else { a });
bin_op!(Max, "max", |a, b| if a < b { b } else { a });
bin_op!(Pow, "pow", libm::powf);
bin_op!(WrapOp, "wrap", |a, b| wrap(a, 0.0, b));
bin_op!(FoldOp, "fold", |a, b| fold(a, 0.0, b));
bin_op!(AbsDif, "absdif", |a, b| {
    let d = a - b;
    if d < 0.0 { -d } else { d }
});

macro_rules! un_op {
    ($name:ident, $label:literal, $apply:expr) => {
        #[doc = concat!("The `", $label, "` map.")]
        pub struct $name;
        impl UnOp for $name {
            const NAME: &'static str = $label;
            fn apply(value: f32) -> f32 {
                let f: fn(f32) -> f32 = $apply;
                f(value)
            }
        }
    };
}

un_op!(Neg, "neg", |v| -v);
un_op!(Abs, "abs", |v| if v < 0.0 { -v } else { v });
un_op!(Squared, "squared", |v| v * v);
un_op!(Cubed, "cubed", |v| v * v * v);

/// Wraps `value` into `[lo, hi)`.
#[must_use]
pub fn wrap(value: f32, lo: f32, hi: f32) -> f32 {
    let mut v = value;
    let range;
    if v >= hi {
        range = hi - lo;
        v -= range;
        if v < hi {
            return v;
        }
    } else if v < lo {
        range = hi - lo;
        v += range;
        if v >= lo {
            return v;
        }
    } else {
        return v;
    }
    if hi == lo {
        return lo;
    }
    v - range * libm::floorf((v - lo) / range)
}

/// Folds `value` into `[lo, hi]`, mirroring at the bounds.
#[must_use]
pub fn fold(value: f32, lo: f32, hi: f32) -> f32 {
    let x = value - lo;
    let mut v = value;
    if v >= hi {
        v = hi + hi - v;
        if v >= lo {
            return v;
        }
    } else if v < lo {
        v = lo + lo - v;
        if v < hi {
            return v;
        }
    } else {
        return v;
    }
    if hi == lo {
        return lo;
    }
    let range = hi - lo;
    let range2 = range + range;
    let mut c = x - range2 * libm::floorf(x / range2);
    if c >= range {
        c = range2 - c;
    }
    c + lo
}

/// The control-rate slope loop shared by every `*K` node.
///
/// Values are sampled at control-period boundaries (block ids count
/// samples, so the phase within a period is `block_id % period`) and
/// the output ramps linearly across the period that follows, snapping
/// to the sampled value at the segment end.
pub struct ControlSlope {
    value: f32,
}

impl ControlSlope {
    /// Creates a slope resting at `initial`.
    #[must_use]
    pub fn new(initial: f32) -> Self {
        Self { value: initial }
    }

    /// The value the slope currently rests at.
    #[must_use]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Runs one block. `sample_at(i)` evaluates the control function
    /// at sample offset `i`; it is only called at period boundaries.
    pub fn run<F>(
        &mut self,
        out: &mut [f32],
        block_id: BlockId,
        control_block_size: usize,
        mut sample_at: F,
    ) where
        F: FnMut(usize) -> f32,
    {
        let period = control_block_size.max(1);
        let mut phase = (block_id % period as BlockId) as usize;
        let mut i = 0;
        while i < out.len() {
            let mut next = self.value;
            if phase == 0 {
                next = sample_at(i);
            }
            let mut seg = period - phase;
            phase = 0;
            if next == self.value {
                while i < out.len() && seg > 0 {
                    out[i] = next;
                    i += 1;
                    seg -= 1;
                }
            } else {
                let slope = (next - self.value) / period as f32;
                while i < out.len() && seg > 0 {
                    out[i] = self.value;
                    self.value += slope;
                    i += 1;
                    seg -= 1;
                }
                self.value = next;
            }
        }
    }
}

/// Audio-rate binary arithmetic node.
pub struct BinaryUnit<Op: BinOp> {
    core: UnitCore,
    _op: PhantomData<Op>,
}

impl<Op: BinOp> BinaryUnit<Op> {
    /// Creates a node applying `Op` to the two operands.
    #[must_use]
    pub fn node(lhs: Signal, rhs: Signal) -> NodeRef {
        Rc::new(RefCell::new(BinaryUnit::<Op> {
            core: UnitCore::new(alloc::vec![lhs, rhs]),
            _op: PhantomData,
        }))
    }
}

impl<Op: BinOp> Unit for BinaryUnit<Op> {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        Op::NAME
    }
    fn process(
        &mut self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        channel: usize,
        should_delete: &mut bool,
    ) {
        let lhs = self.core.inputs()[0].process_for_channel(ctx, block_id, channel, should_delete);
        let rhs = self.core.inputs()[1].process_for_channel(ctx, block_id, channel, should_delete);
        let mut out = self.core.output().write();
        let lhs = lhs.read();
        let rhs = rhs.read();
        debug_assert!(lhs.len() >= out.len() && rhs.len() >= out.len());
        for (i, sample) in out.iter_mut().enumerate() {
            *sample = Op::apply(lhs[i], rhs[i]);
        }
    }
    fn get_channel(&self, channel: usize) -> Option<NodeRef> {
        let lhs = self.core.inputs()[0].channel_signal(channel);
        let rhs = self.core.inputs()[1].channel_signal(channel);
        Some(BinaryUnit::<Op>::node(lhs, rhs))
    }
    fn to_control(&self) -> Option<NodeRef> {
        Some(BinaryUnitK::<Op>::node(
            self.core.inputs()[0].clone(),
            self.core.inputs()[1].clone(),
        ))
    }
}

/// Control-rate binary arithmetic node: evaluates `Op` once per
/// control period and slopes between results.
pub struct BinaryUnitK<Op: BinOp> {
    core: UnitCore,
    slope: ControlSlope,
    _op: PhantomData<Op>,
}

impl<Op: BinOp> BinaryUnitK<Op> {
    /// Creates a control-rate node applying `Op` to the two operands.
    #[must_use]
    pub fn node(lhs: Signal, rhs: Signal) -> NodeRef {
        Rc::new(RefCell::new(BinaryUnitK::<Op> {
            core: UnitCore::with_rate(alloc::vec![lhs, rhs], Rate::Control),
            slope: ControlSlope::new(0.0),
            _op: PhantomData,
        }))
    }
}

impl<Op: BinOp> Unit for BinaryUnitK<Op> {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        Op::NAME
    }
    fn process(
        &mut self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        channel: usize,
        should_delete: &mut bool,
    ) {
        let control_block_size = ctx.config().control_block_size();
        let lhs = self.core.inputs()[0].process_for_channel(ctx, block_id, channel, should_delete);
        let rhs = self.core.inputs()[1].process_for_channel(ctx, block_id, channel, should_delete);
        let mut out = self.core.output().write();
        let lhs = lhs.read();
        let rhs = rhs.read();
        self.slope
            .run(&mut out, block_id, control_block_size, |i| {
                Op::apply(lhs[i], rhs[i])
            });
    }
    fn get_channel(&self, channel: usize) -> Option<NodeRef> {
        let lhs = self.core.inputs()[0].channel_signal(channel);
        let rhs = self.core.inputs()[1].channel_signal(channel);
        Some(BinaryUnitK::<Op>::node(lhs, rhs))
    }
}

/// Audio-rate unary arithmetic node.
pub struct UnaryUnit<Op: UnOp> {
    core: UnitCore,
    _op: PhantomData<Op>,
}

impl<Op: UnOp> UnaryUnit<Op> {
    /// Creates a node applying `Op` to the operand.
    #[must_use]
    pub fn node(input: Signal) -> NodeRef {
        Rc::new(RefCell::new(UnaryUnit::<Op> {
            core: UnitCore::new(alloc::vec![input]),
            _op: PhantomData,
        }))
    }
}

impl<Op: UnOp> Unit for UnaryUnit<Op> {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        Op::NAME
    }
    fn process(
        &mut self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        channel: usize,
        should_delete: &mut bool,
    ) {
        let input =
            self.core.inputs()[0].process_for_channel(ctx, block_id, channel, should_delete);
        let mut out = self.core.output().write();
        let input = input.read();
        for (i, sample) in out.iter_mut().enumerate() {
            *sample = Op::apply(input[i]);
        }
    }
    fn get_channel(&self, channel: usize) -> Option<NodeRef> {
        Some(UnaryUnit::<Op>::node(
            self.core.inputs()[0].channel_signal(channel),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_stays_in_range() {
        assert_eq!(wrap(0.5, 0.0, 1.0), 0.5);
        assert_eq!(wrap(1.25, 0.0, 1.0), 0.25);
        assert!((wrap(-0.25, 0.0, 1.0) - 0.75).abs() < 1e-6);
        assert_eq!(wrap(7.5, 0.0, 1.0), 0.5);
    }

    #[test]
    fn fold_mirrors_at_bounds() {
        assert_eq!(fold(0.5, 0.0, 1.0), 0.5);
        assert_eq!(fold(1.25, 0.0, 1.0), 0.75);
        assert_eq!(fold(-0.25, 0.0, 1.0), 0.25);
    }

    #[test]
    fn control_slope_ramps_and_snaps() {
        let mut slope = ControlSlope::new(0.0);
        let mut out = [0.0f32; 8];
        slope.run(&mut out, 0, 4, |_| 4.0);
        assert_eq!(out, [0.0, 1.0, 2.0, 3.0, 4.0, 4.0, 4.0, 4.0]);
        assert_eq!(slope.value(), 4.0);
    }

    #[test]
    fn control_slope_resumes_mid_period() {
        let mut slope = ControlSlope::new(1.0);
        let mut out = [0.0f32; 2];
        // block starts two samples into a four-sample period: no new
        // sample is taken, the current value holds
        slope.run(&mut out, 6, 4, |_| unreachable!());
        assert_eq!(out, [1.0, 1.0]);
    }
}
