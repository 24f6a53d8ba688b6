//! The multichannel signal handle.
//!
//! A [`Signal`] is an ordered, reference-counted array of channel
//! nodes plus a user-data tag. It is the currency of graph
//! construction: operators combine signals, constructors lift scalars
//! and external values into signals, and the event layer passes
//! signals around as voices. Cloning shares the underlying nodes.
//!
//! # Channel expansion
//!
//! Operations over signals with different channel counts expand to the
//! wider count. Resolution happens at pull time: asking channel `c` of
//! a signal with `n` channels reaches node `c % n`, while `c` itself
//! keeps flowing down the graph, so every level wraps against its own
//! width.
//!
//! # Null algebra
//!
//! The null signal is the silent placeholder. Additive operators treat
//! it as an identity (`null + x` is `x`), multiplicative operators as
//! absorbing (`null * x` is null). Multiplying by a constant `1.0` or
//! adding `0.0` elides the operator node entirely.

use alloc::vec::Vec;
use core::fmt;
use core::ops::{Add, Div, Mul, Neg, Sub};

use crate::block::SignalBlock;
use crate::mix::MixUnit;
use crate::node::{BlockId, NodeRef, UserData, prepare_node, process_node};
use crate::ops::{self, BinOp, BinaryUnit, UnOp, UnaryUnit};
use crate::render::RenderContext;
use crate::scalar::{ConstUnit, ExternalUnit, ExternalValue, NullUnit};

/// Multichannel handle over graph nodes.
#[derive(Clone)]
pub struct Signal {
    channels: Vec<NodeRef>,
    user_data: UserData,
}

impl Signal {
    /// The silent single-channel signal.
    #[must_use]
    pub fn null() -> Self {
        Self::from_node(NullUnit::node())
    }

    /// Wraps a single node.
    #[must_use]
    pub fn from_node(node: NodeRef) -> Self {
        Self {
            channels: alloc::vec![node],
            user_data: UserData::NONE,
        }
    }

    /// Wraps one node per channel. An empty vector yields the null
    /// signal; signals never hold zero channels.
    #[must_use]
    pub fn from_nodes(nodes: Vec<NodeRef>) -> Self {
        if nodes.is_empty() {
            return Self::null();
        }
        Self {
            channels: nodes,
            user_data: UserData::NONE,
        }
    }

    /// One constant node per value.
    #[must_use]
    pub fn from_values(values: &[f32]) -> Self {
        Self::from_nodes(values.iter().map(|&v| ConstUnit::node(v)).collect())
    }

    /// Number of channels. Always at least one.
    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// The node backing `channel`, wrapping over the channel count.
    #[must_use]
    pub fn channel_node(&self, channel: usize) -> NodeRef {
        self.channels[channel % self.channels.len()].clone()
    }

    /// A single-channel signal specialized to `channel`.
    ///
    /// Nodes that distinguish channels internally (arithmetic over
    /// multichannel operands) return a dedicated single-channel node;
    /// everything else is shared as-is.
    #[must_use]
    pub fn channel_signal(&self, channel: usize) -> Signal {
        let node = &self.channels[channel % self.channels.len()];
        let specialized = {
            let unit = node.borrow();
            unit.get_channel(channel)
        };
        let mut signal = Self::from_node(specialized.unwrap_or_else(|| node.clone()));
        signal.user_data = self.user_data;
        signal
    }

    /// `true` when this is a single null channel.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.channels.len() == 1 && self.channels[0].borrow().is_null()
    }

    /// The constant this signal outputs, for single-channel constant
    /// signals.
    #[must_use]
    pub fn const_value(&self) -> Option<f32> {
        if self.channels.len() == 1 {
            self.channels[0].borrow().const_value()
        } else {
            None
        }
    }

    /// The signal's user-data tag.
    #[must_use]
    pub fn user_data(&self) -> UserData {
        self.user_data
    }

    /// Tags this signal and its channel nodes. The tag propagates
    /// further downstream on the next prepare pass.
    pub fn set_user_data(&mut self, user_data: UserData) {
        self.user_data = user_data;
        for node in &self.channels {
            node.borrow_mut().core_mut().set_user_data(user_data);
        }
    }

    /// Concatenates channels. Appending to or from null yields the
    /// other signal unchanged.
    #[must_use]
    pub fn append(self, other: Signal) -> Signal {
        if self.is_null() {
            return other;
        }
        if other.is_null() {
            return self;
        }
        let mut channels = self.channels;
        channels.extend(other.channels);
        Signal {
            channels,
            user_data: self.user_data,
        }
    }

    /// A signal with exactly `num_channels` channels. With `wrap` the
    /// existing channels repeat cyclically to fill the extra slots;
    /// without it the extra channels are explicit silence.
    #[must_use]
    pub fn with_num_channels(&self, num_channels: usize, wrap: bool) -> Signal {
        if num_channels == 0 {
            return Signal::null();
        }
        let channels = (0..num_channels)
            .map(|i| {
                if i < self.channels.len() || wrap {
                    self.channels[i % self.channels.len()].clone()
                } else {
                    NullUnit::node()
                }
            })
            .collect();
        Signal {
            channels,
            user_data: self.user_data,
        }
    }

    /// Splits into groups of `size` consecutive channels.
    #[must_use]
    pub fn group(&self, size: usize) -> Vec<Signal> {
        if size == 0 {
            return alloc::vec![self.clone()];
        }
        self.channels
            .chunks(size)
            .map(|chunk| {
                let mut signal = Signal::from_nodes(chunk.to_vec());
                signal.user_data = self.user_data;
                signal
            })
            .collect()
    }

    /// Deals channels round-robin into `stride` signals: signal `i`
    /// takes channels `i`, `i + stride`, `i + 2 * stride`, ...
    #[must_use]
    pub fn interleave(&self, stride: usize) -> Vec<Signal> {
        if stride == 0 {
            return alloc::vec![self.clone()];
        }
        (0..stride.min(self.channels.len()))
            .map(|offset| {
                let nodes = self
                    .channels
                    .iter()
                    .skip(offset)
                    .step_by(stride)
                    .cloned()
                    .collect();
                let mut signal = Signal::from_nodes(nodes);
                signal.user_data = self.user_data;
                signal
            })
            .collect()
    }

    /// Identity comparison: do the two signals share the same nodes?
    ///
    /// With `ordered`, channel order and count must match exactly;
    /// otherwise every channel of `self` must appear somewhere in
    /// `other`.
    #[must_use]
    pub fn contains_identical_internals(&self, other: &Signal, ordered: bool) -> bool {
        if ordered {
            self.channels.len() == other.channels.len()
                && self
                    .channels
                    .iter()
                    .zip(&other.channels)
                    .all(|(a, b)| alloc::rc::Rc::ptr_eq(a, b))
        } else {
            self.channels.iter().all(|a| {
                other
                    .channels
                    .iter()
                    .any(|b| alloc::rc::Rc::ptr_eq(a, b))
            })
        }
    }

    /// Sums all channels into one.
    #[must_use]
    pub fn mix(&self) -> Signal {
        self.mix_with(true, false)
    }

    /// Sums all channels into one, scaled by the reciprocal channel
    /// count.
    #[must_use]
    pub fn mix_scaled(&self) -> Signal {
        self.mix_with(true, true)
    }

    /// Mixdown with explicit deletion policy. When
    /// `allow_auto_delete` is `false`, completion of the mixed
    /// sources never propagates past the mixer, so a finished voice
    /// cannot tear down the bus it feeds.
    #[must_use]
    pub fn mix_with(&self, allow_auto_delete: bool, scaled: bool) -> Signal {
        if self.channels.len() == 1 {
            return self.clone();
        }
        Signal::from_node(MixUnit::node(self.clone(), allow_auto_delete, scaled))
    }

    /// Converts each channel to its control-rate variant, where one
    /// exists.
    #[must_use]
    pub fn kr(&self) -> Signal {
        let channels = self
            .channels
            .iter()
            .map(|node| {
                let control = node.borrow().to_control();
                control.unwrap_or_else(|| node.clone())
            })
            .collect();
        Signal {
            channels,
            user_data: self.user_data,
        }
    }

    /// Audio-rate view. Control-rate nodes already write full blocks
    /// (sampled and sloped), so this is the identity.
    #[must_use]
    pub fn ar(&self) -> Signal {
        self.clone()
    }

    /// `a.mul_add(m, a2)` builds `a * m + a2` with the usual elision.
    #[must_use]
    pub fn mul_add(&self, mul: impl Into<Signal>, add: impl Into<Signal>) -> Signal {
        self.clone() * mul.into() + add.into()
    }

    /// Per-sample minimum.
    #[must_use]
    pub fn min(&self, other: impl Into<Signal>) -> Signal {
        binary::<ops::Min>(self, &other.into())
    }

    /// Per-sample maximum.
    #[must_use]
    pub fn max(&self, other: impl Into<Signal>) -> Signal {
        binary::<ops::Max>(self, &other.into())
    }

    /// Per-sample power.
    #[must_use]
    pub fn pow(&self, exponent: impl Into<Signal>) -> Signal {
        binary::<ops::Pow>(self, &exponent.into())
    }

    /// Wraps each sample into `[0, range)`.
    #[must_use]
    pub fn wrap(&self, range: impl Into<Signal>) -> Signal {
        binary::<ops::WrapOp>(self, &range.into())
    }

    /// Folds each sample into `[0, range]`.
    #[must_use]
    pub fn fold(&self, range: impl Into<Signal>) -> Signal {
        binary::<ops::FoldOp>(self, &range.into())
    }

    /// Per-sample absolute difference.
    #[must_use]
    pub fn absdif(&self, other: impl Into<Signal>) -> Signal {
        binary::<ops::AbsDif>(self, &other.into())
    }

    /// Per-sample absolute value.
    #[must_use]
    pub fn abs(&self) -> Signal {
        unary::<ops::Abs>(self)
    }

    /// Per-sample square.
    #[must_use]
    pub fn squared(&self) -> Signal {
        unary::<ops::Squared>(self)
    }

    /// Per-sample cube.
    #[must_use]
    pub fn cubed(&self) -> Signal {
        unary::<ops::Cubed>(self)
    }

    /// Prepares every channel for `block_id`, performing the deferred
    /// null swap first.
    ///
    /// If any channel was scheduled for deletion during an earlier
    /// block, *all* channels are replaced by null nodes in the same
    /// pass and the retired nodes go to the context's deleter. A
    /// multichannel voice never loses channels one at a time.
    pub fn prepare_for_block(
        &mut self,
        ctx: &mut RenderContext,
        block_size: usize,
        block_id: BlockId,
    ) {
        let replace = self
            .channels
            .iter()
            .any(|node| node.borrow().core().should_be_deleted_now(block_id));
        if replace {
            #[cfg(feature = "tracing")]
            tracing::debug!(channels = self.channels.len(), "retiring signal to null");
            for node in &mut self.channels {
                let retired = core::mem::replace(node, NullUnit::node());
                {
                    // a finished node may never be prepared again, so
                    // its done notification fires here
                    let mut unit = retired.borrow_mut();
                    let user_data = unit.core().user_data();
                    if let Some(state) = unit.releasable() {
                        state.notify_done(user_data);
                    }
                }
                ctx.dispose(retired);
            }
        }
        for node in &self.channels {
            prepare_node(node, ctx, block_size, block_id);
        }
    }

    /// Pulls one output channel, resolving the wrap rule.
    pub fn process_for_channel(
        &self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        channel: usize,
        should_delete: &mut bool,
    ) -> SignalBlock {
        let node = &self.channels[channel % self.channels.len()];
        process_node(node, ctx, block_id, channel, should_delete)
    }

    /// Pulls every channel once, for sources that must keep running
    /// whether or not their output is used this block.
    pub fn process_all_channels(
        &self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        should_delete: &mut bool,
    ) {
        for channel in 0..self.channels.len() {
            let _ = self.process_for_channel(ctx, block_id, channel, should_delete);
        }
    }

    /// Requests a graceful fade-out from every channel.
    pub fn release(&self) {
        for node in &self.channels {
            node.borrow_mut().release();
        }
    }

    /// Requests a steal from every channel.
    pub fn steal(&self, forced: bool) {
        for node in &self.channels {
            node.borrow_mut().steal(forced);
        }
    }

    /// Hands every channel node to the context's deleter.
    pub fn retire(self, ctx: &mut RenderContext) {
        for node in self.channels {
            ctx.dispose(node);
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signal({:?}, ", self.user_data)?;
        let mut names = f.debug_list();
        for node in &self.channels {
            names.entry(&node.borrow().name());
        }
        names.finish()?;
        write!(f, ")")
    }
}

impl From<f32> for Signal {
    fn from(value: f32) -> Self {
        Signal::from_node(ConstUnit::node(value))
    }
}

impl From<ExternalValue> for Signal {
    fn from(value: ExternalValue) -> Self {
        Signal::from_node(ExternalUnit::node(value))
    }
}

fn binary<Op: BinOp>(lhs: &Signal, rhs: &Signal) -> Signal {
    if Op::NULL_IS_IDENTITY {
        if lhs.is_null() {
            return rhs.clone();
        }
        if rhs.is_null() {
            return lhs.clone();
        }
    } else if lhs.is_null() || rhs.is_null() {
        return Signal::null();
    }
    if let (Some(a), Some(b)) = (lhs.const_value(), rhs.const_value()) {
        return Signal::from(Op::apply(a, b));
    }
    if let (Some(identity), Some(value)) = (Op::left_identity(), lhs.const_value())
        && value == identity
    {
        return rhs.clone();
    }
    if let (Some(identity), Some(value)) = (Op::right_identity(), rhs.const_value())
        && value == identity
    {
        return lhs.clone();
    }
    let num_channels = lhs.num_channels().max(rhs.num_channels());
    let channels = (0..num_channels)
        .map(|_| BinaryUnit::<Op>::node(lhs.clone(), rhs.clone()))
        .collect();
    Signal {
        channels,
        user_data: UserData::NONE,
    }
}

fn unary<Op: UnOp>(input: &Signal) -> Signal {
    if input.is_null() {
        return input.clone();
    }
    if let Some(value) = input.const_value() {
        return Signal::from(Op::apply(value));
    }
    let channels = (0..input.num_channels())
        .map(|_| UnaryUnit::<Op>::node(input.clone()))
        .collect();
    Signal {
        channels,
        user_data: UserData::NONE,
    }
}

macro_rules! signal_binop {
    ($trait:ident, $method:ident, $op:ty) => {
        impl $trait<Signal> for Signal {
            type Output = Signal;
            fn $method(self, rhs: Signal) -> Signal {
                binary::<$op>(&self, &rhs)
            }
        }
        impl $trait<f32> for Signal {
            type Output = Signal;
            fn $method(self, rhs: f32) -> Signal {
                binary::<$op>(&self, &Signal::from(rhs))
            }
        }
        impl $trait<Signal> for f32 {
            type Output = Signal;
            fn $method(self, rhs: Signal) -> Signal {
                binary::<$op>(&Signal::from(self), &rhs)
            }
        }
        impl $trait<&Signal> for &Signal {
            type Output = Signal;
            fn $method(self, rhs: &Signal) -> Signal {
                binary::<$op>(self, rhs)
            }
        }
    };
}

signal_binop!(Add, add, ops::Add);
signal_binop!(Sub, sub, ops::Sub);
signal_binop!(Mul, mul, ops::Mul);
signal_binop!(Div, div, ops::Div);

impl Neg for Signal {
    type Output = Signal;
    fn neg(self) -> Signal {
        unary::<ops::Neg>(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;

    fn ctx() -> RenderContext {
        RenderContext::new(GraphConfig::new(44_100.0, 64).unwrap())
    }

    fn render_channel(signal: &mut Signal, ctx: &mut RenderContext, channel: usize) -> Vec<f32> {
        signal.prepare_for_block(ctx, 8, 0);
        let mut flag = false;
        signal
            .process_for_channel(ctx, 0, channel, &mut flag)
            .to_vec()
    }

    #[test]
    fn constant_arithmetic_folds() {
        let sum = Signal::from(2.0) + Signal::from(3.0);
        assert_eq!(sum.const_value(), Some(5.0));
    }

    #[test]
    fn multiplicative_identity_elides_the_node() {
        let base = Signal::from_values(&[0.5, 0.25]);
        let elided = base.clone() * 1.0;
        assert!(elided.contains_identical_internals(&base, true));

        let added = base.clone() + 0.0;
        assert!(added.contains_identical_internals(&base, true));
    }

    #[test]
    fn null_algebra() {
        let tone = Signal::from_values(&[0.5, 0.25]);
        assert!((Signal::null() + tone.clone()).contains_identical_internals(&tone, true));
        assert!((Signal::null() * tone.clone()).is_null());
        assert!((tone.clone() / Signal::null()).is_null());
        assert!((Signal::null() - tone.clone()).contains_identical_internals(&tone, true));
    }

    #[test]
    fn channel_wrap_resolves_modulo() {
        let mut ctx = ctx();
        let stereo = Signal::from_values(&[1.0, 2.0]);
        let mono = Signal::from(10.0);
        let mut sum = stereo + mono;
        assert_eq!(sum.num_channels(), 2);
        assert_eq!(render_channel(&mut sum, &mut ctx, 0)[0], 11.0);
        assert_eq!(render_channel(&mut sum, &mut ctx, 1)[0], 12.0);
        // channel 2 wraps back onto channel 0 of both operands
        assert_eq!(render_channel(&mut sum, &mut ctx, 2)[0], 11.0);
    }

    #[test]
    fn named_operators_compute_per_sample() {
        let mut ctx = ctx();
        let mut clipped = Signal::from(1.25).wrap(1.0);
        assert_eq!(render_channel(&mut clipped, &mut ctx, 0)[0], 0.25);

        let mut low = Signal::from_values(&[3.0, -1.0]).min(Signal::from(0.5));
        assert_eq!(render_channel(&mut low, &mut ctx, 0)[0], 0.5);
        assert_eq!(render_channel(&mut low, &mut ctx, 1)[0], -1.0);
    }

    #[test]
    fn append_and_reshape() {
        let four = Signal::from_values(&[0.0, 1.0])
            .append(Signal::from_values(&[2.0, 3.0]));
        assert_eq!(four.num_channels(), 4);

        let pairs = four.group(2);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].const_value(), None);

        let dealt = four.interleave(2);
        assert_eq!(dealt.len(), 2);
        assert_eq!(dealt[0].num_channels(), 2);

        let wide = four.with_num_channels(6, true);
        assert!(alloc::rc::Rc::ptr_eq(
            &wide.channel_node(4),
            &four.channel_node(0)
        ));
    }

    #[test]
    fn widening_without_wrap_pads_with_silence() {
        let stereo = Signal::from_values(&[1.0, 2.0]);

        let padded = stereo.with_num_channels(4, false);
        assert_eq!(padded.num_channels(), 4);
        assert!(alloc::rc::Rc::ptr_eq(
            &padded.channel_node(1),
            &stereo.channel_node(1)
        ));
        assert!(padded.channel_node(2).borrow().is_null());
        assert!(padded.channel_node(3).borrow().is_null());

        let mut ctx = ctx();
        let mut padded = padded;
        assert_eq!(render_channel(&mut padded, &mut ctx, 0)[0], 1.0);
        assert_eq!(render_channel(&mut padded, &mut ctx, 3)[0], 0.0);

        // narrowing is the same either way
        let narrow = stereo.with_num_channels(1, false);
        assert_eq!(narrow.num_channels(), 1);
        assert!(!narrow.channel_node(0).borrow().is_null());
    }

    #[test]
    fn appending_null_is_identity() {
        let tone = Signal::from(0.5);
        assert_eq!(tone.clone().append(Signal::null()).num_channels(), 1);
        assert!(Signal::null()
            .append(tone.clone())
            .contains_identical_internals(&tone, true));
    }

    #[test]
    fn mix_sums_channels() {
        let mut ctx = ctx();
        let mut mixed = Signal::from_values(&[1.0, 2.0, 3.0]).mix();
        assert_eq!(mixed.num_channels(), 1);
        assert_eq!(render_channel(&mut mixed, &mut ctx, 0)[0], 6.0);

        let mut scaled = Signal::from_values(&[1.0, 2.0, 3.0]).mix_scaled();
        assert!((render_channel(&mut scaled, &mut ctx, 0)[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn user_data_reaches_channel_nodes() {
        let mut signal = Signal::from_values(&[1.0, 2.0]);
        signal.set_user_data(UserData(9));
        assert_eq!(signal.channel_node(1).borrow().core().user_data(), UserData(9));
    }
}
