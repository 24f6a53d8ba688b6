//! Property tests for graph algebra and channel expansion.

use proptest::prelude::*;
use trama_core::{GraphConfig, RenderContext, Signal};

fn ctx() -> RenderContext {
    RenderContext::new(GraphConfig::new(44_100.0, 64).unwrap())
}

fn render_channel(signal: &mut Signal, ctx: &mut RenderContext, channel: usize) -> f32 {
    signal.prepare_for_block(ctx, 4, 0);
    let mut flag = false;
    signal.process_for_channel(ctx, 0, channel, &mut flag).read()[0]
}

fn finite_values() -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-1000.0f32..1000.0, 1..8)
}

proptest! {
    // asking channel c of an n-channel signal reaches node c % n
    #[test]
    fn channel_access_wraps(values in finite_values(), channel in 0usize..32) {
        let mut ctx = ctx();
        let mut signal = Signal::from_values(&values);
        let expected = values[channel % values.len()];
        prop_assert_eq!(render_channel(&mut signal, &mut ctx, channel), expected);
    }

    // mixdown equals the plain sum of the channel values
    #[test]
    fn mix_is_additive(values in finite_values()) {
        let mut ctx = ctx();
        let mut mixed = Signal::from_values(&values).mix();
        let rendered = render_channel(&mut mixed, &mut ctx, 0);
        let sum: f32 = values.iter().sum();
        prop_assert!((rendered - sum).abs() <= 1e-3 * (1.0 + sum.abs()));
    }

    // binary expansion takes the wider channel count, and each output
    // channel combines the wrapped operand channels
    #[test]
    fn binary_expansion_wraps_operands(
        lhs in finite_values(),
        rhs in finite_values(),
        channel in 0usize..32,
    ) {
        let mut ctx = ctx();
        let mut sum = Signal::from_values(&lhs) + Signal::from_values(&rhs);
        prop_assert_eq!(sum.num_channels(), lhs.len().max(rhs.len()));
        let expected = lhs[channel % lhs.len()] + rhs[channel % rhs.len()];
        let rendered = render_channel(&mut sum, &mut ctx, channel);
        prop_assert!((rendered - expected).abs() <= 1e-3);
    }

    // null is an additive identity and a multiplicative absorber
    #[test]
    fn null_algebra_holds(values in finite_values()) {
        let signal = Signal::from_values(&values);
        prop_assert!((signal.clone() + Signal::null())
            .contains_identical_internals(&signal, true));
        prop_assert!((signal.clone() * Signal::null()).is_null());
    }

    // repeated pulls of one block id return identical samples
    #[test]
    fn processing_is_idempotent_per_block(values in finite_values(), channel in 0usize..8) {
        let mut ctx = ctx();
        let mut signal = Signal::from_values(&values) * Signal::from(0.5);
        signal.prepare_for_block(&mut ctx, 4, 0);
        let mut flag = false;
        let first = signal
            .process_for_channel(&mut ctx, 0, channel, &mut flag)
            .to_vec();
        let second = signal
            .process_for_channel(&mut ctx, 0, channel, &mut flag)
            .to_vec();
        prop_assert_eq!(first, second);
    }

    // fold output always lands inside [0, range] for positive ranges
    #[test]
    fn fold_stays_in_range(value in -1000.0f32..1000.0, range in 0.01f32..100.0) {
        let mut ctx = ctx();
        let mut folded = Signal::from(value).fold(range);
        let rendered = render_channel(&mut folded, &mut ctx, 0);
        prop_assert!(rendered >= -1e-3 && rendered <= range + 1e-3);
    }
}
