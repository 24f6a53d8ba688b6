//! Property tests over the unit catalog: range and shape invariants
//! that must hold for any parameter choice.

use proptest::prelude::*;
use trama_core::{GraphConfig, Renderer, Signal};
use trama_units::{DoneAction, Line, Phasor, SinOsc, WhiteNoise};

fn render_one(root: Signal, sample_rate: f64, len: usize) -> Vec<f32> {
    let config = GraphConfig::new(sample_rate, len).unwrap();
    let mut renderer = Renderer::new(config, root);
    let mut out = vec![0.0f32; len];
    renderer.process_block(&mut [out.as_mut_slice()]);
    out
}

proptest! {
    #[test]
    fn phasor_output_stays_in_range(freq in 0.1f32..2000.0) {
        let out = render_one(Phasor::ar(freq), 44_100.0, 256);
        for sample in out {
            prop_assert!((0.0..1.0).contains(&sample));
        }
    }

    #[test]
    fn sine_output_stays_in_range(freq in 0.1f32..2000.0, phase in 0.0f32..1.0) {
        let out = render_one(SinOsc::ar(freq, phase), 44_100.0, 256);
        for sample in out {
            prop_assert!(sample.abs() <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn noise_stays_in_range(seed in any::<u64>()) {
        let out = render_one(WhiteNoise::ar(seed), 44_100.0, 256);
        for sample in out {
            prop_assert!(sample.abs() <= 1.0);
        }
    }

    #[test]
    fn line_moves_monotonically_toward_its_end(
        start in -10.0f32..10.0,
        end in -10.0f32..10.0,
    ) {
        let out = render_one(
            Line::ar(start, end, 1.0, DoneAction::HoldLastValue),
            100.0,
            64,
        );
        let rising = end >= start;
        for pair in out.windows(2) {
            if rising {
                prop_assert!(pair[1] >= pair[0] - 1e-6);
            } else {
                prop_assert!(pair[1] <= pair[0] + 1e-6);
            }
        }
    }
}
