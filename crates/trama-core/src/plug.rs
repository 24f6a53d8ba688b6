//! Hot-swappable signal sockets.
//!
//! A [`Plug`] is a fixed-width slot in the graph whose source can be
//! replaced while rendering runs. Switching can be instant or a linear
//! crossfade; during a crossfade the outgoing and incoming levels are
//! complementary, so a plug carrying steady-state material stays at
//! constant power through the swap. Sources that are neither current
//! nor fading are still pulled every block, so a re-selected source
//! resumes from wherever it has run to, not from where it was left.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::block::SignalBlock;
use crate::config::GraphConfig;
use crate::node::{BlockId, NodeRef, Unit, UnitCore};
use crate::proxy::fan_out;
use crate::render::RenderContext;
use crate::signal::Signal;

/// The node behind a [`Plug`].
///
/// Sources live in the core's input list so the prepare pass sizes and
/// tags them like any other input. Channels `1..n` are published
/// through proxies over `extra_blocks`.
pub struct PlugUnit {
    core: UnitCore,
    config: GraphConfig,
    extra_blocks: Vec<SignalBlock>,
    num_channels: usize,
    current: Option<usize>,
    fading_from: Option<usize>,
    fade_level: f32,
    current_level: f32,
    delta_fade: f32,
    release_previous_after_fade: bool,
    pending: Option<Signal>,
    retired: Vec<Signal>,
    allow_auto_delete: bool,
}

impl PlugUnit {
    fn channel_block(&self, channel: usize) -> SignalBlock {
        if channel == 0 {
            self.core.output().clone()
        } else {
            self.extra_blocks[channel - 1].clone()
        }
    }

    /// Replaces or crossfades the plugged source.
    ///
    /// With `fade_time <= 0` and `release_previous` the switch is
    /// instant and the old sources are handed to the deleter on the
    /// next block. With a positive `fade_time` the previous current
    /// source fades out over that many seconds; `release_previous`
    /// decides whether the old source list is dropped once the fade
    /// completes or kept running in the background. Setting a source
    /// that is already plugged re-selects it instead of adding a
    /// duplicate.
    pub fn set_source(&mut self, source: Signal, release_previous: bool, fade_time: f32) {
        if release_previous && fade_time <= 0.0 {
            let old = core::mem::replace(self.core.inputs_mut(), alloc::vec![source]);
            self.retired.extend(old);
            self.current = Some(0);
            self.fading_from = None;
            self.pending = None;
            return;
        }

        let existing = self
            .core
            .inputs()
            .iter()
            .position(|s| s.contains_identical_internals(&source, true));

        if let Some(current) = self.current
            && fade_time > 0.0
        {
            self.fading_from = Some(current);
            self.fade_level = 1.0;
            self.current_level = 0.0;
            #[allow(clippy::cast_possible_truncation)]
            {
                self.delta_fade =
                    (self.config.reciprocal_sample_rate() / f64::from(fade_time)) as f32;
            }
        }

        match existing {
            Some(index) => self.current = Some(index),
            None => {
                self.core.inputs_mut().push(source.clone());
                self.current = Some(self.core.inputs().len() - 1);
            }
        }

        self.release_previous_after_fade = release_previous;
        if release_previous && fade_time > 0.0 {
            self.pending = Some(source);
        }
    }

    /// Number of sources currently plugged (current, fading, and
    /// background ones).
    #[must_use]
    pub fn num_sources(&self) -> usize {
        self.core.inputs().len()
    }
}

impl Unit for PlugUnit {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "plug"
    }

    fn prepare(&mut self, ctx: &mut RenderContext, block_size: usize, _block_id: BlockId) {
        for block in &self.extra_blocks {
            block.resize(block_size);
        }
        for signal in self.retired.drain(..) {
            signal.retire(ctx);
        }
    }

    fn process(
        &mut self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        _channel: usize,
        should_delete: &mut bool,
    ) {
        let mut finished = if self.allow_auto_delete {
            *should_delete
        } else {
            false
        };
        let sources: Vec<Signal> = self.core.inputs().to_vec();
        let current = self.current;
        let fading_from = self.fading_from;

        if let (Some(cur), Some(fade)) = (current, fading_from) {
            let delta = self.delta_fade;
            let mut final_current_level = self.current_level;
            let mut final_fade_level = self.fade_level;
            for channel in 0..self.num_channels {
                let fade_block =
                    sources[fade].process_for_channel(ctx, block_id, channel, &mut finished);
                let cur_block =
                    sources[cur].process_for_channel(ctx, block_id, channel, &mut finished);
                let out_block = self.channel_block(channel);
                let mut current_level = self.current_level;
                let mut fade_level = self.fade_level;
                {
                    let fading = fade_block.read();
                    let incoming = cur_block.read();
                    let mut out = out_block.write();
                    for (i, sample) in out.iter_mut().enumerate() {
                        *sample = incoming[i] * current_level + fading[i] * fade_level;
                        current_level += delta;
                        fade_level -= delta;
                        if fade_level <= 0.0 {
                            fade_level = 0.0;
                            current_level = 1.0;
                        }
                    }
                }
                final_current_level = current_level;
                final_fade_level = fade_level;
            }
            if final_fade_level <= 0.0 {
                self.fading_from = None;
                if self.release_previous_after_fade
                    && let Some(pending) = self.pending.take()
                {
                    let old = core::mem::replace(self.core.inputs_mut(), alloc::vec![pending]);
                    for signal in old {
                        signal.retire(ctx);
                    }
                    self.current = Some(0);
                }
            } else {
                self.current_level = final_current_level;
                self.fade_level = final_fade_level;
            }
        } else if let Some(cur) = current {
            for channel in 0..self.num_channels {
                let block =
                    sources[cur].process_for_channel(ctx, block_id, channel, &mut finished);
                let out_block = self.channel_block(channel);
                let src = block.read();
                out_block.write().copy_from_slice(&src);
            }
        }

        // background sources keep running so a later re-selection
        // resumes in phase
        let sources: Vec<Signal> = self.core.inputs().to_vec();
        for (index, source) in sources.iter().enumerate() {
            if Some(index) != self.current && Some(index) != self.fading_from {
                source.process_all_channels(ctx, block_id, &mut finished);
            }
        }

        if self.allow_auto_delete {
            *should_delete = finished;
        }
    }

    fn steal(&mut self, _forced: bool) {
        // a plug is a permanent socket; soften steals so swapping the
        // host graph does not hard-cut the plugged voices
        for input in self.core_mut().inputs_mut() {
            input.steal(false);
        }
    }
}

/// Handle to a live plug: a multichannel [`Signal`] to patch into the
/// graph plus control over what fills it.
///
/// The handle shares the node with the graph, so calling it from a
/// thread other than the render thread requires the host to serialize
/// the call against rendering.
#[derive(Clone)]
pub struct Plug {
    unit: Rc<RefCell<PlugUnit>>,
    signal: Signal,
}

impl Plug {
    /// Creates a plug with `num_channels` output channels, initially
    /// carrying `source`.
    ///
    /// `allow_auto_delete` decides whether completion inside a plugged
    /// source may tear down whatever the plug feeds; plugs guarding a
    /// persistent bus are built with it off.
    #[must_use]
    pub fn new(
        config: GraphConfig,
        num_channels: usize,
        source: Signal,
        allow_auto_delete: bool,
    ) -> Self {
        let num_channels = num_channels.max(1);
        let extra_blocks: Vec<SignalBlock> =
            (1..num_channels).map(|_| SignalBlock::default()).collect();
        let unit = Rc::new(RefCell::new(PlugUnit {
            core: UnitCore::new(alloc::vec![source]),
            config,
            extra_blocks: extra_blocks.clone(),
            num_channels,
            current: Some(0),
            fading_from: None,
            fade_level: 0.0,
            current_level: 1.0,
            delta_fade: 0.0,
            release_previous_after_fade: false,
            pending: None,
            retired: Vec::new(),
            allow_auto_delete,
        }));
        let owner: NodeRef = unit.clone();
        let signal = Signal::from_nodes(fan_out(owner, &extra_blocks));
        Plug { unit, signal }
    }

    /// The plug's output, to be patched into the graph.
    #[must_use]
    pub fn signal(&self) -> Signal {
        self.signal.clone()
    }

    /// Full-control source replacement; see [`PlugUnit::set_source`].
    pub fn set_source(&self, source: impl Into<Signal>, release_previous: bool, fade_time: f32) {
        self.unit
            .borrow_mut()
            .set_source(source.into(), release_previous, fade_time);
    }

    /// Crossfades to `source` over `fade_time` seconds, dropping the
    /// old sources once the fade completes.
    pub fn fade_to(&self, source: impl Into<Signal>, fade_time: f32) {
        self.set_source(source, true, fade_time);
    }

    /// Replaces the source instantly.
    pub fn switch_to(&self, source: impl Into<Signal>) {
        self.set_source(source, true, 0.0);
    }

    /// Number of sources currently held by the plug.
    #[must_use]
    pub fn num_sources(&self) -> usize {
        self.unit.borrow().num_sources()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Renderer;

    fn config() -> GraphConfig {
        GraphConfig::new(44_100.0, 64).unwrap()
    }

    fn render(renderer: &mut Renderer, len: usize) -> Vec<f32> {
        let mut buffer = alloc::vec![0.0; len];
        let mut channels = [buffer.as_mut_slice()];
        renderer.process_block(&mut channels);
        buffer
    }

    #[test]
    fn carries_its_source() {
        let plug = Plug::new(config(), 1, Signal::from(0.5), true);
        let mut renderer = Renderer::new(config(), plug.signal());
        assert_eq!(render(&mut renderer, 8), [0.5; 8]);
    }

    #[test]
    fn instant_switch_takes_effect_next_block() {
        let plug = Plug::new(config(), 1, Signal::from(0.25), true);
        let mut renderer = Renderer::new(config(), plug.signal());
        assert_eq!(render(&mut renderer, 4), [0.25; 4]);

        plug.switch_to(0.75);
        assert_eq!(render(&mut renderer, 4), [0.75; 4]);
        assert_eq!(plug.num_sources(), 1);
    }

    #[test]
    fn crossfade_levels_are_complementary() {
        // fade over exactly 32 samples
        let fade_time = 32.0 / 44_100.0;
        let plug = Plug::new(config(), 1, Signal::from(1.0), true);
        let mut renderer = Renderer::new(config(), plug.signal());
        render(&mut renderer, 8);

        plug.fade_to(1.0_f32, fade_time);
        let faded = render(&mut renderer, 64);
        // both sources are unit constants, so complementary levels sum
        // to exactly one everywhere, including after the fade ends
        for sample in faded {
            assert!((sample - 1.0).abs() < 1e-4);
        }
        assert_eq!(plug.num_sources(), 1, "old source dropped after fade");
    }

    #[test]
    fn fade_interpolates_between_sources() {
        let fade_time = 32.0 / 44_100.0;
        let plug = Plug::new(config(), 1, Signal::from(0.0), true);
        let mut renderer = Renderer::new(config(), plug.signal());
        render(&mut renderer, 8);

        plug.fade_to(1.0_f32, fade_time);
        let faded = render(&mut renderer, 64);
        assert_eq!(faded[0], 0.0);
        assert!((faded[16] - 0.5).abs() < 0.05, "midpoint near half");
        assert_eq!(faded[63], 1.0);
    }

    #[test]
    fn reselecting_a_plugged_source_does_not_duplicate() {
        let first = Signal::from(0.25);
        let second = Signal::from(0.75);
        let plug = Plug::new(config(), 1, first.clone(), true);
        plug.set_source(second.clone(), false, 0.0);
        plug.set_source(first.clone(), false, 0.0);
        assert_eq!(plug.num_sources(), 2);
    }

    #[test]
    fn background_sources_keep_running() {
        struct Counter {
            core: UnitCore,
            calls: Rc<core::cell::Cell<usize>>,
        }
        impl Unit for Counter {
            fn core(&self) -> &UnitCore {
                &self.core
            }
            fn core_mut(&mut self) -> &mut UnitCore {
                &mut self.core
            }
            fn name(&self) -> &'static str {
                "counter"
            }
            fn process(
                &mut self,
                _ctx: &mut RenderContext,
                _block_id: BlockId,
                _channel: usize,
                _should_delete: &mut bool,
            ) {
                self.calls.set(self.calls.get() + 1);
                self.core.output().fill(0.0);
            }
        }

        let calls = Rc::new(core::cell::Cell::new(0));
        let counter = Signal::from_node(Rc::new(RefCell::new(Counter {
            core: UnitCore::new(Vec::new()),
            calls: calls.clone(),
        })));

        let plug = Plug::new(config(), 1, counter, true);
        let mut renderer = Renderer::new(config(), plug.signal());
        render(&mut renderer, 4);
        assert_eq!(calls.get(), 1);

        // demote the counter to a background source
        plug.set_source(Signal::from(0.5), false, 0.0);
        render(&mut renderer, 4);
        assert_eq!(calls.get(), 2, "background source still pulled");
    }
}
