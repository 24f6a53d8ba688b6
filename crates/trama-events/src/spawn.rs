//! Time-driven voice spawning.
//!
//! A [`Spawn`] fires its event closure on a schedule measured in
//! samples, not blocks: when the next spawn time lands mid-block, the
//! block is split and the new voice renders only the tail, so voice
//! onsets are sample-accurate regardless of the host block size.
//! Several voices can start inside one block when the spawn interval
//! is shorter than the block.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use trama_core::{
    BlockId, GraphConfig, NodeRef, RenderContext, Signal, SignalBlock, Unit, UnitCore, fan_out,
};

use crate::event::{Event, EventControl, VoiceSet, accumulate_voice};

/// The node behind a [`Spawn`] handle.
pub struct SpawnUnit {
    core: UnitCore,
    extra_blocks: Vec<SignalBlock>,
    num_channels: usize,
    voices: VoiceSet,
    event: Event,
    control: EventControl,
    next_spawn_sample: BlockId,
    max_repeats: Option<usize>,
    events_spawned: usize,
    stop_requested: bool,
}

impl SpawnUnit {
    fn channel_blocks(&self) -> Vec<SignalBlock> {
        let mut blocks = Vec::with_capacity(self.num_channels);
        blocks.push(self.core.output().clone());
        blocks.extend(self.extra_blocks.iter().cloned());
        blocks
    }

    fn reached_max_repeats(&self) -> bool {
        self.max_repeats
            .is_some_and(|max| self.events_spawned >= max)
    }

    fn spawn_voice(&mut self) -> Signal {
        self.control.set_event_index(self.events_spawned);
        let voice = (self.event)(&mut self.control);
        self.events_spawned += 1;
        if self.control.take_release_previous() {
            self.voices.release_all();
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            event_index = self.events_spawned - 1,
            channels = voice.num_channels(),
            "spawned voice"
        );
        voice
    }

    /// Stops spawning and retires every live voice at the next block.
    pub fn stop_all(&mut self) {
        self.stop_requested = true;
    }

    /// Retunes the delay before the next spawn after the pending one.
    pub fn set_next_time(&mut self, seconds: f64) {
        self.control.set_next_time(seconds);
    }

    /// Number of live voices.
    #[must_use]
    pub fn num_voices(&self) -> usize {
        self.voices.len()
    }

    /// Number of events fired so far.
    #[must_use]
    pub fn events_spawned(&self) -> usize {
        self.events_spawned
    }
}

impl Unit for SpawnUnit {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "spawn"
    }

    fn prepare(&mut self, ctx: &mut RenderContext, block_size: usize, block_id: BlockId) {
        for block in &self.extra_blocks {
            block.resize(block_size);
        }
        if self.stop_requested {
            self.stop_requested = false;
            self.voices.clear(ctx);
            self.next_spawn_sample = BlockId::MAX;
        }
        self.voices.prepare(ctx, block_size, block_id);
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn process(
        &mut self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        _channel: usize,
        should_delete: &mut bool,
    ) {
        if self.reached_max_repeats() && self.voices.is_empty() {
            *should_delete = true;
        }

        let blocks = self.channel_blocks();
        let block_size = blocks[0].len();
        for block in &blocks {
            block.fill(0.0);
        }
        self.voices.accumulate(ctx, block_id, &blocks, 0, block_size);

        let next_block_start = block_id + block_size as BlockId;
        if self.next_spawn_sample < next_block_start && !self.reached_max_repeats() {
            let sample_rate = ctx.config().sample_rate();
            if self.next_spawn_sample < block_id {
                self.next_spawn_sample = block_id;
            }
            loop {
                let offset = (self.next_spawn_sample - block_id) as usize;
                let remaining = block_size - offset;

                let mut voice = self.spawn_voice();
                voice.prepare_for_block(ctx, block_size, block_id);
                voice.prepare_for_block(ctx, remaining, self.next_spawn_sample);
                accumulate_voice(
                    &voice,
                    ctx,
                    self.next_spawn_sample,
                    &blocks,
                    offset,
                    remaining,
                );
                self.voices.push(voice);

                let delta =
                    (libm::round(self.control.next_time() * sample_rate) as BlockId).max(1);
                self.next_spawn_sample += delta;
                if self.next_spawn_sample >= next_block_start || self.reached_max_repeats() {
                    break;
                }
            }
        }
    }

    fn release(&mut self) {
        self.voices.release_all();
    }
    fn steal(&mut self, forced: bool) {
        self.voices.steal_all(forced);
    }
}

/// Handle to a time-driven spawner: the signal to patch in plus
/// control over the schedule.
#[derive(Clone)]
pub struct Spawn {
    unit: Rc<RefCell<SpawnUnit>>,
    signal: Signal,
}

impl Spawn {
    /// Creates a spawner.
    ///
    /// The first event fires at the first rendered sample; later
    /// events follow every `next_time` seconds (the event closure may
    /// retune this). With `max_repeats`, the spawner stops after that
    /// many events and reports completion once the last voice ends.
    #[must_use]
    pub fn new(
        config: GraphConfig,
        num_channels: usize,
        next_time: f64,
        max_repeats: Option<usize>,
        event: Event,
    ) -> Self {
        let num_channels = num_channels.max(1);
        let extra_blocks: Vec<SignalBlock> =
            (1..num_channels).map(|_| SignalBlock::default()).collect();
        let unit = Rc::new(RefCell::new(SpawnUnit {
            core: UnitCore::new(Vec::new()),
            extra_blocks: extra_blocks.clone(),
            num_channels,
            voices: VoiceSet::default(),
            event,
            control: EventControl::new(config, next_time),
            next_spawn_sample: 0,
            max_repeats,
            events_spawned: 0,
            stop_requested: false,
        }));
        let owner: NodeRef = unit.clone();
        let signal = Signal::from_nodes(fan_out(owner, &extra_blocks));
        Spawn { unit, signal }
    }

    /// The spawner's output signal.
    #[must_use]
    pub fn signal(&self) -> Signal {
        self.signal.clone()
    }

    /// Stops spawning and retires every live voice at the next block.
    pub fn stop_all(&self) {
        self.unit.borrow_mut().stop_all();
    }

    /// Retunes the spawn interval.
    pub fn set_next_time(&self, seconds: f64) {
        self.unit.borrow_mut().set_next_time(seconds);
    }

    /// Number of live voices.
    #[must_use]
    pub fn num_voices(&self) -> usize {
        self.unit.borrow().num_voices()
    }

    /// Number of events fired so far.
    #[must_use]
    pub fn events_spawned(&self) -> usize {
        self.unit.borrow().events_spawned()
    }

    /// Releases every live voice.
    pub fn release_all(&self) {
        self.unit.borrow().voices.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trama_core::Renderer;
    use trama_units::{DoneAction, Line};

    fn render(renderer: &mut Renderer, len: usize) -> Vec<f32> {
        let mut out = alloc::vec![0.0f32; len];
        renderer.process_block(&mut [out.as_mut_slice()]);
        out
    }

    #[test]
    fn spawns_are_sample_accurate() {
        let config = GraphConfig::new(44_100.0, 512).unwrap();
        // one unit-constant voice every 10 ms = every 441 samples
        let spawn = Spawn::new(config, 1, 0.01, None, Box::new(|_| Signal::from(1.0)));
        let mut renderer = Renderer::new(config, spawn.signal());

        let out = render(&mut renderer, 512);
        assert_eq!(out[0], 1.0, "first voice starts at sample zero");
        assert_eq!(out[440], 1.0);
        assert_eq!(out[441], 2.0, "second voice lands exactly at 441");
        assert_eq!(out[511], 2.0);
        assert_eq!(spawn.num_voices(), 2);

        // next block: both voices run full-block, third starts at 882
        let out = render(&mut renderer, 512);
        assert_eq!(out[369], 2.0);
        assert_eq!(out[370], 3.0, "882 - 512 = 370 into the second block");
    }

    #[test]
    fn multiple_spawns_inside_one_block() {
        let config = GraphConfig::new(44_100.0, 512).unwrap();
        // every 100 samples
        let interval = 100.0 / 44_100.0;
        let spawn = Spawn::new(config, 1, interval, None, Box::new(|_| Signal::from(1.0)));
        let mut renderer = Renderer::new(config, spawn.signal());

        let out = render(&mut renderer, 512);
        assert_eq!(spawn.events_spawned(), 6, "samples 0,100,...,500");
        assert_eq!(out[99], 1.0);
        assert_eq!(out[100], 2.0);
        assert_eq!(out[505], 6.0);
    }

    #[test]
    fn max_repeats_makes_the_spawner_deletable() {
        let config = GraphConfig::new(100.0, 16).unwrap();
        // one 10-sample voice, once
        let spawn = Spawn::new(
            config,
            1,
            1.0,
            Some(1),
            Box::new(|_| Line::ar(1.0, 0.0, 0.1, DoneAction::DeleteWhenDone)),
        );
        let mut renderer = Renderer::new(config, spawn.signal());

        render(&mut renderer, 16); // voice spawns and finishes
        render(&mut renderer, 16); // voice husk pruned, spawner reports done
        render(&mut renderer, 16); // spawner itself swapped to null
        assert!(renderer.root().is_null());
    }

    #[test]
    fn event_can_retune_the_interval() {
        let config = GraphConfig::new(44_100.0, 512).unwrap();
        let spawn = Spawn::new(
            config,
            1,
            100.0 / 44_100.0,
            None,
            Box::new(|ctl| {
                // double the gap after every event
                ctl.set_next_time(ctl.next_time() * 2.0);
                Signal::from(1.0)
            }),
        );
        let mut renderer = Renderer::new(config, spawn.signal());
        let out = render(&mut renderer, 512);
        // spawns at 0, 200, then 200 + 400 = 600 > 512
        assert_eq!(spawn.events_spawned(), 2);
        assert_eq!(out[199], 1.0);
        assert_eq!(out[200], 2.0);
    }

    #[test]
    fn stop_all_clears_voices_and_spawning() {
        let config = GraphConfig::new(44_100.0, 64).unwrap();
        let spawn = Spawn::new(config, 1, 0.001, None, Box::new(|_| Signal::from(1.0)));
        let mut renderer = Renderer::new(config, spawn.signal());
        render(&mut renderer, 64);
        assert!(spawn.num_voices() > 0);

        spawn.stop_all();
        let out = render(&mut renderer, 64);
        assert_eq!(spawn.num_voices(), 0);
        assert_eq!(out, alloc::vec![0.0; 64]);
    }
}
