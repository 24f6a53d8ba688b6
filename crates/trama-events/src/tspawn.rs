//! Trigger-driven voice spawning.
//!
//! A [`TSpawn`] watches a trigger input and fires its event closure on
//! every non-positive to positive transition, with the same sub-block
//! discipline as the time-driven spawner: the block is split at the
//! trigger sample, so the new voice starts exactly there. Triggers can
//! also be injected out of band through [`TSpawn::trigger`].

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use trama_core::{
    BlockId, GraphConfig, NodeRef, RenderContext, Signal, SignalBlock, Unit, UnitCore, fan_out,
};

use crate::event::{Event, EventControl, VoiceSet};

/// The node behind a [`TSpawn`] handle.
pub struct TSpawnUnit {
    core: UnitCore,
    extra_blocks: Vec<SignalBlock>,
    num_channels: usize,
    voices: VoiceSet,
    event: Event,
    control: EventControl,
    max_repeats: Option<usize>,
    events_spawned: usize,
    last_trig: f32,
    stop_requested: bool,
}

impl TSpawnUnit {
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
        tracing::debug!(event_index = self.events_spawned - 1, "triggered voice");
        voice
    }

    /// Fires the event out of band, as if a trigger crossed right now.
    ///
    /// The new voice starts at the next block. The in-band detector is
    /// armed high so one trigger cannot fire twice.
    pub fn trigger(&mut self) {
        if self.reached_max_repeats() {
            return;
        }
        self.last_trig = 1.0;
        let voice = self.spawn_voice();
        self.voices.push(voice);
    }

    /// Stops spawning and retires every live voice at the next block.
    pub fn stop_all(&mut self) {
        self.stop_requested = true;
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

impl Unit for TSpawnUnit {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "tspawn"
    }

    fn prepare(&mut self, ctx: &mut RenderContext, block_size: usize, block_id: BlockId) {
        for block in &self.extra_blocks {
            block.resize(block_size);
        }
        if self.stop_requested {
            self.stop_requested = false;
            self.voices.clear(ctx);
            self.max_repeats = Some(self.events_spawned);
        }
        self.voices.prepare(ctx, block_size, block_id);
    }

    fn process(
        &mut self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        channel: usize,
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

        if self.reached_max_repeats() {
            self.voices.accumulate(ctx, block_id, &blocks, 0, block_size);
            return;
        }

        // own copy of the trigger samples: voices rendered below may
        // re-enter the graph at sub-block ids
        let mut confined = false;
        let trig = self.core.inputs()[0]
            .process_for_channel(ctx, block_id, channel, &mut confined)
            .to_vec();

        let mut start = 0usize;
        for (i, &current) in trig.iter().enumerate().take(block_size) {
            if self.last_trig <= 0.0 && current > 0.0 && !self.reached_max_repeats() {
                let len = i - start;
                if len > 0 {
                    let sub_id = block_id + start as BlockId;
                    self.voices.prepare_segment(ctx, len, sub_id);
                    self.voices.accumulate(ctx, sub_id, &blocks, start, len);
                    start = i;
                }
                let voice = self.spawn_voice();
                self.voices.push(voice);
            }
            self.last_trig = current;
        }

        let len = block_size - start;
        if len > 0 {
            let sub_id = block_id + start as BlockId;
            self.voices.prepare_segment(ctx, len, sub_id);
            self.voices.accumulate(ctx, sub_id, &blocks, start, len);
        }
    }

    fn release(&mut self) {
        self.voices.release_all();
    }
    fn steal(&mut self, forced: bool) {
        self.voices.steal_all(forced);
    }
}

/// Handle to a trigger-driven spawner.
///
/// The handle shares the node with the graph; out-of-band triggers
/// from another thread must be serialized against rendering by the
/// host.
#[derive(Clone)]
pub struct TSpawn {
    unit: Rc<RefCell<TSpawnUnit>>,
    signal: Signal,
}

impl TSpawn {
    /// Creates a trigger-driven spawner watching `trig` (channel 0).
    #[must_use]
    pub fn new(
        config: GraphConfig,
        num_channels: usize,
        trig: impl Into<Signal>,
        max_repeats: Option<usize>,
        event: Event,
    ) -> Self {
        let num_channels = num_channels.max(1);
        let extra_blocks: Vec<SignalBlock> =
            (1..num_channels).map(|_| SignalBlock::default()).collect();
        let unit = Rc::new(RefCell::new(TSpawnUnit {
            core: UnitCore::new(alloc::vec![trig.into()]),
            extra_blocks: extra_blocks.clone(),
            num_channels,
            voices: VoiceSet::default(),
            event,
            control: EventControl::new(config, 0.0),
            max_repeats,
            events_spawned: 0,
            last_trig: 0.0,
            stop_requested: false,
        }));
        let owner: NodeRef = unit.clone();
        let signal = Signal::from_nodes(fan_out(owner, &extra_blocks));
        TSpawn { unit, signal }
    }

    /// The spawner's output signal.
    #[must_use]
    pub fn signal(&self) -> Signal {
        self.signal.clone()
    }

    /// Fires the event out of band; the voice starts next block.
    pub fn trigger(&self) {
        self.unit.borrow_mut().trigger();
    }

    /// Stops spawning and retires every live voice at the next block.
    pub fn stop_all(&self) {
        self.unit.borrow_mut().stop_all();
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
}
