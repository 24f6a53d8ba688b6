//! Keyed polyphonic voice management.
//!
//! A [`Voicer`] maps discrete note-on/note-off input to spawned
//! voices. Each voice is tagged with a `(channel, note)` key packed
//! into its [`UserData`]; a note-off releases the most recently added
//! voice with a matching key. When a polyphony ceiling is set, a
//! note-on that would exceed it steals the oldest voice that is not
//! already being stolen.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use trama_core::{
    BlockId, GraphConfig, NodeRef, RenderContext, Signal, SignalBlock, Unit, UnitCore, UserData,
    fan_out,
};

use crate::event::{EventControl, VoiceSet};

/// Voice selection policy at the polyphony ceiling.
///
/// Only [`StealMode::Oldest`] is implemented; the enum leaves room for
/// quietest-voice selection should level tracking be added.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StealMode {
    /// Steal the voice that has been sounding the longest.
    #[default]
    Oldest,
}

/// A note-on as delivered to the voice event closure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteEvent {
    /// Source channel, e.g. a MIDI channel.
    pub channel: u8,
    /// Note number.
    pub note: u8,
    /// Velocity in `(0, 1]`; zero never reaches the closure.
    pub velocity: f32,
}

/// A voice-building closure keyed by note events.
pub type VoiceEvent = alloc::boxed::Box<dyn FnMut(&mut EventControl, NoteEvent) -> Signal>;

fn voice_tag(channel: u8, note: u8) -> UserData {
    UserData((i32::from(channel) << 8) | i32::from(note))
}

/// The node behind a [`Voicer`] handle.
pub struct VoicerUnit {
    core: UnitCore,
    extra_blocks: Vec<SignalBlock>,
    num_channels: usize,
    voices: VoiceSet,
    event: VoiceEvent,
    control: EventControl,
    num_voices: usize,
    steal_mode: StealMode,
    forced_steal: bool,
}

impl VoicerUnit {
    fn channel_blocks(&self) -> Vec<SignalBlock> {
        let mut blocks = Vec::with_capacity(self.num_channels);
        blocks.push(self.core.output().clone());
        blocks.extend(self.extra_blocks.iter().cloned());
        blocks
    }

    /// Starts a voice for `(channel, note)`. A zero or negative
    /// velocity is a note-off.
    pub fn note_on(&mut self, channel: u8, note: u8, velocity: f32) {
        if velocity <= 0.0 {
            self.note_off(channel, note);
            return;
        }

        if self.num_voices > 0 {
            let sounding = self
                .voices
                .iter()
                .filter(|voice| !voice.user_data().is_stealing())
                .count();
            if sounding >= self.num_voices {
                let victim = match self.steal_mode {
                    // the first non-stealing voice is the oldest
                    StealMode::Oldest => self
                        .voices
                        .iter_mut()
                        .find(|voice| !voice.user_data().is_stealing()),
                };
                if let Some(victim) = victim {
                    victim.set_user_data(UserData::STEALING);
                    victim.steal(self.forced_steal);
                }
            }
        }

        let note_event = NoteEvent {
            channel,
            note,
            velocity,
        };
        let mut voice = (self.event)(&mut self.control, note_event);
        let _ = self.control.take_release_previous();
        voice.set_user_data(voice_tag(channel, note));
        #[cfg(feature = "tracing")]
        tracing::debug!(channel, note, velocity, "voice on");
        self.voices.push(voice);
    }

    /// Releases the most recently started voice for `(channel, note)`.
    pub fn note_off(&mut self, channel: u8, note: u8) {
        let tag = voice_tag(channel, note);
        if let Some(voice) = self
            .voices
            .iter()
            .rev()
            .find(|voice| voice.user_data() == tag)
        {
            #[cfg(feature = "tracing")]
            tracing::debug!(channel, note, "voice off");
            voice.release();
        }
    }

    /// Number of live voices, including ones mid-steal.
    #[must_use]
    pub fn num_live_voices(&self) -> usize {
        self.voices.len()
    }

    /// The tags of the live voices, oldest first.
    #[must_use]
    pub fn voice_tags(&self) -> Vec<UserData> {
        self.voices.iter().map(Signal::user_data).collect()
    }
}

impl Unit for VoicerUnit {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "voicer"
    }

    fn prepare(&mut self, ctx: &mut RenderContext, block_size: usize, block_id: BlockId) {
        for block in &self.extra_blocks {
            block.resize(block_size);
        }
        self.voices.prepare(ctx, block_size, block_id);
    }

    fn process(
        &mut self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        _channel: usize,
        _should_delete: &mut bool,
    ) {
        let blocks = self.channel_blocks();
        let block_size = blocks[0].len();
        for block in &blocks {
            block.fill(0.0);
        }
        self.voices.accumulate(ctx, block_id, &blocks, 0, block_size);
    }

    fn release(&mut self) {
        self.voices.release_all();
    }
    fn steal(&mut self, forced: bool) {
        self.voices.steal_all(forced);
    }
}

/// Handle to a polyphonic voicer.
///
/// The handle shares the node with the graph; note calls arriving from
/// a MIDI or UI thread must be serialized against rendering by the
/// host.
#[derive(Clone)]
pub struct Voicer {
    unit: Rc<RefCell<VoicerUnit>>,
    signal: Signal,
}

impl Voicer {
    /// Creates a voicer.
    ///
    /// `num_voices` is the polyphony ceiling; zero means unlimited.
    /// With `forced_steal`, stolen voices cut to their end level at the
    /// next block instead of fading across it.
    #[must_use]
    pub fn new(
        config: GraphConfig,
        num_channels: usize,
        num_voices: usize,
        forced_steal: bool,
        event: VoiceEvent,
    ) -> Self {
        let num_channels = num_channels.max(1);
        let extra_blocks: Vec<SignalBlock> =
            (1..num_channels).map(|_| SignalBlock::default()).collect();
        let unit = Rc::new(RefCell::new(VoicerUnit {
            core: UnitCore::new(Vec::new()),
            extra_blocks: extra_blocks.clone(),
            num_channels,
            voices: VoiceSet::default(),
            event,
            control: EventControl::new(config, 0.0),
            num_voices,
            steal_mode: StealMode::Oldest,
            forced_steal,
        }));
        let owner: NodeRef = unit.clone();
        let signal = Signal::from_nodes(fan_out(owner, &extra_blocks));
        Voicer { unit, signal }
    }

    /// The voicer's output signal.
    #[must_use]
    pub fn signal(&self) -> Signal {
        self.signal.clone()
    }

    /// Starts a voice; zero velocity is a note-off.
    pub fn note_on(&self, channel: u8, note: u8, velocity: f32) {
        self.unit.borrow_mut().note_on(channel, note, velocity);
    }

    /// Releases the most recent voice for `(channel, note)`.
    pub fn note_off(&self, channel: u8, note: u8) {
        self.unit.borrow_mut().note_off(channel, note);
    }

    /// Number of live voices, including ones mid-steal.
    #[must_use]
    pub fn num_live_voices(&self) -> usize {
        self.unit.borrow().num_live_voices()
    }

    /// The tags of the live voices, oldest first.
    #[must_use]
    pub fn voice_tags(&self) -> Vec<UserData> {
        self.unit.borrow().voice_tags()
    }
}
