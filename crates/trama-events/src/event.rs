//! Event closures and shared voice bookkeeping.

use alloc::vec::Vec;

use trama_core::{BlockId, GraphConfig, RenderContext, Signal, SignalBlock};

/// Context handed to an event closure while it builds a voice.
///
/// The closure can inspect the engine configuration, see how many
/// events fired before it, retune the delay until the next spawn, and
/// ask for every existing voice to be released before the new one is
/// added (the trigger-crossfade idiom).
pub struct EventControl {
    config: GraphConfig,
    event_index: usize,
    next_time: f64,
    release_previous: bool,
}

impl EventControl {
    pub(crate) fn new(config: GraphConfig, next_time: f64) -> Self {
        Self {
            config,
            event_index: 0,
            next_time,
            release_previous: false,
        }
    }

    /// Engine configuration, for closures that need the sample rate.
    #[must_use]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Zero-based index of the event being spawned.
    #[must_use]
    pub fn event_index(&self) -> usize {
        self.event_index
    }

    /// Seconds until the next time-driven spawn.
    #[must_use]
    pub fn next_time(&self) -> f64 {
        self.next_time
    }

    /// Retunes the delay before the following spawn. Takes effect for
    /// the event after the one currently being built.
    pub fn set_next_time(&mut self, seconds: f64) {
        self.next_time = seconds;
    }

    /// Asks the spawner to release every voice that existed before
    /// this event, once the closure returns and before the new voice
    /// is added.
    pub fn release_previous_events(&mut self) {
        self.release_previous = true;
    }

    pub(crate) fn set_event_index(&mut self, index: usize) {
        self.event_index = index;
    }

    pub(crate) fn take_release_previous(&mut self) -> bool {
        core::mem::take(&mut self.release_previous)
    }
}

/// A voice-building closure.
pub type Event = alloc::boxed::Box<dyn FnMut(&mut EventControl) -> Signal>;

fn is_finished(voice: &Signal) -> bool {
    (0..voice.num_channels()).all(|c| voice.channel_node(c).borrow().is_null())
}

/// The live voices of a spawning unit.
///
/// Voices are mixed with completion confined, so a finished voice
/// silences itself (its channels swap to null during prepare) without
/// deleting the spawner; the swapped-out husks are pruned here.
#[derive(Default)]
pub(crate) struct VoiceSet {
    voices: Vec<Signal>,
}

impl VoiceSet {
    pub(crate) fn push(&mut self, voice: Signal) {
        self.voices.push(voice);
    }

    pub(crate) fn len(&self) -> usize {
        self.voices.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub(crate) fn iter(&self) -> core::slice::Iter<'_, Signal> {
        self.voices.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> core::slice::IterMut<'_, Signal> {
        self.voices.iter_mut()
    }

    /// Prepares every voice, letting finished ones null-swap, then
    /// prunes the husks.
    pub(crate) fn prepare(
        &mut self,
        ctx: &mut RenderContext,
        block_size: usize,
        block_id: BlockId,
    ) {
        for voice in &mut self.voices {
            voice.prepare_for_block(ctx, block_size, block_id);
        }
        self.voices.retain(|voice| !is_finished(voice));
    }

    /// Re-prepares every voice for a sub-block render.
    pub(crate) fn prepare_segment(
        &mut self,
        ctx: &mut RenderContext,
        len: usize,
        sub_block_id: BlockId,
    ) {
        for voice in &mut self.voices {
            voice.prepare_for_block(ctx, len, sub_block_id);
        }
    }

    /// Accumulates every voice into `blocks[offset..offset + len]`,
    /// one output channel per block, wrapping voice channels.
    /// Completion stays confined to each voice.
    pub(crate) fn accumulate(
        &self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        blocks: &[SignalBlock],
        offset: usize,
        len: usize,
    ) {
        for voice in &self.voices {
            accumulate_voice(voice, ctx, block_id, blocks, offset, len);
        }
    }

    pub(crate) fn release_all(&self) {
        for voice in &self.voices {
            voice.release();
        }
    }

    pub(crate) fn steal_all(&self, forced: bool) {
        for voice in &self.voices {
            voice.steal(forced);
        }
    }

    /// Retires every voice immediately.
    pub(crate) fn clear(&mut self, ctx: &mut RenderContext) {
        for voice in self.voices.drain(..) {
            voice.retire(ctx);
        }
    }
}

/// Adds one voice's output into the spawner's channel blocks.
pub(crate) fn accumulate_voice(
    voice: &Signal,
    ctx: &mut RenderContext,
    block_id: BlockId,
    blocks: &[SignalBlock],
    offset: usize,
    len: usize,
) {
    for (channel, out_block) in blocks.iter().enumerate() {
        let mut confined = false;
        let block = voice.process_for_channel(ctx, block_id, channel, &mut confined);
        let input = block.read();
        let mut out = out_block.write();
        let n = len.min(input.len());
        for i in 0..n {
            out[offset + i] += input[i];
        }
    }
}
