//! Envelopes and done actions.
//!
//! [`Line`] and [`Asr`] are fixed-shape envelopes; [`EnvGen`] renders
//! an arbitrary breakpoint [`Env`] with per-segment curves, an
//! optional release node (sustain point) and loop node. All of them
//! participate in the completion protocol: when the envelope ends, its
//! [`DoneAction`] decides whether the node holds its final value or
//! reports completion so the owning signal is torn down.
//!
//! Release requests are acknowledged at the next block boundary. A
//! steal is the emergency exit: the envelope ramps linearly to its end
//! level across the remaining block and finishes, whatever segment it
//! was in.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use trama_core::{BlockId, NodeRef, Rate, Releasable, RenderContext, Signal, Unit, UnitCore};

/// What happens when an envelope reaches its end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DoneAction {
    /// Keep outputting the final level forever.
    #[default]
    HoldLastValue,
    /// Report completion so the owning signal is swapped to null.
    DeleteWhenDone,
}

/// Shape of one envelope segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EnvCurve {
    /// Hold the current value; used internally for sustain.
    Empty,
    /// Jump straight to the target level.
    Step,
    /// Straight line.
    Linear,
    /// Exponential glide; both endpoint levels must share a sign and
    /// be non-zero.
    Exponential,
    /// Half sine, easing both ends.
    Sine,
    /// Quarter sine, easing one end. Two Welch segments crossing at
    /// their midpoint sum close to unity, which the texture layer
    /// relies on.
    Welch,
    /// Curvature parameter in the SuperCollider convention: 0 is
    /// linear, positive bends toward the target late.
    Numerical(f64),
}

/// A breakpoint envelope: `n + 1` levels joined by `n` timed segments.
#[derive(Clone, Debug)]
pub struct Env {
    levels: Vec<f32>,
    times: Vec<f32>,
    curves: Vec<EnvCurve>,
    release_node: Option<usize>,
    loop_node: Option<usize>,
}

impl Env {
    /// Creates an envelope with one curve shared by every segment.
    ///
    /// `levels` must hold exactly one more entry than `times`.
    #[must_use]
    pub fn new(levels: Vec<f32>, times: Vec<f32>, curve: EnvCurve) -> Self {
        let curves = alloc::vec![curve; times.len()];
        Self::with_curves(levels, times, curves)
    }

    /// Creates an envelope with per-segment curves. Missing curves
    /// fall back to linear.
    #[must_use]
    pub fn with_curves(levels: Vec<f32>, times: Vec<f32>, curves: Vec<EnvCurve>) -> Self {
        debug_assert!(
            !levels.is_empty() && levels.len() == times.len() + 1,
            "levels must hold one more entry than times"
        );
        Self {
            levels,
            times,
            curves,
            release_node: None,
            loop_node: None,
        }
    }

    /// Marks segment `node` as the sustain point: the envelope holds
    /// there until released.
    #[must_use]
    pub fn release_at(mut self, node: usize) -> Self {
        self.release_node = Some(node);
        self
    }

    /// Marks the segment the envelope jumps back to when it reaches
    /// the release node without a pending release.
    #[must_use]
    pub fn loop_at(mut self, node: usize) -> Self {
        self.loop_node = Some(node);
        self
    }

    /// Number of segments.
    #[must_use]
    pub fn num_segments(&self) -> usize {
        self.times.len()
    }

    /// Level at breakpoint `index`, clamped to the last one.
    #[must_use]
    pub fn level(&self, index: usize) -> f32 {
        self.levels[index.min(self.levels.len() - 1)]
    }

    /// Duration of segment `index`.
    #[must_use]
    pub fn time(&self, index: usize) -> f32 {
        self.times[index.min(self.times.len() - 1)]
    }

    /// Curve of segment `index`; linear when unspecified.
    #[must_use]
    pub fn curve(&self, index: usize) -> EnvCurve {
        if self.curves.is_empty() {
            EnvCurve::Linear
        } else {
            self.curves[index.min(self.curves.len() - 1)]
        }
    }

    /// The sustain segment, if any.
    #[must_use]
    pub fn release_node(&self) -> Option<usize> {
        self.release_node
    }

    /// The loop-back segment, if any.
    #[must_use]
    pub fn loop_node(&self) -> Option<usize> {
        self.loop_node
    }

    /// First breakpoint level.
    #[must_use]
    pub fn start_level(&self) -> f32 {
        self.levels[0]
    }

    /// Final breakpoint level.
    #[must_use]
    pub fn end_level(&self) -> f32 {
        self.levels[self.levels.len() - 1]
    }

    /// Total duration of all segments, ignoring sustain.
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.times.iter().sum()
    }
}

/// Sentinel step count for the sustain hold.
const HOLD: u64 = u64::MAX;

/// The per-segment recurrence shared by the audio- and control-rate
/// envelope generators. One `step` is one output value: a sample at
/// audio rate, a control period at control rate.
struct SegmentShaper {
    env: Env,
    value: f64,
    steps_until_target: u64,
    current_segment: usize,
    curve: EnvCurve,
    a2: f64,
    b1: f64,
    y1: f64,
    y2: f64,
    grow: f64,
}

impl SegmentShaper {
    fn new(env: Env) -> Self {
        let value = f64::from(env.start_level());
        Self {
            env,
            value,
            steps_until_target: HOLD,
            current_segment: 0,
            curve: EnvCurve::Empty,
            a2: 0.0,
            b1: 0.0,
            y1: 0.0,
            y2: 0.0,
            grow: 0.0,
        }
    }

    fn value(&self) -> f64 {
        self.value
    }

    fn end_level(&self) -> f64 {
        f64::from(self.env.end_level())
    }

    fn remaining_steps(&self) -> u64 {
        self.steps_until_target
    }

    /// Enters `segment`, computing the recurrence coefficients.
    /// Returns `true` when the envelope has run out of segments.
    ///
    /// Entering the release node without a pending release either
    /// jumps to the loop node or latches into a sustain hold.
    fn set_segment(&mut self, segment: usize, steps_per_second: f64, state: &Releasable) -> bool {
        self.current_segment = segment;
        if self.env.release_node() == Some(self.current_segment) && !state.is_releasing() {
            if !state.should_release() {
                if let Some(loop_node) = self.env.loop_node() {
                    self.current_segment = loop_node;
                    self.value = f64::from(self.env.level(loop_node));
                } else {
                    self.curve = EnvCurve::Empty;
                    self.steps_until_target = HOLD;
                    return false;
                }
            }
        }
        if self.current_segment >= self.env.num_segments() {
            self.value = self.end_level();
            return true;
        }

        let target = f64::from(self.env.level(self.current_segment + 1));
        let time = f64::from(self.env.time(self.current_segment));
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mut steps = (steps_per_second * time) as i64;
        let mut curve = self.env.curve(self.current_segment);
        if steps < 1 {
            steps = 1;
            curve = EnvCurve::Linear;
        }
        #[allow(clippy::cast_precision_loss)]
        let steps_f = steps as f64;

        match curve {
            EnvCurve::Numerical(c) if libm::fabs(c) > 0.001 => {
                let a1 = (target - self.value) / (1.0 - libm::exp(c));
                self.a2 = self.value + a1;
                self.b1 = a1;
                self.grow = libm::exp(c / steps_f);
            }
            EnvCurve::Numerical(_) | EnvCurve::Linear => {
                curve = EnvCurve::Linear;
                self.grow = (target - self.value) / steps_f;
            }
            EnvCurve::Exponential => {
                self.grow = libm::pow(target / self.value, 1.0 / steps_f);
            }
            EnvCurve::Sine => {
                let w = core::f64::consts::PI / steps_f;
                self.a2 = (target + self.value) * 0.5;
                self.b1 = 2.0 * libm::cos(w);
                self.y1 = (target - self.value) * 0.5;
                self.y2 = self.y1 * libm::sin(core::f64::consts::FRAC_PI_2 - w);
                self.value = self.a2 - self.y1;
            }
            EnvCurve::Welch => {
                let w = core::f64::consts::FRAC_PI_2 / steps_f;
                self.b1 = 2.0 * libm::cos(w);
                if target >= self.value {
                    self.a2 = self.value;
                    self.y1 = 0.0;
                    self.y2 = -libm::sin(w) * (target - self.value);
                } else {
                    self.a2 = target;
                    self.y1 = self.value - target;
                    self.y2 = libm::cos(w) * (self.value - target);
                }
                self.value = self.a2 + self.y1;
            }
            EnvCurve::Step => {
                self.value = target;
            }
            EnvCurve::Empty => {}
        }
        self.curve = curve;
        #[allow(clippy::cast_sign_loss)]
        {
            self.steps_until_target = steps as u64;
        }
        false
    }

    /// Advances the recurrence by one step without writing output.
    fn advance_one(&mut self) {
        match self.curve {
            EnvCurve::Numerical(_) => {
                self.b1 *= self.grow;
                self.value = self.a2 - self.b1;
            }
            EnvCurve::Linear => self.value += self.grow,
            EnvCurve::Exponential => self.value *= self.grow,
            EnvCurve::Sine => {
                let y0 = self.b1 * self.y1 - self.y2;
                self.value = self.a2 - y0;
                self.y2 = self.y1;
                self.y1 = y0;
            }
            EnvCurve::Welch => {
                let y0 = self.b1 * self.y1 - self.y2;
                self.value = self.a2 + y0;
                self.y2 = self.y1;
                self.y1 = y0;
            }
            EnvCurve::Empty | EnvCurve::Step => {}
        }
    }

    /// Writes `out.len()` steps of the current segment. The caller
    /// must not ask for more steps than remain in the segment.
    #[allow(clippy::cast_possible_truncation)]
    fn write_run(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.value as f32;
            self.advance_one();
        }
        if self.steps_until_target != HOLD {
            self.steps_until_target -= out.len() as u64;
        }
    }

    /// One control-rate step: advance, count down, move to the next
    /// segment at the boundary. Returns `true` when the envelope ends.
    fn step(&mut self, steps_per_second: f64, state: &Releasable) -> bool {
        self.advance_one();
        if self.steps_until_target != HOLD {
            self.steps_until_target -= 1;
            if self.steps_until_target == 0 {
                return self.set_segment(self.current_segment + 1, steps_per_second, state);
            }
        }
        false
    }
}

/// Audio-rate breakpoint envelope generator.
pub struct EnvGen {
    core: UnitCore,
    shaper: SegmentShaper,
    state: Releasable,
    done_action: DoneAction,
    started: bool,
}

impl EnvGen {
    /// An audio-rate envelope signal.
    #[must_use]
    pub fn ar(env: Env, done_action: DoneAction) -> Signal {
        Signal::from_node(Self::node(env, done_action))
    }

    /// A control-rate envelope signal: the recurrence advances once
    /// per control period and the output slopes between values.
    #[must_use]
    pub fn kr(env: Env, done_action: DoneAction) -> Signal {
        Signal::from_node(EnvGenK::node(env, done_action))
    }

    /// Creates the audio-rate node.
    #[must_use]
    pub fn node(env: Env, done_action: DoneAction) -> NodeRef {
        Rc::new(RefCell::new(EnvGen {
            core: UnitCore::new(Vec::new()),
            shaper: SegmentShaper::new(env),
            state: Releasable::new(),
            done_action,
            started: false,
        }))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn steal_ramp(shaper: &mut SegmentShaper, out: &mut [f32], forced: bool) {
    let target = shaper.end_level();
    if forced {
        shaper.value = target;
        out.fill(target as f32);
        return;
    }
    #[allow(clippy::cast_precision_loss)]
    let increment = (target - shaper.value) / out.len().max(1) as f64;
    for sample in out.iter_mut() {
        shaper.value += increment;
        *sample = shaper.value as f32;
    }
    shaper.value = target;
}

impl Unit for EnvGen {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "envgen"
    }

    #[allow(clippy::cast_possible_truncation)]
    fn process(
        &mut self,
        ctx: &mut RenderContext,
        _block_id: BlockId,
        _channel: usize,
        should_delete: &mut bool,
    ) {
        let steps_per_second = ctx.config().sample_rate();
        let out_block = self.core.output().clone();
        let mut out = out_block.write();

        let mut ended = false;
        if !self.started {
            self.started = true;
            ended = self.shaper.set_segment(0, steps_per_second, &self.state);
        }

        if self.state.is_done() {
            out.fill(self.shaper.value() as f32);
            return;
        }

        if self.state.should_steal() && !self.state.is_stealing() {
            let forced = self.state.steal_forced();
            self.state.mark_stealing();
            steal_ramp(&mut self.shaper, &mut out, forced);
            if self.done_action == DoneAction::DeleteWhenDone {
                *should_delete = true;
            }
            self.state.mark_done();
            return;
        }

        if !ended
            && self.state.should_release()
            && !self.state.is_releasing()
            && let Some(release_node) = self.shaper.env.release_node()
        {
            self.state.mark_releasing();
            ended = self
                .shaper
                .set_segment(release_node, steps_per_second, &self.state);
        }

        let len = out.len();
        let mut i = 0;
        while i < len && !ended {
            let run = ((len - i) as u64).min(self.shaper.remaining_steps()) as usize;
            self.shaper.write_run(&mut out[i..i + run]);
            i += run;
            if self.shaper.remaining_steps() == 0 {
                ended = self.shaper.set_segment(
                    self.shaper.current_segment + 1,
                    steps_per_second,
                    &self.state,
                );
            }
        }
        if ended {
            let end = self.shaper.end_level() as f32;
            self.shaper.value = f64::from(end);
            out[i..].fill(end);
            if self.done_action == DoneAction::DeleteWhenDone {
                *should_delete = true;
            }
            #[cfg(feature = "tracing")]
            tracing::debug!(end_level = end, "envelope finished");
            self.state.mark_done();
        }
    }

    fn releasable(&mut self) -> Option<&mut Releasable> {
        Some(&mut self.state)
    }
    fn release(&mut self) {
        self.state.request_release();
    }
    fn steal(&mut self, forced: bool) {
        self.state.request_steal(forced);
    }
}

/// Control-rate breakpoint envelope generator.
///
/// The segment recurrence runs once per control period; output slopes
/// linearly between consecutive control values, so a released
/// envelope still decays without zipper noise.
pub struct EnvGenK {
    core: UnitCore,
    shaper: SegmentShaper,
    state: Releasable,
    done_action: DoneAction,
    started: bool,
    ended: bool,
    slope_value: f64,
}

impl EnvGenK {
    /// Creates the control-rate node.
    #[must_use]
    pub fn node(env: Env, done_action: DoneAction) -> NodeRef {
        let slope_value = f64::from(env.start_level());
        Rc::new(RefCell::new(EnvGenK {
            core: UnitCore::with_rate(Vec::new(), Rate::Control),
            shaper: SegmentShaper::new(env),
            state: Releasable::new(),
            done_action,
            started: false,
            ended: false,
            slope_value,
        }))
    }
}

impl Unit for EnvGenK {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "envgen.kr"
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn process(
        &mut self,
        ctx: &mut RenderContext,
        block_id: BlockId,
        _channel: usize,
        should_delete: &mut bool,
    ) {
        let control_block_size = ctx.config().control_block_size().max(1);
        let steps_per_second = ctx.config().sample_rate() / control_block_size as f64;
        let out_block = self.core.output().clone();
        let mut out = out_block.write();

        if !self.started {
            self.started = true;
            self.ended = self.shaper.set_segment(0, steps_per_second, &self.state);
        }

        if self.state.is_done() {
            out.fill(self.slope_value as f32);
            return;
        }

        if self.state.should_steal() && !self.state.is_stealing() {
            let forced = self.state.steal_forced();
            self.state.mark_stealing();
            self.shaper.value = self.slope_value;
            steal_ramp(&mut self.shaper, &mut out, forced);
            self.slope_value = self.shaper.value();
            if self.done_action == DoneAction::DeleteWhenDone {
                *should_delete = true;
            }
            self.state.mark_done();
            return;
        }

        if !self.ended
            && self.state.should_release()
            && !self.state.is_releasing()
            && let Some(release_node) = self.shaper.env.release_node()
        {
            self.state.mark_releasing();
            self.ended = self
                .shaper
                .set_segment(release_node, steps_per_second, &self.state);
        }

        let period = control_block_size as u64;
        let mut phase = (block_id % period) as usize;
        let recip = 1.0 / control_block_size as f64;
        let mut i = 0;
        let len = out.len();
        while i < len {
            let mut slope = 0.0;
            if phase == 0 {
                let prev = self.slope_value;
                if !self.ended {
                    self.ended = self.shaper.step(steps_per_second, &self.state);
                }
                slope = (self.shaper.value() - prev) * recip;
            } else if self.slope_value != self.shaper.value() {
                // resuming mid-period: keep sloping toward the last
                // control value
                slope = (self.shaper.value() - self.slope_value)
                    / (control_block_size - phase) as f64;
            }
            let mut seg = control_block_size - phase;
            phase = 0;
            while i < len && seg > 0 {
                out[i] = self.slope_value as f32;
                self.slope_value += slope;
                i += 1;
                seg -= 1;
            }
            if seg == 0 {
                self.slope_value = self.shaper.value();
            }
        }

        if self.ended && self.slope_value == self.shaper.value() {
            if self.done_action == DoneAction::DeleteWhenDone {
                *should_delete = true;
            }
            self.state.mark_done();
        }
    }

    fn releasable(&mut self) -> Option<&mut Releasable> {
        Some(&mut self.state)
    }
    fn release(&mut self) {
        self.state.request_release();
    }
    fn steal(&mut self, forced: bool) {
        self.state.request_steal(forced);
    }
}

/// Timed linear ramp from `start` to `end`.
pub struct Line {
    core: UnitCore,
    state: Releasable,
    done_action: DoneAction,
    end: f32,
    duration: f32,
    value: f64,
    grow: f64,
    remaining: Option<u64>,
}

impl Line {
    /// A ramp signal covering `duration` seconds.
    #[must_use]
    pub fn ar(start: f32, end: f32, duration: f32, done_action: DoneAction) -> Signal {
        Signal::from_node(Self::node(start, end, duration, done_action))
    }

    /// Creates the ramp node.
    #[must_use]
    pub fn node(start: f32, end: f32, duration: f32, done_action: DoneAction) -> NodeRef {
        Rc::new(RefCell::new(Line {
            core: UnitCore::new(Vec::new()),
            state: Releasable::new(),
            done_action,
            end,
            duration,
            value: f64::from(start),
            grow: 0.0,
            remaining: None,
        }))
    }
}

impl Unit for Line {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "line"
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn process(
        &mut self,
        ctx: &mut RenderContext,
        _block_id: BlockId,
        _channel: usize,
        should_delete: &mut bool,
    ) {
        let out_block = self.core.output().clone();
        let mut out = out_block.write();

        if self.state.is_done() {
            out.fill(self.end);
            return;
        }

        if self.state.should_steal() && !self.state.is_stealing() {
            self.state.mark_stealing();
            if self.state.steal_forced() {
                self.value = f64::from(self.end);
                out.fill(self.end);
            } else {
                #[allow(clippy::cast_precision_loss)]
                let increment = (f64::from(self.end) - self.value) / out.len().max(1) as f64;
                for sample in out.iter_mut() {
                    self.value += increment;
                    *sample = self.value as f32;
                }
            }
            if self.done_action == DoneAction::DeleteWhenDone {
                *should_delete = true;
            }
            self.state.mark_done();
            return;
        }

        let remaining = self.remaining.get_or_insert_with(|| {
            let steps = (ctx.config().sample_rate() * f64::from(self.duration)) as u64;
            steps.max(1)
        });
        if self.grow == 0.0 && *remaining > 0 {
            #[allow(clippy::cast_precision_loss)]
            {
                self.grow = (f64::from(self.end) - self.value) / *remaining as f64;
            }
        }

        let mut finished = false;
        for sample in out.iter_mut() {
            if *remaining > 0 {
                *sample = self.value as f32;
                self.value += self.grow;
                *remaining -= 1;
                if *remaining == 0 {
                    finished = true;
                    self.value = f64::from(self.end);
                }
            } else {
                *sample = self.end;
            }
        }
        if finished {
            if self.done_action == DoneAction::DeleteWhenDone {
                *should_delete = true;
            }
            self.state.mark_done();
        }
    }

    fn releasable(&mut self) -> Option<&mut Releasable> {
        Some(&mut self.state)
    }
    fn steal(&mut self, forced: bool) {
        self.state.request_steal(forced);
    }
}

enum AsrStage {
    Idle,
    Attack,
    Sustain,
    Release,
}

/// Attack-sustain-release envelope.
///
/// Ramps to `level` over `attack` seconds, holds until released, then
/// ramps to zero over `release` seconds. A steal skips the release
/// ramp and fades across the remaining block.
pub struct Asr {
    core: UnitCore,
    state: Releasable,
    done_action: DoneAction,
    attack: f32,
    level: f32,
    release: f32,
    stage: AsrStage,
    value: f64,
    grow: f64,
    remaining: u64,
}

impl Asr {
    /// An ASR envelope signal.
    #[must_use]
    pub fn ar(attack: f32, level: f32, release: f32, done_action: DoneAction) -> Signal {
        Signal::from_node(Self::node(attack, level, release, done_action))
    }

    /// Creates the envelope node.
    #[must_use]
    pub fn node(attack: f32, level: f32, release: f32, done_action: DoneAction) -> NodeRef {
        Rc::new(RefCell::new(Asr {
            core: UnitCore::new(Vec::new()),
            state: Releasable::new(),
            done_action,
            attack,
            level,
            release,
            stage: AsrStage::Idle,
            value: 0.0,
            grow: 0.0,
            remaining: 0,
        }))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn begin_segment(&mut self, target: f32, duration: f32, sample_rate: f64) {
        let steps = ((sample_rate * f64::from(duration)) as u64).max(1);
        #[allow(clippy::cast_precision_loss)]
        {
            self.grow = (f64::from(target) - self.value) / steps as f64;
        }
        self.remaining = steps;
    }
}

impl Unit for Asr {
    fn core(&self) -> &UnitCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut UnitCore {
        &mut self.core
    }
    fn name(&self) -> &'static str {
        "asr"
    }

    #[allow(clippy::cast_possible_truncation)]
    fn process(
        &mut self,
        ctx: &mut RenderContext,
        _block_id: BlockId,
        _channel: usize,
        should_delete: &mut bool,
    ) {
        let sample_rate = ctx.config().sample_rate();
        let out_block = self.core.output().clone();
        let mut out = out_block.write();

        if self.state.is_done() {
            out.fill(0.0);
            return;
        }

        if self.state.should_steal() && !self.state.is_stealing() {
            self.state.mark_stealing();
            if self.state.steal_forced() {
                self.value = 0.0;
                out.fill(0.0);
            } else {
                #[allow(clippy::cast_precision_loss)]
                let increment = -self.value / out.len().max(1) as f64;
                for sample in out.iter_mut() {
                    self.value += increment;
                    *sample = self.value as f32;
                }
            }
            if self.done_action == DoneAction::DeleteWhenDone {
                *should_delete = true;
            }
            self.state.mark_done();
            return;
        }

        if matches!(self.stage, AsrStage::Idle) {
            self.stage = AsrStage::Attack;
            self.begin_segment(self.level, self.attack, sample_rate);
        }

        if self.state.should_release() && !self.state.is_releasing() {
            self.state.mark_releasing();
            self.stage = AsrStage::Release;
            self.begin_segment(0.0, self.release, sample_rate);
        }

        let len = out.len();
        let mut finished = false;
        let mut i = 0;
        while i < len && !finished {
            match self.stage {
                AsrStage::Attack => {
                    out[i] = self.value as f32;
                    self.value += self.grow;
                    self.remaining -= 1;
                    if self.remaining == 0 {
                        self.value = f64::from(self.level);
                        self.stage = AsrStage::Sustain;
                    }
                }
                AsrStage::Sustain => out[i] = self.level,
                AsrStage::Release => {
                    out[i] = self.value as f32;
                    self.value += self.grow;
                    self.remaining -= 1;
                    if self.remaining == 0 {
                        self.value = 0.0;
                        finished = true;
                    }
                }
                AsrStage::Idle => unreachable!(),
            }
            i += 1;
        }
        if finished {
            out[i..].fill(0.0);
            if self.done_action == DoneAction::DeleteWhenDone {
                *should_delete = true;
            }
            self.state.mark_done();
        }
    }

    fn releasable(&mut self) -> Option<&mut Releasable> {
        Some(&mut self.state)
    }
    fn release(&mut self) {
        self.state.request_release();
    }
    fn steal(&mut self, forced: bool) {
        self.state.request_steal(forced);
    }
}
