// Built-in modifiers: ramping, windup limiting, freezing, dead-band,
// bang-bang, derivative-on-error, history recording, event printing
// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use crate::event::{
    Attached, BaseTerms, CalculateU, Event, EventMut, InitialConditions, ModifyTerms,
    SetpointChange,
};
use crate::hook::{AttachOnce, HookContext, HookInterrupt, HookResult, Modifier};
use crate::pid::{Pid, PidError, PidSnapshot};
use crate::PidFloat;

use core::fmt;
use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Write};

/// Smooths setpoint changes out over a configured ramp time.
///
/// By default the ramp is *visible*: the stored setpoint is held at its old
/// value when the write arrives and then advanced once per tick, so reading
/// [`setpoint`](crate::pid::PidPlus::setpoint) back shows the ramp in
/// progress. Each advance is an internal
/// [`SetpointChange`](crate::event::SetpointChange) that the ramp itself
/// ignores (no recursive ramping) while other modifiers still observe it.
///
/// With [`hidden`](Self::hidden) the stored setpoint jumps straight to the
/// target and the ramp instead overrides the error term each tick, so the
/// smoothing is invisible to setpoint readers.
///
/// Changes no larger than the [`threshold`](Self::with_threshold), and any
/// change while the ramp time is zero, pass through immediately and cancel
/// a ramp in progress.
#[derive(Clone, Debug)]
pub struct SetpointRamp<F: PidFloat> {
    secs: F,
    hidden: bool,
    threshold: F,
    start: F,
    target: F,
    progress: F,
    ramping: bool,
    once: AttachOnce,
}

impl<F: PidFloat> SetpointRamp<F> {
    /// Ramps setpoint changes over `secs` seconds of supplied `dt`.
    ///
    /// `secs` may be zero (changes pass through); negative ramp times fail
    /// with [`PidError::NegativeDuration`].
    pub fn new(secs: F) -> Result<Self, PidError> {
        if secs < F::zero() {
            return Err(PidError::NegativeDuration);
        }
        Ok(Self {
            secs,
            hidden: false,
            threshold: F::zero(),
            start: F::zero(),
            target: F::zero(),
            progress: F::zero(),
            ramping: false,
            once: AttachOnce::new(),
        })
    }

    /// Toggles hidden ramping (see the type docs).
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Changes up to `threshold` in magnitude skip the ramp entirely.
    pub fn with_threshold(mut self, threshold: F) -> Self {
        self.threshold = threshold.abs();
        self
    }

    /// Returns the configured ramp time.
    pub fn secs(&self) -> F {
        self.secs
    }

    /// Reconfigures the ramp time.
    ///
    /// A ramp in progress is re-anchored: it continues from the current
    /// interpolated value toward the unchanged target at the new rate. A
    /// new ramp time of zero snaps to the target on the next tick.
    pub fn set_secs(&mut self, secs: F) -> Result<(), PidError> {
        if secs < F::zero() {
            return Err(PidError::NegativeDuration);
        }
        if self.ramping {
            self.start = self.interpolated();
            self.progress = F::zero();
        }
        self.secs = secs;
        Ok(())
    }

    /// True while a ramp is in progress.
    pub fn is_ramping(&self) -> bool {
        self.ramping
    }

    fn fraction(&self) -> F {
        if self.secs <= F::zero() {
            return F::one();
        }
        let f = self.progress / self.secs;
        if f > F::one() {
            F::one()
        } else {
            f
        }
    }

    fn interpolated(&self) -> F {
        let f = self.fraction();
        if f >= F::one() {
            // slam to the target so no floating fuzz survives the ramp
            self.target
        } else {
            self.start + f * (self.target - self.start)
        }
    }

    fn settle(&mut self, setpoint: F) {
        self.start = setpoint;
        self.target = setpoint;
        self.progress = F::zero();
        self.ramping = false;
    }
}

impl<F: PidFloat> Modifier<F> for SetpointRamp<F> {
    fn name(&self) -> &'static str {
        "SetpointRamp"
    }

    fn on_attached(
        &mut self,
        pid: &mut Pid<F>,
        _event: &mut Attached,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.once.check(pid)
    }

    fn on_initial_conditions(
        &mut self,
        pid: &mut Pid<F>,
        event: &mut InitialConditions<F>,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        let setpoint = event.setpoint().unwrap_or(pid.setpoint());
        self.settle(setpoint);
        Ok(())
    }

    fn on_setpoint_change(
        &mut self,
        _pid: &mut Pid<F>,
        event: &mut SetpointChange<F>,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        if event.is_internal() {
            // our own per-tick advance coming back around
            return Ok(());
        }
        let delta = (event.sp_to() - event.sp_from()).abs();
        if self.secs == F::zero() || delta <= self.threshold {
            self.settle(event.sp_to());
            return Ok(());
        }
        self.start = if self.ramping {
            self.interpolated()
        } else {
            event.sp_from()
        };
        self.target = event.sp_to();
        self.progress = F::zero();
        self.ramping = true;
        if !self.hidden {
            // hold the store at the old value; the ramp advances it per tick
            event.sp = Some(event.sp_from());
        }
        Ok(())
    }

    fn on_base_terms(
        &mut self,
        pid: &mut Pid<F>,
        event: &mut BaseTerms<F>,
        ctx: &mut HookContext<F>,
    ) -> HookResult {
        if !self.ramping {
            return Ok(());
        }
        self.progress = self.progress + event.dt();
        let value = self.interpolated();
        let finished = self.fraction() >= F::one();
        if self.hidden {
            event.e = Some(value - pid.pv());
        } else {
            ctx.write_setpoint_internal(value);
        }
        if finished {
            self.settle(value);
        }
        Ok(())
    }
}

/// Inclusive integration limits for [`Windup`].
///
/// Converts from a scalar `w` (symmetric `[−|w|, |w|]`) or a `(lo, hi)`
/// pair (sorted as needed).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindupLimits<F: PidFloat> {
    lo: F,
    hi: F,
}

impl<F: PidFloat> WindupLimits<F> {
    /// Limits between `a` and `b`, in either order.
    pub fn new(a: F, b: F) -> Self {
        if b < a {
            Self { lo: b, hi: a }
        } else {
            Self { lo: a, hi: b }
        }
    }

    /// Symmetric limits `[−|w|, |w|]`.
    pub fn symmetric(w: F) -> Self {
        let w = w.abs();
        Self { lo: -w, hi: w }
    }

    /// The lower limit.
    pub fn lo(&self) -> F {
        self.lo
    }

    /// The upper limit.
    pub fn hi(&self) -> F {
        self.hi
    }

    fn clamp(&self, value: F) -> F {
        value.max(self.lo).min(self.hi)
    }
}

impl<F: PidFloat> From<F> for WindupLimits<F> {
    fn from(w: F) -> Self {
        Self::symmetric(w)
    }
}

impl<F: PidFloat> From<(F, F)> for WindupLimits<F> {
    fn from((a, b): (F, F)) -> Self {
        Self::new(a, b)
    }
}

/// Limits integral windup by clamping the integration into a range.
///
/// Clamps both the reported integral term and the controller's stored
/// integration, so accumulation cannot drift outside the limits between
/// ticks.
///
/// ```
/// use extensible_pid::modifiers::Windup;
///
/// let symmetric = Windup::new(2.0);           // [-2, 2]
/// let one_sided = Windup::new((0.0, 5.0));    // [0, 5]
/// # let _ = (symmetric, one_sided);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Windup<F: PidFloat> {
    limits: WindupLimits<F>,
}

impl<F: PidFloat> Windup<F> {
    /// Creates a windup limiter from a scalar or `(lo, hi)` pair.
    pub fn new(limits: impl Into<WindupLimits<F>>) -> Self {
        Self {
            limits: limits.into(),
        }
    }

    /// Returns the configured limits.
    pub fn limits(&self) -> WindupLimits<F> {
        self.limits
    }
}

impl<F: PidFloat> Modifier<F> for Windup<F> {
    fn name(&self) -> &'static str {
        "Windup"
    }

    fn on_modify_terms(
        &mut self,
        pid: &mut Pid<F>,
        event: &mut ModifyTerms<F>,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        let clamped = self.limits.clamp(pid.integration());
        pid.set_integration(clamped);
        event.i = clamped;
        Ok(())
    }
}

/// Resets the integration when the setpoint changes, with an optional pause.
///
/// The reset happens immediately at the change; integration then stays
/// frozen at zero for `delay` seconds of supplied `dt` while the controller
/// settles into the new regime. A zero delay resets and resumes at once.
#[derive(Clone, Debug)]
pub struct IntegralReset<F: PidFloat> {
    delay: F,
    pause_remaining: F,
    once: AttachOnce,
}

impl<F: PidFloat> IntegralReset<F> {
    /// Resets integration on setpoint changes and pauses it `delay` seconds.
    pub fn new(delay: F) -> Result<Self, PidError> {
        if delay < F::zero() {
            return Err(PidError::NegativeDuration);
        }
        Ok(Self {
            delay,
            pause_remaining: F::zero(),
            once: AttachOnce::new(),
        })
    }

    /// Seconds of pause left before integration resumes.
    pub fn pause_remaining(&self) -> F {
        self.pause_remaining
    }
}

impl<F: PidFloat> Modifier<F> for IntegralReset<F> {
    fn name(&self) -> &'static str {
        "IntegralReset"
    }

    fn on_attached(
        &mut self,
        pid: &mut Pid<F>,
        _event: &mut Attached,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.once.check(pid)
    }

    fn on_initial_conditions(
        &mut self,
        _pid: &mut Pid<F>,
        _event: &mut InitialConditions<F>,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.pause_remaining = F::zero();
        Ok(())
    }

    fn on_setpoint_change(
        &mut self,
        pid: &mut Pid<F>,
        _event: &mut SetpointChange<F>,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        pid.set_integration(F::zero());
        self.pause_remaining = self.delay;
        Ok(())
    }

    fn on_base_terms(
        &mut self,
        pid: &mut Pid<F>,
        event: &mut BaseTerms<F>,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        if self.pause_remaining > F::zero() {
            // holding the term suppresses the internal accumulation
            event.i = Some(pid.integration());
            let remaining = self.pause_remaining - event.dt();
            self.pause_remaining = if remaining > F::zero() {
                remaining
            } else {
                F::zero()
            };
        }
        Ok(())
    }
}

/// Freezes the integration on explicit request, optionally for a duration.
///
/// While frozen the integral term repeats the stored integration and the
/// internal accumulation is suppressed. A duration counts down by the `dt`
/// of subsequent ticks; `initial_conditions` unfreezes.
///
/// Drive it through
/// [`find_modifier_mut`](crate::pid::PidPlus::find_modifier_mut):
///
/// ```
/// use extensible_pid::modifiers::IntegralFreeze;
/// use extensible_pid::pid::PidPlus;
///
/// let mut pid = PidPlus::builder()
///     .ki(1.0)
///     .modifier(IntegralFreeze::new())
///     .build()
///     .unwrap();
///
/// pid.find_modifier_mut::<IntegralFreeze<f64>>()
///     .unwrap()
///     .freeze(Some(2.0));
/// ```
#[derive(Clone, Debug)]
pub struct IntegralFreeze<F: PidFloat> {
    frozen: bool,
    remaining: Option<F>,
    once: AttachOnce,
}

impl<F: PidFloat> Default for IntegralFreeze<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: PidFloat> IntegralFreeze<F> {
    /// Creates an unfrozen freeze control.
    pub fn new() -> Self {
        Self {
            frozen: false,
            remaining: None,
            once: AttachOnce::new(),
        }
    }

    /// Freezes integration, indefinitely or for `duration` seconds of
    /// supplied `dt`.
    pub fn freeze(&mut self, duration: Option<F>) {
        self.frozen = true;
        self.remaining = duration;
    }

    /// Unfreezes integration.
    pub fn unfreeze(&mut self) {
        self.frozen = false;
        self.remaining = None;
    }

    /// True while integration is frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

impl<F: PidFloat> Modifier<F> for IntegralFreeze<F> {
    fn name(&self) -> &'static str {
        "IntegralFreeze"
    }

    fn on_attached(
        &mut self,
        pid: &mut Pid<F>,
        _event: &mut Attached,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.once.check(pid)
    }

    fn on_initial_conditions(
        &mut self,
        _pid: &mut Pid<F>,
        _event: &mut InitialConditions<F>,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.unfreeze();
        Ok(())
    }

    fn on_base_terms(
        &mut self,
        pid: &mut Pid<F>,
        event: &mut BaseTerms<F>,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        if !self.frozen {
            return Ok(());
        }
        event.i = Some(pid.integration());
        if let Some(remaining) = self.remaining {
            let remaining = remaining - event.dt();
            if remaining > F::zero() {
                self.remaining = Some(remaining);
            } else {
                self.unfreeze();
            }
        }
        Ok(())
    }
}

/// Suppresses small output changes: `u` snaps back to the previously
/// returned value while it stays within `size` of it.
///
/// The first tick after construction or `initial_conditions` never snaps
/// (there is no prior value to hold). [`deadbanded`](Self::deadbanded)
/// reports whether the most recent tick snapped.
#[derive(Clone, Debug)]
pub struct DeadBand<F: PidFloat> {
    size: F,
    last_u: Option<F>,
    snapped: bool,
    once: AttachOnce,
}

impl<F: PidFloat> DeadBand<F> {
    /// Creates a dead band of the given half-width.
    pub fn new(size: F) -> Self {
        Self {
            size: size.abs(),
            last_u: None,
            snapped: false,
            once: AttachOnce::new(),
        }
    }

    /// True when the most recent tick snapped back to the held value.
    pub fn deadbanded(&self) -> bool {
        self.snapped
    }
}

impl<F: PidFloat> Modifier<F> for DeadBand<F> {
    fn name(&self) -> &'static str {
        "DeadBand"
    }

    fn on_attached(
        &mut self,
        pid: &mut Pid<F>,
        _event: &mut Attached,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.once.check(pid)
    }

    fn on_initial_conditions(
        &mut self,
        _pid: &mut Pid<F>,
        _event: &mut InitialConditions<F>,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.last_u = None;
        self.snapped = false;
        Ok(())
    }

    fn on_calculate_u(
        &mut self,
        _pid: &mut Pid<F>,
        event: &mut CalculateU<F>,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        match self.last_u {
            Some(held) if (event.u - held).abs() < self.size => {
                event.u = held;
                self.snapped = true;
            }
            _ => {
                self.last_u = Some(event.u);
                self.snapped = false;
            }
        }
        Ok(())
    }
}

/// Turns the controller into a bang-bang (on/off) control.
///
/// The computed `u` is classified against the thresholds and replaced with
/// the corresponding discrete value:
///
/// - only an ON threshold: ON when `u ≥ on`, else OFF;
/// - only an OFF threshold: ON when `u > off`, else OFF;
/// - both: ON when `u ≥ on`, OFF when `u ≤ off`, otherwise DEAD: `u` is
///   replaced with the dead value if one is configured and passed through
///   unchanged otherwise.
///
/// Defaults: both thresholds 0 (so positive is ON, non-positive is OFF),
/// ON value 1, OFF value 0, no dead value.
#[derive(Clone, Copy, Debug)]
pub struct BangBang<F: PidFloat> {
    on_threshold: Option<F>,
    off_threshold: Option<F>,
    on_value: F,
    off_value: F,
    dead_value: Option<F>,
}

impl<F: PidFloat> BangBang<F> {
    /// Creates a bang-bang classifier with the defaults above.
    pub fn new() -> Self {
        Self {
            on_threshold: Some(F::zero()),
            off_threshold: Some(F::zero()),
            on_value: F::one(),
            off_value: F::zero(),
            dead_value: None,
        }
    }

    /// Sets the ON threshold.
    pub fn with_on_threshold(mut self, threshold: F) -> Self {
        self.on_threshold = Some(threshold);
        self
    }

    /// Removes the ON threshold (classification by OFF threshold only).
    pub fn without_on_threshold(mut self) -> Self {
        self.on_threshold = None;
        self
    }

    /// Sets the OFF threshold.
    pub fn with_off_threshold(mut self, threshold: F) -> Self {
        self.off_threshold = Some(threshold);
        self
    }

    /// Removes the OFF threshold (classification by ON threshold only).
    pub fn without_off_threshold(mut self) -> Self {
        self.off_threshold = None;
        self
    }

    /// Sets the values substituted for ON and OFF classifications.
    pub fn with_values(mut self, on_value: F, off_value: F) -> Self {
        self.on_value = on_value;
        self.off_value = off_value;
        self
    }

    /// Sets the value substituted inside the dead band.
    pub fn with_dead_value(mut self, dead_value: F) -> Self {
        self.dead_value = Some(dead_value);
        self
    }
}

impl<F: PidFloat> Default for BangBang<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: PidFloat> Modifier<F> for BangBang<F> {
    fn name(&self) -> &'static str {
        "BangBang"
    }

    fn on_calculate_u(
        &mut self,
        _pid: &mut Pid<F>,
        event: &mut CalculateU<F>,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        let u = event.u;
        let replacement = match (self.on_threshold, self.off_threshold) {
            (Some(on), None) => Some(if u >= on { self.on_value } else { self.off_value }),
            (None, Some(off)) => Some(if u > off { self.on_value } else { self.off_value }),
            (Some(on), Some(off)) => {
                if u >= on {
                    Some(self.on_value)
                } else if u <= off {
                    Some(self.off_value)
                } else {
                    self.dead_value
                }
            }
            (None, None) => None,
        };
        if let Some(value) = replacement {
            event.u = value;
        }
        Ok(())
    }
}

/// Makes the derivative term act on the error instead of the measurement.
///
/// The first tick after construction or `initial_conditions` delivers a
/// zero derivative (there is no previous error yet). With
/// [`kick_filter`](Self::kick_filter) enabled, the one-tick derivative
/// spike caused by a setpoint change is filtered out: the tick following a
/// change delivers a zero derivative, and normal operation resumes on the
/// next one.
#[derive(Clone, Debug)]
pub struct DerivativeOnError<F: PidFloat> {
    filter_kicks: bool,
    prev_e: Option<F>,
    kick_pending: bool,
    once: AttachOnce,
}

impl<F: PidFloat> Default for DerivativeOnError<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: PidFloat> DerivativeOnError<F> {
    /// Creates the modifier with kick filtering disabled.
    pub fn new() -> Self {
        Self {
            filter_kicks: false,
            prev_e: None,
            kick_pending: false,
            once: AttachOnce::new(),
        }
    }

    /// Toggles derivative-kick filtering.
    pub fn kick_filter(mut self, enabled: bool) -> Self {
        self.filter_kicks = enabled;
        self
    }
}

impl<F: PidFloat> Modifier<F> for DerivativeOnError<F> {
    fn name(&self) -> &'static str {
        "DerivativeOnError"
    }

    fn on_attached(
        &mut self,
        pid: &mut Pid<F>,
        _event: &mut Attached,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.once.check(pid)
    }

    fn on_initial_conditions(
        &mut self,
        _pid: &mut Pid<F>,
        _event: &mut InitialConditions<F>,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.prev_e = None;
        self.kick_pending = false;
        Ok(())
    }

    fn on_setpoint_change(
        &mut self,
        _pid: &mut Pid<F>,
        _event: &mut SetpointChange<F>,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        if self.filter_kicks {
            self.kick_pending = true;
        }
        Ok(())
    }

    fn on_base_terms(
        &mut self,
        pid: &mut Pid<F>,
        event: &mut BaseTerms<F>,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        let e = event.e.unwrap_or_else(|| pid.setpoint() - pid.pv());
        let d = match self.prev_e {
            Some(prev) if !self.kick_pending => (e - prev) / event.dt(),
            _ => F::zero(),
        };
        self.kick_pending = false;
        self.prev_e = Some(e);
        // overriding d also keeps the internal derivative from touching
        // the controller's pv memory
        event.d = Some(d);
        Ok(())
    }
}

/// One recorded event, with an optional controller snapshot in detail mode.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry<F: PidFloat> {
    /// The event as it stood when this modifier saw it.
    pub event: Event<F>,
    /// The controller's public state at that moment (detail mode only).
    pub snapshot: Option<PidSnapshot<F>>,
}

/// Records a look-back window of every event it is notified of.
///
/// Implemented entirely on the default handler, so it sees every event
/// kind, including the [`Attached`]/
/// [`InitialConditions`](crate::event::InitialConditions) pair emitted at
/// construction and the replacement events of stop/failure fanouts.
/// [`event_counts`](Self::event_counts) tallies the events seen per kind.
///
/// ```
/// use extensible_pid::modifiers::History;
/// use extensible_pid::pid::PidPlus;
///
/// let mut pid = PidPlus::builder()
///     .kp(1.0)
///     .modifier(History::new(100))
///     .build()
///     .unwrap();
/// pid.pid(0.5, Some(0.1)).unwrap();
///
/// let history = pid.find_modifier::<History<f64>>().unwrap();
/// let names: Vec<_> = history.events().map(|e| e.name()).collect();
/// assert_eq!(
///     names,
///     ["Attached", "InitialConditions", "BaseTerms", "ModifyTerms", "CalculateU"],
/// );
/// ```
#[derive(Clone, Debug)]
pub struct History<F: PidFloat> {
    capacity: Option<usize>,
    detail: bool,
    entries: VecDeque<HistoryEntry<F>>,
    counts: BTreeMap<&'static str, u64>,
    once: AttachOnce,
}

impl<F: PidFloat> History<F> {
    /// Records the most recent `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            detail: false,
            entries: VecDeque::new(),
            counts: BTreeMap::new(),
            once: AttachOnce::new(),
        }
    }

    /// Records every event with no bound. Prefer [`new`](Self::new) for
    /// long-running controllers.
    pub fn unbounded() -> Self {
        Self {
            capacity: None,
            ..Self::new(0)
        }
    }

    /// Toggles detail mode: each entry also snapshots the controller.
    pub fn detailed(mut self, detail: bool) -> Self {
        self.detail = detail;
        self
    }

    /// Iterates the recorded entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry<F>> {
        self.entries.iter()
    }

    /// Iterates the recorded events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &Event<F>> {
        self.entries.iter().map(|entry| &entry.event)
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-kind tally of every event seen, regardless of what the record
    /// window still holds.
    pub fn event_counts(&self) -> &BTreeMap<&'static str, u64> {
        &self.counts
    }

    /// Drops the recorded entries; the counts are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<F: PidFloat> Default for History<F> {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl<F: PidFloat> Modifier<F> for History<F> {
    fn name(&self) -> &'static str {
        "History"
    }

    fn on_attached(
        &mut self,
        pid: &mut Pid<F>,
        event: &mut Attached,
        ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.once.check(pid)?;
        self.on_default(pid, EventMut::Attached(event), ctx)
    }

    fn on_default(
        &mut self,
        pid: &mut Pid<F>,
        event: EventMut<'_, F>,
        _ctx: &mut HookContext<F>,
    ) -> HookResult {
        *self.counts.entry(event.name()).or_insert(0) += 1;
        let snapshot = self.detail.then(|| pid.snapshot());
        self.entries.push_back(HistoryEntry {
            event: event.to_owned(),
            snapshot,
        });
        if let Some(capacity) = self.capacity {
            while self.entries.len() > capacity {
                self.entries.pop_front();
            }
        }
        Ok(())
    }
}

/// Where [`EventPrinter`] sends its rendering.
pub enum EventSink {
    /// Standard output (the default).
    Stdout,
    /// Standard error.
    Stderr,
    /// The `log` facade, at debug level under the
    /// `extensible_pid::events` target.
    Log,
    /// Any writer, e.g. a file or an in-memory buffer.
    Writer(Box<dyn Write>),
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSink::Stdout => f.write_str("Stdout"),
            EventSink::Stderr => f.write_str("Stderr"),
            EventSink::Log => f.write_str("Log"),
            EventSink::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

/// Prints a textual rendering of every event it is notified of.
///
/// Events are rendered as `Name(field=value, …)`, prefixed and indented by
/// two spaces per nesting level, so events emitted from inside a handler
/// (like a ramp's internal setpoint writes) read as nested.
/// [`HookStopped`](crate::event::HookStopped) replacements run at the depth
/// of the event they replace and are printed unindented relative to it.
#[derive(Debug)]
pub struct EventPrinter {
    prefix: String,
    sink: EventSink,
}

impl EventPrinter {
    /// Prints to standard output with no prefix.
    pub fn new() -> Self {
        Self {
            prefix: String::new(),
            sink: EventSink::Stdout,
        }
    }

    /// Prints to standard output with each line prefixed.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sink: EventSink::Stdout,
        }
    }

    /// Routes the rendering to the given sink.
    pub fn sink(mut self, sink: EventSink) -> Self {
        self.sink = sink;
        self
    }

    /// Routes the rendering to `log::debug!`.
    pub fn log_sink() -> Self {
        Self::new().sink(EventSink::Log)
    }
}

impl Default for EventPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: PidFloat> Modifier<F> for EventPrinter {
    fn name(&self) -> &'static str {
        "EventPrinter"
    }

    fn on_default(
        &mut self,
        _pid: &mut Pid<F>,
        event: EventMut<'_, F>,
        ctx: &mut HookContext<F>,
    ) -> HookResult {
        let line = format!("{}{}{}", self.prefix, "  ".repeat(ctx.depth()), event);
        let written = match &mut self.sink {
            EventSink::Stdout => writeln!(io::stdout(), "{line}"),
            EventSink::Stderr => writeln!(io::stderr(), "{line}"),
            EventSink::Log => {
                log::debug!(target: "extensible_pid::events", "{line}");
                Ok(())
            }
            EventSink::Writer(writer) => writeln!(writer, "{line}"),
        };
        written.map_err(|err| HookInterrupt::Fail(PidError::Sink(err.to_string())))
    }
}
