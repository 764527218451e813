// The PID controllers: the plain one and the extensible one
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
    Attached, BaseTerms, CalculateU, Event, Failure, HookStopped, InitialConditions, ModifyTerms,
};
use crate::hook::{self, HookContext, HookInterrupt, Modifier};
use crate::PidFloat;

use core::fmt;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Error type for controller and modifier operations.
///
/// Usage errors (`MissingDt`, `NegativeDuration`, `AlreadyAttached`) are
/// programmer errors surfaced immediately. `Handler` wraps a failure raised
/// by a modifier handler; it is delivered to the remaining modifiers as a
/// [`Failure`] event, then returned to the caller.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum PidError {
    /// `pid()` was called without a `dt` and no default dt is configured.
    #[error("no dt was supplied and no default dt is configured")]
    MissingDt,

    /// A ramp or pause duration was negative.
    #[error("durations must not be negative")]
    NegativeDuration,

    /// A stateful modifier was attached to a second controller.
    #[error("modifier is already attached to another controller")]
    AlreadyAttached,

    /// A modifier handler failed.
    #[error("modifier handler failed: {0}")]
    Handler(String),

    /// An event printer could not write to its sink.
    #[error("event sink write failed: {0}")]
    Sink(String),
}

/// Monotone source of controller identities, used by
/// [`AttachOnce`](crate::hook::AttachOnce). Addresses are not stable
/// identities in Rust, so every controller draws a process-unique id.
static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// A copy of a controller's public state, as recorded by
/// [`History`](crate::modifiers::History) in detail mode.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PidSnapshot<F: PidFloat> {
    /// Proportional gain.
    pub kp: F,
    /// Integral gain.
    pub ki: F,
    /// Derivative gain.
    pub kd: F,
    /// Current setpoint.
    pub setpoint: F,
    /// Last observed process variable.
    pub pv: F,
    /// Running integration of `e·dt`.
    pub integration: F,
    /// Unweighted `(p, i, d)` terms of the most recent tick, if any.
    pub last_pid: Option<(F, F, F)>,
}

/// Simple PID control.
///
/// The three gains weight the error, its running integration and the
/// derivative on measurement; time advances only through the `dt` supplied
/// to each [`pid`](Self::pid) call (or a preconfigured default). Gains may
/// be zero or negative and are deliberately unvalidated; non-finite results
/// propagate unchanged.
///
/// ```
/// use extensible_pid::pid::Pid;
///
/// let mut pid = Pid::new(2.0, 0.5, 0.0);
/// pid.initial_conditions(Some(0.0), Some(1.0));
///
/// let u = pid.pid(0.2, Some(0.1)).unwrap();
/// assert!(u > 0.0);
/// ```
#[derive(Debug)]
pub struct Pid<F: PidFloat> {
    kp: F,
    ki: F,
    kd: F,
    default_dt: Option<F>,
    setpoint: F,
    pv: F,
    integration: F,
    prev_pv: F,
    prev_e: F,
    last_pid: Option<(F, F, F)>,
    instance_id: u64,
}

impl<F: PidFloat> Pid<F> {
    /// Creates a controller with the given gains and zeroed state.
    pub fn new(kp: F, ki: F, kd: F) -> Self {
        Self {
            kp,
            ki,
            kd,
            default_dt: None,
            setpoint: F::zero(),
            pv: F::zero(),
            integration: F::zero(),
            prev_pv: F::zero(),
            prev_e: F::zero(),
            last_pid: None,
            instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Returns the proportional gain.
    pub fn kp(&self) -> F {
        self.kp
    }

    /// Sets the proportional gain.
    pub fn set_kp(&mut self, kp: F) {
        self.kp = kp;
    }

    /// Returns the integral gain.
    pub fn ki(&self) -> F {
        self.ki
    }

    /// Sets the integral gain.
    pub fn set_ki(&mut self, ki: F) {
        self.ki = ki;
    }

    /// Returns the derivative gain.
    pub fn kd(&self) -> F {
        self.kd
    }

    /// Sets the derivative gain.
    pub fn set_kd(&mut self, kd: F) {
        self.kd = kd;
    }

    /// Returns the preconfigured time step, if any.
    pub fn default_dt(&self) -> Option<F> {
        self.default_dt
    }

    /// Preconfigures a time step so callers may omit `dt` on
    /// [`pid`](Self::pid); `None` clears it.
    pub fn set_default_dt(&mut self, dt: Option<F>) {
        self.default_dt = dt;
    }

    /// Returns the current setpoint.
    pub fn setpoint(&self) -> F {
        self.setpoint
    }

    /// Stores a new setpoint directly, with no ramping and no events.
    pub fn set_setpoint(&mut self, setpoint: F) {
        self.setpoint = setpoint;
    }

    /// Returns the last observed process variable.
    pub fn pv(&self) -> F {
        self.pv
    }

    /// Returns the running integration of `e·dt`.
    pub fn integration(&self) -> F {
        self.integration
    }

    /// Overwrites the running integration. Modifiers such as windup
    /// limiters use this to keep the stored accumulation consistent with
    /// the term they report.
    pub fn set_integration(&mut self, integration: F) {
        self.integration = integration;
    }

    /// The unweighted `(p, i, d)` terms of the most recent tick. `None`
    /// before the first tick and after `initial_conditions`.
    pub fn last_pid(&self) -> Option<(F, F, F)> {
        self.last_pid
    }

    /// Process-unique identity of this controller.
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    /// Copies the public state, e.g. for history recording.
    pub fn snapshot(&self) -> PidSnapshot<F> {
        PidSnapshot {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
            setpoint: self.setpoint,
            pv: self.pv,
            integration: self.integration,
            last_pid: self.last_pid,
        }
    }

    /// Establishes initial conditions, resetting state accordingly.
    ///
    /// Parameters that are `None` carry the current value forward. Setting
    /// `pv` also zeroes the integration and the derivative memory, so the
    /// next tick starts without any kick from the instantaneous change.
    /// The last tick's terms are cleared either way.
    pub fn initial_conditions(&mut self, pv: Option<F>, setpoint: Option<F>) {
        if let Some(setpoint) = setpoint {
            self.setpoint = setpoint;
        }
        if let Some(pv) = pv {
            self.integration = F::zero();
            self.prev_pv = pv;
            self.prev_e = F::zero();
            self.pv = pv;
        }
        self.last_pid = None;
    }

    /// Returns the new commanded control value for the given `pv` and `dt`.
    ///
    /// With `dt` omitted the preconfigured default is used; if neither is
    /// available the call fails with [`PidError::MissingDt`]. The
    /// derivative acts on the measurement, so a setpoint change never
    /// produces a derivative kick.
    pub fn pid(&mut self, pv: F, dt: Option<F>) -> Result<F, PidError> {
        let dt = dt.or(self.default_dt).ok_or(PidError::MissingDt)?;
        self.pv = pv;
        let e = self.setpoint - pv;
        let p = e;
        let i = self.advance_integration(e, dt);
        let d = self.advance_derivative(dt);
        let u = self.kp * p + self.ki * i + self.kd * d;
        self.finish_tick(p, i, d, e);
        Ok(u)
    }

    pub(crate) fn observe_pv(&mut self, pv: F) {
        self.pv = pv;
    }

    pub(crate) fn store_setpoint(&mut self, setpoint: F) {
        self.setpoint = setpoint;
    }

    /// The internal integral term: advances the stored integration.
    pub(crate) fn advance_integration(&mut self, e: F, dt: F) -> F {
        self.integration = self.integration + e * dt;
        self.integration
    }

    /// The internal derivative term, on measurement: a change in the
    /// setpoint does not affect derivative action, and a rising pv lowers
    /// the output.
    pub(crate) fn advance_derivative(&mut self, dt: F) -> F {
        let d = -(self.pv - self.prev_pv) / dt;
        self.prev_pv = self.pv;
        d
    }

    pub(crate) fn finish_tick(&mut self, p: F, i: F, d: F, e: F) {
        self.last_pid = Some((p, i, d));
        self.prev_e = e;
    }
}

/// A PID controller with an observable, modifiable control loop.
///
/// `PidPlus` embeds the [`Pid`] calculation and emits a typed event at
/// every lifecycle point (attachment, initial conditions, setpoint writes,
/// and the three stages of every tick) through an ordered chain of
/// [`Modifier`]s. Modifiers can watch the loop, rewrite individual terms,
/// halt event propagation, or fail the call; see the
/// [`modifiers`](crate::modifiers) module for the built-in ones.
///
/// ```
/// use extensible_pid::modifiers::Windup;
/// use extensible_pid::pid::PidPlus;
///
/// let mut pid = PidPlus::builder()
///     .ki(1.0)
///     .modifier(Windup::new(2.0))
///     .build()
///     .unwrap();
/// pid.set_setpoint(10.0).unwrap();
///
/// for _ in 0..3 {
///     // the windup limit caps the integration at 2
///     assert_eq!(pid.pid(0.0, Some(1.0)).unwrap(), 2.0);
/// }
/// ```
pub struct PidPlus<F: PidFloat> {
    core: Pid<F>,
    modifiers: Vec<Box<dyn Modifier<F>>>,
}

impl<F: PidFloat> PidPlus<F> {
    /// Starts building a controller; see [`PidPlusBuilder`].
    pub fn builder() -> PidPlusBuilder<F> {
        PidPlusBuilder::default()
    }

    /// Creates a controller without modifiers.
    pub fn new(kp: F, ki: F, kd: F) -> Result<Self, PidError> {
        Self::with_modifiers(kp, ki, kd, None, Vec::new())
    }

    /// Creates a controller with an ordered modifier chain.
    ///
    /// Construction emits one [`Attached`] per modifier (each modifier sees
    /// only its own), then establishes initial conditions `pv = 0`,
    /// `setpoint = 0`, which emits a single [`InitialConditions`] through
    /// the whole chain. A handler failure during either pass aborts
    /// construction with its error.
    pub fn with_modifiers(
        kp: F,
        ki: F,
        kd: F,
        default_dt: Option<F>,
        modifiers: Vec<Box<dyn Modifier<F>>>,
    ) -> Result<Self, PidError> {
        let mut core = Pid::new(kp, ki, kd);
        core.set_default_dt(default_dt);
        let mut plus = PidPlus { core, modifiers };
        plus.attach_all()?;
        plus.initial_conditions(Some(F::zero()), Some(F::zero()))?;
        Ok(plus)
    }

    /// Emits `Attached` to each modifier in order. A stop or failure fans
    /// out to the remaining modifiers of this pass per the standard rules;
    /// a failure then aborts the pass.
    fn attach_all(&mut self) -> Result<(), PidError> {
        let PidPlus { core, modifiers } = self;
        let names = hook::modifier_names(modifiers);
        let mut ctx = HookContext::new();
        for nth in 0..modifiers.len() {
            let mut event = Event::Attached(Attached::new());
            let outcome = hook::deliver(modifiers[nth].as_mut(), core, &mut event, &mut ctx);
            let outcome = match hook::drain_pending(modifiers, core, &mut ctx) {
                Ok(()) => outcome,
                Err(error) => Err(HookInterrupt::Fail(error)),
            };
            match outcome {
                Ok(()) => {}
                Err(HookInterrupt::Stop) => {
                    let mut replacement = Event::HookStopped(HookStopped::new(
                        event.clone(),
                        names[nth].clone(),
                        nth,
                        names.clone(),
                    ));
                    hook::notify_from(
                        modifiers,
                        nth + 1,
                        &names,
                        core,
                        &mut replacement,
                        &mut ctx,
                    )?;
                    break;
                }
                Err(HookInterrupt::Fail(error)) => {
                    let mut replacement = Event::Failure(Failure::new(
                        event.clone(),
                        error.clone(),
                        names[nth].clone(),
                        nth,
                        names.clone(),
                    ));
                    let _ = hook::notify_from(
                        modifiers,
                        nth + 1,
                        &names,
                        core,
                        &mut replacement,
                        &mut ctx,
                    );
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, event: &mut Event<F>) -> Result<(), PidError> {
        let PidPlus { core, modifiers } = self;
        let mut ctx = HookContext::new();
        hook::dispatch(modifiers, core, event, &mut ctx)
    }

    /// Establishes initial conditions as [`Pid::initial_conditions`] does,
    /// then emits a single [`InitialConditions`] event. Never emits
    /// [`SetpointChange`](crate::event::SetpointChange): modifiers with
    /// per-controller state reset here instead of reacting to a change.
    pub fn initial_conditions(
        &mut self,
        pv: Option<F>,
        setpoint: Option<F>,
    ) -> Result<(), PidError> {
        self.core.initial_conditions(pv, setpoint);
        let mut event = Event::InitialConditions(InitialConditions::new(pv, setpoint));
        self.dispatch(&mut event)
    }

    /// Writes the setpoint through the event protocol.
    ///
    /// [`SetpointChange`](crate::event::SetpointChange) is emitted *before*
    /// the store; the stored value is the handler-supplied `sp` if any
    /// handler set it, else `sp_to`. Writing the current value again is a
    /// no-op without events.
    pub fn set_setpoint(&mut self, setpoint: F) -> Result<(), PidError> {
        let PidPlus { core, modifiers } = self;
        let mut ctx = HookContext::new();
        hook::run_setpoint_write(modifiers, core, setpoint, false, &mut ctx)
    }

    /// Returns the current setpoint.
    pub fn setpoint(&self) -> F {
        self.core.setpoint()
    }

    /// Returns the last observed process variable.
    pub fn pv(&self) -> F {
        self.core.pv()
    }

    /// Returns the running integration of `e·dt`.
    pub fn integration(&self) -> F {
        self.core.integration()
    }

    /// The unweighted `(p, i, d)` terms of the most recent tick, as they
    /// stood after the last [`CalculateU`](crate::event::CalculateU).
    pub fn last_pid(&self) -> Option<(F, F, F)> {
        self.core.last_pid()
    }

    /// Returns the preconfigured time step, if any.
    pub fn default_dt(&self) -> Option<F> {
        self.core.default_dt()
    }

    /// Preconfigures a time step so callers may omit `dt` on
    /// [`pid`](Self::pid); `None` clears it.
    pub fn set_default_dt(&mut self, dt: Option<F>) {
        self.core.set_default_dt(dt);
    }

    /// Copies the public controller state.
    pub fn snapshot(&self) -> PidSnapshot<F> {
        self.core.snapshot()
    }

    /// Returns the first attached modifier of concrete type `M`, if any.
    ///
    /// ```
    /// use extensible_pid::modifiers::DeadBand;
    /// use extensible_pid::pid::PidPlus;
    ///
    /// let pid = PidPlus::builder()
    ///     .kp(1.0)
    ///     .modifier(DeadBand::new(0.05))
    ///     .build()
    ///     .unwrap();
    /// let band = pid.find_modifier::<DeadBand<f64>>().unwrap();
    /// assert!(!band.deadbanded());
    /// ```
    pub fn find_modifier<M: Modifier<F>>(&self) -> Option<&M> {
        self.modifiers.iter().find_map(|m| {
            let any: &dyn Any = m.as_ref();
            any.downcast_ref::<M>()
        })
    }

    /// Mutable access to the first attached modifier of concrete type `M`,
    /// e.g. to drive an [`IntegralFreeze`](crate::modifiers::IntegralFreeze)
    /// between ticks.
    pub fn find_modifier_mut<M: Modifier<F>>(&mut self) -> Option<&mut M> {
        self.modifiers.iter_mut().find_map(|m| {
            let any: &mut dyn Any = m.as_mut();
            any.downcast_mut::<M>()
        })
    }

    /// Returns the new commanded control value for the given `pv` and `dt`.
    ///
    /// One tick runs three stages, each preceded by an event dispatch:
    ///
    /// 1. [`BaseTerms`](crate::event::BaseTerms): every term still unset
    ///    afterwards is computed by the base rule, side effects included;
    ///    an override suppresses only its own side effect.
    /// 2. [`ModifyTerms`](crate::event::ModifyTerms): terms may be
    ///    rewritten; if `u` is still unset afterwards it becomes
    ///    `Kp·p + Ki·i + Kd·d`.
    /// 3. [`CalculateU`](crate::event::CalculateU): last chance to shape
    ///    `u` before it is returned.
    pub fn pid(&mut self, pv: F, dt: Option<F>) -> Result<F, PidError> {
        let dt = dt.or(self.core.default_dt()).ok_or(PidError::MissingDt)?;
        self.core.observe_pv(pv);

        let mut event = Event::BaseTerms(BaseTerms::new(dt));
        self.dispatch(&mut event)?;
        let Event::BaseTerms(base) = event else {
            unreachable!("dispatch never changes the event variant")
        };

        let core = &mut self.core;
        let e = base.e.unwrap_or_else(|| core.setpoint() - core.pv());
        let p = base.p.unwrap_or(e);
        let i = match base.i {
            Some(term) => term,
            None => core.advance_integration(e, dt),
        };
        let d = match base.d {
            Some(term) => term,
            None => core.advance_derivative(dt),
        };

        let mut event = Event::ModifyTerms(ModifyTerms::new(dt, e, p, i, d, base.u, base.attrs));
        self.dispatch(&mut event)?;
        let Event::ModifyTerms(mid) = event else {
            unreachable!("dispatch never changes the event variant")
        };

        let u = mid.u.unwrap_or_else(|| {
            let core = &self.core;
            core.kp() * mid.p + core.ki() * mid.i + core.kd() * mid.d
        });

        let mut event = Event::CalculateU(CalculateU::new(
            dt,
            mid.e(),
            mid.p,
            mid.i,
            mid.d,
            u,
            mid.attrs,
        ));
        self.dispatch(&mut event)?;
        let Event::CalculateU(post) = event else {
            unreachable!("dispatch never changes the event variant")
        };

        self.core.finish_tick(post.p(), post.i(), post.d(), post.e());
        Ok(post.u)
    }
}

impl<F: PidFloat> fmt::Debug for PidPlus<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PidPlus")
            .field("core", &self.core)
            .field("modifiers", &hook::modifier_names(&self.modifiers))
            .finish()
    }
}

/// Builder for [`PidPlus`]: gains, an optional default dt, and the modifier
/// chain in attachment order.
///
/// ```
/// use extensible_pid::modifiers::{History, SetpointRamp};
/// use extensible_pid::pid::PidPlus;
///
/// let pid = PidPlus::builder()
///     .kp(1.0)
///     .ki(0.1)
///     .default_dt(0.01)
///     .modifier(SetpointRamp::new(5.0).unwrap())
///     .modifier(History::new(100))
///     .build()
///     .unwrap();
/// # let _ = pid;
/// ```
pub struct PidPlusBuilder<F: PidFloat> {
    kp: F,
    ki: F,
    kd: F,
    default_dt: Option<F>,
    modifiers: Vec<Box<dyn Modifier<F>>>,
}

impl<F: PidFloat> Default for PidPlusBuilder<F> {
    fn default() -> Self {
        Self {
            kp: F::zero(),
            ki: F::zero(),
            kd: F::zero(),
            default_dt: None,
            modifiers: Vec::new(),
        }
    }
}

impl<F: PidFloat> PidPlusBuilder<F> {
    /// Configures the proportional gain (default 0).
    pub fn kp(mut self, kp: F) -> Self {
        self.kp = kp;
        self
    }

    /// Configures the integral gain (default 0).
    pub fn ki(mut self, ki: F) -> Self {
        self.ki = ki;
        self
    }

    /// Configures the derivative gain (default 0).
    pub fn kd(mut self, kd: F) -> Self {
        self.kd = kd;
        self
    }

    /// Preconfigures the time step so `pid()` may be called without one.
    pub fn default_dt(mut self, dt: F) -> Self {
        self.default_dt = Some(dt);
        self
    }

    /// Appends a modifier to the chain. Order matters: earlier modifiers
    /// see every event first.
    pub fn modifier(mut self, modifier: impl Modifier<F>) -> Self {
        self.modifiers.push(Box::new(modifier));
        self
    }

    /// Appends an already-boxed modifier to the chain.
    pub fn boxed_modifier(mut self, modifier: Box<dyn Modifier<F>>) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Builds the controller, running the attachment and
    /// initial-conditions passes.
    pub fn build(self) -> Result<PidPlus<F>, PidError> {
        PidPlus::with_modifiers(self.kp, self.ki, self.kd, self.default_dt, self.modifiers)
    }
}
