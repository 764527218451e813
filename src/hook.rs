// The modifier trait and the ordered event dispatcher
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
    Attached, BaseTerms, CalculateU, Event, EventMut, Failure, HookStopped, InitialConditions,
    ModifyTerms, SetpointChange,
};
use crate::pid::{Pid, PidError};
use crate::PidFloat;

use std::any::Any;

/// What a handler wants the dispatcher to do next.
///
/// Returned inside the `Err` arm of [`HookResult`]; `Ok(())` means "carry on
/// to the next modifier".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookInterrupt {
    /// Cooperative halt: stop propagating the current event. The remaining
    /// modifiers are notified with a [`HookStopped`] replacement instead.
    /// This is control flow, not an error; the enclosing controller call
    /// continues normally.
    Stop,
    /// Handler failure: the remaining modifiers are notified with a
    /// [`Failure`] replacement, then the error is returned to whoever
    /// triggered the dispatch.
    Fail(PidError),
}

impl HookInterrupt {
    /// Shorthand for failing a handler with a message.
    pub fn fail(message: impl Into<String>) -> Self {
        HookInterrupt::Fail(PidError::Handler(message.into()))
    }
}

impl From<PidError> for HookInterrupt {
    fn from(error: PidError) -> Self {
        HookInterrupt::Fail(error)
    }
}

/// The result type of every modifier handler.
pub type HookResult = Result<(), HookInterrupt>;

/// Per-dispatch context handed to every handler.
///
/// Carries the nesting depth (0 for events emitted by the controller
/// itself, +1 for every level of events emitted from inside a handler) and
/// accepts deferred controller writes. A handler cannot re-enter the
/// dispatcher directly, so an evented write requested here is executed by
/// the dispatcher right after the requesting handler returns, before the
/// next modifier in the outer chain is notified.
pub struct HookContext<F: PidFloat> {
    depth: usize,
    pending: Vec<PendingWrite<F>>,
}

enum PendingWrite<F: PidFloat> {
    Setpoint { value: F, internal: bool },
}

impl<F: PidFloat> HookContext<F> {
    pub(crate) fn new() -> Self {
        Self {
            depth: 0,
            pending: Vec::new(),
        }
    }

    /// Nesting depth of the event currently being dispatched.
    ///
    /// A [`HookStopped`] replacement is dispatched at the depth of the event
    /// it replaces; it does not count as nested.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Requests an evented setpoint write.
    ///
    /// The write goes through the full [`SetpointChange`] protocol (every
    /// modifier sees it) as soon as the current handler returns.
    pub fn write_setpoint(&mut self, value: F) {
        self.pending.push(PendingWrite::Setpoint {
            value,
            internal: false,
        });
    }

    /// Internal setpoint write, flagged so that the modifier driving it can
    /// recognize and ignore its own event.
    pub(crate) fn write_setpoint_internal(&mut self, value: F) {
        self.pending.push(PendingWrite::Setpoint {
            value,
            internal: true,
        });
    }
}

/// A stage observer/mutator attachable to a [`PidPlus`](crate::pid::PidPlus).
///
/// Implement the handlers for the events you care about; every handler you
/// do not implement forwards to [`on_default`](Self::on_default), whose own
/// default body does nothing. This gives the dispatch rule "specific
/// handler if present, else the default handler, else ignore": a modifier
/// that only implements `on_default` (like a history recorder) sees every
/// event it is notified of.
///
/// A handler may mutate the event's read-write fields, attach extra
/// attributes to the tick events, read and write the exposed controller
/// state through the `pid` parameter, request an evented setpoint write via
/// [`HookContext::write_setpoint`], halt propagation with
/// [`HookInterrupt::Stop`], or fail with [`HookInterrupt::Fail`].
///
/// ```
/// use extensible_pid::hook::{HookContext, HookResult, Modifier};
/// use extensible_pid::event::BaseTerms;
/// use extensible_pid::pid::{Pid, PidPlus};
///
/// /// Overrides the control value before any term is computed.
/// struct UBash;
///
/// impl Modifier<f64> for UBash {
///     fn on_base_terms(
///         &mut self,
///         _pid: &mut Pid<f64>,
///         event: &mut BaseTerms<f64>,
///         _ctx: &mut HookContext<f64>,
///     ) -> HookResult {
///         event.u = Some(0.666);
///         Ok(())
///     }
/// }
///
/// let mut pid = PidPlus::builder().kp(1.0).modifier(UBash).build().unwrap();
/// assert_eq!(pid.pid(0.0, Some(0.01)).unwrap(), 0.666);
/// ```
#[allow(unused_variables)]
pub trait Modifier<F: PidFloat>: Any {
    /// Name used for [`HookStopped`]/[`Failure`] attribution and printing.
    fn name(&self) -> &'static str {
        std::any::type_name_of_val(self)
    }

    /// Handles [`Attached`], emitted once per modifier at construction.
    fn on_attached(
        &mut self,
        pid: &mut Pid<F>,
        event: &mut Attached,
        ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.on_default(pid, EventMut::Attached(event), ctx)
    }

    /// Handles [`InitialConditions`].
    fn on_initial_conditions(
        &mut self,
        pid: &mut Pid<F>,
        event: &mut InitialConditions<F>,
        ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.on_default(pid, EventMut::InitialConditions(event), ctx)
    }

    /// Handles [`SetpointChange`].
    fn on_setpoint_change(
        &mut self,
        pid: &mut Pid<F>,
        event: &mut SetpointChange<F>,
        ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.on_default(pid, EventMut::SetpointChange(event), ctx)
    }

    /// Handles [`BaseTerms`], the first stage of every tick.
    fn on_base_terms(
        &mut self,
        pid: &mut Pid<F>,
        event: &mut BaseTerms<F>,
        ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.on_default(pid, EventMut::BaseTerms(event), ctx)
    }

    /// Handles [`ModifyTerms`], the second stage of every tick.
    fn on_modify_terms(
        &mut self,
        pid: &mut Pid<F>,
        event: &mut ModifyTerms<F>,
        ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.on_default(pid, EventMut::ModifyTerms(event), ctx)
    }

    /// Handles [`CalculateU`], the last stage of every tick.
    fn on_calculate_u(
        &mut self,
        pid: &mut Pid<F>,
        event: &mut CalculateU<F>,
        ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.on_default(pid, EventMut::CalculateU(event), ctx)
    }

    /// Handles [`HookStopped`] replacements.
    fn on_hook_stopped(
        &mut self,
        pid: &mut Pid<F>,
        event: &mut HookStopped<F>,
        ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.on_default(pid, EventMut::HookStopped(event), ctx)
    }

    /// Handles [`Failure`] replacements.
    fn on_failure(
        &mut self,
        pid: &mut Pid<F>,
        event: &mut Failure<F>,
        ctx: &mut HookContext<F>,
    ) -> HookResult {
        self.on_default(pid, EventMut::Failure(event), ctx)
    }

    /// Catch-all for events without a specific handler. Does nothing unless
    /// overridden.
    fn on_default(
        &mut self,
        pid: &mut Pid<F>,
        event: EventMut<'_, F>,
        ctx: &mut HookContext<F>,
    ) -> HookResult {
        Ok(())
    }
}

/// Single-attachment guard for stateful modifiers.
///
/// Call [`check`](Self::check) from `on_attached`: the first controller seen
/// is recorded, and attaching to a different controller afterwards fails
/// with [`PidError::AlreadyAttached`]. Stateless modifiers do not need this.
#[derive(Clone, Debug, Default)]
pub struct AttachOnce {
    attached_to: Option<u64>,
}

impl AttachOnce {
    /// Creates a guard that has not seen any controller yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the first attaching controller; fails on a differing second
    /// attachment.
    pub fn check<F: PidFloat>(&mut self, pid: &Pid<F>) -> HookResult {
        match self.attached_to {
            None => {
                self.attached_to = Some(pid.instance_id());
                Ok(())
            }
            Some(id) if id == pid.instance_id() => Ok(()),
            Some(_) => Err(HookInterrupt::Fail(PidError::AlreadyAttached)),
        }
    }

    /// True once a controller has been recorded.
    pub fn is_attached(&self) -> bool {
        self.attached_to.is_some()
    }
}

/// Selects and invokes the handler matching the event's kind.
pub(crate) fn deliver<F: PidFloat>(
    modifier: &mut dyn Modifier<F>,
    pid: &mut Pid<F>,
    event: &mut Event<F>,
    ctx: &mut HookContext<F>,
) -> HookResult {
    match event {
        Event::Attached(e) => modifier.on_attached(pid, e, ctx),
        Event::InitialConditions(e) => modifier.on_initial_conditions(pid, e, ctx),
        Event::SetpointChange(e) => modifier.on_setpoint_change(pid, e, ctx),
        Event::BaseTerms(e) => modifier.on_base_terms(pid, e, ctx),
        Event::ModifyTerms(e) => modifier.on_modify_terms(pid, e, ctx),
        Event::CalculateU(e) => modifier.on_calculate_u(pid, e, ctx),
        Event::HookStopped(e) => modifier.on_hook_stopped(pid, e, ctx),
        Event::Failure(e) => modifier.on_failure(pid, e, ctx),
    }
}

/// Dispatches one event through the whole modifier chain.
pub(crate) fn dispatch<F: PidFloat>(
    modifiers: &mut [Box<dyn Modifier<F>>],
    pid: &mut Pid<F>,
    event: &mut Event<F>,
    ctx: &mut HookContext<F>,
) -> Result<(), PidError> {
    let names = modifier_names(modifiers);
    notify_from(modifiers, 0, &names, pid, event, ctx)
}

pub(crate) fn modifier_names<F: PidFloat>(modifiers: &[Box<dyn Modifier<F>>]) -> Vec<String> {
    modifiers.iter().map(|m| m.name().to_owned()).collect()
}

/// Notifies `modifiers[start..]` of `event`, applying the stop/failure
/// replacement rules.
///
/// `start` is an absolute index so that the `nth` recorded on replacement
/// events always refers to a position in the full chain. Every replacement
/// continues on a strictly shorter tail, so recursive stops terminate.
pub(crate) fn notify_from<F: PidFloat>(
    modifiers: &mut [Box<dyn Modifier<F>>],
    start: usize,
    names: &[String],
    pid: &mut Pid<F>,
    event: &mut Event<F>,
    ctx: &mut HookContext<F>,
) -> Result<(), PidError> {
    for nth in start..modifiers.len() {
        let outcome = deliver(modifiers[nth].as_mut(), pid, event, ctx);
        // Writes queued by the handler are nested emissions; they complete
        // before the next outer modifier is notified. An error coming back
        // out of one counts as this handler having failed.
        let outcome = match drain_pending(modifiers, pid, ctx) {
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
                    names.to_vec(),
                ));
                return notify_from(modifiers, nth + 1, names, pid, &mut replacement, ctx);
            }
            Err(HookInterrupt::Fail(error)) => {
                if matches!(event, Event::Failure(_)) {
                    // A failure while fanning out a Failure halts further
                    // notification; the frame that built the Failure still
                    // returns the original error.
                    return Ok(());
                }
                let mut replacement = Event::Failure(Failure::new(
                    event.clone(),
                    error.clone(),
                    names[nth].clone(),
                    nth,
                    names.to_vec(),
                ));
                let _ = notify_from(modifiers, nth + 1, names, pid, &mut replacement, ctx);
                return Err(error);
            }
        }
    }
    Ok(())
}

/// Runs every queued controller write as a full nested dispatch.
pub(crate) fn drain_pending<F: PidFloat>(
    modifiers: &mut [Box<dyn Modifier<F>>],
    pid: &mut Pid<F>,
    ctx: &mut HookContext<F>,
) -> Result<(), PidError> {
    while let Some(write) = pop_pending(ctx) {
        match write {
            PendingWrite::Setpoint { value, internal } => {
                ctx.depth += 1;
                let result = run_setpoint_write(modifiers, pid, value, internal, ctx);
                ctx.depth -= 1;
                result?;
            }
        }
    }
    Ok(())
}

fn pop_pending<F: PidFloat>(ctx: &mut HookContext<F>) -> Option<PendingWrite<F>> {
    if ctx.pending.is_empty() {
        None
    } else {
        Some(ctx.pending.remove(0))
    }
}

/// The evented setpoint-write protocol: emit [`SetpointChange`] before the
/// store, then store the handler-supplied `sp` if set, else `sp_to`.
///
/// No-change writes are skipped entirely (no event). The store still
/// happens when a modifier halted the event mid-chain.
pub(crate) fn run_setpoint_write<F: PidFloat>(
    modifiers: &mut [Box<dyn Modifier<F>>],
    pid: &mut Pid<F>,
    value: F,
    internal: bool,
    ctx: &mut HookContext<F>,
) -> Result<(), PidError> {
    if value == pid.setpoint() {
        return Ok(());
    }
    let mut event = Event::SetpointChange(SetpointChange::new(pid.setpoint(), value, internal));
    let names = modifier_names(modifiers);
    notify_from(modifiers, 0, &names, pid, &mut event, ctx)?;
    if let Event::SetpointChange(change) = event {
        pid.store_setpoint(change.sp.unwrap_or(change.sp_to()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_once_records_first_controller() {
        let first: Pid<f64> = Pid::new(1.0, 0.0, 0.0);
        let second: Pid<f64> = Pid::new(1.0, 0.0, 0.0);

        let mut guard = AttachOnce::new();
        assert!(!guard.is_attached());
        assert!(guard.check(&first).is_ok());
        assert!(guard.is_attached());

        // Re-checking against the same controller is fine
        assert!(guard.check(&first).is_ok());

        // A different controller is rejected
        assert_eq!(
            guard.check(&second),
            Err(HookInterrupt::Fail(PidError::AlreadyAttached))
        );
    }

    #[test]
    fn test_interrupt_helpers() {
        assert_eq!(
            HookInterrupt::fail("boom"),
            HookInterrupt::Fail(PidError::Handler("boom".to_owned()))
        );
        assert_eq!(
            HookInterrupt::from(PidError::MissingDt),
            HookInterrupt::Fail(PidError::MissingDt)
        );
    }
}
