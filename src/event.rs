// Typed events generated at known points of the extensible control loop
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

use crate::pid::PidError;
use crate::PidFloat;

use core::fmt;
use std::collections::BTreeMap;

/// A single extra attribute attached to a tick event by a modifier.
///
/// The control-loop events carry an open, string-keyed bag of these in
/// addition to their typed fields, so cooperating modifiers can pass
/// information to each other without the library having to know about it.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue<F: PidFloat> {
    /// A boolean marker.
    Bool(bool),
    /// A numeric value in the controller's scalar type.
    Num(F),
    /// A free-form text value.
    Text(String),
}

impl<F: PidFloat> fmt::Display for AttrValue<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(v) => write!(f, "{v}"),
            AttrValue::Num(v) => write!(f, "{v}"),
            AttrValue::Text(v) => write!(f, "{v:?}"),
        }
    }
}

/// The open attribute bag shared by the three tick events.
///
/// Attributes set on [`BaseTerms`] are visible on the [`ModifyTerms`] and
/// [`CalculateU`] events of the same `pid()` call; the controller carries the
/// bag forward when it builds the next event in the chain.
#[derive(Clone, Debug, PartialEq)]
pub struct AttrBag<F: PidFloat> {
    values: BTreeMap<String, AttrValue<F>>,
}

impl<F: PidFloat> Default for AttrBag<F> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl<F: PidFloat> AttrBag<F> {
    /// Stores an attribute, replacing any previous value under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: AttrValue<F>) {
        self.values.insert(key.into(), value);
    }

    /// Stores a numeric attribute.
    pub fn set_num(&mut self, key: impl Into<String>, value: F) {
        self.insert(key, AttrValue::Num(value));
    }

    /// Stores a boolean attribute.
    pub fn set_flag(&mut self, key: impl Into<String>, value: bool) {
        self.insert(key, AttrValue::Bool(value));
    }

    /// Stores a text attribute.
    pub fn set_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(key, AttrValue::Text(value.into()));
    }

    /// Looks up an attribute by key.
    pub fn get(&self, key: &str) -> Option<&AttrValue<F>> {
        self.values.get(key)
    }

    /// Looks up a numeric attribute, returning `None` if absent or not numeric.
    pub fn num(&self, key: &str) -> Option<F> {
        match self.values.get(key) {
            Some(AttrValue::Num(v)) => Some(*v),
            _ => None,
        }
    }

    /// Looks up a boolean attribute, returning `None` if absent or not boolean.
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(AttrValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    /// Looks up a text attribute, returning `None` if absent or not text.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(AttrValue::Text(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Returns true when no attributes are stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the number of stored attributes.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterates over the stored attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue<F>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn fmt_tail(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.iter() {
            write!(f, ", {key}={value}")?;
        }
        Ok(())
    }
}

/// Display adapter rendering `Option<F>` as the bare value or `None`.
struct Opt<'a, F: PidFloat>(&'a Option<F>);

impl<F: PidFloat> fmt::Display for Opt<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v}"),
            None => f.write_str("None"),
        }
    }
}

/// Emitted once per modifier while a [`PidPlus`](crate::pid::PidPlus) is
/// being constructed.
///
/// Each modifier sees only its own `Attached`; the controller is not fully
/// initialized yet, so handlers should restrict themselves to bookkeeping
/// such as [`AttachOnce`](crate::hook::AttachOnce) checks.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct Attached;

impl Attached {
    pub(crate) fn new() -> Self {
        Attached
    }
}

impl fmt::Display for Attached {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Attached()")
    }
}

/// Emitted after `initial_conditions` has mutated the controller.
///
/// Both fields are read-only and mirror the arguments of the call; `None`
/// means the corresponding piece of state was carried forward unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct InitialConditions<F: PidFloat> {
    pv: Option<F>,
    setpoint: Option<F>,
}

impl<F: PidFloat> InitialConditions<F> {
    pub(crate) fn new(pv: Option<F>, setpoint: Option<F>) -> Self {
        Self { pv, setpoint }
    }

    /// The process variable passed to `initial_conditions`, if any.
    pub fn pv(&self) -> Option<F> {
        self.pv
    }

    /// The setpoint passed to `initial_conditions`, if any.
    pub fn setpoint(&self) -> Option<F> {
        self.setpoint
    }
}

impl<F: PidFloat> fmt::Display for InitialConditions<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InitialConditions(pv={}, setpoint={})",
            Opt(&self.pv),
            Opt(&self.setpoint)
        )
    }
}

/// Emitted before a setpoint write is stored.
///
/// A handler may redirect the write by assigning [`sp`](Self::sp); the
/// controller stores `sp` if it is set and `sp_to` otherwise. Setpoint
/// writes issued internally by a modifier (e.g. the per-tick advance of a
/// visible setpoint ramp) are flagged [`is_internal`](Self::is_internal).
#[derive(Clone, Debug, PartialEq)]
pub struct SetpointChange<F: PidFloat> {
    /// Replacement value to store instead of `sp_to`, if a handler sets it.
    pub sp: Option<F>,
    sp_from: F,
    sp_to: F,
    internal: bool,
}

impl<F: PidFloat> SetpointChange<F> {
    pub(crate) fn new(sp_from: F, sp_to: F, internal: bool) -> Self {
        Self {
            sp: None,
            sp_from,
            sp_to,
            internal,
        }
    }

    /// The setpoint currently stored on the controller.
    pub fn sp_from(&self) -> F {
        self.sp_from
    }

    /// The setpoint the caller asked to store.
    pub fn sp_to(&self) -> F {
        self.sp_to
    }

    /// True when the write was issued from inside another handler rather
    /// than by the controller's caller.
    pub fn is_internal(&self) -> bool {
        self.internal
    }
}

impl<F: PidFloat> fmt::Display for SetpointChange<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SetpointChange(sp={}, sp_from={}, sp_to={}, internal={})",
            Opt(&self.sp),
            self.sp_from,
            self.sp_to,
            self.internal
        )
    }
}

/// Emitted at the start of every `pid()` call, before any term has been
/// computed.
///
/// All five terms start out `None`. A handler that assigns a term takes it
/// over for this tick: the controller skips the corresponding internal
/// calculation *and its side effect* (the internal `i` advances the stored
/// integration, the internal `d` updates the previous process variable).
/// Assigning [`u`](Self::u) pre-empts the weighted sum later in the tick but
/// does not suppress any of the term calculations.
#[derive(Clone, Debug, PartialEq)]
pub struct BaseTerms<F: PidFloat> {
    dt: F,
    /// Error override; `None` selects `setpoint − pv`.
    pub e: Option<F>,
    /// Proportional-term override; `None` selects `e`.
    pub p: Option<F>,
    /// Integral-term override; `None` advances and selects the stored integration.
    pub i: Option<F>,
    /// Derivative-term override; `None` selects the derivative on measurement.
    pub d: Option<F>,
    /// Control-value override; `None` selects the weighted sum of the terms.
    pub u: Option<F>,
    /// Extra attributes propagated to the later events of this tick.
    pub attrs: AttrBag<F>,
}

impl<F: PidFloat> BaseTerms<F> {
    pub(crate) fn new(dt: F) -> Self {
        Self {
            dt,
            e: None,
            p: None,
            i: None,
            d: None,
            u: None,
            attrs: AttrBag::default(),
        }
    }

    /// The time step of this tick.
    pub fn dt(&self) -> F {
        self.dt
    }
}

impl<F: PidFloat> fmt::Display for BaseTerms<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BaseTerms(dt={}, e={}, p={}, i={}, d={}, u={}",
            self.dt,
            Opt(&self.e),
            Opt(&self.p),
            Opt(&self.i),
            Opt(&self.d),
            Opt(&self.u)
        )?;
        self.attrs.fmt_tail(f)?;
        f.write_str(")")
    }
}

/// Emitted after the controller has filled in every term left unset on
/// [`BaseTerms`].
///
/// The error is frozen at this point; the three terms are plain values and
/// may be rewritten freely. `u` is still `None` unless an earlier handler
/// supplied it.
#[derive(Clone, Debug, PartialEq)]
pub struct ModifyTerms<F: PidFloat> {
    dt: F,
    e: F,
    /// Proportional term, rewritable.
    pub p: F,
    /// Integral term, rewritable.
    pub i: F,
    /// Derivative term, rewritable.
    pub d: F,
    /// Control-value override carried over from [`BaseTerms`].
    pub u: Option<F>,
    /// Extra attributes propagated from [`BaseTerms`].
    pub attrs: AttrBag<F>,
}

impl<F: PidFloat> ModifyTerms<F> {
    pub(crate) fn new(dt: F, e: F, p: F, i: F, d: F, u: Option<F>, attrs: AttrBag<F>) -> Self {
        Self {
            dt,
            e,
            p,
            i,
            d,
            u,
            attrs,
        }
    }

    /// The time step of this tick.
    pub fn dt(&self) -> F {
        self.dt
    }

    /// The error term of this tick.
    pub fn e(&self) -> F {
        self.e
    }
}

impl<F: PidFloat> fmt::Display for ModifyTerms<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ModifyTerms(dt={}, e={}, p={}, i={}, d={}, u={}",
            self.dt,
            self.e,
            self.p,
            self.i,
            self.d,
            Opt(&self.u)
        )?;
        self.attrs.fmt_tail(f)?;
        f.write_str(")")
    }
}

/// Emitted after the control value has been computed (or carried over from
/// an earlier override).
///
/// Only [`u`](Self::u) is still rewritable; this is the stage where output
/// shaping such as bang-bang classification or dead-banding belongs.
#[derive(Clone, Debug, PartialEq)]
pub struct CalculateU<F: PidFloat> {
    dt: F,
    e: F,
    p: F,
    i: F,
    d: F,
    /// The control value about to be returned, rewritable.
    pub u: F,
    /// Extra attributes propagated from the earlier events of this tick.
    pub attrs: AttrBag<F>,
}

impl<F: PidFloat> CalculateU<F> {
    pub(crate) fn new(dt: F, e: F, p: F, i: F, d: F, u: F, attrs: AttrBag<F>) -> Self {
        Self {
            dt,
            e,
            p,
            i,
            d,
            u,
            attrs,
        }
    }

    /// The time step of this tick.
    pub fn dt(&self) -> F {
        self.dt
    }

    /// The error term of this tick.
    pub fn e(&self) -> F {
        self.e
    }

    /// The proportional term of this tick.
    pub fn p(&self) -> F {
        self.p
    }

    /// The integral term of this tick.
    pub fn i(&self) -> F {
        self.i
    }

    /// The derivative term of this tick.
    pub fn d(&self) -> F {
        self.d
    }
}

impl<F: PidFloat> fmt::Display for CalculateU<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalculateU(dt={}, e={}, p={}, i={}, d={}, u={}",
            self.dt, self.e, self.p, self.i, self.d, self.u
        )?;
        self.attrs.fmt_tail(f)?;
        f.write_str(")")
    }
}

/// Replaces an in-flight event after a handler halted propagation.
///
/// The remaining modifiers receive this event instead of the original one;
/// the original, as it stood when propagation stopped, is carried in
/// [`event`](Self::event). Chains can recurse: a handler of a `HookStopped`
/// halting again wraps the current `HookStopped` in a new one.
#[derive(Clone, Debug, PartialEq)]
pub struct HookStopped<F: PidFloat> {
    event: Box<Event<F>>,
    stopper: String,
    nth: usize,
    modifiers: Vec<String>,
}

impl<F: PidFloat> HookStopped<F> {
    pub(crate) fn new(event: Event<F>, stopper: String, nth: usize, modifiers: Vec<String>) -> Self {
        Self {
            event: Box::new(event),
            stopper,
            nth,
            modifiers,
        }
    }

    /// The event whose propagation was halted.
    pub fn event(&self) -> &Event<F> {
        &self.event
    }

    /// Name of the modifier that halted propagation.
    pub fn stopper(&self) -> &str {
        &self.stopper
    }

    /// Position of the halting modifier in the chain.
    pub fn nth(&self) -> usize {
        self.nth
    }

    /// Names of every modifier in the chain, in order.
    pub fn modifiers(&self) -> &[String] {
        &self.modifiers
    }
}

impl<F: PidFloat> fmt::Display for HookStopped<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HookStopped(event={}, stopper={}, nth={}, modifiers=[{}])",
            self.event,
            self.stopper,
            self.nth,
            self.modifiers.join(", ")
        )
    }
}

/// Replaces an in-flight event after a handler failed.
///
/// Delivered best-effort to the remaining modifiers; afterwards the captured
/// [`error`](Self::error) is returned to whoever triggered the dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct Failure<F: PidFloat> {
    event: Box<Event<F>>,
    error: PidError,
    stopper: String,
    nth: usize,
    modifiers: Vec<String>,
}

impl<F: PidFloat> Failure<F> {
    pub(crate) fn new(
        event: Event<F>,
        error: PidError,
        stopper: String,
        nth: usize,
        modifiers: Vec<String>,
    ) -> Self {
        Self {
            event: Box::new(event),
            error,
            stopper,
            nth,
            modifiers,
        }
    }

    /// The event whose propagation failed.
    pub fn event(&self) -> &Event<F> {
        &self.event
    }

    /// The error raised by the failing handler.
    pub fn error(&self) -> &PidError {
        &self.error
    }

    /// Name of the failing modifier.
    pub fn stopper(&self) -> &str {
        &self.stopper
    }

    /// Position of the failing modifier in the chain.
    pub fn nth(&self) -> usize {
        self.nth
    }

    /// Names of every modifier in the chain, in order.
    pub fn modifiers(&self) -> &[String] {
        &self.modifiers
    }
}

impl<F: PidFloat> fmt::Display for Failure<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failure(event={}, error={}, stopper={}, nth={}, modifiers=[{}])",
            self.event,
            self.error,
            self.stopper,
            self.nth,
            self.modifiers.join(", ")
        )
    }
}

/// An owned event of any kind, as stored by observers such as
/// [`History`](crate::modifiers::History).
#[derive(Clone, Debug, PartialEq)]
pub enum Event<F: PidFloat> {
    /// See [`Attached`].
    Attached(Attached),
    /// See [`InitialConditions`].
    InitialConditions(InitialConditions<F>),
    /// See [`SetpointChange`].
    SetpointChange(SetpointChange<F>),
    /// See [`BaseTerms`].
    BaseTerms(BaseTerms<F>),
    /// See [`ModifyTerms`].
    ModifyTerms(ModifyTerms<F>),
    /// See [`CalculateU`].
    CalculateU(CalculateU<F>),
    /// See [`HookStopped`].
    HookStopped(HookStopped<F>),
    /// See [`Failure`].
    Failure(Failure<F>),
}

impl<F: PidFloat> Event<F> {
    /// The event's kind as a short name, e.g. `"BaseTerms"`.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Attached(_) => "Attached",
            Event::InitialConditions(_) => "InitialConditions",
            Event::SetpointChange(_) => "SetpointChange",
            Event::BaseTerms(_) => "BaseTerms",
            Event::ModifyTerms(_) => "ModifyTerms",
            Event::CalculateU(_) => "CalculateU",
            Event::HookStopped(_) => "HookStopped",
            Event::Failure(_) => "Failure",
        }
    }
}

impl<F: PidFloat> fmt::Display for Event<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Attached(e) => e.fmt(f),
            Event::InitialConditions(e) => e.fmt(f),
            Event::SetpointChange(e) => e.fmt(f),
            Event::BaseTerms(e) => e.fmt(f),
            Event::ModifyTerms(e) => e.fmt(f),
            Event::CalculateU(e) => e.fmt(f),
            Event::HookStopped(e) => e.fmt(f),
            Event::Failure(e) => e.fmt(f),
        }
    }
}

/// A borrowed view of an in-flight event, as handed to
/// [`Modifier::on_default`](crate::hook::Modifier::on_default).
#[allow(missing_docs)]
pub enum EventMut<'a, F: PidFloat> {
    Attached(&'a mut Attached),
    InitialConditions(&'a mut InitialConditions<F>),
    SetpointChange(&'a mut SetpointChange<F>),
    BaseTerms(&'a mut BaseTerms<F>),
    ModifyTerms(&'a mut ModifyTerms<F>),
    CalculateU(&'a mut CalculateU<F>),
    HookStopped(&'a mut HookStopped<F>),
    Failure(&'a mut Failure<F>),
}

impl<F: PidFloat> EventMut<'_, F> {
    /// The event's kind as a short name, e.g. `"BaseTerms"`.
    pub fn name(&self) -> &'static str {
        match self {
            EventMut::Attached(_) => "Attached",
            EventMut::InitialConditions(_) => "InitialConditions",
            EventMut::SetpointChange(_) => "SetpointChange",
            EventMut::BaseTerms(_) => "BaseTerms",
            EventMut::ModifyTerms(_) => "ModifyTerms",
            EventMut::CalculateU(_) => "CalculateU",
            EventMut::HookStopped(_) => "HookStopped",
            EventMut::Failure(_) => "Failure",
        }
    }

    /// Clones the viewed event into an owned [`Event`].
    pub fn to_owned(&self) -> Event<F> {
        match self {
            EventMut::Attached(e) => Event::Attached((*e).clone()),
            EventMut::InitialConditions(e) => Event::InitialConditions((*e).clone()),
            EventMut::SetpointChange(e) => Event::SetpointChange((*e).clone()),
            EventMut::BaseTerms(e) => Event::BaseTerms((*e).clone()),
            EventMut::ModifyTerms(e) => Event::ModifyTerms((*e).clone()),
            EventMut::CalculateU(e) => Event::CalculateU((*e).clone()),
            EventMut::HookStopped(e) => Event::HookStopped((*e).clone()),
            EventMut::Failure(e) => Event::Failure((*e).clone()),
        }
    }
}

impl<F: PidFloat> fmt::Display for EventMut<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventMut::Attached(e) => e.fmt(f),
            EventMut::InitialConditions(e) => e.fmt(f),
            EventMut::SetpointChange(e) => e.fmt(f),
            EventMut::BaseTerms(e) => e.fmt(f),
            EventMut::ModifyTerms(e) => e.fmt(f),
            EventMut::CalculateU(e) => e.fmt(f),
            EventMut::HookStopped(e) => e.fmt(f),
            EventMut::Failure(e) => e.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_bag_round_trip() {
        let mut bag: AttrBag<f64> = AttrBag::default();
        assert!(bag.is_empty());

        bag.set_num("gain_scale", 0.5);
        bag.set_flag("snapped", true);
        bag.set_text("source", "feedforward");

        assert_eq!(bag.len(), 3);
        assert_eq!(bag.num("gain_scale"), Some(0.5));
        assert_eq!(bag.flag("snapped"), Some(true));
        assert_eq!(bag.text("source"), Some("feedforward"));

        // Wrong-kind lookups miss rather than coerce
        assert_eq!(bag.num("snapped"), None);
        assert_eq!(bag.flag("gain_scale"), None);
        assert_eq!(bag.text("missing"), None);
    }

    #[test]
    fn test_base_terms_rendering() {
        let mut event: BaseTerms<f64> = BaseTerms::new(1.0);
        assert_eq!(
            event.to_string(),
            "BaseTerms(dt=1, e=None, p=None, i=None, d=None, u=None)"
        );

        event.e = Some(0.5);
        event.attrs.set_flag("snapped", false);
        assert_eq!(
            event.to_string(),
            "BaseTerms(dt=1, e=0.5, p=None, i=None, d=None, u=None, snapped=false)"
        );
    }

    #[test]
    fn test_stopped_rendering_carries_the_inner_event() {
        let inner = Event::SetpointChange(SetpointChange::new(0.0, 4.0, false));
        let stopped = HookStopped::new(
            inner,
            "Gate".to_owned(),
            1,
            vec!["Probe".to_owned(), "Gate".to_owned()],
        );
        assert_eq!(
            stopped.to_string(),
            "HookStopped(event=SetpointChange(sp=None, sp_from=0, sp_to=4, internal=false), \
             stopper=Gate, nth=1, modifiers=[Probe, Gate])"
        );
    }

    #[test]
    fn test_event_names() {
        let event: Event<f64> = Event::BaseTerms(BaseTerms::new(0.1));
        assert_eq!(event.name(), "BaseTerms");
        assert_eq!(Event::<f64>::Attached(Attached::new()).name(), "Attached");
    }
}
