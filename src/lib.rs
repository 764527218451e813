#![warn(missing_docs)]

//! # Extensible PID Controller
//!
//! This library provides a simple, fast PID (Proportional-Integral-Derivative)
//! controller in Rust, plus an extensible variant whose control-loop
//! calculation is observable and mutable at well-defined stages through an
//! ordered chain of *modifiers*.
//!
//! ## Features
//!
//! - A plain [`Pid`](pid::Pid) controller with the textbook three-term
//!   calculation: error, running integration, derivative on measurement.
//!   Time advances only through the `dt` supplied with each call; there is
//!   no clock inside.
//!
//! - An extensible [`PidPlus`](pid::PidPlus) controller built around a
//!   typed event protocol:
//!   - Six lifecycle stages (attachment, initial conditions, setpoint
//!     changes, and the three sub-stages of every tick) are exposed as
//!     [events](event) with read-only vs read-write field contracts
//!     enforced at compile time.
//!   - [Modifiers](hook::Modifier) receive events in chain order, may
//!     rewrite individual terms, halt propagation cooperatively, or fail
//!     the call; stop and failure are themselves delivered to the rest of
//!     the chain as replacement events.
//!   - Events emitted from inside a handler (such as a setpoint ramp
//!     advancing the stored setpoint) complete before the next outer
//!     modifier is notified, and observers can see their nesting depth.
//!
//! - A toolbox of [built-in modifiers](modifiers): setpoint ramping
//!   (visible or hidden), integral windup limiting, integration reset and
//!   freeze, dead-band, bang-bang classification, derivative-on-error with
//!   kick filtering, event history recording, and event printing.
//!
//! ## Usage
//!
//! ### Plain PID controller
//!
//! ```rust
//! use extensible_pid::pid::Pid;
//!
//! let mut pid = Pid::new(2.0, 0.5, 0.1);
//! pid.initial_conditions(Some(0.0), Some(1.0));
//!
//! // dt can be passed per call ...
//! let u = pid.pid(0.25, Some(0.1)).unwrap();
//! assert!(u > 0.0);
//!
//! // ... or preconfigured once
//! pid.set_default_dt(Some(0.1));
//! let _ = pid.pid(0.3, None).unwrap();
//! ```
//!
//! ### Extensible controller with modifiers
//!
//! Modifiers are attached at construction and receive every event in
//! chain order:
//!
//! ```rust
//! use extensible_pid::modifiers::{SetpointRamp, Windup};
//! use extensible_pid::pid::PidPlus;
//!
//! let mut pid = PidPlus::builder()
//!     .kp(1.0)
//!     .ki(0.2)
//!     .modifier(SetpointRamp::new(5.0).unwrap())
//!     .modifier(Windup::new(2.0))
//!     .build()
//!     .unwrap();
//!
//! // The ramp spreads this change over 5 seconds of supplied dt
//! pid.set_setpoint(4.0).unwrap();
//! let _ = pid.pid(0.0, Some(1.0)).unwrap();
//! assert!(pid.setpoint() < 4.0);
//! ```
//!
//! ### Writing your own modifier
//!
//! Implement [`Modifier`](hook::Modifier) for the stages you care about;
//! anything you leave out is a no-op (or route everything through
//! `on_default`, the way the bundled
//! [`History`](modifiers::History) recorder does):
//!
//! ```rust
//! use extensible_pid::event::ModifyTerms;
//! use extensible_pid::hook::{HookContext, HookResult, Modifier};
//! use extensible_pid::pid::{Pid, PidPlus};
//!
//! /// Drops the integral term on ticks where the error is large.
//! struct SaturationReset {
//!     error_limit: f64,
//! }
//!
//! impl Modifier<f64> for SaturationReset {
//!     fn on_modify_terms(
//!         &mut self,
//!         pid: &mut Pid<f64>,
//!         event: &mut ModifyTerms<f64>,
//!         _ctx: &mut HookContext<f64>,
//!     ) -> HookResult {
//!         if event.e().abs() > self.error_limit {
//!             pid.set_integration(0.0);
//!             event.i = 0.0;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut pid = PidPlus::builder()
//!     .kp(1.0)
//!     .ki(1.0)
//!     .modifier(SaturationReset { error_limit: 10.0 })
//!     .build()
//!     .unwrap();
//! pid.set_setpoint(100.0).unwrap();
//!
//! // error is 100, far beyond the limit: only the P term contributes
//! assert_eq!(pid.pid(0.0, Some(1.0)).unwrap(), 100.0);
//! ```
//!
//! ## Scheduling model
//!
//! A controller and its modifiers are single-threaded: every operation is
//! synchronous and handlers run to completion within the triggering call.
//! Nothing here spins up threads or timers; drive the loop from whatever
//! scheduling your application already has and pass the elapsed `dt` in.
//!
//! ## License
//! This project is licensed under the MIT License.

/// The controllers: [`Pid`](pid::Pid), [`PidPlus`](pid::PidPlus), and their
/// error type.
pub mod pid;

/// The typed events generated at known points of the control loop.
pub mod event;

/// The modifier trait, handler results, and attachment utilities.
pub mod hook;

/// The built-in modifiers.
pub mod modifiers;

#[doc(hidden)]
#[cfg(feature = "simulation")]
pub mod sim;

use core::fmt;
use num_traits::float::FloatCore;

/// Floating-point scalar usable by the controllers: any [`FloatCore`] type
/// that can also be rendered (for event printing and history debugging).
///
/// Implemented for `f32` and `f64` via the blanket impl; custom float types
/// opt in the same way.
pub trait PidFloat: FloatCore + fmt::Debug + fmt::Display + 'static {}

impl<T> PidFloat for T where T: FloatCore + fmt::Debug + fmt::Display + 'static {}

#[doc = include_str!("../README.md")]
#[cfg(doctest)]
pub struct ReadmeDoctests;
