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

mod fixtures;

use fixtures::probes::{AttrTagger, Exploder, Probe, SharedLog, Stopper, TermSetter};

use extensible_pid::modifiers::{History, SetpointRamp};
use extensible_pid::pid::{PidError, PidPlus};

mod test_event_lifecycle {
    use super::*;

    #[test]
    fn test_attached_fires_once_per_modifier_and_only_for_itself() {
        let log = SharedLog::new();
        let _pid = PidPlus::builder()
            .modifier(Probe::new("A", &log))
            .modifier(Probe::new("B", &log))
            .build()
            .unwrap();

        assert_eq!(log.count_matching("A:Attached"), 1);
        assert_eq!(log.count_matching("B:Attached"), 1);
        assert_eq!(log.count_matching("Attached"), 2);
    }

    #[test]
    fn test_construction_emits_one_initial_conditions_through_the_chain() {
        let log = SharedLog::new();
        let _pid = PidPlus::builder()
            .modifier(Probe::new("A", &log))
            .modifier(Probe::new("B", &log))
            .build()
            .unwrap();

        assert_eq!(
            log.entries(),
            [
                "A:Attached@0",
                "B:Attached@0",
                "A:InitialConditions@0",
                "B:InitialConditions@0",
            ]
        );
    }

    #[test]
    fn test_initial_conditions_never_emits_setpoint_change() {
        let log = SharedLog::new();
        let mut pid = PidPlus::builder()
            .modifier(Probe::new("A", &log))
            .build()
            .unwrap();
        log.clear();

        pid.initial_conditions(Some(1.0), Some(5.0)).unwrap();

        assert_eq!(log.entries(), ["A:InitialConditions@0"]);
        assert_eq!(pid.setpoint(), 5.0);
    }

    #[test]
    fn test_setpoint_write_notifies_in_chain_order() {
        let log = SharedLog::new();
        let mut pid = PidPlus::builder()
            .modifier(Probe::new("A", &log))
            .modifier(Probe::new("B", &log))
            .build()
            .unwrap();
        log.clear();

        pid.set_setpoint(4.0).unwrap();

        assert_eq!(log.entries(), ["A:SetpointChange@0", "B:SetpointChange@0"]);
    }

    #[test]
    fn test_no_change_setpoint_write_emits_nothing() {
        let log = SharedLog::new();
        let mut pid = PidPlus::builder()
            .modifier(Probe::new("A", &log))
            .build()
            .unwrap();
        log.clear();

        pid.set_setpoint(0.0).unwrap(); // already the setpoint

        assert!(log.entries().is_empty());
    }

    #[test]
    fn test_one_tick_runs_the_three_stages_in_order() {
        let log = SharedLog::new();
        let mut pid = PidPlus::builder()
            .kp(1.0)
            .modifier(Probe::new("A", &log))
            .build()
            .unwrap();
        log.clear();

        pid.pid(0.5, Some(0.1)).unwrap();

        assert_eq!(
            log.entries(),
            ["A:BaseTerms@0", "A:ModifyTerms@0", "A:CalculateU@0"]
        );
    }
}

mod test_overrides {
    use super::*;

    #[test]
    fn test_overriding_i_suppresses_the_integration_side_effect() {
        let mut pid = PidPlus::builder()
            .ki(1.0)
            .modifier(TermSetter {
                i: Some(7.0),
                ..TermSetter::default()
            })
            .build()
            .unwrap();
        pid.set_setpoint(10.0).unwrap();

        assert_eq!(pid.pid(0.0, Some(1.0)).unwrap(), 7.0);
        assert_eq!(pid.integration(), 0.0); // the internal advance never ran
    }

    #[test]
    fn test_overriding_u_does_not_suppress_term_side_effects() {
        let mut pid = PidPlus::builder()
            .kp(1.0)
            .ki(1.0)
            .modifier(TermSetter {
                u: Some(0.666),
                ..TermSetter::default()
            })
            .build()
            .unwrap();
        pid.set_setpoint(10.0).unwrap();

        assert_eq!(pid.pid(0.0, Some(1.0)).unwrap(), 0.666);
        assert_eq!(pid.integration(), 10.0); // e*dt accumulated regardless
        assert_eq!(pid.last_pid().unwrap(), (10.0, 10.0, 0.0));
    }

    #[test]
    fn test_overriding_d_preserves_the_pv_memory() {
        let mut pid = PidPlus::builder()
            .kd(1.0)
            .modifier(TermSetter {
                d: Some(0.0),
                ..TermSetter::default()
            })
            .build()
            .unwrap();

        // the override suppresses the internal derivative, so prev_pv is
        // not advanced by this tick
        assert_eq!(pid.pid(5.0, Some(1.0)).unwrap(), 0.0);

        // drop the override: the internal derivative now differences
        // against the pv memory from before the overridden tick
        pid.find_modifier_mut::<TermSetter>().unwrap().d = None;
        assert_eq!(pid.pid(5.0, Some(1.0)).unwrap(), -5.0);
    }

    #[test]
    fn test_overriding_e_feeds_the_dependent_terms() {
        let mut pid = PidPlus::builder()
            .kp(1.0)
            .ki(1.0)
            .modifier(TermSetter {
                e: Some(3.0),
                ..TermSetter::default()
            })
            .build()
            .unwrap();
        pid.set_setpoint(100.0).unwrap();

        // p and the integration advance both use the overridden error
        assert_eq!(pid.pid(0.0, Some(1.0)).unwrap(), 6.0);
        assert_eq!(pid.integration(), 3.0);
    }

    #[test]
    fn test_attributes_propagate_across_the_tick_events() {
        let mut pid = PidPlus::builder()
            .kp(1.0)
            .modifier(AttrTagger)
            .modifier(History::unbounded())
            .build()
            .unwrap();

        pid.pid(0.5, Some(0.1)).unwrap();

        let history = pid.find_modifier::<History<f64>>().unwrap();
        let tagged: Vec<&str> = history
            .events()
            .filter_map(|event| match event {
                extensible_pid::event::Event::BaseTerms(e) => {
                    e.attrs.num("tag").map(|_| "BaseTerms")
                }
                extensible_pid::event::Event::ModifyTerms(e) => {
                    e.attrs.num("tag").map(|_| "ModifyTerms")
                }
                extensible_pid::event::Event::CalculateU(e) => {
                    e.attrs.num("tag").map(|_| "CalculateU")
                }
                _ => None,
            })
            .collect();

        assert_eq!(tagged, ["BaseTerms", "ModifyTerms", "CalculateU"]);
    }
}

mod test_stop_and_failure {
    use super::*;

    /// Halting at position k: modifiers before k saw the original event,
    /// modifiers after k saw the replacement, exactly once each.
    #[test]
    fn test_hookstop_fanout_reaches_the_remaining_modifiers() {
        let log = SharedLog::new();
        let mut pid = PidPlus::builder()
            .modifier(Probe::new("A", &log))
            .modifier(Stopper::new("B", "SetpointChange", &log))
            .modifier(Probe::new("C", &log))
            .build()
            .unwrap();
        log.clear();

        pid.set_setpoint(4.0).unwrap();

        assert_eq!(
            log.entries(),
            [
                "A:SetpointChange@0",
                "B:SetpointChange@0",
                "C:HookStopped(stopper=B, nth=1)@0",
            ]
        );
        // the store still happens with whatever the event carried
        assert_eq!(pid.setpoint(), 4.0);
    }

    #[test]
    fn test_hookstop_at_the_tail_notifies_nobody() {
        let log = SharedLog::new();
        let mut pid = PidPlus::builder()
            .modifier(Probe::new("A", &log))
            .modifier(Stopper::new("B", "SetpointChange", &log))
            .build()
            .unwrap();
        log.clear();

        pid.set_setpoint(4.0).unwrap();

        assert_eq!(log.count_matching("HookStopped"), 0);
    }

    #[test]
    fn test_hookstop_does_not_cancel_the_enclosing_tick() {
        let log = SharedLog::new();
        let mut pid = PidPlus::builder()
            .kp(1.0)
            .modifier(Stopper::new("A", "BaseTerms", &log))
            .build()
            .unwrap();
        pid.set_setpoint(2.0).unwrap();

        // propagation of BaseTerms halts, the calculation does not
        assert_eq!(pid.pid(0.0, Some(1.0)).unwrap(), 2.0);
    }

    /// A handler of a HookStopped halting again wraps the replacement in a
    /// new HookStopped over a still-shorter tail, so the recursion ends.
    #[test]
    fn test_recursive_hookstop_terminates() {
        let log = SharedLog::new();
        let mut pid = PidPlus::builder()
            .modifier(Stopper::new("A", "SetpointChange", &log))
            .modifier(Stopper::new("B", "HookStopped", &log))
            .modifier(Probe::new("C", &log))
            .build()
            .unwrap();
        log.clear();

        pid.set_setpoint(4.0).unwrap();

        assert_eq!(
            log.entries(),
            [
                "A:SetpointChange@0",
                "B:HookStopped(stopper=A, nth=0)@0",
                "C:HookStopped(stopper=B, nth=1)@0",
            ]
        );
    }

    #[test]
    fn test_failure_fans_out_then_reraises() {
        let log = SharedLog::new();
        let mut pid = PidPlus::builder()
            .kp(1.0)
            .modifier(Probe::new("A", &log))
            .modifier(Exploder::new("B", "BaseTerms", &log))
            .modifier(Probe::new("C", &log))
            .build()
            .unwrap();
        log.clear();

        let result = pid.pid(0.0, Some(1.0));

        assert_eq!(result, Err(PidError::Handler("B blew up".to_owned())));
        assert_eq!(
            log.entries(),
            [
                "A:BaseTerms@0",
                "B:BaseTerms@0",
                "C:Failure(stopper=B, nth=1)@0",
            ]
        );
    }

    /// A failure while fanning out a Failure halts further notification;
    /// the original error still reaches the caller.
    #[test]
    fn test_failure_during_failure_fanout_halts_notification() {
        let log = SharedLog::new();
        let mut pid = PidPlus::builder()
            .modifier(Exploder::new("A", "BaseTerms", &log))
            .modifier(Exploder::new("B", "Failure", &log))
            .modifier(Probe::new("C", &log))
            .build()
            .unwrap();
        log.clear();

        let result = pid.pid(0.0, Some(1.0));

        assert_eq!(result, Err(PidError::Handler("A blew up".to_owned())));
        assert_eq!(log.count_matching("B:Failure"), 1);
        assert_eq!(log.count_matching("C:"), 0);
    }

    #[test]
    fn test_attach_failure_aborts_construction() {
        let log = SharedLog::new();
        let result = PidPlus::builder()
            .modifier(Probe::new("A", &log))
            .modifier(Exploder::new("B", "Attached", &log))
            .modifier(Probe::new("C", &log))
            .build();

        assert_eq!(
            result.map(|_| ()),
            Err(PidError::Handler("B blew up".to_owned()))
        );
        assert_eq!(
            log.entries(),
            [
                "A:Attached@0",
                "B:Attached@0",
                "C:Failure(stopper=B, nth=1)@0",
            ]
        );
    }

    #[test]
    fn test_attach_stop_ends_the_pass_but_not_construction() {
        let log = SharedLog::new();
        let pid = PidPlus::builder()
            .modifier(Probe::new("A", &log))
            .modifier(Stopper::new("B", "Attached", &log))
            .modifier(Probe::new("C", &log))
            .build()
            .unwrap();

        // C's own Attached was replaced by the HookStopped fanout, but the
        // initial-conditions pass still reaches everyone
        assert_eq!(
            log.entries(),
            [
                "A:Attached@0",
                "B:Attached@0",
                "C:HookStopped(stopper=B, nth=1)@0",
                "A:InitialConditions@0",
                "B:InitialConditions@0",
                "C:InitialConditions@0",
            ]
        );
        drop(pid);
    }
}

mod test_nesting {
    use super::*;

    /// A visible ramp advances the setpoint by re-emitting an internal
    /// SetpointChange from inside the base-terms stage: observers after the
    /// ramp see it at depth 1, before their own view of the outer event.
    #[test]
    fn test_internal_setpoint_change_is_seen_at_depth_one() {
        let log = SharedLog::new();
        let mut pid = PidPlus::builder()
            .kp(1.0)
            .modifier(SetpointRamp::new(5.0).unwrap())
            .modifier(Probe::new("P", &log))
            .build()
            .unwrap();

        pid.set_setpoint(4.0).unwrap();
        log.clear();

        pid.pid(0.0, Some(1.0)).unwrap();

        assert_eq!(
            log.entries(),
            [
                "P:SetpointChange@1",
                "P:BaseTerms@0",
                "P:ModifyTerms@0",
                "P:CalculateU@0",
            ]
        );
    }

    #[test]
    fn test_find_modifier_by_concrete_type() {
        let log = SharedLog::new();
        let mut pid = PidPlus::builder()
            .modifier(Probe::new("A", &log))
            .build()
            .unwrap();

        assert!(pid.find_modifier::<Probe>().is_some());
        assert!(pid.find_modifier_mut::<Probe>().is_some());
        assert!(pid.find_modifier::<History<f64>>().is_none());
    }
}
