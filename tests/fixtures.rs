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

//! Probe modifiers shared by the integration tests.

#[cfg(test)]
pub mod probes {
    use extensible_pid::event::{BaseTerms, EventMut};
    use extensible_pid::hook::{HookContext, HookInterrupt, HookResult, Modifier};
    use extensible_pid::pid::{Pid, PidError};

    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    /// A log shared between probes (and the test body) so that invocation
    /// order across the whole chain can be asserted.
    #[derive(Clone, Default)]
    pub struct SharedLog(Rc<RefCell<Vec<String>>>);

    impl SharedLog {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, entry: String) {
            self.0.borrow_mut().push(entry);
        }

        pub fn entries(&self) -> Vec<String> {
            self.0.borrow().clone()
        }

        pub fn clear(&self) {
            self.0.borrow_mut().clear();
        }

        pub fn count_matching(&self, needle: &str) -> usize {
            self.0
                .borrow()
                .iter()
                .filter(|entry| entry.contains(needle))
                .count()
        }
    }

    fn describe(label: &str, event: &EventMut<'_, f64>, ctx: &HookContext<f64>) -> String {
        match event {
            EventMut::HookStopped(stopped) => format!(
                "{label}:HookStopped(stopper={}, nth={})@{}",
                stopped.stopper(),
                stopped.nth(),
                ctx.depth()
            ),
            EventMut::Failure(failure) => format!(
                "{label}:Failure(stopper={}, nth={})@{}",
                failure.stopper(),
                failure.nth(),
                ctx.depth()
            ),
            other => format!("{label}:{}@{}", other.name(), ctx.depth()),
        }
    }

    /// Logs every event it sees, with its nesting depth.
    pub struct Probe {
        pub label: &'static str,
        pub log: SharedLog,
    }

    impl Probe {
        pub fn new(label: &'static str, log: &SharedLog) -> Self {
            Self {
                label,
                log: log.clone(),
            }
        }
    }

    impl Modifier<f64> for Probe {
        fn name(&self) -> &'static str {
            self.label
        }

        fn on_default(
            &mut self,
            _pid: &mut Pid<f64>,
            event: EventMut<'_, f64>,
            ctx: &mut HookContext<f64>,
        ) -> HookResult {
            self.log.push(describe(self.label, &event, ctx));
            Ok(())
        }
    }

    /// Logs like [`Probe`], then halts propagation of the named event kind.
    pub struct Stopper {
        pub label: &'static str,
        pub stop_on: &'static str,
        pub log: SharedLog,
    }

    impl Stopper {
        pub fn new(label: &'static str, stop_on: &'static str, log: &SharedLog) -> Self {
            Self {
                label,
                stop_on,
                log: log.clone(),
            }
        }
    }

    impl Modifier<f64> for Stopper {
        fn name(&self) -> &'static str {
            self.label
        }

        fn on_default(
            &mut self,
            _pid: &mut Pid<f64>,
            event: EventMut<'_, f64>,
            ctx: &mut HookContext<f64>,
        ) -> HookResult {
            self.log.push(describe(self.label, &event, ctx));
            if event.name() == self.stop_on {
                return Err(HookInterrupt::Stop);
            }
            Ok(())
        }
    }

    /// Logs like [`Probe`], then fails on the named event kind.
    pub struct Exploder {
        pub label: &'static str,
        pub fail_on: &'static str,
        pub log: SharedLog,
    }

    impl Exploder {
        pub fn new(label: &'static str, fail_on: &'static str, log: &SharedLog) -> Self {
            Self {
                label,
                fail_on,
                log: log.clone(),
            }
        }
    }

    impl Modifier<f64> for Exploder {
        fn name(&self) -> &'static str {
            self.label
        }

        fn on_default(
            &mut self,
            _pid: &mut Pid<f64>,
            event: EventMut<'_, f64>,
            ctx: &mut HookContext<f64>,
        ) -> HookResult {
            self.log.push(describe(self.label, &event, ctx));
            if event.name() == self.fail_on {
                return Err(HookInterrupt::Fail(PidError::Handler(format!(
                    "{} blew up",
                    self.label
                ))));
            }
            Ok(())
        }
    }

    /// Overrides selected terms at the base-terms stage.
    #[derive(Default)]
    pub struct TermSetter {
        pub e: Option<f64>,
        pub p: Option<f64>,
        pub i: Option<f64>,
        pub d: Option<f64>,
        pub u: Option<f64>,
    }

    impl Modifier<f64> for TermSetter {
        fn name(&self) -> &'static str {
            "TermSetter"
        }

        fn on_base_terms(
            &mut self,
            _pid: &mut Pid<f64>,
            event: &mut BaseTerms<f64>,
            _ctx: &mut HookContext<f64>,
        ) -> HookResult {
            if self.e.is_some() {
                event.e = self.e;
            }
            if self.p.is_some() {
                event.p = self.p;
            }
            if self.i.is_some() {
                event.i = self.i;
            }
            if self.d.is_some() {
                event.d = self.d;
            }
            if self.u.is_some() {
                event.u = self.u;
            }
            Ok(())
        }
    }

    /// Tags the tick's attribute bag at the base-terms stage.
    pub struct AttrTagger;

    impl Modifier<f64> for AttrTagger {
        fn name(&self) -> &'static str {
            "AttrTagger"
        }

        fn on_base_terms(
            &mut self,
            _pid: &mut Pid<f64>,
            event: &mut BaseTerms<f64>,
            _ctx: &mut HookContext<f64>,
        ) -> HookResult {
            event.attrs.set_num("tag", 42.0);
            Ok(())
        }
    }

    /// An in-memory `Write` sink whose contents outlive the printer that
    /// owns it.
    #[derive(Clone, Default)]
    pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl SharedBuf {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn contents(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
