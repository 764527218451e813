//! Walks through the event pipeline with an `EventPrinter` attached, so
//! every lifecycle event of a few ticks is rendered to stdout.
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

use extensible_pid::modifiers::{DeadBand, EventPrinter, History, SetpointRamp, Windup};
use extensible_pid::pid::PidPlus;

fn main() {
    let mut pid = PidPlus::builder()
        .kp(1.0)
        .ki(0.2)
        .modifier(SetpointRamp::new(3.0).unwrap())
        .modifier(Windup::new(2.0))
        .modifier(DeadBand::new(0.01))
        .modifier(History::new(100))
        .modifier(EventPrinter::with_prefix("| "))
        .build()
        .unwrap();

    println!("-- setpoint write (the ramp holds the store) --");
    pid.set_setpoint(3.0).unwrap();

    println!("-- three ticks; the ramp's internal writes print indented --");
    for _ in 0..3 {
        let u = pid.pid(0.0, Some(1.0)).unwrap();
        println!("   => u = {u}, setpoint = {}", pid.setpoint());
    }

    let history = pid.find_modifier::<History<f64>>().unwrap();
    println!("-- events seen by the history recorder --");
    for (name, count) in history.event_counts() {
        println!("   {name}: {count}");
    }
}
