//! Closed-loop step response of the fan-on-a-pole plant under PID control,
//! with windup limiting and a setpoint ramp.
//! This example requires the `--features simulation` flag to be enabled.
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

#[cfg(feature = "simulation")]
pub fn main() {
    use extensible_pid::modifiers::{SetpointRamp, Windup};
    use extensible_pid::pid::PidPlus;
    use extensible_pid::sim::{self, SignalGenerator, VerticalSlider, WaveForm};

    use nalgebra as na;

    const FIXED_STEP_SIZE_S: f64 = 0.01;

    let plant = VerticalSlider {
        height: 1.0,
        mass: 1.0,
        max_thrust: 12.0,
    };

    // Hover thrust fraction is g*M/Smax; the integrator has to find it
    let mut pid = PidPlus::builder()
        .kp(2.0)
        .ki(1.5)
        .kd(1.0)
        .default_dt(FIXED_STEP_SIZE_S)
        .modifier(SetpointRamp::new(1.0).unwrap())
        .modifier(Windup::new((0.0, 1.0)))
        .build()
        .unwrap();

    // Command the slider between 0.3 and 0.7 up the pole; the ramp smooths
    // every flank of the square wave
    let square = SignalGenerator::new(WaveForm::Square, 0.2, 0.5);

    let mut state = na::Vector2::<f64>::zeros();
    let mut position = 0.0;
    let mut commanded = f64::NAN;

    println!("time_s,setpoint,position,thrust_command");
    for step in 0..2000usize {
        let time = step as f64 * FIXED_STEP_SIZE_S;

        let desired = square.generate(time);
        if desired != commanded {
            pid.set_setpoint(desired).unwrap();
            commanded = desired;
        }

        let command = pid.pid(position, None).unwrap().clamp(0.0, 1.0);

        state = sim::euler_step(|x| plant.f(x, command), state, FIXED_STEP_SIZE_S);
        state = plant.constrain(state);
        position = plant.h(state);

        if step % 10 == 0 {
            println!("{time:.2},{},{position:.4},{command:.4}", pid.setpoint());
        }
    }
}

#[cfg(not(feature = "simulation"))]
fn main() {
    eprintln!("This example requires `--features simulation` to run.");
}
