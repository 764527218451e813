// Plant models and signal generators for simulation-backed tests and demos
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

use nalgebra as na;

pub enum WaveForm {
    Sine,
    Square,
}

pub struct SignalGenerator {
    fcn: fn(f64) -> f64,
    amplitude: f64,
    offset: f64,
}

impl SignalGenerator {
    pub fn new(waveform: WaveForm, amplitude: f64, offset: f64) -> Self {
        Self {
            fcn: match waveform {
                WaveForm::Sine => f64::sin,
                WaveForm::Square => |x| x.sin().signum(),
            },
            amplitude,
            offset,
        }
    }

    pub fn generate(&self, elapsed_secs: f64) -> f64 {
        self.amplitude * (self.fcn)(elapsed_secs) + self.offset
    }
}

/// A thrust device constrained to move straight up and down a pole:
///
/// ```text
///              |
///              |
///             [=]
///              ^
///              |
///              |
/// ```
///
/// where '^' is the fan and '[=]' is the slider mounted to the pole. The
/// control variable is the commanded thrust fraction in [0, 1]; friction is
/// zero and the fan responds instantly.
pub struct VerticalSlider {
    pub height: f64,     // m
    pub mass: f64,       // kg
    pub max_thrust: f64, // N at full command
}

impl VerticalSlider {
    pub const GRAVITY: f64 = 9.8; // m/s^2

    /// State-space dynamics with x = [position, velocity]:
    /// ┌    ┐   ┌      ┐   ┌                      ┐
    /// │ p' │ = │ v    │ + │ 0                    │
    /// │ v' │   │ 0    │   │ u·Smax/M − g         │
    /// └    ┘   └      ┘   └                      ┘
    pub fn f(&self, x: na::Vector2<f64>, u: f64) -> na::Vector2<f64> {
        let thrust = u.clamp(0.0, 1.0) * self.max_thrust;
        na::Vector2::new(x[1], thrust / self.mass - Self::GRAVITY)
    }

    /// Measurement: the slider's position on the pole.
    pub fn h(&self, x: na::Vector2<f64>) -> f64 {
        x[0]
    }

    /// Keeps the state on the pole: position clamped to [0, height] with
    /// velocity zeroed at either end stop.
    pub fn constrain(&self, x: na::Vector2<f64>) -> na::Vector2<f64> {
        if x[0] <= 0.0 {
            na::Vector2::new(0.0, x[1].max(0.0))
        } else if x[0] >= self.height {
            na::Vector2::new(self.height, x[1].min(0.0))
        } else {
            x
        }
    }
}

/// One forward-Euler step of `x' = f(x)`.
pub fn euler_step(
    f: impl Fn(na::Vector2<f64>) -> na::Vector2<f64>,
    x: na::Vector2<f64>,
    dt: f64,
) -> na::Vector2<f64> {
    x + f(x) * dt
}
