#[cfg(feature = "bench")]
use criterion::{black_box, criterion_group, criterion_main, Criterion};

#[cfg(feature = "bench")]
use extensible_pid::modifiers::{DeadBand, History, SetpointRamp, Windup};
#[cfg(feature = "bench")]
use extensible_pid::pid::{Pid, PidPlus};

#[cfg(feature = "bench")]
fn bench_plain_pid(c: &mut Criterion) {
    let mut pid = Pid::new(1.0, 0.5, 0.1);
    pid.initial_conditions(Some(0.9), Some(1.0));

    let mut measurement = 0.9;
    let mut output: f64 = 0.0;

    c.bench_function("pid", |b| {
        b.iter(|| {
            output = pid.pid(black_box(measurement), Some(0.01)).unwrap();
            measurement += 0.0001; // prevent constant inputs
            black_box(output);
        });
    });
}

// Measures the fixed cost of the event pipeline itself: same calculation,
// three event dispatches per tick, nobody listening.
#[cfg(feature = "bench")]
fn bench_empty_chain(c: &mut Criterion) {
    let mut pid = PidPlus::new(1.0, 0.5, 0.1).unwrap();
    pid.initial_conditions(Some(0.9), Some(1.0)).unwrap();

    let mut measurement = 0.9;
    let mut output: f64 = 0.0;

    c.bench_function("pid_plus_empty", |b| {
        b.iter(|| {
            output = pid.pid(black_box(measurement), Some(0.01)).unwrap();
            measurement += 0.0001;
            black_box(output);
        });
    });
}

#[cfg(feature = "bench")]
fn bench_loaded_chain(c: &mut Criterion) {
    let mut pid = PidPlus::builder()
        .kp(1.0)
        .ki(0.5)
        .kd(0.1)
        .modifier(SetpointRamp::new(5.0).unwrap())
        .modifier(Windup::new(10.0))
        .modifier(DeadBand::new(0.001))
        .modifier(History::new(256))
        .build()
        .unwrap();
    pid.initial_conditions(Some(0.9), Some(1.0)).unwrap();

    let mut measurement = 0.9;
    let mut output: f64 = 0.0;

    c.bench_function("pid_plus_loaded", |b| {
        b.iter(|| {
            output = pid.pid(black_box(measurement), Some(0.01)).unwrap();
            measurement += 0.0001;
            black_box(output);
        });
    });
}

#[cfg(feature = "bench")]
criterion_group!(benches, bench_plain_pid, bench_empty_chain, bench_loaded_chain);
#[cfg(feature = "bench")]
criterion_main!(benches);

#[cfg(not(feature = "bench"))]
pub fn main() {
    eprintln!("This benchmark requires the 'bench' feature to be enabled.");
    eprintln!("Run with `cargo bench --features bench`.");
}
