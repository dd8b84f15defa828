//! PID hover from the viewport centre up to the target line, paced in real time
//! Run with: cargo run --example hover

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};

use flying_box::{ControllerMode, Frame, Renderer, SimBuilder, SleepPacer, TargetMarker};

const MAX_TICKS: u64 = 2000;

/// Prints a table row every 100 ticks and raises the stop flag once the box holds the target.
struct TableRenderer<'a> {
    stop: &'a AtomicBool,
    target: f64,
    previous_y: Option<f64>,
}

impl Renderer<f64> for TableRenderer<'_> {
    type Error = Infallible;

    fn draw_target(&mut self, marker: &TargetMarker<f64>) {
        self.target = marker.position.y;
        println!("Target line at y = {:.1}\n", marker.position.y);
        println!("Time(s) | y(px) | Thrust | Error(px)");
        println!("--------|-------|--------|----------");
    }

    fn draw_frame(&mut self, frame: &Frame<f64>) -> Result<(), Self::Error> {
        let [top_left, _, bottom_right, _] = frame.polygon.corners;
        let y = (top_left.y + bottom_right.y) / 2.0;
        let error = y - self.target;

        if frame.tick % 100 == 0 {
            println!(
                "{:7.1} | {:5.1} | {:6.2} | {:9.2}",
                frame.time, y, frame.thrust, error
            );
        }

        let still = self.previous_y.map_or(false, |prev| (y - prev).abs() < 1e-3);
        self.previous_y = Some(y);

        if frame.time > 20.0 && error.abs() < 0.5 && still {
            println!("\n✓ Holding target at {:.1}s", frame.time);
            self.stop.store(true, Ordering::Release);
        } else if frame.tick >= MAX_TICKS {
            println!("\n✗ Still moving after {} ticks", frame.tick);
            self.stop.store(true, Ordering::Release);
        }
        Ok(())
    }
}

fn main() {
    println!("=== Flying Box Hover ===\n");

    let mut sim = SimBuilder::new()
        .viewport(1280.0, 720.0)
        .mode(ControllerMode::ProportionalIntegralDerivative)
        .gains(30.0, 0.2, 200.0)
        .error_sum_limits(-50.0, 50.0)
        .thruster_max_accel(18.0)
        .target_height(200.0)
        .timestep(0.03)
        // Ten times faster than real time
        .frame_duration(0.003)
        .build()
        .expect("valid configuration");

    let stop = AtomicBool::new(false);
    let mut pacer = SleepPacer::from_config(sim.config());
    let mut renderer = TableRenderer {
        stop: &stop,
        target: 0.0,
        previous_y: None,
    };

    let ticks = match sim.run(&mut renderer, &mut pacer, &stop) {
        Ok(ticks) => ticks,
        Err(never) => match never {},
    };

    println!("Ran {} ticks ({:.1}s simulated)", ticks, sim.elapsed());
    println!("\n{}", sim.controller().diagnostics());
}
