//! Hover, then knock the box around and watch the controller recover
//! Run with: cargo run --example gust_recovery

use flying_box::{Body, ControllerMode, Point2, SimBuilder};

fn main() {
    println!("=== Gust Recovery ===\n");

    let mut sim = SimBuilder::new()
        .mode(ControllerMode::ProportionalIntegralDerivative)
        .gains(30.0, 0.2, 200.0)
        .error_sum_limits(-50.0, 50.0)
        .initial_position(640.0, 200.0)
        .target_height(200.0)
        .build()
        .expect("valid configuration");

    println!("Time(s) | y(px) | vy(px/s) | Thrust | Sum");
    println!("--------|-------|----------|--------|------");

    for i in 0..3000 {
        // Gusts every 20 seconds
        if i % 667 == 0 && i > 0 {
            let body = *sim.body();
            let kick = if (i / 667) % 2 == 0 { 40.0 } else { -40.0 };
            sim.set_body(Body {
                velocity: Point2::new(body.velocity.x, body.velocity.y + kick),
                ..body
            });
            println!(">> Gust: {:+.0} px/s", kick);
        }

        // Thruster flameout between 45s and 48s
        if i == 1500 {
            sim.set_thruster_enabled(false);
            println!(">> Thruster flameout");
        }
        if i == 1600 {
            sim.set_thruster_enabled(true);
            println!(">> Thruster relit");
        }

        let out = sim.step();

        if i % 50 == 0 {
            println!(
                "{:7.1} | {:5.1} | {:8.2} | {:6.2} | {:5.2}",
                out.time,
                out.body.position.y,
                out.body.velocity.y,
                out.applied_thrust,
                out.control.error_sum
            );
        }
    }

    println!("\n{}", sim.controller().diagnostics());
}
