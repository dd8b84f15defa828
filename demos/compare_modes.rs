//! Runs the same climb with each control law and summarizes how it behaves
//! Run with: cargo run --example compare_modes

use flying_box::{ControllerMode, SimBuilder};

const TARGET: f64 = 200.0;
const TICKS: usize = 3000;

struct Summary {
    mode: ControllerMode,
    final_y: f64,
    overshoot: f64,
    settle_time: Option<f64>,
    saturation_ratio: f64,
}

fn fly(mode: ControllerMode) -> Summary {
    let mut sim = SimBuilder::new()
        .mode(mode)
        .gains(30.0, 0.2, 200.0)
        .error_sum_limits(-50.0, 50.0)
        .target_height(TARGET)
        .build()
        .expect("valid configuration");

    let mut overshoot: f64 = 0.0;
    let mut settled_since = None;

    for _ in 0..TICKS {
        let out = sim.step();
        let y = out.body.position.y;

        // Above the target means smaller screen y
        overshoot = overshoot.max(TARGET - y);

        if (y - TARGET).abs() < 2.0 {
            settled_since.get_or_insert(out.time);
        } else {
            settled_since = None;
        }
    }

    Summary {
        mode,
        final_y: sim.body().position.y,
        overshoot,
        settle_time: settled_since,
        saturation_ratio: sim.controller().diagnostics().saturation_ratio,
    }
}

fn main() {
    println!("=== Control Law Comparison ===\n");
    println!("Mode | Final y | Overshoot(px) | Settled(s) | Saturated");
    println!("-----|---------|---------------|------------|----------");

    for mode in ControllerMode::ALL {
        let s = fly(mode);
        let settled = s
            .settle_time
            .map(|t| format!("{:10.1}", t))
            .unwrap_or_else(|| format!("{:>10}", "never"));
        println!(
            "{:4} | {:7.1} | {:13.1} | {} | {:8.1}%",
            s.mode.label(),
            s.final_y,
            s.overshoot,
            settled,
            s.saturation_ratio * 100.0
        );
    }

    println!("\nP and PD hang below the line where the proportional term balances gravity;");
    println!("the integral term is what closes that gap.");
}
