//! Windowed flying box using macroquad
//!
//! Run with: cargo run --example flying_box --features render [-- path/to/flame.png]
//!
//! Keys: 1-4 pick P / PI / PD / PID, R resets, G kicks the box upward, Esc quits.

use std::convert::Infallible;

use flying_box::{ControllerMode, Frame, Renderer, SimBuilder, Simulation, TargetMarker};
use macroquad::prelude::*;

const WINDOW_WIDTH: f32 = 1280.0;
const WINDOW_HEIGHT: f32 = 720.0;

fn window_conf() -> Conf {
    Conf {
        window_title: "Flying Box".to_owned(),
        window_width: WINDOW_WIDTH as i32,
        window_height: WINDOW_HEIGHT as i32,
        ..Default::default()
    }
}

struct WindowRenderer {
    target: Option<TargetMarker<f32>>,
    flame: Option<Texture2D>,
    hud: String,
}

impl Renderer<f32> for WindowRenderer {
    type Error = Infallible;

    fn draw_target(&mut self, marker: &TargetMarker<f32>) {
        self.target = Some(*marker);
    }

    fn draw_frame(&mut self, frame: &Frame<f32>) -> Result<(), Self::Error> {
        clear_background(BLACK);

        if let Some(marker) = &self.target {
            draw_line(
                0.0,
                marker.position.y,
                marker.viewport_width,
                marker.position.y,
                1.0,
                DARKGREEN,
            );
            draw_circle(marker.position.x, marker.position.y, 4.0, GREEN);
        }

        // Flame under the box, scaled by thrust intensity
        if frame.intensity > 0.0 {
            let base = frame.polygon.bottom_center();
            let [_, _, br, bl] = frame.polygon.corners;
            let half_width = (br.x - bl.x) * 0.3;
            let length = 60.0 * frame.intensity;
            match &self.flame {
                Some(texture) => draw_texture_ex(
                    texture,
                    base.x - half_width,
                    base.y,
                    WHITE,
                    DrawTextureParams {
                        dest_size: Some(vec2(half_width * 2.0, length)),
                        ..Default::default()
                    },
                ),
                None => draw_triangle(
                    vec2(base.x - half_width, base.y),
                    vec2(base.x + half_width, base.y),
                    vec2(base.x, base.y + length),
                    ORANGE,
                ),
            }
        }

        for (from, to) in frame.polygon.edges() {
            draw_line(from.x, from.y, to.x, to.y, 2.0, RED);
        }

        draw_text(&self.hud, 16.0, 28.0, 24.0, LIGHTGRAY);
        Ok(())
    }
}

fn hud(sim: &Simulation<f32>) -> String {
    let body = sim.body();
    format!(
        "{}  t={:.1}s  y={:.1}  vy={:.1}  sum={:.2}",
        sim.controller().mode(),
        sim.elapsed(),
        body.position.y,
        body.velocity.y,
        sim.controller().error_sum()
    )
}

#[macroquad::main(window_conf)]
async fn main() {
    let flame = match std::env::args().nth(1) {
        Some(path) => match load_texture(&path).await {
            Ok(texture) => Some(texture),
            Err(err) => {
                eprintln!("failed to load flame texture {}: {:?}", path, err);
                std::process::exit(1);
            }
        },
        None => None,
    };

    let mut sim = match SimBuilder::<f32>::new()
        .viewport(WINDOW_WIDTH, WINDOW_HEIGHT)
        .mode(ControllerMode::ProportionalIntegralDerivative)
        .gains(30.0, 0.2, 200.0)
        .error_sum_limits(-50.0, 50.0)
        .target_height(200.0)
        .build()
    {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    let mut renderer = WindowRenderer {
        target: None,
        flame,
        hud: String::new(),
    };
    renderer.draw_target(&sim.target_marker());

    let dt = sim.config().timestep;
    let mut accumulator = 0.0;

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }
        let picks = [KeyCode::Key1, KeyCode::Key2, KeyCode::Key3, KeyCode::Key4];
        for (key, mode) in picks.into_iter().zip(ControllerMode::ALL) {
            if is_key_pressed(key) {
                sim.set_mode(mode);
            }
        }
        if is_key_pressed(KeyCode::R) {
            sim.reset();
        }
        if is_key_pressed(KeyCode::G) {
            let mut body = *sim.body();
            body.velocity.y += 60.0;
            sim.set_body(body);
        }

        // Fixed simulation step, decoupled from the display rate
        accumulator += get_frame_time().min(0.25);
        while accumulator >= dt {
            sim.step();
            accumulator -= dt;
        }

        renderer.hud = hud(&sim);
        renderer
            .draw_frame(&sim.frame())
            .unwrap_or_else(|never| match never {});
        next_frame().await;
    }
}
