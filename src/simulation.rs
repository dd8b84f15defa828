//! Tick driver tying the body, the controller and the rendering collaborators together.
//!
//! One tick runs, in order:
//!
//! 1. integrate the body with the previous velocity and the stored gravity,
//! 2. compute the height error from the new position and the thruster command,
//! 3. add the command to the vertical velocity,
//! 4. (in [`Simulation::run`]) hand a [`Frame`] to the renderer and let the pacer wait.
//!
//! Simulated time advances by the configured fixed timestep regardless of how long rendering
//! or pacing takes. Callers that need irregular steps use [`Simulation::step_with`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use core::convert::Infallible;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use num_traits::Float;

use crate::body::{Body, BoundingPolygon, Point2};
use crate::config::{ConfigError, ControllerMode, SimConfig};
use crate::controller::{ControlOutput, Controller};
use crate::{lit, wide};

/// Error returned by a single tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepError {
    /// The timestep was zero, negative, NaN or infinite. State is unchanged.
    InvalidTimestep { dt: f64 },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::InvalidTimestep { dt } => {
                write!(f, "timestep must be positive and finite, got {}", dt)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for StepError {}

/// Fixed target marker, drawn once at start
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct TargetMarker<T> {
    /// Marker centre: horizontally centred in the viewport, at the target height
    pub position: Point2<T>,
    /// Viewport width, for drawing a full-width guide line
    pub viewport_width: T,
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Frame<T> {
    /// Number of ticks simulated so far
    pub tick: u64,
    /// Simulated time (seconds)
    pub time: T,
    /// Body outline, clockwise from top-left
    pub polygon: BoundingPolygon<T>,
    /// Thrust actually applied this tick
    pub thrust: T,
    /// `thrust / thruster_max_accel`, in `[0, 1]`
    pub intensity: T,
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct TickOutcome<T: Float> {
    /// Tick index, starting at 1
    pub tick: u64,
    /// Simulated time after this tick
    pub time: T,
    /// Controller output for this tick
    pub control: ControlOutput<T>,
    /// Thrust added to the velocity (zero while the thruster is disabled)
    pub applied_thrust: T,
    /// Gravity plus applied thrust, positive upward
    pub net_vertical_acceleration: T,
    /// Body state after the tick
    pub body: Body<T>,
}

/// Draws simulation state. Implemented by whatever owns the window.
pub trait Renderer<T> {
    type Error;

    /// Called once before the first frame.
    fn draw_target(&mut self, _marker: &TargetMarker<T>) {}

    fn draw_frame(&mut self, frame: &Frame<T>) -> Result<(), Self::Error>;
}

/// Renderer that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderer;

impl<T> Renderer<T> for NullRenderer {
    type Error = Infallible;

    fn draw_frame(&mut self, _frame: &Frame<T>) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Renderer that keeps every frame in memory.
///
/// Frames are never dropped, so use it with [`Simulation::run_for`] or another bounded run,
/// not with an open-ended [`Simulation::run`].
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct FrameRecorder<T> {
    pub target: Option<TargetMarker<T>>,
    pub frames: Vec<Frame<T>>,
}

#[cfg(feature = "std")]
impl<T> FrameRecorder<T> {
    pub fn new() -> Self {
        Self {
            target: None,
            frames: Vec::new(),
        }
    }
}

#[cfg(feature = "std")]
impl<T> Default for FrameRecorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl<T: Copy> Renderer<T> for FrameRecorder<T> {
    type Error = Infallible;

    fn draw_target(&mut self, marker: &TargetMarker<T>) {
        self.target = Some(*marker);
    }

    fn draw_frame(&mut self, frame: &Frame<T>) -> Result<(), Self::Error> {
        self.frames.push(*frame);
        Ok(())
    }
}

/// Waits between frames.
pub trait Pacer {
    fn pace(&mut self);
}

/// Pacer that never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

impl Pacer for NoPacing {
    fn pace(&mut self) {}
}

/// Sleeps so consecutive `pace` calls are at least one frame duration apart.
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct SleepPacer {
    frame: std::time::Duration,
    last: Option<std::time::Instant>,
}

#[cfg(feature = "std")]
impl SleepPacer {
    pub fn new(frame: std::time::Duration) -> Self {
        Self { frame, last: None }
    }

    /// Frame duration taken from `config.frame_duration_secs`.
    pub fn from_config<T: Float>(config: &SimConfig<T>) -> Self {
        let frame = std::time::Duration::try_from_secs_f64(wide(config.frame_duration_secs))
            .unwrap_or(std::time::Duration::ZERO);
        Self::new(frame)
    }

    pub fn frame_duration(&self) -> std::time::Duration {
        self.frame
    }
}

#[cfg(feature = "std")]
impl Pacer for SleepPacer {
    fn pace(&mut self) {
        let now = std::time::Instant::now();
        let spent = self
            .last
            .map(|last| now.duration_since(last))
            .unwrap_or_default();
        if let Some(remaining) = self.frame.checked_sub(spent) {
            std::thread::sleep(remaining);
        }
        self.last = Some(std::time::Instant::now());
    }
}

/// The flying box simulation: one body, one controller, one fixed target
#[derive(Debug, Clone)]
pub struct Simulation<T: Float> {
    config: SimConfig<T>,
    body: Body<T>,
    controller: Controller<T>,
    ticks: u64,
    elapsed: T,
    thruster_enabled: bool,
    last_thrust: T,
    at_maximum: bool,
}

impl<T: Float> Simulation<T> {
    /// Validate `config` and place the body at rest at the initial position.
    ///
    /// The controller always normalizes by the viewport height; any
    /// `controller.normalization_height` in `config` is replaced.
    pub fn new(mut config: SimConfig<T>) -> Result<Self, ConfigError> {
        config.controller.normalization_height = config.viewport_height;
        config.validate()?;
        let controller = Controller::new(config.controller)?;
        let (x, y) = config.initial_position;

        log::info!(
            "flying box: {} controller, target y={:.1}, start=({:.1}, {:.1}), dt={}",
            config.controller.mode,
            wide(config.target_height),
            wide(x),
            wide(y),
            wide(config.timestep),
        );

        Ok(Self {
            body: Body::at_rest(Point2::new(x, y), config.gravity),
            controller,
            config,
            ticks: 0,
            elapsed: T::zero(),
            thruster_enabled: true,
            last_thrust: T::zero(),
            at_maximum: false,
        })
    }

    /// Advance one tick with the configured timestep.
    pub fn step(&mut self) -> TickOutcome<T> {
        self.advance(self.config.timestep)
    }

    /// Advance one tick with an explicit timestep.
    pub fn step_with(&mut self, dt: T) -> Result<TickOutcome<T>, StepError> {
        if !(dt.is_finite() && dt > T::zero()) {
            log::warn!("rejected timestep {} at tick {}", wide(dt), self.ticks);
            return Err(StepError::InvalidTimestep { dt: wide(dt) });
        }
        Ok(self.advance(dt))
    }

    fn advance(&mut self, dt: T) -> TickOutcome<T> {
        self.body.integrate(dt);

        let target = self.config.target_height;
        let control = self.controller.compute_thrust(self.body.height(), target, dt);

        let applied_thrust = if self.thruster_enabled {
            control.command
        } else {
            T::zero()
        };
        self.body.apply_thrust(applied_thrust, dt);

        self.ticks += 1;
        self.elapsed = self.elapsed + dt;
        self.last_thrust = applied_thrust;
        self.track_saturation(&control);

        log::trace!(
            "tick {} t={:.3} y={:.2} vy={:.3} rel={:.4} thrust={:.3} {:?}",
            self.ticks,
            wide(self.elapsed),
            wide(self.body.position.y),
            wide(self.body.velocity.y),
            wide(control.relative_error),
            wide(applied_thrust),
            control.status,
        );

        TickOutcome {
            tick: self.ticks,
            time: self.elapsed,
            control,
            applied_thrust,
            net_vertical_acceleration: self.body.net_vertical_acceleration(applied_thrust),
            body: self.body,
        }
    }

    fn track_saturation(&mut self, control: &ControlOutput<T>) {
        let at_maximum = control.unsaturated > self.config.controller.thruster_max_accel;
        if at_maximum && !self.at_maximum {
            log::warn!("thruster saturated at tick {}", self.ticks);
        } else if !at_maximum && self.at_maximum {
            log::debug!("thruster back in range at tick {}", self.ticks);
        }
        self.at_maximum = at_maximum;
    }

    /// Current renderer payload.
    pub fn frame(&self) -> Frame<T> {
        let max = self.config.controller.thruster_max_accel;
        Frame {
            tick: self.ticks,
            time: self.elapsed,
            polygon: self.body.bounding_polygon(self.config.box_side_length),
            thrust: self.last_thrust,
            intensity: (self.last_thrust / max).max(T::zero()).min(T::one()),
        }
    }

    /// The fixed target marker.
    pub fn target_marker(&self) -> TargetMarker<T> {
        TargetMarker {
            position: Point2::new(
                self.config.viewport_width / lit(2.0),
                self.config.target_height,
            ),
            viewport_width: self.config.viewport_width,
        }
    }

    /// Run until `stop` is set, rendering and pacing every tick.
    ///
    /// `stop` is checked once per tick boundary. Returns the number of ticks run.
    pub fn run<R, P>(
        &mut self,
        renderer: &mut R,
        pacer: &mut P,
        stop: &AtomicBool,
    ) -> Result<u64, R::Error>
    where
        R: Renderer<T>,
        P: Pacer,
    {
        renderer.draw_target(&self.target_marker());
        let start = self.ticks;

        while !stop.load(Ordering::Acquire) {
            self.step();
            renderer.draw_frame(&self.frame())?;
            pacer.pace();
        }

        let ran = self.ticks - start;
        log::info!("stopped after {} ticks ({:.2}s simulated)", ran, wide(self.elapsed));
        Ok(ran)
    }

    /// Run exactly `ticks` ticks without pacing.
    pub fn run_for<R>(&mut self, ticks: u64, renderer: &mut R) -> Result<u64, R::Error>
    where
        R: Renderer<T>,
    {
        renderer.draw_target(&self.target_marker());
        for _ in 0..ticks {
            self.step();
            renderer.draw_frame(&self.frame())?;
        }
        Ok(ticks)
    }

    /// Enable or disable the thruster. While disabled the controller still runs but its
    /// command is not applied.
    pub fn set_thruster_enabled(&mut self, enabled: bool) {
        self.thruster_enabled = enabled;
    }

    pub fn thruster_enabled(&self) -> bool {
        self.thruster_enabled
    }

    /// Switch control law, clearing the controller's error history.
    pub fn set_mode(&mut self, mode: ControllerMode) {
        self.controller.set_mode(mode);
        self.config.controller.mode = mode;
    }

    /// Put the body back at rest at its initial position and clear all history.
    pub fn reset(&mut self) {
        let (x, y) = self.config.initial_position;
        self.body = Body::at_rest(Point2::new(x, y), self.config.gravity);
        self.controller.reset();
        self.ticks = 0;
        self.elapsed = T::zero();
        self.last_thrust = T::zero();
        self.at_maximum = false;
        log::debug!("simulation reset");
    }

    /// Replace the body state, e.g. to inject a disturbance.
    pub fn set_body(&mut self, body: Body<T>) {
        self.body = body;
    }

    pub fn body(&self) -> &Body<T> {
        &self.body
    }

    pub fn controller(&self) -> &Controller<T> {
        &self.controller
    }

    pub fn config(&self) -> &SimConfig<T> {
        &self.config
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulated time in seconds.
    pub fn elapsed(&self) -> T {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimBuilder;
    use approx::assert_relative_eq;

    struct FailingRenderer {
        budget: usize,
    }

    impl Renderer<f64> for FailingRenderer {
        type Error = &'static str;

        fn draw_frame(&mut self, _frame: &Frame<f64>) -> Result<(), Self::Error> {
            if self.budget == 0 {
                return Err("window closed");
            }
            self.budget -= 1;
            Ok(())
        }
    }

    struct StopAfter<'a> {
        stop: &'a AtomicBool,
        remaining: u32,
    }

    impl Pacer for StopAfter<'_> {
        fn pace(&mut self) {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.stop.store(true, Ordering::Release);
            }
        }
    }

    #[test]
    fn test_step_advances_time_and_ticks() {
        let mut sim = SimBuilder::<f64>::new().timestep(0.01).build().unwrap();
        let out = sim.step();
        assert_eq!(out.tick, 1);
        assert_relative_eq!(out.time, 0.01);
        assert_eq!(sim.ticks(), 1);
        assert_relative_eq!(sim.elapsed(), 0.01);
    }

    #[test]
    fn test_invalid_timestep_leaves_state_untouched() {
        let mut sim = SimBuilder::<f64>::new().build().unwrap();
        sim.step();
        let body = *sim.body();
        let error_sum = sim.controller().error_sum();

        for dt in [0.0, -0.03, f64::NAN] {
            let err = sim.step_with(dt).unwrap_err();
            assert!(matches!(err, StepError::InvalidTimestep { .. }));
        }
        assert_eq!(*sim.body(), body);
        assert_eq!(sim.controller().error_sum(), error_sum);
        assert_eq!(sim.ticks(), 1);
    }

    #[test]
    fn test_frame_intensity_is_normalized() {
        let mut sim = SimBuilder::<f64>::new()
            .mode(ControllerMode::Proportional)
            .gains(1000.0, 0.0, 0.0)
            .thruster_max_accel(18.0)
            .initial_position(640.0, 700.0)
            .target_height(100.0)
            .build()
            .unwrap();

        assert_eq!(sim.frame().intensity, 0.0);
        sim.step();
        let frame = sim.frame();
        assert_eq!(frame.thrust, 18.0);
        assert_eq!(frame.intensity, 1.0);
        assert_eq!(frame.polygon, sim.body().bounding_polygon(50.0));
    }

    #[test]
    fn test_target_marker() {
        let sim = SimBuilder::<f64>::new()
            .viewport(1000.0, 600.0)
            .target_height(150.0)
            .build()
            .unwrap();
        let marker = sim.target_marker();
        assert_eq!(marker.position, Point2::new(500.0, 150.0));
        assert_eq!(marker.viewport_width, 1000.0);
    }

    #[test]
    fn test_run_stops_on_flag() {
        let mut sim = SimBuilder::<f64>::new().build().unwrap();
        let stop = AtomicBool::new(false);
        let mut pacer = StopAfter {
            stop: &stop,
            remaining: 25,
        };

        let ran = sim.run(&mut NullRenderer, &mut pacer, &stop).unwrap();
        assert_eq!(ran, 25);
        assert_eq!(sim.ticks(), 25);
    }

    #[test]
    fn test_run_does_nothing_when_already_stopped() {
        let mut sim = SimBuilder::<f64>::new().build().unwrap();
        let stop = AtomicBool::new(true);
        let ran = sim.run(&mut NullRenderer, &mut NoPacing, &stop).unwrap();
        assert_eq!(ran, 0);
    }

    #[test]
    fn test_run_propagates_renderer_error() {
        let mut sim = SimBuilder::<f64>::new().build().unwrap();
        let stop = AtomicBool::new(false);
        let mut renderer = FailingRenderer { budget: 3 };

        let err = sim.run(&mut renderer, &mut NoPacing, &stop).unwrap_err();
        assert_eq!(err, "window closed");
        assert_eq!(sim.ticks(), 4);
    }

    #[test]
    fn test_disabled_thruster_applies_nothing() {
        let mut sim = SimBuilder::<f64>::new()
            .initial_position(640.0, 500.0)
            .target_height(100.0)
            .build()
            .unwrap();
        sim.set_thruster_enabled(false);

        let out = sim.step();
        assert!(out.control.command > 0.0);
        assert_eq!(out.applied_thrust, 0.0);
        assert_relative_eq!(out.net_vertical_acceleration, -9.81);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut sim = SimBuilder::<f64>::new().build().unwrap();
        for _ in 0..50 {
            sim.step();
        }
        sim.reset();

        assert_eq!(sim.ticks(), 0);
        assert_eq!(sim.elapsed(), 0.0);
        assert_eq!(sim.body().position, Point2::new(640.0, 360.0));
        assert_eq!(sim.body().velocity, Point2::zero());
        assert_eq!(sim.controller().previous_error(), None);
    }

    #[test]
    fn test_set_mode_updates_config() {
        let mut sim = SimBuilder::<f64>::new().build().unwrap();
        sim.set_mode(ControllerMode::ProportionalDerivative);
        assert_eq!(sim.controller().mode(), ControllerMode::ProportionalDerivative);
        assert_eq!(sim.config().controller.mode, ControllerMode::ProportionalDerivative);
    }

    #[test]
    fn test_error_normalized_by_viewport_height() {
        let config = SimConfig {
            viewport_height: 600.0,
            initial_position: (400.0, 400.0),
            target_height: 100.0,
            ..SimConfig::default()
        };
        let mut sim = Simulation::new(config).unwrap();
        assert_eq!(sim.config().controller.normalization_height, 600.0);

        let out = sim.step();
        assert_eq!(out.control.error, 300.0);
        assert_eq!(out.control.relative_error, 1.0);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_sleep_pacer_waits_out_the_frame() {
        let frame = std::time::Duration::from_millis(5);
        let mut pacer = SleepPacer::new(frame);

        let start = std::time::Instant::now();
        pacer.pace();
        pacer.pace();
        assert!(start.elapsed() >= frame * 2);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_sleep_pacer_from_config() {
        let config = SimConfig::<f64> {
            frame_duration_secs: 0.25,
            ..SimConfig::default()
        };
        let pacer = SleepPacer::from_config(&config);
        assert_eq!(pacer.frame_duration(), std::time::Duration::from_millis(250));

        let unpaced = SimConfig::<f64> {
            frame_duration_secs: 0.0,
            ..SimConfig::default()
        };
        assert_eq!(
            SleepPacer::from_config(&unpaced).frame_duration(),
            std::time::Duration::ZERO
        );
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_run_paced_until_renderer_raises_stop() {
        struct StopAtTick<'a> {
            stop: &'a AtomicBool,
            last_tick: u64,
        }

        impl Renderer<f64> for StopAtTick<'_> {
            type Error = Infallible;

            fn draw_frame(&mut self, frame: &Frame<f64>) -> Result<(), Self::Error> {
                if frame.tick >= self.last_tick {
                    self.stop.store(true, Ordering::Release);
                }
                Ok(())
            }
        }

        let mut sim = SimBuilder::<f64>::new().frame_duration(0.002).build().unwrap();
        let mut pacer = SleepPacer::from_config(sim.config());
        let stop = AtomicBool::new(false);
        let mut renderer = StopAtTick {
            stop: &stop,
            last_tick: 3,
        };

        let start = std::time::Instant::now();
        let ran = sim.run(&mut renderer, &mut pacer, &stop).unwrap();
        assert_eq!(ran, 3);
        assert!(start.elapsed() >= std::time::Duration::from_millis(5));
    }

    #[test]
    fn test_step_error_display() {
        let err = StepError::InvalidTimestep { dt: -1.0 };
        assert_eq!(err.to_string(), "timestep must be positive and finite, got -1");
    }
}
