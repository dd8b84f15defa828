//! # Flying Box
//!
//! A rigid box hanging under gravity, held at a target height by a single upward-firing
//! thruster. The thruster is driven by a selectable feedback law (P, PI, PD or PID) and the
//! resulting state is handed to a pluggable renderer once per tick.
//!
//! ## Key Features
//! - **Semi-implicit Euler integration** with an explicit, validated timestep
//! - **Four control laws** sharing one saturation path
//! - **Anti-windup clamping** of the accumulated error
//! - **Seeded derivative** so the first tick never produces a derivative kick
//! - **Unidirectional actuator**: the command always lies in `[0, thruster_max_accel]`
//! - **Cooperative shutdown** through a stop flag checked at every tick boundary
//! - **Diagnostics** for saturation and error history
//!
//! ## Coordinates
//!
//! Positions live in screen space (pixels, y grows downward). Velocities and accelerations
//! live in physics space (y grows upward). See [`Body`] for the exact update rules.
//!
//! ## Quick Start
//!
//! ```rust
//! use flying_box::prelude::*;
//!
//! let mut sim = SimBuilder::<f64>::new()
//!     .mode(ControllerMode::ProportionalIntegralDerivative)
//!     .gains(30.0, 0.2, 200.0)
//!     .target_height(200.0)
//!     .build()
//!     .unwrap();
//!
//! for _ in 0..100 {
//!     let outcome = sim.step();
//!     assert!(outcome.control.command >= 0.0);
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

pub mod body;
pub mod config;
pub mod controller;
pub mod simulation;

pub use body::{Body, BoundingPolygon, Point2};
pub use config::{ConfigError, ControllerConfig, ControllerMode, ParseModeError, SimBuilder, SimConfig};
pub use controller::{ControlOutput, Controller, ControllerDiagnostics, ThrusterStatus};
pub use simulation::{
    Frame, NoPacing, NullRenderer, Pacer, Renderer, Simulation, StepError, TargetMarker,
    TickOutcome,
};

#[cfg(feature = "std")]
pub use simulation::{FrameRecorder, SleepPacer};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::body::{Body, BoundingPolygon, Point2};
    pub use crate::config::{ConfigError, ControllerConfig, ControllerMode, SimBuilder, SimConfig};
    pub use crate::controller::{ControlOutput, Controller, ThrusterStatus};
    pub use crate::simulation::{
        Frame, NoPacing, NullRenderer, Pacer, Renderer, Simulation, StepError, TargetMarker,
        TickOutcome,
    };
    #[cfg(feature = "std")]
    pub use crate::simulation::{FrameRecorder, SleepPacer};
}

/// Converts an `f64` literal into the simulation's float type.
///
/// Every `Float` implementor can represent these constants, so the NaN fallback is only
/// reachable for exotic types.
pub(crate) fn lit<T: num_traits::Float>(value: f64) -> T {
    T::from(value).unwrap_or_else(T::nan)
}

/// Widens a simulation float for logging and error reporting.
pub(crate) fn wide<T: num_traits::Float>(value: T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}
