//! Configuration for the controller and the simulation, plus validation.
//!
//! Everything here is fixed before the loop starts. Invalid combinations are reported as a
//! [`ConfigError`] from [`SimConfig::validate`] / [`ControllerConfig::validate`] and never reach
//! the tick function.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use core::fmt;
use core::str::FromStr;
use num_traits::Float;

use crate::{lit, wide};

/// Feedback law used to drive the thruster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum ControllerMode {
    /// Proportional only
    Proportional,
    /// Proportional + clamped integral
    ProportionalIntegral,
    /// Proportional + finite-difference derivative
    ProportionalDerivative,
    /// All three terms
    ProportionalIntegralDerivative,
}

impl ControllerMode {
    /// Every mode, in increasing order of terms.
    pub const ALL: [ControllerMode; 4] = [
        ControllerMode::Proportional,
        ControllerMode::ProportionalIntegral,
        ControllerMode::ProportionalDerivative,
        ControllerMode::ProportionalIntegralDerivative,
    ];

    /// Whether this law accumulates the error sum.
    pub fn uses_integral(self) -> bool {
        matches!(
            self,
            ControllerMode::ProportionalIntegral | ControllerMode::ProportionalIntegralDerivative
        )
    }

    /// Whether this law differentiates the error.
    pub fn uses_derivative(self) -> bool {
        matches!(
            self,
            ControllerMode::ProportionalDerivative | ControllerMode::ProportionalIntegralDerivative
        )
    }

    /// Short label ("P", "PI", "PD", "PID").
    pub fn label(self) -> &'static str {
        match self {
            ControllerMode::Proportional => "P",
            ControllerMode::ProportionalIntegral => "PI",
            ControllerMode::ProportionalDerivative => "PD",
            ControllerMode::ProportionalIntegralDerivative => "PID",
        }
    }
}

impl Default for ControllerMode {
    fn default() -> Self {
        ControllerMode::ProportionalIntegralDerivative
    }
}

impl fmt::Display for ControllerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returned when a string does not name a controller mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseModeError;

impl fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected one of P, PI, PD, PID")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseModeError {}

impl FromStr for ControllerMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ControllerMode::ALL
            .iter()
            .copied()
            .find(|mode| mode.label().eq_ignore_ascii_case(s.trim()))
            .ok_or(ParseModeError)
    }
}

/// Configuration validation error.
///
/// Returned when configuration parameters are invalid or inconsistent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// A gain is below zero.
    NegativeGain { field: &'static str, value: f64 },
    /// A parameter is NaN or infinite (an unset gain reads as NaN).
    NonFinite { field: &'static str },
    /// A parameter that must be strictly positive is not.
    NonPositive { field: &'static str, value: f64 },
    /// A magnitude that may be zero is negative.
    Negative { field: &'static str, value: f64 },
    /// The error-sum clamp has `min > max`.
    InvertedBounds { min: f64, max: f64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NegativeGain { field, value } => {
                write!(f, "{} must be >= 0, got {}", field, value)
            }
            ConfigError::NonFinite { field } => write!(f, "{} must be finite", field),
            ConfigError::NonPositive { field, value } => {
                write!(f, "{} must be > 0, got {}", field, value)
            }
            ConfigError::Negative { field, value } => {
                write!(f, "{} must be >= 0, got {}", field, value)
            }
            ConfigError::InvertedBounds { min, max } => {
                write!(f, "error sum bounds inverted: min {} > max {}", min, max)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

fn finite<T: Float>(field: &'static str, value: T) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite { field })
    }
}

fn positive<T: Float>(field: &'static str, value: T) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value > T::zero() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive {
            field,
            value: wide(value),
        })
    }
}

fn non_negative<T: Float>(field: &'static str, value: T) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value < T::zero() {
        Err(ConfigError::Negative {
            field,
            value: wide(value),
        })
    } else {
        Ok(())
    }
}

fn gain<T: Float>(field: &'static str, value: T) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value < T::zero() {
        Err(ConfigError::NegativeGain {
            field,
            value: wide(value),
        })
    } else {
        Ok(())
    }
}

/// Configuration for the thrust controller
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct ControllerConfig<T: Float> {
    /// Control law
    pub mode: ControllerMode,
    /// Proportional gain
    pub kp: T,
    /// Integral gain
    pub ki: T,
    /// Derivative gain
    pub kd: T,

    /// Lower bound of the accumulated relative error (anti-windup)
    pub error_sum_min: T,
    /// Upper bound of the accumulated relative error (anti-windup)
    pub error_sum_max: T,

    /// Rated thruster output; the command never exceeds it
    pub thruster_max_accel: T,

    /// Viewport height used to normalize the error (divided by two)
    pub normalization_height: T,
}

impl<T: Float> Default for ControllerConfig<T> {
    fn default() -> Self {
        Self {
            mode: ControllerMode::default(),
            kp: lit(30.0),
            ki: lit(0.2),
            kd: lit(200.0),
            error_sum_min: lit(-50.0),
            error_sum_max: lit(50.0),
            thruster_max_accel: lit(18.0),
            normalization_height: lit(720.0),
        }
    }
}

impl<T: Float> ControllerConfig<T> {
    /// Checks gains, clamp bounds, actuator rating and normalization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        gain("kp", self.kp)?;
        gain("ki", self.ki)?;
        gain("kd", self.kd)?;

        finite("error_sum_min", self.error_sum_min)?;
        finite("error_sum_max", self.error_sum_max)?;
        if self.error_sum_min > self.error_sum_max {
            return Err(ConfigError::InvertedBounds {
                min: wide(self.error_sum_min),
                max: wide(self.error_sum_max),
            });
        }

        positive("thruster_max_accel", self.thruster_max_accel)?;
        positive("normalization_height", self.normalization_height)
    }

    /// Half the normalization height: one unit of relative error in pixels.
    pub fn error_scale(&self) -> T {
        self.normalization_height / lit(2.0)
    }
}

/// Configuration for the whole simulation
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct SimConfig<T: Float> {
    /// Gravity magnitude (pixels / s^2, pulls toward larger screen y)
    pub gravity: T,
    /// Fixed simulation timestep (seconds)
    pub timestep: T,
    /// Wall-clock time a pacer waits between frames (seconds)
    pub frame_duration_secs: T,

    /// Viewport width (pixels)
    pub viewport_width: T,
    /// Viewport height (pixels)
    pub viewport_height: T,

    /// Side of the square body (pixels)
    pub box_side_length: T,
    /// Starting centre of the body in screen coordinates
    pub initial_position: (T, T),
    /// Screen-y the controller holds the body at
    pub target_height: T,

    /// Controller settings. [`crate::Simulation::new`] overwrites `normalization_height`
    /// with `viewport_height`.
    pub controller: ControllerConfig<T>,
}

impl<T: Float> Default for SimConfig<T> {
    fn default() -> Self {
        let width = lit(1280.0);
        let height = lit(720.0);
        let two: T = lit(2.0);
        Self {
            gravity: lit(9.81),
            timestep: lit(0.03),
            frame_duration_secs: lit(0.03),
            viewport_width: width,
            viewport_height: height,
            box_side_length: lit(50.0),
            initial_position: (width / two, height / two),
            target_height: lit(200.0),
            controller: ControllerConfig {
                normalization_height: height,
                ..ControllerConfig::default()
            },
        }
    }
}

impl<T: Float> SimConfig<T> {
    /// Validates every field. Called once by [`crate::Simulation::new`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("gravity", self.gravity)?;
        positive("timestep", self.timestep)?;
        non_negative("frame_duration_secs", self.frame_duration_secs)?;
        positive("viewport_width", self.viewport_width)?;
        positive("viewport_height", self.viewport_height)?;
        positive("box_side_length", self.box_side_length)?;
        finite("initial_position.x", self.initial_position.0)?;
        finite("initial_position.y", self.initial_position.1)?;
        finite("target_height", self.target_height)?;
        self.controller.validate()
    }
}

// ============================================================================
// Builder Pattern for Easier Configuration
// ============================================================================

pub struct SimBuilder<T: Float> {
    config: SimConfig<T>,
    initial_position_set: bool,
}

impl<T: Float> SimBuilder<T> {
    pub fn new() -> Self {
        Self {
            config: SimConfig::default(),
            initial_position_set: false,
        }
    }

    pub fn gravity(mut self, gravity: T) -> Self {
        self.config.gravity = gravity;
        self
    }

    pub fn timestep(mut self, dt: T) -> Self {
        self.config.timestep = dt;
        self
    }

    pub fn frame_duration(mut self, secs: T) -> Self {
        self.config.frame_duration_secs = secs;
        self
    }

    /// Sets the viewport. The controller's normalization height follows the viewport height,
    /// and the body starts at the centre unless an initial position was given.
    pub fn viewport(mut self, width: T, height: T) -> Self {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self.config.controller.normalization_height = height;
        if !self.initial_position_set {
            let two: T = lit(2.0);
            self.config.initial_position = (width / two, height / two);
        }
        self
    }

    pub fn box_side_length(mut self, side: T) -> Self {
        self.config.box_side_length = side;
        self
    }

    pub fn initial_position(mut self, x: T, y: T) -> Self {
        self.config.initial_position = (x, y);
        self.initial_position_set = true;
        self
    }

    pub fn target_height(mut self, target: T) -> Self {
        self.config.target_height = target;
        self
    }

    pub fn mode(mut self, mode: ControllerMode) -> Self {
        self.config.controller.mode = mode;
        self
    }

    pub fn gains(mut self, kp: T, ki: T, kd: T) -> Self {
        self.config.controller.kp = kp;
        self.config.controller.ki = ki;
        self.config.controller.kd = kd;
        self
    }

    pub fn error_sum_limits(mut self, min: T, max: T) -> Self {
        self.config.controller.error_sum_min = min;
        self.config.controller.error_sum_max = max;
        self
    }

    pub fn thruster_max_accel(mut self, max: T) -> Self {
        self.config.controller.thruster_max_accel = max;
        self
    }

    /// Returns the validated configuration without building a simulation.
    pub fn build_config(self) -> Result<SimConfig<T>, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }

    pub fn build(self) -> Result<crate::Simulation<T>, ConfigError> {
        crate::Simulation::new(self.config)
    }
}

impl<T: Float> Default for SimBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(SimConfig::<f64>::default().validate(), Ok(()));
        assert_eq!(SimConfig::<f32>::default().validate(), Ok(()));
    }

    #[test]
    fn test_negative_gain_rejected() {
        let err = SimBuilder::<f64>::new()
            .gains(1.0, -0.1, 0.0)
            .build_config()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::NegativeGain {
                field: "ki",
                value: -0.1
            }
        );
    }

    #[test]
    fn test_unset_gain_rejected() {
        let err = SimBuilder::<f64>::new()
            .gains(f64::NAN, 0.0, 0.0)
            .build_config()
            .unwrap_err();
        assert_eq!(err, ConfigError::NonFinite { field: "kp" });
    }

    #[test]
    fn test_thruster_rating_must_be_positive() {
        let err = SimBuilder::<f64>::new()
            .thruster_max_accel(0.0)
            .build_config()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NonPositive {
                field: "thruster_max_accel",
                ..
            }
        ));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let err = SimBuilder::<f64>::new()
            .error_sum_limits(5.0, -5.0)
            .build_config()
            .unwrap_err();
        assert_eq!(err, ConfigError::InvertedBounds { min: 5.0, max: -5.0 });
    }

    #[test]
    fn test_zero_timestep_rejected() {
        let err = SimBuilder::<f64>::new().timestep(0.0).build_config().unwrap_err();
        assert!(matches!(err, ConfigError::NonPositive { field: "timestep", .. }));
    }

    #[test]
    fn test_negative_gravity_rejected() {
        let err = SimBuilder::<f64>::new().gravity(-9.81).build_config().unwrap_err();
        assert_eq!(
            err,
            ConfigError::Negative {
                field: "gravity",
                value: -9.81
            }
        );
        assert!(SimBuilder::<f64>::new().gravity(0.0).build_config().is_ok());
    }

    #[test]
    fn test_viewport_drives_normalization_and_start() {
        let config = SimBuilder::<f64>::new().viewport(800.0, 600.0).build_config().unwrap();
        assert_eq!(config.controller.normalization_height, 600.0);
        assert_eq!(config.initial_position, (400.0, 300.0));

        let config = SimBuilder::<f64>::new()
            .initial_position(10.0, 20.0)
            .viewport(800.0, 600.0)
            .build_config()
            .unwrap();
        assert_eq!(config.initial_position, (10.0, 20.0));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            "pid".parse::<ControllerMode>(),
            Ok(ControllerMode::ProportionalIntegralDerivative)
        );
        assert_eq!(
            " PI ".parse::<ControllerMode>(),
            Ok(ControllerMode::ProportionalIntegral)
        );
        assert_eq!("x".parse::<ControllerMode>(), Err(ParseModeError));
        for mode in ControllerMode::ALL {
            assert_eq!(mode.label().parse::<ControllerMode>(), Ok(mode));
        }
    }

    #[test]
    fn test_mode_terms() {
        assert!(!ControllerMode::Proportional.uses_integral());
        assert!(!ControllerMode::Proportional.uses_derivative());
        assert!(ControllerMode::ProportionalIntegral.uses_integral());
        assert!(ControllerMode::ProportionalDerivative.uses_derivative());
        assert!(ControllerMode::ProportionalIntegralDerivative.uses_integral());
        assert!(ControllerMode::ProportionalIntegralDerivative.uses_derivative());
    }
}
