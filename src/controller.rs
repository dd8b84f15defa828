//! Height controller driving a single upward-firing thruster.
//!
//! All four control laws share one code path: the terms a mode does not use are zero, and the
//! summed command is saturated exactly once into `[0, thruster_max_accel]`. Clamping happens
//! after the terms are combined, so a negative derivative can still cancel a positive
//! proportional term before the actuator floor is applied.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use core::fmt;
use num_traits::Float;

use crate::config::{ConfigError, ControllerConfig, ControllerMode};
use crate::{lit, wide};

/// Actuator status reported with every command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum ThrusterStatus {
    /// Command inside the actuator range
    Normal,
    /// Command clamped to the rated output
    AtMaximum,
    /// Command was negative and the thruster is off
    CutOff,
    /// Error sum is pinned to one of its bounds
    IntegralClamped,
    /// More than one of the above
    MultipleFaults,
}

/// Detailed control output with diagnostics
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct ControlOutput<T: Float> {
    /// Saturated thruster command, in `[0, thruster_max_accel]`
    pub command: T,
    /// Sum of the terms before saturation
    pub unsaturated: T,
    /// Proportional term contribution
    pub p: T,
    /// Integral term contribution
    pub i: T,
    /// Derivative term contribution
    pub d: T,
    /// Height error in pixels (positive: body below the target)
    pub error: T,
    /// Error normalized by half the viewport height
    pub relative_error: T,
    /// Finite-difference derivative of the relative error, before the gain
    pub derivative: T,
    /// Error sum after this update
    pub error_sum: T,
    /// Actuator status
    pub status: ThrusterStatus,
}

/// Thrust controller with error history
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Controller<T: Float> {
    /// Configuration
    config: ControllerConfig<T>,

    // State variables
    /// Accumulated relative error, always within the configured bounds
    error_sum: T,
    /// Previous relative error; `None` until the first update
    previous_error: Option<T>,

    // Diagnostics
    /// Total number of updates
    update_count: u64,
    /// Number of updates whose command was clamped
    saturation_count: u64,
    /// Largest |relative error| observed
    max_error: T,
}

impl<T: Float> Controller<T> {
    /// Create a controller after validating `config`.
    pub fn new(config: ControllerConfig<T>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            error_sum: Self::resting_sum(&config),
            config,
            previous_error: None,
            update_count: 0,
            saturation_count: 0,
            max_error: T::zero(),
        })
    }

    /// Create a controller with the given law and gains and default limits.
    pub fn with_gains(mode: ControllerMode, kp: T, ki: T, kd: T) -> Result<Self, ConfigError> {
        Self::new(ControllerConfig {
            mode,
            kp,
            ki,
            kd,
            ..ControllerConfig::default()
        })
    }

    /// Error sum at rest: zero, pulled into the bounds if they exclude it.
    fn resting_sum(config: &ControllerConfig<T>) -> T {
        T::zero().max(config.error_sum_min).min(config.error_sum_max)
    }

    /// Compute the thruster command for one tick.
    ///
    /// `current_height` and `setpoint` are screen-space y coordinates, so a positive error
    /// means the body hangs below the target. When `dt` is not positive and finite the
    /// derivative term is skipped for this tick; the error history still advances.
    pub fn compute_thrust(&mut self, current_height: T, setpoint: T, dt: T) -> ControlOutput<T> {
        self.update_count += 1;

        let error = current_height - setpoint;
        let relative_error = error / self.config.error_scale();

        if relative_error.abs() > self.max_error {
            self.max_error = relative_error.abs();
        }

        // Seeding suppresses a derivative kick on the first tick
        let previous = *self.previous_error.get_or_insert(relative_error);

        let mode = self.config.mode;

        // Proportional term
        let p = relative_error * self.config.kp;

        // Integral term with anti-windup
        let i = if mode.uses_integral() {
            self.error_sum = self.clamp_sum(self.error_sum + relative_error);
            self.error_sum * self.config.ki
        } else {
            T::zero()
        };

        // Derivative term
        let derivative = if mode.uses_derivative() && dt.is_finite() && dt > T::zero() {
            (relative_error - previous) / dt
        } else {
            T::zero()
        };
        let d = derivative * self.config.kd;

        self.previous_error = Some(relative_error);

        let unsaturated = p + i + d;
        let command = self.saturate(unsaturated);
        let status = self.determine_status(unsaturated);

        ControlOutput {
            command,
            unsaturated,
            p,
            i,
            d,
            error,
            relative_error,
            derivative,
            error_sum: self.error_sum,
            status,
        }
    }

    /// Clamp a raw command into the actuator range `[0, thruster_max_accel]`.
    ///
    /// NaN input maps to zero thrust.
    fn saturate(&mut self, value: T) -> T {
        let max = self.config.thruster_max_accel;
        if value > max {
            self.saturation_count += 1;
            max
        } else if value < T::zero() {
            self.saturation_count += 1;
            T::zero()
        } else if value.is_nan() {
            T::zero()
        } else {
            value
        }
    }

    fn clamp_sum(&self, value: T) -> T {
        if value.is_nan() {
            return self.error_sum;
        }
        value
            .max(self.config.error_sum_min)
            .min(self.config.error_sum_max)
    }

    /// Determine actuator status for a raw command
    fn determine_status(&self, unsaturated: T) -> ThrusterStatus {
        let mut fault_count = 0;
        let mut status = ThrusterStatus::Normal;

        if unsaturated > self.config.thruster_max_accel {
            status = ThrusterStatus::AtMaximum;
            fault_count += 1;
        } else if unsaturated < T::zero() {
            status = ThrusterStatus::CutOff;
            fault_count += 1;
        }

        if self.config.mode.uses_integral()
            && (self.error_sum == self.config.error_sum_min
                || self.error_sum == self.config.error_sum_max)
        {
            status = ThrusterStatus::IntegralClamped;
            fault_count += 1;
        }

        if fault_count > 1 {
            ThrusterStatus::MultipleFaults
        } else {
            status
        }
    }

    /// Switch control law. Error history is cleared so the new law starts clean.
    pub fn set_mode(&mut self, mode: ControllerMode) {
        if mode != self.config.mode {
            log::debug!("controller mode {} -> {}", self.config.mode, mode);
        }
        self.config.mode = mode;
        self.reset();
    }

    pub fn mode(&self) -> ControllerMode {
        self.config.mode
    }

    /// Get current configuration
    pub fn config(&self) -> &ControllerConfig<T> {
        &self.config
    }

    /// Reset error history; the next update is treated as the first tick again
    pub fn reset(&mut self) {
        self.error_sum = Self::resting_sum(&self.config);
        self.previous_error = None;
    }

    /// Reset only the error sum
    pub fn reset_integral(&mut self) {
        self.error_sum = Self::resting_sum(&self.config);
    }

    /// Manual error-sum preload, clamped to the anti-windup bounds
    pub fn preload_integral(&mut self, value: T) {
        self.error_sum = self.clamp_sum(value);
    }

    pub fn error_sum(&self) -> T {
        self.error_sum
    }

    pub fn previous_error(&self) -> Option<T> {
        self.previous_error
    }

    /// Get diagnostic information
    pub fn diagnostics(&self) -> ControllerDiagnostics<T> {
        ControllerDiagnostics {
            mode: self.config.mode,
            update_count: self.update_count,
            saturation_count: self.saturation_count,
            saturation_ratio: if self.update_count > 0 {
                lit::<T>(self.saturation_count as f64) / lit(self.update_count as f64)
            } else {
                T::zero()
            },
            max_relative_error: self.max_error,
            current_error_sum: self.error_sum,
            previous_error: self.previous_error,
        }
    }
}

/// Diagnostic information about controller behaviour
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct ControllerDiagnostics<T: Float> {
    /// Active control law
    pub mode: ControllerMode,
    /// Total number of updates
    pub update_count: u64,
    /// Number of clamped commands
    pub saturation_count: u64,
    /// Ratio of clamped commands
    pub saturation_ratio: T,
    /// Largest |relative error| observed
    pub max_relative_error: T,
    /// Current error sum
    pub current_error_sum: T,
    /// Previous relative error, if any update has happened
    pub previous_error: Option<T>,
}

impl<T: Float> fmt::Display for ControllerDiagnostics<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Controller Diagnostics:\n\
             Updates: {}\n\
             Saturations: {} ({:.2}%)\n\
             Max Relative Error: {:.4}\n\
             Error Sum: {:.4}",
            self.mode,
            self.update_count,
            self.saturation_count,
            wide(self.saturation_ratio) * 100.0,
            wide(self.max_relative_error),
            wide(self.current_error_sum),
        )?;
        match self.previous_error {
            Some(prev) => write!(f, "\nPrevious Error: {:.4}", wide(prev)),
            None => write!(f, "\nPrevious Error: none"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
