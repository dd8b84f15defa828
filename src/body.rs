//! The flying box itself: position, velocity, acceleration and the derived outline.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use core::ops::{Add, Mul, Sub};
use num_traits::Float;

use crate::lit;

/// A 2D point or vector
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Point2<T> {
    pub x: T,
    pub y: T,
}

impl<T: Float> Point2<T> {
    pub fn new(x: T, y: T) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self::new(T::zero(), T::zero())
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl<T: Float> Add for Point2<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl<T: Float> Sub for Point2<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl<T: Float> Mul<T> for Point2<T> {
    type Output = Self;

    fn mul(self, rhs: T) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Square outline of the body in screen coordinates.
///
/// Corners run clockwise on screen starting at the top-left:
/// top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct BoundingPolygon<T> {
    pub corners: [Point2<T>; 4],
}

impl<T: Float> BoundingPolygon<T> {
    /// Square of side `side` centred on `center`.
    pub fn square(center: Point2<T>, side: T) -> Self {
        let half = side / lit(2.0);
        Self {
            corners: [
                Point2::new(center.x - half, center.y - half),
                Point2::new(center.x + half, center.y - half),
                Point2::new(center.x + half, center.y + half),
                Point2::new(center.x - half, center.y + half),
            ],
        }
    }

    /// Polygon edges as `(from, to)` pairs, closing back to the first corner.
    pub fn edges(&self) -> impl Iterator<Item = (Point2<T>, Point2<T>)> + '_ {
        (0..self.corners.len()).map(move |i| {
            (self.corners[i], self.corners[(i + 1) % self.corners.len()])
        })
    }

    /// Midpoint of the bottom edge, where the thruster sits.
    pub fn bottom_center(&self) -> Point2<T> {
        let [_, _, bottom_right, bottom_left] = self.corners;
        (bottom_left + bottom_right) * lit(0.5)
    }
}

/// A point mass with a square outline.
///
/// # Sign convention
///
/// `position` is in **screen space**: pixels, with y growing *downward*.
/// `velocity` and `acceleration` are in **physics space**: y grows *upward*.
///
/// Every update that moves the body goes through [`Body::integrate`] or
/// [`Body::apply_thrust`], which are the only places the two conventions meet:
///
/// ```text
/// x  += vx * dt        y  -= vy * dt
/// vx += ax * dt        vy += ay * dt
/// ```
///
/// Gravity is stored as `ay = -g`. Thrust is added straight to `vy` and never written into
/// the stored acceleration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Body<T: Float> {
    /// Centre in screen coordinates
    pub position: Point2<T>,
    /// Velocity, y positive upward
    pub velocity: Point2<T>,
    /// Constant acceleration, y positive upward
    pub acceleration: Point2<T>,
}

impl<T: Float> Body<T> {
    /// A body at rest at `position` under gravity of magnitude `gravity`.
    pub fn at_rest(position: Point2<T>, gravity: T) -> Self {
        Self {
            position,
            velocity: Point2::zero(),
            acceleration: Point2::new(T::zero(), -gravity),
        }
    }

    pub fn with_velocity(mut self, velocity: Point2<T>) -> Self {
        self.velocity = velocity;
        self
    }

    /// One semi-implicit Euler step: position from the current velocity, then velocity from
    /// the stored acceleration.
    ///
    /// A `dt` that is not strictly positive and finite leaves the body untouched.
    pub fn integrate(&mut self, dt: T) {
        if !(dt.is_finite() && dt > T::zero()) {
            return;
        }

        self.position.x = self.position.x + self.velocity.x * dt;
        self.position.y = self.position.y - self.velocity.y * dt;

        self.velocity = self.velocity + self.acceleration * dt;
    }

    /// Adds an upward acceleration to the vertical velocity for one step.
    pub fn apply_thrust(&mut self, accel: T, dt: T) {
        if !(dt.is_finite() && dt > T::zero()) {
            return;
        }
        self.velocity.y = self.velocity.y + accel * dt;
    }

    /// Current screen-space height (the y coordinate of the centre).
    pub fn height(&self) -> T {
        self.position.y
    }

    /// Distance above a screen-space floor line, positive when the body is above it.
    pub fn height_above(&self, floor_y: T) -> T {
        floor_y - self.position.y
    }

    /// Net upward acceleration for a given thrust command.
    pub fn net_vertical_acceleration(&self, thrust: T) -> T {
        self.acceleration.y + thrust
    }

    /// Recomputes the outline from the current position.
    pub fn bounding_polygon(&self, side: T) -> BoundingPolygon<T> {
        BoundingPolygon::square(self.position, side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gravity_integration() {
        let mut body = Body::at_rest(Point2::new(640.0, 360.0), 9.81);
        let dt = 0.01;

        body.integrate(dt);
        // Velocity was zero, so position is unchanged on the first step
        assert_eq!(body.position, Point2::new(640.0, 360.0));
        assert_relative_eq!(body.velocity.y, -0.0981, epsilon = 1e-12);

        body.integrate(dt);
        // Falling: screen y grows
        assert!(body.position.y > 360.0);
        assert_relative_eq!(body.position.y, 360.0 + 0.0981 * dt, epsilon = 1e-12);
    }

    #[test]
    fn test_thrust_only_touches_velocity() {
        let mut body = Body::at_rest(Point2::new(0.0, 0.0), 9.81);
        body.apply_thrust(10.0, 0.5);

        assert_relative_eq!(body.velocity.y, 5.0);
        assert_eq!(body.acceleration, Point2::new(0.0, -9.81));
        assert_eq!(body.position, Point2::zero());
    }

    #[test]
    fn test_upward_velocity_moves_up_screen() {
        let mut body =
            Body::at_rest(Point2::new(0.0, 100.0), 0.0).with_velocity(Point2::new(2.0, 10.0));
        body.integrate(1.0);

        assert_relative_eq!(body.position.x, 2.0);
        assert_relative_eq!(body.position.y, 90.0);
    }

    #[test]
    fn test_invalid_timestep_is_noop() {
        let start =
            Body::at_rest(Point2::new(1.0, 2.0), 9.81).with_velocity(Point2::new(3.0, 4.0));
        for dt in [0.0, -0.01, f64::NAN, f64::INFINITY] {
            let mut body = start;
            body.integrate(dt);
            body.apply_thrust(5.0, dt);
            assert_eq!(body, start);
        }
    }

    #[test]
    fn test_polygon_corners_clockwise_from_top_left() {
        let body = Body::at_rest(Point2::new(100.0, 50.0), 9.81);
        let poly = body.bounding_polygon(20.0);

        assert_eq!(
            poly.corners,
            [
                Point2::new(90.0, 40.0),
                Point2::new(110.0, 40.0),
                Point2::new(110.0, 60.0),
                Point2::new(90.0, 60.0),
            ]
        );
        assert_eq!(poly.bottom_center(), Point2::new(100.0, 60.0));

        assert_eq!(poly.edges().count(), 4);
        assert_eq!(
            poly.edges().last(),
            Some((Point2::new(90.0, 60.0), Point2::new(90.0, 40.0)))
        );
    }

    #[test]
    fn test_height_helpers() {
        let body = Body::at_rest(Point2::new(0.0, 300.0), 9.81);
        assert_eq!(body.height(), 300.0);
        assert_eq!(body.height_above(720.0), 420.0);
        assert_relative_eq!(body.net_vertical_acceleration(12.0), 2.19, epsilon = 1e-12);
    }
}
