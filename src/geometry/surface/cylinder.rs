use crate::error::{GeometryError, Result};
use crate::math::{solve_quadratic, Point3, Vector3, TOLERANCE};

use super::Surface;

/// An infinite circular cylinder.
///
/// Defined by a point on the axis, the axis direction and a radius.
/// The negative half-space is the interior.
#[derive(Debug, Clone)]
pub struct Cylinder {
    center: Point3,
    axis: Vector3,
    radius: f64,
}

impl Cylinder {
    /// Creates a new cylinder.
    ///
    /// # Arguments
    ///
    /// * `center` - A point on the cylinder axis
    /// * `axis` - Axis direction (will be normalized)
    /// * `radius` - Radius (must be positive)
    ///
    /// # Errors
    ///
    /// Returns an error if the radius is non-positive or the axis is zero-length.
    pub fn new(center: Point3, axis: Vector3, radius: f64) -> Result<Self> {
        if radius < TOLERANCE {
            return Err(
                GeometryError::Degenerate("cylinder radius must be positive".into()).into(),
            );
        }
        let axis_len = axis.norm();
        if axis_len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        Ok(Self {
            center,
            axis: axis / axis_len,
            radius,
        })
    }

    /// Returns the point on the axis.
    #[must_use]
    pub fn center(&self) -> &Point3 {
        &self.center
    }

    /// Returns the axis direction (unit vector).
    #[must_use]
    pub fn axis(&self) -> &Vector3 {
        &self.axis
    }

    /// Returns the radius.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Component of `v` perpendicular to the axis.
    fn perp(&self, v: &Vector3) -> Vector3 {
        v - self.axis * v.dot(&self.axis)
    }

    /// Returns `Some(1)` if both cylinders describe the same surface.
    ///
    /// Axis orientation is irrelevant.
    #[must_use]
    pub fn equivalence(&self, other: &Cylinder, tol: f64) -> Option<i8> {
        if self.axis.dot(&other.axis).abs() < 1.0 - tol {
            return None;
        }
        if (self.radius - other.radius).abs() > tol {
            return None;
        }
        let offset = self.perp(&(other.center - self.center));
        (offset.norm() < tol).then_some(1)
    }
}

impl Surface for Cylinder {
    fn sense(&self, point: &Point3) -> f64 {
        self.perp(&(point - self.center)).norm() - self.radius
    }

    fn line_intersections(&self, origin: &Point3, dir: &Vector3) -> Vec<f64> {
        let d_perp = self.perp(dir);
        let oc_perp = self.perp(&(origin - self.center));
        let a = d_perp.dot(&d_perp);
        // Parallel to the axis: never crosses
        if a < TOLERANCE {
            return Vec::new();
        }
        let b = 2.0 * oc_perp.dot(&d_perp);
        let c = oc_perp.dot(&oc_perp) - self.radius * self.radius;
        solve_quadratic(a, b, c)
    }
}
