use crate::error::{GeometryError, Result};
use crate::math::{solve_quadratic, Point3, Vector3, TOLERANCE};

use super::Surface;

/// A sphere. The negative half-space is the interior.
#[derive(Debug, Clone)]
pub struct Sphere {
    center: Point3,
    radius: f64,
}

impl Sphere {
    /// Creates a new sphere.
    ///
    /// # Errors
    ///
    /// Returns an error if the radius is non-positive.
    pub fn new(center: Point3, radius: f64) -> Result<Self> {
        if radius < TOLERANCE {
            return Err(
                GeometryError::Degenerate("sphere radius must be positive".into()).into(),
            );
        }
        Ok(Self { center, radius })
    }

    /// Returns the center of the sphere.
    #[must_use]
    pub fn center(&self) -> &Point3 {
        &self.center
    }

    /// Returns the radius.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Returns `Some(1)` if both spheres describe the same surface.
    #[must_use]
    pub fn equivalence(&self, other: &Sphere, tol: f64) -> Option<i8> {
        ((self.center - other.center).norm() < tol && (self.radius - other.radius).abs() < tol)
            .then_some(1)
    }
}

impl Surface for Sphere {
    fn sense(&self, point: &Point3) -> f64 {
        (point - self.center).norm() - self.radius
    }

    fn line_intersections(&self, origin: &Point3, dir: &Vector3) -> Vec<f64> {
        let oc = origin - self.center;
        let a = dir.dot(dir);
        let b = 2.0 * oc.dot(dir);
        let c = oc.dot(&oc) - self.radius * self.radius;
        solve_quadratic(a, b, c)
    }
}
