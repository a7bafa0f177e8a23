use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};

use super::Surface;

/// An infinite plane splitting space into two half-spaces.
///
/// Defined by a point on the plane and a unit normal. The positive
/// half-space is the side the normal points into.
///
/// Implicit form: `n . x - distance = 0`.
#[derive(Debug, Clone)]
pub struct Plane {
    origin: Point3,
    normal: Vector3,
    distance: f64,
}

impl Plane {
    /// Creates a plane from a point on it and a normal vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the normal vector is zero-length.
    pub fn new(origin: Point3, normal: Vector3) -> Result<Self> {
        let len = normal.norm();
        if len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        let normal = normal / len;
        let distance = normal.dot(&origin.coords);
        Ok(Self {
            origin,
            normal,
            distance,
        })
    }

    /// Returns the point the plane was built through.
    #[must_use]
    pub fn origin(&self) -> &Point3 {
        &self.origin
    }

    /// Returns the unit normal.
    #[must_use]
    pub fn normal(&self) -> &Vector3 {
        &self.normal
    }

    /// Returns the signed distance of the plane from the coordinate origin.
    #[must_use]
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Compares two planes.
    ///
    /// Returns `Some(1)` when they coincide with the same orientation,
    /// `Some(-1)` when they coincide with opposite normals.
    #[must_use]
    pub fn equivalence(&self, other: &Plane, tol: f64) -> Option<i8> {
        let dot = self.normal.dot(&other.normal);
        if dot > 1.0 - tol && (self.distance - other.distance).abs() < tol {
            Some(1)
        } else if dot < -1.0 + tol && (self.distance + other.distance).abs() < tol {
            Some(-1)
        } else {
            None
        }
    }
}

impl Surface for Plane {
    fn sense(&self, point: &Point3) -> f64 {
        self.normal.dot(&point.coords) - self.distance
    }

    fn line_intersections(&self, origin: &Point3, dir: &Vector3) -> Vec<f64> {
        let denom = self.normal.dot(dir);
        if denom.abs() < TOLERANCE {
            return Vec::new();
        }
        vec![-self.sense(origin) / denom]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sense_follows_normal() {
        let p = Plane::new(Point3::new(0.0, 0.0, 2.0), Vector3::z()).unwrap();
        assert!(p.sense(&Point3::new(0.0, 0.0, 3.0)) > 0.0);
        assert!(p.sense(&Point3::new(5.0, 5.0, 1.0)) < 0.0);
        assert_eq!(p.side(&Point3::new(1.0, 1.0, 2.0), 1e-9), 0);
    }

    #[test]
    fn normal_is_normalized() {
        let p = Plane::new(Point3::origin(), Vector3::new(0.0, 3.0, 0.0)).unwrap();
        assert_relative_eq!(p.normal().norm(), 1.0);
    }

    #[test]
    fn zero_normal_rejected() {
        assert!(Plane::new(Point3::origin(), Vector3::zeros()).is_err());
    }

    #[test]
    fn line_hits_plane() {
        let p = Plane::new(Point3::new(0.0, 0.0, 4.0), Vector3::z()).unwrap();
        let t = p.line_intersections(&Point3::origin(), &Vector3::new(0.0, 0.0, 2.0));
        assert_eq!(t.len(), 1);
        assert_relative_eq!(t[0], 2.0);
        assert!(p
            .line_intersections(&Point3::origin(), &Vector3::x())
            .is_empty());
    }

    #[test]
    fn reversed_plane_is_equivalent_with_flipped_sign() {
        let a = Plane::new(Point3::new(0.0, 0.0, 1.0), Vector3::z()).unwrap();
        let b = Plane::new(Point3::new(3.0, -2.0, 1.0), -Vector3::z()).unwrap();
        let c = Plane::new(Point3::new(0.0, 0.0, 1.5), Vector3::z()).unwrap();
        assert_eq!(a.equivalence(&a, 1e-6), Some(1));
        assert_eq!(a.equivalence(&b, 1e-6), Some(-1));
        assert_eq!(a.equivalence(&c, 1e-6), None);
    }
}
