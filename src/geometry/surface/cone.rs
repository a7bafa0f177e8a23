use crate::error::{GeometryError, Result};
use crate::math::{solve_quadratic, Point3, Vector3, TOLERANCE};

use super::Surface;

/// A double-sheeted circular cone.
///
/// Defined by an apex point, an axis direction and a half-angle. Points
/// within the half-angle of the axis (on either sheet) lie in the
/// negative half-space.
#[derive(Debug, Clone)]
pub struct Cone {
    apex: Point3,
    axis: Vector3,
    half_angle: f64,
}

impl Cone {
    /// Creates a new cone.
    ///
    /// # Arguments
    ///
    /// * `apex` - The apex (tip) of the cone
    /// * `axis` - Axis direction (will be normalized)
    /// * `half_angle` - Half-angle in radians (must be in `(0, pi/2)`)
    ///
    /// # Errors
    ///
    /// Returns an error if the half-angle is out of range or the axis is
    /// zero-length.
    pub fn new(apex: Point3, axis: Vector3, half_angle: f64) -> Result<Self> {
        let max = std::f64::consts::FRAC_PI_2;
        if half_angle <= TOLERANCE || half_angle >= max - TOLERANCE {
            return Err(GeometryError::ParameterOutOfRange {
                parameter: "half_angle",
                value: half_angle,
                min: 0.0,
                max,
            }
            .into());
        }
        let axis_len = axis.norm();
        if axis_len < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        Ok(Self {
            apex,
            axis: axis / axis_len,
            half_angle,
        })
    }

    /// Returns the apex.
    #[must_use]
    pub fn apex(&self) -> &Point3 {
        &self.apex
    }

    /// Returns the axis direction (unit vector).
    #[must_use]
    pub fn axis(&self) -> &Vector3 {
        &self.axis
    }

    /// Returns the half-angle in radians.
    #[must_use]
    pub fn half_angle(&self) -> f64 {
        self.half_angle
    }

    /// Returns `Some(1)` if both cones describe the same surface.
    #[must_use]
    pub fn equivalence(&self, other: &Cone, tol: f64) -> Option<i8> {
        ((self.apex - other.apex).norm() < tol
            && self.axis.dot(&other.axis).abs() > 1.0 - tol
            && (self.half_angle - other.half_angle).abs() < tol)
            .then_some(1)
    }
}

impl Surface for Cone {
    fn sense(&self, point: &Point3) -> f64 {
        let d = point - self.apex;
        let axial = d.dot(&self.axis);
        let radial = (d - self.axis * axial).norm();
        radial * self.half_angle.cos() - axial.abs() * self.half_angle.sin()
    }

    fn line_intersections(&self, origin: &Point3, dir: &Vector3) -> Vec<f64> {
        // (d.a)^2 - cos^2(alpha) |d|^2 = 0 along d = oc + t dir
        let oc = origin - self.apex;
        let cos2 = self.half_angle.cos().powi(2);
        let da = dir.dot(&self.axis);
        let oa = oc.dot(&self.axis);
        let a = da * da - cos2 * dir.dot(dir);
        let b = 2.0 * (da * oa - cos2 * dir.dot(&oc));
        let c = oa * oa - cos2 * oc.dot(&oc);
        solve_quadratic(a, b, c)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_4;

    fn z_cone() -> Cone {
        Cone::new(Point3::origin(), Vector3::z(), FRAC_PI_4).unwrap()
    }

    #[test]
    fn both_sheets_are_inside() {
        let c = z_cone();
        assert!(c.sense(&Point3::new(0.5, 0.0, 2.0)) < 0.0);
        assert!(c.sense(&Point3::new(0.5, 0.0, -2.0)) < 0.0);
        assert!(c.sense(&Point3::new(3.0, 0.0, 1.0)) > 0.0);
    }

    #[test]
    fn horizontal_line_hits_sheet() {
        let c = z_cone();
        let t = c.line_intersections(&Point3::new(-5.0, 0.0, 2.0), &Vector3::x());
        assert_eq!(t.len(), 2);
        assert_relative_eq!(t[0], 3.0, epsilon = 1e-9);
        assert_relative_eq!(t[1], 7.0, epsilon = 1e-9);
    }

    #[test]
    fn half_angle_range() {
        assert!(Cone::new(Point3::origin(), Vector3::z(), 0.0).is_err());
        assert!(Cone::new(Point3::origin(), Vector3::z(), 2.0).is_err());
    }

    #[test]
    fn equivalence_ignores_axis_direction() {
        let a = z_cone();
        let b = Cone::new(Point3::origin(), -Vector3::z(), FRAC_PI_4).unwrap();
        assert_eq!(a.equivalence(&b, 1e-6), Some(1));
    }
}
