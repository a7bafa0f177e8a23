mod cone;
mod cylinder;
mod plane;
mod sphere;

pub use cone::Cone;
pub use cylinder::Cylinder;
pub use plane::Plane;
pub use sphere::Sphere;

use crate::math::{Point3, Vector3};

/// Trait for surfaces that divide space into two half-spaces.
pub trait Surface {
    /// Signed, distance-like classification of `point`.
    ///
    /// Negative values lie in the negative half-space (inside / behind),
    /// positive values in the positive half-space.
    fn sense(&self, point: &Point3) -> f64;

    /// Returns the line parameters `t` at which `origin + t * dir` meets the
    /// surface, in ascending order. No restriction is placed on the sign of `t`.
    fn line_intersections(&self, origin: &Point3, dir: &Vector3) -> Vec<f64>;

    /// Classifies `point` as `-1`, `0` (within `tol` of the surface) or `1`.
    fn side(&self, point: &Point3, tol: f64) -> i8 {
        let s = self.sense(point);
        if s > tol {
            1
        } else if s < -tol {
            -1
        } else {
            0
        }
    }
}

/// A surface primitive held by the surface store.
#[derive(Debug, Clone)]
pub enum SurfaceKind {
    /// A plane.
    Plane(Plane),
    /// A cylinder.
    Cylinder(Cylinder),
    /// A sphere.
    Sphere(Sphere),
    /// A cone.
    Cone(Cone),
}

impl SurfaceKind {
    /// Compares two surfaces geometrically.
    ///
    /// Returns `Some(1)` if they coincide with the same sense, `Some(-1)` if
    /// they coincide with reversed sense, `None` otherwise.
    #[must_use]
    pub fn equivalence(&self, other: &SurfaceKind, tol: f64) -> Option<i8> {
        match (self, other) {
            (Self::Plane(a), Self::Plane(b)) => a.equivalence(b, tol),
            (Self::Cylinder(a), Self::Cylinder(b)) => a.equivalence(b, tol),
            (Self::Sphere(a), Self::Sphere(b)) => a.equivalence(b, tol),
            (Self::Cone(a), Self::Cone(b)) => a.equivalence(b, tol),
            _ => None,
        }
    }

    /// Short type tag, used in log output.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Plane(_) => "plane",
            Self::Cylinder(_) => "cylinder",
            Self::Sphere(_) => "sphere",
            Self::Cone(_) => "cone",
        }
    }
}

impl Surface for SurfaceKind {
    fn sense(&self, point: &Point3) -> f64 {
        match self {
            Self::Plane(s) => s.sense(point),
            Self::Cylinder(s) => s.sense(point),
            Self::Sphere(s) => s.sense(point),
            Self::Cone(s) => s.sense(point),
        }
    }

    fn line_intersections(&self, origin: &Point3, dir: &Vector3) -> Vec<f64> {
        match self {
            Self::Plane(s) => s.line_intersections(origin, dir),
            Self::Cylinder(s) => s.line_intersections(origin, dir),
            Self::Sphere(s) => s.line_intersections(origin, dir),
            Self::Cone(s) => s.line_intersections(origin, dir),
        }
    }
}

impl From<Plane> for SurfaceKind {
    fn from(s: Plane) -> Self {
        Self::Plane(s)
    }
}

impl From<Cylinder> for SurfaceKind {
    fn from(s: Cylinder) -> Self {
        Self::Cylinder(s)
    }
}

impl From<Sphere> for SurfaceKind {
    fn from(s: Sphere) -> Self {
        Self::Sphere(s)
    }
}

impl From<Cone> for SurfaceKind {
    fn from(s: Cone) -> Self {
        Self::Cone(s)
    }
}
