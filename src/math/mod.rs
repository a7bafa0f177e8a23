/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Returns a unit vector perpendicular to `axis`.
///
/// `axis` is expected to be normalized.
#[must_use]
pub fn perpendicular_dir(axis: &Vector3) -> Vector3 {
    // Choose a reference vector not parallel to the axis
    let reference = if axis.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    axis.cross(&reference).normalize()
}

/// Solves `a t^2 + b t + c = 0`, returning the real roots in ascending order.
///
/// Degenerates to the linear solution when `a` vanishes.
#[must_use]
pub fn solve_quadratic(a: f64, b: f64, c: f64) -> Vec<f64> {
    if a.abs() < TOLERANCE {
        if b.abs() < TOLERANCE {
            return Vec::new();
        }
        return vec![-c / b];
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return Vec::new();
    }
    let sqrt_disc = disc.sqrt();
    let t1 = (-b - sqrt_disc) / (2.0 * a);
    let t2 = (-b + sqrt_disc) / (2.0 * a);
    if t1 <= t2 {
        vec![t1, t2]
    } else {
        vec![t2, t1]
    }
}
