pub mod surface;

pub use surface::{Cone, Cylinder, Plane, Sphere, Surface, SurfaceKind};
