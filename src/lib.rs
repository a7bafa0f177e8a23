pub mod cell;
pub mod composite;
pub mod error;
pub mod geometry;
pub mod math;
pub mod pipe;
pub mod registry;
pub mod rule;
pub mod session;
pub mod store;

pub use cell::{Cell, CellMap};
pub use composite::{Channel, CompositeBuilder, Offsets};
pub use error::{CsgError, Result};
pub use pipe::{PipeBuild, PipeLayer, PipeParams, PipeTube};
pub use registry::SurfaceRegistry;
pub use rule::HeadRule;
pub use session::ModelSession;
pub use store::{StoreParams, SurfaceStore};
