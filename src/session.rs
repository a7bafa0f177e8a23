use tracing::info;

use crate::cell::{Cell, CellMap};
use crate::error::Result;
use crate::math::Point3;
use crate::store::{StoreParams, SurfaceStore};

/// State of one model build: the surfaces and the cells made from them.
///
/// Created at the start of a build and passed explicitly to every
/// generator. Generators run one after another; each mutation of the cell
/// collection completes before the next generator starts.
#[derive(Debug, Default)]
pub struct ModelSession {
    /// All surfaces of the model.
    pub store: SurfaceStore,
    /// All cells of the model.
    pub cells: CellMap,
}

impl ModelSession {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty session with explicit surface matching parameters.
    #[must_use]
    pub fn with_params(params: StoreParams) -> Self {
        Self {
            store: SurfaceStore::with_params(params),
            cells: CellMap::new(),
        }
    }

    /// Adds a cell after checking that its region names only existing surfaces.
    ///
    /// # Errors
    ///
    /// Returns a dangling-reference error for an unknown surface, or an
    /// operation error if the index is taken.
    pub fn add_cell(&mut self, cell: Cell) -> Result<()> {
        cell.region.check_surfaces(&self.store)?;
        self.cells.add_cell(cell)
    }

    /// Moves surface `old` to `new` in the store and in every cell.
    ///
    /// Generator registries must be updated separately with
    /// [`SurfaceRegistry::renumber`](crate::registry::SurfaceRegistry::renumber).
    ///
    /// # Errors
    ///
    /// Returns an error if `old` is missing or `new` is taken.
    pub fn renumber_surface(&mut self, old: i32, new: i32) -> Result<()> {
        self.store.renumber(old, new)?;
        self.cells.renumber_surf(old, new);
        info!(old, new, "surface renumbered");
        Ok(())
    }

    /// Cells containing `point`; more than one means overlapping geometry.
    ///
    /// # Errors
    ///
    /// Returns a dangling-reference error from any region evaluated.
    pub fn overlaps_at(&self, point: &Point3) -> Result<Vec<i32>> {
        let found = self.cells.cells_containing(&self.store, point)?;
        Ok(if found.len() > 1 { found } else { Vec::new() })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::CsgError;
    use crate::geometry::Sphere;
    use crate::registry::SurfaceRegistry;
    use crate::rule::HeadRule;

    #[test]
    fn add_cell_checks_surfaces() {
        let mut session = ModelSession::new();
        let mut reg = SurfaceRegistry::new();
        let s = reg
            .register_surf(&mut session.store, 1, Sphere::new(Point3::origin(), 1.0).unwrap())
            .unwrap();
        session
            .add_cell(Cell::new(1, 3, HeadRule::literal(-s)))
            .unwrap();
        let err = session
            .add_cell(Cell::new(2, 0, HeadRule::parse("1 -9").unwrap()))
            .unwrap_err();
        assert!(matches!(err, CsgError::DanglingReference(9)));
    }

    #[test]
    fn overlap_detection() {
        let mut session = ModelSession::new();
        let mut reg = SurfaceRegistry::new();
        let small = reg
            .register_surf(&mut session.store, 1, Sphere::new(Point3::origin(), 1.0).unwrap())
            .unwrap();
        let big = reg
            .register_surf(&mut session.store, 2, Sphere::new(Point3::origin(), 2.0).unwrap())
            .unwrap();
        session
            .add_cell(Cell::new(1, 1, HeadRule::literal(-small)))
            .unwrap();
        session
            .add_cell(Cell::new(2, 1, HeadRule::literal(-big)))
            .unwrap();
        assert_eq!(session.overlaps_at(&Point3::origin()).unwrap(), vec![1, 2]);
        assert!(session
            .overlaps_at(&Point3::new(1.5, 0.0, 0.0))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn renumber_updates_cells() {
        let mut session = ModelSession::new();
        let mut reg = SurfaceRegistry::new();
        let s = reg
            .register_surf(&mut session.store, 4, Sphere::new(Point3::origin(), 1.0).unwrap())
            .unwrap();
        session
            .add_cell(Cell::new(1, 1, HeadRule::literal(-s)))
            .unwrap();
        session.renumber_surface(4, 40).unwrap();
        assert_eq!(session.cells.get(1).unwrap().region.display(), "-40");
        assert!(session.cells.get(1).unwrap().is_valid(&session.store, &Point3::origin()).unwrap());
    }
}
