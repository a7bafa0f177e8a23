use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::{LookupError, OperationError, Result};
use crate::math::Point3;
use crate::rule::{segment_crossings, HeadRule};
use crate::store::SurfaceStore;

/// Material id of an empty (void) cell.
pub const VOID: i32 = 0;

/// Segments shorter than this fraction of the traced line are skipped.
const MIN_STEP: f64 = 1e-9;

/// The atomic volume of a model: a region filled with one material.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Index unique within the model.
    pub index: i32,
    /// Material id; [`VOID`] for empty space.
    pub material: i32,
    /// Temperature, if not the solver default.
    pub temperature: Option<f64>,
    /// Bounding region. Owned by value; never shared with another cell.
    pub region: HeadRule,
}

impl Cell {
    /// Creates a cell at the default temperature.
    #[must_use]
    pub fn new(index: i32, material: i32, region: HeadRule) -> Self {
        Self {
            index,
            material,
            temperature: None,
            region,
        }
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Returns `true` if `point` lies strictly inside the cell.
    ///
    /// # Errors
    ///
    /// Returns a dangling-reference error if the region names a missing surface.
    pub fn is_valid(&self, store: &SurfaceStore, point: &Point3) -> Result<bool> {
        self.region.is_valid(store, point)
    }

    /// Cuts `rule` out of this cell.
    pub fn exclude(&mut self, rule: &HeadRule) {
        self.region.add_intersection(&rule.complement());
    }
}

/// All cells of a model, ordered by index.
#[derive(Debug, Clone, Default)]
pub struct CellMap {
    cells: BTreeMap<i32, Cell>,
}

impl CellMap {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if there are no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterates over cells in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    /// Returns `true` if a cell with `index` exists.
    #[must_use]
    pub fn contains(&self, index: i32) -> bool {
        self.cells.contains_key(&index)
    }

    /// Adds a cell.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is already in use.
    pub fn add_cell(&mut self, cell: Cell) -> Result<()> {
        if self.cells.contains_key(&cell.index) {
            return Err(OperationError::InvalidInput(format!(
                "cell {} already exists",
                cell.index
            ))
            .into());
        }
        self.cells.insert(cell.index, cell);
        Ok(())
    }

    /// Returns the cell with `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no such cell.
    pub fn get(&self, index: i32) -> std::result::Result<&Cell, LookupError> {
        self.cells
            .get(&index)
            .ok_or(LookupError::CellNotFound(index))
    }

    /// Returns the cell with `index` for modification.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no such cell.
    pub fn get_mut(&mut self, index: i32) -> std::result::Result<&mut Cell, LookupError> {
        self.cells
            .get_mut(&index)
            .ok_or(LookupError::CellNotFound(index))
    }

    /// Removes and returns a cell.
    pub fn remove(&mut self, index: i32) -> Option<Cell> {
        self.cells.remove(&index)
    }

    /// Smallest unused index not below `from`.
    #[must_use]
    pub fn next_free_index(&self, from: i32) -> i32 {
        let mut index = from.max(1);
        while self.cells.contains_key(&index) {
            index += 1;
        }
        index
    }

    /// First cell (by index) containing `point`.
    ///
    /// # Errors
    ///
    /// Returns a dangling-reference error from any region evaluated.
    pub fn find_cell(&self, store: &SurfaceStore, point: &Point3) -> Result<Option<i32>> {
        for cell in self.cells.values() {
            if cell.is_valid(store, point)? {
                return Ok(Some(cell.index));
            }
        }
        Ok(None)
    }

    /// Every cell containing `point`. More than one entry means the model
    /// overlaps at that point.
    ///
    /// # Errors
    ///
    /// Returns a dangling-reference error from any region evaluated.
    pub fn cells_containing(&self, store: &SurfaceStore, point: &Point3) -> Result<Vec<i32>> {
        let mut out = Vec::new();
        for cell in self.cells.values() {
            if cell.is_valid(store, point)? {
                out.push(cell.index);
            }
        }
        Ok(out)
    }

    /// Traces the segment `a -> b` through the model.
    ///
    /// The segment is split at every crossing with a surface of any
    /// candidate cell; the midpoint of each piece is classified. Returns
    /// the cells met, in order of first contact, without repeats. Cells in
    /// `skip` are ignored.
    ///
    /// # Errors
    ///
    /// Returns a dangling-reference error if a region names a missing surface.
    pub fn cells_on_line(
        &self,
        store: &SurfaceStore,
        a: &Point3,
        b: &Point3,
        skip: &BTreeSet<i32>,
    ) -> Result<Vec<i32>> {
        let candidates: Vec<&Cell> = self
            .cells
            .values()
            .filter(|c| !skip.contains(&c.index))
            .collect();
        let surfaces: BTreeSet<i32> = candidates
            .iter()
            .flat_map(|c| c.region.surfaces())
            .collect();

        let mut params = vec![0.0];
        params.extend(segment_crossings(store, surfaces, a, b)?);
        params.push(1.0);

        let mut found = Vec::new();
        let mut seen = BTreeSet::new();
        for pair in params.windows(2) {
            if pair[1] - pair[0] < MIN_STEP {
                continue;
            }
            let mid = a + (b - a) * (0.5 * (pair[0] + pair[1]));
            for cell in &candidates {
                if cell.is_valid(store, &mid)? && seen.insert(cell.index) {
                    found.push(cell.index);
                }
            }
        }
        Ok(found)
    }

    /// Replaces surface `old` by `new` in every cell region.
    pub fn renumber_surf(&mut self, old: i32, new: i32) {
        debug!(old, new, "renumbering surface in cells");
        for cell in self.cells.values_mut() {
            cell.region.substitute_surf(old, new);
        }
    }
}
