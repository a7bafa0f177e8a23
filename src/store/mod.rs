use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{LookupError, OperationError, Result};
use crate::geometry::SurfaceKind;

/// Parameters controlling surface matching.
#[derive(Debug, Clone, Copy)]
pub struct StoreParams {
    /// Tolerance used when deciding whether two surfaces coincide.
    pub tolerance: f64,
}

impl Default for StoreParams {
    fn default() -> Self {
        Self { tolerance: 1e-6 }
    }
}

/// Owns every surface of one model build, keyed by a unique positive id.
///
/// Surfaces are immutable once stored. Geometrically equal surfaces are
/// stored once; callers adding a duplicate receive the existing id, negated
/// when the duplicate has the opposite sense.
#[derive(Debug, Default)]
pub struct SurfaceStore {
    surfaces: BTreeMap<i32, SurfaceKind>,
    renumbered: BTreeMap<i32, i32>,
    params: StoreParams,
}

impl SurfaceStore {
    /// Creates a new, empty surface store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store with explicit matching parameters.
    #[must_use]
    pub fn with_params(params: StoreParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Returns the matching parameters.
    #[must_use]
    pub fn params(&self) -> &StoreParams {
        &self.params
    }

    /// Number of stored surfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Returns `true` if no surface is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Iterates over stored ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.surfaces.keys().copied()
    }

    /// Returns `true` if `id` (sign ignored) names a stored surface.
    #[must_use]
    pub fn contains(&self, id: i32) -> bool {
        self.surfaces.contains_key(&id.abs())
    }

    /// Returns the surface stored under `id` (sign ignored).
    ///
    /// # Errors
    ///
    /// Returns an error if no surface has that id.
    pub fn get(&self, id: i32) -> std::result::Result<&SurfaceKind, LookupError> {
        self.surfaces
            .get(&id.abs())
            .ok_or(LookupError::SurfaceNotFound(id.abs()))
    }

    /// Searches for a stored surface geometrically equal to `surface`.
    ///
    /// Returns the signed id: negative when the stored surface has the
    /// opposite sense.
    #[must_use]
    pub fn find_equal(&self, surface: &SurfaceKind) -> Option<i32> {
        let tol = self.params.tolerance;
        self.surfaces.iter().find_map(|(&id, stored)| {
            stored
                .equivalence(surface, tol)
                .map(|sign| id * i32::from(sign))
        })
    }

    /// Smallest unused id not below `from`.
    #[must_use]
    pub fn next_free(&self, from: i32) -> i32 {
        let mut id = from.max(1);
        while self.surfaces.contains_key(&id) {
            id += 1;
        }
        id
    }

    /// Adds `surface`, reusing an equal stored surface if one exists.
    ///
    /// Returns the signed id under which the surface is reachable.
    pub fn add(&mut self, surface: SurfaceKind) -> i32 {
        self.add_preferred(1, surface)
    }

    /// Like [`add`](Self::add), but a new surface takes `preferred` as its
    /// id when that id is free.
    pub fn add_preferred(&mut self, preferred: i32, surface: SurfaceKind) -> i32 {
        if let Some(existing) = self.find_equal(&surface) {
            debug!(id = existing, kind = surface.tag(), "reusing equal surface");
            return existing;
        }
        let id = self.next_free(preferred);
        debug!(id, kind = surface.tag(), "new surface");
        self.surfaces.insert(id, surface);
        id
    }

    /// Stores `surface` under exactly `id` without geometric matching.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not positive or already taken.
    pub fn insert_at(&mut self, id: i32, surface: SurfaceKind) -> Result<()> {
        if id <= 0 {
            return Err(OperationError::InvalidInput(format!(
                "surface id must be positive, got {id}"
            ))
            .into());
        }
        if self.surfaces.contains_key(&id) {
            return Err(OperationError::InvalidInput(format!("surface {id} already exists")).into());
        }
        self.surfaces.insert(id, surface);
        Ok(())
    }

    /// Removes a surface. Rules still naming it become dangling.
    pub fn remove(&mut self, id: i32) -> Option<SurfaceKind> {
        self.surfaces.remove(&id.abs())
    }

    /// Moves the surface `old` to the free id `new` and records the move.
    ///
    /// # Errors
    ///
    /// Returns an error if `old` does not exist or `new` is taken.
    pub fn renumber(&mut self, old: i32, new: i32) -> Result<()> {
        let (old, new) = (old.abs(), new.abs());
        if old == new {
            return Ok(());
        }
        if self.surfaces.contains_key(&new) {
            return Err(
                OperationError::InvalidInput(format!("surface {new} already exists")).into(),
            );
        }
        let surface = self
            .surfaces
            .remove(&old)
            .ok_or(LookupError::SurfaceNotFound(old))?;
        self.surfaces.insert(new, surface);
        self.renumbered.insert(old, new);
        debug!(old, new, "renumbered surface");
        Ok(())
    }

    /// Resolves a signed id to its current signed id, following renumbering.
    ///
    /// # Errors
    ///
    /// Returns an error if the resolved surface does not exist.
    pub fn resolve(&self, id: i32) -> std::result::Result<i32, LookupError> {
        let sign = id.signum();
        let mut current = id.abs();
        // Bounded walk: each record is used at most once
        for _ in 0..=self.renumbered.len() {
            if self.surfaces.contains_key(&current) {
                return Ok(sign * current);
            }
            match self.renumbered.get(&current) {
                Some(&next) => current = next,
                None => break,
            }
        }
        Err(LookupError::SurfaceNotFound(id.abs()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::{Cylinder, Plane};
    use crate::math::{Point3, Vector3};

    fn plane_z(z: f64, flip: bool) -> SurfaceKind {
        let n = if flip { -Vector3::z() } else { Vector3::z() };
        Plane::new(Point3::new(0.0, 0.0, z), n).unwrap().into()
    }

    #[test]
    fn duplicates_are_shared() {
        let mut store = SurfaceStore::new();
        let a = store.add_preferred(5, plane_z(1.0, false));
        let b = store.add_preferred(9, plane_z(1.0, false));
        let c = store.add_preferred(9, plane_z(1.0, true));
        assert_eq!(a, 5);
        assert_eq!(b, 5);
        assert_eq!(c, -5);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn preferred_id_taken_falls_forward() {
        let mut store = SurfaceStore::new();
        store.add_preferred(5, plane_z(1.0, false));
        let id = store.add_preferred(5, plane_z(2.0, false));
        assert_eq!(id, 6);
    }

    #[test]
    fn renumber_then_resolve() {
        let mut store = SurfaceStore::new();
        store.add_preferred(3, plane_z(1.0, false));
        store.renumber(3, 30).unwrap();
        assert!(!store.contains(3));
        assert_eq!(store.resolve(-3).unwrap(), -30);
        assert_eq!(store.resolve(30).unwrap(), 30);
        assert_eq!(store.resolve(4), Err(LookupError::SurfaceNotFound(4)));
    }

    #[test]
    fn insert_at_rejects_collision() {
        let mut store = SurfaceStore::new();
        let cyl: SurfaceKind = Cylinder::new(Point3::origin(), Vector3::z(), 1.0)
            .unwrap()
            .into();
        store.insert_at(7, cyl.clone()).unwrap();
        assert!(store.insert_at(7, cyl.clone()).is_err());
        assert!(store.insert_at(0, cyl).is_err());
    }

    #[test]
    fn removed_surface_is_unresolvable() {
        let mut store = SurfaceStore::new();
        let id = store.add(plane_z(0.0, false));
        assert!(store.remove(id).is_some());
        assert!(store.get(id).is_err());
        assert!(store.resolve(id).is_err());
    }
}
