use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{LookupError, OperationError, Result};
use crate::geometry::SurfaceKind;
use crate::store::SurfaceStore;

/// Maps one generator's local surface labels onto real surface ids.
///
/// Generators number their surfaces with small labels added to a build
/// offset; the registry resolves each label to a signed id in the
/// [`SurfaceStore`]. Two labels may resolve to the same real surface.
#[derive(Debug, Clone, Default)]
pub struct SurfaceRegistry {
    entries: BTreeMap<i32, i32>,
}

impl SurfaceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(label, signed real id)` pairs.
    pub fn labels(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.entries.iter().map(|(&l, &r)| (l, r))
    }

    /// Registers `surface` under `label`.
    ///
    /// If the store already holds an equal surface, the label is bound to it
    /// and `surface` is dropped. Otherwise the surface is stored, taking the
    /// label itself as id when free. Returns the signed real id.
    ///
    /// # Errors
    ///
    /// Returns an error if `label` is not positive.
    pub fn register_surf(
        &mut self,
        store: &mut SurfaceStore,
        label: i32,
        surface: impl Into<SurfaceKind>,
    ) -> Result<i32> {
        if label <= 0 {
            return Err(OperationError::InvalidInput(format!(
                "surface label must be positive, got {label}"
            ))
            .into());
        }
        let real = store.add_preferred(label, surface.into());
        self.entries.insert(label, real);
        Ok(real)
    }

    /// Binds `label` to an existing signed real id without geometric checks.
    pub fn add_match(&mut self, label: i32, real_id: i32) {
        debug!(label, real_id, "matched label");
        self.entries.insert(label.abs(), real_id * label.signum());
    }

    /// Resolves a signed label to its signed real id.
    ///
    /// # Errors
    ///
    /// Returns an error if the label was never registered.
    pub fn real_surf(&self, label: i32) -> std::result::Result<i32, LookupError> {
        let key = label.checked_abs().ok_or(LookupError::LabelNotFound(label))?;
        self.entries
            .get(&key)
            .map(|&real| real * label.signum())
            .ok_or(LookupError::LabelNotFound(key))
    }

    /// Returns `true` if `label` (sign ignored) is registered.
    #[must_use]
    pub fn has_surf(&self, label: i32) -> bool {
        label
            .checked_abs()
            .is_some_and(|key| self.entries.contains_key(&key))
    }

    /// Forgets a label. The real surface is unaffected.
    pub fn remove_label(&mut self, label: i32) -> Option<i32> {
        self.entries.remove(&label.abs())
    }

    /// Rewrites every entry whose real id appears in `map` (`old -> new`).
    ///
    /// Signs recorded on entries are kept.
    pub fn renumber(&mut self, map: &BTreeMap<i32, i32>) {
        for real in self.entries.values_mut() {
            if let Some(&new) = map.get(&real.abs()) {
                *real = new.abs() * real.signum();
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::CsgError;
    use crate::geometry::{Cylinder, Plane};
    use crate::math::{Point3, Vector3};

    fn plane_z(z: f64, n: Vector3) -> Plane {
        Plane::new(Point3::new(0.0, 0.0, z), n).unwrap()
    }

    #[test]
    fn register_and_resolve() {
        let mut store = SurfaceStore::new();
        let mut reg = SurfaceRegistry::new();
        let id = reg
            .register_surf(&mut store, 101, plane_z(0.0, Vector3::z()))
            .unwrap();
        assert_eq!(id, 101);
        assert_eq!(reg.real_surf(101).unwrap(), 101);
        assert_eq!(reg.real_surf(-101).unwrap(), -101);
        assert!(reg.has_surf(-101));
        assert!(!reg.has_surf(102));
        assert_eq!(reg.real_surf(102), Err(LookupError::LabelNotFound(102)));
        assert!(!reg.has_surf(i32::MIN));
        assert_eq!(
            reg.real_surf(i32::MIN),
            Err(LookupError::LabelNotFound(i32::MIN))
        );
    }

    #[test]
    fn equal_surface_in_other_registry_is_reused() {
        let mut store = SurfaceStore::new();
        let mut first = SurfaceRegistry::new();
        let mut second = SurfaceRegistry::new();
        first
            .register_surf(&mut store, 12, plane_z(5.0, Vector3::z()))
            .unwrap();
        let id = second
            .register_surf(&mut store, 202, plane_z(5.0, -Vector3::z()))
            .unwrap();
        assert_eq!(id, -12);
        assert_eq!(second.real_surf(-202).unwrap(), 12);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn match_aliases_label() {
        let mut store = SurfaceStore::new();
        let mut owner = SurfaceRegistry::new();
        let cyl = Cylinder::new(Point3::origin(), Vector3::z(), 3.0).unwrap();
        let real = owner.register_surf(&mut store, 7, cyl).unwrap();

        let mut reg = SurfaceRegistry::new();
        reg.add_match(1007, real);
        reg.add_match(1008, real);
        assert_eq!(reg.real_surf(1007).unwrap(), 7);
        assert_eq!(reg.real_surf(-1008).unwrap(), -7);
    }

    #[test]
    fn non_positive_label_rejected() {
        let mut store = SurfaceStore::new();
        let mut reg = SurfaceRegistry::new();
        let err = reg
            .register_surf(&mut store, 0, plane_z(0.0, Vector3::z()))
            .unwrap_err();
        assert!(matches!(err, CsgError::Operation(_)));
    }

    #[test]
    fn bulk_renumber_keeps_sign() {
        let mut store = SurfaceStore::new();
        let mut reg = SurfaceRegistry::new();
        reg.register_surf(&mut store, 3, plane_z(0.0, Vector3::z()))
            .unwrap();
        reg.add_match(4, -3);
        store.renumber(3, 40).unwrap();
        reg.renumber(&BTreeMap::from([(3, 40)]));
        assert_eq!(reg.real_surf(3).unwrap(), 40);
        assert_eq!(reg.real_surf(4).unwrap(), -40);
    }
}
