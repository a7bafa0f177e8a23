use std::f64::consts::TAU;

use slotmap::SlotMap;

use crate::error::{CsgError, GeometryError, OperationError, Result};
use crate::geometry::{Cylinder, Plane, Surface};
use crate::math::{perpendicular_dir, Point3, Vector3, TOLERANCE};
use crate::registry::SurfaceRegistry;
use crate::rule::HeadRule;
use crate::store::SurfaceStore;

use super::layer::PipeLayer;

slotmap::new_key_type! {
    /// Unique identifier for a segment of a pipe being built.
    pub struct UnitId;
}

/// Label of the start cap plane within a unit's block.
const START_CAP: i32 = 1;
/// Label of the end cap plane within a unit's block.
const END_CAP: i32 = 2;
/// Label of the innermost layer cylinder; outer layers follow.
const LAYER_BASE: i32 = 7;

/// One straight segment of a pipe.
///
/// Cap normals start out along the axis and are replaced by the bisector
/// of the two axes when the unit is linked to a neighbour, so that both
/// units share one joint plane.
#[derive(Debug, Clone)]
pub struct PipeUnit {
    start: Point3,
    end: Point3,
    axis: Vector3,
    length: f64,
    layers: Vec<PipeLayer>,
    prev: Option<UnitId>,
    next: Option<UnitId>,
    start_normal: Vector3,
    end_normal: Vector3,
    start_plane: Option<Plane>,
    end_plane: Option<Plane>,
    start_rule: Option<HeadRule>,
    end_rule: Option<HeadRule>,
    outer: HeadRule,
}

impl PipeUnit {
    /// Creates an unlinked unit from `start` to `end`.
    ///
    /// # Errors
    ///
    /// Returns an error if the points coincide or no layer is given.
    pub fn new(start: Point3, end: Point3, layers: Vec<PipeLayer>) -> Result<Self> {
        let delta = end - start;
        let length = delta.norm();
        if length < TOLERANCE {
            return Err(GeometryError::ZeroVector.into());
        }
        if layers.is_empty() {
            return Err(OperationError::InvalidInput("pipe unit has no layers".into()).into());
        }
        let axis = delta / length;
        Ok(Self {
            start,
            end,
            axis,
            length,
            layers,
            prev: None,
            next: None,
            start_normal: axis,
            end_normal: axis,
            start_plane: None,
            end_plane: None,
            start_rule: None,
            end_rule: None,
            outer: HeadRule::new(),
        })
    }

    /// Returns the start point.
    #[must_use]
    pub fn start(&self) -> &Point3 {
        &self.start
    }

    /// Returns the end point.
    #[must_use]
    pub fn end(&self) -> &Point3 {
        &self.end
    }

    /// Returns the unit axis direction.
    #[must_use]
    pub fn axis(&self) -> &Vector3 {
        &self.axis
    }

    /// Returns the layers, innermost first.
    #[must_use]
    pub fn layers(&self) -> &[PipeLayer] {
        &self.layers
    }

    /// Returns the preceding unit.
    #[must_use]
    pub fn prev(&self) -> Option<UnitId> {
        self.prev
    }

    /// Returns the following unit.
    #[must_use]
    pub fn next(&self) -> Option<UnitId> {
        self.next
    }

    /// Normal of the start cap plane.
    #[must_use]
    pub fn start_normal(&self) -> &Vector3 {
        &self.start_normal
    }

    /// Normal of the end cap plane.
    #[must_use]
    pub fn end_normal(&self) -> &Vector3 {
        &self.end_normal
    }

    /// Radius of the outermost layer.
    #[must_use]
    pub fn outer_radius(&self) -> f64 {
        self.layers.last().map_or(0.0, |l| l.radius)
    }

    /// Region of the whole unit, to be cut out of host cells. Empty until
    /// the unit is built.
    #[must_use]
    pub fn outer(&self) -> &HeadRule {
        &self.outer
    }

    /// Creates the unit's surfaces and returns one region per layer.
    ///
    /// Surfaces are registered under `offset + label`. A cap override
    /// replaces the corresponding cap plane.
    pub(crate) fn build(
        &mut self,
        store: &mut SurfaceStore,
        registry: &mut SurfaceRegistry,
        offset: i32,
        start_override: Option<&HeadRule>,
        end_override: Option<&HeadRule>,
    ) -> Result<Vec<HeadRule>> {
        self.start_rule = start_override.cloned();
        self.end_rule = end_override.cloned();
        let start_cap = match start_override {
            Some(rule) => rule.clone(),
            None => {
                let plane = Plane::new(self.start, self.start_normal)?;
                let id = registry.register_surf(store, offset + START_CAP, plane.clone())?;
                self.start_plane = Some(plane);
                HeadRule::literal(id)
            }
        };
        let end_cap = match end_override {
            Some(rule) => rule.clone(),
            None => {
                let plane = Plane::new(self.end, self.end_normal)?;
                let id = registry.register_surf(store, offset + END_CAP, plane.clone())?;
                self.end_plane = Some(plane);
                HeadRule::literal(-id)
            }
        };
        let mut caps = start_cap;
        caps.add_intersection(&end_cap);

        let mut regions = Vec::with_capacity(self.layers.len());
        let mut inner: Option<i32> = None;
        let mut label = offset + LAYER_BASE;
        for layer in &self.layers {
            let cyl = Cylinder::new(self.start, self.axis, layer.radius)?;
            let id = registry.register_surf(store, label, cyl)?;
            let mut region = HeadRule::literal(-id);
            if let Some(prev) = inner {
                region.add_intersection(&HeadRule::literal(prev));
            }
            region.add_intersection(&caps);
            regions.push(region);
            inner = Some(id);
            label += 1;
        }

        let mut outer = HeadRule::new();
        if let Some(id) = inner {
            outer = HeadRule::literal(-id);
            outer.add_intersection(&caps);
        }
        self.outer = outer;
        Ok(regions)
    }

    /// Segments parallel to the axis used to detect host cells: the axis
    /// itself plus `n_angle` lines evenly spaced on a circle of
    /// `fraction * outer_radius`. Each runs between the caps, including a
    /// cap given as an override rule.
    ///
    /// # Errors
    ///
    /// Returns a dangling-reference error if an override rule names a
    /// missing surface.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn sample_lines(
        &self,
        store: &SurfaceStore,
        n_angle: usize,
        fraction: f64,
    ) -> Result<Vec<(Point3, Point3)>> {
        let radius = self.outer_radius() * fraction;
        let u = perpendicular_dir(&self.axis);
        let v = self.axis.cross(&u);
        let mut lines = Vec::with_capacity(n_angle + 1);
        lines.push(self.clip(store, Vector3::zeros())?);
        for k in 0..n_angle {
            let theta = TAU * k as f64 / n_angle as f64;
            lines.push(self.clip(store, (u * theta.cos() + v * theta.sin()) * radius)?);
        }
        Ok(lines)
    }

    /// The axis-parallel line through `start + shift`, cut to the caps.
    fn clip(&self, store: &SurfaceStore, shift: Vector3) -> Result<(Point3, Point3)> {
        let origin = self.start + shift;
        let hit = |plane: Option<&Plane>, fallback: f64| {
            plane
                .and_then(|p| p.line_intersections(&origin, &self.axis).first().copied())
                .unwrap_or(fallback)
        };
        let mut t_start = hit(self.start_plane.as_ref(), 0.0);
        let mut t_end = hit(self.end_plane.as_ref(), self.length);
        if let Some(rule) = &self.start_rule {
            t_start = self.rule_extent(store, rule, &origin, t_end, -1.0)?.unwrap_or(t_start);
        }
        if let Some(rule) = &self.end_rule {
            t_end = self.rule_extent(store, rule, &origin, t_start, 1.0)?.unwrap_or(t_end);
        }
        Ok((origin + self.axis * t_start, origin + self.axis * t_end))
    }

    /// Walks the axis-parallel line through `origin` from parameter `from`
    /// in direction `step` (±1) while `rule` holds, and returns the
    /// farthest crossing of `rule`'s surfaces reached. `None` if the rule
    /// has no crossing on that side or fails right away.
    fn rule_extent(
        &self,
        store: &SurfaceStore,
        rule: &HeadRule,
        origin: &Point3,
        from: f64,
        step: f64,
    ) -> Result<Option<f64>> {
        let mut crossings = Vec::new();
        for id in rule.surfaces() {
            let surf = store
                .get(id)
                .map_err(|_| CsgError::DanglingReference(id))?;
            crossings.extend(
                surf.line_intersections(origin, &self.axis)
                    .into_iter()
                    .filter(|t| (t - from) * step > TOLERANCE),
            );
        }
        // Nearest crossing first
        crossings.sort_by(|a, b| ((a - from) * step).total_cmp(&((b - from) * step)));

        let mut reached = None;
        let mut prev = from;
        for t in crossings {
            if (t - prev).abs() < TOLERANCE {
                continue;
            }
            let mid = origin + self.axis * (0.5 * (prev + t));
            if !rule.is_valid(store, &mid)? {
                break;
            }
            reached = Some(t);
            prev = t;
        }
        Ok(reached)
    }
}

/// Links `from -> to` and tilts the shared joint plane to the bisector of
/// the two axes.
///
/// # Errors
///
/// Returns an error if either unit is missing or the axes are antiparallel.
pub fn connect(units: &mut SlotMap<UnitId, PipeUnit>, from: UnitId, to: UnitId) -> Result<()> {
    let missing = || OperationError::Failed("unknown pipe unit".into());
    let axis_from = units.get(from).ok_or_else(missing)?.axis;
    let axis_to = units.get(to).ok_or_else(missing)?.axis;
    let joint = axis_from + axis_to;
    let len = joint.norm();
    if len < TOLERANCE {
        return Err(GeometryError::Degenerate("pipe reverses direction".into()).into());
    }
    let joint = joint / len;
    if let Some(unit) = units.get_mut(from) {
        unit.next = Some(to);
        unit.end_normal = joint;
    }
    if let Some(unit) = units.get_mut(to) {
        unit.prev = Some(from);
        unit.start_normal = joint;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn layers() -> Vec<PipeLayer> {
        vec![PipeLayer::new(1.0, 1), PipeLayer::new(2.0, 2)]
    }

    /// Two units turning from +z to +x at (0, 0, 10), linked.
    fn bend(units: &mut SlotMap<UnitId, PipeUnit>) -> (UnitId, UnitId) {
        let corner = Point3::new(0.0, 0.0, 10.0);
        let a = units.insert(PipeUnit::new(Point3::origin(), corner, layers()).unwrap());
        let turn = Point3::new(10.0, 0.0, 10.0);
        let b = units.insert(PipeUnit::new(corner, turn, layers()).unwrap());
        connect(units, a, b).unwrap();
        (a, b)
    }

    #[test]
    fn zero_length_rejected() {
        let p = Point3::new(1.0, 1.0, 1.0);
        assert!(PipeUnit::new(p, p, layers()).is_err());
        assert!(PipeUnit::new(Point3::origin(), p, Vec::new()).is_err());
    }

    #[test]
    fn connect_sets_bisector() {
        let mut units = SlotMap::with_key();
        let (a, b) = bend(&mut units);
        let expected = Vector3::new(1.0, 0.0, 1.0).normalize();
        assert!((units[a].end_normal() - expected).norm() < 1e-12);
        assert!((units[b].start_normal() - expected).norm() < 1e-12);
        assert!((units[a].start_normal() - Vector3::z()).norm() < 1e-12);
        assert_eq!(units[a].next(), Some(b));
        assert_eq!(units[b].prev(), Some(a));
    }

    #[test]
    fn build_regions_per_layer() {
        let mut store = SurfaceStore::new();
        let mut reg = SurfaceRegistry::new();
        let end = Point3::new(0.0, 0.0, 10.0);
        let mut unit = PipeUnit::new(Point3::origin(), end, layers()).unwrap();
        let regions = unit.build(&mut store, &mut reg, 100, None, None).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].display(), "-107 101 -102");
        assert_eq!(regions[1].display(), "-108 107 101 -102");
        assert_eq!(unit.outer().display(), "-108 101 -102");

        let p = Point3::new(1.5, 0.0, 5.0);
        assert!(!regions[0].is_valid(&store, &p).unwrap());
        assert!(regions[1].is_valid(&store, &p).unwrap());
    }

    #[test]
    fn sample_lines_follow_mitred_caps() {
        let mut units = SlotMap::with_key();
        let (a, _) = bend(&mut units);
        let mut store = SurfaceStore::new();
        let mut reg = SurfaceRegistry::new();
        units[a].build(&mut store, &mut reg, 100, None, None).unwrap();

        let lines = units[a].sample_lines(&store, 4, 0.5).unwrap();
        assert_eq!(lines.len(), 5);
        // Every end lies on the 45 degree joint plane x + z = 10
        for (s, e) in &lines {
            assert_relative_eq!(s.z, 0.0, epsilon = 1e-12);
            assert_relative_eq!(e.x + e.z, 10.0, epsilon = 1e-9);
            assert_relative_eq!(s.x.hypot(s.y), e.x.hypot(e.y), epsilon = 1e-9);
        }
    }

    #[test]
    fn sample_lines_reach_override_wall() {
        let mut store = SurfaceStore::new();
        let mut reg = SurfaceRegistry::new();
        let plane = Plane::new(Point3::new(0.0, 0.0, -2.0), Vector3::z()).unwrap();
        let wall = reg.register_surf(&mut store, 1, plane).unwrap();
        let (start, end) = (Point3::new(0.0, 0.0, 1.0), Point3::new(0.0, 0.0, 4.0));
        let mut unit = PipeUnit::new(start, end, layers()).unwrap();
        let cap = HeadRule::literal(wall);
        unit.build(&mut store, &mut reg, 100, Some(&cap), None).unwrap();

        for (s, e) in unit.sample_lines(&store, 3, 0.5).unwrap() {
            assert_relative_eq!(s.z, -2.0, epsilon = 1e-9);
            assert_relative_eq!(e.z, 4.0, epsilon = 1e-9);
        }
    }
}
