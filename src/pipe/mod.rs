mod layer;
mod unit;

pub use layer::{validate_layers, PipeLayer, MAX_LAYERS};
pub use unit::{connect, PipeUnit, UnitId};

use std::collections::{BTreeMap, BTreeSet};

use slotmap::SlotMap;
use tracing::{debug, info, warn};

use crate::cell::Cell;
use crate::error::{OperationError, Result};
use crate::math::{Point3, TOLERANCE};
use crate::registry::SurfaceRegistry;
use crate::rule::HeadRule;
use crate::session::ModelSession;

/// Spacing of label blocks between consecutive units.
const UNIT_STRIDE: i32 = 100;

/// Parameters controlling path checks and host-cell detection.
#[derive(Debug, Clone, Copy)]
pub struct PipeParams {
    /// Number of sample lines around the outer layer.
    pub n_angle: usize,
    /// A new point is rejected when the dot product of the new and previous
    /// segment axes falls below `-1 + reverse_tolerance`.
    pub reverse_tolerance: f64,
    /// Sample lines sit at this fraction of the outer radius.
    pub sample_fraction: f64,
}

impl Default for PipeParams {
    fn default() -> Self {
        Self {
            n_angle: 6,
            reverse_tolerance: 1e-3,
            sample_fraction: 0.999,
        }
    }
}

/// Result of building a pipe.
#[derive(Debug, Clone, Default)]
pub struct PipeBuild {
    /// Indices of the new layer cells, unit by unit, innermost layer first.
    pub cells: Vec<i32>,
    /// Outer envelope of each unit.
    pub outer: Vec<HeadRule>,
    /// Existing cells that had the tube cut out of them.
    pub inserted: BTreeSet<i32>,
}

/// Builder for a layered tube following a polyline.
///
/// The control points become a chain of straight [`PipeUnit`]s joined by
/// mitred cap planes. Building the tube creates one cell per layer per unit
/// and cuts the outer envelope of every unit out of each existing cell it
/// passes through. Host cells are found by tracing lines parallel to the
/// unit axis, which can miss a cell lying entirely between two sample
/// lines; such cells can be listed as forced inserts.
#[derive(Debug, Clone)]
pub struct PipeTube {
    name: String,
    build_index: i32,
    params: PipeParams,
    points: Vec<Point3>,
    layers: Vec<PipeLayer>,
    segment_layers: BTreeMap<usize, Vec<PipeLayer>>,
    start_surf: Option<HeadRule>,
    end_surf: Option<HeadRule>,
    insert_cells: BTreeSet<i32>,
    segment_inserts: BTreeMap<usize, BTreeSet<i32>>,
    registry: SurfaceRegistry,
}

impl PipeTube {
    /// Creates an empty pipe numbering its surfaces and cells from
    /// `build_index`.
    #[must_use]
    pub fn new(name: impl Into<String>, build_index: i32) -> Self {
        Self::with_params(name, build_index, PipeParams::default())
    }

    /// Creates an empty pipe with explicit parameters.
    #[must_use]
    pub fn with_params(name: impl Into<String>, build_index: i32, params: PipeParams) -> Self {
        Self {
            name: name.into(),
            build_index,
            params,
            points: Vec::new(),
            layers: Vec::new(),
            segment_layers: BTreeMap::new(),
            start_surf: None,
            end_surf: None,
            insert_cells: BTreeSet::new(),
            segment_inserts: BTreeMap::new(),
            registry: SurfaceRegistry::new(),
        }
    }

    /// Returns the pipe name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the accepted control points.
    #[must_use]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// Returns the pipe's own label registry.
    #[must_use]
    pub fn registry(&self) -> &SurfaceRegistry {
        &self.registry
    }

    /// Appends a control point.
    ///
    /// A point coinciding with the previous one, or one that would send the
    /// path straight back along the previous segment, is rejected with a
    /// warning. Returns whether the point was accepted.
    pub fn add_point(&mut self, point: Point3) -> bool {
        let n = self.points.len();
        if let Some(last) = self.points.last() {
            let step = point - *last;
            let len = step.norm();
            if len < TOLERANCE {
                warn!(pipe = %self.name, ?point, "duplicate pipe point ignored");
                return false;
            }
            if n >= 2 {
                let prev_axis = (*last - self.points[n - 2]).normalize();
                if prev_axis.dot(&(step / len)) < -1.0 + self.params.reverse_tolerance {
                    warn!(pipe = %self.name, ?point, "pipe point reverses direction, ignored");
                    return false;
                }
            }
        }
        self.points.push(point);
        true
    }

    /// Replaces the control points. Returns the number accepted.
    pub fn set_points(&mut self, points: &[Point3]) -> usize {
        self.points.clear();
        points.iter().filter(|p| self.add_point(**p)).count()
    }

    /// Adds a layer outside the existing default layers.
    ///
    /// # Errors
    ///
    /// Returns an error if the radius does not exceed the previous layer.
    pub fn add_layer(&mut self, layer: PipeLayer) -> Result<()> {
        let mut layers = self.layers.clone();
        layers.push(layer);
        validate_layers(&layers)?;
        self.layers = layers;
        Ok(())
    }

    /// Overrides the layers of one segment (segment `i` runs from point `i`
    /// to point `i + 1`).
    ///
    /// # Errors
    ///
    /// Returns an error if the layers are empty or their radii do not increase.
    pub fn set_segment_layers(&mut self, segment: usize, layers: Vec<PipeLayer>) -> Result<()> {
        if layers.is_empty() {
            return Err(OperationError::InvalidInput(format!(
                "segment {segment} of {} given no layers",
                self.name
            ))
            .into());
        }
        validate_layers(&layers)?;
        self.segment_layers.insert(segment, layers);
        Ok(())
    }

    /// Bounds the first unit by `rule` instead of a start cap plane.
    pub fn set_start_surf(&mut self, rule: HeadRule) {
        self.start_surf = Some(rule);
    }

    /// Bounds the last unit by `rule` instead of an end cap plane.
    pub fn set_end_surf(&mut self, rule: HeadRule) {
        self.end_surf = Some(rule);
    }

    /// Forces every unit to be cut out of `cell`, whether or not sampling
    /// finds it.
    pub fn add_insert_cell(&mut self, cell: i32) {
        self.insert_cells.insert(cell);
    }

    /// Forces one segment to be cut out of `cell`.
    pub fn add_segment_insert_cell(&mut self, segment: usize, cell: i32) {
        self.segment_inserts.entry(segment).or_default().insert(cell);
    }

    /// Builds the pipe into `session`.
    ///
    /// For each unit in path order: creates its surfaces, finds the
    /// existing cells it passes through, cuts its outer envelope out of
    /// them, then adds its layer cells. Forced-insert cells that do not
    /// exist, or that belong to this pipe, are skipped with one warning each.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than two points were accepted, a segment has
    /// no layers, or a surface or region operation fails. Cells already
    /// modified stay modified.
    pub fn create_all(&mut self, session: &mut ModelSession) -> Result<PipeBuild> {
        if self.points.len() < 2 {
            return Err(OperationError::InvalidInput(format!(
                "pipe {} needs at least two points",
                self.name
            ))
            .into());
        }

        let mut units: SlotMap<UnitId, PipeUnit> = SlotMap::with_key();
        let mut order: Vec<UnitId> = Vec::with_capacity(self.points.len() - 1);
        for (i, pair) in self.points.windows(2).enumerate() {
            let layers = self.segment_layers.get(&i).unwrap_or(&self.layers);
            if layers.is_empty() {
                return Err(OperationError::InvalidInput(format!(
                    "segment {i} of pipe {} has no layers",
                    self.name
                ))
                .into());
            }
            let id = units.insert(PipeUnit::new(pair[0], pair[1], layers.clone())?);
            if let Some(&prev) = order.last() {
                connect(&mut units, prev, id)?;
            }
            order.push(id);
        }

        let mut build = PipeBuild::default();
        let mut own: BTreeSet<i32> = BTreeSet::new();
        // Forced-insert cells already reported, so each is warned about once
        let mut skipped: BTreeSet<i32> = BTreeSet::new();
        let last = order.len() - 1;
        let mut offset = self.build_index;
        for (i, id) in order.into_iter().enumerate() {
            let unit = units
                .get_mut(id)
                .ok_or_else(|| OperationError::Failed("pipe unit vanished".into()))?;
            let start_override = if i == 0 { self.start_surf.as_ref() } else { None };
            let end_override = if i == last { self.end_surf.as_ref() } else { None };
            let regions = unit.build(
                &mut session.store,
                &mut self.registry,
                offset,
                start_override,
                end_override,
            )?;

            let mut targets = BTreeSet::new();
            let lines = unit.sample_lines(
                &session.store,
                self.params.n_angle,
                self.params.sample_fraction,
            )?;
            for (a, b) in lines {
                targets.extend(session.cells.cells_on_line(&session.store, &a, &b, &own)?);
            }
            let forced = self
                .insert_cells
                .iter()
                .chain(self.segment_inserts.get(&i).into_iter().flatten());
            for &cell in forced {
                if own.contains(&cell) {
                    if skipped.insert(cell) {
                        warn!(pipe = %self.name, cell, "forced insert cell is part of this pipe");
                    }
                } else if session.cells.contains(cell) {
                    targets.insert(cell);
                } else if skipped.insert(cell) {
                    warn!(pipe = %self.name, cell, "forced insert cell does not exist");
                }
            }

            let outer = unit.outer().clone();
            for &cell in &targets {
                session.cells.get_mut(cell)?.exclude(&outer);
            }
            debug!(pipe = %self.name, unit = i, hosts = ?targets, "unit inserted");

            for (layer, region) in unit.layers().iter().zip(regions) {
                let index = session.cells.next_free_index(self.build_index + 1);
                let mut cell = Cell::new(index, layer.material, region);
                cell.temperature = layer.temperature;
                session.add_cell(cell)?;
                own.insert(index);
                build.cells.push(index);
            }
            build.inserted.extend(targets);
            build.outer.push(outer);
            offset += UNIT_STRIDE;
        }

        info!(
            pipe = %self.name,
            units = build.outer.len(),
            cells = build.cells.len(),
            inserted = build.inserted.len(),
            "pipe built"
        );
        Ok(build)
    }
}
