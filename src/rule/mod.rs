mod node;
mod parse;

pub use node::Rule;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{CsgError, ParseError, Result};
use crate::geometry::Surface;
use crate::math::{Point3, TOLERANCE};
use crate::store::SurfaceStore;

/// A region of space described by a Boolean expression over signed
/// surface ids.
///
/// An empty `HeadRule` carries no literal and denotes the universal
/// (unbounded) region. All combination operations rewrite the tree; a
/// `HeadRule` is cloned, never shared, between cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadRule {
    root: Option<Rule>,
}

impl HeadRule {
    /// Creates the universal region.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing tree.
    #[must_use]
    pub fn from_rule(rule: Rule) -> Self {
        Self { root: Some(rule) }
    }

    /// A single half-space literal.
    #[must_use]
    pub fn literal(id: i32) -> Self {
        Self::from_rule(Rule::Literal(id))
    }

    /// Parses expression text.
    ///
    /// # Errors
    ///
    /// Returns an error on unbalanced parentheses, dangling operators or
    /// non-numeric tokens.
    pub fn parse(expr: &str) -> std::result::Result<Self, ParseError> {
        Ok(Self {
            root: parse::parse_rule(expr)?,
        })
    }

    /// Replaces the content with the parsed `expr`.
    ///
    /// On failure the rule is left empty.
    ///
    /// # Errors
    ///
    /// Returns the parse error.
    pub fn proc_string(&mut self, expr: &str) -> std::result::Result<(), ParseError> {
        match parse::parse_rule(expr) {
            Ok(root) => {
                self.root = root;
                Ok(())
            }
            Err(e) => {
                self.root = None;
                Err(e)
            }
        }
    }

    /// Returns the tree, or `None` for the universal region.
    #[must_use]
    pub fn root(&self) -> Option<&Rule> {
        self.root.as_ref()
    }

    /// Returns `true` if the rule has no literal.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Intersects this region with `other`.
    pub fn add_intersection(&mut self, other: &HeadRule) {
        self.root = match (self.root.take(), &other.root) {
            (None, r) => r.clone(),
            (Some(l), None) => Some(l),
            (Some(l), Some(r)) => Some(Rule::and(vec![l, r.clone()])),
        };
    }

    /// Unites this region with `other`. A union with the universal region
    /// is universal.
    pub fn add_union(&mut self, other: &HeadRule) {
        self.root = match (self.root.take(), &other.root) {
            (Some(l), Some(r)) => Some(Rule::or(vec![l, r.clone()])),
            _ => None,
        };
    }

    /// Complements in place. The universal region has no representable
    /// complement and is left unchanged.
    pub fn make_complement(&mut self) {
        if let Some(root) = &self.root {
            self.root = Some(root.complement());
        }
    }

    /// Returns the complement without modifying `self`.
    #[must_use]
    pub fn complement(&self) -> HeadRule {
        let mut out = self.clone();
        out.make_complement();
        out
    }

    /// Signed literals in left-to-right order.
    #[must_use]
    pub fn literals(&self) -> Vec<i32> {
        let mut out = Vec::new();
        if let Some(root) = &self.root {
            root.for_each_literal(&mut |n| out.push(n));
        }
        out
    }

    /// Distinct surface ids (unsigned) named by the rule.
    #[must_use]
    pub fn surfaces(&self) -> BTreeSet<i32> {
        self.literals().into_iter().map(i32::abs).collect()
    }

    /// Replaces surface `old` with `new`, keeping each literal's sign.
    pub fn substitute_surf(&mut self, old: i32, new: i32) {
        let (old, new) = (old.abs(), new.abs());
        if let Some(root) = &mut self.root {
            root.map_literals(&mut |n| if n.abs() == old { new * n.signum() } else { n });
        }
    }

    /// Drops every literal on surface `id`.
    pub fn remove_surf(&mut self, id: i32) {
        self.root = self.root.take().and_then(|r| r.without_surf(id.abs()));
    }

    /// Tests whether `point` lies strictly inside the region.
    ///
    /// A point on one of the bounding surfaces satisfies neither sign of
    /// that literal.
    ///
    /// # Errors
    ///
    /// Returns [`CsgError::DanglingReference`] if a literal names a surface
    /// missing from `store`.
    pub fn is_valid(&self, store: &SurfaceStore, point: &Point3) -> Result<bool> {
        let Some(root) = &self.root else {
            return Ok(true);
        };
        root.evaluate(&mut |n: i32| -> Result<bool> {
            let surf = store
                .get(n)
                .map_err(|_| CsgError::DanglingReference(n.abs()))?;
            Ok(i32::from(surf.side(point, TOLERANCE)) * n.signum() > 0)
        })
    }

    /// Canonical text form.
    #[must_use]
    pub fn display(&self) -> String {
        self.to_string()
    }

    /// Text form after checking every surface still exists.
    ///
    /// # Errors
    ///
    /// Returns [`CsgError::DanglingReference`] for the first missing surface.
    pub fn display_checked(&self, store: &SurfaceStore) -> Result<String> {
        self.check_surfaces(store)?;
        Ok(self.display())
    }

    /// Verifies that every literal names an existing surface.
    ///
    /// # Errors
    ///
    /// Returns [`CsgError::DanglingReference`] for the first missing surface.
    pub fn check_surfaces(&self, store: &SurfaceStore) -> Result<()> {
        match self.surfaces().into_iter().find(|&id| !store.contains(id)) {
            Some(id) => Err(CsgError::DanglingReference(id)),
            None => Ok(()),
        }
    }

    /// Parameters in `(0, 1)` at which the segment `a -> b` crosses any
    /// surface of the rule, sorted and deduplicated.
    ///
    /// # Errors
    ///
    /// Returns [`CsgError::DanglingReference`] if a surface is missing.
    pub fn line_intersections(
        &self,
        store: &SurfaceStore,
        a: &Point3,
        b: &Point3,
    ) -> Result<Vec<f64>> {
        let ids = self.surfaces();
        segment_crossings(store, ids.iter().copied(), a, b)
    }
}

/// Sorted, deduplicated parameters in `(0, 1)` at which `a -> b` crosses
/// the given surfaces.
pub(crate) fn segment_crossings(
    store: &SurfaceStore,
    ids: impl IntoIterator<Item = i32>,
    a: &Point3,
    b: &Point3,
) -> Result<Vec<f64>> {
    let dir = b - a;
    let mut out = Vec::new();
    for id in ids {
        let surf = store
            .get(id)
            .map_err(|_| CsgError::DanglingReference(id.abs()))?;
        out.extend(
            surf.line_intersections(a, &dir)
                .into_iter()
                .filter(|t| *t > TOLERANCE && *t < 1.0 - TOLERANCE),
        );
    }
    out.sort_by(f64::total_cmp);
    out.dedup_by(|x, y| (*x - *y).abs() < TOLERANCE);
    Ok(out)
}

impl fmt::Display for HeadRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            Some(root) => root.fmt(f),
            None => Ok(()),
        }
    }
}

impl FromStr for HeadRule {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Rule> for HeadRule {
    fn from(rule: Rule) -> Self {
        Self::from_rule(rule)
    }
}
