use std::fmt;

/// A node of a Boolean region tree over signed surface ids.
///
/// A positive literal selects the positive half-space of its surface,
/// a negative literal the negative one. `And` and `Or` are always kept
/// flat: an `And` never directly holds another `And`, likewise for `Or`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Half-space of one surface.
    Literal(i32),
    /// Intersection of all children.
    And(Vec<Rule>),
    /// Union of all children.
    Or(Vec<Rule>),
}

impl Rule {
    /// Builds an intersection, flattening nested intersections and
    /// collapsing a single child.
    #[must_use]
    pub fn and(children: Vec<Rule>) -> Rule {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Rule::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Rule::And(flat)
        }
    }

    /// Builds a union, flattening nested unions and collapsing a single child.
    #[must_use]
    pub fn or(children: Vec<Rule>) -> Rule {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Rule::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Rule::Or(flat)
        }
    }

    /// De Morgan complement: swaps `And`/`Or` and negates every literal.
    #[must_use]
    pub fn complement(&self) -> Rule {
        match self {
            Rule::Literal(n) => Rule::Literal(-n),
            Rule::And(children) => Rule::or(children.iter().map(Rule::complement).collect()),
            Rule::Or(children) => Rule::and(children.iter().map(Rule::complement).collect()),
        }
    }

    /// Evaluates the tree with `literal` deciding each leaf.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised by `literal`.
    pub fn evaluate<E, F>(&self, literal: &mut F) -> Result<bool, E>
    where
        F: FnMut(i32) -> Result<bool, E>,
    {
        match self {
            Rule::Literal(n) => literal(*n),
            Rule::And(children) => {
                for child in children {
                    if !child.evaluate(literal)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Rule::Or(children) => {
                for child in children {
                    if child.evaluate(literal)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Calls `f` on every literal, left to right.
    pub fn for_each_literal<F: FnMut(i32)>(&self, f: &mut F) {
        match self {
            Rule::Literal(n) => f(*n),
            Rule::And(children) | Rule::Or(children) => {
                for child in children {
                    child.for_each_literal(f);
                }
            }
        }
    }

    /// Rewrites every literal in place.
    pub fn map_literals<F: FnMut(i32) -> i32>(&mut self, f: &mut F) {
        match self {
            Rule::Literal(n) => *n = f(*n),
            Rule::And(children) | Rule::Or(children) => {
                for child in children {
                    child.map_literals(f);
                }
            }
        }
    }

    /// Drops every literal on surface `id`. Returns `None` if nothing is left.
    #[must_use]
    pub fn without_surf(self, id: i32) -> Option<Rule> {
        match self {
            Rule::Literal(n) if n.abs() == id => None,
            Rule::Literal(n) => Some(Rule::Literal(n)),
            Rule::And(children) => {
                let kept: Vec<Rule> = children
                    .into_iter()
                    .filter_map(|c| c.without_surf(id))
                    .collect();
                (!kept.is_empty()).then(|| Rule::and(kept))
            }
            Rule::Or(children) => {
                let kept: Vec<Rule> = children
                    .into_iter()
                    .filter_map(|c| c.without_surf(id))
                    .collect();
                (!kept.is_empty()).then(|| Rule::or(kept))
            }
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, in_and: bool) -> fmt::Result {
        match self {
            Rule::Literal(n) => write!(f, "{n}"),
            Rule::And(children) => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    child.write(f, true)?;
                }
                Ok(())
            }
            Rule::Or(children) => {
                if in_and {
                    f.write_str("(")?;
                }
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" : ")?;
                    }
                    child.write(f, false)?;
                }
                if in_and {
                    f.write_str(")")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, false)
    }
}
