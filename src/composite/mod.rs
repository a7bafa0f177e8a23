mod token;

pub use token::{tokenize, Channel, TemplateToken};

use crate::error::{LookupError, Result};
use crate::registry::SurfaceRegistry;
use crate::rule::HeadRule;
use crate::store::SurfaceStore;

/// The three numeric offsets a template is instantiated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Offsets {
    /// Offset for unmarked tokens.
    pub primary: i32,
    /// Offset for `M` tokens.
    pub minor: i32,
    /// Offset for `N` tokens.
    pub secondary: i32,
}

impl Offsets {
    /// Offsets with only the primary channel set.
    #[must_use]
    pub fn new(primary: i32) -> Self {
        Self {
            primary,
            ..Self::default()
        }
    }

    /// Sets the minor offset.
    #[must_use]
    pub fn with_minor(mut self, minor: i32) -> Self {
        self.minor = minor;
        self
    }

    /// Sets the secondary offset.
    #[must_use]
    pub fn with_secondary(mut self, secondary: i32) -> Self {
        self.secondary = secondary;
        self
    }

    /// Offset applied to tokens on `channel`.
    #[must_use]
    pub fn get(&self, channel: Channel) -> i32 {
        match channel {
            Channel::True => 0,
            Channel::Primary => self.primary,
            Channel::Minor => self.minor,
            Channel::Secondary => self.secondary,
        }
    }
}

/// Builds real-id expressions from templates for one generator.
///
/// A template such as `"1 -2 (3M : -4N) 105T"` is written once against local
/// surface numbers. Each number is shifted by the offset of its channel
/// (primary by default, `M` minor, `N` secondary) and the resulting label is
/// resolved through a [`SurfaceRegistry`]. `T` marks a number that already
/// is a real surface id.
#[derive(Debug, Clone, Copy)]
pub struct CompositeBuilder<'a> {
    registry: &'a SurfaceRegistry,
    store: &'a SurfaceStore,
}

impl<'a> CompositeBuilder<'a> {
    /// Creates a builder resolving labels through `registry`.
    #[must_use]
    pub fn new(registry: &'a SurfaceRegistry, store: &'a SurfaceStore) -> Self {
        Self { registry, store }
    }

    /// Resolves one signed template number.
    ///
    /// The magnitude is shifted by the channel offset; the sign is kept.
    /// `True` numbers go through the registry unshifted, falling back to the
    /// store (following renumbering) when no label of that value exists.
    fn resolve(
        &self,
        offsets: Offsets,
        value: i32,
        channel: Channel,
    ) -> std::result::Result<i32, LookupError> {
        if channel == Channel::True {
            if self.registry.has_surf(value) {
                return self.registry.real_surf(value);
            }
            return self.store.resolve(value);
        }
        let label = value
            .abs()
            .checked_add(offsets.get(channel))
            .ok_or(LookupError::LabelNotFound(value.abs()))?;
        self.registry.real_surf(label * value.signum())
    }

    /// Instantiates `template`, every token required.
    ///
    /// # Errors
    ///
    /// Returns a parse error for malformed templates and a not-found error
    /// for any label that does not resolve.
    pub fn composite(&self, offsets: Offsets, template: &str) -> Result<String> {
        let tokens = tokenize(template)?;
        let mut out = Vec::with_capacity(tokens.len());
        for token in tokens {
            out.push(match token {
                TemplateToken::Surf { value, channel } => TemplateToken::Surf {
                    value: self.resolve(offsets, value, channel)?,
                    channel: Channel::True,
                },
                other => other,
            });
        }
        finish(&out)
    }

    /// Instantiates `template`, silently dropping tokens whose label does
    /// not resolve, then removing operators left without operands.
    ///
    /// # Errors
    ///
    /// Returns a parse error for malformed templates.
    pub fn set_composite(&self, offsets: Offsets, template: &str) -> Result<String> {
        let tokens = tokenize(template)?;
        let mut out = Vec::with_capacity(tokens.len());
        for token in tokens {
            match token {
                TemplateToken::Surf { value, channel } => {
                    if let Ok(real) = self.resolve(offsets, value, channel) {
                        out.push(TemplateToken::Surf {
                            value: real,
                            channel: Channel::True,
                        });
                    }
                }
                other => out.push(other),
            }
        }
        finish(&token::tidy(out))
    }

    /// Instantiates `template` choosing between alternative channels.
    ///
    /// `candidates` lists channels in order of preference. The first
    /// candidate that owns at least one token and whose tokens all resolve
    /// is kept; tokens on the other
    /// candidate channels are dropped. Tokens on channels not listed are
    /// required as in [`composite`](Self::composite).
    ///
    /// # Errors
    ///
    /// Returns a parse error for malformed templates, a not-found error for
    /// an unresolvable non-candidate token, and
    /// [`LookupError::NoAlternative`] when no candidate fully resolves.
    pub fn alternative_composite(
        &self,
        offsets: Offsets,
        candidates: &[Channel],
        template: &str,
    ) -> Result<String> {
        let tokens = tokenize(template)?;
        let chosen = candidates
            .iter()
            .copied()
            .find(|&candidate| {
                let owned: Vec<i32> = tokens
                    .iter()
                    .filter_map(|t| match *t {
                        TemplateToken::Surf { value, channel } if channel == candidate => {
                            Some(value)
                        }
                        _ => None,
                    })
                    .collect();
                !owned.is_empty()
                    && owned
                        .iter()
                        .all(|&value| self.resolve(offsets, value, candidate).is_ok())
            })
            .ok_or_else(|| LookupError::NoAlternative(template.to_string()))?;

        let mut out = Vec::with_capacity(tokens.len());
        for token in tokens {
            match token {
                TemplateToken::Surf { channel, .. }
                    if channel != chosen && candidates.contains(&channel) => {}
                TemplateToken::Surf { value, channel } => out.push(TemplateToken::Surf {
                    value: self.resolve(offsets, value, channel)?,
                    channel: Channel::True,
                }),
                other => out.push(other),
            }
        }
        finish(&token::tidy(out))
    }

    /// [`composite`](Self::composite) parsed into a region.
    ///
    /// # Errors
    ///
    /// As for [`composite`](Self::composite).
    pub fn composite_rule(&self, offsets: Offsets, template: &str) -> Result<HeadRule> {
        Ok(HeadRule::parse(&self.composite(offsets, template)?)?)
    }

    /// [`set_composite`](Self::set_composite) parsed into a region.
    ///
    /// # Errors
    ///
    /// As for [`set_composite`](Self::set_composite).
    pub fn set_composite_rule(&self, offsets: Offsets, template: &str) -> Result<HeadRule> {
        Ok(HeadRule::parse(&self.set_composite(offsets, template)?)?)
    }
}

/// Renders resolved tokens, checking the result is a well-formed expression.
fn finish(tokens: &[TemplateToken]) -> Result<String> {
    let text = token::render(tokens);
    HeadRule::parse(&text)?;
    Ok(text)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::{CsgError, ParseError};
    use crate::geometry::Plane;
    use crate::math::{Point3, Vector3};

    /// Registers z-planes at the given labels (plane height = label).
    fn setup(labels: &[i32]) -> (SurfaceStore, SurfaceRegistry) {
        let mut store = SurfaceStore::new();
        let mut reg = SurfaceRegistry::new();
        for &label in labels {
            let plane = Plane::new(Point3::new(0.0, 0.0, f64::from(label)), Vector3::z()).unwrap();
            reg.register_surf(&mut store, label, plane).unwrap();
        }
        (store, reg)
    }

    #[test]
    fn primary_offset_keeps_sign() {
        let (store, reg) = setup(&[101, 102, 103]);
        let b = CompositeBuilder::new(&reg, &store);
        assert_eq!(
            b.composite(Offsets::new(100), "1 -2 (3 : -1)").unwrap(),
            "101 -102 (103 : -101)"
        );
    }

    #[test]
    fn three_channels() {
        let (store, reg) = setup(&[101, 205, 307]);
        let b = CompositeBuilder::new(&reg, &store);
        let offsets = Offsets::new(100).with_minor(200).with_secondary(300);
        assert_eq!(b.composite(offsets, "1 -5M 7N").unwrap(), "101 -205 307");
    }

    #[test]
    fn true_tokens_skip_offset() {
        let (store, reg) = setup(&[101, 7]);
        let b = CompositeBuilder::new(&reg, &store);
        assert_eq!(b.composite(Offsets::new(100), "1 -7T").unwrap(), "101 -7");
    }

    #[test]
    fn true_tokens_are_idempotent() {
        let (store, reg) = setup(&[5, 9, 12]);
        let b = CompositeBuilder::new(&reg, &store);
        let offsets = Offsets::new(1000);
        let once = b.composite(offsets, "5T -9T (12T : -5T)").unwrap();
        let remarked = tokenize(&once)
            .unwrap()
            .iter()
            .map(|t| match t {
                TemplateToken::Surf { value, .. } => format!("{value}T"),
                TemplateToken::Open => "(".to_string(),
                TemplateToken::Close => ")".to_string(),
                TemplateToken::Union => ":".to_string(),
                TemplateToken::Not => "#".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        let twice = b.composite(offsets, &remarked).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_label_is_not_found() {
        let (store, reg) = setup(&[101]);
        let b = CompositeBuilder::new(&reg, &store);
        let err = b
            .composite(Offsets::new(100).with_minor(200), "1 -2M")
            .unwrap_err();
        assert!(matches!(err, CsgError::Lookup(LookupError::LabelNotFound(202))));
    }

    #[test]
    fn set_composite_drops_missing() {
        let (store, reg) = setup(&[101]);
        let b = CompositeBuilder::new(&reg, &store);
        let offsets = Offsets::new(100).with_minor(200);
        assert_eq!(b.set_composite(offsets, "1 -2M").unwrap(), "101");
        assert_eq!(b.set_composite(offsets, "1 (-2M : 3M)").unwrap(), "101");
        assert_eq!(b.set_composite(offsets, "-2M : 1").unwrap(), "101");
        assert_eq!(b.set_composite(offsets, "-2M").unwrap(), "");
        assert!(b.set_composite_rule(offsets, "-2M").unwrap().is_empty());
    }

    #[test]
    fn malformed_templates() {
        let (store, reg) = setup(&[101]);
        let b = CompositeBuilder::new(&reg, &store);
        assert!(matches!(
            b.composite(Offsets::new(100), "1 (2"),
            Err(CsgError::Parse(ParseError::UnbalancedParenthesis(_)))
        ));
        assert!(matches!(
            b.set_composite(Offsets::new(100), "1 abc"),
            Err(CsgError::Parse(ParseError::BadToken { .. }))
        ));
        assert!(matches!(
            b.composite(Offsets::new(100), "1 :"),
            Err(CsgError::Parse(ParseError::TrailingOperator(_)))
        ));
    }

    #[test]
    fn alternative_prefers_first_complete_channel() {
        // Optional lining registered on the minor channel only for 3, not 4
        let (store, reg) = setup(&[101, 203, 303, 304]);
        let b = CompositeBuilder::new(&reg, &store);
        let offsets = Offsets::new(100).with_minor(200).with_secondary(300);
        let order = [Channel::Minor, Channel::Secondary];

        assert_eq!(
            b.alternative_composite(offsets, &order, "1 -3M -3N").unwrap(),
            "101 -203"
        );
        assert_eq!(
            b.alternative_composite(offsets, &order, "1 -3M 4M -3N 4N").unwrap(),
            "101 -303 304"
        );
        let err = b
            .alternative_composite(offsets, &order, "1 -5M -5N")
            .unwrap_err();
        assert!(matches!(err, CsgError::Lookup(LookupError::NoAlternative(_))));
    }

    #[test]
    fn alternative_skips_channel_absent_from_template() {
        let (store, reg) = setup(&[101, 303]);
        let b = CompositeBuilder::new(&reg, &store);
        let offsets = Offsets::new(100).with_minor(200).with_secondary(300);
        assert_eq!(
            b.alternative_composite(offsets, &[Channel::Minor, Channel::Secondary], "1 -3N")
                .unwrap(),
            "101 -303"
        );
        let err = b
            .alternative_composite(offsets, &[Channel::Minor], "1 -3N")
            .unwrap_err();
        assert!(matches!(err, CsgError::Lookup(LookupError::NoAlternative(_))));
    }

    #[test]
    fn offset_overflow_is_not_found() {
        let (store, reg) = setup(&[101]);
        let b = CompositeBuilder::new(&reg, &store);
        let err = b
            .composite(Offsets::new(100), "1 2147483647")
            .unwrap_err();
        assert!(matches!(
            err,
            CsgError::Lookup(LookupError::LabelNotFound(2_147_483_647))
        ));
        assert_eq!(b.set_composite(Offsets::new(100), "1 -2147483647").unwrap(), "101");
    }

    #[test]
    fn rule_output_parses() {
        let (store, reg) = setup(&[11, 12]);
        let b = CompositeBuilder::new(&reg, &store);
        let rule = b.composite_rule(Offsets::new(10), "#(1 -2)").unwrap();
        assert_eq!(rule.display(), "-11 : 12");
    }
}
