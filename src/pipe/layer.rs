use crate::error::{OperationError, Result};
use crate::math::TOLERANCE;

/// Most layers one pipe segment can carry within its label block.
pub const MAX_LAYERS: usize = 90;

/// One concentric ring of a pipe cross-section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipeLayer {
    /// Outer radius of the ring.
    pub radius: f64,
    /// Material id filling the ring.
    pub material: i32,
    /// Temperature, if not the solver default.
    pub temperature: Option<f64>,
}

impl PipeLayer {
    /// Creates a layer at the default temperature.
    #[must_use]
    pub fn new(radius: f64, material: i32) -> Self {
        Self {
            radius,
            material,
            temperature: None,
        }
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Checks that radii are positive and strictly increasing outward.
///
/// # Errors
///
/// Returns an error describing the first offending layer.
pub fn validate_layers(layers: &[PipeLayer]) -> Result<()> {
    if layers.len() > MAX_LAYERS {
        return Err(OperationError::InvalidInput(format!(
            "{} layers exceed the limit of {MAX_LAYERS}",
            layers.len()
        ))
        .into());
    }
    let mut inner = 0.0;
    for (i, layer) in layers.iter().enumerate() {
        if layer.radius < inner + TOLERANCE {
            return Err(OperationError::InvalidInput(format!(
                "layer {i} radius {} must exceed {inner}",
                layer.radius
            ))
            .into());
        }
        inner = layer.radius;
    }
    Ok(())
}
