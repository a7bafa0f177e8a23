use thiserror::Error;

/// Top-level error type for CSG model construction.
#[derive(Debug, Error)]
pub enum CsgError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("dangling reference: surface {0} does not exist")]
    DanglingReference(i32),

    #[error(transparent)]
    Operation(#[from] OperationError),
}

/// Errors related to surface construction.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("parameter {parameter} = {value} is out of range [{min}, {max}]")]
    ParameterOutOfRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("zero-length vector")]
    ZeroVector,
}

/// Errors raised while reading expression text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unbalanced parenthesis in `{0}`")]
    UnbalancedParenthesis(String),

    #[error("operator without operand in `{0}`")]
    TrailingOperator(String),

    #[error("bad token `{token}` in `{expr}`")]
    BadToken { token: String, expr: String },
}

/// Errors raised when a label, surface or cell is referenced but absent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("local surface label {0} is not registered")]
    LabelNotFound(i32),

    #[error("surface {0} not found")]
    SurfaceNotFound(i32),

    #[error("cell {0} not found")]
    CellNotFound(i32),

    #[error("no alternative channel resolves in `{0}`")]
    NoAlternative(String),
}

/// Errors related to model-building operations.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation failed: {0}")]
    Failed(String),
}

/// Convenience type alias for results using [`CsgError`].
pub type Result<T> = std::result::Result<T, CsgError>;
