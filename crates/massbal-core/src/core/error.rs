use thiserror::Error;

/// Raised when an object cannot be constructed from the data it was given.
///
/// Definition errors are always detected eagerly: the offending component,
/// stream or reaction is never created.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DefinitionError {
    #[error("Unknown atom symbol '{symbol}' in component '{component}'")]
    UnknownAtom { component: String, symbol: String },

    #[error("Length mismatch for '{context}': expected {expected}, got {actual}")]
    LengthMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Component '{0}' has an empty atomic composition")]
    EmptyComposition(String),

    #[error("Component '{0}' is already defined")]
    DuplicateComponent(String),

    #[error("Component '{0}' is not defined in the registry")]
    UnknownComponent(String),

    #[error("Component '{component}' is listed more than once in stream '{stream}'")]
    DuplicateStreamComponent { stream: String, component: String },

    #[error(
        "Flow matrix for '{stream}' has shape {rows}x{cols}, expected {expected_rows}x{expected_cols}"
    )]
    ShapeMismatch {
        stream: String,
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },

    #[error("Stream history '{0}' has no timestamps")]
    EmptyAxis(String),

    #[error("Non-finite flow for component '{component}' in stream '{stream}'")]
    NonFiniteFlow { stream: String, component: String },

    #[error("Stoichiometric coefficient for '{component}' must be positive, got {value}")]
    InvalidCoefficient { component: String, value: f64 },

    #[error("Key component '{0}' is not a reactant of the reaction")]
    KeyNotReactant(String),

    #[error("Conversion must lie within [0, 1], got {0}")]
    InvalidConversion(f64),

    #[error(
        "Unbalanced reaction: atom '{atom}' totals {reactants} on the reactant side and {products} on the product side"
    )]
    UnbalancedReaction {
        atom: String,
        reactants: f64,
        products: f64,
    },
}

/// Raised when two objects that must share a context do not.
///
/// No partial merge is ever performed when this error is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("Streams '{left}' and '{right}' are bound to different component registries")]
    RegistryMismatch { left: String, right: String },

    #[error("Streams '{left}' and '{right}' have different sample axes")]
    AxisMismatch { left: String, right: String },
}
