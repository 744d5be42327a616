//! Errors in the library.
use crate::Dtype;
use thiserror::Error;

/// Errors raised when constructing or combining [`Element`](crate::Element)s.
#[derive(Error, Debug)]
pub enum ElementError {
    /// A field value has a numeric kind other than the declared one.
    #[error("{name} must have dtype {expected:?} but had dtype {actual:?}")]
    DtypeMismatch {
        /// Name of the offending field.
        name: &'static str,
        /// Declared numeric kind.
        expected: Dtype,
        /// Numeric kind of the supplied value.
        actual: Dtype,
    },

    /// A field value has a shape other than the declared one.
    #[error("{name} must have shape {expected:?} but had shape {actual:?}")]
    ShapeMismatch {
        /// Name of the offending field.
        name: &'static str,
        /// Declared shape.
        expected: Vec<usize>,
        /// Shape of the supplied value.
        actual: Vec<usize>,
    },

    /// The number of supplied values does not match the schema.
    #[error("expected {expected} field values but got {actual}")]
    FieldCount {
        /// Number of fields in the schema.
        expected: usize,
        /// Number of supplied values.
        actual: usize,
    },

    /// A field name that does not occur in the schema.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// A field required by the schema was not supplied.
    #[error("missing field: {0}")]
    MissingField(String),

    /// Stacking requires at least one element.
    #[error("cannot stack an empty element list")]
    EmptyStack,

    /// Elements combined in one operation must share one schema.
    #[error("elements must share one schema")]
    SchemaMismatch,

    /// Normalization was requested before any statistics were accumulated.
    #[error("no statistics accumulated yet")]
    NoStatistics,
}

/// Errors raised when sampling a [`Buffer`](crate::Buffer).
#[derive(Error, Debug)]
pub enum BufferError {
    /// More elements were requested than are held and `sample_less` was off.
    #[error("requested {requested} elements but only {available} are held; \
             pass sample_less to retrieve fewer")]
    InsufficientData {
        /// Number of elements requested.
        requested: usize,
        /// Number of elements currently held.
        available: usize,
    },
}
