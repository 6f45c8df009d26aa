use thiserror::Error;

/// Validation failures raised while constructing or mutating model types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A required field is empty or missing.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    /// A field value falls outside its allowed range or cardinality.
    #[error("invalid value for {field}: {detail}")]
    InvalidValue { field: &'static str, detail: String },
}

impl DomainError {
    pub fn invalid(field: &'static str, detail: impl Into<String>) -> Self {
        DomainError::InvalidValue {
            field,
            detail: detail.into(),
        }
    }
}
