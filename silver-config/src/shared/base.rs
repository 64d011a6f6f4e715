use thiserror::Error;

/// Errors raised while validating a deserialized configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A field holds a value outside of its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },

    /// Two items of the same kind share a name.
    #[error("duplicate {kind} `{name}`")]
    Duplicate { kind: &'static str, name: String },

    /// A reference points at something that is not declared.
    #[error("`{from}` references unknown {kind} `{name}`")]
    UnknownReference {
        from: String,
        kind: &'static str,
        name: String,
    },
}

impl ValidationError {
    pub(crate) fn invalid(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self::InvalidFieldValue {
            field: field.into(),
            constraint: constraint.into(),
        }
    }
}
