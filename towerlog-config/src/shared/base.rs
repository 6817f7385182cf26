use thiserror::Error;

/// A configuration value that parsed but cannot be used.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`{field}` cannot be zero")]
    Zero { field: &'static str },
    #[error("`{field}` cannot be empty")]
    Empty { field: &'static str },
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue {
        field: &'static str,
        constraint: String,
    },
}

pub(crate) fn non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }

    Ok(())
}
