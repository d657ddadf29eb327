//! Shared primitives for all Rust crates in Keystone.

#![forbid(unsafe_code)]

/// Platform partitioning primitives shared across services.
pub mod scope;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use scope::{Environment, PlatformId, PlatformScope};

/// Result type used across Keystone crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Resource operation exposed to the request/response layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Paged listing.
    List,
    /// Point read.
    Read,
    /// Creation.
    Create,
    /// Partial update.
    Update,
    /// Idempotent removal.
    Remove,
}

impl Operation {
    /// Returns the stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Remove => "remove",
        }
    }
}

/// Structured detail attached to resource-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    /// Resource type key, for example `k360`.
    pub resource_type: String,
    /// Identifier the operation targeted.
    pub resource_id: String,
    /// Operation that failed.
    pub operation: Operation,
}

impl ResourceRef {
    /// Creates a resource reference.
    #[must_use]
    pub fn new(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            operation,
        }
    }
}

impl Display for ResourceRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{} '{}' during {}",
            self.resource_type,
            self.resource_id,
            self.operation.as_str()
        )
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Payload violates the resource schema.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(ResourceRef),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(ResourceRef),

    /// Filter, order or pagination parameters cannot be combined.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the resource reference for resource-level failures.
    #[must_use]
    pub fn resource(&self) -> Option<&ResourceRef> {
        match self {
            Self::NotFound(resource) | Self::Conflict(resource) => Some(resource),
            Self::Validation(_) | Self::InvalidQuery(_) | Self::Internal(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{AppError, Environment, NonEmptyString, Operation, PlatformId, ResourceRef};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn platform_id_rejects_blank_values() {
        assert!(PlatformId::new("").is_err());
        assert!(PlatformId::new("1").is_ok());
    }

    #[test]
    fn environment_parses_storage_values() {
        assert_eq!(Environment::from_str("live").ok(), Some(Environment::Live));
        assert_eq!(Environment::from_str("test").ok(), Some(Environment::Test));
        assert!(Environment::from_str("staging").is_err());
    }

    #[test]
    fn not_found_error_names_resource_and_operation() {
        let error = AppError::NotFound(ResourceRef::new("k360", "k360_abc", Operation::Update));
        assert_eq!(error.to_string(), "not found: k360 'k360_abc' during update");
        assert_eq!(
            error.resource().map(|resource| resource.operation),
            Some(Operation::Update)
        );
    }
}
