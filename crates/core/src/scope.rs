use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult, NonEmptyString};

/// Platform identifier used as the outer partition key for every persisted resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformId(NonEmptyString);

impl PlatformId {
    /// Creates a validated platform identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        NonEmptyString::new(value).map(Self)
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for PlatformId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Data environment of a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Production data.
    Live,
    /// Sandbox data.
    Test,
}

impl Environment {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Test => "test",
        }
    }

    /// Returns whether the environment holds production data.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

impl FromStr for Environment {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "live" => Ok(Self::Live),
            "test" => Ok(Self::Test),
            _ => Err(AppError::Validation(format!(
                "unknown environment '{value}'"
            ))),
        }
    }
}

/// Partition every resource operation runs in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformScope {
    platform_id: PlatformId,
    env: Environment,
}

impl PlatformScope {
    /// Creates a scope for the platform and environment.
    #[must_use]
    pub fn new(platform_id: PlatformId, env: Environment) -> Self {
        Self { platform_id, env }
    }

    /// Returns the platform identifier.
    #[must_use]
    pub fn platform_id(&self) -> &PlatformId {
        &self.platform_id
    }

    /// Returns the data environment.
    #[must_use]
    pub fn env(&self) -> Environment {
        self.env
    }
}

impl Display for PlatformScope {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}/{}", self.platform_id, self.env.as_str())
    }
}
