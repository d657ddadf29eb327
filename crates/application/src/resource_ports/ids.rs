use async_trait::async_trait;
use keystone_core::{AppResult, PlatformScope};

/// Port issuing identifiers for new records.
#[async_trait]
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh identifier starting with `{prefix}_`.
    async fn generate_id(&self, scope: &PlatformScope, prefix: &str) -> AppResult<String>;
}
