use async_trait::async_trait;
use keystone_application::IdGenerator;
use keystone_core::{AppError, AppResult, PlatformScope};

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const SUFFIX_LENGTH: usize = 20;
// Largest multiple of 62 below 256; bytes at or above it are redrawn.
const ACCEPT_BELOW: u8 = 248;

/// Issues `{prefix}_{20 base62 chars}` identifiers from OS randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl RandomIdGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn random_suffix() -> AppResult<String> {
        let mut suffix = String::with_capacity(SUFFIX_LENGTH);
        let mut bytes = [0u8; 32];

        while suffix.len() < SUFFIX_LENGTH {
            getrandom::fill(&mut bytes).map_err(|error| {
                AppError::Internal(format!("failed to generate record identifier: {error}"))
            })?;

            for byte in bytes {
                if suffix.len() == SUFFIX_LENGTH {
                    break;
                }
                if byte < ACCEPT_BELOW {
                    suffix.push(char::from(ALPHABET[usize::from(byte % 62)]));
                }
            }
        }

        Ok(suffix)
    }
}

#[async_trait]
impl IdGenerator for RandomIdGenerator {
    async fn generate_id(&self, _scope: &PlatformScope, prefix: &str) -> AppResult<String> {
        Ok(format!("{prefix}_{}", Self::random_suffix()?))
    }
}
