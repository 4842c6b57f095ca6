//! Access keys for the selected profile.
//!
//! Keys come from the legacy fields of the profile store when present,
//! otherwise from a [`CredentialProvider`] (by default the shared AWS
//! credentials file). Keys are never accepted from command line flags.

mod shared;

pub use shared::{SharedCredentialsProvider, parse_ini};

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;

/// An access-key bundle.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessKeys {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AccessKeys {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

impl fmt::Debug for AccessKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKeys")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Materializes access keys and the owning account for a profile.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn materialize(&self, profile: &str) -> Result<AccessKeys>;

    /// The account the keys belong to.
    async fn account_id(&self, profile: &str, keys: &AccessKeys, region: &str) -> Result<String>;
}
