use serde::{Deserialize, Serialize};
use std::fmt;

/// # Credentials
///
/// The Autotask API credential triple. Only ever serialized inside the vault's
/// encrypt/decrypt path.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// API user name (`UserName` header).
    pub username: String,
    /// Integration code (`ApiIntegrationCode` header).
    pub integration_code: String,
    /// API secret (`Secret` header).
    pub secret: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        integration_code: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            integration_code: integration_code.into(),
            secret: secret.into(),
        }
    }

    /// True when every field is non-empty.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.integration_code.is_empty() && !self.secret.is_empty()
    }
}

// Secrets never reach logs through `{:?}`.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("integration_code", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}
