use thiserror::Error;

/// Errors returned by vault operations.
///
/// None of the variants carry plaintext or key material, so they are safe to
/// log and to hand back to the web layer.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The vault file is malformed (too short, or its plaintext is not a
    /// credential document).
    #[error("vault file format error: {0}")]
    Format(String),

    /// The authentication tag did not verify: wrong password or a modified file.
    #[error("vault authentication failed")]
    Authentication,

    /// Key derivation or cipher construction failed.
    #[error("vault crypto error: {0}")]
    Crypto(String),

    /// Reading or writing the vault file failed.
    #[error("vault I/O error: {0}")]
    Io(#[from] std::io::Error),
}
