//! # Credential Vault Module
//!
//! Keeps the Autotask API credential triple in memory and persists it to disk
//! encrypted under a user-supplied password.
//!
//! ## File Layout
//!
//! `salt (16) ‖ nonce (12) ‖ ciphertext ‖ tag (16)`
//!
//! The key is derived with Argon2id from the password and the stored salt, and
//! the payload is sealed with AES-256-GCM. There is no stored password hash:
//! a wrong password and a tampered file both surface as
//! [`VaultError::Authentication`] when the tag fails to verify.
//!
//! ## Contained Modules:
//! - **`credentials`**: the in-memory triple.
//! - **`cipher`**: key derivation and seal/open over the file layout.
//! - **`store`**: the lock-guarded [`CredentialVault`] and its disk I/O.

/// The in-memory credential triple.
pub mod credentials;
/// Argon2id key derivation and AES-256-GCM sealing.
pub mod cipher;
/// Thread-safe vault owning the credentials and the encrypted file path.
pub mod store;

mod error;

pub use cipher::{KdfParams, NONCE_LEN, SALT_LEN};
pub use credentials::Credentials;
pub use error::VaultError;
pub use store::CredentialVault;
