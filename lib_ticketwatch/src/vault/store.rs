//! # Credential Vault Store
//!
//! The single owner of the API credentials. The credential triple and the
//! vault file path live behind one read/write lock: readers (the poll loop,
//! the web layer's "are we unlocked?" checks) share it, while setting or
//! decrypting credentials takes it exclusively.

use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::cipher::{self, KdfParams};
use super::{Credentials, VaultError};

struct VaultState {
    credentials: Credentials,
    path: PathBuf,
}

/// # Credential Vault
///
/// Holds the credential triple in memory and reads/writes its encrypted form
/// at a configured path. Shared across tasks as `Arc<CredentialVault>`.
pub struct CredentialVault {
    state: RwLock<VaultState>,
    kdf: KdfParams,
}

impl CredentialVault {
    /// Creates an empty vault backed by `path` with hardened KDF costs.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_params(path, KdfParams::default())
    }

    /// Creates an empty vault with explicit KDF costs.
    pub fn with_params(path: impl Into<PathBuf>, kdf: KdfParams) -> Self {
        Self {
            state: RwLock::new(VaultState {
                credentials: Credentials::default(),
                path: path.into(),
            }),
            kdf,
        }
    }

    /// Stores the triple in memory. Field validation is the caller's job.
    pub fn set_credentials(
        &self,
        username: impl Into<String>,
        integration_code: impl Into<String>,
        secret: impl Into<String>,
    ) {
        let mut state = self.state.write();
        state.credentials = Credentials::new(username, integration_code, secret);
    }

    /// True iff all three credential fields are non-empty.
    pub fn credentials_loaded(&self) -> bool {
        self.state.read().credentials.is_complete()
    }

    /// A copy of the current credentials, for handing to the ticket source.
    pub fn credentials(&self) -> Credentials {
        self.state.read().credentials.clone()
    }

    /// Whether an encrypted vault file exists at the configured path.
    pub fn encrypted_file_present(&self) -> bool {
        self.state.read().path.exists()
    }

    pub fn path(&self) -> PathBuf {
        self.state.read().path.clone()
    }

    /// # Encrypt To Disk
    ///
    /// Serializes the in-memory credentials, seals them under `password` with a
    /// fresh salt and nonce, and replaces the vault file.
    ///
    /// The new content goes to a temporary file in the same directory which is
    /// then renamed over the target, so a concurrent or later read sees either
    /// the old file or the new one.
    ///
    /// The lock is held only to copy the credentials and path; key derivation
    /// and the write run without it.
    pub fn encrypt_to_disk(&self, password: &[u8]) -> Result<(), VaultError> {
        let (credentials, path) = {
            let state = self.state.read();
            (state.credentials.clone(), state.path.clone())
        };

        let plaintext = serde_json::to_vec(&credentials)
            .map_err(|e| VaultError::Crypto(format!("serialize credentials: {e}")))?;
        let sealed = cipher::seal(&plaintext, password, &self.kdf)?;

        write_atomically(&path, &sealed)?;
        info!(path = %path.display(), "Encrypted credentials written to disk");
        Ok(())
    }

    /// # Decrypt From Disk
    ///
    /// Reads the vault file, derives the key from `password` and the stored
    /// salt, and opens the sealed payload. Only a fully verified and parsed
    /// payload replaces the in-memory credentials; any error leaves them as
    /// they were.
    pub fn decrypt_from_disk(&self, password: &[u8]) -> Result<(), VaultError> {
        let path = self.path();
        let data = std::fs::read(&path)?;

        let plaintext = cipher::open(&data, password, &self.kdf)?;
        let credentials: Credentials = serde_json::from_slice(&plaintext)
            .map_err(|e| VaultError::Format(format!("credential document: {e}")))?;

        self.state.write().credentials = credentials;
        debug!(path = %path.display(), "Credentials decrypted from disk");
        Ok(())
    }
}

fn write_atomically(path: &Path, data: &[u8]) -> Result<(), VaultError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    // NamedTempFile is created owner-only (0600) on unix.
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| VaultError::Io(e.error))?;
    Ok(())
}
