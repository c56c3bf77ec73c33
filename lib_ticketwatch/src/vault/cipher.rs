//! # Vault Cipher
//!
//! Argon2id turns `(password, salt)` into a 256-bit key; AES-256-GCM seals the
//! serialized credentials with that key and a fresh 96-bit nonce. Derivation is
//! deterministic, so opening a file only needs the password and the salt stored
//! in the file header.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use super::VaultError;

/// Salt length at the head of the vault file.
pub const SALT_LEN: usize = 16;
/// AES-GCM nonce length, directly after the salt.
pub const NONCE_LEN: usize = 12;
/// Derived key length (AES-256).
pub const KEY_LEN: usize = 32;

/// # Key Derivation Parameters
///
/// Argon2id costs. The default matches the hardened production setting
/// (64 MiB, one pass, four lanes); tests use [`KdfParams::new`] with much
/// smaller numbers to stay fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism (lanes).
    pub parallelism: u32,
}

impl KdfParams {
    pub const fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Self {
        Self {
            memory_kib,
            iterations,
            parallelism,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::new(64 * 1024, 1, 4)
    }
}

/// Derives the 32-byte AES key from a password and salt using Argon2id.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<[u8; KEY_LEN], VaultError> {
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_LEN),
    )
    .map_err(|e| VaultError::Crypto(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, salt, &mut key)
        .map_err(|e| VaultError::Crypto(format!("Argon2 failed: {e}")))?;
    Ok(key)
}

/// Encrypts `plaintext` under `password`, returning the complete file body
/// `salt ‖ nonce ‖ ciphertext+tag`.
pub fn seal(plaintext: &[u8], password: &[u8], params: &KdfParams) -> Result<Vec<u8>, VaultError> {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);

    let key = derive_key(password, &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| VaultError::Crypto(format!("invalid key: {e}")))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| VaultError::Crypto(format!("encryption failed: {e}")))?;

    let mut output = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    output.extend_from_slice(&salt);
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Splits a vault file body and decrypts it with a key derived from `password`.
///
/// A file shorter than the header is a [`VaultError::Format`]; a tag mismatch
/// is always [`VaultError::Authentication`].
pub fn open(data: &[u8], password: &[u8], params: &KdfParams) -> Result<Vec<u8>, VaultError> {
    if data.len() < SALT_LEN + NONCE_LEN {
        return Err(VaultError::Format(format!(
            "file too short: {} bytes, header needs {}",
            data.len(),
            SALT_LEN + NONCE_LEN
        )));
    }

    let (salt, rest) = data.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(password, salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| VaultError::Crypto(format!("invalid key: {e}")))?;

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| VaultError::Authentication)
}
