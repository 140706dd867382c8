//! Symmetric Crypto Primitives
//!
//! AES-256-GCM sealing, HKDF-SHA256 key derivation and SHA-256 digests shared
//! by the snapshot manager and the field cipher.

use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{KitError, Result};

/// AES-256 key length in bytes
pub const KEY_LEN: usize = 32;

/// GCM nonce length in bytes
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;

const KDF_SALT: &[u8] = b"resource_kit/kdf/v1";

/// 256-bit key wiped from memory on drop.
pub type SecretKey = Zeroizing<[u8; KEY_LEN]>;

// == Key Material ==
/// Derives a 256-bit key from `secret`, domain-separated by `info`.
pub fn derive_key(secret: &[u8], info: &str) -> Result<SecretKey> {
    let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), secret);
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(info.as_bytes(), &mut key[..])
        .map_err(|e| KitError::Encryption(format!("HKDF-SHA256 expansion failed: {e}")))?;
    Ok(key)
}

/// Generates a random 256-bit key.
pub fn random_key() -> SecretKey {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    rand::rng().fill_bytes(&mut key[..]);
    key
}

/// Generates a fresh random nonce.
pub fn random_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}

// == AES-GCM ==
/// Encrypts `plaintext`, returning ciphertext with the tag appended.
pub fn seal(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key));
    cipher
        .encrypt(GenericArray::from_slice(nonce), plaintext)
        .map_err(|e| KitError::Encryption(format!("AES-GCM encryption failed: {e}")))
}

/// Decrypts and authenticates `ciphertext` (tag appended).
pub fn open(key: &[u8; KEY_LEN], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_LEN {
        return Err(KitError::Decryption(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce.len()
        )));
    }
    let cipher = Aes256Gcm::new(GenericArray::from_slice(key));
    cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| KitError::Decryption("authentication failed".to_string()))
}

/// Encrypts under a fresh nonce and returns `nonce || ciphertext || tag`.
pub fn seal_blob(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let nonce = random_nonce();
    let ciphertext = seal(key, &nonce, plaintext)?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Reverses [`seal_blob`].
pub fn open_blob(key: &[u8; KEY_LEN], blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(KitError::Decryption(format!(
            "sealed blob too short ({} bytes)",
            blob.len()
        )));
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
    open(key, nonce, ciphertext)
}

// == Hashing ==
/// Lowercase hex SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
