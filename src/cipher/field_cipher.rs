//! Field Cipher
//!
//! Encrypts and decrypts named string fields of a flat JSON record, with key
//! rotation that keeps older ciphertexts readable.

use serde_json::Value;
use tracing::info;

use crate::cipher::field::EncryptedField;
use crate::cipher::keyring::KeyRing;
use crate::crypto;
use crate::error::{KitError, Result};

/// Flat record whose fields are encrypted in place.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug)]
pub struct FieldCipher {
    keys: KeyRing,
}

impl FieldCipher {
    pub fn new(keys: KeyRing) -> Self {
        Self { keys }
    }

    /// Cipher with keys derived from `passphrase`.
    pub fn from_passphrase(passphrase: &str) -> Result<Self> {
        KeyRing::from_passphrase(passphrase).map(Self::new)
    }

    /// Cipher with versions 1 through `active` derived from `passphrase`.
    pub fn from_passphrase_at(passphrase: &str, active: u32) -> Result<Self> {
        KeyRing::from_passphrase_at(passphrase, active).map(Self::new)
    }

    /// Cipher with keys derived from a random master secret.
    pub fn generate() -> Result<Self> {
        KeyRing::generate().map(Self::new)
    }

    pub fn active_version(&self) -> u32 {
        self.keys.active_version()
    }

    pub fn known_versions(&self) -> Vec<u32> {
        self.keys.versions()
    }

    // == Single Values ==
    /// Encrypts one string under the active key with a fresh IV.
    pub fn encrypt_value(&self, plaintext: &str) -> Result<String> {
        let (key_version, key) = self.keys.active();
        let iv = crypto::random_nonce();
        let ciphertext = crypto::seal(key, &iv, plaintext.as_bytes())?;

        Ok(EncryptedField {
            key_version,
            iv,
            ciphertext,
        }
        .to_string())
    }

    /// Decrypts one encoded value with the key version it names.
    ///
    /// # Errors
    /// - `Decryption` if the value is malformed, the version is unknown or
    ///   authentication fails
    pub fn decrypt_value(&self, encoded: &str) -> Result<String> {
        let field: EncryptedField = encoded.parse()?;
        self.open_field(&field)
    }

    fn open_field(&self, field: &EncryptedField) -> Result<String> {
        let key = self.keys.get(field.key_version).ok_or_else(|| {
            KitError::Decryption(format!("unknown key version {}", field.key_version))
        })?;
        let plaintext = crypto::open(key, &field.iv, &field.ciphertext)?;
        String::from_utf8(plaintext)
            .map_err(|_| KitError::Decryption("plaintext is not valid UTF-8".to_string()))
    }

    // == Records ==
    /// Returns `record` with each listed, present field encrypted.
    ///
    /// Unlisted fields and `null` values pass through. Listed fields that are
    /// absent stay absent.
    ///
    /// # Errors
    /// - `InvalidRequest` if a listed field holds a non-string value
    pub fn encrypt_fields<S: AsRef<str>>(&self, record: &Record, fields: &[S]) -> Result<Record> {
        let mut out = record.clone();
        for name in fields {
            let name = name.as_ref();
            match out.get_mut(name) {
                Some(Value::String(text)) => *text = self.encrypt_value(text)?,
                Some(Value::Null) | None => {}
                Some(other) => {
                    return Err(KitError::InvalidRequest(format!(
                        "field `{name}` holds a {} value, expected a string",
                        json_kind(other)
                    )))
                }
            }
        }
        Ok(out)
    }

    /// Inverse of [`encrypt_fields`](Self::encrypt_fields).
    ///
    /// # Errors
    /// - `Decryption` if a listed field is not a valid encrypted value or
    ///   names an unknown key version
    pub fn decrypt_fields<S: AsRef<str>>(&self, record: &Record, fields: &[S]) -> Result<Record> {
        let mut out = record.clone();
        for name in fields {
            let name = name.as_ref();
            match out.get_mut(name) {
                Some(Value::String(encoded)) => {
                    *encoded = self
                        .decrypt_value(encoded)
                        .map_err(|e| with_field(name, e))?
                }
                Some(Value::Null) | None => {}
                Some(other) => {
                    return Err(KitError::Decryption(format!(
                        "field `{name}` holds a {} value, expected an encrypted string",
                        json_kind(other)
                    )))
                }
            }
        }
        Ok(out)
    }

    // == Rotation ==
    /// Makes a new key version active. Older versions keep decrypting.
    pub fn rotate_key(&mut self) -> Result<u32> {
        let version = self.keys.rotate()?;
        info!(version, "Field cipher key rotated");
        Ok(version)
    }

    /// Drops a key version. Values still encrypted under it become unreadable.
    pub fn retire_key(&mut self, version: u32) -> Result<bool> {
        self.keys.retire(version)
    }

    /// Re-encrypts listed fields that are not under the active key version.
    ///
    /// Returns the updated record and the number of fields re-encrypted.
    pub fn migrate_fields<S: AsRef<str>>(
        &self,
        record: &Record,
        fields: &[S],
    ) -> Result<(Record, usize)> {
        let active = self.active_version();
        let mut out = record.clone();
        let mut migrated = 0;

        for name in fields {
            let name = name.as_ref();
            let Some(Value::String(encoded)) = out.get_mut(name) else {
                continue;
            };
            let field: EncryptedField = encoded.parse().map_err(|e| with_field(name, e))?;
            if field.key_version == active {
                continue;
            }
            let plaintext = self.open_field(&field).map_err(|e| with_field(name, e))?;
            *encoded = self.encrypt_value(&plaintext)?;
            migrated += 1;
        }
        Ok((out, migrated))
    }
}

fn with_field(name: &str, err: KitError) -> KitError {
    match err {
        KitError::Decryption(msg) => KitError::Decryption(format!("field `{name}`: {msg}")),
        other => other,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
