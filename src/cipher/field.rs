//! Encrypted Field Encoding
//!
//! A field value is stored as `v<version>:<base64 iv>:<base64 ciphertext>`,
//! where the ciphertext carries the GCM tag.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::crypto::{NONCE_LEN, TAG_LEN};
use crate::error::KitError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedField {
    /// Key version that produced the ciphertext
    pub key_version: u32,
    /// Per-encryption random IV
    pub iv: [u8; NONCE_LEN],
    /// Ciphertext with the authentication tag appended
    pub ciphertext: Vec<u8>,
}

impl fmt::Display for EncryptedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{}:{}:{}",
            self.key_version,
            STANDARD.encode(self.iv),
            STANDARD.encode(&self.ciphertext)
        )
    }
}

impl FromStr for EncryptedField {
    type Err = KitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| KitError::Decryption(format!("malformed field value: {reason}"));

        let mut parts = s.splitn(3, ':');
        let (Some(version), Some(iv), Some(ciphertext)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed("expected three ':'-separated parts"));
        };

        let key_version = version
            .strip_prefix('v')
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(|| malformed("bad key version"))?;

        let iv: [u8; NONCE_LEN] = STANDARD
            .decode(iv)
            .map_err(|_| malformed("iv is not base64"))?
            .try_into()
            .map_err(|_| malformed("iv has the wrong length"))?;

        let ciphertext = STANDARD
            .decode(ciphertext)
            .map_err(|_| malformed("ciphertext is not base64"))?;
        if ciphertext.len() < TAG_LEN {
            return Err(malformed("ciphertext is shorter than its tag"));
        }

        Ok(Self {
            key_version,
            iv,
            ciphertext,
        })
    }
}

/// True when `s` parses as an encrypted field.
pub fn looks_encrypted(s: &str) -> bool {
    s.parse::<EncryptedField>().is_ok()
}
