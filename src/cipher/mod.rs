//! Cipher Module
//!
//! Per-field encryption of flat records with versioned keys.

mod field;
mod field_cipher;
mod keyring;


pub use field::{looks_encrypted, EncryptedField};
pub use field_cipher::{FieldCipher, Record};
pub use keyring::KeyRing;
