//! Key Ring
//!
//! Versioned field keys. One version is active for new encryptions; every
//! retained version stays available for decryption.

use std::collections::BTreeMap;

use rand::RngCore;
use zeroize::Zeroizing;

use crate::crypto::{self, SecretKey, KEY_LEN};
use crate::error::{KitError, Result};

/// Master secret the versioned keys are derived from.
type MasterSecret = Zeroizing<Vec<u8>>;

fn version_info(version: u32) -> String {
    format!("resource_kit/field-cipher/v{version}")
}

pub struct KeyRing {
    keys: BTreeMap<u32, SecretKey>,
    active: u32,
    master: Option<MasterSecret>,
}

impl KeyRing {
    /// Key ring whose versions are all derived from `passphrase`, starting at v1.
    ///
    /// Rebuilding from the same passphrase and rotating the same number of
    /// times reproduces the same keys.
    pub fn from_passphrase(passphrase: &str) -> Result<Self> {
        Self::from_master(Zeroizing::new(passphrase.as_bytes().to_vec()))
    }

    /// Key ring derived from `passphrase` with versions 1 through `active`,
    /// the last one active.
    ///
    /// Equivalent to [`from_passphrase`](Self::from_passphrase) followed by
    /// `active - 1` rotations, so a restarted process can pick up where a
    /// rotated one left off.
    ///
    /// # Errors
    /// - `InvalidRequest` if `active` is 0
    pub fn from_passphrase_at(passphrase: &str, active: u32) -> Result<Self> {
        if active == 0 {
            return Err(KitError::InvalidRequest(
                "key versions start at 1".to_string(),
            ));
        }
        let mut ring = Self::from_passphrase(passphrase)?;
        while ring.active < active {
            ring.rotate()?;
        }
        Ok(ring)
    }

    /// Key ring derived from a fresh random master secret.
    pub fn generate() -> Result<Self> {
        let mut master = Zeroizing::new(vec![0u8; KEY_LEN]);
        rand::rng().fill_bytes(&mut master[..]);
        Self::from_master(master)
    }

    fn from_master(master: MasterSecret) -> Result<Self> {
        let first = crypto::derive_key(&master, &version_info(1))?;
        Ok(Self {
            keys: BTreeMap::from([(1, first)]),
            active: 1,
            master: Some(master),
        })
    }

    /// Key ring over explicit keys. Rotation then draws random keys.
    ///
    /// # Errors
    /// - `InvalidRequest` if `active` is not one of `keys`
    pub fn from_keys(keys: impl IntoIterator<Item = (u32, SecretKey)>, active: u32) -> Result<Self> {
        let keys: BTreeMap<u32, SecretKey> = keys.into_iter().collect();
        if !keys.contains_key(&active) {
            return Err(KitError::InvalidRequest(format!(
                "active key version {active} is not in the key ring"
            )));
        }
        Ok(Self {
            keys,
            active,
            master: None,
        })
    }

    // == Lookup ==
    pub fn active_version(&self) -> u32 {
        self.active
    }

    /// Active version and its key.
    pub fn active(&self) -> (u32, &SecretKey) {
        // `active` is always present: every mutation below preserves it
        (self.active, &self.keys[&self.active])
    }

    pub fn get(&self, version: u32) -> Option<&SecretKey> {
        self.keys.get(&version)
    }

    /// Retained versions in ascending order.
    pub fn versions(&self) -> Vec<u32> {
        self.keys.keys().copied().collect()
    }

    // == Rotation ==
    /// Adds a new version and makes it active. Returns the new version.
    pub fn rotate(&mut self) -> Result<u32> {
        let next = self
            .keys
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0)
            .checked_add(1)
            .ok_or_else(|| KitError::Internal("key version space exhausted".to_string()))?;

        let key = match &self.master {
            Some(master) => crypto::derive_key(master, &version_info(next))?,
            None => crypto::random_key(),
        };
        self.keys.insert(next, key);
        self.active = next;
        Ok(next)
    }

    /// Drops an old version once nothing is encrypted under it.
    ///
    /// Returns whether the version was present.
    ///
    /// # Errors
    /// - `InvalidRequest` when asked to retire the active version
    pub fn retire(&mut self, version: u32) -> Result<bool> {
        if version == self.active {
            return Err(KitError::InvalidRequest(format!(
                "cannot retire active key version {version}"
            )));
        }
        Ok(self.keys.remove(&version).is_some())
    }
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing")
            .field("versions", &self.versions())
            .field("active", &self.active)
            .field("derived", &self.master.is_some())
            .finish()
    }
}
