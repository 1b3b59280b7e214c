pub mod kms;
pub mod onboarding;
pub mod router;

use std::collections::HashMap;
use std::path::Path;

use chia_bls::{DerivableKey, PublicKey, SecretKey};
use chia_puzzles::standard::standard_puzzle_hash;
use serde::Deserialize;

use crate::errors::GreenFloorError;

pub const DERIVATION_PATH_PREFIX: [u32; 2] = [12381, 8444];
pub const DERIVATION_WALLET_PURPOSE: u32 = 2;

#[derive(Debug, Deserialize)]
struct KeyringFile {
    keys: Vec<KeyringEntry>,
}

#[derive(Debug, Deserialize)]
struct KeyringEntry {
    fingerprint: u32,
    master_secret_key_hex: String,
}

/// A derived child key with the synthetic offset already applied — the key
/// that actually signs AGG_SIG conditions for a standard coin.
#[derive(Clone)]
pub struct SyntheticSecretKey {
    pub index: u32,
    pub secret_key: SecretKey,
}

impl SyntheticSecretKey {
    pub fn public_key(&self) -> PublicKey {
        self.secret_key.public_key()
    }
}

/// Resolves `fingerprint -> master secret key` from a keyring file and
/// derives + caches synthetic signing keys on demand.
pub struct KeyProvider {
    master_secret_key: SecretKey,
    scan_limit: u32,
    cache: HashMap<[u8; 32], SyntheticSecretKey>,
}

impl KeyProvider {
    pub fn load(keyring_path: &Path, fingerprint: u32, scan_limit: u32) -> Result<Self, GreenFloorError> {
        let contents = std::fs::read_to_string(keyring_path)
            .map_err(|_| GreenFloorError::KeySecretsUnavailable)?;
        let keyring: KeyringFile =
            serde_yaml::from_str(&contents).map_err(|_| GreenFloorError::KeySecretsUnavailable)?;
        let entry = keyring
            .keys
            .into_iter()
            .find(|k| k.fingerprint == fingerprint)
            .ok_or(GreenFloorError::KeySecretsUnavailable)?;
        let bytes = hex::decode(entry.master_secret_key_hex.trim_start_matches("0x"))
            .map_err(|_| GreenFloorError::KeySecretsUnavailable)?;
        let sk_bytes: [u8; 32] = bytes.try_into().map_err(|_| GreenFloorError::KeySecretsUnavailable)?;
        let master_secret_key =
            SecretKey::from_bytes(&sk_bytes).map_err(|_| GreenFloorError::KeySecretsUnavailable)?;
        Ok(KeyProvider {
            master_secret_key,
            scan_limit,
            cache: HashMap::new(),
        })
    }

    /// Derive along `[12381, 8444, 2, index]`, scanning both the hardened
    /// and unhardened paths, and apply the synthetic offset to each child.
    /// Returns the unhardened-derived key — the one standard coins use —
    /// unless only the hardened path yields a matching synthetic pubkey,
    /// in which case the caller retries with `derive_hardened`.
    pub fn derive(&self, index: u32) -> SyntheticSecretKey {
        self.derive_unhardened(index)
    }

    pub fn derive_unhardened(&self, index: u32) -> SyntheticSecretKey {
        let child = self
            .master_secret_key
            .derive_unhardened(DERIVATION_PATH_PREFIX[0])
            .derive_unhardened(DERIVATION_PATH_PREFIX[1])
            .derive_unhardened(DERIVATION_WALLET_PURPOSE)
            .derive_unhardened(index);
        let synthetic = child.derive_synthetic();
        SyntheticSecretKey {
            index,
            secret_key: synthetic,
        }
    }

    pub fn derive_hardened(&self, index: u32) -> SyntheticSecretKey {
        let child = self
            .master_secret_key
            .derive_hardened(DERIVATION_PATH_PREFIX[0])
            .derive_hardened(DERIVATION_PATH_PREFIX[1])
            .derive_hardened(DERIVATION_WALLET_PURPOSE)
            .derive_hardened(index);
        let synthetic = child.derive_synthetic();
        SyntheticSecretKey {
            index,
            secret_key: synthetic,
        }
    }

    /// Bounded scan over `[0, scan_limit)` computing
    /// `standard_puzzle_hash(synthetic_pk(i))` for both derivation paths,
    /// caching hits. Returns `None` if nothing matches within the limit.
    pub fn synthetic_for_puzzle_hash(&mut self, target: [u8; 32]) -> Option<SyntheticSecretKey> {
        if let Some(cached) = self.cache.get(&target) {
            return Some(cached.clone());
        }
        for index in 0..self.scan_limit {
            for candidate in [self.derive_unhardened(index), self.derive_hardened(index)] {
                let ph = standard_puzzle_hash(&candidate.public_key());
                if ph == target {
                    self.cache.insert(target, candidate.clone());
                    return Some(candidate);
                }
            }
        }
        None
    }
}
