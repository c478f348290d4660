//! Storage collaborator interface
//!
//! The key-value store lives outside the trusted boundary. The engine
//! treats it as an untrusted oracle: values are sealed with an
//! HMAC-SHA256 tag before they are written and the tag is checked on every
//! read, so a value altered or moved to another key by the store is
//! rejected with [`StorageError::IntegrityViolation`].
//!
//! Sealing covers integrity only. Values are not encrypted and stale
//! values written earlier under the same key are not detected.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Largest accepted key
pub const MAX_KEY_SIZE: usize = 256;

/// Largest accepted value, before sealing
pub const MAX_VALUE_SIZE: usize = 4096;

/// Bytes appended to every sealed value
pub const TAG_SIZE: usize = 32;

const SEAL_DOMAIN: &[u8] = b"ace/storage-seal/v1";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("key not found")]
    NotFound,

    #[error("storage backend failure: {0}")]
    Backend(String),

    #[error("stored value failed integrity check")]
    IntegrityViolation,

    #[error("key of {0} bytes exceeds maximum of {} bytes", MAX_KEY_SIZE)]
    KeyTooLarge(usize),

    #[error("value of {0} bytes exceeds maximum of {} bytes", MAX_VALUE_SIZE)]
    ValueTooLarge(usize),
}

/// Untrusted key-value store
///
/// Implemented by the host; the engine only defines the interface.
pub trait StateStore {
    /// Read the value stored under `key`, or [`StorageError::NotFound`]
    fn read(&self, key: &[u8]) -> Result<Vec<u8>, StorageError>;

    /// Store `value` under `key`, replacing any previous value
    fn write(&mut self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Remove `key`; returns whether it existed
    fn delete(&mut self, key: &[u8]) -> Result<bool, StorageError>;
}

/// In-memory store for tests and the CLI
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw access to a stored value, bypassing the trait
    pub fn raw_mut(&mut self, key: &[u8]) -> Option<&mut Vec<u8>> {
        self.entries.get_mut(key)
    }
}

impl StateStore for InMemoryStore {
    fn read(&self, key: &[u8]) -> Result<Vec<u8>, StorageError> {
        self.entries.get(key).cloned().ok_or(StorageError::NotFound)
    }

    fn write(&mut self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.entries.remove(key).is_some())
    }
}

// ── Sealing ───────────────────────────────────────────────

fn check_limits(key: &[u8], value_len: usize) -> Result<(), StorageError> {
    if key.len() > MAX_KEY_SIZE {
        return Err(StorageError::KeyTooLarge(key.len()));
    }
    if value_len > MAX_VALUE_SIZE {
        return Err(StorageError::ValueTooLarge(value_len));
    }
    Ok(())
}

fn seal_tag(
    master_key: &[u8; 32],
    key: &[u8],
    value: &[u8],
) -> Result<[u8; TAG_SIZE], StorageError> {
    let mut mac = HmacSha256::new_from_slice(master_key)
        .map_err(|e| StorageError::Backend(format!("seal key rejected: {}", e)))?;
    mac.update(SEAL_DOMAIN);
    mac.update(&(key.len() as u64).to_le_bytes());
    mac.update(key);
    mac.update(&(value.len() as u64).to_le_bytes());
    mac.update(value);
    Ok(mac.finalize().into_bytes().into())
}

/// `value ‖ tag` for writing under `key`
pub fn seal(master_key: &[u8; 32], key: &[u8], value: &[u8]) -> Result<Vec<u8>, StorageError> {
    check_limits(key, value.len())?;
    let mut sealed = Vec::with_capacity(value.len() + TAG_SIZE);
    sealed.extend_from_slice(value);
    sealed.extend_from_slice(&seal_tag(master_key, key, value)?);
    Ok(sealed)
}

/// Check and strip the tag of a value read back from `key`
pub fn unseal(master_key: &[u8; 32], key: &[u8], sealed: &[u8]) -> Result<Vec<u8>, StorageError> {
    if sealed.len() < TAG_SIZE {
        return Err(StorageError::IntegrityViolation);
    }
    let (value, tag) = sealed.split_at(sealed.len() - TAG_SIZE);
    check_limits(key, value.len()).map_err(|_| StorageError::IntegrityViolation)?;

    let expected = seal_tag(master_key, key, value)?;
    if !bool::from(expected[..].ct_eq(tag)) {
        return Err(StorageError::IntegrityViolation);
    }
    Ok(value.to_vec())
}
