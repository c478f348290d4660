//! Execution fingerprint
//!
//! Binds code, input, output and gas into one SHA-256 digest. Stages are
//! folded into a running hash in fixed order:
//!
//! 1. `SHA-256(code)`
//! 2. `SHA-256(input)`, only when input is non-empty
//! 3. raw output bytes, only when output is non-empty
//! 4. `gas_used` as 8 little-endian bytes

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::context::ExecutionContext;
use crate::{Error, Result, FINGERPRINT_SIZE};

/// A 32-byte execution fingerprint
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(#[serde(with = "hex::serde")] [u8; FINGERPRINT_SIZE]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; FINGERPRINT_SIZE]) -> Self {
        Fingerprint(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = [0u8; FINGERPRINT_SIZE];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|e| Error::InvalidInput(format!("invalid fingerprint hex: {}", e)))?;
        Ok(Fingerprint(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Fingerprint::from_hex(s)
    }
}

/// Fingerprint of an explicit `(code, input, output, gas_used)` tuple
pub fn compute(code: &[u8], input: &[u8], output: &[u8], gas_used: u64) -> Fingerprint {
    let mut hasher = Sha256::new();

    let code_digest = Sha256::digest(code);
    hasher.update(code_digest);

    if !input.is_empty() {
        let input_digest = Sha256::digest(input);
        hasher.update(input_digest);
    }

    if !output.is_empty() {
        hasher.update(output);
    }

    hasher.update(gas_used.to_le_bytes());

    Fingerprint(hasher.finalize().into())
}

/// Fingerprint of a context's code, input, output and gas
pub fn fingerprint(context: &ExecutionContext<'_>) -> Fingerprint {
    compute(
        context.code(),
        context.input(),
        context.output(),
        context.gas_used(),
    )
}
