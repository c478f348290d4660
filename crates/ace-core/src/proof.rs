//! Execution proofs
//!
//! A proof binds a fingerprint to a timestamp and a fresh nonce, signed by
//! an ed25519 keypair generated for that proof alone. Keys are never
//! reused across proofs.
//!
//! # Wire Format
//!
//! ```text
//! fingerprint (32) | timestamp u64 LE (8) | nonce (16) | public key (32) | signature (64)
//! ```
//!
//! The signature covers the first 88 bytes.

use std::time::{SystemTime, UNIX_EPOCH};

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::buffer::copy_to_buffer;
use crate::fingerprint::Fingerprint;
use crate::{Error, Result, FINGERPRINT_SIZE, NONCE_SIZE};

pub const PUBLIC_KEY_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;

/// Length of the signed prefix of the wire format
pub const SIGNED_PAYLOAD_SIZE: usize = FINGERPRINT_SIZE + 8 + NONCE_SIZE + PUBLIC_KEY_SIZE;

/// Total encoded proof size
pub const PROOF_SIZE: usize = SIGNED_PAYLOAD_SIZE + SIGNATURE_SIZE;

/// A signed statement that an execution produced `fingerprint`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionProof {
    fingerprint: Fingerprint,
    timestamp: u64,
    nonce: [u8; NONCE_SIZE],
    public_key: [u8; PUBLIC_KEY_SIZE],
    signature: [u8; SIGNATURE_SIZE],
}

impl ExecutionProof {
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Seconds since the Unix epoch at signing time
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.public_key
    }

    pub fn signature(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.signature
    }

    /// The bytes covered by the signature
    pub fn signed_payload(&self) -> [u8; SIGNED_PAYLOAD_SIZE] {
        signed_payload(
            &self.fingerprint,
            self.timestamp,
            &self.nonce,
            &self.public_key,
        )
    }

    pub fn to_bytes(&self) -> [u8; PROOF_SIZE] {
        let mut out = [0u8; PROOF_SIZE];
        out[..SIGNED_PAYLOAD_SIZE].copy_from_slice(&self.signed_payload());
        out[SIGNED_PAYLOAD_SIZE..].copy_from_slice(&self.signature);
        out
    }

    /// Parse the 152-byte wire format. Does not check the signature.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PROOF_SIZE {
            return Err(Error::InvalidInput(format!(
                "proof must be {} bytes, got {}",
                PROOF_SIZE,
                bytes.len()
            )));
        }
        let (fp, rest) = bytes.split_at(FINGERPRINT_SIZE);
        let (ts, rest) = rest.split_at(8);
        let (nonce, rest) = rest.split_at(NONCE_SIZE);
        let (public_key, signature) = rest.split_at(PUBLIC_KEY_SIZE);

        Ok(ExecutionProof {
            fingerprint: Fingerprint::from_bytes(array(fp)),
            timestamp: u64::from_le_bytes(array(ts)),
            nonce: array(nonce),
            public_key: array(public_key),
            signature: array(signature),
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| Error::InvalidInput(format!("invalid proof hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Write the wire format into a caller buffer
    pub fn write_to(&self, buf: &mut [u8]) -> Result<usize> {
        copy_to_buffer(buf, &self.to_bytes())
    }
}

fn signed_payload(
    fingerprint: &Fingerprint,
    timestamp: u64,
    nonce: &[u8; NONCE_SIZE],
    public_key: &[u8; PUBLIC_KEY_SIZE],
) -> [u8; SIGNED_PAYLOAD_SIZE] {
    let mut payload = [0u8; SIGNED_PAYLOAD_SIZE];
    let mut at = 0;
    for part in [
        &fingerprint.as_bytes()[..],
        &timestamp.to_le_bytes()[..],
        &nonce[..],
        &public_key[..],
    ] {
        payload[at..at + part.len()].copy_from_slice(part);
        at += part.len();
    }
    payload
}

/// Copy a slice whose length is already known to be `N`
fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

fn fill_random(dest: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(dest)
        .map_err(|e| Error::CryptoFailure(format!("random source failed: {}", e)))
}

fn unix_timestamp() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| Error::CryptoFailure(format!("system clock before unix epoch: {}", e)))
}

/// Sign `fingerprint` with a freshly generated keypair.
///
/// # Errors
/// `CryptoFailure` if the random source or the system clock is unavailable.
pub fn generate_proof(fingerprint: &Fingerprint) -> Result<ExecutionProof> {
    let mut seed = Zeroizing::new([0u8; 32]);
    fill_random(&mut seed[..])?;
    let signing_key = SigningKey::from_bytes(&seed);

    let mut nonce = [0u8; NONCE_SIZE];
    fill_random(&mut nonce)?;
    let timestamp = unix_timestamp()?;
    let public_key = signing_key.verifying_key().to_bytes();

    let payload = signed_payload(fingerprint, timestamp, &nonce, &public_key);
    let signature = signing_key.sign(&payload).to_bytes();

    log::debug!("generated proof for fingerprint {}", fingerprint);
    Ok(ExecutionProof {
        fingerprint: *fingerprint,
        timestamp,
        nonce,
        public_key,
        signature,
    })
}

/// Check `proof` against the fingerprint the caller expects.
///
/// Returns `false` for a mismatched fingerprint, a malformed public key or
/// a bad signature alike; the reason is not reported.
pub fn verify_proof(proof: &ExecutionProof, expected: &Fingerprint) -> bool {
    if proof.fingerprint != *expected {
        return false;
    }
    let Ok(verifying_key) = VerifyingKey::from_bytes(&proof.public_key) else {
        return false;
    };
    let signature = Signature::from_bytes(&proof.signature);
    verifying_key
        .verify_strict(&proof.signed_payload(), &signature)
        .is_ok()
}
