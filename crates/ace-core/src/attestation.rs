//! Measurement and report interface
//!
//! The measurement is an identity value for this build of the engine: a
//! digest over the crate identity and the gas table, so any change to
//! opcode costs yields a different measurement. A [`Report`] pairs the
//! measurement with up to 64 bytes of caller data for an external
//! attestation authority. Nothing here performs a remote challenge or
//! hardware quoting; it only assembles the structure.
//!
//! # Report Layout
//!
//! ```text
//! magic "ACER" (4) | version u16 LE (2) | user data length u16 LE (2)
//! | measurement (32) | user data, zero padded (64)
//! ```

use std::sync::OnceLock;

use sha2::{Digest, Sha256};

use crate::buffer::copy_to_buffer;
use crate::opcode::Opcode;
use crate::{Error, Result, MAX_REPORT_DATA};

pub const MEASUREMENT_SIZE: usize = 32;

pub const REPORT_MAGIC: [u8; 4] = *b"ACER";
pub const REPORT_VERSION: u16 = 1;

/// Encoded report size
pub const REPORT_SIZE: usize = 4 + 2 + 2 + MEASUREMENT_SIZE + MAX_REPORT_DATA;

const MEASUREMENT_DOMAIN: &[u8] = b"ace/measurement/v1";

static MEASUREMENT: OnceLock<[u8; MEASUREMENT_SIZE]> = OnceLock::new();

/// The engine measurement; identical for every call within one build
pub fn measurement() -> [u8; MEASUREMENT_SIZE] {
    *MEASUREMENT.get_or_init(compute_measurement)
}

fn compute_measurement() -> [u8; MEASUREMENT_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(MEASUREMENT_DOMAIN);
    hasher.update(env!("CARGO_PKG_NAME").as_bytes());
    hasher.update(env!("CARGO_PKG_VERSION").as_bytes());
    for op in Opcode::ALL {
        hasher.update([op.byte()]);
        hasher.update(op.gas_cost().to_le_bytes());
    }
    hasher.finalize().into()
}

/// Measurement plus caller data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    measurement: [u8; MEASUREMENT_SIZE],
    user_data: [u8; MAX_REPORT_DATA],
    user_data_len: usize,
}

impl Report {
    /// Build a report for this engine embedding `user_data`.
    ///
    /// # Errors
    /// `InvalidInput` if `user_data` is longer than [`MAX_REPORT_DATA`].
    pub fn new(user_data: &[u8]) -> Result<Self> {
        if user_data.len() > MAX_REPORT_DATA {
            return Err(Error::InvalidInput(format!(
                "report user data of {} bytes exceeds maximum of {} bytes",
                user_data.len(),
                MAX_REPORT_DATA
            )));
        }
        let mut padded = [0u8; MAX_REPORT_DATA];
        padded[..user_data.len()].copy_from_slice(user_data);
        Ok(Report {
            measurement: measurement(),
            user_data: padded,
            user_data_len: user_data.len(),
        })
    }

    pub fn measurement(&self) -> &[u8; MEASUREMENT_SIZE] {
        &self.measurement
    }

    pub fn user_data(&self) -> &[u8] {
        &self.user_data[..self.user_data_len]
    }

    pub fn to_bytes(&self) -> [u8; REPORT_SIZE] {
        let mut out = [0u8; REPORT_SIZE];
        out[0..4].copy_from_slice(&REPORT_MAGIC);
        out[4..6].copy_from_slice(&REPORT_VERSION.to_le_bytes());
        out[6..8].copy_from_slice(&(self.user_data_len as u16).to_le_bytes());
        out[8..40].copy_from_slice(&self.measurement);
        out[40..].copy_from_slice(&self.user_data);
        out
    }

    /// Parse an encoded report
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != REPORT_SIZE {
            return Err(Error::InvalidInput(format!(
                "report must be {} bytes, got {}",
                REPORT_SIZE,
                bytes.len()
            )));
        }
        if bytes[0..4] != REPORT_MAGIC {
            return Err(Error::InvalidInput("bad report magic".into()));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != REPORT_VERSION {
            return Err(Error::InvalidInput(format!(
                "unsupported report version {}",
                version
            )));
        }
        let user_data_len = u16::from_le_bytes([bytes[6], bytes[7]]) as usize;
        if user_data_len > MAX_REPORT_DATA {
            return Err(Error::InvalidInput(format!(
                "report user data length {} exceeds {}",
                user_data_len, MAX_REPORT_DATA
            )));
        }
        if bytes[40 + user_data_len..].iter().any(|&b| b != 0) {
            return Err(Error::InvalidInput("non-zero report padding".into()));
        }

        let mut measurement = [0u8; MEASUREMENT_SIZE];
        measurement.copy_from_slice(&bytes[8..40]);
        let mut user_data = [0u8; MAX_REPORT_DATA];
        user_data.copy_from_slice(&bytes[40..]);
        Ok(Report {
            measurement,
            user_data,
            user_data_len,
        })
    }

    /// Write the encoded report into a caller buffer
    pub fn write_to(&self, buf: &mut [u8]) -> Result<usize> {
        copy_to_buffer(buf, &self.to_bytes())
    }
}
