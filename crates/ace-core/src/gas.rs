//! Gas metering
//!
//! Gas is the only admission control against unbounded execution. Costs
//! come from the static table in [`Opcode::gas_cost`]; bytes that are not
//! opcodes cost [`UNKNOWN_OPCODE_COST`] so a stray byte can never run for free.

use crate::opcode::Opcode;
use crate::{Error, Result};

/// Cost charged for a byte that is not a recognized opcode
pub const UNKNOWN_OPCODE_COST: u64 = 1;

/// Gas cost of the instruction whose opcode byte is `byte`
pub fn cost_of(byte: u8) -> u64 {
    match Opcode::try_from(byte) {
        Ok(op) => op.gas_cost(),
        Err(_) => UNKNOWN_OPCODE_COST,
    }
}

/// Cumulative gas usage against a fixed limit.
///
/// `used` never decreases and never exceeds `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasMeter {
    limit: u64,
    used: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        GasMeter { limit, used: 0 }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }

    /// Would charging `cost` stay within the limit?
    pub fn check(&self, cost: u64) -> bool {
        match self.used.checked_add(cost) {
            Some(total) => total <= self.limit,
            None => false,
        }
    }

    /// Charge `cost`, or fail without charging anything
    pub fn consume(&mut self, cost: u64) -> Result<()> {
        if !self.check(cost) {
            return Err(Error::InsufficientGas {
                required: self.used.saturating_add(cost),
                limit: self.limit,
            });
        }
        self.used += cost;
        Ok(())
    }
}
