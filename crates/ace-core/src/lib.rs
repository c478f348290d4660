//! ACE Core - Attested Contract Engine
//!
//! Runs small bytecode contracts on a metered stack machine and produces
//! a signed proof that a specific program, given a specific input,
//! produced a specific output within a bounded gas budget.
//! All bindings (CLI, C ABI) call into this same core.
//!
//! # Architecture
//!
//! ```text
//! Bytecode → Validator → Executor (Gas Meter, Stack, Scratch Memory)
//!                           ↓
//!                        Fingerprint → Proof (ed25519)
//!
//! Measurement → Report          (queried independently)
//! StateStore  ← sealed values   (untrusted collaborator)
//! ```
//!
//! # Guarantees
//!
//! - **Deterministic**: Same code and input always produce identical output, gas and fingerprint
//! - **Bounded**: Gas bounds the instruction count; stack and memory have fixed capacity
//! - **Checked**: Every stack, memory and jump access is bounds-checked before use
//! - **Verifiable**: Proofs can be checked without re-executing the contract

pub mod assembler;
pub mod attestation;
pub mod buffer;
pub mod bytecode;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod fingerprint;
pub mod gas;
pub mod memory;
pub mod opcode;
pub mod proof;
pub mod stack;
pub mod storage;
pub mod validator;
pub mod verifier;

pub use config::EngineConfig;
pub use context::{ExecutionContext, ExecutionState};
pub use error::{Error, ErrorKind, Result};
pub use executor::{execute, ExecutionResult, Executor};
pub use fingerprint::Fingerprint;
pub use opcode::Opcode;
pub use proof::{generate_proof, verify_proof, ExecutionProof};
pub use storage::{InMemoryStore, StateStore, StorageError};
pub use verifier::ContractVerifier;

/// Version of this engine crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ── Limits ────────────────────────────────────────────────

/// Largest accepted contract (1 MiB)
pub const MAX_CONTRACT_SIZE: usize = 1024 * 1024;

/// Size of the per-call scratch memory region
pub const SCRATCH_MEMORY_SIZE: usize = 4096;

/// Largest input; input is preloaded into scratch memory
pub const MAX_INPUT_SIZE: usize = SCRATCH_MEMORY_SIZE;

/// Operand stack capacity in 64-bit words
pub const STACK_CAPACITY: usize = 256;

/// Maximum nesting of `call` instructions
pub const CALL_DEPTH_LIMIT: usize = 64;

pub const DEFAULT_GAS_LIMIT: u64 = 1_000_000;

pub const FINGERPRINT_SIZE: usize = 32;

/// Freshness nonce carried by every proof
pub const NONCE_SIZE: usize = 16;

/// Largest user data embedded in a report
pub const MAX_REPORT_DATA: usize = 64;

// ── Core Types ────────────────────────────────────────────

/// An immutable contract: bytecode plus the gas budget for one call
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Contract {
    #[serde(with = "hex::serde")]
    bytecode: Vec<u8>,
    gas_limit: u64,
}

impl Contract {
    pub fn new(bytecode: Vec<u8>, gas_limit: u64) -> Self {
        Contract {
            bytecode,
            gas_limit,
        }
    }

    /// Contract with [`DEFAULT_GAS_LIMIT`]
    pub fn with_default_gas(bytecode: Vec<u8>) -> Self {
        Contract::new(bytecode, DEFAULT_GAS_LIMIT)
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }
}
