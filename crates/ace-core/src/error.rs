//! Error types for the ACE engine
//!
//! All fallible operations return `Result<T, Error>`.
//! Every error is local to a single call and terminal for it: the engine
//! never resumes a context after a fault.

use thiserror::Error;

use crate::storage::StorageError;

/// ACE engine error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Bytecode rejected by the validator (or an unrecognized opcode reached at run time)
    #[error("Invalid contract: {0}")]
    InvalidContract(String),

    /// Operand or call stack overflow/underflow
    #[error("Stack fault: {0}")]
    StackFault(String),

    /// Division or modulo by zero
    #[error("Arithmetic fault: {0}")]
    ArithmeticFault(String),

    /// Out-of-range scratch memory access, jump target or program counter
    #[error("Memory fault: {0}")]
    MemoryFault(String),

    /// The next instruction would push gas usage past the limit
    #[error("Insufficient gas: {required} required, limit is {limit}")]
    InsufficientGas { required: u64, limit: u64 },

    /// Hash, signature or randomness primitive failed
    #[error("Crypto failure: {0}")]
    CryptoFailure(String),

    /// Caller-provided buffer cannot hold the result
    #[error("Buffer too small: {required} bytes required, capacity is {capacity}")]
    BufferTooSmall { required: usize, capacity: usize },

    /// The verifier handle has no master key (never created or shut down)
    #[error("Verifier not initialized")]
    NotInitialized,

    /// Caller input rejected before execution (oversized input, user data, gas limit)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Untrusted storage collaborator failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Engine configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Field-less discriminant of [`Error`], used for status codes at the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    InvalidContract,
    StackFault,
    ArithmeticFault,
    MemoryFault,
    InsufficientGas,
    CryptoFailure,
    BufferTooSmall,
    NotInitialized,
    InvalidInput,
    Storage,
    Config,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidContract(_) => ErrorKind::InvalidContract,
            Error::StackFault(_) => ErrorKind::StackFault,
            Error::ArithmeticFault(_) => ErrorKind::ArithmeticFault,
            Error::MemoryFault(_) => ErrorKind::MemoryFault,
            Error::InsufficientGas { .. } => ErrorKind::InsufficientGas,
            Error::CryptoFailure(_) => ErrorKind::CryptoFailure,
            Error::BufferTooSmall { .. } => ErrorKind::BufferTooSmall,
            Error::NotInitialized => ErrorKind::NotInitialized,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// True for faults raised by the running program rather than by its caller
    pub fn is_execution_fault(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::StackFault
                | ErrorKind::ArithmeticFault
                | ErrorKind::MemoryFault
                | ErrorKind::InsufficientGas
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidContract => "invalid_contract",
            ErrorKind::StackFault => "stack_fault",
            ErrorKind::ArithmeticFault => "arithmetic_fault",
            ErrorKind::MemoryFault => "memory_fault",
            ErrorKind::InsufficientGas => "insufficient_gas",
            ErrorKind::CryptoFailure => "crypto_failure",
            ErrorKind::BufferTooSmall => "buffer_too_small",
            ErrorKind::NotInitialized => "not_initialized",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Storage => "storage",
            ErrorKind::Config => "config",
        };
        write!(f, "{}", name)
    }
}

/// Result type alias for ACE operations
pub type Result<T> = std::result::Result<T, Error>;
