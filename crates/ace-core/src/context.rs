//! Per-call execution state
//!
//! An [`ExecutionContext`] is created at the start of one call, driven to a
//! terminal [`ExecutionState`] by the executor and dropped at the end of the
//! call. It is never shared between calls.

use crate::gas::GasMeter;
use crate::memory::ScratchMemory;
use crate::stack::{CallStack, OperandStack};
use crate::{Contract, Error, Result, MAX_INPUT_SIZE};

/// Lifecycle of a context: `Init → Running → {Completed | Error | OutOfGas}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExecutionState {
    Init,
    Running,
    Completed,
    Error,
    OutOfGas,
}

impl ExecutionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionState::Completed | ExecutionState::Error | ExecutionState::OutOfGas
        )
    }

    fn can_transition_to(self, next: ExecutionState) -> bool {
        match self {
            ExecutionState::Init => {
                matches!(next, ExecutionState::Running | ExecutionState::Error)
            }
            ExecutionState::Running => next.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            ExecutionState::Init => "init",
            ExecutionState::Running => "running",
            ExecutionState::Completed => "completed",
            ExecutionState::Error => "error",
            ExecutionState::OutOfGas => "out_of_gas",
        };
        write!(f, "{}", name)
    }
}

/// Mutable state of one contract execution
#[derive(Debug, Clone)]
pub struct ExecutionContext<'a> {
    code: &'a [u8],
    input: &'a [u8],
    pub(crate) pc: usize,
    pub(crate) gas: GasMeter,
    pub(crate) stack: OperandStack,
    pub(crate) calls: CallStack,
    pub(crate) memory: ScratchMemory,
    pub(crate) output: Vec<u8>,
    state: ExecutionState,
}

impl<'a> ExecutionContext<'a> {
    /// Create a context in `Init` with the input preloaded at scratch offset 0.
    ///
    /// # Errors
    /// `InvalidInput` if the input does not fit in scratch memory.
    pub fn new(contract: &'a Contract, input: &'a [u8]) -> Result<Self> {
        if input.len() > MAX_INPUT_SIZE {
            return Err(Error::InvalidInput(format!(
                "input of {} bytes exceeds maximum of {} bytes",
                input.len(),
                MAX_INPUT_SIZE
            )));
        }
        let mut memory = ScratchMemory::new();
        memory.load_prefix(input)?;

        Ok(ExecutionContext {
            code: contract.bytecode(),
            input,
            pc: 0,
            gas: GasMeter::new(contract.gas_limit()),
            stack: OperandStack::new(),
            calls: CallStack::new(),
            memory,
            output: Vec::new(),
            state: ExecutionState::Init,
        })
    }

    pub fn code(&self) -> &'a [u8] {
        self.code
    }

    pub fn input(&self) -> &'a [u8] {
        self.input
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn program_counter(&self) -> usize {
        self.pc
    }

    pub fn gas_used(&self) -> u64 {
        self.gas.used()
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas.limit()
    }

    pub fn gas(&self) -> &GasMeter {
        &self.gas
    }

    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    pub fn memory(&self) -> &ScratchMemory {
        &self.memory
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub(crate) fn transition(&mut self, next: ExecutionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        log::trace!("context {} -> {}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_init() {
        let contract = Contract::new(vec![0xFF], 100);
        let ctx = ExecutionContext::new(&contract, &[]).unwrap();
        assert_eq!(ctx.state(), ExecutionState::Init);
        assert_eq!(ctx.program_counter(), 0);
        assert_eq!(ctx.gas_used(), 0);
        assert_eq!(ctx.gas_limit(), 100);
        assert!(ctx.stack().is_empty());
        assert!(ctx.output().is_empty());
    }

    #[test]
    fn test_input_preloaded_into_memory() {
        let contract = Contract::new(vec![0xFF], 100);
        let input = [9u8, 8, 7];
        let ctx = ExecutionContext::new(&contract, &input).unwrap();
        assert_eq!(&ctx.memory().as_bytes()[..3], &input);
        assert_eq!(ctx.input(), &input);
    }

    #[test]
    fn test_oversized_input_rejected() {
        let contract = Contract::new(vec![0xFF], 100);
        let input = vec![0u8; MAX_INPUT_SIZE + 1];
        let err = ExecutionContext::new(&contract, &input).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_state_transitions() {
        type S = ExecutionState;
        assert!(S::Init.can_transition_to(S::Running));
        assert!(S::Init.can_transition_to(S::Error));
        assert!(!S::Init.can_transition_to(S::Completed));
        assert!(S::Running.can_transition_to(S::OutOfGas));
        assert!(!S::Completed.can_transition_to(S::Running));
        assert!(!S::OutOfGas.can_transition_to(S::Error));
    }
}
