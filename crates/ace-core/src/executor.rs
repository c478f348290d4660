//! Execution engine: runs validated bytecode on the metered stack machine
//!
//! # Loop
//!
//! While the context is `Running`:
//!
//! 1. Read the opcode byte at the program counter
//! 2. Look up its gas cost; if it would exceed the limit, stop in `OutOfGas`
//! 3. Decode and execute the instruction
//! 4. Charge the gas and advance the program counter past the instruction
//!    (or to the jump target)
//!
//! `halt` stops in `Completed`. Any fault stops in `Error` immediately.
//! Scratch memory writes made before a fault are not rolled back.
//!
//! # Output
//!
//! The output of a completed run is the top of the operand stack at `halt`,
//! as 8 little-endian bytes, or empty when the stack is empty.

use sha2::{Digest, Sha256};

use crate::bytecode::{DecodeError, Instruction};
use crate::context::{ExecutionContext, ExecutionState};
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::{gas, validator, Contract, Error, Result, CALL_DEPTH_LIMIT};

// ── Execution Result ──────────────────────────────────────

/// Result of a completed execution
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExecutionResult {
    /// Top of the stack at `halt` as 8 little-endian bytes, or empty
    #[serde(with = "hex::serde")]
    pub output: Vec<u8>,
    /// Digest binding code, input, output and gas
    pub fingerprint: Fingerprint,
    /// Total gas charged
    pub gas_used: u64,
}

/// What the loop does after an instruction
enum Flow {
    Next,
    Jump(usize),
    Halt,
}

// ── Executor ──────────────────────────────────────────────

/// Drives one [`ExecutionContext`] from `Init` to a terminal state
pub struct Executor<'a> {
    context: ExecutionContext<'a>,
}

impl<'a> Executor<'a> {
    /// Create an executor for `contract` with `input` preloaded into scratch memory
    pub fn new(contract: &'a Contract, input: &'a [u8]) -> Result<Self> {
        Ok(Executor {
            context: ExecutionContext::new(contract, input)?,
        })
    }

    /// Context inspection, also after a failed run
    pub fn context(&self) -> &ExecutionContext<'a> {
        &self.context
    }

    pub fn state(&self) -> ExecutionState {
        self.context.state()
    }

    /// Validate and run the contract to a terminal state.
    ///
    /// # Errors
    /// - `InvalidContract` if validation fails (state becomes `Error`)
    /// - `InsufficientGas` when the next instruction does not fit the budget
    ///   (state becomes `OutOfGas`)
    /// - `StackFault`, `ArithmeticFault`, `MemoryFault` on semantic faults
    ///   (state becomes `Error`)
    pub fn run(&mut self) -> Result<ExecutionResult> {
        if self.context.state() != ExecutionState::Init {
            return Err(Error::InvalidInput(format!(
                "context already in state {}",
                self.context.state()
            )));
        }

        let code = self.context.code();
        log::debug!(
            "executing {} bytes with gas limit {}",
            code.len(),
            self.context.gas_limit()
        );

        if let Err(e) = validator::validate(code) {
            self.context.transition(ExecutionState::Error);
            log::warn!("contract rejected: {}", e);
            return Err(e);
        }
        self.context.transition(ExecutionState::Running);

        loop {
            match self.step() {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => {
                    if self.context.state() == ExecutionState::Running {
                        self.context.transition(ExecutionState::Error);
                    }
                    log::warn!(
                        "execution stopped in {} at pc {:#x}: {}",
                        self.context.state(),
                        self.context.program_counter(),
                        e
                    );
                    return Err(e);
                }
            }
        }

        let result = ExecutionResult {
            output: self.context.output().to_vec(),
            fingerprint: fingerprint(&self.context),
            gas_used: self.context.gas_used(),
        };
        log::debug!(
            "execution completed: gas {} fingerprint {}",
            result.gas_used,
            result.fingerprint
        );
        Ok(result)
    }

    /// Execute one instruction; returns `true` on `halt`
    fn step(&mut self) -> Result<bool> {
        let ctx = &mut self.context;
        let code = ctx.code();
        let pc = ctx.pc;

        let byte = *code.get(pc).ok_or_else(|| {
            Error::MemoryFault(format!(
                "program counter {:#x} outside code of {} bytes",
                pc,
                code.len()
            ))
        })?;

        let cost = gas::cost_of(byte);
        if !ctx.gas.check(cost) {
            ctx.transition(ExecutionState::OutOfGas);
            return Err(Error::InsufficientGas {
                required: ctx.gas.used().saturating_add(cost),
                limit: ctx.gas.limit(),
            });
        }

        let insn = Instruction::decode(code, pc).map_err(runtime_fault)?;
        log::trace!("{:#06x}: {} (gas {}/{})", pc, insn, ctx.gas.used(), ctx.gas.limit());

        let flow = execute_instruction(ctx, insn, pc)?;
        ctx.gas.consume(cost)?;

        match flow {
            Flow::Next => ctx.pc = pc + insn.encoded_len(),
            Flow::Jump(target) => ctx.pc = target,
            Flow::Halt => {
                ctx.output = match ctx.stack.peek() {
                    Some(top) => top.to_le_bytes().to_vec(),
                    None => Vec::new(),
                };
                ctx.transition(ExecutionState::Completed);
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Map a decode failure during execution to its fault kind
fn runtime_fault(err: DecodeError) -> Error {
    match err {
        DecodeError::UnknownOpcode { .. } => Error::InvalidContract(err.to_string()),
        DecodeError::OutOfBounds { .. } | DecodeError::TruncatedImmediate { .. } => {
            Error::MemoryFault(err.to_string())
        }
    }
}

// ── Instruction Semantics ─────────────────────────────────

fn execute_instruction(
    ctx: &mut ExecutionContext<'_>,
    insn: Instruction,
    pc: usize,
) -> Result<Flow> {
    match insn {
        Instruction::Nop => Ok(Flow::Next),
        Instruction::Push(value) => {
            ctx.stack.push(value)?;
            Ok(Flow::Next)
        }
        Instruction::Pop => {
            ctx.stack.pop()?;
            Ok(Flow::Next)
        }
        Instruction::Add => binary(ctx, u64::wrapping_add),
        Instruction::Sub => binary(ctx, u64::wrapping_sub),
        Instruction::Mul => binary(ctx, u64::wrapping_mul),
        Instruction::Div => checked_binary(ctx, pc, "division", |a, b| a / b),
        Instruction::Mod => checked_binary(ctx, pc, "modulo", |a, b| a % b),
        Instruction::And => binary(ctx, |a, b| a & b),
        Instruction::Or => binary(ctx, |a, b| a | b),
        Instruction::Xor => binary(ctx, |a, b| a ^ b),
        Instruction::Not => {
            let a = ctx.stack.pop()?;
            ctx.stack.push(!a)?;
            Ok(Flow::Next)
        }
        Instruction::Eq => binary(ctx, |a, b| (a == b) as u64),
        Instruction::Lt => binary(ctx, |a, b| (a < b) as u64),
        Instruction::Gt => binary(ctx, |a, b| (a > b) as u64),
        Instruction::Jmp(target) => Ok(Flow::Jump(jump_target(ctx, target)?)),
        Instruction::JmpIf(target) => {
            let condition = ctx.stack.pop()?;
            if condition != 0 {
                Ok(Flow::Jump(jump_target(ctx, target)?))
            } else {
                Ok(Flow::Next)
            }
        }
        Instruction::Call(target) => {
            let target = jump_target(ctx, target)?;
            let return_to = pc + insn.encoded_len();
            ctx.calls.push(return_to).map_err(|_| {
                Error::StackFault(format!("call depth limit {} exceeded", CALL_DEPTH_LIMIT))
            })?;
            Ok(Flow::Jump(target))
        }
        Instruction::Ret => {
            let return_to = ctx
                .calls
                .pop()
                .map_err(|_| Error::StackFault("ret with empty call stack".into()))?;
            Ok(Flow::Jump(return_to))
        }
        Instruction::Load => {
            let addr = ctx.stack.pop()?;
            let value = ctx.memory.read_word(addr)?;
            ctx.stack.push(value)?;
            Ok(Flow::Next)
        }
        Instruction::Store => {
            let value = ctx.stack.pop()?;
            let addr = ctx.stack.pop()?;
            ctx.memory.write_word(addr, value)?;
            Ok(Flow::Next)
        }
        Instruction::Hash => {
            let len = ctx.stack.pop()?;
            let addr = ctx.stack.pop()?;
            let digest = digest_prefix(ctx.memory.slice(addr, len)?);
            ctx.stack.push(digest)?;
            Ok(Flow::Next)
        }
        Instruction::Verify => {
            let expected = ctx.stack.pop()?;
            let len = ctx.stack.pop()?;
            let addr = ctx.stack.pop()?;
            let digest = digest_prefix(ctx.memory.slice(addr, len)?);
            ctx.stack.push((digest == expected) as u64)?;
            Ok(Flow::Next)
        }
        Instruction::Halt => Ok(Flow::Halt),
    }
}

/// Pop `b` then `a`, push `f(a, b)`
fn binary(ctx: &mut ExecutionContext<'_>, f: impl Fn(u64, u64) -> u64) -> Result<Flow> {
    let b = ctx.stack.pop()?;
    let a = ctx.stack.pop()?;
    ctx.stack.push(f(a, b))?;
    Ok(Flow::Next)
}

/// Like [`binary`], but a zero divisor is an `ArithmeticFault`
fn checked_binary(
    ctx: &mut ExecutionContext<'_>,
    pc: usize,
    what: &str,
    f: impl Fn(u64, u64) -> u64,
) -> Result<Flow> {
    let b = ctx.stack.pop()?;
    let a = ctx.stack.pop()?;
    if b == 0 {
        return Err(Error::ArithmeticFault(format!(
            "{} by zero at offset {:#x}",
            what, pc
        )));
    }
    ctx.stack.push(f(a, b))?;
    Ok(Flow::Next)
}

fn jump_target(ctx: &ExecutionContext<'_>, target: u32) -> Result<usize> {
    let target = target as usize;
    let len = ctx.code().len();
    if target >= len {
        return Err(Error::MemoryFault(format!(
            "jump target {:#x} outside code of {} bytes",
            target, len
        )));
    }
    Ok(target)
}

/// First 8 bytes (little-endian) of SHA-256 over `data`
fn digest_prefix(data: &[u8]) -> u64 {
    let digest = Sha256::digest(data);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(prefix)
}

/// Execute a contract with the given input (convenience function)
///
/// # Guarantees
/// - Deterministic: same contract and input produce the same result
/// - Bounded: the gas limit bounds the number of executed instructions
pub fn execute(contract: &Contract, input: &[u8]) -> Result<ExecutionResult> {
    Executor::new(contract, input)?.run()
}

// ── Tests ─────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;
    use crate::bytecode::encode;
    use crate::opcode::Opcode;
    use crate::{DEFAULT_GAS_LIMIT, STACK_CAPACITY};

    fn contract(src: &str) -> Contract {
        Contract::new(assemble(src).unwrap(), DEFAULT_GAS_LIMIT)
    }

    fn run(src: &str) -> Result<ExecutionResult> {
        execute(&contract(src), &[])
    }

    fn top(result: &ExecutionResult) -> u64 {
        let mut word = [0u8; 8];
        word.copy_from_slice(&result.output);
        u64::from_le_bytes(word)
    }

    // ── Sample Contract ───────────────────────────────────

    #[test]
    fn test_sample_add_contract() {
        let c = contract("push 10\npush 20\nadd\nhalt");
        let mut exec = Executor::new(&c, &[]).unwrap();
        let result = exec.run().unwrap();

        assert_eq!(exec.state(), ExecutionState::Completed);
        let expected_gas = Opcode::Push.gas_cost() * 2 + Opcode::Add.gas_cost() + Opcode::Halt.gas_cost();
        assert_eq!(result.gas_used, expected_gas);
        assert_eq!(result.output, 30u64.to_le_bytes().to_vec());
    }

    #[test]
    fn test_determinism_100_iterations() {
        let c = contract("push 10\npush 20\nadd\nhalt");
        let first = execute(&c, b"input").unwrap();
        for i in 0..100 {
            let result = execute(&c, b"input").unwrap();
            assert_eq!(first, result, "Non-determinism at iteration {}", i);
        }
    }

    #[test]
    fn test_fingerprint_covers_input() {
        let c = contract("push 1\nhalt");
        let a = execute(&c, b"a").unwrap();
        let b = execute(&c, b"b").unwrap();
        assert_eq!(a.output, b.output);
        assert_ne!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_empty_stack_at_halt_gives_empty_output() {
        let result = run("push 1\npop\nhalt").unwrap();
        assert!(result.output.is_empty());
    }

    // ── Arithmetic & Logic ────────────────────────────────

    #[test]
    fn test_binary_operations() {
        let cases: &[(&str, u64, u64, u64)] = &[
            ("sub", 10, 3, 7),
            ("mul", 6, 7, 42),
            ("div", 42, 5, 8),
            ("mod", 42, 5, 2),
            ("and", 0b1100, 0b1010, 0b1000),
            ("or", 0b1100, 0b1010, 0b1110),
            ("xor", 0b1100, 0b1010, 0b0110),
            ("eq", 5, 5, 1),
            ("eq", 5, 6, 0),
            ("lt", 3, 4, 1),
            ("lt", 4, 3, 0),
            ("gt", 4, 3, 1),
            ("gt", 3, 3, 0),
        ];
        for (op, a, b, expected) in cases {
            let src = format!("push {}\npush {}\n{}\nhalt", a, b, op);
            let result = run(&src).unwrap();
            assert_eq!(top(&result), *expected, "{} {} {}", a, op, b);
        }
    }

    #[test]
    fn test_wraparound_arithmetic() {
        let result = run(&format!("push {}\npush 1\nadd\nhalt", u64::MAX)).unwrap();
        assert_eq!(top(&result), 0);
        let result = run("push 0\npush 1\nsub\nhalt").unwrap();
        assert_eq!(top(&result), u64::MAX);
    }

    #[test]
    fn test_not() {
        let result = run("push 0\nnot\nhalt").unwrap();
        assert_eq!(top(&result), u64::MAX);
    }

    #[test]
    fn test_division_by_zero() {
        let err = run("push 1\npush 0\ndiv\nhalt").unwrap_err();
        assert!(matches!(err, Error::ArithmeticFault(_)));
        let err = run("push 1\npush 0\nmod\nhalt").unwrap_err();
        assert!(matches!(err, Error::ArithmeticFault(_)));
    }

    // ── Stack Faults ──────────────────────────────────────

    #[test]
    fn test_underflow_is_stack_fault() {
        let c = contract("push 1\nadd\nhalt");
        let mut exec = Executor::new(&c, &[]).unwrap();
        let err = exec.run().unwrap_err();
        assert!(matches!(err, Error::StackFault(_)));
        assert_eq!(exec.state(), ExecutionState::Error);
    }

    #[test]
    fn test_overflow_is_stack_fault() {
        let mut program = vec![Instruction::Push(1); STACK_CAPACITY + 1];
        program.push(Instruction::Halt);
        let c = Contract::new(encode(&program), DEFAULT_GAS_LIMIT);
        let mut exec = Executor::new(&c, &[]).unwrap();
        assert!(matches!(exec.run(), Err(Error::StackFault(_))));
        assert_eq!(exec.context().stack().len(), STACK_CAPACITY);
    }

    #[test]
    fn test_full_stack_is_allowed() {
        let mut program = vec![Instruction::Push(1); STACK_CAPACITY];
        program.push(Instruction::Halt);
        let c = Contract::new(encode(&program), DEFAULT_GAS_LIMIT);
        assert!(execute(&c, &[]).is_ok());
    }

    // ── Gas ───────────────────────────────────────────────

    #[test]
    fn test_gas_below_first_instruction() {
        let c = Contract::new(assemble("push 10\nhalt").unwrap(), 2);
        let mut exec = Executor::new(&c, &[]).unwrap();
        let err = exec.run().unwrap_err();

        assert_eq!(
            err,
            Error::InsufficientGas {
                required: 3,
                limit: 2
            }
        );
        assert_eq!(exec.state(), ExecutionState::OutOfGas);
        assert!(exec.context().stack().is_empty());
        assert_eq!(exec.context().gas_used(), 0);
        assert_eq!(exec.context().program_counter(), 0);
    }

    #[test]
    fn test_exact_gas_completes() {
        let c = Contract::new(assemble("push 10\npush 20\nadd\nhalt").unwrap(), 9);
        assert_eq!(execute(&c, &[]).unwrap().gas_used, 9);
    }

    #[test]
    fn test_infinite_loop_bounded_by_gas() {
        let c = Contract::new(assemble("top: jmp top\nhalt").unwrap(), 100);
        let mut exec = Executor::new(&c, &[]).unwrap();
        let err = exec.run().unwrap_err();
        assert!(matches!(err, Error::InsufficientGas { .. }));
        assert_eq!(exec.state(), ExecutionState::OutOfGas);
        // 12 jumps of 8 gas fit in 100; the 13th does not
        assert_eq!(exec.context().gas_used(), 96);
    }

    #[test]
    fn test_countdown_loop_gas() {
        let src = "
                    push 0
                    push 5
                    store          ; mem[0] = 5
            loop:   push 0
                    push 0
                    load
                    push 1
                    sub
                    store          ; mem[0] -= 1
                    push 0
                    load
                    jmpif loop
                    push 0
                    load
                    halt
        ";
        let result = run(src).unwrap();
        assert_eq!(top(&result), 0);
        // setup 11, five iterations of 40, epilogue 8
        assert_eq!(result.gas_used, 219);
    }

    // ── Control Flow ──────────────────────────────────────

    #[test]
    fn test_jump_target_out_of_range() {
        let err = run("jmp 100\nhalt").unwrap_err();
        assert!(matches!(err, Error::MemoryFault(_)));
        // Target equal to code length is also out of range
        let err = run("jmp 6\nhalt").unwrap_err();
        assert!(matches!(err, Error::MemoryFault(_)));
    }

    #[test]
    fn test_jmpif_not_taken() {
        let result = run("push 7\npush 0\njmpif skip\npush 8\nskip: halt").unwrap();
        assert_eq!(top(&result), 8);
    }

    #[test]
    fn test_jmpif_not_taken_ignores_target() {
        let result = run("push 0\njmpif 9999\npush 7\nhalt").unwrap();
        assert_eq!(top(&result), 7);
    }

    #[test]
    fn test_jmpif_taken_checks_target() {
        let err = run("push 1\njmpif 9999\nhalt").unwrap_err();
        assert!(matches!(err, Error::MemoryFault(_)));
    }

    #[test]
    fn test_jmpif_pops_before_target_check() {
        let err = run("jmpif 9999\nhalt").unwrap_err();
        assert!(matches!(err, Error::StackFault(_)));
    }

    #[test]
    fn test_jump_into_truncated_immediate() {
        // jmp(0..5) push(5..14) halt(14); byte 12 is 0x0F whose
        // 4-byte immediate would run past the end of the code
        let code = encode(&[
            Instruction::Jmp(12),
            Instruction::Push(0x000F_0000_0000_0000),
            Instruction::Halt,
        ]);
        assert_eq!(code[12], Opcode::Jmp.byte());
        let c = Contract::new(code, DEFAULT_GAS_LIMIT);
        let mut exec = Executor::new(&c, &[]).unwrap();
        assert!(matches!(exec.run(), Err(Error::MemoryFault(_))));
        assert_eq!(exec.state(), ExecutionState::Error);
    }

    #[test]
    fn test_jump_into_unknown_opcode() {
        let code = encode(&[
            Instruction::Jmp(6),
            Instruction::Push(0x42),
            Instruction::Halt,
        ]);
        let c = Contract::new(code, DEFAULT_GAS_LIMIT);
        let err = execute(&c, &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidContract(_)));
    }

    #[test]
    fn test_call_and_ret() {
        let src = "
                    push 2
                    call double
                    call double
                    halt
            double: push 2
                    mul
                    ret
        ";
        let result = run(src).unwrap();
        assert_eq!(top(&result), 8);
    }

    #[test]
    fn test_ret_without_call() {
        let err = run("ret\nhalt").unwrap_err();
        assert!(matches!(err, Error::StackFault(_)));
    }

    #[test]
    fn test_unbounded_recursion_hits_call_depth() {
        let err = run("f: call f\nhalt").unwrap_err();
        assert_eq!(
            err,
            Error::StackFault(format!("call depth limit {} exceeded", CALL_DEPTH_LIMIT))
        );
    }

    // ── Memory ────────────────────────────────────────────

    #[test]
    fn test_store_and_load() {
        let result = run("push 64\npush 1234\nstore\npush 64\nload\nhalt").unwrap();
        assert_eq!(top(&result), 1234);
    }

    #[test]
    fn test_load_reads_input() {
        let c = contract("push 0\nload\nhalt");
        let result = execute(&c, &42u64.to_le_bytes()).unwrap();
        assert_eq!(top(&result), 42);
    }

    #[test]
    fn test_out_of_range_memory() {
        let err = run("push 4089\nload\nhalt").unwrap_err();
        assert!(matches!(err, Error::MemoryFault(_)));
        let err = run("push 4088\nload\nhalt");
        assert!(err.is_ok());
    }

    #[test]
    fn test_partial_writes_not_rolled_back() {
        let c = contract("push 8\npush 99\nstore\npush 1\npush 0\ndiv\nhalt");
        let mut exec = Executor::new(&c, &[]).unwrap();
        assert!(exec.run().is_err());
        assert_eq!(exec.context().memory().read_word(8).unwrap(), 99);
    }

    #[test]
    fn test_hash_opcode() {
        let input = b"hello world";
        let c = contract(&format!("push 0\npush {}\nhash\nhalt", input.len()));
        let result = execute(&c, input).unwrap();
        assert_eq!(top(&result), digest_prefix(input));
    }

    #[test]
    fn test_hash_range_checked() {
        let err = run("push 4000\npush 97\nhash\nhalt").unwrap_err();
        assert!(matches!(err, Error::MemoryFault(_)));
    }

    #[test]
    fn test_verify_opcode() {
        let input = b"payload";
        let expected = digest_prefix(input);
        let ok = contract(&format!("push 0\npush {}\npush {}\nverify\nhalt", input.len(), expected));
        assert_eq!(top(&execute(&ok, input).unwrap()), 1);
        let bad = contract(&format!("push 0\npush {}\npush {}\nverify\nhalt", input.len(), expected ^ 1));
        assert_eq!(top(&execute(&bad, input).unwrap()), 0);
    }

    // ── Lifecycle ─────────────────────────────────────────

    #[test]
    fn test_invalid_contract_never_runs() {
        let c = Contract::new(vec![Opcode::Push.byte()], DEFAULT_GAS_LIMIT);
        let mut exec = Executor::new(&c, &[]).unwrap();
        assert!(matches!(exec.run(), Err(Error::InvalidContract(_))));
        assert_eq!(exec.state(), ExecutionState::Error);
        assert_eq!(exec.context().gas_used(), 0);
    }

    #[test]
    fn test_executor_runs_once() {
        let c = contract("halt");
        let mut exec = Executor::new(&c, &[]).unwrap();
        exec.run().unwrap();
        assert!(matches!(exec.run(), Err(Error::InvalidInput(_))));
    }
}
