//! Fixed-capacity LIFO stacks
//!
//! Storage is an inline array plus a cursor: nothing is allocated once the
//! stack exists, and overflow/underflow are reported as `StackFault`.

use crate::{Error, Result};

/// Bounded stack of `T` with capacity `N`
#[derive(Debug, Clone)]
pub struct BoundedStack<T: Copy + Default, const N: usize> {
    slots: [T; N],
    top: usize,
}

/// The operand stack of 64-bit words
pub type OperandStack = BoundedStack<u64, { crate::STACK_CAPACITY }>;

/// The return-address stack used by `call`/`ret`
pub type CallStack = BoundedStack<usize, { crate::CALL_DEPTH_LIMIT }>;

impl<T: Copy + Default, const N: usize> BoundedStack<T, N> {
    pub fn new() -> Self {
        BoundedStack {
            slots: [T::default(); N],
            top: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.top
    }

    pub fn is_empty(&self) -> bool {
        self.top == 0
    }

    pub fn is_full(&self) -> bool {
        self.top >= N
    }

    pub fn push(&mut self, value: T) -> Result<()> {
        if self.is_full() {
            return Err(Error::StackFault(format!("overflow at capacity {}", N)));
        }
        self.slots[self.top] = value;
        self.top += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<T> {
        if self.is_empty() {
            return Err(Error::StackFault("underflow".into()));
        }
        self.top -= 1;
        Ok(self.slots[self.top])
    }

    pub fn peek(&self) -> Option<T> {
        if self.is_empty() {
            None
        } else {
            Some(self.slots[self.top - 1])
        }
    }

    /// Live entries, bottom first
    pub fn as_slice(&self) -> &[T] {
        &self.slots[..self.top]
    }
}

impl<T: Copy + Default, const N: usize> Default for BoundedStack<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
