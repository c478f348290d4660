//! Scratch memory for a single execution
//!
//! A fixed [`SCRATCH_MEMORY_SIZE`]-byte region. Every access is checked
//! against the region size before any byte is touched; a failed access is a
//! `MemoryFault` and leaves memory unchanged.

use std::ops::Range;

use crate::{Error, Result, SCRATCH_MEMORY_SIZE};

/// Width of a word access (`load`/`store`)
pub const WORD_SIZE: usize = 8;

#[derive(Debug, Clone)]
pub struct ScratchMemory {
    bytes: [u8; SCRATCH_MEMORY_SIZE],
}

impl ScratchMemory {
    pub fn new() -> Self {
        ScratchMemory {
            bytes: [0u8; SCRATCH_MEMORY_SIZE],
        }
    }

    pub const fn size(&self) -> usize {
        SCRATCH_MEMORY_SIZE
    }

    /// Resolve a `[addr, addr + len)` range taken from the stack
    pub fn range(&self, addr: u64, len: u64) -> Result<Range<usize>> {
        let out_of_range = || {
            Error::MemoryFault(format!(
                "access of {} bytes at {:#x} outside {} bytes of scratch memory",
                len, addr, SCRATCH_MEMORY_SIZE
            ))
        };
        let end = addr.checked_add(len).ok_or_else(out_of_range)?;
        if end > SCRATCH_MEMORY_SIZE as u64 {
            return Err(out_of_range());
        }
        Ok(addr as usize..end as usize)
    }

    pub fn slice(&self, addr: u64, len: u64) -> Result<&[u8]> {
        let range = self.range(addr, len)?;
        Ok(&self.bytes[range])
    }

    pub fn read_word(&self, addr: u64) -> Result<u64> {
        let range = self.range(addr, WORD_SIZE as u64)?;
        let mut word = [0u8; WORD_SIZE];
        word.copy_from_slice(&self.bytes[range]);
        Ok(u64::from_le_bytes(word))
    }

    pub fn write_word(&mut self, addr: u64, value: u64) -> Result<()> {
        let range = self.range(addr, WORD_SIZE as u64)?;
        self.bytes[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Copy `data` in at offset 0; used to preload contract input
    pub fn load_prefix(&mut self, data: &[u8]) -> Result<()> {
        let range = self.range(0, data.len() as u64)?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for ScratchMemory {
    fn default() -> Self {
        Self::new()
    }
}
