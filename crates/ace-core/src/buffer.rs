//! Caller-provided output buffers
//!
//! Every output-bearing call writes into a buffer supplied by the caller.
//! When the result does not fit, nothing is written and the caller gets
//! `BufferTooSmall` with the size it needs to retry. Results are never
//! truncated.

use crate::{Error, Result};

/// Copy `src` into the front of `dest`, returning the number of bytes written
pub fn copy_to_buffer(dest: &mut [u8], src: &[u8]) -> Result<usize> {
    ensure_capacity(src.len(), dest.len())?;
    dest[..src.len()].copy_from_slice(src);
    Ok(src.len())
}

pub fn ensure_capacity(required: usize, capacity: usize) -> Result<()> {
    if required > capacity {
        return Err(Error::BufferTooSmall { required, capacity });
    }
    Ok(())
}
