//! C-FFI layer for ACE, the entry surface for hosts outside Rust.
//!
//! ZERO logic here. All calls delegate to `ace-core`.
//!
//! # Status Codes
//!
//! Every function returns an `i32` status: `ACE_OK` or one of the
//! `ACE_*` error codes below, one per engine error kind.
//!
//! # Buffer Contract
//!
//! Output-bearing calls take `out` and `out_len`. On entry `*out_len` is
//! the capacity of `out`; on success it is the number of bytes written.
//! If the result does not fit, nothing is written, `*out_len` is set to
//! the required size and `ACE_BUFFER_TOO_SMALL` is returned.
//!
//! # Handle Contract
//!
//! `ace_verifier_new()` returns an owned handle that MUST be released with
//! `ace_verifier_free()`. A null handle yields `ACE_NOT_INITIALIZED`.
//!
//! # Sealed State
//!
//! Each handle owns an in-memory state store. `ace_state_write` seals the
//! value under the handle's master key; `ace_state_read` rejects values
//! that fail the seal check with `ACE_INTEGRITY_VIOLATION`.

use std::slice;

use ace_core::attestation;
use ace_core::buffer::copy_to_buffer;
use ace_core::{
    ContractVerifier, Error, ErrorKind, ExecutionProof, Fingerprint, InMemoryStore, StorageError,
    FINGERPRINT_SIZE,
};

pub const ACE_OK: i32 = 0;
pub const ACE_INVALID_CONTRACT: i32 = 1;
pub const ACE_STACK_FAULT: i32 = 2;
pub const ACE_ARITHMETIC_FAULT: i32 = 3;
pub const ACE_MEMORY_FAULT: i32 = 4;
pub const ACE_INSUFFICIENT_GAS: i32 = 5;
pub const ACE_CRYPTO_FAILURE: i32 = 6;
pub const ACE_BUFFER_TOO_SMALL: i32 = 7;
pub const ACE_NOT_INITIALIZED: i32 = 8;
pub const ACE_INVALID_INPUT: i32 = 9;
pub const ACE_STORAGE_ERROR: i32 = 10;
pub const ACE_CONFIG_ERROR: i32 = 11;
pub const ACE_NULL_POINTER: i32 = 12;
pub const ACE_STATE_NOT_FOUND: i32 = 13;
pub const ACE_INTEGRITY_VIOLATION: i32 = 14;

/// Opaque verifier handle
pub struct AceVerifier {
    inner: ContractVerifier,
    store: InMemoryStore,
}

fn status_of(e: &Error) -> i32 {
    match e {
        Error::Storage(StorageError::NotFound) => return ACE_STATE_NOT_FOUND,
        Error::Storage(StorageError::IntegrityViolation) => return ACE_INTEGRITY_VIOLATION,
        _ => {}
    }
    match e.kind() {
        ErrorKind::InvalidContract => ACE_INVALID_CONTRACT,
        ErrorKind::StackFault => ACE_STACK_FAULT,
        ErrorKind::ArithmeticFault => ACE_ARITHMETIC_FAULT,
        ErrorKind::MemoryFault => ACE_MEMORY_FAULT,
        ErrorKind::InsufficientGas => ACE_INSUFFICIENT_GAS,
        ErrorKind::CryptoFailure => ACE_CRYPTO_FAILURE,
        ErrorKind::BufferTooSmall => ACE_BUFFER_TOO_SMALL,
        ErrorKind::NotInitialized => ACE_NOT_INITIALIZED,
        ErrorKind::InvalidInput => ACE_INVALID_INPUT,
        ErrorKind::Storage => ACE_STORAGE_ERROR,
        ErrorKind::Config => ACE_CONFIG_ERROR,
    }
}

/// Helper: borrow `len` bytes at `ptr`. A null pointer is only accepted
/// for an empty slice.
unsafe fn bytes<'a>(ptr: *const u8, len: usize) -> Option<&'a [u8]> {
    if ptr.is_null() {
        return if len == 0 { Some(&[][..]) } else { None };
    }
    Some(slice::from_raw_parts(ptr, len))
}

unsafe fn fingerprint_at(ptr: *const u8) -> Option<Fingerprint> {
    let raw = bytes(ptr, FINGERPRINT_SIZE)?;
    let mut fp = [0u8; FINGERPRINT_SIZE];
    fp.copy_from_slice(raw);
    Some(Fingerprint::from_bytes(fp))
}

/// Helper: apply the buffer contract to `data`
unsafe fn write_out(data: &[u8], out: *mut u8, out_len: *mut usize) -> i32 {
    if out_len.is_null() {
        return ACE_NULL_POINTER;
    }
    let capacity = *out_len;
    if data.len() > capacity {
        *out_len = data.len();
        return ACE_BUFFER_TOO_SMALL;
    }
    if out.is_null() {
        if data.is_empty() {
            *out_len = 0;
            return ACE_OK;
        }
        return ACE_NULL_POINTER;
    }
    let dest = slice::from_raw_parts_mut(out, capacity);
    match copy_to_buffer(dest, data) {
        Ok(written) => {
            *out_len = written;
            ACE_OK
        }
        Err(e) => status_of(&e),
    }
}

/// Initialize `env_logger` from `RUST_LOG`. Safe to call more than once.
#[no_mangle]
pub extern "C" fn ace_init_logging() {
    let _ = env_logger::try_init();
}

/// Create a verifier with the default configuration.
/// Returns null if the master key cannot be generated.
#[no_mangle]
pub extern "C" fn ace_verifier_new() -> *mut AceVerifier {
    match ContractVerifier::with_defaults() {
        Ok(inner) => Box::into_raw(Box::new(AceVerifier {
            inner,
            store: InMemoryStore::new(),
        })),
        Err(e) => {
            log::error!("verifier creation failed: {}", e);
            std::ptr::null_mut()
        }
    }
}

/// Shut down and release a verifier.
///
/// # Safety
/// `verifier` must be a pointer returned by `ace_verifier_new()` that has
/// not been freed yet, or null (in which case this is a no-op).
#[no_mangle]
pub unsafe extern "C" fn ace_verifier_free(verifier: *mut AceVerifier) {
    if verifier.is_null() {
        return;
    }
    let mut handle = Box::from_raw(verifier);
    handle.inner.shutdown();
}

/// Execute a contract.
///
/// On success the output is written per the buffer contract, the 32-byte
/// fingerprint to `fingerprint_out` and the gas used to `gas_used`.
///
/// # Safety
/// `code`/`input` must point to `code_len`/`input_len` readable bytes,
/// `out` to `*out_len` writable bytes, `fingerprint_out` to 32 writable
/// bytes and `gas_used` to a writable `u64`.
#[no_mangle]
pub unsafe extern "C" fn ace_execute(
    verifier: *mut AceVerifier,
    code: *const u8,
    code_len: usize,
    input: *const u8,
    input_len: usize,
    gas_limit: u64,
    out: *mut u8,
    out_len: *mut usize,
    fingerprint_out: *mut u8,
    gas_used: *mut u64,
) -> i32 {
    let Some(handle) = verifier.as_mut() else {
        return ACE_NOT_INITIALIZED;
    };
    let (Some(code), Some(input)) = (bytes(code, code_len), bytes(input, input_len)) else {
        return ACE_NULL_POINTER;
    };
    if fingerprint_out.is_null() || gas_used.is_null() {
        return ACE_NULL_POINTER;
    }

    let result = match handle.inner.execute(code, input, gas_limit) {
        Ok(result) => result,
        Err(e) => return status_of(&e),
    };
    let status = write_out(&result.output, out, out_len);
    if status != ACE_OK {
        return status;
    }
    slice::from_raw_parts_mut(fingerprint_out, FINGERPRINT_SIZE)
        .copy_from_slice(result.fingerprint.as_bytes());
    *gas_used = result.gas_used;
    ACE_OK
}

/// Sign a proof for the 32-byte `fingerprint`; writes the 152-byte proof.
///
/// # Safety
/// `fingerprint` must point to 32 readable bytes and `out` to `*out_len`
/// writable bytes.
#[no_mangle]
pub unsafe extern "C" fn ace_generate_proof(
    verifier: *mut AceVerifier,
    fingerprint: *const u8,
    out: *mut u8,
    out_len: *mut usize,
) -> i32 {
    let Some(handle) = verifier.as_ref() else {
        return ACE_NOT_INITIALIZED;
    };
    let Some(fingerprint) = fingerprint_at(fingerprint) else {
        return ACE_NULL_POINTER;
    };
    match handle.inner.generate_proof(&fingerprint) {
        Ok(proof) => write_out(&proof.to_bytes(), out, out_len),
        Err(e) => status_of(&e),
    }
}

/// Returns 1 if `proof` is valid for `fingerprint`, 0 otherwise
/// (including malformed or null arguments).
///
/// # Safety
/// `proof` must point to `proof_len` readable bytes and `fingerprint` to
/// 32 readable bytes.
#[no_mangle]
pub unsafe extern "C" fn ace_verify_proof(
    proof: *const u8,
    proof_len: usize,
    fingerprint: *const u8,
) -> i32 {
    let Some(raw) = bytes(proof, proof_len) else {
        return 0;
    };
    let Some(fingerprint) = fingerprint_at(fingerprint) else {
        return 0;
    };
    match ExecutionProof::from_bytes(raw) {
        Ok(proof) => ace_core::verify_proof(&proof, &fingerprint) as i32,
        Err(_) => 0,
    }
}

/// Write the 32-byte engine measurement.
///
/// # Safety
/// `out` must point to `*out_len` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn ace_get_measurement(out: *mut u8, out_len: *mut usize) -> i32 {
    write_out(&attestation::measurement(), out, out_len)
}

/// Build a 104-byte report embedding up to 64 bytes of `user_data`.
///
/// # Safety
/// `user_data` must point to `user_data_len` readable bytes and `out` to
/// `*out_len` writable bytes.
#[no_mangle]
pub unsafe extern "C" fn ace_create_report(
    verifier: *mut AceVerifier,
    user_data: *const u8,
    user_data_len: usize,
    out: *mut u8,
    out_len: *mut usize,
) -> i32 {
    let Some(handle) = verifier.as_ref() else {
        return ACE_NOT_INITIALIZED;
    };
    let Some(user_data) = bytes(user_data, user_data_len) else {
        return ACE_NULL_POINTER;
    };
    match handle.inner.create_report(user_data) {
        Ok(report) => write_out(&report.to_bytes(), out, out_len),
        Err(e) => status_of(&e),
    }
}

/// Seal `value` and store it under `key` in the handle's store.
///
/// # Safety
/// `key` must point to `key_len` readable bytes and `value` to
/// `value_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn ace_state_write(
    verifier: *mut AceVerifier,
    key: *const u8,
    key_len: usize,
    value: *const u8,
    value_len: usize,
) -> i32 {
    let Some(handle) = verifier.as_mut() else {
        return ACE_NOT_INITIALIZED;
    };
    let (Some(key), Some(value)) = (bytes(key, key_len), bytes(value, value_len)) else {
        return ACE_NULL_POINTER;
    };
    match handle.inner.store_state(&mut handle.store, key, value) {
        Ok(()) => ACE_OK,
        Err(e) => status_of(&e),
    }
}

/// Read and unseal the value stored under `key`.
///
/// # Safety
/// `key` must point to `key_len` readable bytes and `out` to `*out_len`
/// writable bytes.
#[no_mangle]
pub unsafe extern "C" fn ace_state_read(
    verifier: *mut AceVerifier,
    key: *const u8,
    key_len: usize,
    out: *mut u8,
    out_len: *mut usize,
) -> i32 {
    let Some(handle) = verifier.as_ref() else {
        return ACE_NOT_INITIALIZED;
    };
    let Some(key) = bytes(key, key_len) else {
        return ACE_NULL_POINTER;
    };
    match handle.inner.load_state(&handle.store, key) {
        Ok(value) => write_out(&value, out, out_len),
        Err(e) => status_of(&e),
    }
}

/// Remove `key` from the handle's store. `existed`, when not null,
/// receives 1 if the key was present and 0 otherwise.
///
/// # Safety
/// `key` must point to `key_len` readable bytes and `existed`, if not
/// null, to a writable `i32`.
#[no_mangle]
pub unsafe extern "C" fn ace_state_delete(
    verifier: *mut AceVerifier,
    key: *const u8,
    key_len: usize,
    existed: *mut i32,
) -> i32 {
    let Some(handle) = verifier.as_mut() else {
        return ACE_NOT_INITIALIZED;
    };
    let Some(key) = bytes(key, key_len) else {
        return ACE_NULL_POINTER;
    };
    match handle.inner.delete_state(&mut handle.store, key) {
        Ok(found) => {
            if !existed.is_null() {
                *existed = found as i32;
            }
            ACE_OK
        }
        Err(e) => status_of(&e),
    }
}
