//! Verifier handle
//!
//! A [`ContractVerifier`] owns the long-lived engine state: the sealing
//! master key and the completed-execution counter. The caller creates it,
//! passes it to every call and shuts it down; there is no global instance.
//!
//! # Lifecycle
//!
//! ```text
//! new() → Initialized ──shutdown()──→ Shut down (master key zeroized)
//! ```
//!
//! Every operation that needs the master key fails with `NotInitialized`
//! after shutdown. Proof verification and the measurement do not.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::attestation::{self, Report, MEASUREMENT_SIZE};
use crate::buffer::copy_to_buffer;
use crate::config::EngineConfig;
use crate::executor::{self, ExecutionResult};
use crate::fingerprint::Fingerprint;
use crate::proof::{self, ExecutionProof};
use crate::storage::{self, StateStore};
use crate::{Contract, Error, Result};

pub const MASTER_KEY_SIZE: usize = 32;

pub struct ContractVerifier {
    config: EngineConfig,
    master_key: Option<Zeroizing<[u8; MASTER_KEY_SIZE]>>,
    executions: u64,
}

impl ContractVerifier {
    /// Validate `config` and generate a fresh master key.
    ///
    /// # Errors
    /// `Config` for an inconsistent configuration, `CryptoFailure` if the
    /// OS random source fails.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let mut key = Zeroizing::new([0u8; MASTER_KEY_SIZE]);
        OsRng
            .try_fill_bytes(&mut key[..])
            .map_err(|e| Error::CryptoFailure(format!("master key generation failed: {}", e)))?;

        log::info!(
            "verifier initialized (default gas {}, max gas {})",
            config.default_gas_limit,
            config.max_gas_limit
        );
        Ok(ContractVerifier {
            config,
            master_key: Some(key),
            executions: 0,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.master_key.is_some()
    }

    /// Zeroize the master key. Idempotent.
    pub fn shutdown(&mut self) {
        if self.master_key.take().is_some() {
            log::info!("verifier shut down after {} executions", self.executions);
        }
    }

    /// Completed executions since creation
    pub fn executions(&self) -> u64 {
        self.executions
    }

    fn master_key(&self) -> Result<&[u8; MASTER_KEY_SIZE]> {
        match &self.master_key {
            Some(key) => Ok(&**key),
            None => Err(Error::NotInitialized),
        }
    }

    // ── Execution ─────────────────────────────────────────

    /// Run `code` with `input` under `gas_limit`.
    ///
    /// # Errors
    /// `NotInitialized` after shutdown, `InvalidInput` for a gas limit above
    /// the configured maximum, otherwise any error of [`executor::execute`].
    pub fn execute(&mut self, code: &[u8], input: &[u8], gas_limit: u64) -> Result<ExecutionResult> {
        self.master_key()?;
        let gas_limit = self.config.admit_gas_limit(gas_limit)?;

        let contract = Contract::new(code.to_vec(), gas_limit);
        let result = executor::execute(&contract, input)?;
        self.executions += 1;
        Ok(result)
    }

    /// [`Self::execute`] with the configured default gas limit
    pub fn execute_default(&mut self, code: &[u8], input: &[u8]) -> Result<ExecutionResult> {
        self.execute(code, input, self.config.default_gas_limit)
    }

    /// Execute and copy the output into `out`.
    ///
    /// On `BufferTooSmall` the execution has still completed and been
    /// counted; nothing is written to `out`.
    pub fn execute_into(
        &mut self,
        code: &[u8],
        input: &[u8],
        gas_limit: u64,
        out: &mut [u8],
    ) -> Result<ExecutionResult> {
        let result = self.execute(code, input, gas_limit)?;
        copy_to_buffer(out, &result.output)?;
        Ok(result)
    }

    // ── Proofs ────────────────────────────────────────────

    pub fn generate_proof(&self, fingerprint: &Fingerprint) -> Result<ExecutionProof> {
        self.master_key()?;
        proof::generate_proof(fingerprint)
    }

    pub fn verify_proof(&self, proof: &ExecutionProof, fingerprint: &Fingerprint) -> bool {
        proof::verify_proof(proof, fingerprint)
    }

    // ── Measurement ───────────────────────────────────────

    pub fn measurement(&self) -> [u8; MEASUREMENT_SIZE] {
        attestation::measurement()
    }

    pub fn create_report(&self, user_data: &[u8]) -> Result<Report> {
        self.master_key()?;
        Report::new(user_data)
    }

    // ── Sealed State ──────────────────────────────────────

    /// Seal `value` and write it to the untrusted `store`
    pub fn store_state<S: StateStore + ?Sized>(
        &self,
        store: &mut S,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        let sealed = storage::seal(self.master_key()?, key, value)?;
        store.write(key, &sealed)?;
        log::debug!("stored {} sealed bytes", sealed.len());
        Ok(())
    }

    /// Read `key` back from `store`, rejecting values that fail the seal check
    pub fn load_state<S: StateStore + ?Sized>(&self, store: &S, key: &[u8]) -> Result<Vec<u8>> {
        let master_key = self.master_key()?;
        let sealed = store.read(key)?;
        let value = storage::unseal(master_key, key, &sealed).map_err(|e| {
            log::warn!("sealed state rejected: {}", e);
            e
        })?;
        Ok(value)
    }

    /// Remove `key` from `store`; returns whether it existed
    pub fn delete_state<S: StateStore + ?Sized>(&self, store: &mut S, key: &[u8]) -> Result<bool> {
        self.master_key()?;
        Ok(store.delete(key)?)
    }
}

impl std::fmt::Debug for ContractVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ContractVerifier")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .field("executions", &self.executions)
            .finish()
    }
}
