//! Token store
//!
//! Single owner of the current credential:
//! - Durable or ephemeral persistence chosen per login
//! - Expiry checks with a configurable skew
//! - Generation counter for compare-and-swap replacement
//!
//! Storage backend failures are logged and never reach the caller. The store
//! keeps working in memory and reports itself as degraded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use authwire_common::{Clock, SharedClock, SystemClock};
use authwire_domain::{ClientError, Credential};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::ports::{CredentialStorage, StorageError};
use super::storage::MemoryCredentialStorage;

#[derive(Debug, Default)]
struct Slot {
    credential: Option<Credential>,
    generation: u64,
    session_id: u64,
    persistent: bool,
}

/// Consistent view of the store at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSnapshot {
    pub credential: Option<Credential>,
    /// Bumped on every visible change
    pub generation: u64,
    /// Bumped on every login; a refresh keeps it
    pub session_id: u64,
}

/// Thread-safe credential holder with pluggable persistence
pub struct TokenStore {
    slot: RwLock<Slot>,
    durable: Arc<dyn CredentialStorage>,
    ephemeral: Arc<dyn CredentialStorage>,
    clock: SharedClock,
    degraded: AtomicBool,
}

impl TokenStore {
    /// Create a store over the given backends
    ///
    /// `durable` survives restarts; `ephemeral` lives for the current run.
    #[must_use]
    pub fn new(
        durable: Arc<dyn CredentialStorage>,
        ephemeral: Arc<dyn CredentialStorage>,
        clock: SharedClock,
    ) -> Self {
        Self {
            slot: RwLock::new(Slot::default()),
            durable,
            ephemeral,
            clock,
            degraded: AtomicBool::new(false),
        }
    }

    /// Store with in-memory backends only and the system clock.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryCredentialStorage::new()),
            Arc::new(MemoryCredentialStorage::new()),
            Arc::new(SystemClock),
        )
    }

    /// Time source used for expiry checks.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Current credential, `None` when unauthenticated
    pub fn get(&self) -> Option<Credential> {
        self.slot.read().credential.clone()
    }

    /// Credential plus the counters it was read with, taken atomically.
    pub fn snapshot(&self) -> TokenSnapshot {
        let slot = self.slot.read();
        TokenSnapshot {
            credential: slot.credential.clone(),
            generation: slot.generation,
            session_id: slot.session_id,
        }
    }

    /// Counter bumped on every visible change.
    pub fn generation(&self) -> u64 {
        self.slot.read().generation
    }

    /// Install a new credential, starting a new session.
    ///
    /// A credential with an empty access token clears the store instead.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidCredential` when `expires_at` is not after
    /// `issued_at`. Storage failures are not errors.
    pub fn set(&self, credential: Credential, persist: bool) -> Result<u64, ClientError> {
        credential.validate()?;
        if !credential.is_authenticated() {
            self.clear();
            return Ok(self.generation());
        }

        let mut slot = self.slot.write();
        slot.generation += 1;
        slot.session_id += 1;
        slot.persistent = persist;
        self.write_backends(&credential, persist);
        slot.credential = Some(credential);
        info!(generation = slot.generation, persist, "credential stored");
        Ok(slot.generation)
    }

    /// Remove the credential from memory and both backends
    pub fn clear(&self) {
        let mut slot = self.slot.write();
        self.clear_locked(&mut slot);
    }

    /// Treat the credential as expired `skew` before its deadline.
    ///
    /// An absent credential is always expired.
    pub fn is_expired(&self, skew: Duration) -> bool {
        match self.slot.read().credential.as_ref() {
            Some(credential) => credential.is_expired_at(self.clock.now(), skew),
            None => true,
        }
    }

    /// Time left until the deadline, zero when absent or expired
    pub fn time_until_expiry(&self) -> Duration {
        self.slot
            .read()
            .credential
            .as_ref()
            .map_or(Duration::ZERO, |credential| credential.remaining_at(self.clock.now()))
    }

    /// Replace the credential only if nothing changed since `expected`.
    ///
    /// Keeps the session and the persistence tier. Returns the new generation,
    /// or `None` when the store moved on (logout, expiry, another login).
    pub fn replace_if_generation(&self, expected: u64, credential: Credential) -> Option<u64> {
        let mut slot = self.slot.write();
        if slot.generation != expected || slot.credential.is_none() {
            debug!(expected, current = slot.generation, "credential replacement skipped");
            return None;
        }
        slot.generation += 1;
        self.write_backends(&credential, slot.persistent);
        slot.credential = Some(credential);
        Some(slot.generation)
    }

    /// Clear only if nothing changed since `expected`. Returns whether this
    /// call cleared the store.
    pub fn clear_if_generation(&self, expected: u64) -> bool {
        let mut slot = self.slot.write();
        if slot.generation != expected || slot.credential.is_none() {
            return false;
        }
        self.clear_locked(&mut slot);
        true
    }

    /// Restore a credential persisted by a previous run.
    ///
    /// Tries the durable backend first, then the ephemeral one. Unreadable
    /// records are logged and skipped.
    pub fn load_persisted(&self) -> Option<Credential> {
        for (backend, persistent) in [(&self.durable, true), (&self.ephemeral, false)] {
            match backend.load() {
                Ok(Some(credential)) => {
                    let mut slot = self.slot.write();
                    slot.generation += 1;
                    slot.session_id += 1;
                    slot.persistent = persistent;
                    slot.credential = Some(credential.clone());
                    info!(backend = backend.name(), "credential restored");
                    return Some(credential);
                }
                Ok(None) => {}
                Err(err) => self.report(backend.name(), "load", &err),
            }
        }
        None
    }

    /// True once any backend operation has failed
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Whether the current credential lives in the durable backend
    pub fn is_persistent(&self) -> bool {
        self.slot.read().persistent
    }

    fn clear_locked(&self, slot: &mut Slot) {
        slot.generation += 1;
        let had_credential = slot.credential.take().is_some();
        slot.persistent = false;
        for backend in [&self.durable, &self.ephemeral] {
            if let Err(err) = backend.clear() {
                self.report(backend.name(), "clear", &err);
            }
        }
        if had_credential {
            info!(generation = slot.generation, "credential cleared");
        }
    }

    // The tier not chosen is cleared so a stale copy cannot be restored later.
    fn write_backends(&self, credential: &Credential, persist: bool) {
        let (target, other) =
            if persist { (&self.durable, &self.ephemeral) } else { (&self.ephemeral, &self.durable) };
        if let Err(err) = target.save(credential) {
            self.report(target.name(), "save", &err);
        }
        if let Err(err) = other.clear() {
            self.report(other.name(), "clear", &err);
        }
    }

    fn report(&self, backend: &str, operation: &str, err: &StorageError) {
        self.degraded.store(true, Ordering::Relaxed);
        warn!(backend, operation, error = %err, "credential storage failed; continuing in memory");
    }
}
