//! Readiness gate and column family provisioning.
//!
//! A [`ReadinessGate`] starts `Pending` and is resolved exactly once by
//! [`ReadinessGate::provision`]. Callers that arrive while it is pending are
//! queued and released in arrival order with the same outcome; callers that
//! arrive afterwards observe the stored outcome immediately.
//!
//! ```text
//!             provision() ok
//!   Pending ─────────────────► Ready(families)
//!      │
//!      │      non-"missing" failure
//!      └─────────────────────► Failed(family, error)
//! ```

use std::{fmt, mem, sync::Arc};

use parking_lot::Mutex;
use proteus_session_storage::{FamilySchema, RecordFamily, SENTINEL_KEY, StorageError, StorageResult};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::error::{Result, SessionError};

/// Observable phase of a [`ReadinessGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
    /// Provisioning has not finished.
    Pending,
    /// Both families are usable.
    Ready,
    /// Provisioning failed; the failure is replayed to every caller.
    Failed,
}

/// The two family handles session operations run against.
#[derive(Clone)]
pub struct Families {
    /// Session attribute rows, keyed by user id.
    pub store: Arc<dyn RecordFamily>,
    /// Ticket and token rows.
    pub ticket: Arc<dyn RecordFamily>,
}

impl fmt::Debug for Families {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Families")
            .field("store", &self.store.name())
            .field("ticket", &self.ticket.name())
            .finish()
    }
}

/// A provisioning failure, recorded once and cloned out to each caller.
#[derive(Debug, Clone)]
pub struct ProvisioningFailure {
    family: String,
    source: Arc<StorageError>,
}

impl ProvisioningFailure {
    /// Records that checking `family` failed with `source`.
    #[must_use]
    pub fn new(family: impl Into<String>, source: StorageError) -> Self {
        Self { family: family.into(), source: Arc::new(source) }
    }

    /// Family whose check failed.
    #[must_use]
    pub fn family(&self) -> &str {
        &self.family
    }

    fn to_error(&self) -> SessionError {
        SessionError::Provisioning { family: self.family.clone(), source: Arc::clone(&self.source) }
    }
}

/// Returned when a gate that already left `Pending` is resolved again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("readiness gate already resolved")]
pub struct GateAlreadyResolved;

/// Outcome delivered to readiness listeners.
pub type ReadyOutcome = Result<Families>;

type ReadyCallback = Box<dyn FnOnce(ReadyOutcome) + Send>;

enum Listener {
    Waiter(oneshot::Sender<ReadyOutcome>),
    Callback(ReadyCallback),
}

impl Listener {
    fn deliver(self, outcome: ReadyOutcome) {
        match self {
            // A dropped receiver means the caller gave up waiting.
            Self::Waiter(tx) => {
                let _ = tx.send(outcome);
            },
            Self::Callback(callback) => callback(outcome),
        }
    }
}

enum GateState {
    Pending(Vec<Listener>),
    Ready(Families),
    Failed(ProvisioningFailure),
}

impl GateState {
    fn outcome(&self) -> Option<ReadyOutcome> {
        match self {
            Self::Pending(_) => None,
            Self::Ready(families) => Some(Ok(families.clone())),
            Self::Failed(failure) => Some(Err(failure.to_error())),
        }
    }
}

/// One-shot startup latch with an ordered wait queue.
///
/// Listeners are invoked outside the internal lock, so a listener may call
/// back into the gate.
pub struct ReadinessGate {
    state: Mutex<GateState>,
}

impl fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessGate").field("state", &self.state()).finish()
    }
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    /// Creates a pending gate with an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self { state: Mutex::new(GateState::Pending(Vec::new())) }
    }

    /// Current phase.
    #[must_use]
    pub fn state(&self) -> ReadyState {
        match &*self.state.lock() {
            GateState::Pending(_) => ReadyState::Pending,
            GateState::Ready(_) => ReadyState::Ready,
            GateState::Failed(_) => ReadyState::Failed,
        }
    }

    /// Number of listeners queued behind provisioning.
    #[must_use]
    pub fn queued(&self) -> usize {
        match &*self.state.lock() {
            GateState::Pending(listeners) => listeners.len(),
            _ => 0,
        }
    }

    /// Waits for provisioning and returns the family handles.
    ///
    /// # Errors
    ///
    /// Returns the recorded [`SessionError::Provisioning`] failure, or
    /// [`SessionError::GateClosed`] if the gate is dropped while pending.
    pub async fn ensure_ready(&self) -> ReadyOutcome {
        let rx = {
            let mut state = self.state.lock();
            if let Some(outcome) = state.outcome() {
                return outcome;
            }
            let (tx, rx) = oneshot::channel();
            if let GateState::Pending(listeners) = &mut *state {
                listeners.push(Listener::Waiter(tx));
            }
            rx
        };
        rx.await.map_err(|_| SessionError::GateClosed)?
    }

    /// Registers `callback` for the provisioning outcome.
    ///
    /// Runs immediately (on the calling thread) once the gate is resolved,
    /// otherwise after every listener queued before it.
    pub fn on_ready(&self, callback: impl FnOnce(ReadyOutcome) + Send + 'static) {
        let outcome = {
            let mut state = self.state.lock();
            match &mut *state {
                GateState::Pending(listeners) => {
                    listeners.push(Listener::Callback(Box::new(callback)));
                    return;
                },
                resolved => resolved.outcome(),
            }
        };
        if let Some(outcome) = outcome {
            callback(outcome);
        }
    }

    /// Moves the gate out of `Pending` and drains the queue in FIFO order.
    ///
    /// # Errors
    ///
    /// Returns [`GateAlreadyResolved`] if the gate was already resolved; the
    /// stored outcome is left untouched.
    pub fn resolve(
        &self,
        outcome: std::result::Result<Families, ProvisioningFailure>,
    ) -> std::result::Result<(), GateAlreadyResolved> {
        let next = match &outcome {
            Ok(families) => GateState::Ready(families.clone()),
            Err(failure) => GateState::Failed(failure.clone()),
        };

        let previous = {
            let mut state = self.state.lock();
            if !matches!(*state, GateState::Pending(_)) {
                drop(state);
                tracing::error!("readiness gate resolved twice; keeping the first outcome");
                return Err(GateAlreadyResolved);
            }
            mem::replace(&mut *state, next)
        };
        let GateState::Pending(listeners) = previous else {
            return Err(GateAlreadyResolved);
        };

        tracing::debug!(listeners = listeners.len(), "releasing queued readiness listeners");
        for listener in listeners {
            let delivered = match &outcome {
                Ok(families) => Ok(families.clone()),
                Err(failure) => Err(failure.to_error()),
            };
            listener.deliver(delivered);
        }
        Ok(())
    }

    /// Verifies both families, creating any that are missing, then resolves
    /// the gate.
    ///
    /// The store family is checked before the ticket family. A failure other
    /// than "missing family" stops provisioning and resolves the gate as
    /// failed. A failed `create` is logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`GateAlreadyResolved`] if the gate was resolved elsewhere.
    #[tracing::instrument(skip_all, fields(store = %families.store.name(), ticket = %families.ticket.name()))]
    pub async fn provision(&self, families: Families) -> std::result::Result<(), GateAlreadyResolved> {
        for family in [&families.store, &families.ticket] {
            if let Err(source) = ensure_family(family.as_ref()).await {
                tracing::error!(family = family.name(), error = %source, "column family check failed");
                return self.resolve(Err(ProvisioningFailure::new(family.name(), source)));
            }
        }

        tracing::info!("session store ready");
        self.resolve(Ok(families))
    }
}

/// Reads the sentinel key from `family` and creates it when missing.
async fn ensure_family(family: &dyn RecordFamily) -> StorageResult<()> {
    match family.get(SENTINEL_KEY, &[]).await {
        Ok(_) => Ok(()),
        Err(err) if err.is_missing_family() => {
            tracing::info!(family = family.name(), "column family missing; creating");
            // Not fatal: later operations report their own storage errors.
            if let Err(create_err) = family.create(&FamilySchema::utf8()).await {
                tracing::warn!(
                    family = family.name(),
                    error = %create_err,
                    "column family creation failed; continuing"
                );
            }
            Ok(())
        },
        Err(err) => Err(err),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::panic)]
mod tests {
    use std::sync::Arc;

    use proteus_session_storage::{
        Keyspace, MemoryKeyspace, StorageError,
        testutil::{RecordedCall, ScriptedKeyspace},
    };

    use super::*;

    fn families(keyspace: &impl Keyspace) -> Families {
        Families { store: keyspace.family("store"), ticket: keyspace.family("ticket") }
    }

    #[tokio::test]
    async fn test_provision_creates_missing_families() {
        let keyspace = MemoryKeyspace::new();
        let gate = ReadinessGate::new();

        gate.provision(families(&keyspace)).await.expect("first resolve");

        assert_eq!(gate.state(), ReadyState::Ready);
        assert!(keyspace.contains_family("store"));
        assert!(keyspace.contains_family("ticket"));
    }

    #[tokio::test]
    async fn test_provision_leaves_existing_families() {
        let keyspace = ScriptedKeyspace::with_families(["store", "ticket"]);
        let gate = ReadinessGate::new();

        gate.provision(families(&keyspace)).await.expect("first resolve");

        assert_eq!(gate.state(), ReadyState::Ready);
        assert!(!keyspace.scripted("store").calls().contains(&RecordedCall::Create));
    }

    #[tokio::test]
    async fn test_store_failure_skips_ticket_family() {
        let keyspace = ScriptedKeyspace::new(MemoryKeyspace::new());
        keyspace.scripted("store").fail_gets(|_| StorageError::connection("down"));
        let gate = ReadinessGate::new();

        gate.provision(families(&keyspace)).await.expect("first resolve");

        assert_eq!(gate.state(), ReadyState::Failed);
        assert!(keyspace.scripted("ticket").calls().is_empty());
        match gate.ensure_ready().await {
            Err(SessionError::Provisioning { family, .. }) => assert_eq!(family, "store"),
            other => panic!("expected provisioning failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_failure_is_swallowed() {
        let keyspace = ScriptedKeyspace::new(MemoryKeyspace::new());
        keyspace.scripted("ticket").fail_creates(|name| StorageError::family_exists(name));
        let gate = ReadinessGate::new();

        gate.provision(families(&keyspace)).await.expect("first resolve");

        assert_eq!(gate.state(), ReadyState::Ready);
    }

    #[tokio::test]
    async fn test_second_resolve_keeps_first_outcome() {
        let keyspace = MemoryKeyspace::with_families(["store", "ticket"]);
        let gate = ReadinessGate::new();
        gate.resolve(Ok(families(&keyspace))).expect("first resolve");

        let again = gate.resolve(Err(ProvisioningFailure::new("store", StorageError::timeout())));

        assert_eq!(again, Err(GateAlreadyResolved));
        assert_eq!(gate.state(), ReadyState::Ready);
    }

    #[tokio::test]
    async fn test_callbacks_drain_in_arrival_order() {
        let keyspace = MemoryKeyspace::with_families(["store", "ticket"]);
        let gate = ReadinessGate::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = Arc::clone(&order);
            gate.on_ready(move |outcome| {
                assert!(outcome.is_ok());
                order.lock().push(i);
            });
        }
        assert_eq!(gate.queued(), 3);

        gate.resolve(Ok(families(&keyspace))).expect("first resolve");

        assert_eq!(*order.lock(), vec![0, 1, 2]);
        assert_eq!(gate.queued(), 0);
    }

    #[tokio::test]
    async fn test_callback_after_resolution_runs_immediately() {
        let keyspace = MemoryKeyspace::with_families(["store", "ticket"]);
        let gate = ReadinessGate::new();
        gate.resolve(Ok(families(&keyspace))).expect("first resolve");

        let ran = Arc::new(parking_lot::Mutex::new(false));
        let flag = Arc::clone(&ran);
        gate.on_ready(move |outcome| *flag.lock() = outcome.is_ok());

        assert!(*ran.lock());
    }

    #[tokio::test]
    async fn test_lost_waiter_reports_gate_closed() {
        let gate = Arc::new(ReadinessGate::new());
        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.ensure_ready().await })
        };
        tokio::task::yield_now().await;
        assert_eq!(gate.queued(), 1);

        // Replace the queue with an empty one, dropping the queued sender.
        *gate.state.lock() = GateState::Pending(Vec::new());

        let outcome = waiter.await.expect("join");
        assert!(matches!(outcome, Err(SessionError::GateClosed)));
    }
}
