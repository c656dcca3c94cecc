//! On-chain consent protocol surface.
//!
//! The contract itself is external; this module specifies the client's view
//! of it: report registration, the doctor/patient grant state machine, the
//! guardian emergency-unlock capability, and block-indexed events. Grant
//! state is authoritative on the ledger and must be re-queried, never
//! cached across sessions.

pub mod memory;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;

pub use memory::MemoryLedger;

/// Ledger identity (an address string).
pub type Identity = String;

/// How far back `recent_events` looks. Full-history scans on a long chain
/// are unboundedly expensive, so consumers get a bounded window plus live
/// push for anything newer.
pub const EVENT_WINDOW_BLOCKS: u64 = 10_000;

/// Grant status of a (patient, doctor) pair. A grant must pass through
/// `Pending` before `Granted`; the ledger contract enforces that ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantState {
    None,
    Pending,
    Granted,
    Denied,
}

/// Submit half of a ledger mutation. The call itself awaits inclusion;
/// the receipt carries the handle and the block the write landed in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    ReportUploaded {
        user: Identity,
        content_hash: String,
        block: u64,
    },
    AccessRequested {
        doctor: Identity,
        patient: Identity,
        block: u64,
    },
    AccessApproved {
        doctor: Identity,
        patient: Identity,
        granted: bool,
        block: u64,
    },
}

impl LedgerEvent {
    pub fn block(&self) -> u64 {
        match self {
            LedgerEvent::ReportUploaded { block, .. }
            | LedgerEvent::AccessRequested { block, .. }
            | LedgerEvent::AccessApproved { block, .. } => *block,
        }
    }

    fn touches(&self, identity: &str) -> bool {
        match self {
            LedgerEvent::ReportUploaded { user, .. } => user == identity,
            LedgerEvent::AccessRequested { doctor, patient, .. }
            | LedgerEvent::AccessApproved { doctor, patient, .. } => {
                doctor == identity || patient == identity
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ReportUploaded,
    AccessRequested,
    AccessApproved,
}

/// Filter for subscriptions and historical queries. `None` fields match
/// everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub kind: Option<EventKind>,
    pub identity: Option<Identity>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_identity(identity: impl Into<Identity>) -> Self {
        Self {
            kind: None,
            identity: Some(identity.into()),
        }
    }

    pub fn kind(kind: EventKind) -> Self {
        Self {
            kind: Some(kind),
            identity: None,
        }
    }

    pub fn matches(&self, event: &LedgerEvent) -> bool {
        let kind_ok = match self.kind {
            None => true,
            Some(EventKind::ReportUploaded) => {
                matches!(event, LedgerEvent::ReportUploaded { .. })
            }
            Some(EventKind::AccessRequested) => {
                matches!(event, LedgerEvent::AccessRequested { .. })
            }
            Some(EventKind::AccessApproved) => {
                matches!(event, LedgerEvent::AccessApproved { .. })
            }
        };
        let identity_ok = match &self.identity {
            None => true,
            Some(identity) => event.touches(identity),
        };
        kind_ok && identity_ok
    }
}

/// Live event subscription. Long-lived for a dashboard session; call
/// `unsubscribe` on teardown so reconnects do not accumulate duplicate
/// deliveries.
pub struct EventSubscription {
    rx: broadcast::Receiver<LedgerEvent>,
    filter: EventFilter,
}

impl EventSubscription {
    pub(crate) fn new(rx: broadcast::Receiver<LedgerEvent>, filter: EventFilter) -> Self {
        Self { rx, filter }
    }

    /// Next matching event, or `None` once the ledger side has shut down.
    /// A lagged receiver skips missed events rather than erroring; callers
    /// needing the gap re-query `recent_events`.
    pub async fn next(&mut self) -> Option<LedgerEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Event subscription lagged, skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

/// Client surface of the consent contract. Mutating calls are two-phase at
/// the protocol level: awaiting them covers submission and inclusion, and
/// the returned receipt identifies the landed transaction.
#[allow(async_fn_in_trait)]
pub trait ConsentLedger {
    /// Appends a content hash to the identity's report list. Append-only;
    /// reports are never deleted.
    async fn upload_report(&self, owner: &str, content_hash: &str) -> Result<TxReceipt>;

    /// Report hashes in insertion order. Finite and re-fetchable.
    async fn get_reports(&self, owner: &str) -> Result<Vec<String>>;

    async fn get_report_count(&self, owner: &str) -> Result<u64>;

    /// Creates a pending grant. Fails when a pending or granted entry
    /// already exists for the pair; the duplicate guard is ledger-side.
    async fn request_access(&self, doctor: &str, patient: &str) -> Result<TxReceipt>;

    /// Patient's response: Pending -> Granted/Denied. Also revokes an
    /// existing grant when called with `grant = false`.
    async fn approve_access(&self, patient: &str, doctor: &str, grant: bool)
        -> Result<TxReceipt>;

    /// Authoritative current grant flag; never cache across sessions.
    async fn doctor_permissions(&self, patient: &str, doctor: &str) -> Result<bool>;

    async fn has_pending_request(&self, patient: &str, doctor: &str) -> Result<bool>;

    /// Designates 2-10 guardian identities for emergency unlock.
    async fn assign_guardians(&self, patient: &str, guardians: &[Identity]) -> Result<TxReceipt>;

    /// Guardian-initiated emergency unlock request.
    async fn request_unlock(&self, guardian: &str, patient: &str) -> Result<TxReceipt>;

    /// One guardian approval; the contract grants emergency access when
    /// its quorum is met.
    async fn approve_unlock(&self, guardian: &str, patient: &str) -> Result<TxReceipt>;

    async fn is_unlocked(&self, patient: &str) -> Result<bool>;

    /// Matching events from the bounded historical window
    /// (`EVENT_WINDOW_BLOCKS`), oldest first.
    async fn recent_events(&self, filter: &EventFilter) -> Result<Vec<LedgerEvent>>;

    /// Live push subscription; see `EventSubscription`.
    fn subscribe(&self, filter: EventFilter) -> EventSubscription;
}

/// Derives the grant state from the two observable ledger predicates.
///
/// `Denied` is indistinguishable from `None` through the predicates alone;
/// it only surfaces through an `AccessApproved(granted = false)` event.
/// That is a protocol limitation, kept for compatibility.
pub async fn query_grant_state<L: ConsentLedger>(
    ledger: &L,
    patient: &str,
    doctor: &str,
) -> Result<GrantState> {
    if ledger.doctor_permissions(patient, doctor).await? {
        return Ok(GrantState::Granted);
    }
    if ledger.has_pending_request(patient, doctor).await? {
        return Ok(GrantState::Pending);
    }
    Ok(GrantState::None)
}
