//! In-process reference implementation of the consent contract semantics.
//!
//! Backs tests and local development with the same externally observable
//! protocol as the deployed contract: append-only report lists, the
//! duplicate-request guard, pending/granted transitions, the guardian
//! quorum, and block-indexed events with a bounded history window.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{Result, VaultError};
use crate::ledger::{
    ConsentLedger, EventFilter, EventSubscription, Identity, LedgerEvent, TxReceipt,
    EVENT_WINDOW_BLOCKS,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
struct LedgerState {
    /// Patient identity -> content hashes, insertion order preserved.
    reports: HashMap<Identity, Vec<String>>,
    /// (patient, doctor) -> granted flag.
    permissions: HashMap<(Identity, Identity), bool>,
    /// (patient, doctor) pairs with an open request.
    pending: HashSet<(Identity, Identity)>,
    guardians: HashMap<Identity, Vec<Identity>>,
    unlock_approvals: HashMap<Identity, HashSet<Identity>>,
    unlocked: HashSet<Identity>,
    block: u64,
    history: Vec<LedgerEvent>,
}

#[derive(Clone)]
pub struct MemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    events: broadcast::Sender<LedgerEvent>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(LedgerState::default())),
            events,
        }
    }

    pub fn current_block(&self) -> u64 {
        self.state.read().block
    }

    /// Advances the block counter, records the event inside the bounded
    /// history window, and pushes it to live subscribers.
    fn commit(&self, state: &mut LedgerState, event: LedgerEvent) -> TxReceipt {
        let block = event.block();
        state.history.push(event.clone());
        let horizon = block.saturating_sub(EVENT_WINDOW_BLOCKS);
        state.history.retain(|e| e.block() > horizon);

        // No subscribers is fine; send only fails then.
        let _ = self.events.send(event);

        TxReceipt {
            tx_hash: format!("0x{}", Uuid::new_v4().simple()),
            block,
        }
    }

    fn next_block(state: &mut LedgerState) -> u64 {
        state.block += 1;
        state.block
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsentLedger for MemoryLedger {
    async fn upload_report(&self, owner: &str, content_hash: &str) -> Result<TxReceipt> {
        let mut state = self.state.write();
        state
            .reports
            .entry(owner.to_string())
            .or_default()
            .push(content_hash.to_string());

        let block = Self::next_block(&mut state);
        log::info!("Report {} registered for {} at block {}", content_hash, owner, block);
        Ok(self.commit(
            &mut state,
            LedgerEvent::ReportUploaded {
                user: owner.to_string(),
                content_hash: content_hash.to_string(),
                block,
            },
        ))
    }

    async fn get_reports(&self, owner: &str) -> Result<Vec<String>> {
        Ok(self
            .state
            .read()
            .reports
            .get(owner)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_report_count(&self, owner: &str) -> Result<u64> {
        Ok(self
            .state
            .read()
            .reports
            .get(owner)
            .map(|r| r.len() as u64)
            .unwrap_or(0))
    }

    async fn request_access(&self, doctor: &str, patient: &str) -> Result<TxReceipt> {
        let mut state = self.state.write();
        let pair = (patient.to_string(), doctor.to_string());

        if state.pending.contains(&pair) {
            return Err(VaultError::LedgerCallError(format!(
                "Access request from {} to {} already pending",
                doctor, patient
            )));
        }
        if state.permissions.get(&pair).copied().unwrap_or(false) {
            return Err(VaultError::LedgerCallError(format!(
                "Access for {} to {} already granted",
                doctor, patient
            )));
        }

        state.pending.insert(pair);
        let block = Self::next_block(&mut state);
        log::info!("Access requested by {} for patient {}", doctor, patient);
        Ok(self.commit(
            &mut state,
            LedgerEvent::AccessRequested {
                doctor: doctor.to_string(),
                patient: patient.to_string(),
                block,
            },
        ))
    }

    async fn approve_access(
        &self,
        patient: &str,
        doctor: &str,
        grant: bool,
    ) -> Result<TxReceipt> {
        let mut state = self.state.write();
        let pair = (patient.to_string(), doctor.to_string());

        let was_pending = state.pending.remove(&pair);
        let was_granted = state.permissions.get(&pair).copied().unwrap_or(false);
        if !was_pending && !was_granted {
            return Err(VaultError::LedgerCallError(format!(
                "No pending request or active grant for {} on {}",
                doctor, patient
            )));
        }

        state.permissions.insert(pair, grant);
        let block = Self::next_block(&mut state);
        log::info!(
            "Patient {} {} access for {}",
            patient,
            if grant { "granted" } else { "denied" },
            doctor
        );
        Ok(self.commit(
            &mut state,
            LedgerEvent::AccessApproved {
                doctor: doctor.to_string(),
                patient: patient.to_string(),
                granted: grant,
                block,
            },
        ))
    }

    async fn doctor_permissions(&self, patient: &str, doctor: &str) -> Result<bool> {
        Ok(self
            .state
            .read()
            .permissions
            .get(&(patient.to_string(), doctor.to_string()))
            .copied()
            .unwrap_or(false))
    }

    async fn has_pending_request(&self, patient: &str, doctor: &str) -> Result<bool> {
        Ok(self
            .state
            .read()
            .pending
            .contains(&(patient.to_string(), doctor.to_string())))
    }

    async fn assign_guardians(&self, patient: &str, guardians: &[Identity]) -> Result<TxReceipt> {
        if guardians.len() < 2 || guardians.len() > 10 {
            return Err(VaultError::LedgerCallError(format!(
                "Guardian set must hold 2-10 identities, got {}",
                guardians.len()
            )));
        }

        let mut state = self.state.write();
        state
            .guardians
            .insert(patient.to_string(), guardians.to_vec());
        state.unlock_approvals.remove(patient);
        state.unlocked.remove(patient);

        state.block += 1;
        Ok(TxReceipt {
            tx_hash: format!("0x{}", Uuid::new_v4().simple()),
            block: state.block,
        })
    }

    async fn request_unlock(&self, guardian: &str, patient: &str) -> Result<TxReceipt> {
        let mut state = self.state.write();
        let assigned = state.guardians.get(patient).ok_or_else(|| {
            VaultError::LedgerCallError(format!("No guardians assigned for {}", patient))
        })?;
        if !assigned.iter().any(|g| g == guardian) {
            return Err(VaultError::PermissionDenied(format!(
                "{} is not a guardian of {}",
                guardian, patient
            )));
        }

        // A new unlock round resets any stale approvals.
        state
            .unlock_approvals
            .insert(patient.to_string(), HashSet::new());

        state.block += 1;
        log::info!("Emergency unlock requested for {} by {}", patient, guardian);
        Ok(TxReceipt {
            tx_hash: format!("0x{}", Uuid::new_v4().simple()),
            block: state.block,
        })
    }

    async fn approve_unlock(&self, guardian: &str, patient: &str) -> Result<TxReceipt> {
        let mut state = self.state.write();
        let assigned = state.guardians.get(patient).cloned().ok_or_else(|| {
            VaultError::LedgerCallError(format!("No guardians assigned for {}", patient))
        })?;
        if !assigned.iter().any(|g| g == guardian) {
            return Err(VaultError::PermissionDenied(format!(
                "{} is not a guardian of {}",
                guardian, patient
            )));
        }

        let approvals = state
            .unlock_approvals
            .entry(patient.to_string())
            .or_default();
        approvals.insert(guardian.to_string());
        let quorum = assigned.len() / 2 + 1;
        let approved = approvals.len();

        if approved >= quorum {
            state.unlocked.insert(patient.to_string());
            log::info!(
                "Emergency unlock granted for {} ({}/{} approvals)",
                patient,
                approved,
                quorum
            );
        }

        state.block += 1;
        Ok(TxReceipt {
            tx_hash: format!("0x{}", Uuid::new_v4().simple()),
            block: state.block,
        })
    }

    async fn is_unlocked(&self, patient: &str) -> Result<bool> {
        Ok(self.state.read().unlocked.contains(patient))
    }

    async fn recent_events(&self, filter: &EventFilter) -> Result<Vec<LedgerEvent>> {
        let state = self.state.read();
        let horizon = state.block.saturating_sub(EVENT_WINDOW_BLOCKS);
        Ok(state
            .history
            .iter()
            .filter(|e| e.block() > horizon && filter.matches(e))
            .cloned()
            .collect())
    }

    fn subscribe(&self, filter: EventFilter) -> EventSubscription {
        EventSubscription::new(self.events.subscribe(), filter)
    }
}
