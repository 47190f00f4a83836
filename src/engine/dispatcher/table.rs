//! Dispatch table - at-most-once ledger of attempted entities
//!
//! A record is inserted before any side effect and is never removed, so an
//! entity that has been claimed once is never claimed again for the lifetime
//! of the process, whatever its final state.

use crate::core::types::{DispatchRecord, DispatchState};
use parking_lot::Mutex;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::time::SystemTime;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TableCounts {
    pub pending: usize,
    pub submitted: usize,
    pub failed: usize,
}

impl TableCounts {
    pub fn total(&self) -> usize {
        self.pending + self.submitted + self.failed
    }
}

#[derive(Default)]
pub struct DispatchTable {
    records: Mutex<HashMap<Pubkey, DispatchRecord>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        DispatchTable {
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically insert a `Pending` record for `entity`.
    ///
    /// Returns `false` if any record already exists. Lookup and insert happen
    /// under one lock acquisition, so two concurrent callers can never both win.
    pub fn try_claim(&self, entity: &Pubkey) -> bool {
        let mut records = self.records.lock();
        if records.contains_key(entity) {
            return false;
        }
        records.insert(
            *entity,
            DispatchRecord {
                entity: *entity,
                state: DispatchState::Pending,
                attempted_at: SystemTime::now(),
            },
        );
        true
    }

    /// Move a claimed record to its terminal state.
    ///
    /// Unknown entities are ignored; marking never creates a record.
    pub fn mark(&self, entity: &Pubkey, state: DispatchState) {
        let mut records = self.records.lock();
        match records.get_mut(entity) {
            Some(record) => record.state = state,
            None => log::warn!("DispatchTable: mark({}) on unclaimed entity ignored", entity),
        }
    }

    pub fn get(&self, entity: &Pubkey) -> Option<DispatchRecord> {
        self.records.lock().get(entity).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn counts(&self) -> TableCounts {
        let records = self.records.lock();
        let mut counts = TableCounts::default();
        for record in records.values() {
            match record.state {
                DispatchState::Pending => counts.pending += 1,
                DispatchState::Submitted => counts.submitted += 1,
                DispatchState::Failed => counts.failed += 1,
            }
        }
        counts
    }
}
