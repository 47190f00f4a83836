//! Event classifier - turns raw stream traffic into dispatch candidates
//!
//! Predicates run cheapest-reject-first: message kind, owner identity, mint
//! header predicate, then supply/price arithmetic. Nothing here allocates for
//! rejected traffic, and malformed data never raises an error: it degrades to
//! a zero supply and fails the market-cap check.

use crate::core::types::{AccountSnapshot, Candidate, RawUpdate};
use crate::strategy::mint_filter::MintFilter;
use crate::strategy::valuation::Valuator;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

/// Byte range of the little-endian supply inside the mint header.
pub const SUPPLY_OFFSET: usize = 36;
pub const SUPPLY_END: usize = SUPPLY_OFFSET + 8;

pub struct EventClassifier {
    program_id: Pubkey,
    min_market_cap: f64,
    mint_filter: Arc<dyn MintFilter>,
    valuator: Arc<dyn Valuator>,
}

impl EventClassifier {
    pub fn new(
        program_id: Pubkey,
        min_market_cap: f64,
        mint_filter: Arc<dyn MintFilter>,
        valuator: Arc<dyn Valuator>,
    ) -> Self {
        EventClassifier {
            program_id,
            min_market_cap,
            mint_filter,
            valuator,
        }
    }

    pub fn classify(&self, update: &RawUpdate) -> Option<Candidate> {
        let snapshot = match update {
            RawUpdate::Account(snapshot) => snapshot,
            RawUpdate::Transaction { .. } | RawUpdate::Other => return None,
        };
        self.classify_account(snapshot)
    }

    pub fn classify_account(&self, snapshot: &AccountSnapshot) -> Option<Candidate> {
        if snapshot.owner != self.program_id {
            return None;
        }

        if !self.mint_filter.is_newly_initialized(&snapshot.data) {
            return None;
        }

        let observed_supply = parse_supply(&snapshot.data);
        let estimated_unit_price = self.valuator.estimate_unit_price(snapshot);
        let estimated_cap = observed_supply as f64 * estimated_unit_price;

        if estimated_cap.is_nan() || estimated_cap < self.min_market_cap {
            return None;
        }

        Some(Candidate {
            entity: snapshot.address,
            observed_supply,
            estimated_unit_price,
            estimated_cap,
            slot: snapshot.slot,
        })
    }
}

/// Supply at bytes 36..44; zero when the data is too short.
pub fn parse_supply(data: &[u8]) -> u64 {
    match data.get(SUPPLY_OFFSET..SUPPLY_END) {
        Some(bytes) => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(bytes);
            u64::from_le_bytes(buf)
        }
        None => 0,
    }
}
