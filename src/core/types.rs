use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::fmt;
use std::time::SystemTime;

/// Observed state of one on-chain account at one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub owner: Pubkey,
    pub address: Pubkey,
    pub data: Vec<u8>,
    pub slot: u64,
}

/// Message kinds delivered by the streaming transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawUpdate {
    Account(AccountSnapshot),
    Transaction { signature: String, slot: u64 },
    Other,
}

/// A mint that passed every filter predicate.
///
/// `estimated_cap` is always `observed_supply * estimated_unit_price` and is never
/// below the threshold the classifier was built with.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub entity: Pubkey,
    pub observed_supply: u64,
    pub estimated_unit_price: f64,
    pub estimated_cap: f64,
    pub slot: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Pending,
    Submitted,
    Failed,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchState::Pending => write!(f, "pending"),
            DispatchState::Submitted => write!(f, "submitted"),
            DispatchState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub entity: Pubkey,
    pub state: DispatchState,
    pub attempted_at: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Submitted(Signature),
    Skipped(String),
    Failed(String),
}

impl Outcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, Outcome::Submitted(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Submitted(sig) => write!(f, "submitted ({})", sig),
            Outcome::Skipped(reason) => write!(f, "skipped ({})", reason),
            Outcome::Failed(err) => write!(f, "failed ({})", err),
        }
    }
}
