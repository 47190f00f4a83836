use crate::core::types::Candidate;
use anyhow::Result;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use spl_associated_token_account::get_associated_token_address_with_program_id;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;

pub const TOKEN_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

/// Builds the unsigned instruction list for one candidate.
pub trait PayloadBuilder: Send + Sync {
    fn build_instructions(&self, candidate: &Candidate, payer: &Pubkey) -> Result<Vec<Instruction>>;
}

/// Opens (idempotently) the payer's associated token account for the mint, then
/// appends whatever program-specific buy instructions `extra` yields.
pub struct AssociatedAccountPurchase {
    token_program: Pubkey,
    extra: Option<Box<dyn PayloadBuilder>>,
}

impl AssociatedAccountPurchase {
    pub fn new() -> Self {
        AssociatedAccountPurchase {
            token_program: TOKEN_PROGRAM_ID,
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: Box<dyn PayloadBuilder>) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn associated_account(&self, payer: &Pubkey, mint: &Pubkey) -> Pubkey {
        get_associated_token_address_with_program_id(payer, mint, &self.token_program)
    }
}

impl Default for AssociatedAccountPurchase {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadBuilder for AssociatedAccountPurchase {
    fn build_instructions(&self, candidate: &Candidate, payer: &Pubkey) -> Result<Vec<Instruction>> {
        let mut instructions = vec![create_associated_token_account_idempotent(
            payer,
            payer,
            &candidate.entity,
            &self.token_program,
        )];

        if let Some(extra) = &self.extra {
            instructions.extend(extra.build_instructions(candidate, payer)?);
        }

        Ok(instructions)
    }
}
