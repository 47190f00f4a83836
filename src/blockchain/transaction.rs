use crate::core::error::Error;
use anyhow::Result;
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::Signature,
    transaction::Transaction,
};

/// Signer collaborator: holds the private credential and signs outbound actions.
///
/// Implementations are shared across dispatch workers and must not need
/// external locking.
pub trait ActionSigner: Send + Sync {
    fn public_identity(&self) -> Pubkey;

    /// Sign `tx` in place against its own `recent_blockhash` and return the
    /// fee-payer signature.
    fn sign(&self, tx: &mut Transaction) -> Result<Signature>;
}

pub struct TransactionBuilder {
    instructions: Vec<Instruction>,
    payer: Pubkey,
}

impl TransactionBuilder {
    pub fn new(payer: Pubkey) -> Self {
        TransactionBuilder {
            instructions: Vec::new(),
            payer,
        }
    }

    pub fn add_compute_budget(&mut self, units: u32, price: u64) -> &mut Self {
        let compute_budget_ix = ComputeBudgetInstruction::set_compute_unit_limit(units);
        let priority_fee_ix = ComputeBudgetInstruction::set_compute_unit_price(price);
        self.instructions.push(compute_budget_ix);
        self.instructions.push(priority_fee_ix);
        self
    }

    pub fn add_instructions(&mut self, ixs: impl IntoIterator<Item = Instruction>) -> &mut Self {
        self.instructions.extend(ixs);
        self
    }

    /// Build an UNSIGNED transaction anchored at `blockhash`.
    ///
    /// Every call creates a fresh transaction with all-zero signatures; pass the
    /// result to [`sign_transaction`] exactly once.
    pub fn build(&self, blockhash: Hash) -> Transaction {
        let mut tx = Transaction::new_with_payer(&self.instructions, Some(&self.payer));
        tx.message.recent_blockhash = blockhash;
        tx
    }
}

/// Sign a transaction with the given signer.
///
/// Refuses to sign a transaction the signer has already signed, so a built
/// action can never be re-signed under a different reference.
pub fn sign_transaction(tx: &mut Transaction, signer: &dyn ActionSigner) -> Result<Signature> {
    let signer_pubkey = signer.public_identity();
    let signer_index = tx
        .message
        .account_keys
        .iter()
        .position(|&pk| pk == signer_pubkey);

    match signer_index {
        Some(index) if index < tx.signatures.len() => {
            if tx.signatures[index] != Signature::default() {
                return Err(Error::Signing(format!(
                    "transaction already signed by {} at index {}",
                    signer_pubkey, index
                ))
                .into());
            }
        }
        Some(_) => {}
        None => {
            return Err(Error::Signing(format!(
                "signer {} is not an account of the transaction",
                signer_pubkey
            ))
            .into());
        }
    }

    signer.sign(tx)
}
