use crate::core::config::MintFilterKind;
use std::sync::Arc;

/// "Is newly initialized" predicate over the fixed-layout mint header.
pub trait MintFilter: Send + Sync {
    fn is_newly_initialized(&self, data: &[u8]) -> bool;
}

/// Accepts every account; the market-cap check alone decides.
pub struct PermissiveMintFilter;

impl MintFilter for PermissiveMintFilter {
    fn is_newly_initialized(&self, _data: &[u8]) -> bool {
        true
    }
}

/// SPL mint layout (82 bytes):
/// mint_authority COption<Pubkey> [0..36], supply u64 [36..44], decimals u8 [44],
/// is_initialized bool [45], freeze_authority COption<Pubkey> [46..82]
pub struct SplMintFilter;

impl SplMintFilter {
    pub const MINT_LEN: usize = 82;
    const IS_INITIALIZED_OFFSET: usize = 45;
}

impl MintFilter for SplMintFilter {
    fn is_newly_initialized(&self, data: &[u8]) -> bool {
        data.len() >= Self::MINT_LEN && data[Self::IS_INITIALIZED_OFFSET] == 1
    }
}

pub fn mint_filter_for(kind: MintFilterKind) -> Arc<dyn MintFilter> {
    match kind {
        MintFilterKind::Permissive => Arc::new(PermissiveMintFilter),
        MintFilterKind::SplInitialized => Arc::new(SplMintFilter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spl_filter_requires_full_initialized_header() {
        let filter = SplMintFilter;
        let mut data = vec![0u8; SplMintFilter::MINT_LEN];
        assert!(!filter.is_newly_initialized(&data));
        data[45] = 1;
        assert!(filter.is_newly_initialized(&data));
        assert!(!filter.is_newly_initialized(&data[..44]));
    }

    #[test]
    fn test_permissive_accepts_anything() {
        assert!(PermissiveMintFilter.is_newly_initialized(&[]));
        assert!(mint_filter_for(MintFilterKind::Permissive).is_newly_initialized(&[0; 3]));
    }
}
