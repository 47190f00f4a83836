use crate::core::types::AccountSnapshot;

/// Estimated USD price of one unit of the observed mint.
pub trait Valuator: Send + Sync {
    fn estimate_unit_price(&self, snapshot: &AccountSnapshot) -> f64;
}

/// Same price for every mint.
pub struct FixedPriceValuator {
    price_usd: f64,
}

impl FixedPriceValuator {
    pub fn new(price_usd: f64) -> Self {
        FixedPriceValuator { price_usd }
    }
}

impl Valuator for FixedPriceValuator {
    fn estimate_unit_price(&self, _snapshot: &AccountSnapshot) -> f64 {
        self.price_usd
    }
}
