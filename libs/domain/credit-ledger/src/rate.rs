// [libs/domain/credit-ledger/src/rate.rs]
use chrono::{DateTime, Utc};

/// Snapshot of the CU/USDC exchange rate captured at reserve time. The
/// reserve receipt carries this snapshot and every later operation on
/// that reservation — finalize, rollback, any USDC-denominated reporting
/// — reconverts through it rather than the live rate, so a mid-flight rate change never changes
/// what an in-flight reservation is worth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeRateTable {
    /// How many CU one USDC-micro-unit is worth.
    pub cu_per_usdc_micro: u64,
    pub captured_at: DateTime<Utc>,
}

impl ExchangeRateTable {
    pub fn new(cu_per_usdc_micro: u64, captured_at: DateTime<Utc>) -> Self {
        assert!(cu_per_usdc_micro > 0, "exchange rate must be positive");
        Self { cu_per_usdc_micro, captured_at }
    }

    /// Converts a USDC-micro amount to CU. Exact: CU is the finer-grained
    /// unit here, so no rounding is lost going in this direction.
    pub fn to_cu(self, usdc_micro: u64) -> u64 {
        usdc_micro.saturating_mul(self.cu_per_usdc_micro)
    }

    /// Converts CU back to a USDC-micro amount, rounding down — commit
    /// and refund never return more value than was reserved.
    pub fn to_usdc_micro_floor(self, cu: u64) -> u64 {
        cu / self.cu_per_usdc_micro
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ExchangeRateTable {
        ExchangeRateTable::new(10, Utc::now())
    }

    #[test]
    fn cu_round_trip_never_underpays_and_drift_is_bounded() {
        let rate = table();
        for usdc_micro in 0..50u64 {
            let cu = usdc_micro * rate.cu_per_usdc_micro;
            let back = rate.to_usdc_micro_floor(cu);
            assert_eq!(back, usdc_micro);
        }
    }
}
