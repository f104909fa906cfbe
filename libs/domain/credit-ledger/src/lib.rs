// [libs/domain/credit-ledger/src/lib.rs]
//! Reserve/commit/release credit account state machine. Credits are held in an abstract credit unit (CU); a
//! reservation is a tentative hold that is later finalized (CU actually
//! spent) or rolled back (CU returned to the wallet). The exchange rate
//! used to price a reservation is frozen at reserve time and travels
//! with the reservation so a later rate change never retroactively
//! changes what an in-flight reservation is worth.

mod account;
mod rate;
mod reservation;

pub use account::{conserves_total, CreditAccount};
pub use rate::ExchangeRateTable;
pub use reservation::{Reservation, ReservationState};

use chrono::{Duration as ChronoDuration, Utc};
use gateway_error::{ErrorKind, GatewayError};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Outcome of a `reserveCredits` call. `CreditsLocked` and `FallbackUsdc`
/// are ordinary routing decisions, not failures — the caller is expected
/// to fall back to an x402 micro-payment quote rather than treat them as
/// an internal error.
#[derive(Debug, Clone)]
pub enum ReserveOutcome {
    Reserved(Reservation),
    /// `allocated > 0 ∧ unlocked = 0`: the wallet has an allocation but
    /// it has been fully drawn down for this period.
    CreditsLocked,
    /// No account, a fully-zeroed account, or insufficient unlocked
    /// balance: the caller should quote an on-chain payment instead.
    FallbackUsdc,
}

pub struct CreditLedgerSettings {
    pub reservation_ttl: ChronoDuration,
    pub rate: ExchangeRateTable,
}

/// In-process credit account store. The credit store is authoritative
/// over a reservation; this type is the credit
/// store.
pub struct CreditLedger {
    accounts: Mutex<HashMap<String, CreditAccount>>,
    reservations: Mutex<HashMap<Uuid, Reservation>>,
    settings: CreditLedgerSettings,
}

impl CreditLedger {
    pub fn new(settings: CreditLedgerSettings) -> Self {
        Self { accounts: Mutex::new(HashMap::new()), reservations: Mutex::new(HashMap::new()), settings }
    }

    /// Seeds or overwrites a wallet's account, for provisioning/tests.
    pub fn seed_account(&self, wallet: &str, account: CreditAccount) {
        self.accounts.lock().unwrap().insert(wallet.to_string(), account);
    }

    pub fn account(&self, wallet: &str) -> Option<CreditAccount> {
        self.accounts.lock().unwrap().get(wallet).copied()
    }

    /// Reserves `amount_cu` credits against `wallet`.
    pub fn reserve_credits(&self, wallet: &str, amount_cu: u64) -> ReserveOutcome {
        let mut accounts = self.accounts.lock().unwrap();
        let Some(account) = accounts.get_mut(wallet) else {
            return ReserveOutcome::FallbackUsdc;
        };

        if account.allocated > 0 && account.unlocked == 0 {
            return ReserveOutcome::CreditsLocked;
        }
        if account.unlocked + account.reserved + account.consumed == 0 {
            return ReserveOutcome::FallbackUsdc;
        }
        if account.unlocked < amount_cu {
            return ReserveOutcome::FallbackUsdc;
        }

        let before = *account;
        account.reserve(amount_cu);
        debug_assert!(conserves_total(&before, account));

        let now = Utc::now();
        let reservation = Reservation {
            id: Uuid::new_v4(),
            wallet: wallet.to_string(),
            amount_cu,
            rate_snapshot: self.settings.rate,
            created_at: now,
            expires_at: now + self.settings.reservation_ttl,
            state: ReservationState::Reserved,
        };
        self.reservations.lock().unwrap().insert(reservation.id, reservation.clone());
        ReserveOutcome::Reserved(reservation)
    }

    /// Moves a reservation's held amount from `reserved` to `consumed`.
    /// A no-op returning `ReservationNotFound` if the reservation is
    /// absent; re-finalizing an already-finalized
    /// reservation is likewise a no-op, since the credits have already
    /// landed where they belong.
    pub fn finalize(&self, reservation_id: Uuid) -> Result<(), GatewayError> {
        self.settle(reservation_id, ReservationState::Consumed, CreditAccount::finalize)
    }

    /// Moves a reservation's held amount back to `unlocked`. A no-op
    /// returning `ReservationNotFound` if the reservation is absent.
    pub fn rollback(&self, reservation_id: Uuid) -> Result<(), GatewayError> {
        self.settle(reservation_id, ReservationState::Released, CreditAccount::rollback)
    }

    fn settle(
        &self,
        reservation_id: Uuid,
        target_state: ReservationState,
        apply: fn(&mut CreditAccount, u64),
    ) -> Result<(), GatewayError> {
        let mut reservations = self.reservations.lock().unwrap();
        let Some(reservation) = reservations.get_mut(&reservation_id) else {
            return Err(GatewayError::new(ErrorKind::ReservationNotFound, "reservation not found"));
        };
        if !matches!(reservation.state, ReservationState::Reserved) {
            return Ok(());
        }

        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
        .get_mut(&reservation.wallet)
        .expect("reservation exists only for wallets with an account");
        let before = *account;
        apply(account, reservation.amount_cu);
        debug_assert!(conserves_total(&before, account));

        reservation.state = target_state;
        Ok(())
    }

    /// Sweeps reservations past their `expires_at` into the account's
    /// `expired` bucket instead of returning them to `unlocked` — an
    /// expired hold is a forfeited credit, not a returned one.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut reservations = self.reservations.lock().unwrap();
        let mut accounts = self.accounts.lock().unwrap();
        let mut swept = 0;
        for reservation in reservations.values_mut() {
            if matches!(reservation.state, ReservationState::Reserved) && reservation.expires_at <= now {
                if let Some(account) = accounts.get_mut(&reservation.wallet) {
                    account.reserved -= reservation.amount_cu;
                    account.expired += reservation.amount_cu;
                }
                reservation.state = ReservationState::Released;
                swept += 1;
            }
        }
        swept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> CreditLedger {
        CreditLedger::new(CreditLedgerSettings {
                reservation_ttl: ChronoDuration::seconds(300),
                rate: ExchangeRateTable::new(10, Utc::now()),
        })
    }

    #[test]
    fn reserve_then_finalize_lands_on_spec_scenario_3() {
        let ledger = ledger();
        ledger.seed_account("w1", CreditAccount { unlocked: 100, ..Default::default() });

        let ReserveOutcome::Reserved(reservation) = ledger.reserve_credits("w1", 10) else {
            panic!("expected reservation");
        };
        ledger.finalize(reservation.id).unwrap();

        assert_eq!(ledger.account("w1").unwrap(), CreditAccount { unlocked: 90, reserved: 0, consumed: 10, ..Default::default() });
    }

    #[test]
    fn reserve_then_rollback_lands_on_spec_scenario_4() {
        let ledger = ledger();
        ledger.seed_account("w1", CreditAccount { unlocked: 50, ..Default::default() });

        let ReserveOutcome::Reserved(reservation) = ledger.reserve_credits("w1", 5) else {
            panic!("expected reservation");
        };
        ledger.rollback(reservation.id).unwrap();

        assert_eq!(ledger.account("w1").unwrap(), CreditAccount { unlocked: 50, ..Default::default() });
    }

    #[test]
    fn allocated_with_zero_unlocked_reports_credits_locked() {
        let ledger = ledger();
        ledger.seed_account("w1", CreditAccount { allocated: 100, unlocked: 0, consumed: 100, ..Default::default() });
        assert!(matches!(ledger.reserve_credits("w1", 1), ReserveOutcome::CreditsLocked));
    }

    #[test]
    fn never_unlocked_allocation_reports_credits_locked_not_fallback() {
        // allocated > 0 but unlocked/reserved/consumed all zero: an
        // allocation that has never been drawn down. credits_locked must
        // win over the zero-sum fallback check.
        let ledger = ledger();
        ledger.seed_account("w1", CreditAccount { allocated: 100, ..Default::default() });
        assert!(matches!(ledger.reserve_credits("w1", 1), ReserveOutcome::CreditsLocked));
    }

    #[test]
    fn missing_account_falls_back_to_usdc() {
        let ledger = ledger();
        assert!(matches!(ledger.reserve_credits("nobody", 1), ReserveOutcome::FallbackUsdc));
    }

    #[test]
    fn zeroed_account_falls_back_to_usdc() {
        let ledger = ledger();
        ledger.seed_account("w1", CreditAccount::default());
        assert!(matches!(ledger.reserve_credits("w1", 1), ReserveOutcome::FallbackUsdc));
    }

    #[test]
    fn insufficient_unlocked_falls_back_to_usdc() {
        let ledger = ledger();
        ledger.seed_account("w1", CreditAccount { unlocked: 4, ..Default::default() });
        assert!(matches!(ledger.reserve_credits("w1", 10), ReserveOutcome::FallbackUsdc));
    }

    #[test]
    fn finalize_on_unknown_reservation_is_reservation_not_found() {
        let ledger = ledger();
        let err = ledger.finalize(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReservationNotFound);
    }

    #[test]
    fn double_finalize_is_a_no_op() {
        let ledger = ledger();
        ledger.seed_account("w1", CreditAccount { unlocked: 100, ..Default::default() });
        let ReserveOutcome::Reserved(reservation) = ledger.reserve_credits("w1", 10) else { panic!() };
        ledger.finalize(reservation.id).unwrap();
        ledger.finalize(reservation.id).unwrap();
        assert_eq!(ledger.account("w1").unwrap().consumed, 10);
    }

    #[test]
    fn sweep_moves_expired_reservations_out_of_reserved() {
        let ledger = CreditLedger::new(CreditLedgerSettings {
                reservation_ttl: ChronoDuration::milliseconds(-1),
                rate: ExchangeRateTable::new(10, Utc::now()),
        });
        ledger.seed_account("w1", CreditAccount { unlocked: 20, ..Default::default() });
        ledger.reserve_credits("w1", 20);
        assert_eq!(ledger.sweep_expired(), 1);
        assert_eq!(ledger.account("w1").unwrap(), CreditAccount { unlocked: 0, expired: 20, ..Default::default() });
    }
}
