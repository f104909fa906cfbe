// [libs/domain/credit-ledger/src/reservation.rs]
use crate::rate::ExchangeRateTable;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationState {
    Reserved,
    Consumed,
    Released,
}

/// A tentative hold of credits that is later finalized or rolled back
///. Owned jointly by the reserver and
/// the credit store, with the store authoritative.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub id: Uuid,
    pub wallet: String,
    pub amount_cu: u64,
    pub rate_snapshot: ExchangeRateTable,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub state: ReservationState,
}
