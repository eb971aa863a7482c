pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::models::{BookingRecord, SlotKey, TokenId, TokenState};

#[derive(Debug)]
pub enum StoreError {
    /// Token was never registered.
    NotFound,
    /// Token already consumed by an earlier booking.
    AlreadyUsed,
    /// Slot key already occupied at the moment of commit.
    SlotTaken,
    /// Underlying persistence failed (I/O, pool timeout, serialization).
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "token not found"),
            StoreError::AlreadyUsed => write!(f, "token already used"),
            StoreError::SlotTaken => write!(f, "slot already booked"),
            StoreError::Unavailable(e) => write!(f, "store unavailable: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Persistence backend for the token registry and the slot ledger.
/// Implementations must make `mark_token_used` and `append_booking`
/// conditional writes: the check and the mutation happen as one atomic
/// step against the backing state.
#[async_trait::async_trait]
pub trait BookingStore: Send + Sync {
    /// Upserts the token in `free` state. Re-registration intentionally
    /// overwrites a prior `used` mark; the external issuance system may
    /// relink a slot at any time.
    async fn register_token(&self, token: &TokenId) -> Result<(), StoreError>;

    async fn token_state(&self, token: &TokenId) -> Result<TokenState, StoreError>;

    /// Transitions `free` -> `used`. Fails `NotFound` for unregistered
    /// tokens and `AlreadyUsed` if another writer got there first.
    async fn mark_token_used(&self, token: &TokenId) -> Result<(), StoreError>;

    async fn slot_exists(&self, key: &SlotKey) -> Result<bool, StoreError>;

    /// Appends the record iff its slot key is still unoccupied; returns
    /// the record id on success.
    async fn append_booking(&self, record: &BookingRecord) -> Result<String, StoreError>;

    /// Compensating delete for a failed admission. Deleting an id that
    /// no longer exists is not an error.
    async fn remove_booking(&self, id: &str) -> Result<(), StoreError>;

    async fn list_bookings(&self) -> Result<Vec<BookingRecord>, StoreError>;
}
