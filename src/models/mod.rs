pub mod booking;
pub mod token;

pub use booking::{BookingRecord, BookingRequest, SlotKey};
pub use token::{TokenId, TokenState};
