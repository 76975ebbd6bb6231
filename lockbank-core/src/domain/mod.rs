//! Core domain entities
//!
//! The account entity, its lock discipline and the two transfer protocols.
//! Nothing here performs I/O.

mod account;
mod cancellation;
pub mod result;
mod transfer;

pub use account::{Account, AccountId};
pub use cancellation::CancellationToken;
pub use transfer::{
    lock_order, transfer_safe, transfer_unsafe, transfer_unsafe_with_hold, try_transfer_safe,
    TransferOutcome, DEFAULT_HOLD_DELAY,
};
