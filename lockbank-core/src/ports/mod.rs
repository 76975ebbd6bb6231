//! Port definitions
//!
//! Interfaces for collaborators outside the core. The core depends only on
//! these traits, not on concrete implementations.

mod balance_source;

pub use balance_source::{FixedBalances, OpeningBalanceSource, OpeningBalances};
