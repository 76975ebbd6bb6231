//! Opening balance port
//!
//! Where the two demo accounts get their opening balances. The console
//! front-end prompts for them; tests and non-interactive runs use
//! [`FixedBalances`].

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::result::{Error, Result};

/// Opening balances for the two demo accounts, both non-negative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpeningBalances {
    first: Decimal,
    second: Decimal,
}

impl OpeningBalances {
    pub fn new(first: Decimal, second: Decimal) -> Result<Self> {
        for (label, value) in [("first", first), ("second", second)] {
            if value < Decimal::ZERO {
                return Err(Error::validation(format!(
                    "{} opening balance cannot be negative ({})",
                    label, value
                )));
            }
        }
        Ok(Self { first, second })
    }

    pub fn first(&self) -> Decimal {
        self.first
    }

    pub fn second(&self) -> Decimal {
        self.second
    }
}

/// Source of opening balances
///
/// Implementations own whatever input policy they need (prompting,
/// coercing malformed input); the core only accepts validated values.
pub trait OpeningBalanceSource: Send + Sync {
    fn opening_balances(&self) -> Result<OpeningBalances>;
}

/// Balances known up front
#[derive(Debug, Clone, Copy)]
pub struct FixedBalances(pub OpeningBalances);

impl OpeningBalanceSource for FixedBalances {
    fn opening_balances(&self) -> Result<OpeningBalances> {
        Ok(self.0)
    }
}
