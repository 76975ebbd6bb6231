//! Account domain model
//!
//! An account owns exactly one exclusion primitive guarding its balance.
//! The primitive is never handed out: callers mutate the balance through
//! [`Account::deposit`] / [`Account::withdraw`], and the transfer protocols
//! in this crate acquire it through a crate-private guard accessor.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Account identity, unique within a run
///
/// The derived `Ord` is the global lock-acquisition order used by
/// [`transfer_safe`](super::transfer_safe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u32);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Account {}", self.0)
    }
}

impl From<u32> for AccountId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// A bank account whose balance may be mutated concurrently
///
/// The balance is only read or written while `balance` is locked.
/// The lock is not reentrant: a thread holding it must not acquire it
/// again.
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    balance: Mutex<Decimal>,
}

impl Account {
    /// Create an account with a non-negative opening balance
    pub fn new(id: impl Into<AccountId>, opening_balance: Decimal) -> Result<Self> {
        let id = id.into();
        if opening_balance < Decimal::ZERO {
            return Err(Error::validation(format!(
                "{} cannot open with a negative balance ({})",
                id, opening_balance
            )));
        }
        Ok(Self {
            id,
            balance: Mutex::new(opening_balance),
        })
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Add `amount` to the balance
    ///
    /// The amount is not validated; a negative deposit is the caller's
    /// responsibility.
    pub fn deposit(&self, amount: Decimal) {
        let mut balance = self.lock();
        *balance += amount;
    }

    /// Subtract `amount` if the balance covers it, otherwise do nothing
    ///
    /// Insufficient funds are deliberately silent. Callers that need to
    /// know whether money moved should use a transfer instead.
    pub fn withdraw(&self, amount: Decimal) {
        let mut balance = self.lock();
        if *balance >= amount {
            *balance -= amount;
        }
    }

    /// Current balance, read under the account lock
    ///
    /// Blocks while another context holds the lock. Use
    /// [`Account::try_balance`] when the account may be wedged.
    pub fn balance(&self) -> Decimal {
        *self.lock()
    }

    /// Current balance, or `None` if the lock is held elsewhere right now
    pub fn try_balance(&self) -> Option<Decimal> {
        match self.balance.try_lock() {
            Ok(guard) => Some(*guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(*poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Acquire this account's exclusion primitive
    ///
    /// Every balance mutation is a single assignment, so a holder that
    /// panicked cannot have left a torn value behind and the poison flag
    /// is ignored.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Decimal> {
        self.balance.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn dec(units: i64) -> Decimal {
        Decimal::new(units * 100, 2)
    }

    #[test]
    fn test_negative_opening_balance_rejected() {
        let err = Account::new(1, dec(-5)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("Account 1"));
    }

    #[test]
    fn test_zero_opening_balance_accepted() {
        let account = Account::new(7, Decimal::ZERO).unwrap();
        assert_eq!(account.balance(), Decimal::ZERO);
        assert_eq!(account.id(), AccountId(7));
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let account = Account::new(1, dec(100)).unwrap();
        account.deposit(Decimal::new(1050, 2));
        assert_eq!(account.balance(), Decimal::new(11050, 2));

        account.withdraw(Decimal::new(1050, 2));
        assert_eq!(account.balance(), dec(100));
    }

    #[test]
    fn test_withdraw_insufficient_funds_is_noop() {
        let account = Account::new(1, dec(20)).unwrap();
        account.withdraw(dec(25));
        assert_eq!(account.balance(), dec(20));

        // Exact balance is allowed and leaves zero, never a partial debit
        account.withdraw(dec(20));
        assert_eq!(account.balance(), Decimal::ZERO);
    }

    #[test]
    fn test_balance_read_is_idempotent() {
        let account = Account::new(3, Decimal::new(12345, 2)).unwrap();
        assert_eq!(account.balance(), account.balance());
        assert_eq!(account.try_balance(), Some(account.balance()));
    }

    #[test]
    fn test_try_balance_while_locked() {
        let account = Account::new(1, dec(10)).unwrap();
        let guard = account.lock();
        assert_eq!(account.try_balance(), None);
        drop(guard);
        assert_eq!(account.try_balance(), Some(dec(10)));
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let account = Arc::new(Account::new(1, dec(10)).unwrap());
        let poisoner = Arc::clone(&account);
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock();
            panic!("holder panicked");
        })
        .join();

        account.deposit(dec(5));
        assert_eq!(account.balance(), dec(15));
    }

    #[test]
    fn test_account_id_ordering_and_display() {
        assert!(AccountId(1) < AccountId(2));
        assert_eq!(AccountId(2).to_string(), "Account 2");
        assert_eq!(serde_json::to_string(&AccountId(4)).unwrap(), "4");
    }
}
