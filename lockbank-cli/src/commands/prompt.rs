//! Console balance prompts
//!
//! The front-end is lenient where the core is strict: empty, unparsable
//! or negative input becomes a zero balance with a warning instead of an
//! error.

use std::io::{self, BufRead};

use dialoguer::Input;
use lockbank_core::{Error, OpeningBalanceSource, OpeningBalances};
use rust_decimal::Decimal;

use crate::output;

/// Why an entered balance was replaced by zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Empty,
    NotANumber,
    Negative,
}

impl Coercion {
    fn message(self, account: u32) -> String {
        let reason = match self {
            Coercion::Empty => "Invalid input.",
            Coercion::NotANumber => "Invalid number.",
            Coercion::Negative => "Balance cannot be negative.",
        };
        format!("{} Using default balance of $0 for Account {}.", reason, account)
    }
}

/// Parse a balance, coercing bad input to zero
pub fn coerce_balance(input: &str) -> (Decimal, Option<Coercion>) {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed).trim();
    if trimmed.is_empty() {
        return (Decimal::ZERO, Some(Coercion::Empty));
    }
    match trimmed.parse::<Decimal>() {
        Ok(value) if value < Decimal::ZERO => (Decimal::ZERO, Some(Coercion::Negative)),
        Ok(value) => (value, None),
        Err(_) => (Decimal::ZERO, Some(Coercion::NotANumber)),
    }
}

/// Opening balances from flags, an interactive prompt, or piped stdin
pub struct ConsoleBalances {
    pub first: Option<String>,
    pub second: Option<String>,
    /// Print coercion warnings
    pub verbose: bool,
}

impl ConsoleBalances {
    fn read(&self, account: u32, given: Option<&str>) -> io::Result<Decimal> {
        let raw = match given {
            Some(value) => value.to_string(),
            None if atty::is(atty::Stream::Stdin) => Input::<String>::new()
                .with_prompt(format!("Enter initial balance for Account {}: $", account))
                .allow_empty(true)
                .interact_text()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?,
            None => {
                let mut line = String::new();
                io::stdin().lock().read_line(&mut line)?;
                line
            }
        };

        let (balance, coercion) = coerce_balance(&raw);
        match coercion {
            Some(coercion) if self.verbose => output::warning(&coercion.message(account)),
            _ => {}
        }
        Ok(balance)
    }
}

impl OpeningBalanceSource for ConsoleBalances {
    fn opening_balances(&self) -> lockbank_core::domain::result::Result<OpeningBalances> {
        let first = self.read(1, self.first.as_deref()).map_err(Error::Io)?;
        let second = self.read(2, self.second.as_deref()).map_err(Error::Io)?;
        OpeningBalances::new(first, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_balances() {
        assert_eq!(coerce_balance("500"), (Decimal::new(500, 0), None));
        assert_eq!(coerce_balance(" 12.50\n"), (Decimal::new(1250, 2), None));
        assert_eq!(coerce_balance("$300"), (Decimal::new(300, 0), None));
    }

    #[test]
    fn test_bad_input_is_coerced_to_zero() {
        assert_eq!(coerce_balance(""), (Decimal::ZERO, Some(Coercion::Empty)));
        assert_eq!(coerce_balance("   \n"), (Decimal::ZERO, Some(Coercion::Empty)));
        assert_eq!(coerce_balance("lots"), (Decimal::ZERO, Some(Coercion::NotANumber)));
        assert_eq!(coerce_balance("-5"), (Decimal::ZERO, Some(Coercion::Negative)));
    }

    #[test]
    fn test_flags_skip_prompting() {
        let source = ConsoleBalances {
            first: Some("250".to_string()),
            second: Some("-1".to_string()),
            verbose: false,
        };
        let balances = source.opening_balances().unwrap();
        assert_eq!(balances.first(), Decimal::new(250, 0));
        assert_eq!(balances.second(), Decimal::ZERO);
    }

    #[test]
    fn test_coercion_message() {
        assert_eq!(
            Coercion::Negative.message(2),
            "Balance cannot be negative. Using default balance of $0 for Account 2."
        );
    }
}
