//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use rust_decimal::Decimal;

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Print a section heading
pub fn heading(msg: &str) {
    println!();
    println!("{}", msg.bold());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Format an amount as dollars, keeping at least two decimal places
pub fn format_money(amount: Decimal) -> String {
    let mut rounded = amount;
    if rounded.scale() < 2 {
        rounded.rescale(2);
    }
    format!("${}", rounded)
}

/// Format an optional balance; `None` means the account is still locked
pub fn format_reading(balance: Option<Decimal>) -> String {
    match balance {
        Some(b) => format_money(b),
        None => "(locked)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(Decimal::new(450, 0)), "$450.00");
        assert_eq!(format_money(Decimal::new(12345, 3)), "$12.345");
        assert_eq!(format_money(Decimal::ZERO), "$0.00");
    }

    #[test]
    fn test_format_reading() {
        assert_eq!(format_reading(None), "(locked)");
        assert_eq!(format_reading(Some(Decimal::new(5, 1))), "$0.50");
    }
}
