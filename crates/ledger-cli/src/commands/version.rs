//! Version command implementation

use anyhow::Result;
use colored::*;
use ledger_query::{RetryPolicy, MAX_WEIGHT, WEIGHT_UNIT};

/// Display version information
pub fn execute() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

    let retry = RetryPolicy::default();

    println!("{}", "Ledger Query".bright_blue().bold());
    println!("{}: {}", "Version".bright_cyan(), VERSION);
    println!();
    println!("{}", DESCRIPTION.dimmed());
    println!();
    println!("{}", "Defaults:".bright_green());
    println!("  • {} attempts per query, {} ms apart", retry.max_attempts, retry.delay_ms);
    println!("  • One weight tier per {WEIGHT_UNIT} units, capped at {MAX_WEIGHT}");

    Ok(())
}
