//! Configuration loading for the ledger tool
//!
//! Settings come from an optional TOML file and are then overridden by
//! command-line flags and environment variables.

use crate::cli::Cli;
use anyhow::{Context, Result};
use ledger_query::LedgerConfig;
use std::fs;
use std::path::Path;

/// Read a configuration file; missing keys keep their defaults
pub fn load_file(path: &Path) -> Result<LedgerConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config file: {}", path.display()))
}

/// Effective configuration for this invocation
pub fn resolve(cli: &Cli) -> Result<LedgerConfig> {
    let mut config = match &cli.config {
        Some(path) => load_file(path)?,
        None => LedgerConfig::default(),
    };

    if let Some(db) = &cli.db {
        config.path.clone_from(db);
    }
    if let Some(attempts) = cli.max_attempts {
        config.retry.max_attempts = attempts;
    }
    if let Some(delay) = cli.retry_delay {
        config.retry.delay_ms = delay;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_file() {
        let file = write_config(
            r#"
            path = "/srv/node/static/ledger.db"
            busy_timeout = 250

            [retry]
            max_attempts = 4
            delay_ms = 20
            "#,
        );

        let config = load_file(file.path()).unwrap();
        assert_eq!(config.path, "/srv/node/static/ledger.db");
        assert_eq!(config.busy_timeout, 250);
        assert_eq!(config.cache_size, LedgerConfig::default().cache_size);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.delay_ms, 20);
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let file = write_config("retry = 3");
        let err = load_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }

    #[test]
    fn test_flags_override_file() {
        let file = write_config("path = \"from-file.db\"\n[retry]\nmax_attempts = 4\n");
        let path = file.path().to_string_lossy().to_string();

        let cli = Cli::try_parse_from([
            "ledger-query",
            "--config",
            path.as_str(),
            "--db",
            "from-flag.db",
            "--retry-delay",
            "0",
            "last-ts",
        ])
        .unwrap();

        let config = resolve(&cli).unwrap();
        assert_eq!(config.path, "from-flag.db");
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.delay_ms, 0);
    }
}
