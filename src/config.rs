// src/config.rs

//! Configuration loading.
//!
//! File settings come first, then environment overrides, then validation.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Load the runtime configuration.
///
/// A missing or unreadable file falls back to defaults; an invalid result
/// after environment overrides is an error.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    load_config_with(path, |key| std::env::var(key).ok())
}

fn load_config_with(
    path: impl AsRef<Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Config> {
    let mut config = Config::load_or_default(path);
    config.apply_overrides(lookup)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_with(dir.path().join("absent.toml"), no_env).unwrap();
        assert_eq!(config.broadcast.max_channel_per_cycle, 5);
    }

    #[test]
    fn test_sample_config_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/config.toml");
        let config = load_config_with(path, no_env).unwrap();
        assert_eq!(config.collector.sources.len(), 2);
        assert_eq!(config.collector.sources[1].selectors.link_attr, "href");
        assert_eq!(config.delivery.max_retry_after_secs, 30);
    }

    #[test]
    fn test_invalid_file_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[broadcast]\nmax_channel_per_cycle = 0").unwrap();
        assert!(load_config_with(file.path(), no_env).is_err());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[delivery]\nchannel_id = \"@file\"").unwrap();
        let config = load_config_with(file.path(), |key| match key {
            "CHANNEL_ID" => Some("@altro".to_string()),
            "BROADCAST_INTERVAL" => Some(" 120 ".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.delivery.channel_id, "@altro");
        assert_eq!(config.schedule.interval_secs, 120);
    }

    #[test]
    fn test_non_numeric_interval_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_with(dir.path().join("absent.toml"), |key| {
            (key == "BROADCAST_INTERVAL").then(|| "abc".to_string())
        });
        assert!(result.is_err());
    }
}
