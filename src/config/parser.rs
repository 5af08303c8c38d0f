//! Reading a crawl configuration from disk

use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigResult;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reads, parses and validates the TOML file at `path`
///
/// Missing `[crawler]` keys fall back to their defaults; `[user-agent]` and
/// `[seed]` are required.
///
/// ```no_run
/// use std::path::Path;
/// use ripple_engine::config::load_config;
///
/// let config = load_config(Path::new("ripple.toml")).unwrap();
/// assert!(config.crawler.pool_size > 0);
/// ```
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let raw = std::fs::read(path)?;
    parse_checked(&raw)
}

/// Hex-encoded SHA-256 of the raw file bytes
pub fn compute_config_hash(path: &Path) -> ConfigResult<String> {
    let raw = std::fs::read(path)?;
    Ok(digest(&raw))
}

/// Loads the configuration together with the hash of the bytes it was parsed
/// from, so the logged hash always matches the config the run used
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let raw = std::fs::read(path)?;
    let config = parse_checked(&raw)?;
    let hash = digest(&raw);
    tracing::debug!(path = %path.display(), %hash, "Parsed configuration");
    Ok((config, hash))
}

fn parse_checked(raw: &[u8]) -> ConfigResult<Config> {
    let text = String::from_utf8_lossy(raw);
    let config: Config = toml::from_str(&text)?;
    validate(&config)?;
    Ok(config)
}

fn digest(raw: &[u8]) -> String {
    hex::encode(Sha256::digest(raw))
}
