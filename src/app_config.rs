//! File configuration loading for CLI defaults.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use mediahub_core::EngineConfig;

/// Environment variable overriding the base-URL configuration document.
pub const CONFIG_URL_ENV: &str = "MEDIAHUB_CONFIG_URL";

/// Environment variable carrying the metadata source API key.
pub const TMDB_API_KEY_ENV: &str = "TMDB_API_KEY";

/// `key = value` file configuration for engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// URL of the base-URL configuration document.
    pub config_url: Option<String>,
    /// Base-URL cache TTL in seconds.
    pub base_url_ttl_secs: Option<u64>,
    /// Wait after a failed base-URL refresh, in seconds.
    pub failure_cooldown_secs: Option<u64>,
    /// Per-provider call timeout in seconds.
    pub provider_timeout_secs: Option<u64>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Attempts per request (1..=10).
    pub max_retries: Option<u32>,
    /// Response cache TTL in seconds; 0 disables the cache.
    pub response_cache_ttl_secs: Option<u64>,
    /// Response cache capacity in entries.
    pub response_cache_capacity: Option<u64>,
    /// Metadata source API key.
    pub tmdb_api_key: Option<String>,
    /// Provider ids disabled at startup.
    pub disabled_providers: Option<BTreeSet<String>>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.config_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            bail!("Invalid config value for `config_url`: '{url}'. Expected an http(s) URL");
        }
        if let Some(retries) = self.max_retries
            && !(1..=10).contains(&retries)
        {
            bail!("Invalid config value for `max_retries`: {retries}. Expected range: 1..=10");
        }
        validate_secs("base_url_ttl_secs", self.base_url_ttl_secs, 1..=86_400)?;
        validate_secs("failure_cooldown_secs", self.failure_cooldown_secs, 0..=3600)?;
        validate_secs("provider_timeout_secs", self.provider_timeout_secs, 1..=300)?;
        validate_secs("connect_timeout_secs", self.connect_timeout_secs, 1..=300)?;
        validate_secs("read_timeout_secs", self.read_timeout_secs, 1..=3600)?;
        validate_secs("response_cache_ttl_secs", self.response_cache_ttl_secs, 0..=86_400)?;
        if let Some(capacity) = self.response_cache_capacity
            && capacity > 100_000
        {
            bail!(
                "Invalid config value for `response_cache_capacity`: {capacity}. Expected range: 0..=100000"
            );
        }
        Ok(())
    }

    /// Writes every set field onto `config`.
    pub fn apply_to(&self, config: &mut EngineConfig) {
        if let Some(url) = &self.config_url {
            config.config_url.clone_from(url);
        }
        let secs = Duration::from_secs;
        if let Some(value) = self.base_url_ttl_secs {
            config.base_url_ttl = secs(value);
        }
        if let Some(value) = self.failure_cooldown_secs {
            config.failure_cooldown = secs(value);
        }
        if let Some(value) = self.provider_timeout_secs {
            config.provider_timeout = secs(value);
        }
        if let Some(value) = self.connect_timeout_secs {
            config.connect_timeout = secs(value);
        }
        if let Some(value) = self.read_timeout_secs {
            config.read_timeout = secs(value);
        }
        if let Some(value) = self.max_retries {
            config.max_retries = value;
        }
        if let Some(value) = self.response_cache_ttl_secs {
            config.response_cache_ttl = secs(value);
        }
        if let Some(value) = self.response_cache_capacity {
            config.response_cache_capacity = value;
        }
        if let Some(key) = &self.tmdb_api_key {
            config.tmdb_api_key = Some(key.clone());
        }
        if let Some(ids) = &self.disabled_providers {
            config.disabled_providers.clone_from(ids);
        }
    }
}

fn validate_secs(field: &str, value: Option<u64>, range: std::ops::RangeInclusive<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !range.contains(&value) {
        bail!(
            "Invalid config value for `{field}`: {value}. Expected range: {}..={}",
            range.start(),
            range.end()
        );
    }
    Ok(())
}

/// Applies `MEDIAHUB_CONFIG_URL` and `TMDB_API_KEY`; `lookup` is `env::var` outside tests.
pub fn apply_env_overrides(config: &mut EngineConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(CONFIG_URL_ENV).filter(|v| !v.trim().is_empty()) {
        config.config_url = url.trim().to_string();
    }
    if let Some(key) = lookup(TMDB_API_KEY_ENV).filter(|v| !v.trim().is_empty()) {
        config.tmdb_api_key = Some(key.trim().to_string());
    }
}

/// Reads an environment variable, treating non-UTF-8 as absent.
pub fn env_lookup(name: &str) -> Option<String> {
    env::var(name).ok()
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/mediahub/config.toml`
/// 2. `$HOME/.config/mediahub/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("mediahub")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("mediahub")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file at `path`, or at the default path when `None`.
///
/// A missing default file is not an error; a missing explicit file is.
pub fn load_file_config(path: Option<&Path>) -> Result<Option<FileConfig>> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match resolve_default_config_path() {
            Some(path) => (path, false),
            None => return Ok(None),
        },
    };
    if !path.exists() {
        if explicit {
            bail!("Config file '{}' does not exist", path.display());
        }
        return Ok(None);
    }
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
        .map(Some)
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {}", line_index + 1);

        match key {
            "config_url" => cfg.config_url = Some(parse_string_literal(value).with_context(context)?),
            "tmdb_api_key" => {
                cfg.tmdb_api_key = Some(parse_string_literal(value).with_context(context)?);
            }
            "disabled_providers" => {
                let list = parse_string_literal(value).with_context(context)?;
                cfg.disabled_providers = Some(
                    list.split(',')
                        .map(str::trim)
                        .filter(|id| !id.is_empty())
                        .map(str::to_string)
                        .collect(),
                );
            }
            "base_url_ttl_secs" => cfg.base_url_ttl_secs = Some(parse_integer_u64(value).with_context(context)?),
            "failure_cooldown_secs" => {
                cfg.failure_cooldown_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "provider_timeout_secs" => {
                cfg.provider_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "max_retries" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("max_retries out of range for u32"))?;
                cfg.max_retries = Some(n);
            }
            "response_cache_ttl_secs" => {
                cfg.response_cache_ttl_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "response_cache_capacity" => {
                cfg.response_cache_capacity = Some(parse_integer_u64(value).with_context(context)?);
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}
