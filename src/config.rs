//! Configuration for arbiscan
//!
//! Loaded from environment variables (with `.env` support) or a TOML file.
//! Everything has a sane default so a bare `arbiscan` run works.

use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::brain::DEFAULT_MAX_PATH_LENGTH;
use crate::cartographer::{normalize_asset, CoinGeckoTickers, COINGECKO_API_URL};
use crate::tokens::{StableAssetSet, DEFAULT_STABLE_ASSETS};

/// Past this the DFS blows up on any real exchange graph
pub const MAX_SANE_PATH_LENGTH: usize = 8;

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ========== Provider Settings ==========
    /// Exchange-rate API base URL
    pub api_url: String,

    /// Exchange whose tickers we scan (CoinGecko exchange id)
    pub exchange_id: String,

    /// Optional API key, sent as a header
    pub api_key: Option<String>,

    /// Per-request timeout
    pub request_timeout_secs: u64,

    /// Upper bound on ticker pages fetched per scan
    pub max_pages: u32,

    // ========== Search Settings ==========
    /// Asset every cycle starts and ends at
    pub base_asset: String,

    /// Maximum nodes in a cycle, closing repeat excluded
    pub max_path_length: usize,

    /// Assets eligible for a natural-return closure
    pub stable_assets: Vec<String>,

    /// Wall-clock budget for one search
    pub search_timeout_ms: Option<u64>,

    /// DFS step budget for one search
    pub max_search_steps: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            // Provider
            api_url: env::var("COINGECKO_API_URL").unwrap_or(defaults.api_url),
            exchange_id: env::var("EXCHANGE_ID").unwrap_or(defaults.exchange_id),
            api_key: env::var("COINGECKO_API_KEY").ok().filter(|k| !k.is_empty()),
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS")?
                .unwrap_or(defaults.request_timeout_secs),
            max_pages: parse_var("MAX_PAGES")?.unwrap_or(defaults.max_pages),

            // Search
            base_asset: env::var("BASE_ASSET").unwrap_or(defaults.base_asset),
            max_path_length: parse_var("MAX_PATH_LENGTH")?
                .unwrap_or(defaults.max_path_length),
            stable_assets: env::var("STABLE_ASSETS")
                .map(|s| s.split(',').map(|a| a.trim().to_string()).collect())
                .unwrap_or(defaults.stable_assets),
            search_timeout_ms: parse_var("SEARCH_TIMEOUT_MS")?,
            max_search_steps: parse_var("MAX_SEARCH_STEPS")?,
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .wrap_err_with(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(eyre!("COINGECKO_API_URL must not be empty"));
        }
        if self.exchange_id.trim().is_empty() {
            return Err(eyre!("EXCHANGE_ID must not be empty"));
        }
        if normalize_asset(&self.base_asset).is_empty() {
            return Err(eyre!("BASE_ASSET must not be empty"));
        }
        if self.max_pages == 0 {
            return Err(eyre!("MAX_PAGES must be at least 1"));
        }
        if self.max_path_length > MAX_SANE_PATH_LENGTH {
            return Err(eyre!(
                "MAX_PATH_LENGTH > {} makes the search explode (currently {})",
                MAX_SANE_PATH_LENGTH,
                self.max_path_length
            ));
        }
        Ok(())
    }

    pub fn stable_asset_set(&self) -> StableAssetSet {
        StableAssetSet::new(&self.stable_assets)
    }

    pub fn pair_source(&self) -> Result<CoinGeckoTickers> {
        CoinGeckoTickers::new(
            self.api_url.clone(),
            self.exchange_id.clone(),
            self.api_key.clone(),
            self.max_pages,
            Some(Duration::from_secs(self.request_timeout_secs)),
        )
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║                 ARBISCAN - CONFIGURATION                   ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ PROVIDER                                                   ║");
        println!("║ • Exchange:        {:^40} ║", self.exchange_id);
        println!("║ • Max Pages:       {:^40} ║", self.max_pages);
        println!("║ • API Key:         {:^40} ║",
            if self.api_key.is_some() { "✓ Configured" } else { "✗ Public tier" }
        );
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ PATH FINDING                                               ║");
        println!("║ • Base Asset:      {:^40} ║", normalize_asset(&self.base_asset));
        println!("║ • Max Path Length: {:^40} ║", self.max_path_length);
        println!("║ • Stable Assets:   {:^40} ║", self.stable_asset_set().to_sorted_vec().join(","));
        println!("║ • Search Timeout:  {:^40} ║",
            self.search_timeout_ms.map(|ms| format!("{} ms", ms)).unwrap_or_else(|| "none".into())
        );
        println!("║ • Step Budget:     {:^40} ║",
            self.max_search_steps.map(|s| s.to_string()).unwrap_or_else(|| "none".into())
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: COINGECKO_API_URL.to_string(),
            exchange_id: "binance".to_string(),
            api_key: None,
            request_timeout_secs: 10,
            max_pages: 5,
            base_asset: "usdt".to_string(),
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
            stable_assets: DEFAULT_STABLE_ASSETS.iter().map(|s| s.to_string()).collect(),
            search_timeout_ms: None,
            max_search_steps: None,
        }
    }
}

/// Unset or empty -> None; set but unparsable -> error
fn parse_var<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| eyre!("Invalid {}='{}': {}", key, raw, e)),
        _ => Ok(None),
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.base_asset, "usdt");
        assert_eq!(config.max_path_length, 4);
        assert_eq!(config.stable_assets, vec!["usdt", "usdc", "busd", "dai"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.max_path_length = 9;
        assert!(config.validate().is_err());

        // too short is not a config error, it just finds nothing
        config.max_path_length = 2;
        assert!(config.validate().is_ok());

        config.exchange_id = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            exchange_id = "kraken"
            max_path_length = 5
            stable_assets = ["USDT", "EURT"]
            "#,
        )
        .unwrap();

        assert_eq!(config.exchange_id, "kraken");
        assert_eq!(config.max_path_length, 5);
        assert_eq!(config.base_asset, "usdt");
        assert!(config.stable_asset_set().contains("eurt"));
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("arbiscan_config_{}.toml", std::process::id()));
        let mut config = Config::default();
        config.search_timeout_ms = Some(250);

        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded, config);
    }
}
