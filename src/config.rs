//! Configuration loading.
//!
//! Built once at startup from three layers: compiled defaults, an optional
//! TOML file (path in `DCA_CONFIG`), then environment variables. The result
//! is an immutable snapshot handed by reference to the controller.
//! Exchange credentials only ever come from the environment.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::str::FromStr;
use std::time::Duration;

use crate::types::DcaError;

const MAINNET_URL: &str = "https://api.binance.com";
const TESTNET_URL: &str = "https://testnet.binance.vision";

/// Env var naming the optional TOML file.
pub const CONFIG_PATH_ENV: &str = "DCA_CONFIG";

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Exchange API key pair. Never printed.
pub struct Credentials {
    pub api_key: SecretString,
    pub api_secret: SecretString,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_secret: SecretString::new(api_secret.into()),
        }
    }

    /// Both halves present and non-blank.
    pub fn is_complete(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
            && !self.api_secret.expose_secret().trim().is_empty()
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self::new(
            self.api_key.expose_secret().clone(),
            self.api_secret.expose_secret().clone(),
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// DcaConfig
// ---------------------------------------------------------------------------

/// Top-level bot configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DcaConfig {
    /// Exchange symbol, e.g. `BTCUSDT`.
    pub pair: String,
    pub base_asset: String,
    pub quote_asset: String,
    /// Quote amount spent per order.
    pub investment_per_order: Decimal,
    pub interval_minutes: u64,
    pub max_orders: u64,
    /// Informational only. Not applied to any order.
    pub slippage_pct: Decimal,
    pub investment_cap: Decimal,
    pub live_mode: bool,
    pub testnet: bool,
    pub log_level: String,
    pub log_json: bool,
    /// Backoff after a failed price lookup.
    pub price_retry_secs: u64,
    /// Overrides the mainnet/testnet REST endpoint.
    pub base_url: Option<String>,
    #[serde(skip)]
    pub credentials: Option<Credentials>,
}

impl Default for DcaConfig {
    fn default() -> Self {
        Self {
            pair: "BTCUSDT".to_string(),
            base_asset: "BTC".to_string(),
            quote_asset: "USDT".to_string(),
            investment_per_order: dec!(10),
            interval_minutes: 60,
            max_orders: 100,
            slippage_pct: dec!(0.5),
            investment_cap: dec!(1000),
            live_mode: false,
            testnet: true,
            log_level: "info".to_string(),
            log_json: false,
            price_retry_secs: 10,
            base_url: None,
            credentials: None,
        }
    }
}

impl DcaConfig {
    /// Load from the process environment (and the file named by `DCA_CONFIG`).
    pub fn load() -> Result<Self> {
        let lookup = |key: &str| std::env::var(key).ok();
        let file = lookup(CONFIG_PATH_ENV).filter(|p| !p.trim().is_empty());
        let base = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        let cfg = base.with_overrides(lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML file on top of the defaults.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, DcaError> {
        toml::from_str(contents).map_err(|e| DcaError::Config(e.to_string()))
    }

    /// Apply environment-style overrides from `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, DcaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());

        if let Some(v) = get("DCA_PAIR") {
            self.pair = v.to_uppercase();
        }
        if let Some(v) = get("DCA_BASE_ASSET") {
            self.base_asset = v.to_uppercase();
        }
        if let Some(v) = get("DCA_QUOTE_ASSET") {
            self.quote_asset = v.to_uppercase();
        }
        if let Some(v) = get("DCA_INVESTMENT_AMOUNT") {
            self.investment_per_order = parse_value("DCA_INVESTMENT_AMOUNT", &v)?;
        }
        if let Some(v) = get("DCA_INTERVAL_MINUTES") {
            self.interval_minutes = parse_value("DCA_INTERVAL_MINUTES", &v)?;
        }
        if let Some(v) = get("DCA_MAX_ORDERS") {
            self.max_orders = parse_value("DCA_MAX_ORDERS", &v)?;
        }
        if let Some(v) = get("DCA_SLIPPAGE_PCT") {
            self.slippage_pct = parse_value("DCA_SLIPPAGE_PCT", &v)?;
        }
        if let Some(v) = get("DCA_INVESTMENT_CAP") {
            self.investment_cap = parse_value("DCA_INVESTMENT_CAP", &v)?;
        }
        if let Some(v) = get("DCA_LIVE_MODE") {
            self.live_mode = parse_flag("DCA_LIVE_MODE", &v)?;
        }
        if let Some(v) = get("DCA_TESTNET") {
            self.testnet = parse_flag("DCA_TESTNET", &v)?;
        }
        if let Some(v) = get("DCA_LOG_LEVEL") {
            self.log_level = v.to_lowercase();
        }
        if let Some(v) = get("DCA_LOG_JSON") {
            self.log_json = parse_flag("DCA_LOG_JSON", &v)?;
        }
        if let Some(v) = get("DCA_PRICE_RETRY_SECS") {
            self.price_retry_secs = parse_value("DCA_PRICE_RETRY_SECS", &v)?;
        }
        if let Some(v) = get("DCA_BASE_URL") {
            self.base_url = Some(v).filter(|u| !u.is_empty());
        }

        let key = get("BINANCE_API_KEY").unwrap_or_default();
        let secret = get("BINANCE_API_SECRET").unwrap_or_default();
        if !key.is_empty() || !secret.is_empty() {
            self.credentials = Some(Credentials::new(key, secret));
        }

        Ok(self)
    }

    /// Reject values the loop cannot run with.
    pub fn validate(&self) -> Result<(), DcaError> {
        if self.pair.trim().is_empty() {
            return Err(DcaError::Config("pair must not be empty".into()));
        }
        if self.investment_per_order <= Decimal::ZERO {
            return Err(DcaError::Config(format!(
                "investment per order must be positive, got {}",
                self.investment_per_order
            )));
        }
        if self.interval_minutes == 0 {
            return Err(DcaError::Config("interval must be at least 1 minute".into()));
        }
        if self.price_retry_secs == 0 {
            return Err(DcaError::Config(
                "price retry backoff must be at least 1 second".into(),
            ));
        }
        if self.investment_cap < Decimal::ZERO {
            return Err(DcaError::Config(format!(
                "investment cap must not be negative, got {}",
                self.investment_cap
            )));
        }
        if self.slippage_pct < Decimal::ZERO {
            return Err(DcaError::Config(format!(
                "slippage must not be negative, got {}",
                self.slippage_pct
            )));
        }
        Ok(())
    }

    /// Credentials usable for signed requests, if any.
    pub fn live_credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref().filter(|c| c.is_complete())
    }

    /// REST endpoint for the selected environment.
    pub fn rest_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None if self.testnet => TESTNET_URL.to_string(),
            None => MAINNET_URL.to_string(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    pub fn price_retry_backoff(&self) -> Duration {
        Duration::from_secs(self.price_retry_secs)
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, DcaError> {
    raw.parse::<T>()
        .map_err(|_| DcaError::Config(format!("invalid value for {key}: '{raw}'")))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, DcaError> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(DcaError::Config(format!("invalid value for {key}: '{raw}'"))),
    }
}
