use crate::auth::{CredentialError, SecureSecret};
use crate::types::Size;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Broker environment selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Live,
    Demo,
}

impl Environment {
    /// Streaming endpoint for the selected environment
    pub fn ws_url(&self) -> &'static str {
        match self {
            Environment::Live => "wss://live.ctraderapi.com:5036",
            Environment::Demo => "wss://demo.ctraderapi.com:5036",
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(Environment::Live),
            "demo" => Ok(Environment::Demo),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown environment '{}', expected 'live' or 'demo'",
                other
            ))),
        }
    }
}

/// Named risk presets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Safe,
    Medium,
    Aggressive,
}

impl FromStr for RiskLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "safe" => Ok(RiskLevel::Safe),
            "medium" => Ok(RiskLevel::Medium),
            "aggressive" => Ok(RiskLevel::Aggressive),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown risk level '{}'",
                other
            ))),
        }
    }
}

/// Risk parameters for position management
///
/// Percentages are fractional (0.02 means 2 %). Validated once before any
/// trading loop starts; out-of-range values are rejected, never clamped.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    /// Minimum model confidence required to enter
    pub confidence_threshold: f64,
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub trailing_stop_pct: Decimal,
    /// Fraction of the take-profit distance that arms the one-time partial
    /// exit
    pub partial_exit_threshold: Decimal,
    /// Cap on position size as a fraction of account balance
    pub max_position_size: Decimal,
    /// Smallest sellable remainder; partial exits leaving less are skipped
    pub min_lot: Size,
    pub max_hold: Duration,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            stop_loss_pct: dec!(0.02),
            take_profit_pct: dec!(0.04),
            trailing_stop_pct: dec!(0.015),
            partial_exit_threshold: dec!(0.75),
            max_position_size: dec!(0.25),
            min_lot: Size::new(dec!(0.01)),
            max_hold: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl RiskConfig {
    /// Preset for a named risk level
    pub fn for_level(level: RiskLevel) -> Self {
        let base = Self::default();
        match level {
            RiskLevel::Safe => Self {
                confidence_threshold: 0.7,
                stop_loss_pct: dec!(0.02),
                take_profit_pct: dec!(0.03),
                trailing_stop_pct: dec!(0.015),
                max_position_size: dec!(0.15),
                ..base
            },
            RiskLevel::Medium => Self {
                confidence_threshold: 0.6,
                stop_loss_pct: dec!(0.03),
                take_profit_pct: dec!(0.05),
                trailing_stop_pct: dec!(0.02),
                max_position_size: dec!(0.25),
                ..base
            },
            RiskLevel::Aggressive => Self {
                confidence_threshold: 0.5,
                stop_loss_pct: dec!(0.05),
                take_profit_pct: dec!(0.08),
                trailing_stop_pct: dec!(0.03),
                max_position_size: dec!(0.35),
                ..base
            },
        }
    }

    /// Reject invalid parameter combinations before any loop starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fractional = [
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
            ("trailing_stop_pct", self.trailing_stop_pct),
            ("max_position_size", self.max_position_size),
        ];
        for (name, value) in fractional {
            if value <= Decimal::ZERO || value >= Decimal::ONE {
                return Err(ConfigError::OutOfRange {
                    field: name,
                    value: value.to_string(),
                });
            }
        }
        if self.partial_exit_threshold <= Decimal::ZERO || self.partial_exit_threshold > Decimal::ONE
        {
            return Err(ConfigError::OutOfRange {
                field: "partial_exit_threshold",
                value: self.partial_exit_threshold.to_string(),
            });
        }
        if self.stop_loss_pct >= self.take_profit_pct {
            return Err(ConfigError::StopNotBelowTake {
                stop: self.stop_loss_pct.to_string(),
                take: self.take_profit_pct.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "confidence_threshold",
                value: self.confidence_threshold.to_string(),
            });
        }
        if !self.min_lot.is_positive() {
            return Err(ConfigError::OutOfRange {
                field: "min_lot",
                value: self.min_lot.to_string(),
            });
        }
        if self.max_hold.is_zero() {
            return Err(ConfigError::OutOfRange {
                field: "max_hold",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Application configuration, immutable after load
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client_id: String,
    pub client_secret: SecureSecret,
    /// Broker account to authenticate; resolved from the account list when
    /// absent
    pub account_id: Option<i64>,
    pub environment: Environment,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scope: String,
    pub token_path: PathBuf,
    pub symbols: Vec<String>,
    /// Symbols scored with the relaxed high-volatility entry rule
    pub high_volatility_symbols: HashSet<String>,
    pub poll_interval: Duration,
    pub bar_period: String,
    pub bar_count: u32,
    pub risk: RiskConfig,
}

fn default_high_volatility() -> HashSet<String> {
    ["BTCUSD", "ETHUSD", "BTCEUR", "ETHEUR"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl AppConfig {
    /// Build a config with the given credentials and defaults for the rest
    pub fn new(client_id: String, client_secret: SecureSecret) -> Self {
        Self {
            client_id,
            client_secret,
            account_id: None,
            environment: Environment::Demo,
            auth_url: "https://id.ctrader.com/apps/auth".to_string(),
            token_url: "https://openapi.ctrader.com/apps/token".to_string(),
            redirect_uri: "http://localhost:8912/callback".to_string(),
            scope: "trading".to_string(),
            token_path: PathBuf::from("token.json"),
            symbols: vec!["EURUSD".to_string()],
            high_volatility_symbols: default_high_volatility(),
            poll_interval: Duration::from_secs(1),
            bar_period: "M1".to_string(),
            bar_count: 50,
            risk: RiskConfig::default(),
        }
    }

    /// Load configuration from `AUTOTRADER_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_id = env::var("AUTOTRADER_CLIENT_ID")
            .map_err(|_| ConfigError::Credential(CredentialError::Missing(
                "AUTOTRADER_CLIENT_ID".to_string(),
            )))?;
        let client_secret = SecureSecret::from_env("AUTOTRADER_CLIENT_SECRET")
            .map_err(ConfigError::Credential)?;

        let mut config = Self::new(client_id, client_secret);

        if let Ok(raw) = env::var("AUTOTRADER_ACCOUNT_ID") {
            let id = raw.parse::<i64>().map_err(|_| {
                ConfigError::InvalidValue(format!("AUTOTRADER_ACCOUNT_ID '{}'", raw))
            })?;
            config.account_id = Some(id);
        }
        if let Ok(raw) = env::var("AUTOTRADER_ENV") {
            config.environment = raw.parse()?;
        }
        if let Ok(raw) = env::var("AUTOTRADER_REDIRECT_URI") {
            config.redirect_uri = raw;
        }
        if let Ok(raw) = env::var("AUTOTRADER_TOKEN_PATH") {
            config.token_path = PathBuf::from(raw);
        }
        if let Ok(raw) = env::var("AUTOTRADER_SYMBOLS") {
            config.symbols = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(raw) = env::var("AUTOTRADER_RISK_LEVEL") {
            config.risk = RiskConfig::for_level(raw.parse()?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn is_high_volatility(&self, symbol: &str) -> bool {
        self.high_volatility_symbols.contains(symbol)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::InvalidValue(
                "at least one symbol is required".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::OutOfRange {
                field: "poll_interval",
                value: "0".to_string(),
            });
        }
        self.risk.validate()
    }
}

/// Configuration error
#[derive(Debug, Clone)]
pub enum ConfigError {
    Credential(CredentialError),
    InvalidValue(String),
    OutOfRange {
        field: &'static str,
        value: String,
    },
    StopNotBelowTake {
        stop: String,
        take: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Credential(e) => write!(f, "Credential error: {}", e),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
            ConfigError::OutOfRange { field, value } => {
                write!(f, "Configuration value out of range: {} = {}", field, value)
            }
            ConfigError::StopNotBelowTake { stop, take } => write!(
                f,
                "Stop loss ({}) must be below take profit ({})",
                stop, take
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
