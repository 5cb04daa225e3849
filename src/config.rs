//! Configuration for the x402-pay command-line client.

use alloy_primitives::U256;
use alloy_signer_local::PrivateKeySigner;
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;
use x402_types::config::LiteralOrEnv;
use x402_types::util::money_amount::{MoneyAmount, MoneyAmountParseError};

/// CLI arguments for x402-pay.
#[derive(Parser, Debug)]
#[command(name = "x402-pay")]
#[command(about = "Fetch x402-protected resources, paying when challenged")]
pub struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Request a URL, paying a 402 challenge if one is returned
    Fetch(FetchArgs),
    /// List the paid resources a facilitator knows about
    Discover(DiscoverArgs),
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    pub url: Url,
    #[arg(long, short = 'X', default_value = "GET")]
    pub method: String,
    /// Extra request header as `Name: value`; may be repeated
    #[arg(long = "header", short = 'H')]
    pub headers: Vec<String>,
    /// Request body
    #[arg(long, short)]
    pub data: Option<String>,
    /// Spend ceiling for this request, e.g. `$0.05`
    #[arg(long)]
    pub max_value: Option<MoneyAmount>,
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Facilitator base URL, overriding the configured one
    #[arg(long)]
    pub facilitator: Option<Url>,
    /// Print at most this many resources
    #[arg(long)]
    pub limit_output: Option<usize>,
}

/// Client configuration.
///
/// Every field is optional. Missing values fall back to environment
/// variables, then to hardcoded defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "config_defaults::default_private_key")]
    private_key: Option<LiteralOrEnv<PrivateKeySigner>>,
    /// Networks the key pays on; empty means any EVM network
    #[serde(default)]
    networks: Vec<String>,
    #[serde(default)]
    max_value: Option<LiteralOrEnv<MoneyAmount>>,
    #[serde(default)]
    max_value_atomic: Option<LiteralOrEnv<U256>>,
    #[serde(default = "config_defaults::default_decimals")]
    decimals: u32,
    #[serde(default = "config_defaults::default_facilitator")]
    facilitator: LiteralOrEnv<Url>,
    #[serde(default)]
    request_timeout_seconds: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            private_key: config_defaults::default_private_key(),
            networks: Vec::new(),
            max_value: None,
            max_value_atomic: None,
            decimals: config_defaults::default_decimals(),
            facilitator: config_defaults::default_facilitator(),
            request_timeout_seconds: None,
        }
    }
}

pub mod config_defaults {
    use alloy_signer_local::PrivateKeySigner;
    use std::env;
    use url::Url;
    use x402_types::config::LiteralOrEnv;

    pub const DEFAULT_DECIMALS: u32 = 6;
    pub const DEFAULT_FACILITATOR: &str = "https://x402.org/facilitator/";

    /// Returns the key from $EVM_PRIVATE_KEY, if set and valid
    pub fn default_private_key() -> Option<LiteralOrEnv<PrivateKeySigner>> {
        env::var("EVM_PRIVATE_KEY")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(LiteralOrEnv::from_literal)
    }

    pub fn default_decimals() -> u32 {
        DEFAULT_DECIMALS
    }

    /// Returns the facilitator URL with fallback: $X402_FACILITATOR_URL -> x402.org
    pub fn default_facilitator() -> LiteralOrEnv<Url> {
        let url = env::var("X402_FACILITATOR_URL")
            .ok()
            .and_then(|s| Url::parse(&s).ok())
            .unwrap_or_else(|| Url::parse(DEFAULT_FACILITATOR).expect("static url"));
        LiteralOrEnv::from_literal(url)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("Invalid maxValue: {0}")]
    MaxValue(#[from] MoneyAmountParseError),
}

impl Config {
    pub fn private_key(&self) -> Option<&PrivateKeySigner> {
        self.private_key.as_ref().map(|key| key.inner())
    }

    pub fn networks(&self) -> &[String] {
        &self.networks
    }

    pub fn facilitator(&self) -> &Url {
        self.facilitator.inner()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_seconds.map(Duration::from_secs)
    }

    /// The spend ceiling in token base units, if one is configured.
    ///
    /// A CLI override wins over `maxValueAtomic`, which wins over `maxValue`.
    pub fn max_value(&self, cli_override: Option<&MoneyAmount>) -> Result<Option<U256>, ConfigError> {
        if let Some(amount) = cli_override {
            return Ok(Some(amount.as_token_amount(self.decimals)?));
        }
        if let Some(atomic) = &self.max_value_atomic {
            return Ok(Some(*atomic.inner()));
        }
        match &self.max_value {
            Some(amount) => Ok(Some(amount.as_token_amount(self.decimals)?)),
            None => Ok(None),
        }
    }

    /// Loads the configuration.
    ///
    /// The config file path is determined by:
    /// 1. `--config <path>` CLI argument (or `$CONFIG`)
    /// 2. `./config.json` (if it exists)
    ///
    /// Without either, defaults and environment variables are used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => {
                let fallback = Path::new("config.json");
                if fallback.exists() {
                    Self::load_from_path(fallback)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn test_parse_full_config() {
        let json = format!(
            r#"{{
                "privateKey": "{KEY}",
                "networks": ["base-sepolia", "eip155:8453"],
                "maxValue": "$0.25",
                "facilitator": "https://facilitator.example/",
                "requestTimeoutSeconds": 15
            }}"#
        );
        let config: Config = serde_json::from_str(&json).unwrap();
        assert!(config.private_key().is_some());
        assert_eq!(config.networks().len(), 2);
        assert_eq!(config.facilitator().as_str(), "https://facilitator.example/");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.max_value(None).unwrap(), Some(U256::from(250_000u64)));
    }

    #[test]
    fn test_private_key_from_env() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("X402_PAY_TEST_KEY", KEY) };
        let config: Config =
            serde_json::from_str(r#"{"privateKey": "${X402_PAY_TEST_KEY}"}"#).unwrap();
        assert!(config.private_key().is_some());
    }

    #[test]
    fn test_max_value_precedence() {
        let config: Config =
            serde_json::from_str(r#"{"maxValue": "1", "maxValueAtomic": "42", "decimals": 2}"#)
                .unwrap();
        assert_eq!(config.max_value(None).unwrap(), Some(U256::from(42u64)));
        let cli = MoneyAmount::parse("0.5").unwrap();
        assert_eq!(config.max_value(Some(&cli)).unwrap(), Some(U256::from(50u64)));

        let too_precise = MoneyAmount::parse("0.001").unwrap();
        assert!(matches!(
            config.max_value(Some(&too_precise)),
            Err(ConfigError::MaxValue(_))
        ));
    }

    #[test]
    fn test_defaults_without_file() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_value(None).unwrap(), None);
        assert!(config.networks().is_empty());
    }
}
