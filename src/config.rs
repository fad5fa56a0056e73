//! Configuration for the ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// HS256 secret for verifying platform JWTs
    pub jwt_secret: String,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,

    /// Conflict retry configuration
    pub retry: RetryConfig,

    /// Referral configuration
    pub referral: ReferralConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/ledger"),
            service_name: "aqua-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            jwt_secret: "change-me".to_string(),
            rocksdb: RocksDbConfig::default(),
            retry: RetryConfig::default(),
            referral: ReferralConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
        }
    }
}

/// Retry policy for conflict-rejected mutations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts before a Conflict surfaces to the caller
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Referral configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralConfig {
    /// Generated code length (8..=12)
    pub code_length: usize,

    /// Base URL embedded in referral links
    pub base_url: String,

    /// Reward credited to the referrer when a code is used
    pub reward: Decimal,

    /// XP granted to the referrer when a code is used
    pub xp: u64,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            code_length: 10,
            base_url: "https://aquastake.example".to_string(),
            reward: Decimal::new(1000, 2), // 10.00
            xp: 50,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("AQUA_LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(secret) = std::env::var("AQUA_LEDGER_JWT_SECRET") {
            config.jwt_secret = secret;
        }

        if let Ok(base_url) = std::env::var("AQUA_LEDGER_REFERRAL_BASE_URL") {
            config.referral.base_url = base_url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the ledger cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if !(crate::referral::MIN_CODE_LEN..=crate::referral::MAX_CODE_LEN)
            .contains(&self.referral.code_length)
        {
            return Err(crate::Error::Config(format!(
                "referral code_length {} outside {}..={}",
                self.referral.code_length,
                crate::referral::MIN_CODE_LEN,
                crate::referral::MAX_CODE_LEN
            )));
        }

        if self.referral.reward < Decimal::ZERO {
            return Err(crate::Error::Config(
                "referral reward cannot be negative".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(crate::Error::Config(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "aqua-ledger");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.referral.code_length, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_code_length_rejected() {
        let mut config = Config::default();
        config.referral.code_length = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_retries_rejected() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
