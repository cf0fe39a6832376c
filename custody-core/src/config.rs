//! Configuration for the custody ledger

use crate::types::{Amount, BlockHeight, Principal};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Principal allowed to verify, revert, and administer the platform
    pub admin: Principal,

    /// Principal holding custody balances
    pub custody_account: Principal,

    /// Trust bounds and durations
    pub limits: LimitsConfig,

    /// Security guard thresholds
    pub guard: GuardConfig,

    /// Storage backend
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            admin: Principal::new("ST1ADMIN"),
            custody_account: Principal::new("ST1CUSTODY"),
            limits: LimitsConfig::default(),
            guard: GuardConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Trust bounds and durations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Time units between creation and termination
    pub trust_duration: BlockHeight,

    /// Largest single extension
    pub max_extension: BlockHeight,

    /// Milestone slots per trust
    pub max_milestones: usize,

    /// Trust ids per verification batch
    pub max_batch_size: usize,

    /// Beneficiaries per split trust
    pub max_beneficiaries: usize,

    /// Deposit posted with an audit
    #[serde(with = "amount_u64")]
    pub audit_deposit: Amount,

    /// Audit findings length (bytes)
    pub max_findings_len: usize,

    /// Milestone details length (bytes)
    pub max_details_len: usize,

    /// Flag reason length (bytes)
    pub max_reason_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            trust_duration: 1008, // ~1 week of blocks
            max_extension: 1008,
            max_milestones: 5,
            max_batch_size: 10,
            max_beneficiaries: 5,
            audit_deposit: 1_000_000,
            max_findings_len: 500,
            max_details_len: 256,
            max_reason_len: 256,
        }
    }
}

/// Security guard thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Rolling window length (time units)
    pub rate_window: BlockHeight,

    /// Creations allowed per window
    pub max_per_window: u32,

    /// Amounts above this are high-value
    #[serde(with = "amount_u64")]
    pub high_value_threshold: Amount,

    /// Prior creations in window that make a high-value creation suspicious
    pub consecutive_threshold: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            rate_window: 144, // ~1 day of blocks
            max_per_window: 5,
            high_value_threshold: 1_000_000_000,
            consecutive_threshold: 3,
        }
    }
}

/// TOML integers are 64-bit; amounts in config files are read as `u64` and widened
mod amount_u64 {
    use crate::types::Amount;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        u64::try_from(*value)
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        u64::deserialize(deserializer).map(Amount::from)
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process map
    Memory,
    /// RocksDB (requires the `rocksdb` feature)
    RocksDb,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend
    pub backend: StorageBackend,

    /// Data directory for RocksDB
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: PathBuf::from("./data/custody"),
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
    ///
    /// Reads `CUSTODY_ADMIN`, `CUSTODY_ACCOUNT`, `CUSTODY_BACKEND` (`memory` or
    /// `rocksdb`) and `CUSTODY_DATA_DIR`. The data directory alone does not
    /// change the backend.
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(admin) = std::env::var("CUSTODY_ADMIN") {
            config.admin = Principal::new(admin);
        }

        if let Ok(account) = std::env::var("CUSTODY_ACCOUNT") {
            config.custody_account = Principal::new(account);
        }

        if let Ok(backend) = std::env::var("CUSTODY_BACKEND") {
            config.storage.backend = match backend.to_ascii_lowercase().as_str() {
                "memory" => StorageBackend::Memory,
                "rocksdb" => StorageBackend::RocksDb,
                other => {
                    return Err(crate::Error::Config(format!(
                        "unknown storage backend: {}",
                        other
                    )))
                }
            };
        }

        if let Ok(data_dir) = std::env::var("CUSTODY_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(data_dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the ledger cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.admin == self.custody_account {
            return Err(crate::Error::Config(
                "admin and custody account must differ".to_string(),
            ));
        }
        if self.limits.max_milestones == 0
            || self.limits.max_batch_size == 0
            || self.limits.max_beneficiaries == 0
        {
            return Err(crate::Error::Config("bounds must be non-zero".to_string()));
        }
        if self.guard.max_per_window == 0 {
            return Err(crate::Error::Config(
                "max_per_window must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
