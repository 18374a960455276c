//! Hub configuration: JSON file, then command-line overrides.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, FixedOffset, Local, Offset};
use serde::{Deserialize, Serialize};

use crate::chain::{parse_xpl, Amount, ChainError, WalletAddress};
use crate::leaderboard::{Leaderboard, DEFAULT_LIMIT};
use crate::profile::SPIN_COOLDOWN_SECS;

pub const DEFAULT_STORAGE_FILE: &str = "plasma-hub.plh";
pub const DEFAULT_NAMESPACE: &str = "plasma";
pub const CONTRACT_ADDRESS_ENV: &str = "PLASMA_CONTRACT_ADDRESS";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading config {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("parsing config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid game price: {0}")]
    Price(ChainError),
    #[error("invalid contract address: {0}")]
    ContractAddress(ChainError),
    #[error("utc offset out of range: {0} minutes")]
    Offset(i32),
    #[error("leaderboard size must be at least 1")]
    LeaderboardSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HubConfig {
    /// Snapshot file; `None` keeps everything in memory.
    pub storage_path: Option<PathBuf>,
    /// Key prefix inside the store; `None` uses bare keys.
    pub namespace: Option<String>,
    pub contract_address: Option<String>,
    /// Decimal XPL, e.g. `"0.001"`.
    pub game_price: String,
    pub leaderboard_size: usize,
    /// Offset used for the daily window; `None` uses the machine's local offset.
    pub daily_utc_offset_minutes: Option<i32>,
    pub spin_cooldown_secs: i64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            storage_path: Some(PathBuf::from(DEFAULT_STORAGE_FILE)),
            namespace: Some(DEFAULT_NAMESPACE.to_string()),
            contract_address: None,
            game_price: "0.001".to_string(),
            leaderboard_size: DEFAULT_LIMIT,
            daily_utc_offset_minutes: None,
            spin_cooldown_secs: SPIN_COOLDOWN_SECS,
        }
    }
}

impl HubConfig {
    /// Read a JSON config; absent fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let config: HubConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.game_price_wei()?;
        self.contract_address()?;
        self.local_offset()?;
        if self.leaderboard_size == 0 {
            return Err(ConfigError::LeaderboardSize);
        }
        Ok(())
    }

    pub fn game_price_wei(&self) -> Result<Amount, ConfigError> {
        parse_xpl(&self.game_price).map_err(ConfigError::Price)
    }

    pub fn contract_address(&self) -> Result<Option<WalletAddress>, ConfigError> {
        self.contract_address
            .as_deref()
            .map(|a| a.parse().map_err(ConfigError::ContractAddress))
            .transpose()
    }

    pub fn local_offset(&self) -> Result<FixedOffset, ConfigError> {
        match self.daily_utc_offset_minutes {
            Some(minutes) => minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .ok_or(ConfigError::Offset(minutes)),
            None => Ok(Local::now().offset().fix()),
        }
    }

    pub fn spin_cooldown(&self) -> Duration { Duration::seconds(self.spin_cooldown_secs.max(0)) }

    pub fn leaderboard(&self) -> Result<Leaderboard, ConfigError> {
        Ok(Leaderboard::new(self.leaderboard_size, self.local_offset()?))
    }
}
