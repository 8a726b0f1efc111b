//! Node configuration
//!
//! A JSON file listing which PGNs the node transmits, which of their SPNs
//! it exposes and their starting state. It lives at
//! `$XDG_CONFIG_HOME/j1939sim/config.json`, falling back to
//! `~/.config/j1939sim/config.json`, and is created with defaults when
//! missing.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use j1939_protocol::ProtocolCatalog;
use j1939_tx::{EntryTxMode, GlobalTxMode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;

/// Global transmit mode as written in the config file
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GlobalModeSetting {
    /// Send nothing
    #[default]
    Stop,
    /// Send every PGN
    All,
    /// Let each PGN's mode decide
    PerPgn,
}

impl From<GlobalModeSetting> for GlobalTxMode {
    fn from(setting: GlobalModeSetting) -> Self {
        match setting {
            GlobalModeSetting::Stop => GlobalTxMode::StopAll,
            GlobalModeSetting::All => GlobalTxMode::TransmitAll,
            GlobalModeSetting::PerPgn => GlobalTxMode::PerEntry,
        }
    }
}

/// Per-PGN transmit mode as written in the config file
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PgnModeSetting {
    /// Not sent under per-PGN policy
    #[default]
    Stop,
    /// Sent every period under per-PGN policy
    Continuous,
}

impl From<PgnModeSetting> for EntryTxMode {
    fn from(setting: PgnModeSetting) -> Self {
        match setting {
            PgnModeSetting::Stop => EntryTxMode::Stop,
            PgnModeSetting::Continuous => EntryTxMode::Continuous,
        }
    }
}

/// Starting value of a signal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SignalValue {
    /// Raw bus value, written as `{"raw": 5}`
    Raw {
        /// Unscaled value
        raw: u32,
    },
    /// Engineering-unit value of a numeric signal
    Decoded(f64),
    /// Label of a discrete signal
    Label(String),
}

/// One simulated PGN
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PgnConfig {
    /// Parameter Group Number
    pub pgn: u32,
    /// SPNs the node exposes; empty means every SPN in the catalog
    #[serde(default)]
    pub spns: Vec<u32>,
    /// Priority override
    #[serde(default)]
    pub priority: Option<u8>,
    /// Period override in milliseconds
    #[serde(default)]
    pub period_ms: Option<u64>,
    /// Starting per-PGN mode
    #[serde(default)]
    pub mode: PgnModeSetting,
    /// Starting signal values keyed by SPN
    #[serde(default)]
    pub values: BTreeMap<u32, SignalValue>,
}

impl PgnConfig {
    /// Simulate `pgn` with catalog defaults
    pub fn new(pgn: u32) -> Self {
        Self {
            pgn,
            spns: Vec::new(),
            priority: None,
            period_ms: None,
            mode: PgnModeSetting::default(),
            values: BTreeMap::new(),
        }
    }
}

/// Simulated node configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimConfig {
    /// Protocol catalog file; relative paths are resolved against the
    /// config file's directory
    pub catalog: PathBuf,
    /// Source address frames are sent from
    #[serde(default)]
    pub source_address: u8,
    /// Starting global mode
    #[serde(default)]
    pub global_mode: GlobalModeSetting,
    /// Log filter used when `RUST_LOG` is not set
    #[serde(default)]
    pub log_filter: Option<String>,
    /// Simulated PGNs
    #[serde(default)]
    pub pgns: Vec<PgnConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        let mut eec1 = PgnConfig::new(61444);
        eec1.spns = vec![190, 899];
        let mut et1 = PgnConfig::new(65262);
        et1.spns = vec![110];

        Self {
            catalog: PathBuf::from("J1939.json"),
            source_address: 0x00,
            global_mode: GlobalModeSetting::Stop,
            log_filter: None,
            pgns: vec![eec1, et1],
        }
    }
}

impl SimConfig {
    /// Get the XDG config directory for j1939sim
    pub fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("j1939sim"));
            }
        }
        dirs::home_dir().map(|h| h.join(".config").join("j1939sim"))
    }

    /// Default config file path
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Self::config_dir()
            .map(|dir| dir.join("config.json"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading config from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&json)?;
        if config.catalog.is_relative() {
            if let Some(dir) = path.parent() {
                config.catalog = dir.join(&config.catalog);
            }
        }
        Ok(config)
    }

    /// Load a config file, writing the defaults there first if it is missing
    pub fn load_or_bootstrap(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No config at {}, writing defaults", path.display());
            Self::default().save(path)?;
        }
        Self::load(path)
    }

    /// Write the config as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check every PGN and SPN reference against the catalog
    pub fn validate(&self, catalog: &ProtocolCatalog) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for pgn_config in &self.pgns {
            let pgn = pgn_config.pgn;
            if !seen.insert(pgn) {
                return Err(ConfigError::DuplicatePgn(pgn));
            }
            let spec = catalog.get(pgn).ok_or(ConfigError::UnknownPgn(pgn))?;
            for &spn in pgn_config.spns.iter().chain(pgn_config.values.keys()) {
                if spec.spn(spn).is_none() {
                    return Err(ConfigError::UnknownSpn { pgn, spn });
                }
            }
        }
        Ok(())
    }
}
