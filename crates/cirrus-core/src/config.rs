//! Core configuration.
//!
//! Layered figment sources: built-in defaults, then an optional TOML file,
//! then `CIRRUS_`-prefixed environment variables.

use anyhow::Context;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "cirrus.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Directory holding the persisted .dat snapshots.
    pub data_dir: PathBuf,
    /// Allow bill payment to push a balance negative.
    pub overdraft_allowed: bool,
    /// Minimum billable duration in hours, if any.
    pub min_billing_hours: Option<f64>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            overdraft_allowed: false,
            min_billing_hours: None,
        }
    }
}

impl CoreConfig {
    /// Load configuration, optionally from an explicit file path. Without
    /// one, `cirrus.toml` in the working directory is used when present.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(CoreConfig::default()));
        match path {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if Path::new(DEFAULT_CONFIG_FILE).exists() {
                    figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
                }
            }
        }
        figment
            .merge(Env::prefixed("CIRRUS_"))
            .extract()
            .context("failed to load configuration")
    }

    pub fn min_billing_decimal(&self) -> Option<Decimal> {
        self.min_billing_hours.and_then(Decimal::from_f64)
    }
}
