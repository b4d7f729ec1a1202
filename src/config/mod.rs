// src/config/mod.rs
//! Service configuration.
//!
//! Loaded from TOML (`$REVIEW_CONFIG_PATH`, falling back to
//! `config/review_sentinel.toml`). Every field has a default, so a missing
//! file is not an error. Secrets and deployment knobs are then overlaid from
//! the environment (see [`AppConfig::apply_env_overrides`]).

pub mod notify;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::Role;
use crate::classify::SpamParams;
use crate::model::{Category, Property, Source};

pub use crate::config::notify::{NotifierKind, NotifyConfig, TwilioConfig, WhatsAppCloudConfig};

pub const DEFAULT_CONFIG_PATH: &str = "config/review_sentinel.toml";
pub const ENV_CONFIG_PATH: &str = "REVIEW_CONFIG_PATH";
pub const ENV_SNAPSHOT_PATH: &str = "REVIEW_SNAPSHOT_PATH";

fn default_text_min() -> usize {
    10
}
fn default_text_max() -> usize {
    2000
}
fn default_author() -> String {
    "Anonymous".to_string()
}
fn default_source() -> Source {
    Source::Internal
}
fn default_category() -> Category {
    Category::Service
}

/// Submission limits and defaults for unset optional fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeLimits {
    #[serde(default = "default_text_min")]
    pub text_min: usize,
    #[serde(default = "default_text_max")]
    pub text_max: usize,
    #[serde(default = "default_author")]
    pub default_author: String,
    #[serde(default = "default_source")]
    pub default_source: Source,
    #[serde(default = "default_category")]
    pub default_category: Category,
}

impl Default for IntakeLimits {
    fn default() -> Self {
        Self {
            text_min: default_text_min(),
            text_max: default_text_max(),
            default_author: default_author(),
            default_source: default_source(),
            default_category: default_category(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON snapshot file; `None` keeps everything in memory only.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

/// A pre-issued bearer session. Tokens are issued elsewhere; the service
/// only resolves them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub token: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub intake: IntakeLimits,
    #[serde(default)]
    pub spam: SpamParams,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sessions: Vec<SessionConfig>,
    /// Properties imported into the store at startup when missing.
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s).context("parsing review config TOML")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    /// Resolve the config path from env, read it if present, then apply env overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut cfg = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(&|key| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        });
    }

    pub(crate) fn apply_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(p) = lookup(ENV_SNAPSHOT_PATH) {
            self.store.snapshot_path = Some(PathBuf::from(p));
        }
        self.notify.apply_overrides(lookup);
    }

    fn sanitize(&mut self) {
        if self.intake.text_min > self.intake.text_max {
            // swap to keep a valid interval
            std::mem::swap(&mut self.intake.text_min, &mut self.intake.text_max);
        }
        self.notify.default_country_code = self
            .notify
            .default_country_code
            .trim()
            .trim_start_matches('+')
            .to_string();
    }
}
