//! Config model and persistence helpers.

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::{fs, path::Path};

use crate::validator::ValidationPolicy;

/// Top-level configuration stored in `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the client believes it is served from.
    pub site: SiteCfg,
    /// Backend location overrides.
    pub api: ApiCfg,
    /// Validation policy for the background-removal panel.
    #[serde(deserialize_with = "background_policy")]
    pub background: ValidationPolicy,
    /// Validation policy for the watermark-removal panel.
    #[serde(deserialize_with = "watermark_policy")]
    pub watermark: ValidationPolicy,
    /// Settings used by the relay binary.
    pub relay: RelayCfg,
}

/// A policy section where each omitted key keeps the panel's default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PolicySection {
    allowed_types: Option<Vec<String>>,
    max_bytes: Option<u64>,
}

impl PolicySection {
    fn over(self, base: ValidationPolicy) -> ValidationPolicy {
        ValidationPolicy::new(
            self.allowed_types.unwrap_or(base.allowed_types),
            self.max_bytes.unwrap_or(base.max_bytes),
        )
    }
}

fn background_policy<'de, D: Deserializer<'de>>(d: D) -> Result<ValidationPolicy, D::Error> {
    Ok(PolicySection::deserialize(d)?.over(ValidationPolicy::background_removal()))
}

fn watermark_policy<'de, D: Deserializer<'de>>(d: D) -> Result<ValidationPolicy, D::Error> {
    Ok(PolicySection::deserialize(d)?.over(ValidationPolicy::watermark_removal()))
}

/// Page origin the client runs as.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteCfg {
    /// Origin including scheme and port, e.g. `https://www.airemover.im`.
    pub origin: String,
}

/// Explicit backend base URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiCfg {
    /// Overrides hostname-based resolution when non-empty.
    pub base_url: String,
}

/// Relay listen address and upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayCfg {
    /// Socket address the relay binds to.
    pub listen: String,
    /// Fixed backend origin requests are forwarded to.
    pub upstream: String,
    /// Host-level budget for a single forwarded request.
    pub max_duration_secs: u64,
}

impl Config {
    /// Load from disk or create defaults when missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let s = fs::read_to_string(path)?;
            Ok(toml::from_str(&s)?)
        } else {
            let cfg = Self::default();
            cfg.save(path)?;
            Ok(cfg)
        }
    }

    /// Persist the config as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let s = toml::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }

    /// Apply `AIREMOVER_RELAY_*` environment overrides to the relay section.
    pub fn apply_relay_env(&mut self) {
        if let Ok(listen) = std::env::var("AIREMOVER_RELAY_LISTEN")
            && !listen.trim().is_empty()
        {
            self.relay.listen = listen.trim().to_string();
        }
        if let Ok(upstream) = std::env::var("AIREMOVER_RELAY_UPSTREAM")
            && !upstream.trim().is_empty()
        {
            self.relay.upstream = upstream.trim().to_string();
        }
    }
}

impl Default for Config {
    /// Defaults match a local development checkout.
    fn default() -> Self {
        Self {
            site: SiteCfg::default(),
            api: ApiCfg::default(),
            background: ValidationPolicy::background_removal(),
            watermark: ValidationPolicy::watermark_removal(),
            relay: RelayCfg::default(),
        }
    }
}

impl Default for SiteCfg {
    fn default() -> Self {
        Self {
            origin: "http://localhost:18180".into(),
        }
    }
}

impl Default for RelayCfg {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:18182".into(),
            upstream: "http://127.0.0.1:18181".into(),
            max_duration_secs: 300,
        }
    }
}
