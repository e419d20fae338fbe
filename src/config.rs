use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Error;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FurnivecConfig {
    pub server: ServerConfig,
    pub openrouter: OpenRouterConfig,
    pub supabase: SupabaseConfig,
    pub client: ClientConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OpenRouterConfig {
    pub base_url: String,
    pub api_key: String,
    pub referer: String,
    pub title: String,
    pub describe_model: String,
    pub embed_model: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
    pub anon_key: String,
    pub bucket: String,
    pub table: String,
}

/// Settings for the CLI side, which talks to a running `furnivec serve`.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    /// Fixed delay between batch items in unattended runs, to avoid
    /// overwhelming the upstream services.
    pub pace_ms: u64,
}

impl Default for FurnivecConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            openrouter: OpenRouterConfig::default(),
            supabase: SupabaseConfig::default(),
            client: ClientConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 4280,
            log_level: "info".into(),
        }
    }
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".into(),
            api_key: String::new(),
            referer: "http://localhost:4280/furnivec".into(),
            title: "Furniture Vector Lab".into(),
            describe_model: "google/gemini-2.0-flash-001".into(),
            embed_model: "openai/text-embedding-3-small".into(),
        }
    }
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_role_key: String::new(),
            anon_key: String::new(),
            bucket: "furniture-previews".into(),
            table: "furniture_items".into(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:4280".into(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { pace_ms: 500 }
    }
}

/// Returns `~/.furnivec/`
pub fn default_furnivec_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".furnivec")
}

/// Returns the default config file path: `~/.furnivec/config.toml`
pub fn default_config_path() -> PathBuf {
    default_furnivec_dir().join("config.toml")
}

impl FurnivecConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            FurnivecConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides for every external credential and
    /// endpoint, plus the log level and the CLI's API base.
    fn apply_env_overrides(&mut self) {
        let overrides: &mut [(&str, &mut String)] = &mut [
            ("OPENROUTER_API_KEY", &mut self.openrouter.api_key),
            ("OPENROUTER_REFERER", &mut self.openrouter.referer),
            ("OPENROUTER_TITLE", &mut self.openrouter.title),
            (
                "OPENROUTER_DESCRIBE_MODEL",
                &mut self.openrouter.describe_model,
            ),
            ("OPENROUTER_EMBED_MODEL", &mut self.openrouter.embed_model),
            ("SUPABASE_URL", &mut self.supabase.url),
            (
                "SUPABASE_SERVICE_ROLE_KEY",
                &mut self.supabase.service_role_key,
            ),
            ("SUPABASE_ANON_KEY", &mut self.supabase.anon_key),
            ("SUPABASE_IMAGE_BUCKET", &mut self.supabase.bucket),
            ("FURNIVEC_API_BASE", &mut self.client.api_base),
            ("FURNIVEC_LOG_LEVEL", &mut self.server.log_level),
        ];
        for (var, slot) in overrides {
            if let Ok(val) = std::env::var(*var) {
                **slot = val;
            }
        }
    }

    /// Validate that every credential the server needs is present.
    ///
    /// Called once at `serve` startup so a missing key fails fast instead of
    /// surfacing on the first upstream call.
    pub fn validate_for_serve(&self) -> crate::error::Result<()> {
        if self.openrouter.api_key.is_empty() {
            return Err(Error::ConfigurationMissing {
                name: "OPENROUTER_API_KEY",
            });
        }
        if self.supabase.url.is_empty() {
            return Err(Error::ConfigurationMissing {
                name: "SUPABASE_URL",
            });
        }
        if self.supabase.service_role_key.is_empty() {
            return Err(Error::ConfigurationMissing {
                name: "SUPABASE_SERVICE_ROLE_KEY",
            });
        }
        Ok(())
    }
}
