//! Configuration loading and credential handling
//!
//! The API key resolves with explicit override → environment → TOML config
//! file priority. Settings persist to `{config_dir}/voxsep/config.toml`;
//! writes go through a temp file + rename so a crash never leaves a torn
//! config behind.

use crate::error::{Error, Result};
use crate::types::Target;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

/// Environment variable holding the AudioShake API key
pub const API_KEY_ENV: &str = "AUDIOSHAKE_API_KEY";

/// Persisted settings (TOML)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// AudioShake API key (lowest-priority credential source)
    pub api_key: Option<String>,
    /// Separation model requested per task (e.g. "vocals")
    pub model: String,
    /// Output format requested per task (e.g. "wav")
    pub format: String,
    /// Optional model variant
    pub variant: Option<String>,
    /// Request the residual (everything minus the model output)
    pub residual: bool,
    /// Optional language hint for lyric-aware models
    pub language: Option<String>,
    /// Seconds between task status polls
    pub poll_interval_secs: u64,
    /// Append-only per-run result log, one `{file}\t{status}` line per entry
    pub log_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "vocals".to_string(),
            format: "wav".to_string(),
            variant: None,
            residual: false,
            language: None,
            poll_interval_secs: 5,
            log_path: None,
        }
    }
}

impl Settings {
    /// Default config file location: `{config_dir}/voxsep/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("voxsep").join("config.toml"))
    }

    /// Load settings from `path`, or from the default location when `None`.
    /// A missing file yields defaults; a malformed file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("read {} failed: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("parse {} failed: {e}", path.display())))
    }

    /// Write settings to `path` atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("serialize config failed: {e}")))?;

        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Build the task target from the configured model, format, and modifiers.
    pub fn target(&self) -> Target {
        Target {
            model: self.model.clone(),
            formats: vec![self.format.clone()],
            variant: self.variant.clone(),
            residual: self.residual,
            language: self.language.clone(),
        }
    }

    /// Resolve the API key: explicit override → environment → config file.
    ///
    /// Warns when more than one source holds a key, then uses the
    /// highest-priority one. No key anywhere is a `Config` error carrying a
    /// remediation message that names every source.
    pub fn resolve_api_key(&self, override_key: Option<&str>) -> Result<Credential> {
        let override_key = override_key.filter(|k| is_valid_key(k));
        let env_key = std::env::var(API_KEY_ENV).ok().filter(|k| is_valid_key(k));
        let file_key = self.api_key.as_deref().filter(|k| is_valid_key(k));

        let mut sources = Vec::new();
        if override_key.is_some() {
            sources.push("command line");
        }
        if env_key.is_some() {
            sources.push("environment");
        }
        if file_key.is_some() {
            sources.push("config file");
        }

        if sources.len() > 1 {
            warn!(
                "API key found in multiple sources: {}. Using {} (highest priority).",
                sources.join(", "),
                sources[0]
            );
        }

        override_key
            .map(str::to_string)
            .or(env_key)
            .or_else(|| file_key.map(str::to_string))
            .map(Credential::new)
            .ok_or_else(|| {
                let config_path = Self::default_path()
                    .unwrap_or_else(|| PathBuf::from("voxsep/config.toml"));
                Error::Config(format!(
                    "AudioShake API key not configured. Provide one of:\n\
                     1. Command line: --api-key your-key-here\n\
                     2. Environment: {API_KEY_ENV}=your-key-here\n\
                     3. Config file: {} (api_key = \"your-key\")\n\
                     \n\
                     Obtain an API key at: https://www.audioshake.ai",
                    config_path.display()
                ))
            })
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Shared credential handle.
///
/// Read per request by the task client, replaced wholesale by a settings
/// update. A replacement is immediately visible to subsequent requests;
/// in-flight requests keep the value they already read.
#[derive(Debug, Clone)]
pub struct Credential {
    inner: Arc<RwLock<String>>,
}

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(key.into())),
        }
    }

    /// Current key value
    pub fn get(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the key atomically
    pub fn set(&self, key: impl Into<String>) {
        *self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner) = key.into();
    }
}
