//! Configuration for the memory pipeline
//!
//! Resolution order, lowest to highest precedence:
//!   1. built-in defaults
//!   2. `config.toml` (`~/.chat-memory/config.toml` or an explicit path)
//!   3. environment knobs (`MEMORY_MIN_TURNS`, `SUMMARIZER_MODEL_ID`, ...)
//!
//! Nothing here is allowed to fail the caller: a missing file means
//! defaults, a malformed file or an unparsable knob is logged and ignored.

use crate::detect::SalienceMeasurement;
use crate::provider::ProviderConfig;
use crate::{MemoryError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

pub const DEFAULT_MIN_TURNS: usize = 5;
pub const DEFAULT_MIN_TOKENS: f64 = 400.0;
pub const DEFAULT_MIN_SALIENCE: usize = 3;
pub const DEFAULT_MAX_WINDOW_SIZE: usize = 10;

/// Logical id of the dedicated summarizer model
pub const DEFAULT_SUMMARIZER_MODEL: &str = "summarizer-model";

/// Models tried, in order, after the summarizer model fails
pub const DEFAULT_FALLBACK_MODELS: &[&str] = &["chat-model", "chat-model-reasoning", "artifact-model"];

pub const ENV_MEMORY_SLICE: &str = "MEMORY_SLICE";
pub const ENV_MIN_TURNS: &str = "MEMORY_MIN_TURNS";
pub const ENV_MIN_TOKENS: &str = "MEMORY_MIN_TOKENS";
pub const ENV_MIN_SALIENCE: &str = "MEMORY_MIN_SALIENCE";
pub const ENV_LAST_K_MAX: &str = "MEMORY_LAST_K_MAX";
pub const ENV_SUMMARIZER_MODEL: &str = "SUMMARIZER_MODEL_ID";
pub const ENV_CONFIG_HOME: &str = "CHAT_MEMORY_HOME";

/// Tunable thresholds for the memory pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// When false the pipeline never injects memory
    pub enabled: bool,
    /// Minimum user/assistant turns before summarization is considered
    pub min_turns: usize,
    /// Approximate token volume that alone justifies summarizing
    pub min_tokens: f64,
    /// Salience score that alone justifies summarizing
    pub min_salience: usize,
    /// Upper bound on the compacted window
    pub max_window_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_turns: DEFAULT_MIN_TURNS,
            min_tokens: DEFAULT_MIN_TOKENS,
            min_salience: DEFAULT_MIN_SALIENCE,
            max_window_size: DEFAULT_MAX_WINDOW_SIZE,
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by process environment knobs
    pub fn from_env() -> Self {
        Self::default().with_lookup(|key| std::env::var(key).ok())
    }

    /// Override fields from a key lookup (environment-style knobs)
    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(enabled) = lookup(ENV_MEMORY_SLICE).and_then(|raw| parse_flag(ENV_MEMORY_SLICE, &raw)) {
            self.enabled = enabled;
        }
        if let Some(v) = parse_knob(&lookup, ENV_MIN_TURNS) {
            self.min_turns = v;
        }
        if let Some(v) = parse_knob::<f64>(&lookup, ENV_MIN_TOKENS) {
            if v.is_finite() && v >= 0.0 {
                self.min_tokens = v;
            } else {
                warn!("Ignoring {}={}: expected a non-negative number", ENV_MIN_TOKENS, v);
            }
        }
        if let Some(v) = parse_knob(&lookup, ENV_MIN_SALIENCE) {
            self.min_salience = v;
        }
        if let Some(v) = parse_knob(&lookup, ENV_LAST_K_MAX) {
            self.max_window_size = v;
        }
        self
    }

    /// Turn-count floor AND (token volume OR salience). Ignores `enabled`.
    pub fn passes_gate(&self, turn_count: usize, measurement: &SalienceMeasurement) -> bool {
        turn_count >= self.min_turns
            && (measurement.approx_token_count >= self.min_tokens
                || measurement.salience_score >= self.min_salience)
    }

    pub fn with_min_turns(mut self, min_turns: usize) -> Self {
        self.min_turns = min_turns;
        self
    }

    pub fn with_min_tokens(mut self, min_tokens: f64) -> Self {
        self.min_tokens = min_tokens;
        self
    }

    pub fn with_min_salience(mut self, min_salience: usize) -> Self {
        self.min_salience = min_salience;
        self
    }

    pub fn with_max_window_size(mut self, max_window_size: usize) -> Self {
        self.max_window_size = max_window_size;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn apply_section(&mut self, section: MemorySection) {
        if let Some(v) = section.enabled {
            self.enabled = v;
        }
        if let Some(v) = section.min_turns {
            self.min_turns = v;
        }
        if let Some(v) = section.min_tokens {
            self.min_tokens = v;
        }
        if let Some(v) = section.min_salience {
            self.min_salience = v;
        }
        if let Some(v) = section.max_window_size {
            self.max_window_size = v;
        }
    }
}

/// Ordered list of backing model identifiers for the summarizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChain {
    pub primary: String,
    pub fallbacks: Vec<String>,
}

impl ModelChain {
    pub fn new(primary: impl Into<String>, fallbacks: Vec<String>) -> Self {
        Self {
            primary: primary.into(),
            fallbacks,
        }
    }

    /// Defaults with `SUMMARIZER_MODEL_ID` applied
    pub fn from_env() -> Self {
        Self::default().with_lookup(|key| std::env::var(key).ok())
    }

    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(model) = lookup(ENV_SUMMARIZER_MODEL).filter(|m| !m.trim().is_empty()) {
            self.primary = model.trim().to_string();
        }
        self
    }

    /// Primary first, then fallbacks in order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.fallbacks.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        1 + self.fallbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for ModelChain {
    fn default() -> Self {
        Self::new(
            DEFAULT_SUMMARIZER_MODEL,
            DEFAULT_FALLBACK_MODELS.iter().map(|m| m.to_string()).collect(),
        )
    }
}

// ─── config.toml ────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ConfigToml {
    memory: Option<MemorySection>,
    summarizer: Option<SummarizerSection>,
    provider: Option<ProviderSection>,
}

#[derive(Debug, Default, Deserialize)]
struct MemorySection {
    enabled: Option<bool>,
    min_turns: Option<usize>,
    min_tokens: Option<f64>,
    min_salience: Option<usize>,
    max_window_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SummarizerSection {
    model: Option<String>,
    fallback_models: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderSection {
    base_url: Option<String>,
    env_key: Option<String>,
    timeout_secs: Option<u64>,
    /// Logical model id -> provider model name, merged over the built-ins
    models: Option<HashMap<String, String>>,
    http_headers: Option<HashMap<String, String>>,
}

/// Everything the binary needs: thresholds, model chain, provider
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub models: ModelChain,
    pub provider: ProviderConfig,
}

impl AppConfig {
    /// `$CHAT_MEMORY_HOME/config.toml`, else `~/.chat-memory/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var(ENV_CONFIG_HOME) {
            return Some(PathBuf::from(home).join("config.toml"));
        }
        dirs::home_dir().map(|home| home.join(".chat-memory").join("config.toml"))
    }

    /// Parse a config file body on top of the built-in defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let parsed: ConfigToml = toml::from_str(content)?;
        let mut config = Self::default();

        if let Some(memory) = parsed.memory {
            config.pipeline.apply_section(memory);
        }

        if let Some(summarizer) = parsed.summarizer {
            if let Some(model) = summarizer.model {
                config.models.primary = model;
            }
            if let Some(fallbacks) = summarizer.fallback_models {
                config.models.fallbacks = fallbacks;
            }
        }

        if let Some(provider) = parsed.provider {
            if let Some(url) = provider.base_url {
                config.provider.base_url = url;
            }
            if let Some(key) = provider.env_key {
                config.provider.env_key = Some(key);
            }
            if let Some(secs) = provider.timeout_secs {
                config.provider.timeout_secs = secs;
            }
            if let Some(models) = provider.models {
                config.provider.models.extend(models);
            }
            if let Some(headers) = provider.http_headers {
                config.provider.http_headers.extend(headers);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Read and parse a config file. No environment knobs are applied.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        let min_tokens = self.pipeline.min_tokens;
        if !min_tokens.is_finite() || min_tokens < 0.0 {
            return Err(MemoryError::Config(format!(
                "memory.min_tokens must be a non-negative number, got {min_tokens}"
            )));
        }
        if self.models.primary.trim().is_empty() {
            return Err(MemoryError::Config("summarizer.model must not be empty".to_string()));
        }
        Ok(())
    }

    /// Load the config file (if any) and apply environment knobs on top.
    pub async fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);

        let mut config = match &path {
            Some(p) if p.exists() => match Self::from_file(p).await {
                Ok(config) => {
                    info!("Loaded config from {}", p.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring config {}: {}", p.display(), e);
                    Self::default()
                }
            },
            _ => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env();
        config
    }

    /// Apply environment knobs over the current values
    pub fn apply_env(&mut self) {
        self.apply_lookup(|key| std::env::var(key).ok());
    }

    pub fn apply_lookup(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.pipeline = self.pipeline.clone().with_lookup(&lookup);
        self.models = self.models.clone().with_lookup(&lookup);
    }
}

fn parse_knob<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value, using default", key, raw);
            None
        }
    }
}

fn parse_flag(key: &str, raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => {
            warn!("Ignoring {}={:?}: expected 0/1", key, raw);
            None
        }
    }
}
