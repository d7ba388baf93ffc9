//! Application configuration and the generator/store factories.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use simulado_core::traits::{ContentGenerator, SessionStore};

use crate::mock::MockGenerator;
use crate::openai::OpenAiGenerator;
use crate::store::JsonFileStore;

/// Configuration for the AI content generator.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeneratorConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Mock,
}

impl std::fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorConfig::OpenAI {
                api_key: _,
                base_url,
                model,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
            GeneratorConfig::Mock => f.debug_struct("Mock").finish(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig::OpenAI {
            api_key: "${SIMULADO_OPENAI_KEY}".to_string(),
            base_url: None,
            model: None,
        }
    }
}

/// Top-level simulado configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimuladoConfig {
    #[serde(default)]
    pub generator: GeneratorConfig,
    /// Directory holding one JSON file per saved session.
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,
    /// Seconds between autosave snapshots.
    #[serde(default = "default_autosave_secs")]
    pub autosave_interval_secs: u64,
    /// Hard timeout on each content-fetch call, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Retries per question batch before the loader gives up.
    #[serde(default = "default_fetch_retries")]
    pub max_fetch_retries: u32,
    /// Initial delay between retries, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Question slots in a turbo review session.
    #[serde(default = "default_review_slots")]
    pub review_slots: usize,
    /// Duration of a turbo review session, in seconds.
    #[serde(default = "default_review_duration_secs")]
    pub review_duration_secs: u64,
    /// Courses whose cutoffs every performance report compares against.
    #[serde(default)]
    pub target_courses: Vec<String>,
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from("./simulado-sessions")
}
fn default_autosave_secs() -> u64 {
    30
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_fetch_retries() -> u32 {
    5
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_review_slots() -> usize {
    10
}
fn default_review_duration_secs() -> u64 {
    900
}

impl Default for SimuladoConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorConfig::default(),
            sessions_dir: default_sessions_dir(),
            autosave_interval_secs: default_autosave_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_fetch_retries: default_fetch_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            review_slots: default_review_slots(),
            review_duration_secs: default_review_duration_secs(),
            target_courses: Vec::new(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_generator_config(config: &GeneratorConfig) -> GeneratorConfig {
    match config {
        GeneratorConfig::OpenAI {
            api_key,
            base_url,
            model,
        } => GeneratorConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
            model: model.clone(),
        },
        GeneratorConfig::Mock => GeneratorConfig::Mock,
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `simulado.toml` in the current directory
/// 2. `~/.config/simulado/config.toml`
///
/// Environment variable override: `SIMULADO_OPENAI_KEY`.
pub fn load_config() -> Result<SimuladoConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<SimuladoConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("simulado.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<SimuladoConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => SimuladoConfig::default(),
    };

    if let Ok(key) = std::env::var("SIMULADO_OPENAI_KEY") {
        if let GeneratorConfig::OpenAI { api_key, .. } = &mut config.generator {
            *api_key = key;
        }
    }

    config.generator = resolve_generator_config(&config.generator);
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("simulado"))
}

/// Create a content generator from its configuration.
pub fn create_generator(config: &GeneratorConfig) -> Result<Arc<dyn ContentGenerator>> {
    match config {
        GeneratorConfig::OpenAI {
            api_key,
            base_url,
            model,
        } => {
            if api_key.is_empty() {
                anyhow::bail!(
                    "no OpenAI API key configured; set SIMULADO_OPENAI_KEY or use --mock"
                );
            }
            Ok(Arc::new(OpenAiGenerator::new(
                api_key,
                base_url.clone(),
                model.clone(),
            )))
        }
        GeneratorConfig::Mock => Ok(Arc::new(MockGenerator::new())),
    }
}

/// Create the file-backed session store for this configuration.
pub fn create_store(config: &SimuladoConfig) -> Arc<dyn SessionStore> {
    Arc::new(JsonFileStore::new(config.sessions_dir.clone()))
}
