use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// File looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = ".codesumma.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenEstimatorConfig {
    pub chars_per_token: usize,
    pub max_file_bytes: u64,
}

impl Default for TokenEstimatorConfig {
    fn default() -> Self {
        Self {
            chars_per_token: 4,
            // Larger files are skipped entirely.
            max_file_bytes: 512 * 1024,
        }
    }
}

/// Settings for the remote completion endpoint used to compress text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub model: String,
    pub endpoint: String,
    /// Environment variable holding the bearer token. When unset the
    /// compressor becomes a pass-through.
    pub api_key_env: String,
    pub temperature: f32,
    /// Prompt tokens + requested tokens never exceed this.
    pub context_window: usize,
    pub timeout_secs: u64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo-instruct".to_string(),
            endpoint: "https://api.openai.com/v1/completions".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.5,
            context_window: 4096,
            timeout_secs: 120,
        }
    }
}

/// Knobs of the budget allocator's chunked summarization loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub max_tokens_out: usize,
    pub chunk_tokens: usize,
    /// Amount the request target shrinks by on every extra convergence pass.
    pub target_decrement: usize,
    pub max_iterations: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens_out: 4096,
            chunk_tokens: 2000,
            target_decrement: 50,
            max_iterations: 32,
        }
    }
}

/// Per-file summarization thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Non-Python files smaller than this get an empty summary.
    pub min_file_bytes: u64,
    /// Input handed to the model is trimmed to this many tokens first.
    pub input_tokens: usize,
    /// Target length of a model-written file summary.
    pub summary_tokens: usize,
    /// Radius of the source window around each traceback frame.
    pub traceback_radius: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            min_file_bytes: 100,
            input_tokens: 2000,
            summary_tokens: 200,
            traceback_radius: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Overrides the default `<cache dir>/codesumma/cache.json`.
    pub path: Option<PathBuf>,
}

impl CacheConfig {
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(p) = self.path.as_ref() {
            return p.clone();
        }
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("codesumma")
            .join("cache.json")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extra ignore patterns appended to the built-in defaults.
    pub ignore: Vec<String>,
    pub token_estimator: TokenEstimatorConfig,
    pub compression: CompressionConfig,
    pub budget: BudgetConfig,
    pub summary: SummaryConfig,
    pub cache: CacheConfig,
}

/// Load `.codesumma.json` from `dir`. Missing or malformed files yield defaults.
pub fn load_config(dir: &Path) -> Config {
    load_config_file(&dir.join(CONFIG_FILE_NAME))
}

pub fn load_config_file(path: &Path) -> Config {
    let Ok(text) = std::fs::read_to_string(path) else {
        return Config::default();
    };

    serde_json::from_str::<Config>(&text).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "ignoring malformed config");
        Config::default()
    })
}
