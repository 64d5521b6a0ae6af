use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 4400;
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-latest";

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── GeminiConfig ─────────────────────────────────────────────────────────────

/// Model adapter configuration (`[gemini]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key for the hosted generation API. None = heuristics only.
    /// Usually supplied via the `GEMINI_API_KEY` env var rather than TOML.
    pub api_key: Option<String>,
    /// Base URL of the generateContent endpoint.
    pub base_url: String,
    /// Model identifier (default: gemini-1.5-flash-latest).
    pub model: String,
    /// Sampling temperature (default: 0.4).
    pub temperature: f64,
    /// Output token bound per analysis call (default: 800).
    pub max_output_tokens: u32,
    /// Hard client-side timeout per request in milliseconds (default: 10000).
    pub timeout_ms: u64,
    /// Minimum spacing between outbound model calls in milliseconds
    /// (default: 2000). 0 disables the throttle.
    pub min_call_interval_ms: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            temperature: 0.4,
            max_output_tokens: 800,
            timeout_ms: 10_000,
            min_call_interval_ms: 2_000,
        }
    }
}

// ─── AnalysisConfig ───────────────────────────────────────────────────────────

/// Pipeline tuning (`[analysis]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Jaccard similarity at or above which the heuristic path reports a
    /// duplicate pair (default: 0.75).
    pub duplicate_threshold: f64,
    /// Floor applied to the model's self-reported duplicate pairs
    /// (default: 0.85).
    pub model_duplicate_floor: f64,
    /// Reject braindumps with more parsed lines than this. Bounds the O(N²)
    /// duplicate scan and the persistence fan-out (default: 500).
    pub max_lines: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: 0.75,
            model_duplicate_floor: 0.85,
            max_lines: 500,
        }
    }
}

// ─── ObservabilityConfig ──────────────────────────────────────────────────────

/// Daemon observability configuration (`[observability]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log SQLite queries that exceed this threshold (milliseconds). Default: 100.
    /// Set to 0 to disable slow query logging.
    pub slow_query_threshold_ms: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            slow_query_threshold_ms: 100,
        }
    }
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// REST server port (default: 4400).
    port: Option<u16>,
    /// Log level filter string, e.g. "debug", "info,sweepd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default) | "json".
    log_format: Option<String>,
    /// Bind address for the REST server (default: "127.0.0.1").
    bind_address: Option<String>,
    /// Model adapter configuration (`[gemini]`).
    gemini: Option<GeminiConfig>,
    /// Pipeline tuning (`[analysis]`).
    analysis: Option<AnalysisConfig>,
    /// Observability configuration (`[observability]`).
    observability: Option<ObservabilityConfig>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── SweepConfig ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Bind address for the REST server (SWEEPD_BIND env var, default: "127.0.0.1").
    pub bind_address: String,
    pub gemini: GeminiConfig,
    pub analysis: AnalysisConfig,
    /// Observability: slow query threshold.
    pub observability: ObservabilityConfig,
}

impl SweepConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("SWEEPD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let bind_address = bind_address
            .or(std::env::var("SWEEPD_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let mut gemini = toml.gemini.unwrap_or_default();
        if let Some(key) = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()) {
            gemini.api_key = Some(key);
        }

        let analysis = toml.analysis.unwrap_or_default();
        let observability = toml.observability.unwrap_or_default();

        Self {
            port,
            data_dir,
            log,
            log_format,
            bind_address,
            gemini,
            analysis,
            observability,
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/sweepd
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("sweepd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/sweepd or ~/.local/share/sweepd
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("sweepd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("sweepd");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\sweepd
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("sweepd");
        }
    }
    // Fallback
    PathBuf::from(".sweepd")
}
