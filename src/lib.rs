pub mod braindump;
pub mod config;
pub mod gemini;
pub mod observability;
pub mod rest;
pub mod scoring;
pub mod storage;
pub mod throttle;

use std::sync::Arc;

use config::SweepConfig;
use gemini::GeminiClient;
use storage::Storage;

/// Shared application state passed to every REST handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<SweepConfig>,
    pub storage: Arc<Storage>,
    /// Gemini adapter. Runs unconfigured when no API key is set; analysis
    /// then degrades to heuristics without surfacing an error.
    pub gemini: Arc<GeminiClient>,
    pub started_at: std::time::Instant,
}
