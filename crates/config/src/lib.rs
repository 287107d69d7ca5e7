//! Configuration for Hearth.
//!
//! Settings come from environment variables, with a `.env` file loaded
//! first when present. Only the documented names below are read:
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `HEARTH_DATA_DIR` | `.` | Root for `chats/`, `memory/`, `logs/` |
//! | `HEARTH_CONTEXT_WINDOW` | `24576` | Model context window (tokens) |
//! | `HEARTH_MAX_CYCLES` | `50` | ReAct cycles per task |
//! | `HEARTH_TOOL_TIMEOUT_SECS` | `30` | Per-tool execution timeout |
//! | `HEARTH_MODEL_URL` | `http://localhost:8080/v1` | OpenAI-compatible endpoint |
//! | `HEARTH_MODEL_NAME` | `local` | Model name passed to the endpoint |
//! | `GOOGLE_API_KEY` | — | Search API key (read by the search tool) |
//! | `GOOGLE_CSE_ID` | — | Search engine id (read by the search tool) |

use std::path::PathBuf;
use tracing::debug;

/// Runtime settings resolved from the environment.
#[derive(Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub context_window: usize,
    pub max_cycles: usize,
    pub tool_timeout_secs: u64,
    pub model_url: String,
    pub model_name: String,
}

impl Settings {
    /// Load settings: `.env` first (silently skipped when absent), then
    /// the process environment.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    /// Read settings from the current process environment only.
    pub fn from_env() -> Self {
        let settings = Self {
            data_dir: PathBuf::from(var_or("HEARTH_DATA_DIR", ".")),
            context_window: parsed_or("HEARTH_CONTEXT_WINDOW", 24_576),
            max_cycles: parsed_or("HEARTH_MAX_CYCLES", 50),
            tool_timeout_secs: parsed_or("HEARTH_TOOL_TIMEOUT_SECS", 30),
            model_url: var_or("HEARTH_MODEL_URL", "http://localhost:8080/v1"),
            model_name: var_or("HEARTH_MODEL_NAME", "local"),
        };
        debug!(
            data_dir = %settings.data_dir.display(),
            window = settings.context_window,
            "settings loaded"
        );
        settings
    }

    pub fn chats_dir(&self) -> PathBuf {
        self.data_dir.join("chats")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("data_dir", &self.data_dir)
            .field("context_window", &self.context_window)
            .field("max_cycles", &self.max_cycles)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("model_url", &self.model_url)
            .field("model_name", &self.model_name)
            .finish()
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
