use serde::{Deserialize, Serialize};

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Maximum number of tasks running at once.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Per-task retry budget applied when a `TaskSpec` does not set one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before each dispatched task's first physical attempt.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_retries: default_max_retries(),
            pacing_ms: default_pacing_ms(),
        }
    }
}

fn default_max_workers() -> usize {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_pacing_ms() -> u64 {
    500
}

/// How the external program is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the prompt.
    #[serde(default = "default_program_args")]
    pub args: Vec<String>,

    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_program_args(),
            default_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_program() -> String {
    "claude".to_string()
}

fn default_program_args() -> Vec<String> {
    vec!["-p".to_string()]
}

fn default_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_strategy")]
    pub strategy: String,
    /// One backoff time unit.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Physical attempts per logical call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: default_retry_strategy(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_retry_strategy() -> String {
    "exponential-backoff".to_string()
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// One of "text", "ascii", "jsonl", "bar", "none".
    #[serde(default = "default_progress_format")]
    pub format: String,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            format: default_progress_format(),
        }
    }
}

fn default_progress_format() -> String {
    "text".to_string()
}
