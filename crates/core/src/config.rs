//! Layered configuration: built-in defaults, overridden by environment
//! variables, overridden again by CLI flags. Kept explicit and separate
//! from `clap` parsing so the layering can be unit tested without argv.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    Aggressive,
    Moderate,
    Minimal,
}

impl CacheStrategy {
    fn from_env(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "aggressive" => Some(CacheStrategy::Aggressive),
            "moderate" => Some(CacheStrategy::Moderate),
            "minimal" => Some(CacheStrategy::Minimal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub parser_file_timeout: Duration,
    pub max_concurrent_files: usize,
    pub max_file_size: u64,
    pub cache_strategy: CacheStrategy,
    pub debug_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("module-sentinel.db"),
            parser_file_timeout: Duration::from_secs(30),
            max_concurrent_files: num_cpus(),
            max_file_size: 10 * 1024 * 1024,
            cache_strategy: CacheStrategy::Moderate,
            debug_mode: false,
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

impl Config {
    /// Built-in defaults overridden by whatever `DATABASE_PATH`,
    /// `PARSER_FILE_TIMEOUT`, `MAX_CONCURRENT_FILES`, `MAX_FILE_SIZE_MB`,
    /// `CACHE_STRATEGY`, `DEBUG_MODE` are set in the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Ok(ms) = std::env::var("PARSER_FILE_TIMEOUT").and_then(|v| v.parse::<u64>().map_err(|_| std::env::VarError::NotPresent)) {
            config.parser_file_timeout = Duration::from_millis(ms);
        }
        if let Ok(n) = std::env::var("MAX_CONCURRENT_FILES").and_then(|v| v.parse::<usize>().map_err(|_| std::env::VarError::NotPresent)) {
            config.max_concurrent_files = n.max(1);
        }
        if let Ok(mb) = std::env::var("MAX_FILE_SIZE_MB").and_then(|v| v.parse::<u64>().map_err(|_| std::env::VarError::NotPresent)) {
            config.max_file_size = mb * 1024 * 1024;
        }
        if let Ok(raw) = std::env::var("CACHE_STRATEGY") {
            if let Some(strategy) = CacheStrategy::from_env(&raw) {
                config.cache_strategy = strategy;
            }
        }
        if let Ok(raw) = std::env::var("DEBUG_MODE") {
            config.debug_mode = raw == "1" || raw.eq_ignore_ascii_case("true");
        }

        config
    }

    pub fn with_database_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.database_path = path;
        }
        self
    }

    pub fn with_max_concurrent_files(mut self, n: Option<usize>) -> Self {
        if let Some(n) = n {
            self.max_concurrent_files = n.max(1);
        }
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        if debug {
            self.debug_mode = true;
        }
        self
    }
}
