use std::time::Duration;

use crate::logging::LoggingConfig;

pub const DEBOUNCE_ENV: &str = "NABU_DEBOUNCE_MS";
pub const MAX_CALL_DEPTH_ENV: &str = "NABU_MAX_CALL_DEPTH";
pub const LOG_ENV: &str = "NABU_LOG";

/// Highest call depth `NABU_MAX_CALL_DEPTH` may ask for.
pub const CALL_DEPTH_CEILING: usize = 1024;

/// Runtime knobs shared by the pipeline and the file watcher.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Quiet period after the last file change before a reload starts.
    pub debounce: Duration,
    /// Maximum nesting of user function calls in one evaluation.
    pub max_call_depth: usize,
    pub logging: LoggingConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            max_call_depth: 64,
            logging: LoggingConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `NABU_DEBOUNCE_MS`, `NABU_MAX_CALL_DEPTH` and
    /// `NABU_LOG` (a log filter taking precedence over `RUST_LOG`).
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(ms) = parse_var::<u64>(&lookup, DEBOUNCE_ENV) {
            config.debounce = Duration::from_millis(ms);
        }
        if let Some(depth) = parse_var::<usize>(&lookup, MAX_CALL_DEPTH_ENV) {
            if depth == 0 {
                log::warn!("{MAX_CALL_DEPTH_ENV}=0 would reject every call; ignoring");
            } else if depth > CALL_DEPTH_CEILING {
                log::warn!("{MAX_CALL_DEPTH_ENV}={depth} is above {CALL_DEPTH_CEILING}; using {CALL_DEPTH_CEILING}");
                config.max_call_depth = CALL_DEPTH_CEILING;
            } else {
                config.max_call_depth = depth;
            }
        }
        if let Some(filter) = lookup(LOG_ENV).filter(|f| !f.trim().is_empty()) {
            config.logging = config.logging.filter(filter);
        }
        config
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring {key}={raw:?}: not a non-negative integer");
            None
        }
    }
}
