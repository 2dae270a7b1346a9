use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` uses the `env_logger` filter syntax, e.g.
/// `"info,nabu_runtime=debug,nabu::script=warn"`. When unset, `RUST_LOG` is
/// consulted, then `info`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { env_filter: None, write_style: env_logger::WriteStyle::Auto }
    }
}

impl LoggingConfig {
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }
}

static INIT: Once = Once::new();

/// Install `env_logger` as the global logger. Later calls are ignored.
///
/// Logs go to stderr, so a host can keep stdout for its own output.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        match config.env_filter.or_else(|| std::env::var("RUST_LOG").ok()) {
            Some(filter) => {
                builder.parse_filters(&filter);
            }
            None => {
                builder.filter_level(log::LevelFilter::Info);
            }
        }

        builder.write_style(config.write_style).target(env_logger::Target::Stderr);

        // Another logger may already be installed by the embedding host.
        if builder.try_init().is_err() {
            log::debug!("global logger already set; keeping it");
            return;
        }
        log::debug!("logging initialized");
    });
}
