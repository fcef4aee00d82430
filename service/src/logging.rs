use crate::config::Config;
use log::LevelFilter;
use simplelog::{self, ConfigBuilder};

/// Dependency modules that are silenced unless the log level is Trace.
const FILTERED_MODULES: &[&str] = &[
    "sqlx",
    "sea_orm",
    "tower",
    "tower_sessions",
    "tracing",
    "hyper",
    "hyper_util",
    "reqwest",
    "axum",
];

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger at the level carried by `config`.
    pub fn init_logger(config: &Config) {
        let log_config = Self::build_log_config(Self::should_filter_dependencies(
            config.log_level_filter,
        ));

        simplelog::TermLogger::init(
            config.log_level_filter,
            log_config,
            simplelog::TerminalMode::Mixed,
            simplelog::ColorChoice::Auto,
        )
        .expect("Failed to start simplelog");
    }

    fn should_filter_dependencies(level: LevelFilter) -> bool {
        level != LevelFilter::Trace
    }

    fn build_log_config(apply_filters: bool) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();
        // Request handlers log from `web::controller::*`; keep the target visible.
        builder.set_target_level(LevelFilter::Error);

        if apply_filters {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}
