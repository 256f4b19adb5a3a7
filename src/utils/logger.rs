use crate::utils::config::Config;

/// Initialize the global logger from the configured level. `RUST_LOG` still
/// wins when set, since the builder starts from the default environment.
pub fn setup_logger(config: &Config) {
    env_logger::Builder::from_default_env()
        .filter_level(match config.log_level.as_str() {
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Off,
        })
        .format_timestamp(None)
        .init();
}
