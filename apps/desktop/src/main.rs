// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use app_tracing::{AppLogger, LogConfig};
use model_studio::config::{AppConfig, CONFIG_FILE};
use std::path::Path;
use tracing::error;

fn main() {
    let config = AppConfig::load_or_default(Path::new(CONFIG_FILE));

    let default_log = LogConfig::default();
    let log_config = config.as_ref().map(|c| &c.log).unwrap_or(&default_log);
    let logger = AppLogger::init(log_config);

    if let Err(e) = config.and_then(|config| model_studio::run(config, logger)) {
        error!("Failed to start application: {}", e);
        std::process::exit(1);
    }
}
