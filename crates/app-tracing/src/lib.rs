use serde::Deserialize;
use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LogConfig {
    /// used when `RUST_LOG` is not set
    pub level: String,
    /// plaintext log file, `None` logs to stdout only
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some(PathBuf::from("app_log.txt")),
        }
    }
}

fn init_env_layer(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into())
}

fn create_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    File::options().create(true).append(true).open(path)
}

/// Application logger.
///
/// Constructed once by the composition root and handed to whoever needs it. Building
/// it installs the global `tracing` subscriber, so a second [`AppLogger::init`] in the
/// same process only returns a handle, with no log file, and leaves the first subscriber
/// in place.
#[derive(Debug, Clone)]
pub struct AppLogger {
    log_file: Option<PathBuf>,
}

impl AppLogger {
    pub fn init(config: &LogConfig) -> Self {
        let env_layer = init_env_layer(&config.level);
        let stdout_layer = tracing_subscriber::fmt::layer().with_ansi(true);

        let file = config.file.as_ref().and_then(|path| match create_log_file(path) {
            Ok(f) => Some((path.clone(), f)),
            Err(e) => {
                // fallback to stdout tracing
                eprintln!("Failed to create log file {}: {}", path.display(), e);
                None
            }
        });

        let (mut log_file, file_log_layer) = match file {
            Some((path, f)) => (
                Some(path),
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(Mutex::new(f))
                        .with_ansi(false),
                ),
            ),
            None => (None, None),
        };

        if let Err(e) = tracing_subscriber::registry()
            .with(env_layer)
            .with(stdout_layer)
            .with(file_log_layer)
            .try_init()
        {
            eprintln!("tracing already initialized: {}", e);
            // the file layer was dropped with the rejected subscriber
            log_file = None;
        }

        Self { log_file }
    }

    /// A handle that logs through whatever subscriber is already installed.
    pub fn detached() -> Self {
        Self { log_file: None }
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    pub fn log_model_operation(&self, model_name: &str, operation: &str, duration: Option<Duration>) {
        match duration {
            Some(d) => info!(
                "Model '{}' - {} (Duration: {:.2}s)",
                model_name,
                operation,
                d.as_secs_f64()
            ),
            None => info!("Model '{}' - {}", model_name, operation),
        }
    }

    pub fn log_user_action(&self, action: &str, details: &str) {
        if details.is_empty() {
            info!("User Action: {}", action);
        } else {
            info!("User Action: {} - {}", action, details);
        }
    }
}
