mod app;
pub mod config;
pub mod dispatcher;
mod error;
pub mod models;
pub mod request;
mod widgets;
pub mod window;

pub use error::*;

use app::ModelStudioApp;
use app_tracing::AppLogger;
use config::AppConfig;
use file_handler::{FileHandler, NativeDialog};
use models::ModelManager;
use std::sync::Arc;
use window::MainWindow;

pub const APP_NAME: &str = "Model Studio";

/// Builds the window from `config` and runs the event loop until the window closes.
pub fn run(config: AppConfig, logger: AppLogger) -> AppResult<()> {
    logger.log_user_action("Application started", "");

    let processor = Arc::new(ModelManager::new(&config, logger.clone()));
    let file_handler = FileHandler::new(NativeDialog, config.files.clone());
    let mut window = MainWindow::new(file_handler, processor, logger.clone());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_NAME)
            .with_inner_size([1100.0, 820.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        APP_NAME,
        options,
        Box::new(move |cc| {
            let ctx = cc.egui_ctx.clone();
            window.set_waker(move || ctx.request_repaint());
            Ok(Box::new(ModelStudioApp::new(window)))
        }),
    )
    .map_err(|e| AppError::Ui(e.to_string()))?;

    logger.log_user_action("Application closed", "");
    Ok(())
}
