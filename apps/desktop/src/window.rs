use crate::{
    dispatcher::Dispatcher,
    models::Processor,
    request::{ProcessingMode, ProcessingRequest, ProcessingResult},
    AppError,
};
use ai::ModelInfo;
use app_tracing::AppLogger;
use file_handler::{FileDialog, FileHandler, FileInfo, ImageFeatures};
use image::DynamicImage;
use operation_layer::Pipeline;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::warn;

pub const STATUS_READY: &str = "Ready";
pub const STATUS_PROCESSING: &str = "Processing...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDialog {
    pub kind: DialogKind,
    pub title: String,
    pub message: String,
}

impl MessageDialog {
    fn error(message: impl Into<String>) -> Self {
        Self {
            kind: DialogKind::Error,
            title: "Error".to_string(),
            message: message.into(),
        }
    }

    fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: DialogKind::Info,
            title: title.into(),
            message: message.into(),
        }
    }
}

pub struct SelectedImage {
    pub path: PathBuf,
    pub image: DynamicImage,
    pub info: FileInfo,
    pub features: ImageFeatures,
}

/// State and behaviour of the main window, independent of how it is drawn.
///
/// Every method runs on the UI thread. Results of background work only arrive through
/// [`MainWindow::poll`].
pub struct MainWindow<D, P> {
    mode: ProcessingMode,
    prompt: String,
    caption_prefix: String,
    selected_image: Option<SelectedImage>,
    output: Option<ProcessingResult>,
    status: String,
    dialog: Option<MessageDialog>,
    // bumped whenever the preview or the result changes, so views can refresh textures
    input_revision: u64,
    output_revision: u64,
    file_handler: FileHandler<D>,
    dispatcher: Dispatcher<P>,
    input_gate: Pipeline<ProcessingRequest, ProcessingRequest, AppError>,
    logger: AppLogger,
}

impl<D: FileDialog, P: Processor> MainWindow<D, P> {
    pub fn new(file_handler: FileHandler<D>, processor: Arc<P>, logger: AppLogger) -> Self {
        Self {
            mode: ProcessingMode::default(),
            prompt: String::new(),
            caption_prefix: String::new(),
            selected_image: None,
            output: None,
            status: STATUS_READY.to_string(),
            dialog: None,
            input_revision: 0,
            output_revision: 0,
            file_handler,
            dispatcher: Dispatcher::new(processor),
            input_gate: Pipeline::new("process_input", |request: ProcessingRequest| {
                Ok::<_, AppError>(request)
            })
            .validate(),
            logger,
        }
    }

    /// Called from the worker thread once its outcome is ready to be polled.
    pub fn set_waker(&mut self, waker: impl Fn() + Send + Sync + 'static) {
        self.dispatcher.set_waker(waker);
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ProcessingMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        self.clear_output();
        self.logger
            .log_user_action("Mode changed", &mode.to_string());
    }

    pub fn prompt_mut(&mut self) -> &mut String {
        &mut self.prompt
    }

    pub fn caption_prefix_mut(&mut self) -> &mut String {
        &mut self.caption_prefix
    }

    pub fn selected_image(&self) -> Option<&SelectedImage> {
        self.selected_image.as_ref()
    }

    pub fn output(&self) -> Option<&ProcessingResult> {
        self.output.as_ref()
    }

    pub fn output_text(&self) -> String {
        self.output
            .as_ref()
            .map(ProcessingResult::text)
            .unwrap_or_default()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn dialog(&self) -> Option<&MessageDialog> {
        self.dialog.as_ref()
    }

    pub fn dismiss_dialog(&mut self) {
        self.dialog = None;
    }

    pub fn input_revision(&self) -> u64 {
        self.input_revision
    }

    pub fn output_revision(&self) -> u64 {
        self.output_revision
    }

    pub fn is_processing(&self) -> bool {
        self.dispatcher.is_running()
    }

    pub fn can_trigger(&self) -> bool {
        !self.is_processing()
    }

    pub fn can_save(&self) -> bool {
        self.output.is_some() && !self.is_processing()
    }

    pub fn trigger_label(&self) -> &'static str {
        if self.is_processing() {
            STATUS_PROCESSING
        } else {
            self.mode.trigger_label()
        }
    }

    pub fn model_info(&self) -> ModelInfo {
        self.dispatcher.processor().model_info(self.mode)
    }

    fn clear_output(&mut self) {
        self.output = None;
        self.output_revision += 1;
    }

    pub fn browse_image(&mut self) {
        match self.file_handler.browse_image_file() {
            Ok(Some(path)) => self.open_image(&path),
            Ok(None) => {}
            Err(e) => {
                warn!("failed to browse image: {}", e);
                self.dialog = Some(MessageDialog::error(format!("Failed to load image: {}", e)));
            }
        }
    }

    /// Loads `path` as the caption input and shows it as preview.
    pub fn open_image(&mut self, path: &Path) {
        match self.file_handler.load_image(path) {
            Ok(image) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.selected_image = Some(SelectedImage {
                    path: path.to_path_buf(),
                    info: self.file_handler.get_file_info(path),
                    features: self.file_handler.analyze_image(&image),
                    image,
                });
                self.input_revision += 1;
                self.logger.log_user_action("Image selected", &name);
            }
            Err(e) => {
                warn!("failed to load image: {}", e);
                self.dialog = Some(MessageDialog::error(format!("Failed to load image: {}", e)));
            }
        }
    }

    fn build_request(&self) -> ProcessingRequest {
        match self.mode {
            ProcessingMode::TextToImage => ProcessingRequest::TextToImage {
                prompt: self.prompt.trim().to_string(),
            },
            ProcessingMode::ImageToCaption => ProcessingRequest::ImageToCaption {
                image: self.selected_image.as_ref().map(|s| s.image.clone()),
                prefix: Some(self.caption_prefix.trim().to_string()).filter(|p| !p.is_empty()),
            },
        }
    }

    /// Validates the current input and hands it to a worker.
    pub fn trigger(&mut self) {
        if self.is_processing() {
            return;
        }

        let request = match self.input_gate.call(self.build_request()) {
            Ok(request) => request,
            Err(AppError::InvalidInput(_)) => {
                self.dialog = Some(MessageDialog::error(self.mode.missing_input_message()));
                return;
            }
            Err(e) => {
                self.dialog = Some(MessageDialog::error(e.to_string()));
                return;
            }
        };

        self.logger
            .log_user_action("Processing started", &self.mode.to_string());
        match self.dispatcher.start(request) {
            Ok(()) => self.status = STATUS_PROCESSING.to_string(),
            Err(e) => self.dialog = Some(MessageDialog::error(e.to_string())),
        }
    }

    /// Applies a finished outcome, if any. Returns whether anything changed.
    pub fn poll(&mut self) -> bool {
        let Some(outcome) = self.dispatcher.poll() else {
            return false;
        };

        match outcome {
            Ok(result) => {
                self.output = Some(result);
                self.output_revision += 1;
            }
            Err(e) => self.dialog = Some(MessageDialog::error(e.to_string())),
        }
        self.status = STATUS_READY.to_string();
        true
    }

    pub fn save_result(&mut self) {
        if !self.can_save() {
            return;
        }

        let saved = match &self.output {
            Some(ProcessingResult::Image { image, .. }) => self
                .file_handler
                .save_image(&DynamicImage::ImageRgb8(image.clone()), "generated_image")
                .map(|path| path.map(|p| ("Image", p))),
            Some(ProcessingResult::Caption(caption)) => self
                .file_handler
                .save_text(caption, "image_caption")
                .map(|path| path.map(|p| ("Caption", p))),
            None => return,
        };

        match saved {
            Ok(Some((kind, path))) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.logger
                    .log_user_action(&format!("{} saved", kind), &path.display().to_string());
                self.dialog = Some(MessageDialog::info(
                    "Success",
                    format!("{} saved to: {}", kind, name),
                ));
            }
            Ok(None) => {}
            Err(e) => self.dialog = Some(MessageDialog::error(e.to_string())),
        }
    }

    pub fn show_about(&mut self) {
        self.dialog = Some(MessageDialog::info(
            "About",
            format!(
                "Model Studio {}\n\nGenerate images from text and captions from images.",
                env!("CARGO_PKG_VERSION")
            ),
        ));
    }
}
