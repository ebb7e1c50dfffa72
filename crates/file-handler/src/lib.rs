//! Dialog driven loading and saving of images and text.

mod dialog;
mod error;
mod formats;
mod info;

pub use dialog::*;
pub use error::*;
pub use formats::*;
pub use info::*;

use image::{codecs::jpeg::JpegEncoder, DynamicImage};
use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

const JPEG_QUALITY: u8 = 95;

pub struct FileHandler<D> {
    dialog: D,
    formats: SupportedFormats,
    last_directory: PathBuf,
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

impl<D: FileDialog> FileHandler<D> {
    pub fn new(dialog: D, formats: SupportedFormats) -> Self {
        Self {
            dialog,
            formats,
            last_directory: home_dir(),
        }
    }

    pub fn last_directory(&self) -> &Path {
        &self.last_directory
    }

    fn remember_directory(&mut self, path: &Path) {
        if let Some(parent) = path.parent().filter(|p| p.exists()) {
            self.last_directory = parent.to_path_buf();
        }
    }

    fn check_image_format(&self, path: &Path) -> FileHandlerResult<()> {
        if self.formats.is_image(path) {
            Ok(())
        } else {
            Err(FileHandlerError::UnsupportedFormat(extension_of(path)))
        }
    }

    fn check_text_format(&self, path: &Path) -> FileHandlerResult<()> {
        if self.formats.is_text(path) {
            Ok(())
        } else {
            Err(FileHandlerError::UnsupportedFormat(extension_of(path)))
        }
    }

    fn text_filters(&self) -> Vec<DialogFilter> {
        let all: Vec<&str> = self.formats.text.iter().map(String::as_str).collect();
        vec![
            DialogFilter::new("Text files", &all),
            DialogFilter::new("All files", &["*"]),
        ]
    }

    fn image_filters(&self) -> Vec<DialogFilter> {
        let all: Vec<&str> = self.formats.image.iter().map(String::as_str).collect();
        vec![
            DialogFilter::new("Image files", &all),
            DialogFilter::new("JPEG files", &["jpg", "jpeg"]),
            DialogFilter::new("PNG files", &["png"]),
            DialogFilter::new("All files", &["*"]),
        ]
    }

    /// Asks for an image to open. `Ok(None)` when the dialog was cancelled.
    pub fn browse_image_file(&mut self) -> FileHandlerResult<Option<PathBuf>> {
        let filters = self.image_filters();
        let Some(path) = self
            .dialog
            .pick_file("Select Image File", &self.last_directory, &filters)
        else {
            return Ok(None);
        };

        self.check_image_format(&path)?;
        self.remember_directory(&path);
        debug!("selected image {}", path.display());

        Ok(Some(path))
    }

    /// Decodes an image, flattening any alpha channel to RGB.
    pub fn load_image(&self, path: &Path) -> FileHandlerResult<DynamicImage> {
        if !path.exists() {
            return Err(FileHandlerError::NotFound(path.to_path_buf()));
        }
        self.check_image_format(path)?;

        let image = image::open(path).map_err(|source| FileHandlerError::Load {
            path: path.to_path_buf(),
            source,
        })?;

        let image = if image.color().has_alpha() {
            DynamicImage::ImageRgb8(image.to_rgb8())
        } else {
            image
        };
        debug!(
            "loaded {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );

        Ok(image)
    }

    /// Asks for a destination and writes the image there, `.png` unless another supported
    /// extension was chosen.
    pub fn save_image(
        &mut self,
        image: &DynamicImage,
        suggested_name: &str,
    ) -> FileHandlerResult<Option<PathBuf>> {
        let filters = [
            DialogFilter::new("PNG files", &["png"]),
            DialogFilter::new("JPEG files", &["jpg", "jpeg"]),
            DialogFilter::new("All files", &["*"]),
        ];
        let file_name = with_default_extension(Path::new(suggested_name), "png");
        let Some(path) = self.dialog.save_file(
            "Save Image As",
            &self.last_directory,
            &file_name.to_string_lossy(),
            &filters,
        ) else {
            return Ok(None);
        };

        let path = with_default_extension(&path, "png");
        self.check_image_format(&path)?;
        write_image(image, &path)?;

        self.remember_directory(&path);
        info!("saved image to {}", path.display());
        Ok(Some(path))
    }

    /// Asks for a destination and writes `text` as UTF-8, `.txt` unless another supported
    /// text extension was chosen.
    pub fn save_text(
        &mut self,
        text: &str,
        suggested_name: &str,
    ) -> FileHandlerResult<Option<PathBuf>> {
        let filters = self.text_filters();
        let file_name = with_default_extension(Path::new(suggested_name), "txt");
        let Some(path) = self.dialog.save_file(
            "Save Text As",
            &self.last_directory,
            &file_name.to_string_lossy(),
            &filters,
        ) else {
            return Ok(None);
        };

        let path = with_default_extension(&path, "txt");
        self.check_text_format(&path)?;
        std::fs::write(&path, text).map_err(|e| FileHandlerError::Save {
            path: path.clone(),
            source: Box::new(e),
        })?;

        self.remember_directory(&path);
        info!("saved text to {}", path.display());
        Ok(Some(path))
    }

    pub fn get_file_info(&self, path: &Path) -> FileInfo {
        let Ok(metadata) = std::fs::metadata(path) else {
            return FileInfo::default();
        };

        FileInfo {
            exists: true,
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size_bytes: metadata.len(),
            size_mb: round_mb(metadata.len()),
            extension: extension_of(path),
            is_image: self.formats.is_image(path),
            modified: metadata.modified().ok(),
        }
    }

    pub fn analyze_image(&self, image: &DynamicImage) -> ImageFeatures {
        ImageFeatures::of(image)
    }
}

fn with_default_extension(path: &Path, extension: &str) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(extension)
    }
}

fn write_image(image: &DynamicImage, path: &Path) -> FileHandlerResult<()> {
    let save_error = |source: Box<dyn std::error::Error + Send + Sync>| FileHandlerError::Save {
        path: path.to_path_buf(),
        source,
    };

    match extension_of(path).as_str() {
        ".jpg" | ".jpeg" => {
            let file = File::create(path).map_err(|e| save_error(Box::new(e)))?;
            let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), JPEG_QUALITY);
            image
                .to_rgb8()
                .write_with_encoder(encoder)
                .map_err(|e| save_error(Box::new(e)))
        }
        _ => image.save(path).map_err(|e| save_error(Box::new(e))),
    }
}
