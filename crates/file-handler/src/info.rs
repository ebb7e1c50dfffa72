use image::DynamicImage;
use serde::Serialize;
use std::time::SystemTime;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileInfo {
    pub exists: bool,
    pub name: String,
    pub size_bytes: u64,
    pub size_mb: f64,
    /// lowercase, with the leading dot
    pub extension: String,
    pub is_image: bool,
    pub modified: Option<SystemTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageFeatures {
    pub width: u32,
    pub height: u32,
    pub color_type: String,
    pub has_transparency: bool,
}

impl ImageFeatures {
    pub fn of(image: &DynamicImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            color_type: format!("{:?}", image.color()),
            has_transparency: image.color().has_alpha(),
        }
    }
}

pub(crate) fn round_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}
