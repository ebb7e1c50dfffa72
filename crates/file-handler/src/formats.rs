use serde::{Deserialize, Serialize};
use std::path::Path;

/// Extensions accepted by the file handler, lowercase and without the leading dot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportedFormats {
    pub image: Vec<String>,
    pub text: Vec<String>,
}

impl Default for SupportedFormats {
    fn default() -> Self {
        Self {
            image: ["jpg", "jpeg", "png", "bmp", "tiff", "webp"]
                .map(String::from)
                .to_vec(),
            text: ["txt", "md", "rst"].map(String::from).to_vec(),
        }
    }
}

impl SupportedFormats {
    pub fn is_image(&self, path: &Path) -> bool {
        matches_extension(&self.image, path)
    }

    pub fn is_text(&self, path: &Path) -> bool {
        matches_extension(&self.text, path)
    }
}

/// Lowercased extension of `path`, with the leading dot, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn matches_extension(extensions: &[String], path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
}
