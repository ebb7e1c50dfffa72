use crate::{AppError, AppResult};
use ai::{blip::BlipConfig, stable_diffusion::TextToImageConfig};
use app_tracing::LogConfig;
use file_handler::SupportedFormats;
use serde::Deserialize;
use std::{io::ErrorKind, path::Path};

pub const CONFIG_FILE: &str = "model_studio.json";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub caption: BlipConfig,
    pub text_to_image: TextToImageConfig,
    pub files: SupportedFormats,
    pub log: LogConfig,
}

impl AppConfig {
    /// Reads `path` when it exists. Missing sections and fields keep their defaults.
    pub fn load_or_default(path: &Path) -> AppResult<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(AppError::ConfigIo {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&content).map_err(|source| AppError::Config {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join(CONFIG_FILE)).unwrap();

        assert_eq!(config.caption.max_length, 50);
        assert_eq!(config.caption.num_beams, 5);
        assert_eq!(config.text_to_image.steps, 20);
        assert_eq!(config.text_to_image.guidance_scale, 7.5);
        assert_eq!((config.text_to_image.width, config.text_to_image.height), (512, 512));
        assert_eq!(config.files, SupportedFormats::default());
    }

    #[test]
    fn partial_file_overrides_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"{
                "caption": { "num_beams": 1 },
                "text_to_image": { "steps": 30, "seed": 42 },
                "files": { "image": ["png"] },
                "log": { "level": "debug", "file": null }
            }"#,
        )
        .unwrap();

        let config = AppConfig::load_or_default(&path).unwrap();
        assert_eq!(config.caption.num_beams, 1);
        assert_eq!(config.caption.max_length, 50);
        assert_eq!(config.text_to_image.steps, 30);
        assert_eq!(config.text_to_image.seed, Some(42));
        assert_eq!(config.files.image, vec!["png".to_string()]);
        assert_eq!(config.files.text, SupportedFormats::default().text);
        assert_eq!(config.log.level, "debug");
        assert!(config.log.file.is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ caption: ").unwrap();

        assert!(matches!(
            AppConfig::load_or_default(&path),
            Err(AppError::Config { .. })
        ));
    }
}
