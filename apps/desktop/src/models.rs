use crate::{
    config::AppConfig,
    request::{ProcessingMode, ProcessingRequest, ProcessingResult},
    AppError, AppResult,
};
use ai::{
    blip, stable_diffusion, AiError, ImageCaptionInput, ImageCaptionModel, ModelInfo,
    TextToImageModel,
};
use app_tracing::AppLogger;
use operation_layer::{InvalidInput, ResultCache};
use std::time::Instant;

/// Runs a request to completion. Called from worker threads.
pub trait Processor: Send + Sync + 'static {
    fn process(&self, request: ProcessingRequest) -> AppResult<ProcessingResult>;

    fn model_info(&self, mode: ProcessingMode) -> ModelInfo;
}

/// Owns one adapter per mode.
pub struct ModelManager {
    text_to_image: TextToImageModel,
    image_caption: ImageCaptionModel,
    logger: AppLogger,
}

impl ModelManager {
    pub fn new(config: &AppConfig, logger: AppLogger) -> Self {
        let cache = ResultCache::new();
        Self::from_models(
            stable_diffusion::create_model(&config.text_to_image, &cache),
            blip::create_model(&config.caption, &cache),
            logger,
        )
    }

    pub fn from_models(
        text_to_image: TextToImageModel,
        image_caption: ImageCaptionModel,
        logger: AppLogger,
    ) -> Self {
        Self {
            text_to_image,
            image_caption,
            logger,
        }
    }
}

/// `None` from an adapter means its error layer already logged the failure.
fn processed<T>(info: ModelInfo, result: Result<Option<T>, AiError>) -> AppResult<T> {
    result?.ok_or(AppError::Processing(info.description.failure_message))
}

impl Processor for ModelManager {
    fn process(&self, request: ProcessingRequest) -> AppResult<ProcessingResult> {
        let start = Instant::now();

        match request {
            ProcessingRequest::TextToImage { prompt } => {
                let image = processed(
                    self.text_to_image.info(),
                    self.text_to_image.process(prompt.clone()),
                )?;
                self.logger.log_model_operation(
                    self.text_to_image.model_id(),
                    "Text-to-image generation",
                    Some(start.elapsed()),
                );
                Ok(ProcessingResult::Image { image, prompt })
            }
            ProcessingRequest::ImageToCaption { image, prefix } => {
                let image = image.ok_or_else(|| InvalidInput::new("image_to_caption"))?;
                let mut input = ImageCaptionInput::new(image);
                if let Some(prefix) = prefix {
                    input = input.with_prompt(prefix);
                }

                let caption = processed(
                    self.image_caption.info(),
                    self.image_caption.process_cached(input),
                )?;
                self.logger.log_model_operation(
                    self.image_caption.model_id(),
                    "Image captioning",
                    Some(start.elapsed()),
                );
                Ok(ProcessingResult::Caption(caption))
            }
        }
    }

    fn model_info(&self, mode: ProcessingMode) -> ModelInfo {
        match mode {
            ProcessingMode::TextToImage => self.text_to_image.info(),
            ProcessingMode::ImageToCaption => self.image_caption.info(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai::{Model, ModelDescription};
    use image::{DynamicImage, RgbImage};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    struct Painter;

    impl Model for Painter {
        type Item = String;
        type Output = RgbImage;

        fn process(&mut self, _: String) -> anyhow::Result<RgbImage> {
            Ok(RgbImage::new(4, 4))
        }
    }

    struct Describer {
        calls: Arc<AtomicUsize>,
    }

    impl Model for Describer {
        type Item = ImageCaptionInput;
        type Output = String;

        fn process(&mut self, item: ImageCaptionInput) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let caption = format!("a {}x{} picture", item.image.width(), item.image.height());
            Ok(match item.prompt {
                Some(prefix) => format!("{} {}", prefix, caption),
                None => caption,
            })
        }
    }

    fn description(failure_message: &str) -> ModelDescription {
        ModelDescription {
            model_type: "Test".to_string(),
            device: "cpu".to_string(),
            input_type: "Any".to_string(),
            output_type: "Any".to_string(),
            description: String::new(),
            failure_message: failure_message.to_string(),
        }
    }

    fn manager(calls: Arc<AtomicUsize>) -> ModelManager {
        let cache = ResultCache::new();
        ModelManager::from_models(
            TextToImageModel::new("painter", description("painting failed"), &cache, || {
                Ok(Painter)
            }),
            ImageCaptionModel::new(
                "describer",
                description("describing failed"),
                &cache,
                move || {
                    Ok(Describer {
                        calls: calls.clone(),
                    })
                },
            ),
            AppLogger::detached(),
        )
    }

    #[test_log::test]
    fn routes_requests_by_variant() {
        let manager = manager(Arc::new(AtomicUsize::new(0)));

        let result = manager
            .process(ProcessingRequest::TextToImage {
                prompt: "a red bicycle".to_string(),
            })
            .unwrap();
        assert!(matches!(result, ProcessingResult::Image { ref prompt, .. } if prompt == "a red bicycle"));

        let result = manager
            .process(ProcessingRequest::ImageToCaption {
                image: Some(DynamicImage::new_rgb8(3, 2)),
                prefix: Some("a photography of".to_string()),
            })
            .unwrap();
        assert_eq!(
            result,
            ProcessingResult::Caption("a photography of a 3x2 picture".to_string())
        );
    }

    #[test_log::test]
    fn repeated_captions_come_from_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let manager = manager(calls.clone());
        let request = ProcessingRequest::ImageToCaption {
            image: Some(DynamicImage::new_rgb8(5, 5)),
            prefix: None,
        };

        let first = manager.process(request.clone()).unwrap();
        let second = manager.process(request).unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test_log::test]
    fn load_failure_becomes_one_processing_error() {
        let cache = ResultCache::new();
        let manager = ModelManager::from_models(
            TextToImageModel::new("broken", description("painting failed"), &cache, || {
                Err::<Painter, _>(anyhow::anyhow!("weights not found"))
            }),
            ImageCaptionModel::new("describer", description("describing failed"), &cache, || {
                Ok(Describer {
                    calls: Arc::new(AtomicUsize::new(0)),
                })
            }),
            AppLogger::detached(),
        );

        let err = manager
            .process(ProcessingRequest::TextToImage {
                prompt: "a red bicycle".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, AppError::Processing(ref m) if m == "painting failed"));
        assert!(!manager.model_info(ProcessingMode::TextToImage).loaded);
    }

    #[test]
    fn missing_image_is_invalid_input() {
        let manager = manager(Arc::new(AtomicUsize::new(0)));
        let err = manager
            .process(ProcessingRequest::ImageToCaption {
                image: None,
                prefix: None,
            })
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
