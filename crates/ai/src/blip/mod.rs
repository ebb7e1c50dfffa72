mod beam;

use crate::{
    traits::{ImageCaptionInput, ImageCaptionModel, ImageCaptionOutput, ModelDescription},
    utils::{device_name, hub_file, preferred_device_name, select_device},
    Model,
};
use anyhow::anyhow;
pub use beam::BeamSearch;
use candle_core::{DType, Device, Tensor, D};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::blip::VisionConfig;
use candle_transformers::models::quantized_blip;
use candle_transformers::models::{blip, blip_text};
use image::DynamicImage;
use operation_layer::ResultCache;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strum_macros::{AsRefStr, EnumString};
use tokenizers::Tokenizer;
use tracing::debug;

pub struct BLIP {
    tokenizer: Tokenizer,
    model: quantized_blip::BlipForConditionalGeneration,
    logits_processor: LogitsProcessor,
    device: Device,
    max_length: usize,
    num_beams: usize,
}

const SEP_TOKEN_ID: u32 = 102;
const DECODER_START_TOKEN_ID: u32 = 30522;
const IMAGE_SIZE: usize = 384;

fn blip_base_config() -> blip::Config {
    let text_config = blip_text::Config {
        vocab_size: 30524,
        hidden_size: 768,
        encoder_hidden_size: 768,
        intermediate_size: 3072,
        projection_dim: 768,
        num_hidden_layers: 12,
        num_attention_heads: 12,
        max_position_embeddings: 512,
        hidden_act: candle_nn::Activation::Gelu,
        layer_norm_eps: 1e-12,
        is_decoder: true,
    };
    let vision_config = VisionConfig {
        hidden_size: 768,
        intermediate_size: 3072,
        projection_dim: 512,
        num_hidden_layers: 12,
        num_attention_heads: 12,
        image_size: 384,
        patch_size: 16,
        hidden_act: candle_nn::Activation::Gelu,
        layer_norm_eps: 1e-5,
    };

    blip::Config {
        text_config,
        vision_config,
        projection_dim: 512,
        image_text_hidden_size: 256,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
pub enum BLIPModel {
    #[serde(rename = "base")]
    #[strum(serialize = "base")]
    Base,
    #[serde(rename = "large")]
    #[strum(serialize = "large")]
    Large,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlipConfig {
    /// repository holding `tokenizer.json`
    pub model_id: String,
    pub tokenizer_revision: Option<String>,
    /// repository holding the quantized gguf weights
    pub weights_repo: String,
    pub weights_file: String,
    pub variant: BLIPModel,
    pub max_length: usize,
    pub num_beams: usize,
}

impl Default for BlipConfig {
    fn default() -> Self {
        Self {
            model_id: "Salesforce/blip-image-captioning-large".to_string(),
            tokenizer_revision: Some("refs/pr/18".to_string()),
            // quantized weights are only published for the large model
            weights_repo: "lmz/candle-blip".to_string(),
            weights_file: "blip-image-captioning-large-q4k.gguf".to_string(),
            variant: BLIPModel::Large,
            max_length: 50,
            num_beams: 5,
        }
    }
}

impl Model for BLIP {
    type Item = ImageCaptionInput;
    type Output = ImageCaptionOutput;

    fn process(&mut self, item: Self::Item) -> anyhow::Result<Self::Output> {
        self.get_caption(&item.image, item.prompt.as_deref())
    }

    fn device_name(&self) -> Option<&'static str> {
        Some(device_name(&self.device))
    }
}

impl BLIP {
    pub fn new(
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
        config: &BlipConfig,
    ) -> anyhow::Result<Self> {
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("failed to initialize tokenizer: {}", e))?;

        let logits_processor = LogitsProcessor::new(1337, None, None);

        let blip_config = match config.variant {
            BLIPModel::Base => blip_base_config(),
            BLIPModel::Large => blip::Config::image_captioning_large(),
        };

        let device = select_device();

        let vb = quantized_blip::VarBuilder::from_gguf(model_path, &device)?;
        let model = quantized_blip::BlipForConditionalGeneration::new(&blip_config, vb)?;

        debug!("blip loaded on {}", device_name(&device));

        Ok(Self {
            tokenizer,
            model,
            logits_processor,
            device,
            max_length: config.max_length,
            num_beams: config.num_beams,
        })
    }

    /// Downloads tokenizer and weights when they are not cached yet.
    pub fn from_hub(config: &BlipConfig) -> anyhow::Result<Self> {
        let tokenizer_path = hub_file(
            &config.model_id,
            config.tokenizer_revision.as_deref(),
            "tokenizer.json",
        )?;
        let model_path = hub_file(&config.weights_repo, None, &config.weights_file)?;

        Self::new(model_path, tokenizer_path, config)
    }

    fn get_caption(
        &mut self,
        image: &DynamicImage,
        prefix: Option<&str>,
    ) -> anyhow::Result<String> {
        debug!(
            "generating caption for {}x{} image",
            image.width(),
            image.height()
        );
        let image = preprocess(image)?.to_device(&self.device)?;
        let image_embeds = image.unsqueeze(0)?.apply(self.model.vision_model())?;

        let mut prompt = vec![DECODER_START_TOKEN_ID];
        if let Some(prefix) = prefix {
            let encoding = self
                .tokenizer
                .encode(prefix, false)
                .map_err(|e| anyhow!("failed to tokenize prompt: {}", e))?;
            prompt.extend_from_slice(encoding.get_ids());
        }

        let token_ids = if self.num_beams > 1 {
            self.beam_decode(&prompt, &image_embeds)?
        } else {
            self.greedy_decode(prompt, &image_embeds)?
        };

        let caption = self
            .tokenizer
            .decode(&token_ids, true)
            .map_err(|_| anyhow!("failed to generate caption"))?;

        Ok(caption.trim().to_string())
    }

    fn greedy_decode(
        &mut self,
        mut token_ids: Vec<u32>,
        image_embeds: &Tensor,
    ) -> anyhow::Result<Vec<u32>> {
        // we need this to make multi time generation work
        self.model.text_decoder().reset_kv_cache();

        let prompt_len = token_ids.len();
        for index in 0..self.max_length.saturating_sub(prompt_len) {
            let context_size = if index > 0 { 1 } else { token_ids.len() };
            let start_pos = token_ids.len().saturating_sub(context_size);
            let input_ids = Tensor::new(&token_ids[start_pos..], &self.device)?.unsqueeze(0)?;
            let logits = self
                .model
                .text_decoder()
                .forward(&input_ids, image_embeds)?;
            let logits = logits.squeeze(0)?;
            let logits = logits.get(logits.dim(0)? - 1)?;
            let token = self.logits_processor.sample(&logits)?;
            if token == SEP_TOKEN_ID {
                break;
            }
            token_ids.push(token);
        }

        Ok(token_ids)
    }

    fn beam_decode(&mut self, prompt: &[u32], image_embeds: &Tensor) -> anyhow::Result<Vec<u32>> {
        let search = BeamSearch::new(self.num_beams, self.max_length, SEP_TOKEN_ID);
        let device = self.device.clone();
        let decoder = self.model.text_decoder();

        search.run(prompt, |tokens| {
            // every hypothesis is scored from scratch
            decoder.reset_kv_cache();
            let input_ids = Tensor::new(tokens, &device)?.unsqueeze(0)?;
            let logits = decoder.forward(&input_ids, image_embeds)?.squeeze(0)?;
            let logits = logits.get(logits.dim(0)? - 1)?.to_dtype(DType::F32)?;
            let log_probs = candle_nn::ops::log_softmax(&logits, D::Minus1)?;
            Ok(log_probs.to_vec1::<f32>()?)
        })
    }
}

/// Resizes to 384x384 and normalizes with the CLIP mean and std, giving a (3, 384, 384) tensor.
pub fn preprocess(image: &DynamicImage) -> candle_core::Result<Tensor> {
    let img = image.resize_to_fill(
        IMAGE_SIZE as u32,
        IMAGE_SIZE as u32,
        image::imageops::FilterType::Triangle,
    );
    let data = img.to_rgb8().into_raw();
    let data = Tensor::from_vec(data, (IMAGE_SIZE, IMAGE_SIZE, 3), &Device::Cpu)?.permute((2, 0, 1))?;
    let mean =
        Tensor::new(&[0.48145466f32, 0.4578275, 0.40821073], &Device::Cpu)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&[0.26862954f32, 0.261_302_6, 0.275_777_1], &Device::Cpu)?
        .reshape((3, 1, 1))?;
    (data.to_dtype(DType::F32)? / 255.)?
        .broadcast_sub(&mean)?
        .broadcast_div(&std)
}

pub fn create_model(config: &BlipConfig, cache: &ResultCache) -> ImageCaptionModel {
    let description = ModelDescription {
        model_type: "Image Captioning".to_string(),
        device: preferred_device_name().to_string(),
        input_type: "Image".to_string(),
        output_type: "Text".to_string(),
        description: format!("BLIP ({}) image captioning", config.variant.as_ref()),
        failure_message: "Image captioning failed".to_string(),
    };

    let config = config.clone();
    ImageCaptionModel::new(config.model_id.clone(), description, cache, move || {
        BLIP::from_hub(&config)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn preprocess_produces_normalized_chw_tensor() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, Rgb([255, 255, 255])));
        let tensor = preprocess(&image).unwrap();
        assert_eq!(tensor.dims(), &[3, IMAGE_SIZE, IMAGE_SIZE]);

        // white maps to (1 - mean) / std in every channel
        let channel = tensor.get(0).unwrap().flatten_all().unwrap();
        let max = channel.max(0).unwrap().to_scalar::<f32>().unwrap();
        assert!((max - (1.0 - 0.48145466) / 0.26862954).abs() < 1e-4);
    }

    #[test]
    fn config_defaults_and_partial_json() {
        let config: BlipConfig = serde_json::from_str(r#"{"num_beams": 1}"#).unwrap();
        assert_eq!(config.num_beams, 1);
        assert_eq!(config.max_length, 50);
        assert_eq!(config.variant, BLIPModel::Large);
        assert_eq!("base".parse::<BLIPModel>().unwrap(), BLIPModel::Base);
    }

    #[test]
    fn created_model_is_not_loaded_yet() {
        let model = create_model(&BlipConfig::default(), &ResultCache::new());
        let info = model.info();
        assert_eq!(info.name, "Salesforce/blip-image-captioning-large");
        assert!(!info.loaded);
        assert_eq!(info.description.input_type, "Image");
    }

    #[test_log::test]
    #[ignore = "downloads weights from the hugging face hub"]
    fn caption_from_hub() {
        let config = BlipConfig {
            num_beams: 1,
            ..Default::default()
        };
        let model = create_model(&config, &ResultCache::new());
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(384, 384, Rgb([200, 30, 30])));

        let caption = model
            .process(ImageCaptionInput::new(image))
            .unwrap()
            .unwrap();
        tracing::info!("caption: {}", caption);
        assert!(!caption.is_empty());
        assert!(model.is_loaded());
    }
}
