use crate::{
    traits::{ModelDescription, TextToImageInput, TextToImageModel, TextToImageOutput},
    utils::{device_name, hub_file, preferred_device_name, select_device},
    Model,
};
use anyhow::{anyhow, bail};
use candle_core::{DType, Device, IndexOp, Module, Tensor};
use candle_transformers::models::stable_diffusion::{
    self, clip::ClipTextTransformer, schedulers::Scheduler, unet_2d::UNet2DConditionModel,
    vae::AutoEncoderKL, StableDiffusionConfig,
};
use image::RgbImage;
use operation_layer::ResultCache;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokenizers::Tokenizer;
use tracing::debug;

const VAE_SCALE: f64 = 0.18215;
const LATENT_CHANNELS: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextToImageConfig {
    pub model_id: String,
    /// repository holding the CLIP `tokenizer.json`
    pub tokenizer_repo: String,
    pub steps: usize,
    pub guidance_scale: f64,
    pub width: usize,
    pub height: usize,
    /// fixed seed for the initial noise, random when absent
    pub seed: Option<u64>,
    pub use_f16: bool,
    pub sliced_attention_size: Option<usize>,
}

impl Default for TextToImageConfig {
    fn default() -> Self {
        Self {
            model_id: "stable-diffusion-v1-5/stable-diffusion-v1-5".to_string(),
            tokenizer_repo: "openai/clip-vit-base-patch32".to_string(),
            steps: 20,
            guidance_scale: 7.5,
            width: 512,
            height: 512,
            seed: None,
            use_f16: false,
            sliced_attention_size: None,
        }
    }
}

impl TextToImageConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.width == 0 || self.height == 0 || self.width % 8 != 0 || self.height % 8 != 0 {
            bail!(
                "image size must be a non-zero multiple of 8, got {}x{}",
                self.width,
                self.height
            );
        }
        if self.steps == 0 {
            bail!("at least one inference step is required");
        }
        Ok(())
    }

    fn weights_file(&self, component: &str, name: &str) -> String {
        if self.use_f16 {
            format!("{}/{}.fp16.safetensors", component, name)
        } else {
            format!("{}/{}.safetensors", component, name)
        }
    }
}

pub struct StableDiffusion {
    sd_config: StableDiffusionConfig,
    tokenizer: Tokenizer,
    text_model: ClipTextTransformer,
    unet: UNet2DConditionModel,
    vae: AutoEncoderKL,
    device: Device,
    dtype: DType,
    steps: usize,
    guidance_scale: f64,
    seed: Option<u64>,
}

/// Local paths of every file the pipeline reads.
pub struct StableDiffusionFiles {
    pub tokenizer: PathBuf,
    pub clip_weights: PathBuf,
    pub unet_weights: PathBuf,
    pub vae_weights: PathBuf,
}

impl StableDiffusionFiles {
    pub fn from_hub(config: &TextToImageConfig) -> anyhow::Result<Self> {
        Ok(Self {
            tokenizer: hub_file(&config.tokenizer_repo, None, "tokenizer.json")?,
            clip_weights: hub_file(
                &config.model_id,
                None,
                &config.weights_file("text_encoder", "model"),
            )?,
            unet_weights: hub_file(
                &config.model_id,
                None,
                &config.weights_file("unet", "diffusion_pytorch_model"),
            )?,
            vae_weights: hub_file(
                &config.model_id,
                None,
                &config.weights_file("vae", "diffusion_pytorch_model"),
            )?,
        })
    }
}

impl Model for StableDiffusion {
    type Item = TextToImageInput;
    type Output = TextToImageOutput;

    fn process(&mut self, item: Self::Item) -> anyhow::Result<Self::Output> {
        self.generate(&item)
    }

    fn device_name(&self) -> Option<&'static str> {
        Some(device_name(&self.device))
    }
}

impl StableDiffusion {
    pub fn new(files: StableDiffusionFiles, config: &TextToImageConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let device = select_device();
        let dtype = if config.use_f16 && !device.is_cpu() {
            DType::F16
        } else {
            DType::F32
        };

        let sd_config = StableDiffusionConfig::v1_5(
            config.sliced_attention_size,
            Some(config.height),
            Some(config.width),
        );

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow!("failed to initialize tokenizer: {}", e))?;
        let text_model = stable_diffusion::build_clip_transformer(
            &sd_config.clip,
            &files.clip_weights,
            &device,
            dtype,
        )?;
        let unet = sd_config.build_unet(
            &files.unet_weights,
            &device,
            LATENT_CHANNELS,
            false,
            dtype,
        )?;
        let vae = sd_config.build_vae(&files.vae_weights, &device, dtype)?;

        debug!(
            "stable diffusion loaded on {} ({:?})",
            device_name(&device),
            dtype
        );

        Ok(Self {
            sd_config,
            tokenizer,
            text_model,
            unet,
            vae,
            device,
            dtype,
            steps: config.steps,
            guidance_scale: config.guidance_scale,
            seed: config.seed,
        })
    }

    pub fn from_hub(config: &TextToImageConfig) -> anyhow::Result<Self> {
        Self::new(StableDiffusionFiles::from_hub(config)?, config)
    }

    /// Unconditional and prompt embeddings stacked along the batch dimension.
    fn text_embeddings(&self, prompt: &str) -> anyhow::Result<Tensor> {
        let max_len = self.sd_config.clip.max_position_embeddings;
        let pad_token = self
            .sd_config
            .clip
            .pad_with
            .as_deref()
            .unwrap_or("<|endoftext|>");
        let pad_id = *self
            .tokenizer
            .get_vocab(true)
            .get(pad_token)
            .ok_or_else(|| anyhow!("tokenizer has no {} token", pad_token))?;

        let encode = |text: &str| -> anyhow::Result<Tensor> {
            let tokens = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| anyhow!("failed to tokenize prompt: {}", e))?;
            let tokens = pad_tokens(tokens.get_ids().to_vec(), max_len, pad_id);
            let tokens = Tensor::new(tokens.as_slice(), &self.device)?.unsqueeze(0)?;
            Ok(self.text_model.forward(&tokens)?)
        };

        let text_embeddings = encode(prompt)?;
        let uncond_embeddings = encode("")?;

        Ok(Tensor::cat(&[uncond_embeddings, text_embeddings], 0)?.to_dtype(self.dtype)?)
    }

    pub fn generate(&mut self, prompt: &str) -> anyhow::Result<RgbImage> {
        let text_embeddings = self.text_embeddings(prompt)?;

        let mut scheduler = self.sd_config.build_scheduler(self.steps)?;
        let seed = self.seed.unwrap_or_else(rand::random);
        debug!("generating with seed {}", seed);

        let latent_shape = (
            1,
            LATENT_CHANNELS,
            self.sd_config.height / 8,
            self.sd_config.width / 8,
        );
        let mut latents = (initial_noise(seed, latent_shape, &self.device)?
            * scheduler.init_noise_sigma())?
        .to_dtype(self.dtype)?;

        let timesteps = scheduler.timesteps().to_vec();
        for (index, &timestep) in timesteps.iter().enumerate() {
            let latent_model_input = Tensor::cat(&[&latents, &latents], 0)?;
            let latent_model_input = scheduler.scale_model_input(latent_model_input, timestep)?;

            let noise_pred =
                self.unet
                    .forward(&latent_model_input, timestep as f64, &text_embeddings)?;
            let noise_pred = noise_pred.chunk(2, 0)?;
            let (noise_pred_uncond, noise_pred_text) = (&noise_pred[0], &noise_pred[1]);
            let noise_pred = (noise_pred_uncond
                + ((noise_pred_text - noise_pred_uncond)? * self.guidance_scale)?)?;

            latents = scheduler.step(&noise_pred, timestep, &latents)?;
            debug!("step {}/{} done", index + 1, timesteps.len());
        }

        let decoded = self.vae.decode(&(latents / VAE_SCALE)?)?;
        decoded_to_image(&decoded)
    }
}

/// Pads with `pad_id` up to `max_len`; longer prompts are cut but keep their final token.
fn pad_tokens(mut tokens: Vec<u32>, max_len: usize, pad_id: u32) -> Vec<u32> {
    if tokens.len() > max_len {
        let last = tokens[tokens.len() - 1];
        tokens.truncate(max_len.saturating_sub(1));
        tokens.push(last);
    }
    while tokens.len() < max_len {
        tokens.push(pad_id);
    }
    tokens
}

/// Standard normal noise from a seeded generator, so equal seeds give equal images on any device.
fn initial_noise(
    seed: u64,
    shape: (usize, usize, usize, usize),
    device: &Device,
) -> candle_core::Result<Tensor> {
    let mut rng = StdRng::seed_from_u64(seed);
    let count = shape.0 * shape.1 * shape.2 * shape.3;

    let mut values = Vec::with_capacity(count);
    while values.len() < count {
        // Box-Muller
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f64::consts::PI * u2;
        values.push((radius * theta.cos()) as f32);
        values.push((radius * theta.sin()) as f32);
    }
    values.truncate(count);

    Tensor::from_vec(values, shape, device)
}

/// Converts a decoded (1, 3, H, W) tensor in [-1, 1] into an RGB image.
pub fn decoded_to_image(decoded: &Tensor) -> anyhow::Result<RgbImage> {
    let image = ((decoded.to_dtype(DType::F32)? / 2.)? + 0.5)?;
    let image = (image.clamp(0f32, 1f32)? * 255.)?.to_dtype(DType::U8)?;
    let image = image.i(0)?;

    let (channels, height, width) = image.dims3()?;
    if channels != 3 {
        bail!("expected 3 channels, got {}", channels);
    }
    let data = image.permute((1, 2, 0))?.flatten_all()?.to_vec1::<u8>()?;

    RgbImage::from_raw(width as u32, height as u32, data)
        .ok_or_else(|| anyhow!("decoded buffer does not match {}x{}", width, height))
}

pub fn create_model(config: &TextToImageConfig, cache: &ResultCache) -> TextToImageModel {
    let description = ModelDescription {
        model_type: "Text-to-Image (Stable Diffusion)".to_string(),
        device: preferred_device_name().to_string(),
        input_type: "Text".to_string(),
        output_type: "Image".to_string(),
        description: "Generates images from text descriptions using diffusion models".to_string(),
        failure_message: "Text-to-image generation failed".to_string(),
    };

    let config = config.clone();
    TextToImageModel::new(config.model_id.clone(), description, cache, move || {
        StableDiffusion::from_hub(&config)
    })
}
