use super::AIModel;
use image::RgbImage;

/// the prompt
pub type TextToImageInput = String;
pub type TextToImageOutput = RgbImage;
pub type TextToImageModel = AIModel<TextToImageInput, TextToImageOutput>;
