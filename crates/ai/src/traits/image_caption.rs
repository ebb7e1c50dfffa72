use super::AIModel;
use image::DynamicImage;
use operation_layer::{Blank, CacheKey};
use std::hash::{DefaultHasher, Hash, Hasher};

#[derive(Debug, Clone)]
pub struct ImageCaptionInput {
    pub image: DynamicImage,
    /// conditional text the caption continues from
    pub prompt: Option<String>,
}

impl ImageCaptionInput {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            prompt: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }
}

impl From<DynamicImage> for ImageCaptionInput {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

impl Blank for ImageCaptionInput {
    fn is_blank(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

impl CacheKey for ImageCaptionInput {
    fn cache_key(&self) -> String {
        let mut hasher = DefaultHasher::new();
        format!("{:?}", self.image.color()).hash(&mut hasher);
        self.image.as_bytes().hash(&mut hasher);

        format!(
            "image({}x{}, {:016x}), {}",
            self.image.width(),
            self.image.height(),
            hasher.finish(),
            self.prompt.cache_key()
        )
    }
}

pub type ImageCaptionOutput = String;
pub type ImageCaptionModel = AIModel<ImageCaptionInput, ImageCaptionOutput>;

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn zero_sized_image_is_blank() {
        assert!(ImageCaptionInput::new(DynamicImage::new_rgb8(0, 0)).is_blank());
        assert!(ImageCaptionInput::new(DynamicImage::new_rgb8(10, 0)).is_blank());
        assert!(!ImageCaptionInput::new(solid(1, 1, [0, 0, 0])).is_blank());
    }

    #[test]
    fn cache_key_follows_pixels_and_prompt() {
        let red = ImageCaptionInput::new(solid(4, 4, [255, 0, 0]));
        let also_red = ImageCaptionInput::new(solid(4, 4, [255, 0, 0]));
        let blue = ImageCaptionInput::new(solid(4, 4, [0, 0, 255]));

        assert_eq!(red.cache_key(), also_red.cache_key());
        assert_ne!(red.cache_key(), blue.cache_key());
        assert_ne!(
            red.cache_key(),
            red.clone().with_prompt("a photography of").cache_key()
        );
    }

    #[test]
    fn whitespace_prompt_is_dropped() {
        let input = ImageCaptionInput::new(solid(2, 2, [0, 0, 0])).with_prompt("  ");
        assert!(input.prompt.is_none());
    }
}
