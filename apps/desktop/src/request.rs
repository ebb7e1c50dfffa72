use image::{DynamicImage, RgbImage};
use operation_layer::Blank;
use strum_macros::{Display, EnumIter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter)]
pub enum ProcessingMode {
    #[default]
    #[strum(to_string = "Text to Image")]
    TextToImage,
    #[strum(to_string = "Image to Caption")]
    ImageToCaption,
}

impl ProcessingMode {
    pub fn trigger_label(&self) -> &'static str {
        match self {
            ProcessingMode::TextToImage => "Generate Image",
            ProcessingMode::ImageToCaption => "Generate Caption",
        }
    }

    pub fn missing_input_message(&self) -> &'static str {
        match self {
            ProcessingMode::TextToImage => "Please enter a text prompt",
            ProcessingMode::ImageToCaption => "Please select an image file",
        }
    }
}

#[derive(Debug, Clone)]
pub enum ProcessingRequest {
    TextToImage {
        prompt: String,
    },
    ImageToCaption {
        image: Option<DynamicImage>,
        /// conditional text the caption starts from
        prefix: Option<String>,
    },
}

impl ProcessingRequest {
    pub fn mode(&self) -> ProcessingMode {
        match self {
            ProcessingRequest::TextToImage { .. } => ProcessingMode::TextToImage,
            ProcessingRequest::ImageToCaption { .. } => ProcessingMode::ImageToCaption,
        }
    }
}

impl Blank for ProcessingRequest {
    fn is_blank(&self) -> bool {
        match self {
            ProcessingRequest::TextToImage { prompt } => prompt.is_blank(),
            ProcessingRequest::ImageToCaption { image, .. } => image
                .as_ref()
                .map_or(true, |image| image.width() == 0 || image.height() == 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingResult {
    Image { image: RgbImage, prompt: String },
    Caption(String),
}

impl ProcessingResult {
    /// Text shown in the output area.
    pub fn text(&self) -> String {
        match self {
            ProcessingResult::Image { prompt, .. } => {
                format!("Generated image from prompt: '{}'", prompt)
            }
            ProcessingResult::Caption(caption) => caption.clone(),
        }
    }
}
