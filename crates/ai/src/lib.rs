mod error;
mod loader;
mod traits;

pub mod blip;
pub mod stable_diffusion;
pub mod utils;

pub use error::*;
pub use tokenizers;
pub use traits::*;
