//! Image generation module.

pub mod codec;
mod provider;
pub mod providers;
mod tensor;
mod types;

pub use codec::{EncodeOptions, EncodedImage};
pub use provider::ImageProvider;
pub use tensor::{ImageTensor, CHANNELS};
pub use types::{
    AspectRatio, GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat,
    ReferenceImage, Resolution,
};
