//! Image generation providers.

mod gemini;

pub use gemini::{GeminiProvider, GeminiProviderBuilder, DEFAULT_ENDPOINT, MODEL_ID};
