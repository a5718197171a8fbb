//! Image provider trait.

use crate::error::Result;
use crate::image::types::{GeneratedImage, GenerationRequest};
use async_trait::async_trait;

/// Backend that turns a generation request into image bytes.
///
/// The node talks to the endpoint through this trait so tests and embedders
/// can substitute their own implementation.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Sends one generation request authorized with `api_key`.
    ///
    /// Implementations must not retry and must bound the call by
    /// `request.resolution.timeout()`.
    async fn generate(&self, api_key: &str, request: &GenerationRequest) -> Result<GeneratedImage>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;
}
