//! Gemini 3 Pro Image ("NanoBanana Pro") provider over the generateContent endpoint.

use crate::error::{NodeError, Result};
use crate::image::codec::decode_base64_lenient;
use crate::image::provider::ImageProvider;
use crate::image::types::{GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Default generateContent endpoint.
pub const DEFAULT_ENDPOINT: &str =
    "https://api.apiyi.com/v1beta/models/gemini-3-pro-image-preview:generateContent";

/// Model identifier embedded in the default endpoint.
pub const MODEL_ID: &str = "gemini-3-pro-image-preview";

/// Maximum characters of a response body echoed into error messages.
const BODY_PREVIEW_CHARS: usize = 500;

/// Builder for GeminiProvider.
#[derive(Debug, Clone, Default)]
pub struct GeminiProviderBuilder {
    endpoint: Option<String>,
    client: Option<reqwest::Client>,
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the full endpoint URL. Falls back to `NANOBANANA_API_URL`, then the default.
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Uses a preconfigured HTTP client.
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the provider, validating the endpoint URL.
    pub fn build(self) -> Result<GeminiProvider> {
        let endpoint = self
            .endpoint
            .or_else(|| std::env::var("NANOBANANA_API_URL").ok())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        reqwest::Url::parse(&endpoint)
            .map_err(|e| NodeError::InvalidInput(format!("invalid endpoint {endpoint}: {e}")))?;

        Ok(GeminiProvider {
            client: self.client.unwrap_or_default(),
            endpoint,
        })
    }
}

/// Gemini image generation provider.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// The endpoint requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn generate_impl(
        &self,
        api_key: &str,
        request: &GenerationRequest,
    ) -> Result<GeneratedImage> {
        let start = Instant::now();
        let timeout = request.resolution.timeout();
        let body = GeminiRequest::from_generation_request(request);

        tracing::debug!(
            endpoint = %self.endpoint,
            references = request.references.len(),
            aspect_ratio = %request.aspect_ratio,
            resolution = %request.resolution,
            timeout_secs = timeout.as_secs(),
            "sending generateContent request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_send_error(e, timeout))?;

        if !status.is_success() {
            return Err(NodeError::Api {
                status: status.as_u16(),
                message: error_detail(&text),
            });
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&text).map_err(|e| {
            NodeError::MalformedResponse(format!("{e}; body: {}", preview(&text)))
        })?;

        let inline = extract_inline_image(gemini_response, &text)?;

        let data =
            decode_base64_lenient(&inline.data).map_err(|e| NodeError::Decode(e.to_string()))?;

        let format = inline
            .mime_type
            .as_deref()
            .and_then(ImageFormat::from_mime_type)
            .or_else(|| ImageFormat::from_magic_bytes(&data))
            .unwrap_or_default();

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(bytes = data.len(), duration_ms, "generateContent returned an image");

        Ok(GeneratedImage {
            data,
            format,
            metadata: GenerationMetadata {
                model: Some(MODEL_ID.to_string()),
                duration_ms: Some(duration_ms),
                finish_reason: inline.finish_reason,
            },
        })
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    async fn generate(&self, api_key: &str, request: &GenerationRequest) -> Result<GeneratedImage> {
        self.generate_impl(api_key, request).await
    }

    fn name(&self) -> &str {
        "NanoBanana Pro (Gemini 3 Pro Image)"
    }
}

fn map_send_error(error: reqwest::Error, timeout: Duration) -> NodeError {
    if error.is_timeout() {
        NodeError::Timeout(timeout)
    } else {
        NodeError::Network(error)
    }
}

fn preview(text: &str) -> String {
    text.chars().take(BODY_PREVIEW_CHARS).collect()
}

/// Pretty-prints a JSON error body, or returns a preview of a plain one.
fn error_detail(text: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| preview(text)),
        Err(_) => preview(text),
    }
}

/// Base64 payload of the first inline image, with its candidate's metadata.
#[derive(Debug)]
struct InlineImage {
    mime_type: Option<String>,
    data: String,
    finish_reason: Option<String>,
}

/// Finds the first inline image in the first candidate.
fn extract_inline_image(response: GeminiResponse, raw: &str) -> Result<InlineImage> {
    let no_image = |reason: Option<String>| {
        let mut detail = reason.map(|r| format!("{r}; ")).unwrap_or_default();
        detail.push_str("response: ");
        detail.push_str(&preview(raw));
        NodeError::NoImage(Some(detail))
    };

    let block_reason = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason_message.or(feedback.block_reason))
        .map(|reason| format!("prompt blocked: {reason}"));

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(no_image(block_reason));
    };

    let finish_reason = candidate.finish_reason;
    let inline = candidate
        .content
        .into_iter()
        .flat_map(|content| content.parts)
        .filter_map(|part| part.inline_data)
        .find_map(|inline| match inline.data {
            Some(data) if !data.trim().is_empty() => Some((inline.mime_type, data)),
            _ => None,
        });

    match inline {
        Some((mime_type, data)) => Ok(InlineImage {
            mime_type,
            data,
            finish_reason,
        }),
        None => Err(no_image(
            finish_reason
                .map(|reason| format!("finish reason: {reason}"))
                .or(block_reason),
        )),
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
    image_config: GeminiImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiImageConfig {
    aspect_ratio: String,
    image_size: String,
}

impl GeminiRequest {
    fn from_generation_request(req: &GenerationRequest) -> Self {
        let mut parts = Vec::with_capacity(1 + req.references.len() * 2);

        parts.push(GeminiRequestPart::Text {
            text: req.prompt.clone(),
        });

        // Each reference is preceded by its weighting instruction.
        for reference in &req.references {
            parts.push(GeminiRequestPart::Text {
                text: reference.instruction.clone(),
            });
            parts.push(GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: reference.mime_type.to_string(),
                    data: reference.data.clone(),
                },
            });
        }

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: GeminiImageConfig {
                    aspect_ratio: req.aspect_ratio.as_str().to_string(),
                    image_size: req.resolution.as_str().to_string(),
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: Option<String>,
}
