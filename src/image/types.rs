//! Core types for image generation.

use crate::error::{NodeError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Image formats the endpoint may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Maps a MIME type to a format.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Aspect ratio option exposed to the host.
///
/// Variant order matches the choice list shown in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// Infer from the first reference image, or 1:1 without one.
    #[default]
    #[serde(rename = "auto")]
    Auto,
    /// 1:1 square.
    #[serde(rename = "1:1")]
    Square,
    /// 16:9 widescreen.
    #[serde(rename = "16:9")]
    Landscape,
    /// 9:16 tall.
    #[serde(rename = "9:16")]
    Portrait,
    /// 4:3 standard landscape.
    #[serde(rename = "4:3")]
    Standard,
    /// 3:4 standard portrait.
    #[serde(rename = "3:4")]
    StandardPortrait,
    /// 3:2 photo landscape.
    #[serde(rename = "3:2")]
    Photo,
    /// 2:3 photo portrait.
    #[serde(rename = "2:3")]
    PhotoPortrait,
    /// 21:9 ultrawide.
    #[serde(rename = "21:9")]
    Ultrawide,
    /// 5:4 large format.
    #[serde(rename = "5:4")]
    LargeFormat,
    /// 4:5 large format portrait.
    #[serde(rename = "4:5")]
    LargeFormatPortrait,
}

/// Named ratios matched against reference dimensions, in match order.
///
/// The first strict minimum wins, so ties resolve to the earlier entry.
const NEAREST_TABLE: [(AspectRatio, f64); 10] = [
    (AspectRatio::Square, 1.0),
    (AspectRatio::LargeFormat, 1.25),
    (AspectRatio::Standard, 1.333),
    (AspectRatio::Photo, 1.5),
    (AspectRatio::Landscape, 1.778),
    (AspectRatio::Ultrawide, 2.333),
    (AspectRatio::LargeFormatPortrait, 0.8),
    (AspectRatio::StandardPortrait, 0.75),
    (AspectRatio::PhotoPortrait, 0.667),
    (AspectRatio::Portrait, 0.5625),
];

impl AspectRatio {
    /// Every option, in UI order.
    pub const ALL: [AspectRatio; 11] = [
        Self::Auto,
        Self::Square,
        Self::Landscape,
        Self::Portrait,
        Self::Standard,
        Self::StandardPortrait,
        Self::Photo,
        Self::PhotoPortrait,
        Self::Ultrawide,
        Self::LargeFormat,
        Self::LargeFormatPortrait,
    ];

    /// Returns the aspect ratio as a string (e.g., "16:9").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Standard => "4:3",
            Self::StandardPortrait => "3:4",
            Self::Photo => "3:2",
            Self::PhotoPortrait => "2:3",
            Self::Ultrawide => "21:9",
            Self::LargeFormat => "5:4",
            Self::LargeFormatPortrait => "4:5",
        }
    }

    /// Returns the named ratio closest to `width / height`.
    ///
    /// Degenerate dimensions fall back to 1:1.
    pub fn nearest(width: usize, height: usize) -> Self {
        if width == 0 || height == 0 {
            return Self::Square;
        }

        let actual = width as f64 / height as f64;
        let mut closest = Self::Square;
        let mut min_difference = f64::INFINITY;
        for (ratio, value) in NEAREST_TABLE {
            let difference = (actual - value).abs();
            if difference < min_difference {
                min_difference = difference;
                closest = ratio;
            }
        }
        closest
    }

    /// Resolves `Auto` against optional `(width, height)` reference dimensions.
    pub fn resolve(self, reference: Option<(usize, usize)>) -> Self {
        match (self, reference) {
            (Self::Auto, Some((width, height))) => Self::nearest(width, height),
            (Self::Auto, None) => Self::Square,
            (explicit, _) => explicit,
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| NodeError::InvalidInput(format!("unknown aspect ratio: {s}")))
    }
}

/// Output size class. Each tier carries its own request timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    /// ~1024 px.
    #[serde(rename = "1K")]
    OneK,
    /// ~2048 px.
    #[default]
    #[serde(rename = "2K")]
    TwoK,
    /// ~4096 px.
    #[serde(rename = "4K")]
    FourK,
}

impl Resolution {
    /// Every tier, in UI order.
    pub const ALL: [Resolution; 3] = [Self::OneK, Self::TwoK, Self::FourK];

    /// Returns the wire value (`imageConfig.imageSize`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneK => "1K",
            Self::TwoK => "2K",
            Self::FourK => "4K",
        }
    }

    /// Maximum time to wait for the generation request.
    pub fn timeout(&self) -> Duration {
        match self {
            Self::OneK => Duration::from_secs(180),
            Self::TwoK => Duration::from_secs(300),
            Self::FourK => Duration::from_secs(360),
        }
    }

    /// Typical generation time, for display.
    pub fn estimated_time(&self) -> &'static str {
        match self {
            Self::OneK => "10-30s",
            Self::TwoK => "20-60s",
            Self::FourK => "30-90s",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| NodeError::InvalidInput(format!("unknown resolution: {s}")))
    }
}

/// A reference image already encoded for the wire, with its weighting text.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    /// Natural-language instruction sent just before the image.
    pub instruction: String,
    /// MIME type of `data`.
    pub mime_type: &'static str,
    /// Base64-encoded image bytes.
    pub data: String,
}

/// A request to generate an image.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The text prompt describing the desired image.
    pub prompt: String,
    /// Effective aspect ratio (never `Auto` once resolved by the node).
    pub aspect_ratio: AspectRatio,
    /// Output resolution tier.
    pub resolution: Resolution,
    /// Reference images in priority order.
    pub references: Vec<ReferenceImage>,
}

impl GenerationRequest {
    /// Creates a new request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: AspectRatio::Square,
            resolution: Resolution::default(),
            references: Vec::new(),
        }
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Sets the resolution tier.
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Appends a reference image.
    pub fn with_reference(mut self, reference: ReferenceImage) -> Self {
        self.references.push(reference);
        self
    }
}

/// Metadata about the generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Model used for generation.
    pub model: Option<String>,
    /// Round-trip duration in milliseconds.
    pub duration_ms: Option<u64>,
    /// Finish reason reported by the endpoint.
    pub finish_reason: Option<String>,
}

/// A generated image with its raw bytes and metadata.
#[derive(Debug, Clone)]
#[must_use = "generated image should be decoded or saved"]
pub struct GeneratedImage {
    /// Raw image bytes (already base64-decoded).
    pub data: Vec<u8>,
    /// Image format.
    pub format: ImageFormat,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GeneratedImage {
    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"short"), None);
    }

    #[test]
    fn test_format_from_mime_type() {
        assert_eq!(
            ImageFormat::from_mime_type("image/JPEG"),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::from_mime_type("text/plain"), None);
    }

    #[test]
    fn test_nearest_aspect_ratio() {
        assert_eq!(AspectRatio::nearest(1920, 1080), AspectRatio::Landscape);
        assert_eq!(AspectRatio::nearest(1080, 1920), AspectRatio::Portrait);
        assert_eq!(AspectRatio::nearest(512, 512), AspectRatio::Square);
        assert_eq!(AspectRatio::nearest(3000, 2000), AspectRatio::Photo);
        assert_eq!(AspectRatio::nearest(2560, 1080), AspectRatio::Ultrawide);
        assert_eq!(AspectRatio::nearest(800, 1000), AspectRatio::LargeFormatPortrait);
    }

    #[test]
    fn test_nearest_degenerate_dimensions() {
        assert_eq!(AspectRatio::nearest(0, 100), AspectRatio::Square);
        assert_eq!(AspectRatio::nearest(100, 0), AspectRatio::Square);
    }

    #[test]
    fn test_nearest_tie_prefers_table_order() {
        // 1.125 is equidistant from 1:1 and 5:4.
        assert_eq!(AspectRatio::nearest(1125, 1000), AspectRatio::Square);
    }

    #[test]
    fn test_resolve_auto() {
        assert_eq!(AspectRatio::Auto.resolve(None), AspectRatio::Square);
        assert_eq!(
            AspectRatio::Auto.resolve(Some((1920, 1080))),
            AspectRatio::Landscape
        );
        assert_eq!(
            AspectRatio::Portrait.resolve(Some((1920, 1080))),
            AspectRatio::Portrait
        );
    }

    #[test]
    fn test_aspect_ratio_string_round_trip() {
        for ratio in AspectRatio::ALL {
            assert_eq!(ratio.as_str().parse::<AspectRatio>().unwrap(), ratio);
        }
        assert!("7:3".parse::<AspectRatio>().is_err());
        assert_eq!(
            serde_json::to_string(&AspectRatio::Ultrawide).unwrap(),
            "\"21:9\""
        );
    }

    #[test]
    fn test_resolution_timeouts() {
        assert_eq!(Resolution::OneK.timeout(), Duration::from_secs(180));
        assert_eq!(Resolution::TwoK.timeout(), Duration::from_secs(300));
        assert_eq!(Resolution::FourK.timeout(), Duration::from_secs(360));
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!("4k".parse::<Resolution>().unwrap(), Resolution::FourK);
        assert_eq!(Resolution::default(), Resolution::TwoK);
        assert!("8K".parse::<Resolution>().is_err());
    }
}
