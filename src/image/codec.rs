//! Conversion between image tensors and inline base64 image data.

use crate::error::{NodeError, Result};
use crate::image::tensor::ImageTensor;
use crate::image::types::ImageFormat;
use ::image::codecs::jpeg::JpegEncoder;
use ::image::imageops::FilterType;
use base64::Engine;

/// Settings for encoding reference images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Longest allowed edge; larger images are downscaled to fit.
    pub max_edge: u32,
    /// JPEG quality (1-100).
    pub jpeg_quality: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            max_edge: 1024,
            jpeg_quality: 90,
        }
    }
}

/// A reference image ready to be inlined into a request.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// Base64-encoded JPEG bytes.
    pub data: String,
    /// Dimensions before any downscaling.
    pub original_size: (u32, u32),
    /// Dimensions of the encoded image.
    pub size: (u32, u32),
    /// Encoded JPEG size in bytes.
    pub byte_len: usize,
}

impl EncodedImage {
    /// MIME type of the encoded payload.
    pub fn mime_type(&self) -> &'static str {
        ImageFormat::Jpeg.mime_type()
    }

    /// Returns true if the image was downscaled.
    pub fn was_resized(&self) -> bool {
        self.original_size != self.size
    }
}

/// Returns the target size when `(width, height)` exceeds `max_edge`.
fn fit_within(width: u32, height: u32, max_edge: u32) -> Option<(u32, u32)> {
    if width <= max_edge && height <= max_edge {
        return None;
    }
    let ratio = f64::min(
        f64::from(max_edge) / f64::from(width),
        f64::from(max_edge) / f64::from(height),
    );
    let new_width = ((f64::from(width) * ratio) as u32).max(1);
    let new_height = ((f64::from(height) * ratio) as u32).max(1);
    Some((new_width, new_height))
}

/// Encodes the first image of `tensor` as base64 JPEG, downscaling oversized images.
pub fn encode_jpeg_base64(tensor: &ImageTensor, options: &EncodeOptions) -> Result<EncodedImage> {
    if tensor.is_empty() {
        return Err(NodeError::Encode("image batch is empty".into()));
    }
    let rgb = tensor
        .to_rgb8(0)
        .ok_or_else(|| NodeError::Encode("image dimensions exceed 32-bit range".into()))?;

    let original_size = rgb.dimensions();
    let rgb = match fit_within(rgb.width(), rgb.height(), options.max_edge) {
        Some((width, height)) => ::image::imageops::resize(&rgb, width, height, FilterType::Lanczos3),
        None => rgb,
    };

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, options.jpeg_quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| NodeError::Encode(e.to_string()))?;

    Ok(EncodedImage {
        data: base64::engine::general_purpose::STANDARD.encode(&buffer),
        original_size,
        size: rgb.dimensions(),
        byte_len: buffer.len(),
    })
}

/// Decodes a base64 string that may be imperfectly formatted.
///
/// Accepts a `data:...;base64,` prefix, embedded whitespace and missing padding.
pub fn decode_base64_lenient(input: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let b64 = match input.find(";base64,") {
        Some(pos) => &input[pos + 8..],
        None => input,
    };

    let cleaned: String = b64.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }

    base64::engine::general_purpose::STANDARD_NO_PAD.decode(&cleaned)
}

/// Decodes raw image bytes into a normalized RGB batch of one.
pub fn decode_image_bytes(bytes: &[u8]) -> Result<ImageTensor> {
    let decoded =
        ::image::load_from_memory(bytes).map_err(|e| NodeError::Decode(e.to_string()))?;
    Ok(ImageTensor::from_rgb8(&decoded.to_rgb8()))
}

/// Decodes base64 image data into a normalized RGB batch of one.
pub fn decode_base64_image(input: &str) -> Result<ImageTensor> {
    let bytes = decode_base64_lenient(input).map_err(|e| NodeError::Decode(e.to_string()))?;
    decode_image_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{DynamicImage, GrayImage, Luma};
    use std::io::Cursor;

    fn gradient(height: usize, width: usize) -> ImageTensor {
        let mut data = Vec::with_capacity(height * width * 3);
        for y in 0..height {
            for x in 0..width {
                data.push(x as f32 / width as f32);
                data.push(y as f32 / height as f32);
                data.push(0.5);
            }
        }
        ImageTensor::new(1, height, width, data).unwrap()
    }

    #[test]
    fn test_fit_within() {
        assert_eq!(fit_within(800, 600, 1024), None);
        assert_eq!(fit_within(1024, 1024, 1024), None);
        assert_eq!(fit_within(2048, 1024, 1024), Some((1024, 512)));
        assert_eq!(fit_within(1080, 1920, 1024), Some((576, 1024)));
        assert_eq!(fit_within(5000, 2, 1024), Some((1024, 1)));
    }

    #[test]
    fn test_encode_small_image_keeps_size() {
        let encoded = encode_jpeg_base64(&gradient(48, 64), &EncodeOptions::default()).unwrap();
        assert_eq!(encoded.size, (64, 48));
        assert!(!encoded.was_resized());
        assert_eq!(encoded.mime_type(), "image/jpeg");

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&encoded.data)
            .unwrap();
        assert_eq!(bytes.len(), encoded.byte_len);
        assert_eq!(ImageFormat::from_magic_bytes(&bytes), Some(ImageFormat::Jpeg));
    }

    #[test]
    fn test_encode_uses_first_frame_only() {
        let batch = ImageTensor::stack(vec![gradient(16, 32), gradient(16, 32)]).unwrap();
        let encoded = encode_jpeg_base64(&batch, &EncodeOptions::default()).unwrap();
        let decoded = decode_base64_image(&encoded.data).unwrap();
        assert_eq!(decoded.batch_size(), 1);
    }

    #[test]
    fn test_round_trip_preserves_aspect_and_range() {
        let options = EncodeOptions {
            max_edge: 128,
            jpeg_quality: 90,
        };
        let encoded = encode_jpeg_base64(&gradient(180, 320), &options).unwrap();
        assert!(encoded.was_resized());
        assert_eq!(encoded.original_size, (320, 180));

        let decoded = decode_base64_image(&encoded.data).unwrap();
        let (batch, height, width, channels) = decoded.shape();
        assert_eq!((batch, channels), (1, 3));
        assert_eq!(width, 128);
        let aspect = width as f64 / height as f64;
        assert!((aspect - 320.0 / 180.0).abs() < 0.02, "aspect {aspect}");
        assert!(decoded.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_encode_empty_tensor_fails() {
        let empty = ImageTensor::filled(0, 0, 0, 0.0);
        let err = encode_jpeg_base64(&empty, &EncodeOptions::default()).unwrap_err();
        assert!(matches!(err, NodeError::Encode(_)));
    }

    #[test]
    fn test_decode_grayscale_png_to_rgb() {
        let gray = GrayImage::from_pixel(5, 3, Luma([51]));
        let mut png = Vec::new();
        DynamicImage::ImageLuma8(gray)
            .write_to(&mut Cursor::new(&mut png), ::image::ImageFormat::Png)
            .unwrap();

        let b64 = base64::engine::general_purpose::STANDARD.encode(&png);
        let decoded = decode_base64_image(&b64).unwrap();
        assert_eq!(decoded.shape(), (1, 3, 5, 3));
        let [r, g, b] = decoded.pixel(0, 1, 1).unwrap();
        assert!((r - 0.2).abs() < 1e-6 && r == g && g == b);
    }

    #[test]
    fn test_decode_lenient_input() {
        let gray = GrayImage::from_pixel(2, 2, Luma([0]));
        let mut png = Vec::new();
        DynamicImage::ImageLuma8(gray)
            .write_to(&mut Cursor::new(&mut png), ::image::ImageFormat::Png)
            .unwrap();

        let b64 = base64::engine::general_purpose::STANDARD_NO_PAD.encode(&png);
        let wrapped = format!("data:image/png;base64,{}\n{}", &b64[..10], &b64[10..]);
        assert!(decode_base64_image(&wrapped).is_ok());
    }

    #[test]
    fn test_decode_malformed_input() {
        assert!(matches!(
            decode_base64_image("not base64!!"),
            Err(NodeError::Decode(_))
        ));
        let not_an_image = base64::engine::general_purpose::STANDARD.encode(b"hello world, not pixels");
        assert!(matches!(
            decode_base64_image(&not_an_image),
            Err(NodeError::Decode(_))
        ));
    }
}
