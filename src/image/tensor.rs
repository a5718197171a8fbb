//! Normalized RGB image batches as exchanged with the host.

use crate::error::{NodeError, Result};
use ::image::RgbImage;

/// Channels per pixel. Tensors are always RGB.
pub const CHANNELS: usize = 3;

/// A batch of RGB images stored as `(batch, height, width, 3)` `f32` values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    batch: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl ImageTensor {
    /// Wraps a row-major buffer, checking that its length matches the shape.
    pub fn new(batch: usize, height: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        let expected = batch * height * width * CHANNELS;
        if data.len() != expected {
            return Err(NodeError::InvalidInput(format!(
                "tensor buffer has {} values, shape ({batch}, {height}, {width}, {CHANNELS}) needs {expected}",
                data.len()
            )));
        }
        Ok(Self {
            batch,
            height,
            width,
            data,
        })
    }

    /// Creates a batch where every channel of every pixel equals `value`.
    pub fn filled(batch: usize, height: usize, width: usize, value: f32) -> Self {
        Self {
            batch,
            height,
            width,
            data: vec![value; batch * height * width * CHANNELS],
        }
    }

    /// Returns `(batch, height, width, channels)`.
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (self.batch, self.height, self.width, CHANNELS)
    }

    /// Number of images in the batch.
    pub fn batch_size(&self) -> usize {
        self.batch
    }

    /// Height of every image in the batch.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Width of every image in the batch.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns true if the batch holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw row-major values.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    fn frame_len(&self) -> usize {
        self.height * self.width * CHANNELS
    }

    /// Returns the RGB values of one pixel.
    pub fn pixel(&self, index: usize, y: usize, x: usize) -> Option<[f32; 3]> {
        if index >= self.batch || y >= self.height || x >= self.width {
            return None;
        }
        let offset = index * self.frame_len() + (y * self.width + x) * CHANNELS;
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ])
    }

    /// Extracts image `index` as a batch of one.
    pub fn frame(&self, index: usize) -> Option<ImageTensor> {
        if index >= self.batch {
            return None;
        }
        let len = self.frame_len();
        Some(Self {
            batch: 1,
            height: self.height,
            width: self.width,
            data: self.data[index * len..(index + 1) * len].to_vec(),
        })
    }

    /// Converts image `index` to 8-bit RGB. Values are clamped to `[0, 1]`
    /// and truncated after scaling by 255.
    pub fn to_rgb8(&self, index: usize) -> Option<RgbImage> {
        if index >= self.batch {
            return None;
        }
        let len = self.frame_len();
        let bytes = self.data[index * len..(index + 1) * len]
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0) as u8)
            .collect();
        RgbImage::from_raw(self.width as u32, self.height as u32, bytes)
    }

    /// Wraps an 8-bit RGB image as a normalized batch of one.
    pub fn from_rgb8(image: &RgbImage) -> Self {
        Self {
            batch: 1,
            height: image.height() as usize,
            width: image.width() as usize,
            data: image
                .as_raw()
                .iter()
                .map(|&v| f32::from(v) / 255.0)
                .collect(),
        }
    }

    /// Concatenates batches along the batch axis. All inputs must share height and width.
    pub fn stack(tensors: Vec<ImageTensor>) -> Result<Self> {
        let mut iter = tensors.into_iter();
        let mut stacked = iter
            .next()
            .ok_or_else(|| NodeError::InvalidInput("cannot stack an empty list".into()))?;
        for tensor in iter {
            if tensor.height != stacked.height || tensor.width != stacked.width {
                return Err(NodeError::InvalidInput(format!(
                    "batch images must share dimensions: {}x{} vs {}x{}",
                    stacked.width, stacked.height, tensor.width, tensor.height
                )));
            }
            stacked.batch += tensor.batch;
            stacked.data.extend(tensor.data);
        }
        Ok(stacked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_length() {
        assert!(ImageTensor::new(1, 2, 2, vec![0.0; 12]).is_ok());
        let err = ImageTensor::new(1, 2, 2, vec![0.0; 11]).unwrap_err();
        assert!(matches!(err, NodeError::InvalidInput(_)));
    }

    #[test]
    fn test_frame_and_pixel() {
        let mut data = vec![0.0; 12];
        // second image, pixel (0, 1)
        data[6 + 3..6 + 6].copy_from_slice(&[0.1, 0.2, 0.3]);
        let tensor = ImageTensor::new(2, 1, 2, data).unwrap();

        let second = tensor.frame(1).unwrap();
        assert_eq!(second.shape(), (1, 1, 2, 3));
        assert_eq!(second.pixel(0, 0, 1), Some([0.1, 0.2, 0.3]));
        assert!(tensor.frame(2).is_none());
        assert!(tensor.pixel(0, 1, 0).is_none());
    }

    #[test]
    fn test_rgb8_conversion_clamps() {
        let tensor = ImageTensor::new(1, 1, 2, vec![1.0, 0.5, 0.0, 1.5, -0.2, 0.999]).unwrap();
        let rgb = tensor.to_rgb8(0).unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 127, 0]);
        assert_eq!(rgb.get_pixel(1, 0).0, [255, 0, 254]);

        let back = ImageTensor::from_rgb8(&rgb);
        assert_eq!(back.shape(), (1, 1, 2, 3));
        assert!(back.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_stack() {
        let a = ImageTensor::filled(1, 4, 4, 0.0);
        let b = ImageTensor::filled(2, 4, 4, 1.0);
        let stacked = ImageTensor::stack(vec![a, b]).unwrap();
        assert_eq!(stacked.batch_size(), 3);
        assert_eq!(stacked.pixel(2, 3, 3), Some([1.0, 1.0, 1.0]));

        let c = ImageTensor::filled(1, 4, 5, 0.0);
        assert!(ImageTensor::stack(vec![stacked, c]).is_err());
        assert!(ImageTensor::stack(Vec::new()).is_err());
    }
}
