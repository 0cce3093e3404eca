// THEORY:
// The background model is an exponentially weighted running average of all frames
// seen so far. Slow changes (lighting drift, the sand settling) are absorbed into
// it; fast, local darkening relative to it is what the burrow mask picks up as
// freshly excavated material.

use crate::error::{BurrowError, Result};
use image::{GrayImage, ImageBuffer, Luma};

pub type BackgroundImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Running-average background of the enclosure.
#[derive(Debug, Clone)]
pub struct BackgroundModel {
    /// Weight of the newest frame, in `(0, 1]`.
    rate: f32,
    /// `None` until the first frame arrives.
    image: Option<BackgroundImage>,
}

impl BackgroundModel {
    pub fn new(rate: f64) -> Self {
        Self {
            rate: rate as f32,
            image: None,
        }
    }

    /// Folds `frame` into the background and returns the updated image.
    ///
    /// The first frame becomes the background as is; afterwards every pixel moves
    /// towards the frame by `rate * (frame - background)`.
    pub fn update(&mut self, frame: &GrayImage) -> Result<&BackgroundImage> {
        let (width, height) = frame.dimensions();
        let background = self.image.get_or_insert_with(|| {
            ImageBuffer::from_fn(width, height, |x, y| Luma([frame.get_pixel(x, y)[0] as f32]))
        });
        if background.dimensions() != frame.dimensions() {
            return Err(BurrowError::DimensionMismatch {
                expected: background.dimensions(),
                actual: frame.dimensions(),
            });
        }

        let rate = self.rate;
        for (bg, &value) in background.iter_mut().zip(frame.as_raw()) {
            *bg += rate * (value as f32 - *bg);
        }
        Ok(background)
    }

    pub fn image(&self) -> Option<&BackgroundImage> {
        self.image.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.image.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_becomes_background() {
        let mut model = BackgroundModel::new(0.1);
        assert!(!model.is_initialized());
        model.update(&GrayImage::from_pixel(4, 3, Luma([80]))).unwrap();
        let background = model.image().unwrap();
        assert_eq!(background.dimensions(), (4, 3));
        assert!(background.pixels().all(|p| p[0] == 80.0));
    }

    #[test]
    fn later_frames_are_blended_in() {
        let mut model = BackgroundModel::new(0.25);
        model.update(&GrayImage::from_pixel(2, 2, Luma([100]))).unwrap();
        model.update(&GrayImage::from_pixel(2, 2, Luma([20]))).unwrap();
        assert!((model.image().unwrap().get_pixel(1, 1)[0] - 80.0).abs() < 1e-4);
        let background = model.update(&GrayImage::from_pixel(2, 2, Luma([20]))).unwrap();
        assert!((background.get_pixel(0, 0)[0] - 65.0).abs() < 1e-4);
    }

    #[test]
    fn frame_size_must_not_change() {
        let mut model = BackgroundModel::new(0.1);
        model.update(&GrayImage::new(4, 4)).unwrap();
        assert!(matches!(
            model.update(&GrayImage::new(5, 4)),
            Err(BurrowError::DimensionMismatch { .. })
        ));
    }
}
