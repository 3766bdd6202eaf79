use std::path::Path;

use image::{GrayImage, ImageFormat, Luma};
use ndarray::prelude::*;

use crate::errors::{Result, SegError};

/// 元画像と同じ解像度の前景・背景マスク
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    pixels: Array2<bool>,
}

impl BinaryMask {
    pub const fn new(pixels: Array2<bool>) -> Self {
        Self { pixels }
    }

    /// `proba > threshold` の画素を前景とする（閾値と等しい画素は背景）
    pub fn from_threshold(proba: ArrayView2<f32>, threshold: f32) -> Self {
        Self::new(proba.mapv(|p| p > threshold))
    }

    /// `(height, width)` の順
    pub fn shape(&self) -> (usize, usize) {
        self.pixels.dim()
    }

    pub fn view(&self) -> ArrayView2<'_, bool> {
        self.pixels.view()
    }

    pub fn foreground_count(&self) -> usize {
        self.pixels.iter().filter(|&&p| p).count()
    }

    /// 背景を0、前景を `foreground_value` とした1チャネル8bit画像
    pub fn to_luma8(&self, foreground_value: u8) -> GrayImage {
        let (height, width) = self.shape();
        GrayImage::from_fn(width as u32, height as u32, |x, y| {
            if self.pixels[[y as usize, x as usize]] {
                Luma([foreground_value])
            } else {
                Luma([0])
            }
        })
    }

    pub fn save(&self, path: &Path, format: ImageFormat, foreground_value: u8) -> Result<()> {
        self.to_luma8(foreground_value)
            .save_with_format(path, format)
            .map_err(|e| SegError::ImageProcessing {
                path: path.display().to_string(),
                operation: "マスク保存".to_string(),
                source: Box::new(e),
            })
    }
}
