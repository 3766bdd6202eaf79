use image::{imageops, imageops::FilterType, GenericImageView, Pixel};
use ndarray::prelude::*;
use nshare::AsNdarray3;

use crate::{
    errors::{Result, SegError},
    mask::BinaryMask,
    traits::SegmentationModel,
};

/// 推論前に画像の縦横両方へ掛ける縮小率
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactor(f32);

/// 同梱のPSPNet重みを学習した際の入力縮小率。モデルは学習時と同じ縮小率でしか
/// 正しくセグメンテーションできない。
pub const TRAINING_SCALE_FACTOR: ScaleFactor = ScaleFactor(0.5);

impl ScaleFactor {
    pub fn new(value: f32) -> Result<Self> {
        if value > 0.0 && value <= 1.0 {
            Ok(Self(value))
        } else {
            Err(SegError::validation(
                "scale_factor",
                format!("must be in (0, 1], got {value}"),
            ))
        }
    }

    /// 縮小後の `(width, height)`
    ///
    /// OpenCVの `fx`/`fy` 指定と同じく最近接偶数への丸め（`cvRound`）を使う。
    /// どちらかの辺が0になる場合はエラー。
    pub fn scaled_dimensions(self, width: u32, height: u32) -> Result<(u32, u32)> {
        let scale = |v: u32| (f64::from(v) * f64::from(self.0)).round_ties_even() as u32;
        let (scaled_width, scaled_height) = (scale(width), scale(height));
        if scaled_width == 0 || scaled_height == 0 {
            return Err(SegError::validation(
                "scale_factor",
                format!(
                    "{} collapses {width}x{height} to {scaled_width}x{scaled_height}",
                    self.0
                ),
            ));
        }
        Ok((scaled_width, scaled_height))
    }
}

impl Default for ScaleFactor {
    fn default() -> Self {
        TRAINING_SCALE_FACTOR
    }
}

/// 1枚の画像を元の解像度の二値マスクに変換
///
/// バイキュービックで縮小し [0, 1] に正規化、`(1, C, h, w)` に並べ替えて `model` に渡す。
/// 1チャネルの出力を元のサイズへ戻し、`threshold` より厳密に大きい画素を前景とする。
pub fn predict<M, I, P>(
    model: &M,
    image: &I,
    scale_factor: ScaleFactor,
    threshold: f32,
) -> Result<BinaryMask>
where
    M: SegmentationModel + ?Sized,
    I: GenericImageView<Pixel = P>,
    P: Pixel<Subpixel = u8> + 'static,
{
    let (width, height) = image.dimensions();
    let tensor = preprocess(image, scale_factor)?;
    let output = model.predict(tensor.view())?;
    let proba = probability_map(output)?;
    let proba = resize_bilinear(proba.view(), height as usize, width as usize);
    Ok(BinaryMask::from_threshold(proba.view(), threshold))
}

/// `image` を縮小・正規化して `(1, C, h, w)` のテンソルにする
pub fn preprocess<I, P>(image: &I, scale_factor: ScaleFactor) -> Result<Array4<f32>>
where
    I: GenericImageView<Pixel = P>,
    P: Pixel<Subpixel = u8> + 'static,
{
    let (width, height) = image.dimensions();
    let (scaled_width, scaled_height) = scale_factor.scaled_dimensions(width, height)?;
    // imageクレートのバイキュービックはCatmullRom
    let scaled = imageops::resize(image, scaled_width, scaled_height, FilterType::CatmullRom);

    let tensor = scaled
        .as_ndarray3()
        .mapv(|v| f32::from(v) / 255.0)
        .insert_axis(Axis(0));
    Ok(tensor)
}

/// `(1, 1, h, w)` のモデル出力を2次元の確率マップに展開
pub fn probability_map(output: Array4<f32>) -> Result<Array2<f32>> {
    let (batch, channels, height, width) = output.dim();
    if batch != 1 || channels != 1 || height == 0 || width == 0 {
        return Err(SegError::validation(
            "model output",
            format!("expected shape (1, 1, h, w), got {:?}", output.shape()),
        ));
    }
    Ok(output
        .index_axis_move(Axis(0), 0)
        .index_axis_move(Axis(0), 0))
}

/// 画素中心基準のバイリニア補間によるリサイズ
///
/// 出力は入力値の凸結合で、[0, 1] へのクランプは行わない。
pub fn resize_bilinear(map: ArrayView2<f32>, height: usize, width: usize) -> Array2<f32> {
    let (in_height, in_width) = map.dim();
    if in_height == 0 || in_width == 0 {
        return Array2::zeros((height, width));
    }

    let rows = sample_positions(in_height, height);
    let cols = sample_positions(in_width, width);

    Array2::from_shape_fn((height, width), |(y, x)| {
        let (y0, y1, wy) = rows[y];
        let (x0, x1, wx) = cols[x];
        let top = lerp(map[[y0, x0]], map[[y0, x1]], wx);
        let bottom = lerp(map[[y1, x0]], map[[y1, x1]], wx);
        lerp(top, bottom, wy)
    })
}

fn sample_positions(in_len: usize, out_len: usize) -> Vec<(usize, usize, f32)> {
    let scale = in_len as f32 / out_len as f32;
    (0..out_len)
        .map(|o| {
            let src = ((o as f32 + 0.5) * scale - 0.5).max(0.0);
            let i0 = (src.floor() as usize).min(in_len - 1);
            let i1 = (i0 + 1).min(in_len - 1);
            (i0, i1, src - i0 as f32)
        })
        .collect()
}

// a + (b - a) * t なら隣接値が等しいとき結果も完全に一致する
#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
