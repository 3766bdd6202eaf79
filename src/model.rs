use std::path::Path;

use ndarray::prelude::*;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    errors::{Result, SegError},
    traits::SegmentationModel,
};

/// ONNX形式のセグメンテーションネットワーク（CPUで推論）
pub struct OnnxModel {
    session: Mutex<Session>,
    input_channels: Option<usize>,
}

impl OnnxModel {
    /// `model_path` のネットワークを読み込む
    ///
    /// グラフは `(N, C, H, W)` の浮動小数点入力を1つ受け取り、
    /// `(N, 1, H', W')` の確率マップを1つ出力しなければならない。
    pub fn load(model_path: &Path) -> Result<Self> {
        if !model_path.is_file() {
            return Err(SegError::Model {
                operation: format!("モデルファイル確認: {}", model_path.display()),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "モデルファイルが存在しません",
                )),
            });
        }

        let session = Session::builder()
            .map_err(|e| SegError::Model {
                operation: "セッションビルダー初期化".to_string(),
                source: Box::new(e),
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| SegError::Model {
                operation: "最適化レベル設定".to_string(),
                source: Box::new(e),
            })?
            .with_memory_pattern(true)
            .map_err(|e| SegError::Model {
                operation: "メモリパターン設定".to_string(),
                source: Box::new(e),
            })?
            .commit_from_file(model_path)
            .map_err(|e| SegError::Model {
                operation: format!("モデルファイル読み込み: {}", model_path.display()),
                source: Box::new(e),
            })?;

        if session.inputs.len() != 1 || session.outputs.len() != 1 {
            return Err(SegError::validation(
                "model",
                format!(
                    "must have exactly one input and one output, found {} and {}",
                    session.inputs.len(),
                    session.outputs.len()
                ),
            ));
        }

        // 動的な軸は -1 になる
        let input_channels = session.inputs[0]
            .input_type
            .tensor_shape()
            .and_then(|shape| shape.get(1).copied())
            .filter(|&c| c > 0)
            .map(|c| c as usize);

        info!(
            path = %model_path.display(),
            input = %session.inputs[0].name,
            output = %session.outputs[0].name,
            "model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_channels,
        })
    }
}

impl SegmentationModel for OnnxModel {
    fn predict(&self, tensor: ArrayView4<f32>) -> Result<Array4<f32>> {
        if let Some(expected) = self.input_channels {
            let channels = tensor.dim().1;
            if channels != expected {
                return Err(SegError::validation(
                    "input tensor",
                    format!("has {channels} channels, model expects {expected}"),
                ));
            }
        }

        debug!(shape = ?tensor.shape(), "running inference");
        let mut binding = self.session.lock();
        let outputs =
            binding.run(ort::inputs![TensorRef::from_array_view(&tensor.as_standard_layout())?])?;
        Ok(outputs[0]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix4>()?
            .to_owned())
    }
}
