use std::path::PathBuf;
use thiserror::Error;

/// セグメンテーション処理のエラー型
///
/// 各バリアントは失敗した処理（ファイルシステム、画像の読み書き、モデルの読み込み・推論、
/// パラメータ検証）の文脈を保持し、呼び出し側やジョブレポーターが文字列を解析せずに
/// 内容を把握できるようにする。
#[derive(Error, Debug)]
pub enum SegError {
    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {operation} failed (file: {path})")]
    ImageProcessing {
        path: String,
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SegError>;

impl SegError {
    pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// I/Oエラーをファイルシステムエラーに変換
///
/// パスと操作が分かる箇所では `SegError::FileSystem` を直接組み立てること。
/// これは `?` 用のフォールバック。
impl From<std::io::Error> for SegError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

/// imageクレートのエラーを画像処理エラーに変換
impl From<image::ImageError> for SegError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

/// ONNX Runtimeのエラーをモデルエラーに変換
impl From<ort::Error> for SegError {
    fn from(err: ort::Error) -> Self {
        Self::Model {
            operation: "ort operation".to_string(),
            source: Box::new(err),
        }
    }
}

/// ndarrayの形状エラーをモデルエラーに変換
///
/// 形状エラーは推論前後のテンソル組み立て・展開でしか発生しないため、
/// モデルエラーとして扱う。
impl From<ndarray::ShapeError> for SegError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Model {
            operation: "tensor shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}
