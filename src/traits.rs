use crate::errors::Result;
use ndarray::prelude::*;

/// セグメンテーションモデルの抽象化
///
/// 入力は正規化済みのチャネル優先テンソル `(1, C, h, w)`、
/// 出力は前景確率マップ `(1, 1, h, w)`。
pub trait SegmentationModel {
    /// テンソル予測（評価モード、勾配なし）
    fn predict(&self, tensor: ArrayView4<f32>) -> Result<Array4<f32>>;
}

/// ジョブ管理側でのジョブの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Terminated,
    Failed,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Terminated => "terminated",
            Self::Failed => "failed",
        }
    }
}

/// ジョブ進捗の通知先
///
/// 実装はジョブ管理システムへ更新を転送する。繰り返し呼ばれても安全で、
/// 正しい入力に対して失敗してはならない。
pub trait StatusReporter {
    fn update(&self, progress: i32, status_comment: &str);

    /// ジョブの状態を `status` に遷移させる。状態を持たないレポーターは
    /// 進捗の更新だけを受け取る。
    fn set_status(&self, status: JobStatus, progress: i32, status_comment: &str) {
        let _ = status;
        self.update(progress, status_comment);
    }
}

impl<F> StatusReporter for F
where
    F: Fn(i32, &str),
{
    fn update(&self, progress: i32, status_comment: &str) {
        self(progress, status_comment)
    }
}
