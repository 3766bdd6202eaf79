use crate::errors::Result;
use crate::traits::{JobStatus, SegmentationModel, StatusReporter};
use ndarray::prelude::*;
use parking_lot::Mutex;

/// テスト用のモックモデル：全画素に同じ確率を返す
#[derive(Debug, Clone, Copy)]
pub struct ConstantModel {
    pub value: f32,
}

impl ConstantModel {
    pub const fn new(value: f32) -> Self {
        Self { value }
    }
}

impl SegmentationModel for ConstantModel {
    fn predict(&self, tensor: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (batch, _, height, width) = tensor.dim();
        Ok(Array4::from_elem((batch, 1, height, width), self.value))
    }
}

/// テスト用のモックモデル：チャネル平均をそのまま確率とみなす
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanIntensityModel;

impl SegmentationModel for MeanIntensityModel {
    fn predict(&self, tensor: ArrayView4<f32>) -> Result<Array4<f32>> {
        Ok(tensor.mean_axis(Axis(1)).map_or_else(
            || {
                let (batch, _, height, width) = tensor.dim();
                Array4::zeros((batch, 1, height, width))
            },
            |mean| mean.insert_axis(Axis(1)),
        ))
    }
}

/// [`RecordingReporter`] が記録した更新
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: Option<JobStatus>,
    pub progress: i32,
    pub status_comment: String,
}

/// テスト用のレポーター：受け取った更新を順に記録する
#[derive(Debug, Default)]
pub struct RecordingReporter {
    updates: Mutex<Vec<StatusUpdate>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates.lock().clone()
    }

    pub fn progress_values(&self) -> Vec<i32> {
        self.updates.lock().iter().map(|u| u.progress).collect()
    }

    pub fn last_status(&self) -> Option<JobStatus> {
        self.updates.lock().iter().rev().find_map(|u| u.status)
    }
}

impl StatusReporter for RecordingReporter {
    fn update(&self, progress: i32, status_comment: &str) {
        self.updates.lock().push(StatusUpdate {
            status: None,
            progress,
            status_comment: status_comment.to_string(),
        });
    }

    fn set_status(&self, status: JobStatus, progress: i32, status_comment: &str) {
        self.updates.lock().push(StatusUpdate {
            status: Some(status),
            progress,
            status_comment: status_comment.to_string(),
        });
    }
}
