use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{error, info};

use crate::traits::{JobStatus, StatusReporter};

/// ジョブの更新を `tracing` のイベントとして出力
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl StatusReporter for TracingReporter {
    fn update(&self, progress: i32, status_comment: &str) {
        info!(progress, "{status_comment}");
    }

    fn set_status(&self, status: JobStatus, progress: i32, status_comment: &str) {
        match status {
            JobStatus::Failed => error!(status = status.as_str(), progress, "{status_comment}"),
            _ => info!(status = status.as_str(), progress, "{status_comment}"),
        }
    }
}

/// ジョブ進捗（0〜100）をターミナルのプログレスバーで表示
pub struct ProgressBarReporter {
    progress_bar: ProgressBar,
}

impl ProgressBarReporter {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    /// 描画しないプログレスバー（テスト用）
    pub fn hidden() -> Self {
        Self::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let progress_bar = ProgressBar::with_draw_target(Some(100), target);
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
        progress_bar.set_style(style);

        Self { progress_bar }
    }

    pub fn position(&self) -> u64 {
        self.progress_bar.position()
    }

    pub fn message(&self) -> String {
        self.progress_bar.message().to_string()
    }

    pub fn is_finished(&self) -> bool {
        self.progress_bar.is_finished()
    }
}

impl Default for ProgressBarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusReporter for ProgressBarReporter {
    fn update(&self, progress: i32, status_comment: &str) {
        self.progress_bar.set_position(progress.clamp(0, 100) as u64);
        self.progress_bar.set_message(status_comment.to_string());
    }

    fn set_status(&self, status: JobStatus, progress: i32, status_comment: &str) {
        match status {
            JobStatus::Terminated => {
                self.progress_bar.set_position(progress.clamp(0, 100) as u64);
                self.progress_bar
                    .finish_with_message(status_comment.to_string());
            }
            JobStatus::Failed => self
                .progress_bar
                .abandon_with_message(status_comment.to_string()),
            JobStatus::Running => self.update(progress, status_comment),
        }
    }
}
