pub mod config;
pub mod errors;
pub mod mask;
pub mod model;
pub mod monitor;
pub mod pipeline;
pub mod reporter;
pub mod traits;

pub mod mocks;

use image::ImageFormat;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use walkdir::WalkDir;

pub use config::Config;
pub use errors::{Result, SegError};
pub use mask::BinaryMask;
pub use model::OnnxModel;
pub use monitor::{Monitor, Period};
pub use pipeline::{predict, ScaleFactor, TRAINING_SCALE_FACTOR};
pub use reporter::{ProgressBarReporter, TracingReporter};
pub use traits::*;

/// 推論フェーズ開始時のジョブ進捗
pub const APPLY_PROGRESS_START: i32 = 20;
/// 推論フェーズ終了時のジョブ進捗
pub const APPLY_PROGRESS_END: i32 = 75;
/// 進捗通知の間隔（画像リスト全体に対する割合）
pub const APPLY_REPORT_PERIOD: Period = Period::Fraction(0.05);

pub struct MaskProcessor<M: SegmentationModel> {
    model: M,
    config: Config,
    scale_factor: ScaleFactor,
}

impl<M: SegmentationModel> MaskProcessor<M> {
    pub fn new(model: M, config: Config) -> Self {
        Self {
            model,
            config,
            scale_factor: TRAINING_SCALE_FACTOR,
        }
    }

    /// 別のモデルを学習した際の縮小率を使う
    pub fn with_scale_factor(mut self, scale_factor: ScaleFactor) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// `image_files` の各画像をセグメンテーションし、画像ごとにマスクを1枚書き出す
    ///
    /// 進捗は `APPLY_PROGRESS_START..APPLY_PROGRESS_END` の範囲で通知する。
    /// 出力先が重複する場合は何も書き出さずにエラーを返し、
    /// 処理中の最初の失敗で残りの画像は中断する。
    pub fn process<R>(&self, image_files: &[PathBuf], reporter: &R) -> Result<usize>
    where
        R: StatusReporter + ?Sized,
    {
        let targets = self.plan_outputs(image_files)?;

        let output_path = &self.config.output_dir;
        fs::create_dir_all(output_path).map_err(|e| SegError::FileSystem {
            path: output_path.clone(),
            operation: "ディレクトリ作成".to_string(),
            source: e,
        })?;

        let monitor = Monitor::new(reporter, &targets, APPLY_PROGRESS_START, APPLY_PROGRESS_END)
            .with_period(APPLY_REPORT_PERIOD)
            .with_prefix("Apply UNet to input images");

        for (input_file, output_file) in monitor {
            self.write_mask(input_file, output_file)?;
        }

        info!(count = targets.len(), "all masks written");
        Ok(targets.len())
    }

    /// 1枚の画像をセグメンテーションしてマスクを書き出し、書き出し先を返す
    pub fn process_single_image(&self, input_file: &Path) -> Result<PathBuf> {
        let output_file = self.output_path(input_file)?;
        self.write_mask(input_file, &output_file)?;
        Ok(output_file)
    }

    fn write_mask(&self, input_file: &Path, output_file: &Path) -> Result<()> {
        let img = image::open(input_file)
            .map_err(|e| SegError::ImageProcessing {
                path: input_file.display().to_string(),
                operation: "画像読み込み".to_string(),
                source: Box::new(e),
            })?
            .into_rgb8();

        let mask = predict(
            &self.model,
            &img,
            self.scale_factor,
            self.config.threshold,
        )
        .map_err(|e| SegError::ImageProcessing {
            path: input_file.display().to_string(),
            operation: "画像セグメンテーション".to_string(),
            source: Box::new(e),
        })?;

        if let Some(parent) = output_file.parent() {
            fs::create_dir_all(parent).map_err(|e| SegError::FileSystem {
                path: parent.to_path_buf(),
                operation: "出力ディレクトリ作成".to_string(),
                source: e,
            })?;
        }

        mask.save(
            output_file,
            self.config.output_format(),
            self.config.foreground_value,
        )?;

        debug!(
            input = %input_file.display(),
            output = %output_file.display(),
            foreground = mask.foreground_count(),
            "mask written"
        );
        Ok(())
    }

    /// 全入力の出力先を決め、重複がないことを確認する
    fn plan_outputs(&self, image_files: &[PathBuf]) -> Result<Vec<(PathBuf, PathBuf)>> {
        let mut seen = HashSet::with_capacity(image_files.len());
        image_files
            .iter()
            .map(|input_file| {
                let output_file = self.output_path(input_file)?;
                if !seen.insert(output_file.clone()) {
                    return Err(SegError::FileSystem {
                        path: output_file,
                        operation: "出力パス重複確認".to_string(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::AlreadyExists,
                            format!(
                                "複数の入力が同じ出力ファイルに対応しています: {}",
                                input_file.display()
                            ),
                        ),
                    });
                }
                Ok((input_file.clone(), output_file))
            })
            .collect()
    }

    /// 出力ディレクトリ以下の `input_file` に対応するパス
    ///
    /// 入力が既に出力フォーマットならファイル名をそのまま使い、
    /// そうでなければファイル名全体の後ろに出力フォーマットの拡張子を付ける
    /// （`img.tif` → `img.tif.png`）。
    pub fn output_path(&self, input_file: &Path) -> Result<PathBuf> {
        let relative_path = self.get_relative_path(input_file)?;
        let same_format = ImageFormat::from_path(&relative_path)
            .is_ok_and(|format| format == self.config.output_format());
        if same_format {
            return Ok(self.config.output_dir.join(relative_path));
        }

        let mut file_name = relative_path.into_os_string();
        file_name.push(".");
        file_name.push(&self.config.format);
        Ok(self.config.output_dir.join(file_name))
    }

    pub fn get_relative_path(&self, input_file: &Path) -> Result<PathBuf> {
        let input_dir = &self.config.input_dir;
        input_file
            .strip_prefix(input_dir)
            .map(|p| p.to_path_buf())
            .map_err(|_| SegError::FileSystem {
                path: input_file.to_path_buf(),
                operation: "相対パス取得".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "入力ファイルが入力ディレクトリ内にありません",
                ),
            })
    }
}

/// `input_dir` 以下の読み込み可能な画像ファイル（パス順）
pub fn collect_image_files(input_dir: &Path) -> Result<Vec<PathBuf>> {
    if !input_dir.is_dir() {
        return Err(SegError::FileSystem {
            path: input_dir.to_path_buf(),
            operation: "ディレクトリ存在確認".to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "入力ディレクトリが存在しません",
            ),
        });
    }

    let mut image_files: Vec<_> = WalkDir::new(input_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_supported_image_format(e.path()))
        .map(|e| e.into_path())
        .collect();
    image_files.sort();
    Ok(image_files)
}

pub fn is_supported_image_format(path: &Path) -> bool {
    ImageFormat::from_path(path).is_ok_and(|format| format.reading_enabled())
}

/// 画像の収集、モデル読み込み、全画像のセグメンテーションを行い、各段階を `reporter` に通知する
///
/// 失敗は [`JobStatus::Failed`] として通知してから返す。
pub fn run_job<M, L, R>(config: Config, reporter: &R, load_model: L) -> Result<usize>
where
    M: SegmentationModel,
    L: FnOnce(&Path) -> Result<M>,
    R: StatusReporter + ?Sized,
{
    let mut phase_progress = 0;
    let result = run_phases(config, reporter, load_model, &mut phase_progress);

    match &result {
        Ok(count) => {
            reporter.set_status(JobStatus::Terminated, 100, "Finished.");
            info!(count, "job finished");
        }
        Err(err) => {
            error!(error = %err, "job failed");
            reporter.set_status(JobStatus::Failed, phase_progress, &err.to_string());
        }
    }
    result
}

fn run_phases<M, L, R>(
    config: Config,
    reporter: &R,
    load_model: L,
    phase_progress: &mut i32,
) -> Result<usize>
where
    M: SegmentationModel,
    L: FnOnce(&Path) -> Result<M>,
    R: StatusReporter + ?Sized,
{
    reporter.set_status(JobStatus::Running, 0, "Initialisation...");
    let image_files = collect_image_files(&config.input_dir)?;
    info!(
        count = image_files.len(),
        input = %config.input_dir.display(),
        "input images collected"
    );

    *phase_progress = 10;
    reporter.update(10, "Load model...");
    let model = load_model(&config.model_path)?;

    *phase_progress = APPLY_PROGRESS_START;
    MaskProcessor::new(model, config).process(&image_files, reporter)
}
