use clap::Parser;
use image::ImageFormat;
use std::path::PathBuf;

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    pub input_dir: PathBuf,

    #[arg(default_value = "output")]
    pub output_dir: PathBuf,

    #[arg(short, long)]
    pub model_path: PathBuf,

    /// 前景と判定する確率の閾値（この値より大きい画素が前景）
    #[arg(short, long, default_value_t = 0.5)]
    pub threshold: f32,

    #[arg(short, long, default_value = "png", value_parser = check_format)]
    pub format: String,

    /// 出力マスクの前景画素値
    #[arg(long, default_value_t = 1)]
    pub foreground_value: u8,

    /// プログレスバーの代わりにログで進捗を出力
    #[arg(long)]
    pub no_progress: bool,
}

impl Config {
    /// 出力フォーマット（不明な拡張子の場合はPNG）
    pub fn output_format(&self) -> ImageFormat {
        ImageFormat::from_extension(&self.format).unwrap_or(ImageFormat::Png)
    }
}

/// マスクは値を保ったまま保存する必要があるため、書き込み可能な可逆フォーマットのみ許可
fn check_format(s: &str) -> Result<String, String> {
    let supported: Vec<_> = ImageFormat::all()
        .filter(|f| f.writing_enabled() && is_lossless(*f))
        .flat_map(|f| f.extensions_str())
        .map(|s| format!("`{}`", s))
        .collect();
    let supported_message = format!("Supported formats: {}", supported.join(", "));

    let format = ImageFormat::from_extension(s)
        .ok_or(format!("{} is not supported. {}", s, supported_message))?;
    if !format.writing_enabled() || !is_lossless(format) {
        return Err(format!("{} is not supported. {}", s, supported_message));
    }

    Ok(s.to_string())
}

fn is_lossless(format: ImageFormat) -> bool {
    !matches!(format, ImageFormat::Jpeg | ImageFormat::WebP | ImageFormat::Avif)
}
