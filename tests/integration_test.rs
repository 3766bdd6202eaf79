use std::fs;
use std::path::Path;

use image::{GenericImageView, Luma, Rgb, RgbImage};
use tempfile::TempDir;

use pixcla_seg::mocks::{ConstantModel, MeanIntensityModel, RecordingReporter};
use pixcla_seg::{
    collect_image_files, run_job, Config, JobStatus, MaskProcessor, ScaleFactor, SegError,
};

fn test_config(root: &Path) -> Config {
    Config {
        input_dir: root.join("input"),
        output_dir: root.join("output"),
        model_path: root.join("model.onnx"),
        threshold: 0.5,
        format: "png".to_string(),
        foreground_value: 255,
        no_progress: true,
    }
}

/// 黒地の `x0..x1`, `y0..y1` に白い矩形を置いた画像
fn square_image(width: u32, height: u32, (x0, x1): (u32, u32), (y0, y1): (u32, u32)) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

#[test]
fn test_job_writes_native_size_masks() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    fs::create_dir_all(config.input_dir.join("nested")).unwrap();

    square_image(64, 48, (16, 48), (12, 36))
        .save(config.input_dir.join("a.png"))
        .unwrap();
    square_image(31, 17, (0, 31), (0, 17))
        .save(config.input_dir.join("nested/b.png"))
        .unwrap();
    fs::write(config.input_dir.join("notes.txt"), b"not an image").unwrap();

    let output_dir = config.output_dir.clone();
    let reporter = RecordingReporter::new();
    let count = run_job(config, &reporter, |_| Ok(MeanIntensityModel)).unwrap();
    assert_eq!(count, 2);

    let mask_a = image::open(output_dir.join("a.png")).unwrap().into_luma8();
    assert_eq!(mask_a.dimensions(), (64, 48));
    assert_eq!(mask_a.get_pixel(32, 24), &Luma([255]));
    assert_eq!(mask_a.get_pixel(2, 2), &Luma([0]));

    let mask_b = image::open(output_dir.join("nested/b.png")).unwrap();
    assert_eq!(mask_b.dimensions(), (31, 17));
    assert!(mask_b.into_luma8().pixels().all(|p| p.0[0] == 255));
}

#[test]
fn test_job_reports_each_phase() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    fs::create_dir_all(&config.input_dir).unwrap();
    for i in 0..4 {
        RgbImage::new(8, 8)
            .save(config.input_dir.join(format!("{i}.png")))
            .unwrap();
    }

    let reporter = RecordingReporter::new();
    run_job(config, &reporter, |_| Ok(ConstantModel::new(0.0))).unwrap();

    // 準備段階の0と10、20..75で4枚、最後に完了
    assert_eq!(
        reporter.progress_values(),
        vec![0, 10, 20, 33, 47, 61, 100]
    );
    let updates = reporter.updates();
    assert_eq!(updates[0].status, Some(JobStatus::Running));
    assert_eq!(updates[0].status_comment, "Initialisation...");
    assert_eq!(updates[1].status_comment, "Load model...");
    assert_eq!(updates[2].status_comment, "Apply UNet to input images (1/4).");
    assert_eq!(updates[5].status_comment, "Apply UNet to input images (4/4).");
    assert_eq!(reporter.last_status(), Some(JobStatus::Terminated));
}

#[test]
fn test_model_load_failure_aborts_before_processing() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    fs::create_dir_all(&config.input_dir).unwrap();
    RgbImage::new(8, 8)
        .save(config.input_dir.join("a.png"))
        .unwrap();
    let output_dir = config.output_dir.clone();

    let reporter = RecordingReporter::new();
    let result = run_job(config, &reporter, |path| {
        Err::<ConstantModel, _>(SegError::Model {
            operation: format!("load {}", path.display()),
            source: "corrupt weights".into(),
        })
    });

    assert!(matches!(result, Err(SegError::Model { .. })));
    assert!(!output_dir.join("a.png").exists());
    let last = reporter.updates().pop().unwrap();
    assert_eq!(last.status, Some(JobStatus::Failed));
    assert_eq!(last.progress, 10);
}

#[test]
fn test_unreadable_image_aborts_remaining_batch() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    fs::create_dir_all(&config.input_dir).unwrap();
    RgbImage::new(8, 8)
        .save(config.input_dir.join("a.png"))
        .unwrap();
    fs::write(config.input_dir.join("b.png"), b"truncated").unwrap();
    RgbImage::new(8, 8)
        .save(config.input_dir.join("c.png"))
        .unwrap();
    let output_dir = config.output_dir.clone();

    let reporter = RecordingReporter::new();
    let result = run_job(config, &reporter, |_| Ok(ConstantModel::new(1.0)));

    assert!(matches!(result, Err(SegError::ImageProcessing { .. })));
    assert!(output_dir.join("a.png").exists());
    assert!(!output_dir.join("c.png").exists());
    assert_eq!(reporter.last_status(), Some(JobStatus::Failed));
}

#[test]
fn test_missing_input_dir_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());

    let reporter = RecordingReporter::new();
    let result = run_job(config, &reporter, |_| Ok(ConstantModel::new(1.0)));

    assert!(matches!(result, Err(SegError::FileSystem { .. })));
    assert_eq!(reporter.progress_values(), vec![0, 0]);
    assert_eq!(reporter.last_status(), Some(JobStatus::Failed));
}

#[test]
fn test_processor_with_custom_scale() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(temp_dir.path());
    config.format = "tiff".to_string();
    config.foreground_value = 1;
    fs::create_dir_all(&config.input_dir).unwrap();
    let input = config.input_dir.join("scan.png");
    RgbImage::from_pixel(45, 29, Rgb([250, 250, 250]))
        .save(&input)
        .unwrap();

    let processor = MaskProcessor::new(MeanIntensityModel, config)
        .with_scale_factor(ScaleFactor::new(0.2).unwrap());
    let written = processor.process_single_image(&input).unwrap();

    assert_eq!(written.extension().unwrap(), "tiff");
    let mask = image::open(&written).unwrap().into_luma8();
    assert_eq!(mask.dimensions(), (45, 29));
    assert!(mask.pixels().all(|p| p.0[0] == 1));
}

#[test]
fn test_collect_image_files_is_sorted() {
    let temp_dir = TempDir::new().unwrap();
    let input_dir = temp_dir.path();
    for name in ["c.png", "a.png", "b.jpg", "readme.md"] {
        fs::write(input_dir.join(name), b"").unwrap();
    }

    let files = collect_image_files(input_dir).unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["a.png", "b.jpg", "c.png"]);
}

#[test]
fn test_inputs_sharing_a_stem_get_distinct_masks() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    fs::create_dir_all(&config.input_dir).unwrap();
    square_image(12, 10, (0, 12), (0, 10))
        .save(config.input_dir.join("img.png"))
        .unwrap();
    RgbImage::new(9, 7)
        .save(config.input_dir.join("img.tif"))
        .unwrap();

    let output_dir = config.output_dir.clone();
    let reporter = RecordingReporter::new();
    let count = run_job(config, &reporter, |_| Ok(MeanIntensityModel)).unwrap();
    assert_eq!(count, 2);

    let from_png = image::open(output_dir.join("img.png")).unwrap();
    assert_eq!(from_png.dimensions(), (12, 10));
    assert!(from_png.into_luma8().pixels().all(|p| p.0[0] == 255));

    let from_tif = image::open(output_dir.join("img.tif.png")).unwrap();
    assert_eq!(from_tif.dimensions(), (9, 7));
    assert!(from_tif.into_luma8().pixels().all(|p| p.0[0] == 0));
}

#[test]
fn test_colliding_output_names_fail_before_any_mask_is_written() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    fs::create_dir_all(&config.input_dir).unwrap();
    RgbImage::new(8, 8)
        .save(config.input_dir.join("a.tif"))
        .unwrap();
    RgbImage::new(8, 8)
        .save(config.input_dir.join("a.tif.png"))
        .unwrap();

    let output_dir = config.output_dir.clone();
    let reporter = RecordingReporter::new();
    let result = run_job(config, &reporter, |_| Ok(ConstantModel::new(1.0)));

    assert!(matches!(result, Err(SegError::FileSystem { .. })));
    assert_eq!(reporter.last_status(), Some(JobStatus::Failed));
    assert_eq!(reporter.progress_values().last(), Some(&20));
    assert!(!output_dir.exists());
}
