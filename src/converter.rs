//! 扫描导出 -> COLMAP 稀疏模型
//!
//! 发现 -> 解析 (并行) -> 筛选 -> 位姿转换 (并行) -> 写出。
//! 并行阶段都使用带下标的迭代器，collect 后保持发现顺序。

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;

use crate::camera::PinholeParameters;
use crate::config::{ConvertConfig, RotationPolicy, QUATERNION_NORM_TOLERANCE};
use crate::dataset::{self, DatasetTrait};
use crate::error::{ConvertError, FrameError};
use crate::frame_selector::{FrameSelector, ImageNaming, PaddedIndexNaming};
use crate::global_cast::arkit_to_colmap_pose_with_policy;
use crate::global_types::{FrameRecord, PosedFrame};
use crate::save::{ColmapWriter, ModelSummary};

/// 运行统计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConvertStats {
    pub total_frames: usize,
    pub skipped_stride: usize,
    pub parse_failures: usize,
    pub skipped_quality: usize,
    pub skipped_no_image: usize,
    pub skipped_duplicate_image: usize,
    pub transform_failures: usize,
    /// 写入 images.txt 的帧数
    pub processed_frames: usize,
    pub image_width: u32,
    pub image_height: u32,
    pub quality_threshold: f64,
    pub frame_stride: usize,
    pub images_copied: usize,
    pub images_existing: usize,
}

/// 进度与日志回调，计算部分本身不打印
pub trait ConvertObserver: Sync {
    fn on_discovered(&self, _total: usize) {}
    fn on_frame_skipped(&self, _error: &FrameError) {}
    fn on_pose_warning(&self, _frame: &PosedFrame) {}
    /// 筛选结束后调用，无论之后是否失败
    fn on_summary(&self, _stats: &ConvertStats) {}
    fn on_image_size(&self, _width: u32, _height: u32) {}
    fn on_model_written(&self, _output_dir: &Path, _summary: &ModelSummary) {}
}

/// 不输出任何信息
#[allow(dead_code)]
pub struct NullObserver;

impl ConvertObserver for NullObserver {}

/// 通过 `log` 输出
pub struct LogObserver;

impl ConvertObserver for LogObserver {
    fn on_discovered(&self, total: usize) {
        log::info!("Found {} JSON metadata files", total);
    }

    fn on_frame_skipped(&self, error: &FrameError) {
        log::warn!("Skipping frame: {}", error);
    }

    fn on_pose_warning(&self, frame: &PosedFrame) {
        log::warn!(
            "{}: rotation is not orthonormal, |q| = {:.6}",
            frame.record.source_path.display(),
            frame.pose.rotation.norm()
        );
    }

    fn on_summary(&self, stats: &ConvertStats) {
        log::info!("Filtering results:");
        log::info!("  Passed quality filter: {}", stats.processed_frames);
        log::info!("  Skipped (low quality): {}", stats.skipped_quality);
        log::info!("  Skipped (no image): {}", stats.skipped_no_image);
        if stats.skipped_stride > 0 {
            log::info!("  Skipped (frame stride {}): {}", stats.frame_stride, stats.skipped_stride);
        }
        if stats.skipped_duplicate_image > 0 {
            log::info!("  Skipped (duplicate image name): {}", stats.skipped_duplicate_image);
        }
        if stats.parse_failures > 0 {
            log::info!("  Skipped (unreadable metadata): {}", stats.parse_failures);
        }
        if stats.transform_failures > 0 {
            log::info!("  Skipped (invalid pose): {}", stats.transform_failures);
        }
    }

    fn on_image_size(&self, width: u32, height: u32) {
        log::info!("  Image dimensions: {}x{}", width, height);
    }

    fn on_model_written(&self, output_dir: &Path, summary: &ModelSummary) {
        log::info!(
            "Copied {} images ({} already present)",
            summary.copies.copied,
            summary.copies.existing
        );
        for path in [&summary.cameras_path, &summary.images_path, &summary.points3d_path] {
            log::info!("  Written: {}", path.display());
        }
        log::info!("COLMAP model created at: {}", output_dir.display());
    }
}

pub fn convert(
    config: &ConvertConfig,
    observer: &dyn ConvertObserver,
) -> Result<ConvertStats, ConvertError> {
    convert_with(config, PaddedIndexNaming::default(), observer)
}

/// 指定图像命名方式
pub fn convert_with<N: ImageNaming>(
    config: &ConvertConfig,
    naming: N,
    observer: &dyn ConvertObserver,
) -> Result<ConvertStats, ConvertError> {
    config.validate()?;
    if config.threads == 0 {
        return run(config, naming, observer);
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .map_err(|e| ConvertError::InvalidConfig(e.to_string()))?;
    pool.install(|| run(config, naming, observer))
}

fn run<N: ImageNaming>(
    config: &ConvertConfig,
    naming: N,
    observer: &dyn ConvertObserver,
) -> Result<ConvertStats, ConvertError> {
    let dataset = dataset::DefaultDataset::new(&config.input_dir)?;
    let total = dataset.len();
    observer.on_discovered(total);

    let selector = FrameSelector::with_naming(config.frame_stride, config.quality_threshold, naming);
    let mut stats = ConvertStats {
        total_frames: total,
        quality_threshold: config.quality_threshold,
        frame_stride: selector.stride,
        ..Default::default()
    };

    // 步长之外的文件不读取
    let to_parse: Vec<(usize, &PathBuf)> = selector
        .stride_indices(total)
        .map(|i| (i, &dataset.metadata_files()[i]))
        .collect();
    let parsed: Vec<Result<FrameRecord, FrameError>> = to_parse
        .par_iter()
        .map(|&(index, path)| {
            dataset::read_frame(path, index).map_err(|source| FrameError::Parse {
                path: path.clone(),
                source,
            })
        })
        .collect();

    let mut records = Vec::with_capacity(parsed.len());
    for result in parsed {
        match result {
            Ok(record) => records.push(record),
            Err(err) => {
                stats.parse_failures += 1;
                observer.on_frame_skipped(&err);
            }
        }
    }

    let selection = selector.select(total, records);
    stats.skipped_stride = selection.skipped_stride;
    stats.skipped_quality = selection.skipped_quality;
    stats.skipped_no_image = selection.skipped_no_image;
    stats.skipped_duplicate_image = selection.skipped_duplicate_image;
    for err in &selection.rejected {
        observer.on_frame_skipped(err);
    }

    let policy = config.rotation_policy;
    let posed: Vec<Result<PosedFrame, FrameError>> = selection
        .frames
        .into_par_iter()
        .map(|selected| {
            match arkit_to_colmap_pose_with_policy(&selected.record.pose_camera_to_world, policy) {
                Ok(pose) => Ok(PosedFrame {
                    record: selected.record,
                    image: selected.image,
                    pose,
                }),
                Err(source) => Err(FrameError::Transform {
                    path: selected.record.source_path,
                    source,
                }),
            }
        })
        .collect();

    let mut frames = Vec::with_capacity(posed.len());
    for result in posed {
        match result {
            Ok(frame) => {
                if policy == RotationPolicy::Warn
                    && frame.pose.norm_deviation() > QUATERNION_NORM_TOLERANCE
                {
                    observer.on_pose_warning(&frame);
                }
                frames.push(frame);
            }
            Err(err) => {
                stats.transform_failures += 1;
                observer.on_frame_skipped(&err);
            }
        }
    }
    stats.processed_frames = frames.len();
    observer.on_summary(&stats);

    // 至少需要一帧来确定图像尺寸
    let required = config.min_frames.max(1);
    if frames.len() < required {
        return Err(ConvertError::InsufficientFrames {
            found: frames.len(),
            required,
        });
    }
    let first = &frames[0];

    let (width, height) =
        image::image_dimensions(&first.image.path).map_err(|source| ConvertError::ImageProbe {
            path: first.image.path.clone(),
            source,
        })?;
    stats.image_width = width;
    stats.image_height = height;
    observer.on_image_size(width, height);

    let camera = PinholeParameters::from_intrinsics(
        frames.iter().map(|frame| &frame.record.intrinsics),
        width,
        height,
    )
    .ok_or(ConvertError::InsufficientFrames { found: 0, required })?;

    let output_dir = config.output_dir();
    let writer = ColmapWriter::new(&output_dir);
    let summary = writer.write_model(&camera, &frames)?;
    stats.images_copied = summary.copies.copied;
    stats.images_existing = summary.copies.existing;
    observer.on_model_written(&output_dir, &summary);

    Ok(stats)
}
