//! 帧筛选
//!
//! 固定顺序的三个阶段：步长抽样 -> 质量阈值 -> 图像匹配。
//! 输出保持发现顺序，不做重排。

use std::collections::HashSet;
use std::path::Path;

use crate::config::{DEFAULT_FRAME_STRIDE, DEFAULT_QUALITY_THRESHOLD};
use crate::error::FrameError;
use crate::global_types::{AssociatedImage, FrameRecord, SelectedFrame};

/// 帧号 -> 候选图像文件名，按返回顺序尝试
pub trait ImageNaming: Send + Sync {
    fn candidates(&self, metadata_path: &Path, index: u64) -> Vec<String>;

    /// 帧号：优先取文件名末尾的数字，否则用 JSON 中的 frame_index
    fn frame_number(&self, record: &FrameRecord) -> u64 {
        trailing_number(&record.source_path).unwrap_or(record.capture_index)
    }
}

/// `frame_00012.json` -> 12
pub fn trailing_number(path: &Path) -> Option<u64> {
    path.file_stem()?.to_str()?.rsplit('_').next()?.parse().ok()
}

/// `frame_00012.jpg` 这类按帧号补零的命名
#[derive(Debug, Clone)]
pub struct PaddedIndexNaming {
    pub prefix: String,
    pub extension: String,
    /// 依次尝试的补零宽度
    pub widths: Vec<usize>,
    /// 先尝试与元数据文件同名的图像
    pub try_metadata_stem: bool,
}

impl Default for PaddedIndexNaming {
    fn default() -> Self {
        Self {
            prefix: "frame_".to_string(),
            extension: "jpg".to_string(),
            widths: vec![5, 4, 3],
            try_metadata_stem: true,
        }
    }
}

impl ImageNaming for PaddedIndexNaming {
    fn candidates(&self, metadata_path: &Path, index: u64) -> Vec<String> {
        let mut names = Vec::with_capacity(self.widths.len() + 1);
        if self.try_metadata_stem {
            if let Some(stem) = metadata_path.file_stem().and_then(|s| s.to_str()) {
                names.push(format!("{}.{}", stem, self.extension));
            }
        }
        for &width in &self.widths {
            let name = format!(
                "{}{:0width$}.{}",
                self.prefix,
                index,
                self.extension,
                width = width
            );
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// 筛选结果，只被写出阶段消费一次
#[derive(Debug, Default)]
pub struct SelectionResult {
    pub frames: Vec<SelectedFrame>,
    /// 通过步长抽样、进入后续筛选的帧数
    #[allow(dead_code)]
    pub entered_filtering: usize,
    pub skipped_stride: usize,
    pub skipped_quality: usize,
    pub skipped_no_image: usize,
    /// 图像名与前面的帧重复 (递归查找时不同子目录可能同名)
    pub skipped_duplicate_image: usize,
    /// 图像匹配失败或重名的帧
    pub rejected: Vec<FrameError>,
}

#[derive(Debug, Clone)]
pub struct FrameSelector<N: ImageNaming = PaddedIndexNaming> {
    pub stride: usize,
    pub quality_threshold: f64,
    pub naming: N,
}

impl Default for FrameSelector {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_STRIDE, DEFAULT_QUALITY_THRESHOLD)
    }
}

impl FrameSelector {
    #[allow(dead_code)]
    pub fn new(stride: usize, quality_threshold: f64) -> Self {
        Self::with_naming(stride, quality_threshold, PaddedIndexNaming::default())
    }
}

impl<N: ImageNaming> FrameSelector<N> {
    pub fn with_naming(stride: usize, quality_threshold: f64, naming: N) -> Self {
        Self {
            stride: stride.max(1),
            quality_threshold,
            naming,
        }
    }

    pub fn keeps_stride(&self, discovery_index: usize) -> bool {
        discovery_index % self.stride == 0
    }

    /// 0, N, 2N, ...
    pub fn stride_indices(&self, total: usize) -> impl Iterator<Item = usize> {
        (0..total).step_by(self.stride)
    }

    pub fn passes_quality(&self, record: &FrameRecord) -> bool {
        record.motion_quality >= self.quality_threshold
    }

    /// 在元数据文件所在目录中查找第一个存在的候选图像
    pub fn associate_image(
        &self,
        record: &FrameRecord,
        index: u64,
    ) -> Result<AssociatedImage, FrameError> {
        let dir = record.source_path.parent().unwrap_or_else(|| Path::new(""));
        let tried = self.naming.candidates(&record.source_path, index);
        for name in &tried {
            let path = dir.join(name);
            if path.is_file() {
                return Ok(AssociatedImage {
                    path,
                    name: name.clone(),
                });
            }
        }
        Err(FrameError::NoImage {
            path: record.source_path.clone(),
            tried,
        })
    }

    /// `total_discovered` 为发现的元数据文件总数；`records` 为解析成功的帧，
    /// 可以已按步长预筛选过。
    pub fn select<I>(&self, total_discovered: usize, records: I) -> SelectionResult
    where
        I: IntoIterator<Item = FrameRecord>,
    {
        let entered_filtering = total_discovered.div_ceil(self.stride);
        let mut result = SelectionResult {
            entered_filtering,
            skipped_stride: total_discovered - entered_filtering,
            ..Default::default()
        };
        let mut names = HashSet::new();

        for record in records {
            if !self.keeps_stride(record.discovery_index) {
                continue;
            }
            if !self.passes_quality(&record) {
                log::debug!(
                    "{}: motion quality {:.3} below {:.3}",
                    record.source_path.display(),
                    record.motion_quality,
                    self.quality_threshold
                );
                result.skipped_quality += 1;
                continue;
            }
            match self.associate_image(&record, self.naming.frame_number(&record)) {
                Ok(image) if !names.insert(image.name.clone()) => {
                    result.skipped_duplicate_image += 1;
                    result.rejected.push(FrameError::DuplicateImage {
                        path: record.source_path,
                        name: image.name,
                    });
                }
                Ok(image) => result.frames.push(SelectedFrame { record, image }),
                Err(err) => {
                    result.skipped_no_image += 1;
                    result.rejected.push(err);
                }
            }
        }
        result
    }
}
