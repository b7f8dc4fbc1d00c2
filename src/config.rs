use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::ConvertError;

/// 最低 motionQuality
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.8;
/// 每 N 帧取一帧，1 表示全部
pub const DEFAULT_FRAME_STRIDE: usize = 1;
/// 少于该帧数时重建不可靠，直接失败
pub const MIN_FRAMES: usize = 10;

pub const INTRINSICS_PRECISION: usize = 6;
pub const POSE_PRECISION: usize = 10;
pub const QUATERNION_NORM_TOLERANCE: f64 = 1e-6;

/// 输出目录名后缀
pub const OUTPUT_SUFFIX: &str = "_colmap";

/// 旋转块不是正交矩阵时的处理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    /// 原样输出
    Trust,
    /// 原样输出并打印警告
    #[default]
    Warn,
    /// 丢弃该帧
    Reject,
    /// SVD 正交化后再提取四元数
    Orthonormalize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    /// 扫描导出目录 (frame_*.json + frame_*.jpg)
    pub input_dir: PathBuf,
    /// 默认为输入目录旁的 `<name>_colmap`
    pub output_dir: Option<PathBuf>,
    pub quality_threshold: f64,
    pub frame_stride: usize,
    pub min_frames: usize,
    pub rotation_policy: RotationPolicy,
    /// 线程数，0 使用 rayon 默认值
    pub threads: usize,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::new(),
            output_dir: None,
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            frame_stride: DEFAULT_FRAME_STRIDE,
            min_frames: MIN_FRAMES,
            rotation_policy: RotationPolicy::default(),
            threads: 0,
        }
    }
}

impl ConvertConfig {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            ..Default::default()
        }
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| default_output_dir(&self.input_dir))
    }

    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.frame_stride == 0 {
            return Err(ConvertError::InvalidConfig(
                "frame stride must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.quality_threshold) {
            return Err(ConvertError::InvalidConfig(format!(
                "quality threshold {} is outside [0, 1]",
                self.quality_threshold
            )));
        }
        Ok(())
    }
}

/// `scans/room` -> `scans/room_colmap`
///
/// `.` 和 `..` 之类没有文件名的路径先转成绝对路径。
pub fn default_output_dir(input_dir: &Path) -> PathBuf {
    let with_suffix = |dir: &Path| {
        dir.file_name().map(|name| {
            dir.with_file_name(format!("{}{}", name.to_string_lossy(), OUTPUT_SUFFIX))
        })
    };
    with_suffix(input_dir)
        .or_else(|| fs::canonicalize(input_dir).ok().and_then(|dir| with_suffix(&dir)))
        .unwrap_or_else(|| input_dir.join(OUTPUT_SUFFIX.trim_start_matches('_')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_dir() {
        assert_eq!(
            default_output_dir(Path::new("scans/room")),
            PathBuf::from("scans/room_colmap")
        );
        assert_eq!(
            default_output_dir(Path::new("scans/room/")),
            PathBuf::from("scans/room_colmap")
        );
        let config = ConvertConfig {
            output_dir: Some(PathBuf::from("out")),
            ..ConvertConfig::new("scans/room")
        };
        assert_eq!(config.output_dir(), PathBuf::from("out"));
    }

    #[test]
    fn test_default_output_dir_without_file_name() {
        let root = tempfile::tempdir().unwrap();
        let scan = root.path().join("room");
        std::fs::create_dir_all(scan.join("sub")).unwrap();
        let expected = fs::canonicalize(root.path()).unwrap().join("room_colmap");

        assert_eq!(default_output_dir(&scan.join("sub").join("..")), expected);
        assert_eq!(default_output_dir(&scan.join(".")), root.path().join("room_colmap"));
    }

    #[test]
    fn test_validate() {
        assert!(ConvertConfig::new("scan").validate().is_ok());
        let zero_stride = ConvertConfig {
            frame_stride: 0,
            ..ConvertConfig::new("scan")
        };
        assert!(matches!(zero_stride.validate(), Err(ConvertError::InvalidConfig(_))));
        let bad_threshold = ConvertConfig {
            quality_threshold: 1.5,
            ..ConvertConfig::new("scan")
        };
        assert!(bad_threshold.validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("convert.json");
        std::fs::write(
            &path,
            r#"{ "input_dir": "scan", "frame_stride": 3, "rotation_policy": "orthonormalize" }"#,
        )
        .unwrap();
        let config = ConvertConfig::from_json_file(&path).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("scan"));
        assert_eq!(config.frame_stride, 3);
        assert_eq!(config.rotation_policy, RotationPolicy::Orthonormalize);
        assert_eq!(config.quality_threshold, DEFAULT_QUALITY_THRESHOLD);
        assert_eq!(config.min_frames, MIN_FRAMES);

        std::fs::write(&path, r#"{ "stride": 3 }"#).unwrap();
        assert!(ConvertConfig::from_json_file(&path).is_err());
    }
}
