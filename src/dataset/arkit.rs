use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use super::DatasetTrait;
use crate::error::ConvertError;
use crate::global_cast::{Matrix3d, Matrix4d};
use crate::global_types::{FrameRecord, Intrinsics};

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("`{field}` has {found} elements, expected {expected}")]
    ElementCount {
        field: &'static str,
        found: usize,
        expected: usize,
    },
}

/// 单帧 JSON，其余字段忽略
#[derive(Debug, Deserialize)]
struct ArkitFrameJson {
    /// 4x4 相机到世界，行优先
    #[serde(rename = "cameraPoseARFrame")]
    camera_pose: Vec<f64>,
    /// 3x3 内参，行优先
    intrinsics: Vec<f64>,
    #[serde(rename = "motionQuality", default = "default_motion_quality")]
    motion_quality: f64,
    #[serde(default, deserialize_with = "lenient_frame_index")]
    frame_index: u64,
}

fn default_motion_quality() -> f64 {
    1.0
}

/// 只是命名回退用，类型不对时取 0，不让整帧失败
fn lenient_frame_index<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let index = match value.as_u64() {
        Some(index) => index,
        None => value
            .as_f64()
            .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
            .map_or(0, |v| v as u64),
    };
    Ok(index)
}

pub fn parse_frame(
    text: &str,
    source_path: &Path,
    discovery_index: usize,
) -> Result<FrameRecord, MetadataError> {
    let json: ArkitFrameJson = serde_json::from_str(text)?;

    let pose = Matrix4d::try_from(json.camera_pose.as_slice()).map_err(|found| {
        MetadataError::ElementCount {
            field: "cameraPoseARFrame",
            found,
            expected: 16,
        }
    })?;
    let k = Matrix3d::try_from(json.intrinsics.as_slice()).map_err(|found| {
        MetadataError::ElementCount {
            field: "intrinsics",
            found,
            expected: 9,
        }
    })?;

    Ok(FrameRecord {
        source_path: source_path.to_path_buf(),
        discovery_index,
        pose_camera_to_world: pose.0,
        intrinsics: Intrinsics::from_matrix(&k.0),
        motion_quality: json.motion_quality,
        capture_index: json.frame_index,
    })
}

pub fn read_frame(path: &Path, discovery_index: usize) -> Result<FrameRecord, MetadataError> {
    let text = fs::read_to_string(path)?;
    parse_frame(&text, path, discovery_index)
}

#[derive(Debug, Default)]
pub struct ArkitScan {
    pub metadata_files: Vec<PathBuf>,
}

impl ArkitScan {
    const METADATA_PREFIX: &'static str = "frame_";
    const METADATA_EXTENSION: &'static str = "json";

    fn is_metadata(path: &Path) -> bool {
        let name_ok = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name.starts_with(Self::METADATA_PREFIX));
        let ext_ok = path
            .extension()
            .map_or(false, |ext| ext == Self::METADATA_EXTENSION);
        name_ok && ext_ok && path.is_file()
    }

    fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, ConvertError> {
        let entries = fs::read_dir(dir).map_err(|e| ConvertError::io(dir, e))?;
        entries
            .map(|entry| {
                entry
                    .map(|entry| entry.path())
                    .map_err(|e| ConvertError::io(dir, e))
            })
            .collect()
    }

    /// 不跟随目录符号链接
    fn find_recursive(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), ConvertError> {
        let entries = fs::read_dir(dir).map_err(|e| ConvertError::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| ConvertError::io(dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| ConvertError::io(&path, e))?;
            if file_type.is_dir() {
                Self::find_recursive(&path, found)?;
            } else if Self::is_metadata(&path) {
                found.push(path);
            }
        }
        Ok(())
    }

    /// 先查找顶层目录，没有则递归查找子目录，按路径字典序排序
    pub fn new(root: &Path) -> Result<Self, ConvertError> {
        let mut metadata_files: Vec<PathBuf> = Self::list_dir(root)?
            .into_iter()
            .filter(|path| Self::is_metadata(path))
            .collect();
        if metadata_files.is_empty() {
            log::debug!("no metadata in {}, searching recursively", root.display());
            Self::find_recursive(root, &mut metadata_files)?;
        }
        if metadata_files.is_empty() {
            return Err(ConvertError::NoMetadata(root.to_path_buf()));
        }
        metadata_files.sort();

        Ok(Self { metadata_files })
    }
}

impl DatasetTrait for ArkitScan {
    fn metadata_files(&self) -> &[PathBuf] {
        &self.metadata_files
    }
}
