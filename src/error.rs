use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::dataset::MetadataError;
use crate::global_cast::PoseError;

/// 单帧错误：记录并跳过该帧，不中断运行
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("could not parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: MetadataError,
    },

    #[error("no image found for {} (tried {})", .path.display(), .tried.join(", "))]
    NoImage { path: PathBuf, tried: Vec<String> },

    #[error("{} reuses image name {name}", .path.display())]
    DuplicateImage { path: PathBuf, name: String },

    #[error("could not convert pose of {}: {source}", .path.display())]
    Transform {
        path: PathBuf,
        #[source]
        source: PoseError,
    },
}

impl FrameError {
    #[allow(dead_code)]
    pub fn path(&self) -> &std::path::Path {
        match self {
            FrameError::Parse { path, .. }
            | FrameError::NoImage { path, .. }
            | FrameError::DuplicateImage { path, .. }
            | FrameError::Transform { path, .. } => path,
        }
    }
}

/// 整体错误：立即中止
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("no frame_*.json files found in {}", .0.display())]
    NoMetadata(PathBuf),

    #[error("only {found} frames passed filtering, need at least {required}")]
    InsufficientFrames { found: usize, required: usize },

    #[error("could not read image size of {}: {source}", .path.display())]
    ImageProbe {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("image name {0} is used by more than one frame")]
    DuplicateImageName(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ConvertError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }
}
