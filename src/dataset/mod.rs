//! 数据集处理
//!
//! 3D Scanner App (ARKit) 导出目录: frame_XXXXX.json + frame_XXXXX.jpg
mod arkit;

use std::path::PathBuf;

pub use arkit::{read_frame, MetadataError};

pub type DefaultDataset = arkit::ArkitScan;

pub trait DatasetTrait {
    /// 按发现顺序排列的元数据文件，下标即 discovery index
    fn metadata_files(&self) -> &[PathBuf];

    fn len(&self) -> usize {
        self.metadata_files().len()
    }
}
