//! 测试用的合成扫描数据

use std::path::{Path, PathBuf};

use crate::global_types::Intrinsics;

pub const IMAGE_WIDTH: u32 = 64;
pub const IMAGE_HEIGHT: u32 = 48;

pub fn default_intrinsics() -> Intrinsics {
    Intrinsics::new(50.0, 52.0, 32.0, 24.0)
}

pub fn identity_pose() -> [f64; 16] {
    [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]
}

pub fn write_frame_json_with(
    dir: &Path,
    idx: u64,
    quality: f64,
    pose: &[f64; 16],
    k: Intrinsics,
) -> PathBuf {
    let json = serde_json::json!({
        "cameraPoseARFrame": pose.to_vec(),
        "intrinsics": [k.fx, 0.0, k.cx, 0.0, k.fy, k.cy, 0.0, 0.0, 1.0],
        "motionQuality": quality,
        "frame_index": idx,
    });
    let path = dir.join(format!("frame_{:05}.json", idx));
    std::fs::write(&path, json.to_string()).unwrap();
    path
}

pub fn write_frame_json(dir: &Path, idx: u64, quality: f64) -> PathBuf {
    write_frame_json_with(dir, idx, quality, &identity_pose(), default_intrinsics())
}

pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    image::RgbImage::from_pixel(width, height, image::Rgb([120, 80, 40]))
        .save(path)
        .unwrap();
}

pub fn write_image_for(dir: &Path, idx: u64) -> PathBuf {
    let path = dir.join(format!("frame_{:05}.jpg", idx));
    write_jpeg(&path, IMAGE_WIDTH, IMAGE_HEIGHT);
    path
}

/// 每个 quality 对应一帧，全部带图像
pub fn write_scan(dir: &Path, qualities: &[f64]) {
    for (idx, &quality) in qualities.iter().enumerate() {
        write_frame_json(dir, idx as u64, quality);
        write_image_for(dir, idx as u64);
    }
}
