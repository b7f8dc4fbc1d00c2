use std::path::PathBuf;

use nalgebra::{Matrix3, Matrix4, Quaternion, Vector3};

/// 针孔相机内参
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    #[allow(dead_code)]
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// 从 3x3 内参矩阵 K 中取出 fx, fy, cx, cy
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }
}

/// 单帧元数据
#[derive(Debug, Clone)]
pub struct FrameRecord {
    /// 元数据文件路径
    pub source_path: PathBuf,
    /// 在排序后的文件列表中的位置，贯穿所有阶段
    pub discovery_index: usize,
    /// 相机到世界的变换 (ARKit 坐标系)
    pub pose_camera_to_world: Matrix4<f64>,
    pub intrinsics: Intrinsics,
    /// 跟踪质量 [0, 1]
    pub motion_quality: f64,
    pub capture_index: u64,
}

/// A frame's companion image, bound once association succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociatedImage {
    pub path: PathBuf,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct SelectedFrame {
    pub record: FrameRecord,
    pub image: AssociatedImage,
}

/// COLMAP 世界到相机的位姿
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColmapPose {
    /// (w, x, y, z)，不保证单位长度
    pub rotation: Quaternion<f64>,
    pub translation: Vector3<f64>,
}

impl ColmapPose {
    /// `[qw, qx, qy, qz, tx, ty, tz]`
    pub fn to_array(&self) -> [f64; 7] {
        let q = &self.rotation;
        let t = &self.translation;
        [q.w, q.i, q.j, q.k, t.x, t.y, t.z]
    }

    pub fn norm_deviation(&self) -> f64 {
        (self.rotation.norm() - 1.0).abs()
    }
}

#[derive(Debug, Clone)]
pub struct PosedFrame {
    pub record: FrameRecord,
    pub image: AssociatedImage,
    pub pose: ColmapPose,
}

#[test]
fn test_intrinsics_from_matrix() {
    let k = Matrix3::new(1500.0, 0.0, 960.0, 0.0, 1490.0, 720.0, 0.0, 0.0, 1.0);
    let intrinsics = Intrinsics::from_matrix(&k);
    assert_eq!(intrinsics, Intrinsics::new(1500.0, 1490.0, 960.0, 720.0));
}
