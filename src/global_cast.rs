//! 坐标系转换
//!
//! ARKit: Y 向上, -Z 为前方, 右手系
//! COLMAP: Y 向下, +Z 为前方, 右手系
//!
//! ARKit 记录相机到世界的变换，COLMAP 需要世界到相机的变换。

use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};
use thiserror::Error;

use crate::config::RotationPolicy;
use crate::global_types::ColmapPose;
use crate::utility::Utility;

#[derive(Debug, Error, PartialEq)]
pub enum PoseError {
    #[error("camera-to-world matrix is singular")]
    Singular,
    #[error("rotation block is not orthonormal (|q| = {norm:.6})")]
    NotOrthonormal { norm: f64 },
}

/// 轴翻转矩阵 diag(1, -1, -1, 1)，自身即为逆
pub fn axis_flip() -> Matrix4<f64> {
    Matrix4::from_diagonal(&Vector4::new(1.0, -1.0, -1.0, 1.0))
}

/// ARKit 相机到世界 -> COLMAP 世界到相机
///
/// `F · M · F` 换到 COLMAP 坐标系后求逆，再从旋转块提取四元数。
pub fn arkit_to_colmap_pose(c2w_arkit: &Matrix4<f64>) -> Result<ColmapPose, PoseError> {
    let (rotation, translation) = world_to_camera(c2w_arkit)?;
    Ok(ColmapPose {
        rotation: Utility::rotation_to_quaternion(&rotation),
        translation,
    })
}

/// Same conversion, with explicit handling of a rotation block that is not
/// orthonormal.
pub fn arkit_to_colmap_pose_with_policy(
    c2w_arkit: &Matrix4<f64>,
    policy: RotationPolicy,
) -> Result<ColmapPose, PoseError> {
    let pose = match policy {
        RotationPolicy::Orthonormalize => {
            let (rotation, translation) = world_to_camera(c2w_arkit)?;
            ColmapPose {
                rotation: Utility::rotation_to_quaternion(&Utility::orthonormalize(&rotation)),
                translation,
            }
        }
        _ => arkit_to_colmap_pose(c2w_arkit)?,
    };
    if policy == RotationPolicy::Reject
        && pose.norm_deviation() > crate::config::QUATERNION_NORM_TOLERANCE
    {
        return Err(PoseError::NotOrthonormal {
            norm: pose.rotation.norm(),
        });
    }
    Ok(pose)
}

fn world_to_camera(c2w_arkit: &Matrix4<f64>) -> Result<(Matrix3<f64>, Vector3<f64>), PoseError> {
    let flip = axis_flip();
    let c2w_colmap = flip * c2w_arkit * flip;
    let w2c = c2w_colmap.try_inverse().ok_or(PoseError::Singular)?;

    let rotation: Matrix3<f64> = w2c.fixed_view::<3, 3>(0, 0).into_owned();
    let translation: Vector3<f64> = w2c.fixed_view::<3, 1>(0, 3).into_owned();
    Ok((rotation, translation))
}

/// 行优先的 4x4 矩阵
#[derive(Debug, Clone, Default)]
pub struct Matrix4d(pub Matrix4<f64>);

/// 长度不为 16 时返回实际长度
impl TryFrom<&[f64]> for Matrix4d {
    type Error = usize;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        if values.len() != 16 {
            return Err(values.len());
        }
        Ok(Matrix4d(Matrix4::from_row_slice(values)))
    }
}

/// 行优先的 3x3 矩阵
#[derive(Debug, Clone, Default)]
pub struct Matrix3d(pub Matrix3<f64>);

impl TryFrom<&[f64]> for Matrix3d {
    type Error = usize;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        if values.len() != 9 {
            return Err(values.len());
        }
        Ok(Matrix3d(Matrix3::from_row_slice(values)))
    }
}
