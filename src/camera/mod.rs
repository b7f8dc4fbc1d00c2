mod pinhole_camera;
pub use pinhole_camera::PinholeParameters;

use crate::config::INTRINSICS_PRECISION;

/// 相机参数的trait
pub trait CameraParametersTrait {
    /// COLMAP 相机模型名
    const CAMERA_TYPE: &'static str;

    fn image_size(&self) -> (u32, u32);
    /// 按 COLMAP 顺序排列的参数
    fn params(&self) -> Vec<f64>;

    /// `CAMERA_ID MODEL WIDTH HEIGHT PARAMS[]`
    fn to_colmap_line(&self, camera_id: u32) -> String {
        let (width, height) = self.image_size();
        let params: Vec<String> = self
            .params()
            .iter()
            .map(|p| format!("{:.*}", INTRINSICS_PRECISION, p))
            .collect();
        format!(
            "{} {} {} {} {}",
            camera_id,
            Self::CAMERA_TYPE,
            width,
            height,
            params.join(" ")
        )
    }
}
