use super::CameraParametersTrait;
use crate::global_types::Intrinsics;
use crate::utility::Utility;

/// 整个扫描共用一个针孔相机
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PinholeParameters {
    // size
    pub image_width: u32,
    pub image_height: u32,
    // intrinsic
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl PinholeParameters {
    /// 对所有帧的内参取平均，没有帧时返回 None
    pub fn from_intrinsics<'a, I>(intrinsics: I, image_width: u32, image_height: u32) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Intrinsics>,
        I::IntoIter: Clone,
    {
        let iter = intrinsics.into_iter();
        Some(Self {
            image_width,
            image_height,
            fx: Utility::mean(iter.clone().map(|k| k.fx))?,
            fy: Utility::mean(iter.clone().map(|k| k.fy))?,
            cx: Utility::mean(iter.clone().map(|k| k.cx))?,
            cy: Utility::mean(iter.map(|k| k.cy))?,
        })
    }
}

impl CameraParametersTrait for PinholeParameters {
    const CAMERA_TYPE: &'static str = "PINHOLE";

    fn image_size(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    fn params(&self) -> Vec<f64> {
        vec![self.fx, self.fy, self.cx, self.cy]
    }
}

#[test]
fn test_mean_intrinsics() {
    let frames = [
        Intrinsics::new(1000.0, 1002.0, 640.0, 360.0),
        Intrinsics::new(1010.0, 1004.0, 641.0, 361.0),
        Intrinsics::new(1020.0, 1009.0, 645.0, 362.5),
    ];
    let camera = PinholeParameters::from_intrinsics(frames.iter(), 1280, 720).unwrap();
    assert!((camera.fx - 1010.0).abs() < 1e-9);
    assert!((camera.fy - 1005.0).abs() < 1e-9);
    assert!((camera.cx - 642.0).abs() < 1e-9);
    assert!((camera.cy - 361.166_666_666_666_7).abs() < 1e-9);
    assert_eq!(
        camera.to_colmap_line(1),
        "1 PINHOLE 1280 720 1010.000000 1005.000000 642.000000 361.166667"
    );

    assert!(PinholeParameters::from_intrinsics(std::iter::empty(), 1, 1).is_none());
}
