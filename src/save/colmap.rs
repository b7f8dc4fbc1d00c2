use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::camera::CameraParametersTrait;
use crate::config::POSE_PRECISION;
use crate::error::ConvertError;
use crate::global_types::PosedFrame;

const CAMERAS_HEADER: &str = "# Camera list with one line of data per camera:\n\
                              # CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[]\n";
const IMAGES_HEADER: &str = "# Image list with two lines of data per image:\n\
                             # IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME\n\
                             # POINTS2D[] as (X, Y, POINT3D_ID)\n";
const POINTS3D_HEADER: &str = "# 3D point list with one line of data per point:\n\
                               # POINT3D_ID, X, Y, Z, R, G, B, ERROR, TRACK[] as (IMAGE_ID, POINT2D_IDX)\n";

/// 唯一的共享相机
const CAMERA_ID: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub copied: usize,
    /// 目标已存在而跳过
    pub existing: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ModelSummary {
    pub cameras_path: PathBuf,
    pub images_path: PathBuf,
    pub points3d_path: PathBuf,
    pub copies: CopySummary,
}

/// `<output>/images/*.jpg` + `<output>/sparse/0/{cameras,images,points3D}.txt`
#[derive(Debug, Clone)]
pub struct ColmapWriter {
    pub output_dir: PathBuf,
}

impl ColmapWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn sparse_dir(&self) -> PathBuf {
        self.output_dir.join("sparse").join("0")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.output_dir.join("images")
    }

    fn create(path: &Path) -> Result<BufWriter<File>, ConvertError> {
        File::create(path)
            .map(BufWriter::new)
            .map_err(|e| ConvertError::io(path, e))
    }

    fn create_dir(path: &Path) -> Result<(), ConvertError> {
        fs::create_dir_all(path).map_err(|e| ConvertError::io(path, e))
    }

    pub fn write_cameras_to<W: Write, C: CameraParametersTrait>(
        out: &mut W,
        camera: &C,
    ) -> std::io::Result<()> {
        out.write_all(CAMERAS_HEADER.as_bytes())?;
        writeln!(out, "{}", camera.to_colmap_line(CAMERA_ID))
    }

    /// 每帧两行，ID 从 1 开始按帧顺序分配；第二行留给 COLMAP 填写 2D 点
    pub fn write_images_to<W: Write>(out: &mut W, frames: &[PosedFrame]) -> std::io::Result<()> {
        out.write_all(IMAGES_HEADER.as_bytes())?;
        for (image_id, frame) in (1..).zip(frames) {
            write!(out, "{}", image_id)?;
            for value in frame.pose.to_array() {
                // 避免输出 -0.0000000000
                write!(out, " {:.*}", POSE_PRECISION, value + 0.0)?;
            }
            writeln!(out, " {} {}", CAMERA_ID, frame.image.name)?;
            writeln!(out)?;
        }
        Ok(())
    }

    pub fn write_points3d_to<W: Write>(out: &mut W) -> std::io::Result<()> {
        out.write_all(POINTS3D_HEADER.as_bytes())
    }

    fn write_file<F>(path: &Path, write: F) -> Result<(), ConvertError>
    where
        F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
    {
        let mut out = Self::create(path)?;
        write(&mut out)
            .and_then(|_| out.flush())
            .map_err(|e| ConvertError::io(path, e))
    }

    /// 原样复制图像，目标已存在则跳过；图像名必须唯一
    pub fn copy_images(&self, frames: &[PosedFrame]) -> Result<CopySummary, ConvertError> {
        let mut names = HashSet::with_capacity(frames.len());
        if let Some(frame) = frames.iter().find(|frame| !names.insert(&frame.image.name)) {
            return Err(ConvertError::DuplicateImageName(frame.image.name.clone()));
        }

        let images_dir = self.images_dir();
        Self::create_dir(&images_dir)?;

        let copied: Vec<bool> = frames
            .par_iter()
            .map(|frame| {
                let dst = images_dir.join(&frame.image.name);
                if dst.exists() {
                    return Ok(false);
                }
                fs::copy(&frame.image.path, &dst)
                    .map(|_| true)
                    .map_err(|e| ConvertError::io(&frame.image.path, e))
            })
            .collect::<Result<Vec<bool>, ConvertError>>()?;

        let count = copied.iter().filter(|&&c| c).count();
        Ok(CopySummary {
            copied: count,
            existing: copied.len() - count,
        })
    }

    pub fn write_model<C: CameraParametersTrait>(
        &self,
        camera: &C,
        frames: &[PosedFrame],
    ) -> Result<ModelSummary, ConvertError> {
        let copies = self.copy_images(frames)?;
        let sparse_dir = self.sparse_dir();
        Self::create_dir(&sparse_dir)?;

        let cameras_path = sparse_dir.join("cameras.txt");
        Self::write_file(&cameras_path, |out| Self::write_cameras_to(out, camera))?;
        let images_path = sparse_dir.join("images.txt");
        Self::write_file(&images_path, |out| Self::write_images_to(out, frames))?;
        let points3d_path = sparse_dir.join("points3D.txt");
        Self::write_file(&points3d_path, |out| Self::write_points3d_to(out))?;

        Ok(ModelSummary {
            cameras_path,
            images_path,
            points3d_path,
            copies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PinholeParameters;
    use crate::global_cast::arkit_to_colmap_pose;
    use crate::global_types::{AssociatedImage, FrameRecord, Intrinsics};
    use crate::test_utils;
    use nalgebra::Matrix4;

    fn posed_frame(dir: &Path, idx: u64) -> PosedFrame {
        let image_path = test_utils::write_image_for(dir, idx);
        let pose_camera_to_world = Matrix4::identity();
        PosedFrame {
            record: FrameRecord {
                source_path: dir.join(format!("frame_{:05}.json", idx)),
                discovery_index: idx as usize,
                pose_camera_to_world,
                intrinsics: test_utils::default_intrinsics(),
                motion_quality: 1.0,
                capture_index: idx,
            },
            image: AssociatedImage {
                name: image_path.file_name().unwrap().to_string_lossy().into_owned(),
                path: image_path,
            },
            pose: arkit_to_colmap_pose(&pose_camera_to_world).unwrap(),
        }
    }

    #[test]
    fn test_images_format() {
        let dir = tempfile::tempdir().unwrap();
        let frames = vec![posed_frame(dir.path(), 0), posed_frame(dir.path(), 3)];
        let mut out = Vec::new();
        ColmapWriter::write_images_to(&mut out, &frames).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "# Image list with two lines of data per image:");
        assert_eq!(lines[1], "# IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME");
        assert_eq!(lines[2], "# POINTS2D[] as (X, Y, POINT3D_ID)");
        assert_eq!(
            lines[3],
            "1 1.0000000000 0.0000000000 0.0000000000 0.0000000000 \
             0.0000000000 0.0000000000 0.0000000000 1 frame_00000.jpg"
        );
        assert_eq!(lines[4], "");
        assert!(lines[5].starts_with("2 1.0000000000 "));
        assert!(lines[5].ends_with(" 1 frame_00003.jpg"));
        assert_eq!(lines[6], "");
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_single_camera_line() {
        let camera = PinholeParameters::from_intrinsics(
            [
                Intrinsics::new(100.0, 101.0, 50.0, 40.0),
                Intrinsics::new(102.0, 103.0, 52.0, 41.0),
            ]
            .iter(),
            640,
            480,
        )
        .unwrap();
        let mut out = Vec::new();
        ColmapWriter::write_cameras_to(&mut out, &camera).unwrap();
        let text = String::from_utf8(out).unwrap();

        let data: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(data, ["1 PINHOLE 640 480 101.000000 102.000000 51.000000 40.500000"]);
        let params: Vec<f64> = data[0]
            .split_whitespace()
            .skip(4)
            .map(|v| v.parse().unwrap())
            .collect();
        for (got, want) in params.iter().zip([101.0, 102.0, 51.0, 40.5]) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn test_points3d_header_only() {
        let mut out = Vec::new();
        ColmapWriter::write_points3d_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.starts_with('#')));
    }

    #[test]
    fn test_idempotent_copy() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let frames: Vec<PosedFrame> = (0..3).map(|idx| posed_frame(input.path(), idx)).collect();
        let camera = PinholeParameters::from_intrinsics(
            frames.iter().map(|f| &f.record.intrinsics),
            test_utils::IMAGE_WIDTH,
            test_utils::IMAGE_HEIGHT,
        )
        .unwrap();
        let writer = ColmapWriter::new(output.path());

        let first = writer.write_model(&camera, &frames).unwrap();
        assert_eq!(first.copies, CopySummary { copied: 3, existing: 0 });
        let copied = writer.images_dir().join("frame_00001.jpg");
        let before = fs::read(&copied).unwrap();
        assert_eq!(before, fs::read(&frames[1].image.path).unwrap());

        let second = writer.write_model(&camera, &frames).unwrap();
        assert_eq!(second.copies, CopySummary { copied: 0, existing: 3 });
        assert_eq!(fs::read(&copied).unwrap(), before);
        assert_eq!(fs::read_dir(writer.images_dir()).unwrap().count(), 3);
        assert!(second.points3d_path.ends_with("sparse/0/points3D.txt"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let frames = vec![posed_frame(input.path(), 1), posed_frame(input.path(), 1)];
        let writer = ColmapWriter::new(output.path());

        match writer.copy_images(&frames) {
            Err(ConvertError::DuplicateImageName(name)) => assert_eq!(name, "frame_00001.jpg"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!writer.images_dir().exists());
    }
}
