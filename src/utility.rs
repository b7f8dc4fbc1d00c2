use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion};

pub struct Utility {}

impl Utility {
    /// 旋转矩阵转四元数，输入不做正交化
    ///
    /// 非正交输入得到的四元数模长不为 1。结果的符号取 `w >= 0`。
    pub fn rotation_to_quaternion(m: &Matrix3<f64>) -> Quaternion<f64> {
        let q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(*m))
            .into_inner();
        if q.w < 0.0 {
            -q
        } else {
            q
        }
    }

    /// 通过 SVD 投影到最近的旋转矩阵 (det = +1)
    pub fn orthonormalize(m: &Matrix3<f64>) -> Matrix3<f64> {
        let svd = m.svd(true, true);
        match (svd.u, svd.v_t) {
            (Some(mut u), Some(v_t)) => {
                if (u * v_t).determinant() < 0.0 {
                    let mut last = u.column_mut(2);
                    last *= -1.0;
                }
                u * v_t
            }
            _ => *m,
        }
    }

    #[inline]
    pub fn mean<I>(values: I) -> Option<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        let (sum, count) = values
            .into_iter()
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
        (count > 0).then(|| sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::Utility;
    use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

    fn assert_same_rotation(m: &Matrix3<f64>) {
        let q = Utility::rotation_to_quaternion(m);
        assert!((q.norm() - 1.0).abs() < 1e-9, "norm = {}", q.norm());
        let back = UnitQuaternion::from_quaternion(q).to_rotation_matrix();
        assert!((back.matrix() - m).abs().max() < 1e-9);
    }

    #[test]
    fn test_identity() {
        let q = Utility::rotation_to_quaternion(&Matrix3::identity());
        assert_eq!((q.w, q.i, q.j, q.k), (1.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_every_pivot_branch() {
        // trace 分支、x/y/z 三个对角元分支
        let axes = [
            Vector3::new(0.3, -0.2, 0.9),
            Vector3::x(),
            Vector3::y(),
            Vector3::z(),
        ];
        for axis in axes {
            for angle in [0.1, 1.0, 2.5, 3.1] {
                let r = Rotation3::from_axis_angle(&nalgebra::Unit::new_normalize(axis), angle);
                assert_same_rotation(r.matrix());
            }
        }
    }

    #[test]
    fn test_scalar_part_non_negative() {
        let r = Rotation3::from_euler_angles(2.9, -1.4, 0.7);
        let q = Utility::rotation_to_quaternion(r.matrix());
        assert!(q.w >= 0.0);
    }

    #[test]
    fn test_non_orthonormal_keeps_deviation() {
        let m = Matrix3::identity() * 1.1;
        let q = Utility::rotation_to_quaternion(&m);
        assert!((q.norm() - 1.0).abs() > 1e-3);
    }

    #[test]
    fn test_scaled_diagonal() {
        let m = Matrix3::from_diagonal(&Vector3::new(1.2, 1.0, 1.0));
        let q = Utility::rotation_to_quaternion(&m);
        assert!((q.w - 4.2_f64.sqrt() / 2.0).abs() < 1e-12);
        assert_eq!((q.i, q.j, q.k), (0.0, 0.0, 0.0));
        assert!((q.norm() - 1.024_695_076_595_96).abs() < 1e-9);
    }

    #[test]
    fn test_orthonormalize() {
        let r = Rotation3::from_euler_angles(0.4, 0.2, -1.0);
        let noisy = r.matrix() * 1.05 + Matrix3::new(0.01, 0.0, 0.0, 0.0, -0.02, 0.0, 0.0, 0.0, 0.0);
        let fixed = Utility::orthonormalize(&noisy);
        assert!((fixed.transpose() * fixed - Matrix3::identity()).abs().max() < 1e-9);
        assert!((fixed.determinant() - 1.0).abs() < 1e-9);
        assert!((fixed - r.matrix()).abs().max() < 0.05);
    }

    #[test]
    fn test_mean() {
        assert_eq!(Utility::mean([1.0, 2.0, 6.0]), Some(3.0));
        assert_eq!(Utility::mean(std::iter::empty()), None);
    }
}
