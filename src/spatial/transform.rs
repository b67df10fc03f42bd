use na::{Isometry3, Matrix3, Matrix6, Translation3, UnitQuaternion, Vector3};

use crate::{
    spatial::spatial_vector::{angular, linear, spatial_vector, Jacobian, SpatialVector},
    types::Float,
    util::skew_symmetric,
};

/// Tolerance used when checking that a transform is rigid
const RIGID_TOLERANCE: Float = 1e-6;

/// Given an isometry T that maps points from frame A to frame B, compute
/// the 6x6 matrix Ad_T that maps twists expressed in A to B:
///     Ad_T = | R       0 |
///            | [p]R    R |
pub fn adjoint_matrix(t: &Isometry3<Float>) -> Matrix6<Float> {
    let binding = t.rotation.to_rotation_matrix();
    let r = binding.matrix();
    let p = t.translation.vector;

    let mut m = Matrix6::<Float>::zeros();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(r);
    m.fixed_view_mut::<3, 3>(3, 0)
        .copy_from(&(skew_symmetric(&p) * r));
    m.fixed_view_mut::<3, 3>(3, 3).copy_from(r);
    m
}

/// Ad_T v: re-express twist v from the "from" frame of T into its "to" frame
pub fn ad_t(t: &Isometry3<Float>, v: &SpatialVector) -> SpatialVector {
    let w = t.rotation * angular(v);
    let l = t.rotation * linear(v) + t.translation.vector.cross(&w);
    spatial_vector(&w, &l)
}

/// Ad_{T^-1} v: re-express twist v from the "to" frame of T into its "from"
/// frame
pub fn ad_inv_t(t: &Isometry3<Float>, v: &SpatialVector) -> SpatialVector {
    let w = angular(v);
    let l = linear(v) - t.translation.vector.cross(&w);
    let r_inv = t.rotation.inverse();
    spatial_vector(&(r_inv * w), &(r_inv * l))
}

/// Ad_T^T f: re-express wrench f from the "to" frame of T into its "from"
/// frame
pub fn d_ad_t(t: &Isometry3<Float>, f: &SpatialVector) -> SpatialVector {
    let force = linear(f);
    let moment = angular(f) - t.translation.vector.cross(&force);
    let r_inv = t.rotation.inverse();
    spatial_vector(&(r_inv * moment), &(r_inv * force))
}

/// Ad_{T^-1}^T f: re-express wrench f from the "from" frame of T into its
/// "to" frame
pub fn d_ad_inv_t(t: &Isometry3<Float>, f: &SpatialVector) -> SpatialVector {
    let force = t.rotation * linear(f);
    let moment = t.rotation * angular(f) + t.translation.vector.cross(&force);
    spatial_vector(&moment, &force)
}

/// Rotate a free vector of the "to" frame of T into its "from" frame and
/// return it as a pure linear spatial vector | 0; R^T v |
pub fn ad_inv_r_linear(t: &Isometry3<Float>, v: &Vector3<Float>) -> SpatialVector {
    spatial_vector(&Vector3::zeros(), &(t.rotation.inverse() * v))
}

/// Column-wise `ad_t`
pub fn ad_t_jac(t: &Isometry3<Float>, jac: &Jacobian) -> Jacobian {
    adjoint_matrix(t) * jac
}

/// Column-wise `ad_inv_t`
pub fn ad_inv_t_jac(t: &Isometry3<Float>, jac: &Jacobian) -> Jacobian {
    adjoint_matrix(&t.inverse()) * jac
}

/// Re-express a spatial inertia given in the "from" frame of T (the frame of
/// a child body) in the "to" frame of T (the frame of its parent):
///     I_to = Ad_{T^-1}^T I_from Ad_{T^-1}
pub fn transform_inertia(t: &Isometry3<Float>, inertia: &Matrix6<Float>) -> Matrix6<Float> {
    let x = adjoint_matrix(&t.inverse());
    x.transpose() * inertia * x
}

/// Rotation exp([w]) from exponential coordinates w
pub fn exp_angular(w: &Vector3<Float>) -> UnitQuaternion<Float> {
    UnitQuaternion::from_scaled_axis(*w)
}

/// Exponential coordinates of a rotation
pub fn log_angular(rotation: &UnitQuaternion<Float>) -> Vector3<Float> {
    rotation.scaled_axis()
}

/// Local coordinates of a rigid transform, i.e. the twist | ω; v | whose
/// matrix exponential is T.
pub fn log_map(t: &Isometry3<Float>) -> SpatialVector {
    let w = log_angular(&t.rotation);
    let theta = w.norm();
    let w_hat = skew_symmetric(&w);

    // Inverse of the left Jacobian of SO(3)
    let coeff = if theta < 1e-4 {
        1.0 / 12.0 + theta * theta / 720.0
    } else {
        let half = 0.5 * theta;
        (1.0 - half * half.cos() / half.sin()) / (theta * theta)
    };
    let v_inv = Matrix3::identity() - 0.5 * w_hat + coeff * w_hat * w_hat;

    spatial_vector(&w, &(v_inv * t.translation.vector))
}

/// Matrix exponential of a twist | ω; v |, inverse of `log_map`
pub fn exp_map(s: &SpatialVector) -> Isometry3<Float> {
    let w = angular(s);
    let theta = w.norm();
    let w_hat = skew_symmetric(&w);

    // Left Jacobian of SO(3)
    let (a, b) = if theta < 1e-4 {
        (0.5 - theta * theta / 24.0, 1.0 / 6.0 - theta * theta / 120.0)
    } else {
        let t2 = theta * theta;
        ((1.0 - theta.cos()) / t2, (theta - theta.sin()) / (t2 * theta))
    };
    let v = Matrix3::identity() + a * w_hat + b * w_hat * w_hat;

    Isometry3::from_parts(Translation3::from(v * linear(s)), exp_angular(&w))
}

/// Returns whether t is a finite rigid transform
pub fn verify_transform(t: &Isometry3<Float>) -> bool {
    let finite = t.translation.vector.iter().all(|x| x.is_finite())
        && t.rotation.coords.iter().all(|x| x.is_finite());
    finite && (t.rotation.coords.norm() - 1.0).abs() < RIGID_TOLERANCE
}

#[cfg(test)]
mod transform_tests {
    use na::vector;
    use rand::rng;

    use crate::{
        assert_close, assert_vec_close,
        inertia::MassProperties,
        util::test_utils::{random_quaternion, random_vector},
        PI,
    };

    use super::*;

    fn random_isometry() -> Isometry3<Float> {
        let mut rng = rng();
        Isometry3::from_parts(
            Translation3::from(random_vector(&mut rng, 2.0)),
            random_quaternion(&mut rng, PI),
        )
    }

    #[test]
    fn ad_t_then_ad_inv_t_is_identity() {
        // Arrange
        let mut rng = rng();
        let t = random_isometry();
        let v = spatial_vector(&random_vector(&mut rng, 1.0), &random_vector(&mut rng, 1.0));

        // Act
        let back = ad_inv_t(&t, &ad_t(&t, &v));

        // Assert
        assert_vec_close!(back, v, 1e-10);
    }

    #[test]
    fn ad_t_matches_matrix() {
        let mut rng = rng();
        let t = random_isometry();
        let v = spatial_vector(&random_vector(&mut rng, 1.0), &random_vector(&mut rng, 1.0));

        assert_vec_close!(ad_t(&t, &v), adjoint_matrix(&t) * v, 1e-10);
    }

    #[test]
    fn dual_adjoints_match_transposed_matrices() {
        let mut rng = rng();
        let t = random_isometry();
        let f = spatial_vector(&random_vector(&mut rng, 1.0), &random_vector(&mut rng, 1.0));

        assert_vec_close!(d_ad_t(&t, &f), adjoint_matrix(&t).transpose() * f, 1e-10);
        assert_vec_close!(
            d_ad_inv_t(&t, &f),
            adjoint_matrix(&t.inverse()).transpose() * f,
            1e-10
        );
    }

    /// Power is frame invariant: f_to . v_to == f_from . v_from
    #[test]
    fn wrench_and_twist_transforms_preserve_power() {
        // Arrange
        let mut rng = rng();
        let t = random_isometry();
        let v_from = spatial_vector(&random_vector(&mut rng, 1.0), &random_vector(&mut rng, 1.0));
        let f_from = spatial_vector(&random_vector(&mut rng, 1.0), &random_vector(&mut rng, 1.0));

        // Act
        let v_to = ad_t(&t, &v_from);
        let f_to = d_ad_inv_t(&t, &f_from);

        // Assert
        assert_close!(f_to.dot(&v_to), f_from.dot(&v_from), 1e-10);
    }

    #[test]
    fn log_map_inverts_exp_map() {
        // Arrange
        let s = spatial_vector(&vector![0.3, -0.2, 0.9], &vector![1.0, 2.0, -0.5]);

        // Act
        let t = exp_map(&s);
        let log = log_map(&t);

        // Assert
        assert_vec_close!(log, s, 1e-9);
    }

    #[test]
    fn log_map_of_pure_translation() {
        let t = Isometry3::translation(1.0, -2.0, 3.0);
        assert_vec_close!(
            log_map(&t),
            SpatialVector::new(0., 0., 0., 1., -2., 3.),
            1e-12
        );
    }

    /// A point mass sitting at the origin of a child frame that is displaced
    /// by p in the parent frame must look like a point mass at p.
    #[test]
    fn transform_inertia_of_point_mass() {
        // Arrange
        let m = 2.0;
        let p = vector![0.5, -1.0, 2.0];
        let child = MassProperties::new(m, Vector3::zeros(), 0., 0., 0., 0., 0., 0.);
        let expected = MassProperties::new(m, p, 0., 0., 0., 0., 0., 0.);
        let t = Isometry3::translation(p.x, p.y, p.z);

        // Act
        let inertia = transform_inertia(&t, &child.spatial_inertia());

        // Assert
        assert_vec_close!(inertia, expected.spatial_inertia(), 1e-12);
    }

    #[test]
    fn verify_transform_rejects_nan() {
        let mut t = Isometry3::<Float>::identity();
        assert!(verify_transform(&t));
        t.translation.vector.x = Float::NAN;
        assert!(!verify_transform(&t));
    }
}
