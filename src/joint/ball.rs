use na::{Isometry3, Matrix3, Translation3, UnitQuaternion, Vector3};

use crate::{
    spatial::{exp_angular, Jacobian},
    types::Float,
    util::skew_symmetric,
};

/// Below this rotation angle the closed-form Jacobian coefficients are
/// replaced by their Taylor expansions
const SMALL_ANGLE: Float = 1e-2;

/// Coefficients a = (1 - cos θ)/θ² and b = (θ - sin θ)/θ³
fn jacobian_coefficients(theta: Float) -> (Float, Float) {
    if theta < SMALL_ANGLE {
        let t2 = theta * theta;
        (
            0.5 - t2 / 24.0 + t2 * t2 / 720.0,
            1.0 / 6.0 - t2 / 120.0 + t2 * t2 / 5040.0,
        )
    } else {
        let t2 = theta * theta;
        ((1.0 - theta.cos()) / t2, (theta - theta.sin()) / (t2 * theta))
    }
}

/// (da/dθ)/θ and (db/dθ)/θ
fn jacobian_coefficient_rates(theta: Float) -> (Float, Float) {
    if theta < SMALL_ANGLE {
        let t2 = theta * theta;
        (-1.0 / 12.0 + t2 / 180.0, -1.0 / 60.0 + t2 / 1260.0)
    } else {
        let (s, c) = theta.sin_cos();
        let t4 = theta.powi(4);
        (
            (theta * s - 2.0 * (1.0 - c)) / t4,
            (theta * (1.0 - c) - 3.0 * (theta - s)) / (t4 * theta),
        )
    }
}

/// Right Jacobian of SO(3): maps the rate of exponential coordinates q to
/// the angular velocity of exp(q) expressed in the rotated frame.
///     J_r(q) = I - a [q] + b [q]²
pub fn so3_right_jacobian(q: &Vector3<Float>) -> Matrix3<Float> {
    let (a, b) = jacobian_coefficients(q.norm());
    let k = skew_symmetric(q);
    Matrix3::identity() - a * k + b * k * k
}

/// Time derivative of `so3_right_jacobian` along the rate dq
pub fn so3_right_jacobian_deriv(q: &Vector3<Float>, dq: &Vector3<Float>) -> Matrix3<Float> {
    let theta = q.norm();
    let (a, b) = jacobian_coefficients(theta);
    let (a_rate, b_rate) = jacobian_coefficient_rates(theta);
    let q_dot_dq = q.dot(dq);
    let da = a_rate * q_dot_dq;
    let db = b_rate * q_dot_dq;

    let k = skew_symmetric(q);
    let kd = skew_symmetric(dq);
    -da * k - a * kd + db * k * k + b * (kd * k + k * kd)
}

/// Spherical joint parameterized by exponential coordinates q ∈ R³, so that
/// the joint rotation is exp([q]).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BallJoint;

impl BallJoint {
    pub fn new() -> Self {
        BallJoint
    }

    pub fn rotation(&self, q: &[Float]) -> UnitQuaternion<Float> {
        exp_angular(&Vector3::new(q[0], q[1], q[2]))
    }

    pub fn transform(&self, q: &[Float]) -> Isometry3<Float> {
        Isometry3::from_parts(Translation3::identity(), self.rotation(q))
    }

    pub fn motion_subspace(&self, q: &[Float]) -> Jacobian {
        let mut s = Jacobian::zeros(3);
        s.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&so3_right_jacobian(&Vector3::new(q[0], q[1], q[2])));
        s
    }

    pub fn motion_subspace_deriv(&self, q: &[Float], dq: &[Float]) -> Jacobian {
        let mut ds = Jacobian::zeros(3);
        ds.fixed_view_mut::<3, 3>(0, 0).copy_from(&so3_right_jacobian_deriv(
            &Vector3::new(q[0], q[1], q[2]),
            &Vector3::new(dq[0], dq[1], dq[2]),
        ));
        ds
    }
}

#[cfg(test)]
mod ball_tests {
    use na::vector;
    use rand::rng;

    use crate::{
        assert_vec_close, joint::test_support::finite_difference_deriv,
        util::test_utils::random_vector,
    };

    use super::*;

    #[test]
    fn right_jacobian_maps_rates_to_body_angular_velocity() {
        // Arrange
        let mut rng = rng();
        let h = 1e-7;
        for _ in 0..20 {
            let q = random_vector(&mut rng, 2.0);
            let dq = random_vector(&mut rng, 1.0);

            // Act
            let w = so3_right_jacobian(&q) * dq;
            let r0 = exp_angular(&q);
            let r1 = exp_angular(&(q + h * dq));
            let w_fd = (r0.inverse() * r1).scaled_axis() / h;

            // Assert
            assert_vec_close!(w, w_fd, 1e-5);
        }
    }

    #[test]
    fn right_jacobian_deriv_matches_finite_difference() {
        // Arrange
        let mut rng = rng();
        let h = 1e-6;
        for _ in 0..20 {
            let q = random_vector(&mut rng, 2.0);
            let dq = random_vector(&mut rng, 1.0);

            // Act
            let dj = so3_right_jacobian_deriv(&q, &dq);
            let dj_fd =
                (so3_right_jacobian(&(q + h * dq)) - so3_right_jacobian(&(q - h * dq))) / (2.0 * h);

            // Assert
            assert_vec_close!(dj, dj_fd, 1e-6);
        }
    }

    #[test]
    fn small_angle_branch_is_continuous() {
        // Arrange
        let dq = vector![0.3, -0.2, 0.5];
        let below = vector![0.0, 0.0, 0.99 * SMALL_ANGLE];
        let above = vector![0.0, 0.0, 1.01 * SMALL_ANGLE];

        // Act & Assert
        assert_vec_close!(so3_right_jacobian(&below), so3_right_jacobian(&above), 1e-3);
        assert_vec_close!(
            so3_right_jacobian_deriv(&below, &dq),
            so3_right_jacobian_deriv(&above, &dq),
            1e-3
        );
    }

    #[test]
    fn motion_subspace_deriv_at_zero_configuration() {
        // Arrange
        let joint = BallJoint::new();
        let q = [0.0, 0.0, 0.0];
        let dq = [0.4, 0.1, -0.7];

        // Act
        let ds = joint.motion_subspace_deriv(&q, &dq);
        let expected = finite_difference_deriv(|q| joint.motion_subspace(q), &q, &dq);

        // Assert
        assert_vec_close!(ds, expected, 1e-6);
    }
}
