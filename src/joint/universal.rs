use na::{Isometry3, Translation3, UnitQuaternion, UnitVector3, Vector3};

use crate::{
    spatial::{spatial_vector, Jacobian},
    types::Float,
};

/// Two revolute joints in series: rotation q1 about axis1 followed by
/// rotation q2 about axis2 (axis2 expressed in the frame rotated by q1).
#[derive(Debug, Clone, PartialEq)]
pub struct UniversalJoint {
    pub axis1: UnitVector3<Float>,
    pub axis2: UnitVector3<Float>,
}

impl UniversalJoint {
    pub fn new(axis1: UnitVector3<Float>, axis2: UnitVector3<Float>) -> Self {
        Self { axis1, axis2 }
    }

    fn rotation1(&self, q1: Float) -> UnitQuaternion<Float> {
        UnitQuaternion::from_axis_angle(&self.axis1, q1)
    }

    fn rotation2(&self, q2: Float) -> UnitQuaternion<Float> {
        UnitQuaternion::from_axis_angle(&self.axis2, q2)
    }

    pub fn transform(&self, q: &[Float]) -> Isometry3<Float> {
        Isometry3::from_parts(
            Translation3::identity(),
            self.rotation1(q[0]) * self.rotation2(q[1]),
        )
    }

    /// | R2^T a1   a2 |
    /// | 0         0  |
    pub fn motion_subspace(&self, q: &[Float]) -> Jacobian {
        let a1 = self.rotation2(q[1]).inverse() * self.axis1.into_inner();
        let mut s = Jacobian::zeros(2);
        s.set_column(0, &spatial_vector(&a1, &Vector3::zeros()));
        s.set_column(1, &spatial_vector(&self.axis2, &Vector3::zeros()));
        s
    }

    /// d/dt (R2^T a1) = -(a2 dq2) x (R2^T a1)
    pub fn motion_subspace_deriv(&self, q: &[Float], dq: &[Float]) -> Jacobian {
        let a1 = self.rotation2(q[1]).inverse() * self.axis1.into_inner();
        let w2 = self.axis2.into_inner() * dq[1];
        let mut ds = Jacobian::zeros(2);
        ds.set_column(0, &spatial_vector(&(-w2.cross(&a1)), &Vector3::zeros()));
        ds
    }
}

#[cfg(test)]
mod universal_tests {
    use crate::{assert_vec_close, joint::test_support::finite_difference_deriv};

    use super::*;

    #[test]
    fn motion_subspace_deriv_matches_finite_difference() {
        // Arrange
        let joint = UniversalJoint::new(Vector3::x_axis(), Vector3::y_axis());
        let q = [0.3, -0.7];
        let dq = [1.1, 0.4];

        // Act
        let ds = joint.motion_subspace_deriv(&q, &dq);
        let expected = finite_difference_deriv(|q| joint.motion_subspace(q), &q, &dq);

        // Assert
        assert_vec_close!(ds, expected, 1e-6);
    }

    #[test]
    fn body_angular_velocity_matches_rotation_rate() {
        // Arrange
        let joint = UniversalJoint::new(Vector3::x_axis(), Vector3::z_axis());
        let q = [0.4, 0.9];
        let dq = [0.5, -0.3];
        let h = 1e-7;

        // Act
        let s = joint.motion_subspace(&q);
        let v = &s * na::DVector::from_column_slice(&dq);
        let r0 = joint.transform(&q).rotation;
        let r1 = joint.transform(&[q[0] + h * dq[0], q[1] + h * dq[1]]).rotation;
        let w_fd = (r0.inverse() * r1).scaled_axis() / h;

        // Assert
        assert_vec_close!(v.fixed_rows::<3>(0), w_fd, 1e-5);
    }
}
