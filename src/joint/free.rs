use na::{Isometry3, Translation3, Vector3};

use crate::{
    joint::ball::{so3_right_jacobian, so3_right_jacobian_deriv},
    spatial::{exp_angular, Jacobian},
    types::Float,
    util::skew_symmetric,
};

/// Six degree-of-freedom joint. The first three coordinates are the
/// exponential coordinates of the rotation, the last three the translation
/// expressed in the parent-side joint frame.
///
/// The body twist is | J_r(q_a) dq_a ; R^T dp |, so the motion subspace is
/// block diagonal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FreeJoint;

impl FreeJoint {
    pub fn new() -> Self {
        FreeJoint
    }

    pub fn transform(&self, q: &[Float]) -> Isometry3<Float> {
        Isometry3::from_parts(
            Translation3::new(q[3], q[4], q[5]),
            exp_angular(&Vector3::new(q[0], q[1], q[2])),
        )
    }

    pub fn motion_subspace(&self, q: &[Float]) -> Jacobian {
        let q_a = Vector3::new(q[0], q[1], q[2]);
        let r_inv = exp_angular(&q_a).inverse().to_rotation_matrix();

        let mut s = Jacobian::zeros(6);
        s.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&so3_right_jacobian(&q_a));
        s.fixed_view_mut::<3, 3>(3, 3).copy_from(r_inv.matrix());
        s
    }

    /// d/dt R^T = -[ω_b] R^T
    pub fn motion_subspace_deriv(&self, q: &[Float], dq: &[Float]) -> Jacobian {
        let q_a = Vector3::new(q[0], q[1], q[2]);
        let dq_a = Vector3::new(dq[0], dq[1], dq[2]);
        let r_inv = exp_angular(&q_a).inverse().to_rotation_matrix();
        let w_body = so3_right_jacobian(&q_a) * dq_a;

        let mut ds = Jacobian::zeros(6);
        ds.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&so3_right_jacobian_deriv(&q_a, &dq_a));
        ds.fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&(-skew_symmetric(&w_body) * r_inv.matrix()));
        ds
    }
}
