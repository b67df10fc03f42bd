use na::Isometry3;

use crate::{spatial::Jacobian, types::Float};

/// Rigidly welds the child body to its parent. Has no degrees of freedom.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FixedJoint;

impl FixedJoint {
    pub fn new() -> Self {
        FixedJoint
    }

    pub fn transform(&self) -> Isometry3<Float> {
        Isometry3::identity()
    }

    pub fn motion_subspace(&self) -> Jacobian {
        Jacobian::zeros(0)
    }
}

#[cfg(test)]
mod fixed_joint_tests {
    use super::*;

    #[test]
    fn fixed_joint_has_empty_motion_subspace() {
        let joint = FixedJoint::new();
        assert_eq!(joint.motion_subspace().ncols(), 0);
        assert_eq!(joint.transform(), Isometry3::identity());
    }
}
