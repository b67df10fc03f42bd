use na::{Isometry3, Matrix3, Translation3, UnitQuaternion, Vector3};

use crate::{spatial::Jacobian, types::Float};

/// Free translation along the three joint-frame axes without rotation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranslationalJoint;

impl TranslationalJoint {
    pub fn new() -> Self {
        TranslationalJoint
    }

    pub fn transform(&self, q: &[Float]) -> Isometry3<Float> {
        Isometry3::from_parts(
            Translation3::from(Vector3::new(q[0], q[1], q[2])),
            UnitQuaternion::identity(),
        )
    }

    pub fn motion_subspace(&self) -> Jacobian {
        let mut s = Jacobian::zeros(3);
        s.fixed_view_mut::<3, 3>(3, 0)
            .copy_from(&Matrix3::identity());
        s
    }
}
