use na::{Isometry3, Translation3, UnitQuaternion, UnitVector3, Vector3};

use crate::{
    spatial::{spatial_vector, Jacobian},
    types::Float,
};

/// Represents a prismatic joint connecting a predecessor and a successor body.
#[derive(Debug, Clone, PartialEq)]
pub struct PrismaticJoint {
    pub axis: UnitVector3<Float>, // axis of translation
}

impl PrismaticJoint {
    pub fn new(axis: UnitVector3<Float>) -> Self {
        Self { axis }
    }

    /// Translation along axis by q
    pub fn transform(&self, q: Float) -> Isometry3<Float> {
        Isometry3::from_parts(
            Translation3::from(self.axis.into_inner() * q),
            UnitQuaternion::identity(),
        )
    }

    pub fn motion_subspace(&self) -> Jacobian {
        Jacobian::from_column_slice(spatial_vector(&Vector3::zeros(), &self.axis).as_slice())
    }
}

#[cfg(test)]
mod prismatic_tests {
    use crate::assert_vec_close;

    use super::*;

    #[test]
    fn translates_along_axis() {
        let joint = PrismaticJoint::new(Vector3::x_axis());
        let t = joint.transform(2.5);
        assert_vec_close!(t.translation.vector, Vector3::new(2.5, 0., 0.), 1e-12);
        assert_vec_close!(joint.motion_subspace().column(0), [0f64, 0., 0., 1., 0., 0.], 1e-12);
    }
}
