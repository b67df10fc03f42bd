use na::{Isometry3, Translation3, UnitQuaternion, UnitVector3, Vector3};

use crate::{
    spatial::{spatial_vector, Jacobian},
    types::Float,
};

/// Represents a revolute joint connecting a predecessor and a successor body.
///
/// Note: the axis is expressed in the joint frame, which coincides with the
/// successor body frame unless the joint carries a child-side offset.
#[derive(Debug, Clone, PartialEq)]
pub struct RevoluteJoint {
    pub axis: UnitVector3<Float>, // axis of rotation
}

impl Default for RevoluteJoint {
    fn default() -> Self {
        RevoluteJoint {
            axis: Vector3::z_axis(),
        }
    }
}

impl RevoluteJoint {
    pub fn new(axis: UnitVector3<Float>) -> Self {
        Self { axis }
    }

    /// Rotation about axis by q
    pub fn transform(&self, q: Float) -> Isometry3<Float> {
        Isometry3::from_parts(
            Translation3::identity(),
            UnitQuaternion::from_axis_angle(&self.axis, q),
        )
    }

    pub fn motion_subspace(&self) -> Jacobian {
        Jacobian::from_column_slice(spatial_vector(&self.axis, &Vector3::zeros()).as_slice())
    }
}

#[cfg(test)]
mod revolute_tests {
    use crate::{assert_vec_close, PI};

    use super::*;

    #[test]
    fn rotates_about_axis() {
        // Arrange
        let joint = RevoluteJoint::default();

        // Act
        let t = joint.transform(PI / 2.0);

        // Assert
        assert_vec_close!(t * Vector3::<Float>::x(), Vector3::<Float>::y(), 1e-12);
    }

    #[test]
    fn motion_subspace_is_pure_angular() {
        let joint = RevoluteJoint::new(Vector3::y_axis());
        let s = joint.motion_subspace();
        assert_eq!(s.ncols(), 1);
        assert_vec_close!(s.column(0), [0f64, 1., 0., 0., 0., 0.], 1e-12);
    }
}
