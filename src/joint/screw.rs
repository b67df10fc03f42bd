use na::{Isometry3, Translation3, UnitQuaternion, UnitVector3};

use crate::{
    spatial::{spatial_vector, Jacobian},
    types::Float,
};

/// Rotation about an axis coupled with translation along the same axis.
/// One unit of rotation (rad) advances the body by `pitch` along the axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrewJoint {
    pub axis: UnitVector3<Float>,
    pub pitch: Float,
}

impl ScrewJoint {
    pub fn new(axis: UnitVector3<Float>, pitch: Float) -> Self {
        Self { axis, pitch }
    }

    pub fn transform(&self, q: Float) -> Isometry3<Float> {
        Isometry3::from_parts(
            Translation3::from(self.axis.into_inner() * (self.pitch * q)),
            UnitQuaternion::from_axis_angle(&self.axis, q),
        )
    }

    pub fn motion_subspace(&self) -> Jacobian {
        let s = spatial_vector(&self.axis, &(self.axis.into_inner() * self.pitch));
        Jacobian::from_column_slice(s.as_slice())
    }
}
