use na::{Matrix6, Matrix6xX, Vector3, Vector6};

use crate::{types::Float, util::skew_symmetric};

/// A 6D spatial vector ordered as [angular; linear]. Depending on context it
/// is a twist (spatial velocity), a spatial acceleration, a wrench or an
/// impulse, expressed in a body frame unless noted otherwise.
pub type SpatialVector = Vector6<Float>;

/// A 6 x n matrix whose columns are spatial vectors, e.g. a joint motion
/// subspace or a body Jacobian.
pub type Jacobian = Matrix6xX<Float>;

pub fn spatial_vector(angular: &Vector3<Float>, linear: &Vector3<Float>) -> SpatialVector {
    SpatialVector::new(
        angular.x, angular.y, angular.z, linear.x, linear.y, linear.z,
    )
}

pub fn angular(v: &SpatialVector) -> Vector3<Float> {
    v.fixed_rows::<3>(0).into_owned()
}

pub fn linear(v: &SpatialVector) -> Vector3<Float> {
    v.fixed_rows::<3>(3).into_owned()
}

/// Spatial motion cross product, also known as the se(3) commutator:
///     ad(v) w = | ω_v x ω_w             |
///               | ω_v x v_w + v_v x ω_w |
///
/// Reference: Chapter 2.9 Spatial Cross Products in "Robot Dynamics
/// Algorithms" by Roy Featherstone
pub fn ad(v: &SpatialVector, w: &SpatialVector) -> SpatialVector {
    let (vw, vv) = (angular(v), linear(v));
    let (ww, wv) = (angular(w), linear(w));
    spatial_vector(&vw.cross(&ww), &(vw.cross(&wv) + vv.cross(&ww)))
}

/// Dual of `ad`, i.e. ad(v)^T f. For a twist v and a momentum f this is the
/// negative of the spatial force cross product v x* f.
pub fn dad(v: &SpatialVector, f: &SpatialVector) -> SpatialVector {
    let (vw, vv) = (angular(v), linear(v));
    let (fm, ff) = (angular(f), linear(f));
    spatial_vector(&(fm.cross(&vw) + ff.cross(&vv)), &ff.cross(&vw))
}

/// Matrix form of `ad`
pub fn ad_matrix(v: &SpatialVector) -> Matrix6<Float> {
    let w_hat = skew_symmetric(&angular(v));
    let v_hat = skew_symmetric(&linear(v));
    let mut m = Matrix6::zeros();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&w_hat);
    m.fixed_view_mut::<3, 3>(3, 0).copy_from(&v_hat);
    m.fixed_view_mut::<3, 3>(3, 3).copy_from(&w_hat);
    m
}
