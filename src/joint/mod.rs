use ball::BallJoint;
use fixed::FixedJoint;
use free::FreeJoint;
use itertools::izip;
use na::{DMatrix, DVector, Isometry3, Matrix6, UnitVector3};
use prismatic::PrismaticJoint;
use revolute::RevoluteJoint;
use screw::ScrewJoint;
use translational::TranslationalJoint;
use universal::UniversalJoint;

use crate::{
    assert_finite,
    coordinate::GeneralizedCoordinate,
    error::DynamicsError,
    spatial::{ad, ad_t_jac, verify_transform, Jacobian, SpatialVector},
    types::Float,
};

pub mod ball;
pub mod fixed;
pub mod free;
pub mod prismatic;
pub mod revolute;
pub mod screw;
pub mod translational;
pub mod universal;

/// The closed set of joint kinds. Every kind describes its motion in the
/// joint frame; offsets to the adjoining bodies are applied by `Joint`.
#[derive(Debug, Clone, PartialEq)]
pub enum JointType {
    Fixed(FixedJoint),
    Revolute(RevoluteJoint),
    Prismatic(PrismaticJoint),
    Screw(ScrewJoint),
    Universal(UniversalJoint),
    Ball(BallJoint),
    Translational(TranslationalJoint),
    Free(FreeJoint),
}

impl JointType {
    pub fn dof(&self) -> usize {
        match self {
            JointType::Fixed(_) => 0,
            JointType::Revolute(_) | JointType::Prismatic(_) | JointType::Screw(_) => 1,
            JointType::Universal(_) => 2,
            JointType::Ball(_) | JointType::Translational(_) => 3,
            JointType::Free(_) => 6,
        }
    }

    pub fn transform(&self, q: &[Float]) -> Isometry3<Float> {
        match self {
            JointType::Fixed(joint) => joint.transform(),
            JointType::Revolute(joint) => joint.transform(q[0]),
            JointType::Prismatic(joint) => joint.transform(q[0]),
            JointType::Screw(joint) => joint.transform(q[0]),
            JointType::Universal(joint) => joint.transform(q),
            JointType::Ball(joint) => joint.transform(q),
            JointType::Translational(joint) => joint.transform(q),
            JointType::Free(joint) => joint.transform(q),
        }
    }

    pub fn motion_subspace(&self, q: &[Float]) -> Jacobian {
        match self {
            JointType::Fixed(joint) => joint.motion_subspace(),
            JointType::Revolute(joint) => joint.motion_subspace(),
            JointType::Prismatic(joint) => joint.motion_subspace(),
            JointType::Screw(joint) => joint.motion_subspace(),
            JointType::Universal(joint) => joint.motion_subspace(q),
            JointType::Ball(joint) => joint.motion_subspace(q),
            JointType::Translational(joint) => joint.motion_subspace(),
            JointType::Free(joint) => joint.motion_subspace(q),
        }
    }

    pub fn motion_subspace_deriv(&self, q: &[Float], dq: &[Float]) -> Jacobian {
        match self {
            JointType::Universal(joint) => joint.motion_subspace_deriv(q, dq),
            JointType::Ball(joint) => joint.motion_subspace_deriv(q, dq),
            JointType::Free(joint) => joint.motion_subspace_deriv(q, dq),
            _ => Jacobian::zeros(self.dof()),
        }
    }
}

/// Selects which articulated inertia a projection operates on: the plain
/// one, or the implicit one that folds joint springs and dampers in over one
/// time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Explicit,
    Implicit,
}

/// A joint connecting a link to its parent.
///
/// The local transform maps the child body frame to the parent body frame:
///     T = T_parent_joint * T_q * T_child_joint^-1
/// and the local Jacobian S maps the joint velocities to the twist of the
/// child relative to the parent, in the child body frame.
#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    joint_type: JointType,
    coordinates: Vec<GeneralizedCoordinate>,

    transform_from_parent_body: Isometry3<Float>,
    transform_from_child_body: Isometry3<Float>,

    local_transform: Isometry3<Float>,
    local_jacobian: Jacobian,
    local_jacobian_deriv: Jacobian,

    /// Wrench transmitted through this joint, in the child body frame
    pub wrench: SpatialVector,

    inv_proj_art_inertia: DMatrix<Float>,
    inv_proj_art_inertia_implicit: DMatrix<Float>,
    total_force: DVector<Float>,
    total_impulse: DVector<Float>,
}

impl Joint {
    pub fn new(name: &str, joint_type: JointType) -> Self {
        let dof = joint_type.dof();
        let zeros = vec![0.; dof];
        Joint {
            name: name.to_string(),
            local_transform: joint_type.transform(&zeros),
            local_jacobian: joint_type.motion_subspace(&zeros),
            local_jacobian_deriv: Jacobian::zeros(dof),
            joint_type,
            coordinates: vec![GeneralizedCoordinate::new(); dof],
            transform_from_parent_body: Isometry3::identity(),
            transform_from_child_body: Isometry3::identity(),
            wrench: SpatialVector::zeros(),
            inv_proj_art_inertia: DMatrix::zeros(dof, dof),
            inv_proj_art_inertia_implicit: DMatrix::zeros(dof, dof),
            total_force: DVector::zeros(dof),
            total_impulse: DVector::zeros(dof),
        }
    }

    pub fn fixed(name: &str) -> Self {
        Joint::new(name, JointType::Fixed(FixedJoint::new()))
    }

    pub fn revolute(name: &str, axis: UnitVector3<Float>) -> Self {
        Joint::new(name, JointType::Revolute(RevoluteJoint::new(axis)))
    }

    pub fn prismatic(name: &str, axis: UnitVector3<Float>) -> Self {
        Joint::new(name, JointType::Prismatic(PrismaticJoint::new(axis)))
    }

    pub fn screw(name: &str, axis: UnitVector3<Float>, pitch: Float) -> Self {
        Joint::new(name, JointType::Screw(ScrewJoint::new(axis, pitch)))
    }

    pub fn universal(name: &str, axis1: UnitVector3<Float>, axis2: UnitVector3<Float>) -> Self {
        Joint::new(
            name,
            JointType::Universal(UniversalJoint::new(axis1, axis2)),
        )
    }

    pub fn ball(name: &str) -> Self {
        Joint::new(name, JointType::Ball(BallJoint::new()))
    }

    pub fn translational(name: &str) -> Self {
        Joint::new(name, JointType::Translational(TranslationalJoint::new()))
    }

    pub fn free(name: &str) -> Self {
        Joint::new(name, JointType::Free(FreeJoint::new()))
    }

    /// Pose of the joint frame in the parent body frame
    pub fn with_parent_offset(mut self, offset: Isometry3<Float>) -> Self {
        self.set_transform_from_parent_body(offset);
        self
    }

    /// Pose of the joint frame in the child body frame
    pub fn with_child_offset(mut self, offset: Isometry3<Float>) -> Self {
        self.set_transform_from_child_body(offset);
        self
    }

    pub fn set_transform_from_parent_body(&mut self, offset: Isometry3<Float>) {
        self.transform_from_parent_body = offset;
        self.update_local_transform();
    }

    pub fn set_transform_from_child_body(&mut self, offset: Isometry3<Float>) {
        self.transform_from_child_body = offset;
        self.update_local_transform();
        self.update_local_jacobian();
    }

    pub fn transform_from_parent_body(&self) -> &Isometry3<Float> {
        &self.transform_from_parent_body
    }

    pub fn transform_from_child_body(&self) -> &Isometry3<Float> {
        &self.transform_from_child_body
    }

    pub fn joint_type(&self) -> &JointType {
        &self.joint_type
    }

    pub fn dof(&self) -> usize {
        self.coordinates.len()
    }

    pub fn coordinates(&self) -> &[GeneralizedCoordinate] {
        &self.coordinates
    }

    pub fn coordinate(&self, i: usize) -> Result<&GeneralizedCoordinate, DynamicsError> {
        let dof = self.dof();
        self.coordinates
            .get(i)
            .ok_or(DynamicsError::CoordinateOutOfRange { index: i, dof })
    }

    pub fn coordinate_mut(
        &mut self,
        i: usize,
    ) -> Result<&mut GeneralizedCoordinate, DynamicsError> {
        let dof = self.dof();
        self.coordinates
            .get_mut(i)
            .ok_or(DynamicsError::CoordinateOutOfRange { index: i, dof })
    }

    /// Mechanism-wide index of the first coordinate, None for a fixed or
    /// detached joint
    pub fn first_index(&self) -> Option<usize> {
        self.coordinates.first().and_then(|c| c.index())
    }

    pub fn indices(&self) -> Vec<usize> {
        self.coordinates.iter().filter_map(|c| c.index()).collect()
    }

    pub(crate) fn assign_indices(&mut self, start: usize) {
        for (k, coord) in self.coordinates.iter_mut().enumerate() {
            coord.set_index(start + k);
        }
    }

    fn gather(&self, value: impl Fn(&GeneralizedCoordinate) -> Float) -> DVector<Float> {
        DVector::from_iterator(self.dof(), self.coordinates.iter().map(value))
    }

    fn scatter(
        &mut self,
        values: &[Float],
        assign: impl Fn(&mut GeneralizedCoordinate, Float),
    ) -> Result<(), DynamicsError> {
        if values.len() != self.dof() {
            return Err(DynamicsError::DimensionMismatch {
                expected: self.dof(),
                got: values.len(),
            });
        }
        for (coord, v) in izip!(self.coordinates.iter_mut(), values.iter()) {
            assign(coord, *v);
        }
        Ok(())
    }

    pub fn positions(&self) -> DVector<Float> {
        self.gather(|c| c.q)
    }

    pub fn velocities(&self) -> DVector<Float> {
        self.gather(|c| c.dq)
    }

    pub fn accelerations(&self) -> DVector<Float> {
        self.gather(|c| c.ddq)
    }

    pub fn forces(&self) -> DVector<Float> {
        self.gather(|c| c.tau)
    }

    pub fn velocity_changes(&self) -> DVector<Float> {
        self.gather(|c| c.velocity_change)
    }

    pub fn constraint_impulses(&self) -> DVector<Float> {
        self.gather(|c| c.constraint_impulse)
    }

    pub fn set_positions(&mut self, q: &[Float]) -> Result<(), DynamicsError> {
        self.scatter(q, |c, v| c.q = v)
    }

    pub fn set_velocities(&mut self, dq: &[Float]) -> Result<(), DynamicsError> {
        self.scatter(dq, |c, v| c.dq = v)
    }

    pub fn set_accelerations(&mut self, ddq: &[Float]) -> Result<(), DynamicsError> {
        self.scatter(ddq, |c, v| c.ddq = v)
    }

    pub fn set_forces(&mut self, tau: &[Float]) -> Result<(), DynamicsError> {
        self.scatter(tau, |c, v| c.tau = v)
    }

    pub fn set_constraint_impulses(&mut self, impulses: &[Float]) -> Result<(), DynamicsError> {
        self.scatter(impulses, |c, v| c.constraint_impulse = v)
    }

    pub fn local_transform(&self) -> &Isometry3<Float> {
        &self.local_transform
    }

    pub fn local_jacobian(&self) -> &Jacobian {
        &self.local_jacobian
    }

    pub fn local_jacobian_deriv(&self) -> &Jacobian {
        &self.local_jacobian_deriv
    }

    pub fn update_local_transform(&mut self) {
        let q = self.positions();
        self.local_transform = self.transform_from_parent_body
            * self.joint_type.transform(q.as_slice())
            * self.transform_from_child_body.inverse();
        if !verify_transform(&self.local_transform) {
            panic!(
                "Local transform of joint {} is not rigid: {}",
                self.name, self.local_transform
            );
        }
    }

    pub fn update_local_jacobian(&mut self) {
        let q = self.positions();
        self.local_jacobian = ad_t_jac(
            &self.transform_from_child_body,
            &self.joint_type.motion_subspace(q.as_slice()),
        );
    }

    pub fn update_local_jacobian_deriv(&mut self) {
        let (q, dq) = (self.positions(), self.velocities());
        self.local_jacobian_deriv = ad_t_jac(
            &self.transform_from_child_body,
            &self
                .joint_type
                .motion_subspace_deriv(q.as_slice(), dq.as_slice()),
        );
    }

    /// S x
    pub fn motion(&self, x: &DVector<Float>) -> SpatialVector {
        if self.dof() == 0 {
            return SpatialVector::zeros();
        }
        &self.local_jacobian * x
    }

    /// S^T f
    pub fn project_force(&self, f: &SpatialVector) -> DVector<Float> {
        self.local_jacobian.tr_mul(f)
    }

    pub fn velocity_contribution(&self) -> SpatialVector {
        self.motion(&self.velocities())
    }

    pub fn acceleration_contribution(&self) -> SpatialVector {
        self.motion(&self.accelerations())
    }

    pub fn velocity_change_contribution(&self) -> SpatialVector {
        self.motion(&self.velocity_changes())
    }

    /// Velocity-product term of the child acceleration, ad(V, S dq) + dS dq,
    /// given the child body velocity V
    pub fn partial_acceleration(&self, velocity: &SpatialVector) -> SpatialVector {
        if self.dof() == 0 {
            return SpatialVector::zeros();
        }
        let dq = self.velocities();
        ad(velocity, &(&self.local_jacobian * &dq)) + &self.local_jacobian_deriv * dq
    }

    /// Sets the generalized forces to S^T f
    pub fn update_generalized_force(&mut self, f: &SpatialVector) {
        if self.dof() == 0 {
            return;
        }
        let tau = self.project_force(f);
        assert_finite!(tau, format!("generalized force of joint {}", self.name));
        for (coord, t) in izip!(self.coordinates.iter_mut(), tau.iter()) {
            coord.tau = *t;
        }
    }

    pub fn inv_proj_art_inertia(&self, projection: Projection) -> &DMatrix<Float> {
        match projection {
            Projection::Explicit => &self.inv_proj_art_inertia,
            Projection::Implicit => &self.inv_proj_art_inertia_implicit,
        }
    }

    /// Ψ = (S^T AI S)^-1
    pub fn update_inv_proj_art_inertia(&mut self, art_inertia: &Matrix6<Float>) {
        if self.dof() == 0 {
            return;
        }
        let projected = self.local_jacobian.tr_mul(&(art_inertia * &self.local_jacobian));
        self.inv_proj_art_inertia = self.invert_projected(projected);
    }

    /// Ψ = (S^T AI S + dt D + dt² K)^-1
    pub fn update_inv_proj_art_inertia_implicit(
        &mut self,
        art_inertia: &Matrix6<Float>,
        dt: Float,
    ) {
        if self.dof() == 0 {
            return;
        }
        let mut projected = self.local_jacobian.tr_mul(&(art_inertia * &self.local_jacobian));
        for (k, coord) in self.coordinates.iter().enumerate() {
            projected[(k, k)] +=
                dt * coord.damping_coefficient() + dt * dt * coord.spring_stiffness();
        }
        self.inv_proj_art_inertia_implicit = self.invert_projected(projected);
    }

    fn invert_projected(&self, projected: DMatrix<Float>) -> DMatrix<Float> {
        match projected.try_inverse() {
            Some(inv) => {
                assert_finite!(inv, format!("inverse projected inertia of joint {}", self.name));
                inv
            }
            None => panic!(
                "Projected articulated inertia of joint {} is singular",
                self.name
            ),
        }
    }

    /// Articulated inertia of the child with the joint's own motion
    /// projected out: AI - AI S Ψ S^T AI. Still in the child frame.
    pub fn project_art_inertia(
        &self,
        art_inertia: &Matrix6<Float>,
        projection: Projection,
    ) -> Matrix6<Float> {
        if self.dof() == 0 {
            return *art_inertia;
        }
        let ai_s = art_inertia * &self.local_jacobian;
        art_inertia - &ai_s * self.inv_proj_art_inertia(projection) * ai_s.transpose()
    }

    /// AI S Ψ r: the part of a residual joint force r that the joint passes
    /// on to its parent
    pub fn transmit_residual(
        &self,
        art_inertia: &Matrix6<Float>,
        residual: &DVector<Float>,
        projection: Projection,
    ) -> SpatialVector {
        if self.dof() == 0 {
            return SpatialVector::zeros();
        }
        art_inertia * (&self.local_jacobian * (self.inv_proj_art_inertia(projection) * residual))
    }

    /// Ψ (r - S^T AI x), where x is the parent motion re-expressed in the
    /// child frame
    pub fn solve_residual(
        &self,
        art_inertia: &Matrix6<Float>,
        residual: &DVector<Float>,
        parent_motion: &SpatialVector,
        projection: Projection,
    ) -> DVector<Float> {
        if self.dof() == 0 {
            return DVector::zeros(0);
        }
        self.inv_proj_art_inertia(projection)
            * (residual - self.project_force(&(art_inertia * parent_motion)))
    }

    pub fn total_force(&self) -> &DVector<Float> {
        &self.total_force
    }

    pub fn total_impulse(&self) -> &DVector<Float> {
        &self.total_impulse
    }

    /// tau + spring + damping - S^T (AI_impl * partial acceleration + bias)
    pub fn update_total_force(&mut self, force: &SpatialVector, dt: Float) {
        if self.dof() == 0 {
            return;
        }
        let applied = self.gather(|c| c.tau + c.spring_force(dt) + c.damping_force());
        self.total_force = applied - self.project_force(force);
        assert_finite!(self.total_force, format!("total force of joint {}", self.name));
    }

    /// Solves the joint accelerations from the parent acceleration expressed
    /// in the child frame
    pub fn update_acceleration(
        &mut self,
        art_inertia_implicit: &Matrix6<Float>,
        parent_acceleration: &SpatialVector,
    ) {
        if self.dof() == 0 {
            return;
        }
        let ddq = self.solve_residual(
            art_inertia_implicit,
            &self.total_force,
            parent_acceleration,
            Projection::Implicit,
        );
        assert_finite!(ddq, format!("acceleration of joint {}", self.name));
        for (coord, a) in izip!(self.coordinates.iter_mut(), ddq.iter()) {
            coord.ddq = *a;
        }
    }

    /// Coordinate constraint impulses minus S^T bias impulse
    pub fn update_total_impulse(&mut self, bias_impulse: &SpatialVector) {
        if self.dof() == 0 {
            return;
        }
        self.total_impulse = self.constraint_impulses() - self.project_force(bias_impulse);
    }

    pub fn update_velocity_change(
        &mut self,
        art_inertia: &Matrix6<Float>,
        parent_velocity_change: &SpatialVector,
    ) {
        if self.dof() == 0 {
            return;
        }
        let delta = self.solve_residual(
            art_inertia,
            &self.total_impulse,
            parent_velocity_change,
            Projection::Explicit,
        );
        assert_finite!(delta, format!("velocity change of joint {}", self.name));
        for (coord, d) in izip!(self.coordinates.iter_mut(), delta.iter()) {
            coord.velocity_change = *d;
        }
    }

    /// Folds the velocity jump of the last impulse pass into velocity,
    /// acceleration and force as if it happened over one step of length dt
    pub fn apply_velocity_change(&mut self, dt: Float) {
        for coord in self.coordinates.iter_mut() {
            coord.dq += coord.velocity_change;
            coord.ddq += coord.velocity_change / dt;
            coord.tau += coord.constraint_impulse / dt;
        }
        assert_finite!(self.velocities(), format!("velocity of joint {}", self.name));
        assert_finite!(self.accelerations(), format!("acceleration of joint {}", self.name));
        assert_finite!(self.forces(), format!("generalized force of joint {}", self.name));
    }

    pub fn clear_constraint_impulse(&mut self) {
        for coord in self.coordinates.iter_mut() {
            coord.constraint_impulse = 0.;
            coord.velocity_change = 0.;
        }
        self.total_impulse.fill(0.);
    }

    pub fn integrate_velocities(&mut self, dt: Float) {
        for coord in self.coordinates.iter_mut() {
            coord.dq += dt * coord.ddq;
        }
    }

    /// q += dt * dq, coordinate by coordinate. For ball and free joints this
    /// is a first-order update of the exponential coordinates.
    pub fn integrate_positions(&mut self, dt: Float) {
        for coord in self.coordinates.iter_mut() {
            coord.q += dt * coord.dq;
        }
    }

    /// Diagonal spring/damper contribution to a column of the augmented
    /// mass matrix: (dt D + dt² K) x
    pub fn implicit_stiffness(&self, x: &DVector<Float>, dt: Float) -> DVector<Float> {
        DVector::from_iterator(
            self.dof(),
            izip!(self.coordinates.iter(), x.iter()).map(|(c, x)| {
                (dt * c.damping_coefficient() + dt * dt * c.spring_stiffness()) * x
            }),
        )
    }
}
