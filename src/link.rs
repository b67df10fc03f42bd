use std::sync::atomic::{AtomicUsize, Ordering};

use na::{DVector, Isometry3, Matrix3, Matrix6, Translation3, Vector3};

use crate::{
    assert_finite,
    error::DynamicsError,
    inertia::{kinetic_energy, MassProperties},
    joint::{Joint, Projection},
    spatial::{
        ad, ad_inv_r_linear, ad_inv_t, ad_inv_t_jac, angular, d_ad_inv_t, d_ad_t, dad, linear,
        spatial_vector, transform_inertia, verify_transform, Jacobian, SpatialVector,
    },
    types::Float,
    util::skew_symmetric,
};

static NEXT_LINK_ID: AtomicUsize = AtomicUsize::new(0);

/// Sum of child wrenches, each re-expressed in this link's frame through the
/// child's joint transform
pub fn child_wrench_sum<'a>(
    children: impl IntoIterator<Item = (&'a Link, SpatialVector)>,
) -> SpatialVector {
    children
        .into_iter()
        .fold(SpatialVector::zeros(), |sum, (child, f)| {
            sum + d_ad_inv_t(child.joint.local_transform(), &f)
        })
}

/// A rigid body node of the kinematic tree, moved by exactly one parent
/// joint.
///
/// All spatial quantities are expressed in the body frame unless a method
/// says otherwise.
#[derive(Debug)]
pub struct Link {
    pub name: String,
    id: usize,
    index: Option<usize>,
    parent: Option<usize>,
    children: Vec<usize>,
    joint: Joint,

    mass_properties: MassProperties,
    inertia: Matrix6<Float>,

    gravity_mode: bool,
    collidable: bool,
    colliding: bool,
    friction_coeff: Float,
    restitution_coeff: Float,

    /// Sorted mechanism indices of every coordinate this link's motion
    /// depends on
    dependent_coords: Vec<usize>,

    world_transform: Isometry3<Float>,
    velocity: SpatialVector,
    partial_acceleration: SpatialVector,
    acceleration: SpatialVector,

    /// Force transmitted to the parent through the parent joint
    force: SpatialVector,
    ext_force: SpatialVector,

    art_inertia: Matrix6<Float>,
    art_inertia_implicit: Matrix6<Float>,
    bias_force: SpatialVector,

    constraint_impulse: SpatialVector,
    velocity_change: SpatialVector,
    bias_impulse: SpatialVector,
    impulse_force: SpatialVector,

    jacobian: Jacobian,
    jacobian_deriv: Jacobian,
    pub(crate) jacobian_dirty: bool,
    pub(crate) jacobian_deriv_dirty: bool,
}

impl Link {
    pub fn new(
        name: &str,
        joint: Joint,
        mass_properties: MassProperties,
    ) -> Result<Self, DynamicsError> {
        mass_properties.validate()?;
        let inertia = mass_properties.spatial_inertia();
        Ok(Link {
            name: name.to_string(),
            id: NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed),
            index: None,
            parent: None,
            children: vec![],
            joint,
            mass_properties,
            inertia,
            gravity_mode: true,
            collidable: true,
            colliding: false,
            friction_coeff: 1.0,
            restitution_coeff: 0.0,
            dependent_coords: vec![],
            world_transform: Isometry3::identity(),
            velocity: SpatialVector::zeros(),
            partial_acceleration: SpatialVector::zeros(),
            acceleration: SpatialVector::zeros(),
            force: SpatialVector::zeros(),
            ext_force: SpatialVector::zeros(),
            art_inertia: inertia,
            art_inertia_implicit: inertia,
            bias_force: SpatialVector::zeros(),
            constraint_impulse: SpatialVector::zeros(),
            velocity_change: SpatialVector::zeros(),
            bias_impulse: SpatialVector::zeros(),
            impulse_force: SpatialVector::zeros(),
            jacobian: Jacobian::zeros(0),
            jacobian_deriv: Jacobian::zeros(0),
            jacobian_dirty: true,
            jacobian_deriv_dirty: true,
        })
    }

    /// Process-unique id assigned at construction
    pub fn id(&self) -> usize {
        self.id
    }

    /// Position in the mechanism arena, None until attached
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn joint(&self) -> &Joint {
        &self.joint
    }

    /// Mutable access to the parent joint. Kinematics are not refreshed;
    /// call `Mechanism::update_kinematics` after changing coordinates.
    pub fn joint_mut(&mut self) -> &mut Joint {
        &mut self.joint
    }

    /// Binds the link into a mechanism: tree index, coordinate indices,
    /// dependent coordinates and Jacobian storage.
    pub(crate) fn attach(&mut self, index: usize, parent: Option<&Link>, first_coord: usize) {
        self.index = Some(index);
        self.parent = parent.and_then(|p| p.index);
        self.joint.assign_indices(first_coord);

        self.dependent_coords = parent.map_or(vec![], |p| p.dependent_coords.clone());
        self.dependent_coords.extend(self.joint.indices());
        if !self.dependent_coords.windows(2).all(|w| w[0] < w[1]) {
            panic!(
                "Dependent coordinates of link {} are not strictly increasing: {:?}",
                self.name, self.dependent_coords
            );
        }

        let n = self.dependent_coords.len();
        self.jacobian = Jacobian::zeros(n);
        self.jacobian_deriv = Jacobian::zeros(n);
        self.jacobian_dirty = true;
        self.jacobian_deriv_dirty = true;
    }

    pub(crate) fn add_child(&mut self, index: usize) {
        self.children.push(index);
    }

    pub fn mass_properties(&self) -> &MassProperties {
        &self.mass_properties
    }

    pub fn mass(&self) -> Float {
        self.mass_properties.mass
    }

    pub fn local_com(&self) -> &Vector3<Float> {
        &self.mass_properties.com
    }

    /// 6x6 spatial inertia about the body origin
    pub fn inertia(&self) -> &Matrix6<Float> {
        &self.inertia
    }

    pub fn set_mass_properties(
        &mut self,
        mass_properties: MassProperties,
    ) -> Result<(), DynamicsError> {
        mass_properties.validate()?;
        self.mass_properties = mass_properties;
        self.inertia = self.mass_properties.spatial_inertia();
        Ok(())
    }

    pub fn set_mass(&mut self, mass: Float) -> Result<(), DynamicsError> {
        self.mass_properties.set_mass(mass)?;
        self.inertia = self.mass_properties.spatial_inertia();
        Ok(())
    }

    pub fn set_local_com(&mut self, com: Vector3<Float>) {
        self.mass_properties.com = com;
        self.inertia = self.mass_properties.spatial_inertia();
    }

    pub fn set_moment(
        &mut self,
        ixx: Float,
        iyy: Float,
        izz: Float,
        ixy: Float,
        ixz: Float,
        iyz: Float,
    ) -> Result<(), DynamicsError> {
        self.mass_properties
            .set_moment(ixx, iyy, izz, ixy, ixz, iyz)?;
        self.inertia = self.mass_properties.spatial_inertia();
        Ok(())
    }

    pub fn gravity_mode(&self) -> bool {
        self.gravity_mode
    }

    pub fn set_gravity_mode(&mut self, gravity_mode: bool) {
        self.gravity_mode = gravity_mode;
    }

    pub fn is_collidable(&self) -> bool {
        self.collidable
    }

    pub fn set_collidable(&mut self, collidable: bool) {
        self.collidable = collidable;
    }

    /// Set by a contact detector; the dynamics never read it
    pub fn is_colliding(&self) -> bool {
        self.colliding
    }

    pub fn set_colliding(&mut self, colliding: bool) {
        self.colliding = colliding;
    }

    pub fn friction_coeff(&self) -> Float {
        self.friction_coeff
    }

    pub fn set_friction_coeff(&mut self, coeff: Float) -> Result<(), DynamicsError> {
        if coeff < 0.0 || coeff.is_nan() {
            return Err(DynamicsError::InvalidFrictionCoeff(coeff));
        }
        self.friction_coeff = coeff;
        Ok(())
    }

    pub fn restitution_coeff(&self) -> Float {
        self.restitution_coeff
    }

    pub fn set_restitution_coeff(&mut self, coeff: Float) -> Result<(), DynamicsError> {
        if !(0.0..=1.0).contains(&coeff) {
            return Err(DynamicsError::InvalidRestitutionCoeff(coeff));
        }
        self.restitution_coeff = coeff;
        Ok(())
    }

    pub fn dependent_coords(&self) -> &[usize] {
        &self.dependent_coords
    }

    pub fn num_dependent_coords(&self) -> usize {
        self.dependent_coords.len()
    }

    pub fn dependent_coord_index(&self, i: usize) -> Option<usize> {
        self.dependent_coords.get(i).copied()
    }

    pub fn depends_on(&self, coord_index: usize) -> bool {
        self.dependent_coords.binary_search(&coord_index).is_ok()
    }

    pub fn world_transform(&self) -> &Isometry3<Float> {
        &self.world_transform
    }

    pub fn velocity(&self) -> &SpatialVector {
        &self.velocity
    }

    pub fn partial_acceleration(&self) -> &SpatialVector {
        &self.partial_acceleration
    }

    pub fn acceleration(&self) -> &SpatialVector {
        &self.acceleration
    }

    pub fn body_force(&self) -> &SpatialVector {
        &self.force
    }

    pub fn art_inertia(&self) -> &Matrix6<Float> {
        &self.art_inertia
    }

    pub fn art_inertia_implicit(&self) -> &Matrix6<Float> {
        &self.art_inertia_implicit
    }

    pub fn art_inertia_for(&self, projection: Projection) -> &Matrix6<Float> {
        match projection {
            Projection::Explicit => &self.art_inertia,
            Projection::Implicit => &self.art_inertia_implicit,
        }
    }

    pub fn bias_force(&self) -> &SpatialVector {
        &self.bias_force
    }

    pub fn velocity_change(&self) -> &SpatialVector {
        &self.velocity_change
    }

    pub fn bias_impulse(&self) -> &SpatialVector {
        &self.bias_impulse
    }

    pub fn impulse_force(&self) -> &SpatialVector {
        &self.impulse_force
    }

    /// Body Jacobian as of the last refresh. Use `Mechanism::body_jacobian`
    /// to get a current one.
    pub fn cached_jacobian(&self) -> &Jacobian {
        &self.jacobian
    }

    pub fn cached_jacobian_deriv(&self) -> &Jacobian {
        &self.jacobian_deriv
    }

    /// Re-express a parent quantity in this frame, zero for the root
    fn from_parent(&self, parent_value: Option<&SpatialVector>) -> SpatialVector {
        parent_value.map_or(SpatialVector::zeros(), |v| {
            ad_inv_t(self.joint.local_transform(), v)
        })
    }

    /// Gravity wrench m*g acting at the center of mass, in the body frame
    pub fn gravity_force(&self, gravity: &Vector3<Float>) -> SpatialVector {
        if self.gravity_mode {
            self.inertia * ad_inv_r_linear(&self.world_transform, gravity)
        } else {
            SpatialVector::zeros()
        }
    }

    /// Velocity-product wrench dad(V, I V)
    fn coriolis_force(&self) -> SpatialVector {
        dad(&self.velocity, &(self.inertia * self.velocity))
    }

    pub(crate) fn update_transform(&mut self, parent: Option<&Link>) {
        self.joint.update_local_transform();
        self.joint.update_local_jacobian();

        self.world_transform = match parent {
            Some(parent) => parent.world_transform * self.joint.local_transform(),
            None => *self.joint.local_transform(),
        };
        if !verify_transform(&self.world_transform) {
            panic!(
                "World transform of link {} is not rigid: {}",
                self.name, self.world_transform
            );
        }

        self.jacobian_dirty = true;
        self.jacobian_deriv_dirty = true;
    }

    pub(crate) fn update_velocity(&mut self, parent: Option<&Link>) {
        self.velocity =
            self.from_parent(parent.map(|p| &p.velocity)) + self.joint.velocity_contribution();
        assert_finite!(self.velocity, format!("velocity of link {}", self.name));
        self.jacobian_deriv_dirty = true;
    }

    pub(crate) fn update_partial_acceleration(&mut self) {
        self.joint.update_local_jacobian_deriv();
        self.partial_acceleration = self.joint.partial_acceleration(&self.velocity);
    }

    pub(crate) fn update_acceleration(&mut self, parent: Option<&Link>) {
        self.acceleration = self.from_parent(parent.map(|p| &p.acceleration))
            + self.partial_acceleration
            + self.joint.acceleration_contribution();
        assert_finite!(self.acceleration, format!("acceleration of link {}", self.name));
    }

    /// F = I A - Fext - Fg - dad(V, I V) + Σ children
    pub(crate) fn update_body_force(
        &mut self,
        children: &[&Link],
        gravity: &Vector3<Float>,
        with_external: bool,
    ) {
        let mut f = self.inertia * self.acceleration;
        if with_external {
            f -= self.ext_force;
        }
        f -= self.gravity_force(gravity);
        f -= self.coriolis_force();
        f += child_wrench_sum(children.iter().map(|c| (*c, c.force)));

        assert_finite!(f, format!("body force of link {}", self.name));
        self.force = f;
        self.joint.wrench = f;
    }

    pub(crate) fn update_generalized_force(&mut self) {
        self.joint.update_generalized_force(&self.force);
    }

    pub(crate) fn update_art_inertia(&mut self, children: &[&Link], dt: Float) {
        let mut ai = self.inertia;
        let mut ai_implicit = self.inertia;
        for child in children {
            let t = child.joint.local_transform();
            ai += transform_inertia(
                t,
                &child
                    .joint
                    .project_art_inertia(&child.art_inertia, Projection::Explicit),
            );
            ai_implicit += transform_inertia(
                t,
                &child
                    .joint
                    .project_art_inertia(&child.art_inertia_implicit, Projection::Implicit),
            );
        }
        assert_finite!(ai, format!("articulated inertia of link {}", self.name));
        assert_finite!(
            ai_implicit,
            format!("implicit articulated inertia of link {}", self.name)
        );

        self.joint.update_inv_proj_art_inertia(&ai);
        self.joint
            .update_inv_proj_art_inertia_implicit(&ai_implicit, dt);
        self.art_inertia = ai;
        self.art_inertia_implicit = ai_implicit;
    }

    /// Bias force a child passes to its parent, in the child frame:
    /// bias + AI_impl (partial acceleration + S Ψ_impl total force)
    fn propagated_bias_force(&self) -> SpatialVector {
        self.bias_force
            + self.art_inertia_implicit * self.partial_acceleration
            + self.joint.transmit_residual(
                &self.art_inertia_implicit,
                self.joint.total_force(),
                Projection::Implicit,
            )
    }

    pub(crate) fn update_bias_force(
        &mut self,
        children: &[&Link],
        gravity: &Vector3<Float>,
        dt: Float,
    ) {
        let mut bias = -self.coriolis_force() - self.ext_force - self.gravity_force(gravity);
        bias += child_wrench_sum(children.iter().map(|c| (*c, c.propagated_bias_force())));
        assert_finite!(bias, format!("bias force of link {}", self.name));
        self.bias_force = bias;

        self.joint.update_total_force(
            &(self.art_inertia_implicit * self.partial_acceleration + self.bias_force),
            dt,
        );
    }

    pub(crate) fn update_joint_and_body_acceleration(&mut self, parent: Option<&Link>) {
        let parent_acc = self.from_parent(parent.map(|p| &p.acceleration));
        self.joint
            .update_acceleration(&self.art_inertia_implicit, &parent_acc);
        self.acceleration =
            parent_acc + self.partial_acceleration + self.joint.acceleration_contribution();
        assert_finite!(self.acceleration, format!("acceleration of link {}", self.name));
    }

    pub(crate) fn update_transmitted_force(&mut self) {
        self.force = self.bias_force + self.art_inertia_implicit * self.acceleration;
        assert_finite!(self.force, format!("transmitted force of link {}", self.name));
        self.joint.wrench = self.force;
    }

    fn propagated_bias_impulse(&self) -> SpatialVector {
        self.bias_impulse
            + self.joint.transmit_residual(
                &self.art_inertia,
                self.joint.total_impulse(),
                Projection::Explicit,
            )
    }

    pub(crate) fn update_bias_impulse(&mut self, children: &[&Link]) {
        let mut bias = -self.constraint_impulse;
        bias += child_wrench_sum(children.iter().map(|c| (*c, c.propagated_bias_impulse())));
        assert_finite!(bias, format!("bias impulse of link {}", self.name));
        self.bias_impulse = bias;
        self.joint.update_total_impulse(&self.bias_impulse);
    }

    pub(crate) fn update_joint_velocity_change(&mut self, parent: Option<&Link>) {
        let parent_change = self.from_parent(parent.map(|p| &p.velocity_change));
        self.joint
            .update_velocity_change(&self.art_inertia, &parent_change);
        self.velocity_change = parent_change + self.joint.velocity_change_contribution();
        assert_finite!(
            self.velocity_change,
            format!("velocity change of link {}", self.name)
        );
    }

    pub(crate) fn update_body_imp_force(&mut self) {
        self.impulse_force = self.bias_impulse + self.art_inertia * self.velocity_change;
        assert_finite!(
            self.impulse_force,
            format!("impulse force of link {}", self.name)
        );
    }

    /// Velocity jump of the impulse pass. The partial acceleration and dS
    /// depend on the velocity, so they are refreshed here.
    pub(crate) fn update_constrained_joint_and_body_acceleration(&mut self, dt: Float) {
        self.joint.apply_velocity_change(dt);
        self.velocity += self.velocity_change;
        assert_finite!(self.velocity, format!("velocity of link {}", self.name));
        self.update_partial_acceleration();
        self.jacobian_deriv_dirty = true;
    }

    pub(crate) fn update_constrained_transmitted_force(&mut self, dt: Float) {
        self.acceleration += self.velocity_change / dt;
        self.force += dt * self.impulse_force;
        assert_finite!(self.acceleration, format!("acceleration of link {}", self.name));
        assert_finite!(self.force, format!("force of link {}", self.name));
        self.joint.wrench = self.force;
    }

    /// Motion response to a unit generalized acceleration x of this joint:
    /// AdInvT(T, dV_parent) + S x
    pub fn update_mass_matrix(
        &self,
        parent_motion: Option<&SpatialVector>,
        x: &DVector<Float>,
    ) -> SpatialVector {
        self.from_parent(parent_motion) + self.joint.motion(x)
    }

    /// Inertial force of a unit motion plus the children's contributions
    pub fn aggregate_mass_matrix<'a>(
        &self,
        motion: &SpatialVector,
        children: impl IntoIterator<Item = (&'a Link, SpatialVector)>,
    ) -> SpatialVector {
        self.inertia * motion + child_wrench_sum(children)
    }

    /// Bias a child passes up in the inverse mass matrix pass:
    /// c + AI S Ψ a
    pub fn propagated_inv_mass_bias(
        &self,
        bias: &SpatialVector,
        residual: &DVector<Float>,
        projection: Projection,
    ) -> SpatialVector {
        bias + self.joint.transmit_residual(
            self.art_inertia_for(projection),
            residual,
            projection,
        )
    }

    /// Bias and residual (unit force minus S^T bias) for one column of the
    /// inverse mass matrix. `children` yields each child with its already
    /// propagated bias.
    pub fn update_inv_mass_matrix<'a>(
        &self,
        unit_force: &DVector<Float>,
        children: impl IntoIterator<Item = (&'a Link, SpatialVector)>,
    ) -> (SpatialVector, DVector<Float>) {
        let bias = child_wrench_sum(children);
        let residual = unit_force - self.joint.project_force(&bias);
        (bias, residual)
    }

    /// Joint response and resulting motion for one column of the inverse
    /// mass matrix
    pub fn aggregate_inv_mass_matrix(
        &self,
        parent_motion: Option<&SpatialVector>,
        residual: &DVector<Float>,
        projection: Projection,
    ) -> (DVector<Float>, SpatialVector) {
        let parent_motion = self.from_parent(parent_motion);
        let segment = self.joint.solve_residual(
            self.art_inertia_for(projection),
            residual,
            &parent_motion,
            projection,
        );
        let motion = parent_motion + self.joint.motion(&segment);
        (segment, motion)
    }

    /// Velocity-product acceleration accumulated from the root, without
    /// joint accelerations
    pub fn update_combined_vector(&self, parent_motion: Option<&SpatialVector>) -> SpatialVector {
        self.from_parent(parent_motion) + self.partial_acceleration
    }

    /// I Cg_dV - Fg - dad(V, I V) + Σ children
    pub fn aggregate_combined_vector<'a>(
        &self,
        motion: &SpatialVector,
        gravity: &Vector3<Float>,
        children: impl IntoIterator<Item = (&'a Link, SpatialVector)>,
    ) -> SpatialVector {
        self.inertia * motion - self.gravity_force(gravity) - self.coriolis_force()
            + child_wrench_sum(children)
    }

    pub fn aggregate_gravity_force<'a>(
        &self,
        gravity: &Vector3<Float>,
        children: impl IntoIterator<Item = (&'a Link, SpatialVector)>,
    ) -> SpatialVector {
        self.gravity_force(gravity) + child_wrench_sum(children)
    }

    pub fn aggregate_external_force<'a>(
        &self,
        children: impl IntoIterator<Item = (&'a Link, SpatialVector)>,
    ) -> SpatialVector {
        self.ext_force + child_wrench_sum(children)
    }

    pub(crate) fn update_body_jacobian(&mut self, parent: Option<&Link>) {
        let dof = self.joint.dof();
        let n_parent = self.dependent_coords.len() - dof;
        if let Some(parent) = parent {
            self.jacobian
                .columns_mut(0, n_parent)
                .copy_from(&ad_inv_t_jac(self.joint.local_transform(), &parent.jacobian));
        }
        self.jacobian
            .columns_mut(n_parent, dof)
            .copy_from(self.joint.local_jacobian());
        self.jacobian_dirty = false;
    }

    /// Requires a current body Jacobian. Parent columns follow
    ///     d/dt AdInvT(T, J_p) = AdInvT(T, dJ_p) - ad(S dq, AdInvT(T, J_p))
    pub(crate) fn update_body_jacobian_deriv(&mut self, parent: Option<&Link>) {
        let dof = self.joint.dof();
        let n_parent = self.dependent_coords.len() - dof;
        if let Some(parent) = parent {
            let joint_velocity = self.joint.velocity_contribution();
            let transported =
                ad_inv_t_jac(self.joint.local_transform(), &parent.jacobian_deriv);
            for k in 0..n_parent {
                let col: SpatialVector = self.jacobian.column(k).into_owned();
                let d: SpatialVector = transported.column(k).into_owned();
                self.jacobian_deriv
                    .set_column(k, &(d - ad(&joint_velocity, &col)));
            }
        }
        self.jacobian_deriv
            .columns_mut(n_parent, dof)
            .copy_from(self.joint.local_jacobian_deriv());
        self.jacobian_deriv_dirty = false;
    }

    /// Shift a body-frame Jacobian to a point offset from the body origin
    fn shift_jacobian(jac: &Jacobian, offset: &Vector3<Float>) -> Jacobian {
        let mut shifted = jac.clone();
        let p_hat = skew_symmetric(offset);
        let ang = jac.fixed_rows::<3>(0).into_owned();
        let lin = jac.fixed_rows::<3>(3) - p_hat * ang;
        shifted.fixed_rows_mut::<3>(3).copy_from(&lin);
        shifted
    }

    fn rotate_jacobian(&self, jac: &Jacobian) -> Jacobian {
        let r = self.world_transform.rotation.to_rotation_matrix();
        let mut rotated = jac.clone();
        rotated
            .fixed_rows_mut::<3>(0)
            .copy_from(&(r.matrix() * jac.fixed_rows::<3>(0)));
        rotated
            .fixed_rows_mut::<3>(3)
            .copy_from(&(r.matrix() * jac.fixed_rows::<3>(3)));
        rotated
    }

    fn rotate_to_world(&self, v: &SpatialVector) -> SpatialVector {
        let r = self.world_transform.rotation;
        spatial_vector(&(r * angular(v)), &(r * linear(v)))
    }

    /// Angular velocity and linear velocity of a point at `offset` (body
    /// frame), expressed in the body frame if `local`, else in the world
    /// frame
    pub fn world_velocity(&self, offset: &Vector3<Float>, local: bool) -> SpatialVector {
        let w = angular(&self.velocity);
        let v = spatial_vector(&w, &(linear(&self.velocity) + w.cross(offset)));
        if local {
            v
        } else {
            self.rotate_to_world(&v)
        }
    }

    /// Angular acceleration and classical linear acceleration of a point at
    /// `offset` (body frame)
    pub fn world_acceleration(&self, offset: &Vector3<Float>, local: bool) -> SpatialVector {
        let (w, v) = (angular(&self.velocity), linear(&self.velocity));
        let (dw, dv) = (angular(&self.acceleration), linear(&self.acceleration));
        let a = dv + dw.cross(offset) + w.cross(&(v + w.cross(offset)));
        let acc = spatial_vector(&dw, &a);
        if local {
            acc
        } else {
            self.rotate_to_world(&acc)
        }
    }

    /// Jacobian of `world_velocity` with respect to the dependent coordinate
    /// velocities. Uses the cached body Jacobian.
    pub fn world_jacobian(&self, offset: &Vector3<Float>, local: bool) -> Jacobian {
        let shifted = Link::shift_jacobian(&self.jacobian, offset);
        if local {
            shifted
        } else {
            self.rotate_jacobian(&shifted)
        }
    }

    /// Time derivative of `world_jacobian`. With `local` the result is the
    /// derivative of the body-frame point Jacobian components; otherwise
    /// d/dt (R J) = R ([ω] J + dJ), applied to both row blocks.
    pub fn world_jacobian_time_deriv(&self, offset: &Vector3<Float>, local: bool) -> Jacobian {
        let shifted_deriv = Link::shift_jacobian(&self.jacobian_deriv, offset);
        if local {
            return shifted_deriv;
        }
        let shifted = Link::shift_jacobian(&self.jacobian, offset);
        let w_hat: Matrix3<Float> = skew_symmetric(&angular(&self.velocity));
        let mut d = shifted_deriv;
        let ang = d.fixed_rows::<3>(0) + w_hat * shifted.fixed_rows::<3>(0);
        let lin = d.fixed_rows::<3>(3) + w_hat * shifted.fixed_rows::<3>(3);
        d.fixed_rows_mut::<3>(0).copy_from(&ang);
        d.fixed_rows_mut::<3>(3).copy_from(&lin);
        self.rotate_jacobian(&d)
    }

    pub fn world_com(&self) -> Vector3<Float> {
        (self.world_transform * na::Point3::from(self.mass_properties.com)).coords
    }

    pub fn world_com_velocity(&self) -> Vector3<Float> {
        linear(&self.world_velocity(&self.mass_properties.com, false))
    }

    pub fn world_com_acceleration(&self) -> Vector3<Float> {
        linear(&self.world_acceleration(&self.mass_properties.com, false))
    }

    /// Wrench of a point force, in the body frame about the body origin
    fn point_wrench(
        &self,
        force: &Vector3<Float>,
        offset: &Vector3<Float>,
        force_local: bool,
        offset_local: bool,
    ) -> SpatialVector {
        let p = if offset_local {
            *offset
        } else {
            (self.world_transform.inverse() * na::Point3::from(*offset)).coords
        };
        let f = if force_local {
            *force
        } else {
            self.world_transform.rotation.inverse() * force
        };
        let at_point = Isometry3::from_parts(Translation3::from(p), na::UnitQuaternion::identity());
        d_ad_inv_t(&at_point, &spatial_vector(&Vector3::zeros(), &f))
    }

    pub fn add_ext_force(
        &mut self,
        force: &Vector3<Float>,
        offset: &Vector3<Float>,
        force_local: bool,
        offset_local: bool,
    ) {
        self.ext_force += self.point_wrench(force, offset, force_local, offset_local);
    }

    pub fn set_ext_force(
        &mut self,
        force: &Vector3<Float>,
        offset: &Vector3<Float>,
        force_local: bool,
        offset_local: bool,
    ) {
        self.ext_force = self.point_wrench(force, offset, force_local, offset_local);
    }

    pub fn add_ext_torque(&mut self, torque: &Vector3<Float>, local: bool) {
        let t = if local {
            *torque
        } else {
            self.world_transform.rotation.inverse() * torque
        };
        self.ext_force += spatial_vector(&t, &Vector3::zeros());
    }

    /// Replaces the torque part of the external wrench
    pub fn set_ext_torque(&mut self, torque: &Vector3<Float>, local: bool) {
        let t = if local {
            *torque
        } else {
            self.world_transform.rotation.inverse() * torque
        };
        self.ext_force.fixed_rows_mut::<3>(0).copy_from(&t);
    }

    pub fn external_force_local(&self) -> &SpatialVector {
        &self.ext_force
    }

    /// External wrench in the world frame, about the world origin
    pub fn external_force_global(&self) -> SpatialVector {
        d_ad_inv_t(&self.world_transform, &self.ext_force)
    }

    pub fn clear_external_forces(&mut self) {
        self.ext_force = SpatialVector::zeros();
    }

    pub fn constraint_impulse(&self) -> &SpatialVector {
        &self.constraint_impulse
    }

    pub fn add_constraint_impulse_at(
        &mut self,
        impulse: &Vector3<Float>,
        offset: &Vector3<Float>,
        impulse_local: bool,
        offset_local: bool,
    ) {
        let imp = self.point_wrench(impulse, offset, impulse_local, offset_local);
        self.add_constraint_impulse(&imp);
    }

    /// Adds a spatial impulse given in the body frame
    pub fn add_constraint_impulse(&mut self, impulse: &SpatialVector) {
        assert_finite!(impulse, format!("constraint impulse on link {}", self.name));
        self.constraint_impulse += impulse;
    }

    pub fn set_constraint_impulse(&mut self, impulse: &SpatialVector) {
        assert_finite!(impulse, format!("constraint impulse on link {}", self.name));
        self.constraint_impulse = *impulse;
    }

    pub fn clear_constraint_impulse(&mut self) {
        self.constraint_impulse = SpatialVector::zeros();
        self.velocity_change = SpatialVector::zeros();
        self.bias_impulse = SpatialVector::zeros();
        self.impulse_force = SpatialVector::zeros();
        self.joint.clear_constraint_impulse();
    }

    pub fn kinetic_energy(&self) -> Float {
        kinetic_energy(&self.inertia, &self.velocity)
    }

    /// -m g . c_world
    pub fn potential_energy(&self, gravity: &Vector3<Float>) -> Float {
        -self.mass() * self.world_com().dot(gravity)
    }

    /// Linear momentum in the body frame
    pub fn linear_momentum(&self) -> Vector3<Float> {
        linear(&(self.inertia * self.velocity))
    }

    /// Angular momentum about `pivot` (body frame)
    pub fn angular_momentum(&self, pivot: &Vector3<Float>) -> Vector3<Float> {
        let at_pivot = Isometry3::from_parts(Translation3::from(*pivot), na::UnitQuaternion::identity());
        angular(&d_ad_t(&at_pivot, &(self.inertia * self.velocity)))
    }
}
