use na::{DMatrix, DVector, Vector3};
use tracing::{debug, trace};

use crate::{
    error::DynamicsError,
    joint::{Joint, Projection},
    link::Link,
    spatial::{Jacobian, SpatialVector},
    types::Float,
    GRAVITY,
};

/// Simulation parameters shared by every algorithm of a mechanism
#[derive(Debug, Clone, PartialEq)]
pub struct MechanismConfig {
    pub gravity: Vector3<Float>,
    pub time_step: Float,
    /// Immobile mechanisms are skipped by the integrators
    pub mobile: bool,
}

impl Default for MechanismConfig {
    fn default() -> Self {
        MechanismConfig {
            gravity: Vector3::new(0., 0., -GRAVITY),
            time_step: 0.001,
            mobile: true,
        }
    }
}

/// Owns the links of a kinematic tree in an arena. A parent always has a
/// smaller index than its children, so iterating forward visits the tree
/// root to leaves and iterating backward visits it leaves to root.
#[derive(Debug)]
pub struct Mechanism {
    pub name: String,
    links: Vec<Link>,
    config: MechanismConfig,
    num_coords: usize,
}

/// Split the arena into a mutable link and its (shared) parent
pub(crate) fn with_parent(links: &mut [Link], i: usize) -> (&mut Link, Option<&Link>) {
    let (head, tail) = links.split_at_mut(i);
    let head: &[Link] = head;
    let link = &mut tail[0];
    let parent = link.parent().map(move |p| &head[p]);
    (link, parent)
}

/// Split the arena into a mutable link and its (shared) children
pub(crate) fn with_children(links: &mut [Link], i: usize) -> (&mut Link, Vec<&Link>) {
    let (head, tail) = links.split_at_mut(i + 1);
    let tail: &[Link] = tail;
    let link = &mut head[i];
    let children = link
        .children()
        .iter()
        .map(move |&c| &tail[c - i - 1])
        .collect();
    (link, children)
}

fn validate_time_step(time_step: Float) -> Result<(), DynamicsError> {
    if !(time_step > 0.0) || !time_step.is_finite() {
        return Err(DynamicsError::InvalidTimeStep(time_step));
    }
    Ok(())
}

impl Mechanism {
    pub fn new(name: &str) -> Self {
        Mechanism {
            name: name.to_string(),
            links: vec![],
            config: MechanismConfig::default(),
            num_coords: 0,
        }
    }

    pub fn with_config(name: &str, config: MechanismConfig) -> Result<Self, DynamicsError> {
        validate_time_step(config.time_step)?;
        Ok(Mechanism {
            config,
            ..Mechanism::new(name)
        })
    }

    /// Attach a link under `parent` (None for a root) and return its index.
    /// The link's joint coordinates are appended to the coordinate vector.
    pub fn add_link(
        &mut self,
        mut link: Link,
        parent: Option<usize>,
    ) -> Result<usize, DynamicsError> {
        if let Some(p) = parent {
            if p >= self.links.len() {
                return Err(DynamicsError::UnknownLink(p));
            }
        }

        let index = self.links.len();
        link.attach(index, parent.map(|p| &self.links[p]), self.num_coords);
        self.num_coords += link.joint().dof();
        self.links.push(link);
        if let Some(p) = parent {
            self.links[p].add_child(index);
        }

        let (link, parent) = with_parent(&mut self.links, index);
        link.update_transform(parent);
        link.update_velocity(parent);
        link.update_partial_acceleration();

        debug!(
            mechanism = %self.name,
            link = %self.links[index].name,
            index,
            dof = self.links[index].joint().dof(),
            dependent_coords = ?self.links[index].dependent_coords(),
            "attached link"
        );
        Ok(index)
    }

    pub fn config(&self) -> &MechanismConfig {
        &self.config
    }

    pub fn gravity(&self) -> &Vector3<Float> {
        &self.config.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vector3<Float>) {
        self.config.gravity = gravity;
    }

    pub fn time_step(&self) -> Float {
        self.config.time_step
    }

    /// Rejects zero, negative and non-finite steps; the previous step is
    /// kept on error.
    pub fn set_time_step(&mut self, time_step: Float) -> Result<(), DynamicsError> {
        validate_time_step(time_step)?;
        self.config.time_step = time_step;
        Ok(())
    }

    pub fn is_mobile(&self) -> bool {
        self.config.mobile
    }

    pub fn set_mobile(&mut self, mobile: bool) {
        self.config.mobile = mobile;
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn num_coords(&self) -> usize {
        self.num_coords
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub(crate) fn links_mut(&mut self) -> &mut [Link] {
        &mut self.links
    }

    pub fn link(&self, i: usize) -> Result<&Link, DynamicsError> {
        self.links.get(i).ok_or(DynamicsError::UnknownLink(i))
    }

    pub fn link_mut(&mut self, i: usize) -> Result<&mut Link, DynamicsError> {
        self.links.get_mut(i).ok_or(DynamicsError::UnknownLink(i))
    }

    pub fn link_index(&self, name: &str) -> Option<usize> {
        self.links.iter().position(|l| l.name == name)
    }

    fn gather(&self, values: impl Fn(&Joint) -> DVector<Float>) -> DVector<Float> {
        let mut result = DVector::zeros(self.num_coords);
        for link in self.links.iter() {
            if let Some(first) = link.joint().first_index() {
                let v = values(link.joint());
                result.rows_mut(first, v.len()).copy_from(&v);
            }
        }
        result
    }

    fn scatter(
        &mut self,
        values: &DVector<Float>,
        assign: impl Fn(&mut Joint, &[Float]) -> Result<(), DynamicsError>,
    ) -> Result<(), DynamicsError> {
        if values.len() != self.num_coords {
            return Err(DynamicsError::DimensionMismatch {
                expected: self.num_coords,
                got: values.len(),
            });
        }
        for link in self.links.iter_mut() {
            let joint = link.joint_mut();
            if let Some(first) = joint.first_index() {
                let dof = joint.dof();
                assign(joint, &values.as_slice()[first..first + dof])?;
            }
        }
        Ok(())
    }

    pub fn positions(&self) -> DVector<Float> {
        self.gather(|j| j.positions())
    }

    pub fn velocities(&self) -> DVector<Float> {
        self.gather(|j| j.velocities())
    }

    pub fn accelerations(&self) -> DVector<Float> {
        self.gather(|j| j.accelerations())
    }

    pub fn forces(&self) -> DVector<Float> {
        self.gather(|j| j.forces())
    }

    pub fn velocity_changes(&self) -> DVector<Float> {
        self.gather(|j| j.velocity_changes())
    }

    /// Sets q and refreshes the kinematics
    pub fn set_positions(&mut self, q: &DVector<Float>) -> Result<(), DynamicsError> {
        self.scatter(q, |j, v| j.set_positions(v))?;
        self.update_kinematics();
        Ok(())
    }

    /// Sets dq and refreshes the kinematics
    pub fn set_velocities(&mut self, dq: &DVector<Float>) -> Result<(), DynamicsError> {
        self.scatter(dq, |j, v| j.set_velocities(v))?;
        self.update_kinematics();
        Ok(())
    }

    pub fn set_accelerations(&mut self, ddq: &DVector<Float>) -> Result<(), DynamicsError> {
        self.scatter(ddq, |j, v| j.set_accelerations(v))
    }

    pub fn set_forces(&mut self, tau: &DVector<Float>) -> Result<(), DynamicsError> {
        self.scatter(tau, |j, v| j.set_forces(v))
    }

    /// Generalized impulses applied directly to the coordinates
    pub fn set_constraint_impulses(
        &mut self,
        impulses: &DVector<Float>,
    ) -> Result<(), DynamicsError> {
        self.scatter(impulses, |j, v| j.set_constraint_impulses(v))
    }

    /// Transform, velocity and partial acceleration of every link, root to
    /// leaves
    pub fn update_kinematics(&mut self) {
        for i in 0..self.links.len() {
            let (link, parent) = with_parent(&mut self.links, i);
            link.update_transform(parent);
            link.update_velocity(parent);
            link.update_partial_acceleration();
        }
    }

    /// Body velocities only, for when dq changed but q did not
    pub fn update_velocities(&mut self) {
        for i in 0..self.links.len() {
            let (link, parent) = with_parent(&mut self.links, i);
            link.update_velocity(parent);
            link.update_partial_acceleration();
        }
    }

    /// Body accelerations from the current ddq
    pub fn update_accelerations(&mut self) {
        for i in 0..self.links.len() {
            let (link, parent) = with_parent(&mut self.links, i);
            link.update_acceleration(parent);
        }
    }

    /// Articulated inertias and inverse projected inertias, leaves to root
    pub fn update_art_inertias(&mut self) {
        let dt = self.config.time_step;
        for i in (0..self.links.len()).rev() {
            let (link, children) = with_children(&mut self.links, i);
            link.update_art_inertia(&children, dt);
        }
    }

    pub fn clear_external_forces(&mut self) {
        for link in self.links.iter_mut() {
            link.clear_external_forces();
        }
    }

    pub fn clear_constraint_impulses(&mut self) {
        for link in self.links.iter_mut() {
            link.clear_constraint_impulse();
        }
    }

    /// Whether any link or coordinate carries a constraint impulse
    pub fn has_constraint_impulses(&self) -> bool {
        self.links.iter().any(|l| {
            *l.constraint_impulse() != SpatialVector::zeros()
                || l.joint().coordinates().iter().any(|c| c.constraint_impulse != 0.)
        })
    }

    fn refresh_jacobian(&mut self, i: usize) {
        if !self.links[i].jacobian_dirty {
            return;
        }
        if let Some(p) = self.links[i].parent() {
            self.refresh_jacobian(p);
        }
        let (link, parent) = with_parent(&mut self.links, i);
        link.update_body_jacobian(parent);
    }

    fn refresh_jacobian_deriv(&mut self, i: usize) {
        self.refresh_jacobian(i);
        if !self.links[i].jacobian_deriv_dirty {
            return;
        }
        if let Some(p) = self.links[i].parent() {
            self.refresh_jacobian_deriv(p);
        }
        let (link, parent) = with_parent(&mut self.links, i);
        link.update_body_jacobian_deriv(parent);
    }

    /// Body Jacobian of link i over its dependent coordinates, refreshed
    /// if stale
    pub fn body_jacobian(&mut self, i: usize) -> Result<&Jacobian, DynamicsError> {
        self.link(i)?;
        self.refresh_jacobian(i);
        Ok(self.links[i].cached_jacobian())
    }

    pub fn body_jacobian_time_deriv(&mut self, i: usize) -> Result<&Jacobian, DynamicsError> {
        self.link(i)?;
        self.refresh_jacobian_deriv(i);
        Ok(self.links[i].cached_jacobian_deriv())
    }

    /// World Jacobian of a point at `offset` in link i, see
    /// `Link::world_jacobian`
    pub fn world_jacobian(
        &mut self,
        i: usize,
        offset: &Vector3<Float>,
        local: bool,
    ) -> Result<Jacobian, DynamicsError> {
        self.body_jacobian(i)?;
        Ok(self.links[i].world_jacobian(offset, local))
    }

    pub fn world_jacobian_time_deriv(
        &mut self,
        i: usize,
        offset: &Vector3<Float>,
        local: bool,
    ) -> Result<Jacobian, DynamicsError> {
        self.body_jacobian_time_deriv(i)?;
        Ok(self.links[i].world_jacobian_time_deriv(offset, local))
    }

    /// Scatter a Jacobian over dependent coordinates into the full
    /// coordinate space
    pub fn expand_jacobian(&self, i: usize, jac: &Jacobian) -> Result<Jacobian, DynamicsError> {
        let link = self.link(i)?;
        let mut full = Jacobian::zeros(self.num_coords);
        for (k, &coord) in link.dependent_coords().iter().enumerate() {
            full.set_column(coord, &jac.column(k));
        }
        Ok(full)
    }
}

/// Unit generalized vector e_j restricted to one joint's coordinates
fn unit_coordinate(joint: &Joint, j: usize) -> DVector<Float> {
    DVector::from_iterator(
        joint.dof(),
        joint
            .coordinates()
            .iter()
            .map(|c| if c.index() == Some(j) { 1. } else { 0. }),
    )
}

fn unit_response_matrix(mechanism: &Mechanism, dt: Option<Float>) -> DMatrix<Float> {
    let n = mechanism.num_coords();
    let links = mechanism.links();
    let mut matrix = DMatrix::zeros(n, n);
    let mut motions = vec![SpatialVector::zeros(); links.len()];
    let mut forces = vec![SpatialVector::zeros(); links.len()];

    for j in 0..n {
        let units: Vec<DVector<Float>> =
            links.iter().map(|l| unit_coordinate(l.joint(), j)).collect();

        for (i, link) in links.iter().enumerate() {
            let motion = link.update_mass_matrix(link.parent().map(|p| &motions[p]), &units[i]);
            motions[i] = motion;
        }

        for (i, link) in links.iter().enumerate().rev() {
            let force = link.aggregate_mass_matrix(
                &motions[i],
                link.children().iter().map(|&c| (&links[c], forces[c])),
            );
            forces[i] = force;

            if let Some(first) = link.joint().first_index() {
                let mut column = link.joint().project_force(&force);
                if let Some(dt) = dt {
                    column += link.joint().implicit_stiffness(&units[i], dt);
                }
                matrix
                    .view_mut((first, j), (column.len(), 1))
                    .copy_from(&column);
            }
        }
    }
    matrix
}

/// Joint-space mass matrix M(q), built one column at a time from the
/// response to a unit generalized acceleration
pub fn mass_matrix(mechanism: &Mechanism) -> DMatrix<Float> {
    trace!(mechanism = %mechanism.name, "mass matrix");
    unit_response_matrix(mechanism, None)
}

/// M(q) + dt D + dt² K, the matrix of the implicit joint spring/damper step
pub fn aug_mass_matrix(mechanism: &Mechanism) -> DMatrix<Float> {
    trace!(mechanism = %mechanism.name, "augmented mass matrix");
    unit_response_matrix(mechanism, Some(mechanism.time_step()))
}

fn unit_inverse_response_matrix(mechanism: &mut Mechanism, projection: Projection) -> DMatrix<Float> {
    mechanism.update_art_inertias();

    let n = mechanism.num_coords();
    let links = mechanism.links();
    let mut matrix = DMatrix::zeros(n, n);
    let mut biases = vec![SpatialVector::zeros(); links.len()];
    let mut residuals: Vec<DVector<Float>> =
        links.iter().map(|l| DVector::zeros(l.joint().dof())).collect();
    let mut motions = vec![SpatialVector::zeros(); links.len()];

    for j in 0..n {
        for (i, link) in links.iter().enumerate().rev() {
            let unit = unit_coordinate(link.joint(), j);
            let (bias, residual) = link.update_inv_mass_matrix(
                &unit,
                link.children().iter().map(|&c| {
                    (
                        &links[c],
                        links[c].propagated_inv_mass_bias(&biases[c], &residuals[c], projection),
                    )
                }),
            );
            biases[i] = bias;
            residuals[i] = residual;
        }

        for (i, link) in links.iter().enumerate() {
            let (segment, motion) = link.aggregate_inv_mass_matrix(
                link.parent().map(|p| &motions[p]),
                &residuals[i],
                projection,
            );
            motions[i] = motion;
            if let Some(first) = link.joint().first_index() {
                matrix
                    .view_mut((first, j), (segment.len(), 1))
                    .copy_from(&segment);
            }
        }
    }
    matrix
}

/// M(q)^-1 without forming or inverting M, in the articulated-body manner.
/// Refreshes the articulated inertias.
pub fn inv_mass_matrix(mechanism: &mut Mechanism) -> DMatrix<Float> {
    trace!(mechanism = %mechanism.name, "inverse mass matrix");
    unit_inverse_response_matrix(mechanism, Projection::Explicit)
}

/// Inverse of `aug_mass_matrix`
pub fn inv_aug_mass_matrix(mechanism: &mut Mechanism) -> DMatrix<Float> {
    trace!(mechanism = %mechanism.name, "inverse augmented mass matrix");
    unit_inverse_response_matrix(mechanism, Projection::Implicit)
}
