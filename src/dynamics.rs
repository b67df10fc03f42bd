use na::{DVector, Vector3};
use tracing::trace;

use crate::{
    joint::Joint,
    mechanism::{with_children, with_parent, Mechanism},
    spatial::SpatialVector,
    types::Float,
};

/// Write S^T f into the joint's rows of a generalized vector
fn write_rows(out: &mut DVector<Float>, joint: &Joint, f: &SpatialVector) {
    if let Some(first) = joint.first_index() {
        let rows = joint.project_force(f);
        out.rows_mut(first, rows.len()).copy_from(&rows);
    }
}

/// Recursive Newton-Euler: the generalized forces that produce the current
/// joint accelerations ddq, i.e.
///     tau = M(q) ddq + C(q, dq) - g(q) [- Fext]
/// Leaves every joint's tau and wrench set, and returns tau.
///
/// Reference: Table 5.1 in "Robot Dynamics Algorithms" by Roy Featherstone
pub fn inverse_dynamics(mechanism: &mut Mechanism, with_external: bool) -> DVector<Float> {
    trace!(mechanism = %mechanism.name, with_external, "inverse dynamics");
    mechanism.update_accelerations();

    let gravity = *mechanism.gravity();
    let links = mechanism.links_mut();
    for i in (0..links.len()).rev() {
        let (link, children) = with_children(links, i);
        link.update_body_force(&children, &gravity, with_external);
        link.update_generalized_force();
    }
    mechanism.forces()
}

/// Articulated-body forward dynamics: solves the joint accelerations from
/// the current forces, external forces, gravity and joint spring/damper
/// terms integrated implicitly over one time step. Leaves every joint's ddq
/// and every link's acceleration and transmitted force set, and returns ddq.
///
/// Reference: Chapter 7 in "Robot Dynamics Algorithms" by Roy Featherstone
pub fn forward_dynamics(mechanism: &mut Mechanism) -> DVector<Float> {
    trace!(mechanism = %mechanism.name, "forward dynamics");
    mechanism.update_art_inertias();

    let gravity = *mechanism.gravity();
    let dt = mechanism.time_step();
    let links = mechanism.links_mut();
    for i in (0..links.len()).rev() {
        let (link, children) = with_children(links, i);
        link.update_bias_force(&children, &gravity, dt);
    }
    for i in 0..links.len() {
        let (link, parent) = with_parent(links, i);
        link.update_joint_and_body_acceleration(parent);
        link.update_transmitted_force();
    }
    mechanism.accelerations()
}

/// Propagates the accumulated constraint impulses through the tree and
/// folds the resulting velocity jump into velocity, acceleration and force
/// as if it were spread over one time step. The articulated inertias are
/// recomputed from the current configuration first. Returns the joint
/// velocity changes.
pub fn apply_constraint_impulses(mechanism: &mut Mechanism) -> DVector<Float> {
    trace!(mechanism = %mechanism.name, "constraint impulses");
    mechanism.update_art_inertias();
    let dt = mechanism.time_step();
    let links = mechanism.links_mut();
    for i in (0..links.len()).rev() {
        let (link, children) = with_children(links, i);
        link.update_bias_impulse(&children);
    }
    for i in 0..links.len() {
        let (link, parent) = with_parent(links, i);
        link.update_joint_velocity_change(parent);
        link.update_body_imp_force();
    }
    for link in links.iter_mut() {
        link.update_constrained_joint_and_body_acceleration(dt);
        link.update_constrained_transmitted_force(dt);
    }
    mechanism.velocity_changes()
}

/// C(q, dq) - Q_g(q) for an arbitrary gravity vector
fn aggregate_combined(mechanism: &Mechanism, gravity: &Vector3<Float>) -> DVector<Float> {
    let links = mechanism.links();
    let mut out = DVector::zeros(mechanism.num_coords());
    let mut motions = vec![SpatialVector::zeros(); links.len()];
    let mut forces = vec![SpatialVector::zeros(); links.len()];

    for (i, link) in links.iter().enumerate() {
        let motion = link.update_combined_vector(link.parent().map(|p| &motions[p]));
        motions[i] = motion;
    }
    for (i, link) in links.iter().enumerate().rev() {
        let force = link.aggregate_combined_vector(
            &motions[i],
            gravity,
            link.children().iter().map(|&c| (&links[c], forces[c])),
        );
        forces[i] = force;
        write_rows(&mut out, link.joint(), &force);
    }
    out
}

/// Coriolis and centrifugal forces C(q, dq)
pub fn coriolis_vector(mechanism: &Mechanism) -> DVector<Float> {
    trace!(mechanism = %mechanism.name, "coriolis vector");
    aggregate_combined(mechanism, &Vector3::zeros())
}

/// C(q, dq) - Q_g(q), so that M ddq + combined = tau + Q_ext
pub fn combined_vector(mechanism: &Mechanism) -> DVector<Float> {
    trace!(mechanism = %mechanism.name, "combined vector");
    aggregate_combined(mechanism, mechanism.gravity())
}

/// Generalized gravity force Q_g(q) = -dU/dq
pub fn gravity_vector(mechanism: &Mechanism) -> DVector<Float> {
    trace!(mechanism = %mechanism.name, "gravity vector");
    let links = mechanism.links();
    let mut out = DVector::zeros(mechanism.num_coords());
    let mut forces = vec![SpatialVector::zeros(); links.len()];
    for (i, link) in links.iter().enumerate().rev() {
        let force = link.aggregate_gravity_force(
            mechanism.gravity(),
            link.children().iter().map(|&c| (&links[c], forces[c])),
        );
        forces[i] = force;
        write_rows(&mut out, link.joint(), &force);
    }
    out
}

/// Generalized force Q_ext of the external wrenches on every link
pub fn external_force_vector(mechanism: &Mechanism) -> DVector<Float> {
    trace!(mechanism = %mechanism.name, "external force vector");
    let links = mechanism.links();
    let mut out = DVector::zeros(mechanism.num_coords());
    let mut forces = vec![SpatialVector::zeros(); links.len()];
    for (i, link) in links.iter().enumerate().rev() {
        let force = link.aggregate_external_force(
            link.children().iter().map(|&c| (&links[c], forces[c])),
        );
        forces[i] = force;
        write_rows(&mut out, link.joint(), &force);
    }
    out
}

#[cfg(test)]
mod dynamics_tests {
    use na::{dvector, vector, DMatrix};
    use rand::rng;

    use crate::{
        assert_close, assert_vec_close,
        energy::potential_energy,
        helpers::{branching_tree, double_pendulum, floating_body, pendulum, revolute_chain},
        mechanism::{aug_mass_matrix, mass_matrix},
        spatial::spatial_vector,
        util::test_utils::random_dvector,
    };

    use super::*;

    fn randomize_state(mechanism: &mut Mechanism) {
        let mut rng = rng();
        let n = mechanism.num_coords();
        mechanism
            .set_positions(&random_dvector(&mut rng, n, 1.0))
            .unwrap();
        mechanism
            .set_velocities(&random_dvector(&mut rng, n, 1.0))
            .unwrap();
    }

    #[test]
    fn two_link_round_trip_at_rest() {
        // Arrange
        let mut mechanism = revolute_chain(2).unwrap();
        mechanism.set_positions(&dvector![0.4, -0.3]).unwrap();
        let ddq = dvector![1.5, -0.7];
        mechanism.set_accelerations(&ddq).unwrap();

        // Act
        let tau = inverse_dynamics(&mut mechanism, false);
        mechanism.set_accelerations(&DVector::zeros(2)).unwrap();
        mechanism.set_forces(&tau).unwrap();
        let result = forward_dynamics(&mut mechanism);

        // Assert
        assert_vec_close!(result, ddq, 1e-10);
    }

    #[test]
    fn round_trip_with_velocity_on_branching_tree() {
        for mut mechanism in [branching_tree().unwrap(), floating_body().unwrap()] {
            // Arrange
            randomize_state(&mut mechanism);
            let mut rng = rng();
            let ddq = random_dvector(&mut rng, mechanism.num_coords(), 2.0);
            mechanism.set_accelerations(&ddq).unwrap();

            // Act
            let tau = inverse_dynamics(&mut mechanism, false);
            mechanism.set_forces(&tau).unwrap();
            let result = forward_dynamics(&mut mechanism);

            // Assert
            assert_vec_close!(result, ddq, 1e-8);
        }
    }

    #[test]
    fn equations_of_motion_are_consistent() {
        // Arrange
        let mut mechanism = branching_tree().unwrap();
        randomize_state(&mut mechanism);
        let mut rng = rng();
        let tau = random_dvector(&mut rng, mechanism.num_coords(), 5.0);
        mechanism.set_forces(&tau).unwrap();

        // Act
        let ddq = forward_dynamics(&mut mechanism);

        // Assert: M ddq + C - Q_g = tau
        let lhs = mass_matrix(&mechanism) * &ddq + combined_vector(&mechanism);
        assert_vec_close!(lhs, tau, 1e-8);
    }

    #[test]
    fn combined_vector_splits_into_coriolis_and_gravity() {
        let mut mechanism = branching_tree().unwrap();
        randomize_state(&mut mechanism);
        assert_vec_close!(
            combined_vector(&mechanism),
            coriolis_vector(&mechanism) - gravity_vector(&mechanism),
            1e-10
        );
    }

    #[test]
    fn double_pendulum_reference_accelerations() {
        // Arrange
        let mut mechanism = double_pendulum().unwrap();

        // Act
        let ddq = forward_dynamics(&mut mechanism);

        // Assert: M = [[4.5, 1.75], [1.75, 1.25]], Q_g = [19.62, 4.905]
        let g = 9.81;
        let (m11, m12, m22) = (4.5, 1.75, 1.25);
        let (q1, q2) = (2.0 * g, 0.5 * g);
        let det = m11 * m22 - m12 * m12;
        let expected = dvector![(m22 * q1 - m12 * q2) / det, (m11 * q2 - m12 * q1) / det];
        assert_vec_close!(ddq, expected, 1e-6);
        assert_close!(ddq[0], 6.2209756, 1e-6);
        assert_close!(ddq[1], -4.7853659, 1e-6);
        assert_vec_close!(gravity_vector(&mechanism), dvector![q1, q2], 1e-12);
    }

    #[test]
    fn gravity_vector_is_negative_potential_gradient() {
        // Arrange
        let mut mechanism = pendulum(2.0, 0.7).unwrap();
        let h = 1e-6;

        for q in [-1.2, 0.0, 0.4, 2.5] {
            // Act
            mechanism.set_positions(&dvector![q]).unwrap();
            let g = gravity_vector(&mechanism);
            mechanism.set_positions(&dvector![q + h]).unwrap();
            let u_plus = potential_energy(&mechanism);
            mechanism.set_positions(&dvector![q - h]).unwrap();
            let u_minus = potential_energy(&mechanism);

            // Assert
            assert_close!(g[0], -(u_plus - u_minus) / (2.0 * h), 1e-6);
        }
    }

    #[test]
    fn gravity_vector_gradient_on_branching_tree() {
        // Arrange
        let mut mechanism = branching_tree().unwrap();
        randomize_state(&mut mechanism);
        let q = mechanism.positions();
        let g = gravity_vector(&mechanism);
        let h = 1e-6;

        for k in 0..mechanism.num_coords() {
            // Act
            let mut dq = DVector::zeros(q.len());
            dq[k] = h;
            mechanism.set_positions(&(&q + &dq)).unwrap();
            let u_plus = potential_energy(&mechanism);
            mechanism.set_positions(&(&q - &dq)).unwrap();
            let u_minus = potential_energy(&mechanism);

            // Assert
            assert_close!(g[k], -(u_plus - u_minus) / (2.0 * h), 1e-5);
        }
    }

    #[test]
    fn external_force_vector_matches_jacobian_transpose() {
        // Arrange
        let mut mechanism = double_pendulum().unwrap();
        mechanism
            .link_mut(1)
            .unwrap()
            .add_ext_force(&vector![0., 0., 3.0], &vector![1.0, 0., 0.], false, true);

        // Act
        let q_ext = external_force_vector(&mechanism);

        // Assert: an upward force at the tip, 2 m from the shoulder and 1 m
        // from the elbow, pulls both joints toward negative angles
        assert_vec_close!(q_ext, dvector![-6.0, -3.0], 1e-12);
    }

    #[test]
    fn external_force_enters_forward_dynamics() {
        // Arrange
        let mut mechanism = double_pendulum().unwrap();
        mechanism.set_gravity(Vector3::zeros());
        mechanism
            .link_mut(1)
            .unwrap()
            .add_ext_force(&vector![0., 0., 3.0], &vector![1.0, 0., 0.], false, true);

        // Act
        let ddq = forward_dynamics(&mut mechanism);

        // Assert
        let m = mass_matrix(&mechanism);
        assert_vec_close!(m * ddq, external_force_vector(&mechanism), 1e-10);
    }

    #[test]
    fn inverse_dynamics_of_static_pendulum_balances_gravity() {
        // Arrange
        let mut mechanism = pendulum(1.0, 1.0).unwrap();

        // Act
        let tau = inverse_dynamics(&mut mechanism, true);

        // Assert: holding the bob horizontal takes -m g l about +y
        assert_close!(tau[0], -9.81, 1e-12);
        assert_vec_close!(
            mechanism.links()[0].joint().wrench,
            spatial_vector(&vector![0., -9.81, 0.], &vector![0., 0., 9.81]),
            1e-12
        );
    }

    #[test]
    fn impulse_matches_equivalent_force_over_one_step() {
        for mut mechanism in [revolute_chain(3).unwrap(), branching_tree().unwrap()] {
            // Arrange
            randomize_state(&mut mechanism);
            let dt = mechanism.time_step();
            let impulse = spatial_vector(&vector![0.2, -0.1, 0.3], &vector![1.0, 0.5, -2.0]);
            let last = mechanism.num_links() - 1;
            let dq0 = mechanism.velocities();

            // Act: continuous force impulse / dt
            let f = impulse / dt;
            {
                let link = mechanism.link_mut(last).unwrap();
                link.add_ext_torque(&vector![f[0], f[1], f[2]], true);
                link.add_ext_force(&vector![f[3], f[4], f[5]], &Vector3::zeros(), true, true);
            }
            let ddq_force = forward_dynamics(&mut mechanism);
            let dq_force = &dq0 + dt * ddq_force;

            // Act: impulse pass after an unforced step
            mechanism.clear_external_forces();
            let ddq_free = forward_dynamics(&mut mechanism);
            mechanism.link_mut(last).unwrap().add_constraint_impulse(&impulse);
            let delta = apply_constraint_impulses(&mut mechanism);
            let dq_impulse = &dq0 + dt * &ddq_free + &delta;

            // Assert
            assert_vec_close!(dq_impulse, dq_force, 1e-8);
            assert_vec_close!(mechanism.velocities(), &dq0 + &delta, 1e-12);
            assert_vec_close!(
                mechanism.accelerations(),
                &ddq_free + &delta / dt,
                1e-6
            );
        }
    }

    #[test]
    fn velocity_change_matches_inverse_mass_matrix() {
        // Arrange
        let mut mechanism = branching_tree().unwrap();
        randomize_state(&mut mechanism);
        let n = mechanism.num_coords();
        let mut impulses = DVector::zeros(n);
        impulses[0] = 0.3;
        impulses[n - 1] = -0.5;
        forward_dynamics(&mut mechanism);
        mechanism.set_constraint_impulses(&impulses).unwrap();

        // Act
        let delta = apply_constraint_impulses(&mut mechanism);

        // Assert
        let m: DMatrix<Float> = mass_matrix(&mechanism);
        assert_vec_close!(m * delta, impulses, 1e-9);
    }

    #[test]
    fn impulses_without_prior_forward_dynamics_use_current_inertias() {
        // Arrange
        let mut mechanism = branching_tree().unwrap();
        randomize_state(&mut mechanism);
        let n = mechanism.num_coords();
        let mut rng = rng();
        let impulses = random_dvector(&mut rng, n, 1.0);
        mechanism.set_constraint_impulses(&impulses).unwrap();

        // Act
        let delta = apply_constraint_impulses(&mut mechanism);

        // Assert
        assert_vec_close!(mass_matrix(&mechanism) * delta, impulses, 1e-9);
    }

    #[test]
    fn velocity_jump_refreshes_partial_accelerations() {
        // Arrange
        let mut mechanism = branching_tree().unwrap();
        randomize_state(&mut mechanism);
        forward_dynamics(&mut mechanism);
        let last = mechanism.num_links() - 1;
        mechanism
            .link_mut(last)
            .unwrap()
            .add_constraint_impulse(&spatial_vector(&vector![0.3, 0., -0.2], &vector![0., 1.5, 0.5]));

        // Act
        apply_constraint_impulses(&mut mechanism);
        let partials: Vec<SpatialVector> = mechanism
            .links()
            .iter()
            .map(|l| *l.partial_acceleration())
            .collect();
        let jac_derivs: Vec<_> = (0..mechanism.num_links())
            .map(|i| mechanism.body_jacobian_time_deriv(i).unwrap().clone())
            .collect();

        // Assert: same as recomputing the kinematics from the new velocities
        mechanism.update_kinematics();
        for (i, (partial, jac_deriv)) in partials.iter().zip(&jac_derivs).enumerate() {
            assert_vec_close!(mechanism.links()[i].partial_acceleration(), partial, 1e-12);
            assert_vec_close!(mechanism.body_jacobian_time_deriv(i).unwrap(), jac_deriv, 1e-12);
        }
    }

    #[test]
    fn implicit_springs_satisfy_augmented_equations_of_motion() {
        // Arrange
        let mut mechanism = revolute_chain(3).unwrap();
        for link in mechanism.links_mut() {
            let coord = link.joint_mut().coordinate_mut(0).unwrap();
            coord.set_spring_stiffness(50.0).unwrap();
            coord.set_damping_coefficient(5.0).unwrap();
            coord.rest_position = 0.2;
        }
        mechanism.set_time_step(0.01).unwrap();
        randomize_state(&mut mechanism);
        let mut rng = rng();
        let tau = random_dvector(&mut rng, 3, 5.0);
        mechanism.set_forces(&tau).unwrap();
        let dt = mechanism.time_step();

        // Act
        let ddq = forward_dynamics(&mut mechanism);

        // Assert: (M + dt D + dt² K) ddq + C - Q_g = tau - K(q - q0 + dt dq) - D dq
        let passive: DVector<Float> = DVector::from_iterator(
            3,
            mechanism
                .links()
                .iter()
                .flat_map(|l| l.joint().coordinates())
                .map(|c| c.spring_force(dt) + c.damping_force()),
        );
        let lhs = aug_mass_matrix(&mechanism) * &ddq + combined_vector(&mechanism);
        assert_vec_close!(lhs, &tau + passive, 1e-8);
    }
}
