use na::DVector;
use tracing::trace;

use crate::{
    dynamics::{apply_constraint_impulses, forward_dynamics},
    error::DynamicsError,
    mechanism::Mechanism,
    types::Float,
};

/// Advance the mechanism by one time step.
///
/// Semi-implicit Euler: the velocity is updated first and the position is
/// updated with the new velocity. Energy stays bounded for conservative
/// systems such as a pendulum.
/// Ref: Drake Doc, https://drake.mit.edu/doxygen_cxx/classdrake_1_1systems_1_1_semi_explicit_euler_integrator.html
///
/// Constraint impulses accumulated before the call are applied after the
/// velocity update and then cleared. The impulse pass folds generalized
/// impulses into the joint forces, so set the forces again before the next
/// step. Immobile mechanisms are left untouched.
pub fn semi_implicit_euler(mechanism: &mut Mechanism) {
    if !mechanism.is_mobile() {
        return;
    }
    let dt = mechanism.time_step();

    forward_dynamics(mechanism);
    for link in mechanism.links_mut() {
        link.joint_mut().integrate_velocities(dt);
    }
    mechanism.update_velocities();

    if mechanism.has_constraint_impulses() {
        apply_constraint_impulses(mechanism);
    }

    for link in mechanism.links_mut() {
        link.joint_mut().integrate_positions(dt);
    }
    mechanism.update_kinematics();
    mechanism.clear_constraint_impulses();
}

/// Simulate from the current state until `final_time`, calling `control`
/// before every step for the joint forces. Returns the positions and
/// velocities after each step.
pub fn simulate<F>(
    mechanism: &mut Mechanism,
    final_time: Float,
    mut control: F,
) -> Result<(Vec<DVector<Float>>, Vec<DVector<Float>>), DynamicsError>
where
    F: FnMut(&Mechanism) -> DVector<Float>,
{
    let dt = mechanism.time_step();
    let num_steps = (final_time / dt).round() as usize;
    trace!(mechanism = %mechanism.name, num_steps, dt, "simulate");

    let mut qs = Vec::with_capacity(num_steps);
    let mut vs = Vec::with_capacity(num_steps);
    for _ in 0..num_steps {
        let tau = control(mechanism);
        mechanism.set_forces(&tau)?;
        semi_implicit_euler(mechanism);
        qs.push(mechanism.positions());
        vs.push(mechanism.velocities());
    }
    Ok((qs, vs))
}

#[cfg(test)]
mod integrators_tests {
    use na::{dvector, vector, Vector3};

    use crate::{
        assert_close, assert_vec_close,
        energy::{angular_momentum, linear_momentum, total_energy},
        helpers::{double_pendulum, floating_body, pendulum},
        spatial::spatial_vector,
    };

    use super::*;

    fn no_control(mechanism: &Mechanism) -> DVector<Float> {
        DVector::zeros(mechanism.num_coords())
    }

    #[test]
    fn pendulum_energy_stays_bounded() {
        // Arrange
        let mut mechanism = pendulum(1.0, 1.0).unwrap();
        let initial = total_energy(&mechanism);

        // Act
        simulate(&mut mechanism, 5.0, no_control).unwrap();

        // Assert
        assert_close!(total_energy(&mechanism), initial, 0.1);
    }

    #[test]
    fn double_pendulum_energy_stays_bounded() {
        // Arrange
        let mut mechanism = double_pendulum().unwrap();
        mechanism.set_time_step(1e-4).unwrap();
        mechanism.set_positions(&dvector![1., 1.]).unwrap();
        mechanism.set_velocities(&dvector![1., 1.]).unwrap();
        let initial = total_energy(&mechanism);

        // Act
        let (qs, vs) = simulate(&mut mechanism, 2.0, no_control).unwrap();

        // Assert
        assert_eq!(qs.len(), 20000);
        assert_eq!(vs.len(), 20000);
        assert_close!(total_energy(&mechanism), initial, 0.05 * initial.abs());
    }

    #[test]
    fn free_body_conserves_momentum_without_gravity() {
        // Arrange
        let mut mechanism = floating_body().unwrap();
        mechanism.set_gravity(Vector3::zeros());
        mechanism
            .set_velocities(&dvector![0.5, -1.0, 0.8, 0.2, 0.1, -0.3])
            .unwrap();
        let p0 = linear_momentum(&mechanism);
        let l0 = angular_momentum(&mechanism);

        // Act
        simulate(&mut mechanism, 0.2, no_control).unwrap();

        // Assert
        assert_vec_close!(linear_momentum(&mechanism), p0, 1e-2);
        assert_vec_close!(angular_momentum(&mechanism), l0, 1e-2);
    }

    #[test]
    fn immobile_mechanism_does_not_move() {
        // Arrange
        let mut mechanism = pendulum(1.0, 1.0).unwrap();
        mechanism.set_mobile(false);

        // Act
        simulate(&mut mechanism, 0.1, no_control).unwrap();

        // Assert
        assert_eq!(mechanism.positions(), dvector![0.0]);
        assert_eq!(mechanism.velocities(), dvector![0.0]);
    }

    #[test]
    fn constant_torque_holds_pendulum_horizontal() {
        // Arrange
        let mut mechanism = pendulum(1.0, 1.0).unwrap();

        // Act
        let (qs, _) = simulate(&mut mechanism, 1.0, |_| dvector![-9.81]).unwrap();

        // Assert
        assert_close!(qs.last().unwrap()[0], 0.0, 1e-9);
    }

    #[test]
    fn control_output_length_is_checked() {
        let mut mechanism = pendulum(1.0, 1.0).unwrap();
        let result = simulate(&mut mechanism, 0.01, |_| dvector![0.0, 0.0]);
        assert!(result.is_err());
    }

    #[test]
    fn impulse_is_applied_once_and_cleared() {
        // Arrange
        let mut mechanism = pendulum(1.0, 1.0).unwrap();
        mechanism.set_gravity(Vector3::zeros());
        mechanism
            .link_mut(0)
            .unwrap()
            .add_constraint_impulse(&spatial_vector(&vector![0., 2.0, 0.], &Vector3::zeros()));

        // Act
        semi_implicit_euler(&mut mechanism);
        let after_first = mechanism.velocities();
        semi_implicit_euler(&mut mechanism);

        // Assert: a point mass at unit distance has unit inertia about y
        assert_close!(after_first[0], 2.0, 1e-12);
        assert_close!(mechanism.velocities()[0], 2.0, 1e-12);
        assert!(!mechanism.has_constraint_impulses());
        assert_close!(mechanism.positions()[0], 2.0 * 2.0 * mechanism.time_step(), 1e-12);
    }
}
