use na::{DMatrix, Isometry3};
use tracing::{trace, warn};

use crate::{
    error::DynamicsError, joint::Joint, mechanism::Mechanism, spatial::log_map, types::Float,
};

const MAX_ITERATIONS: usize = 100;
const DAMPING: Float = 1e-6;
const TOLERANCE: Float = 1e-10;

/// Which joints an inverse kinematics fit may move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IkPolicy {
    /// Only the link's own parent joint
    ParentJoint,
    /// Every joint between the root and the link
    AncestorJoints,
    /// Every joint of the mechanism
    AllJoints,
}

/// Move joints so that link `link` reaches the world transform `target`.
/// Returns the norm of the remaining pose error, in exponential
/// coordinates of the link frame.
///
/// Only `IkPolicy::ParentJoint` is implemented; the parent joint
/// coordinates are fitted by damped Gauss-Newton, optionally clamped to
/// their position limits after every iteration. Kinematics of the whole
/// mechanism are refreshed on return.
pub fn fit_world_transform(
    mechanism: &mut Mechanism,
    link: usize,
    target: &Isometry3<Float>,
    policy: IkPolicy,
    clamp_to_limits: bool,
) -> Result<Float, DynamicsError> {
    match policy {
        IkPolicy::ParentJoint => {}
        IkPolicy::AncestorJoints | IkPolicy::AllJoints => {
            return Err(DynamicsError::Unsupported(format!(
                "inverse kinematics policy {:?}",
                policy
            )))
        }
    }
    trace!(mechanism = %mechanism.name, link, "fit world transform");

    let parent_transform = match mechanism.link(link)?.parent() {
        Some(p) => *mechanism.links()[p].world_transform(),
        None => Isometry3::identity(),
    };
    let dof = mechanism.links()[link].joint().dof();
    let name = mechanism.links()[link].name.clone();
    let joint = mechanism.links_mut()[link].joint_mut();

    let pose_error = |joint: &Joint| {
        log_map(&((parent_transform * joint.local_transform()).inverse() * target))
    };

    let mut error = pose_error(joint);
    let mut converged = false;
    for _ in 0..MAX_ITERATIONS {
        if dof == 0 || error.norm() < TOLERANCE {
            converged = true;
            break;
        }

        let jac = joint.local_jacobian();
        let lhs = jac.transpose() * jac + DMatrix::<Float>::identity(dof, dof) * DAMPING;
        let rhs = jac.transpose() * error;
        let Some(step) = lhs.cholesky().map(|c| c.solve(&rhs)) else {
            break;
        };

        let previous = joint.positions();
        let mut q = &previous + &step;
        if clamp_to_limits {
            for (qi, coord) in q.iter_mut().zip(joint.coordinates()) {
                *qi = coord.clamp_position(*qi);
            }
        }
        let moved = (&q - &previous).norm();
        joint.set_positions(q.as_slice())?;
        joint.update_local_transform();
        joint.update_local_jacobian();
        error = pose_error(joint);

        if moved < TOLERANCE {
            converged = true;
            break;
        }
    }

    if !converged {
        warn!(
            link = %name,
            residual = error.norm(),
            "inverse kinematics stopped without converging"
        );
    }
    mechanism.update_kinematics();
    Ok(error.norm())
}
