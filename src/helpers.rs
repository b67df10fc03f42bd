use na::{vector, Isometry3, Vector3};

use crate::{
    error::DynamicsError, inertia::MassProperties, joint::Joint, link::Link,
    mechanism::Mechanism, types::Float,
};

/// Point mass `mass` at distance `length` along +x from a revolute joint
/// about y at the world origin
pub fn pendulum(mass: Float, length: Float) -> Result<Mechanism, DynamicsError> {
    let mut mechanism = Mechanism::new("pendulum");
    let bob = MassProperties::new(mass, vector![length, 0., 0.], 0., 0., 0., 0., 0., 0.);
    mechanism.add_link(
        Link::new("bob", Joint::revolute("pivot", Vector3::y_axis()), bob)?,
        None,
    )?;
    Ok(mechanism)
}

/// Two unit-length rods of unit mass and unit inertia about their centers
/// of mass, hinged about y. At q = 0 both lie along +x.
pub fn double_pendulum() -> Result<Mechanism, DynamicsError> {
    let mut mechanism = Mechanism::new("double pendulum");
    let rod = MassProperties::new(1.0, vector![0.5, 0., 0.], 1., 1., 1., 0., 0., 0.);

    let rod1 = mechanism.add_link(
        Link::new("rod1", Joint::revolute("shoulder", Vector3::y_axis()), rod.clone())?,
        None,
    )?;
    mechanism.add_link(
        Link::new(
            "rod2",
            Joint::revolute("elbow", Vector3::y_axis())
                .with_parent_offset(Isometry3::translation(1., 0., 0.)),
            rod,
        )?,
        Some(rod1),
    )?;
    Ok(mechanism)
}

/// Serial chain of n uniform rods with hinge axes alternating between y
/// and z
pub fn revolute_chain(n: usize) -> Result<Mechanism, DynamicsError> {
    let mut mechanism = Mechanism::new("revolute chain");
    let mut parent = None;
    for i in 0..n {
        let axis = if i % 2 == 0 {
            Vector3::y_axis()
        } else {
            Vector3::z_axis()
        };
        let offset = if parent.is_some() {
            Isometry3::translation(1., 0., 0.)
        } else {
            Isometry3::identity()
        };
        let name = format!("rod{}", i);
        let joint = Joint::revolute(&name, axis).with_parent_offset(offset);
        let index = mechanism.add_link(
            Link::new(&name, joint, MassProperties::rod_x(1.0, 1.0))?,
            parent,
        )?;
        parent = Some(index);
    }
    Ok(mechanism)
}

fn lumpy_body(mass: Float) -> MassProperties {
    MassProperties::new(mass, vector![0.3, 0.1, -0.05], 0.2, 0.3, 0.25, 0.01, 0.0, 0.02)
}

/// A tree with two branches off a revolute root, exercising every
/// multi-dof joint kind:
///     root (revolute) -> slider (prismatic) -> nut (screw)
///                     -> shoulder (ball) -> wrist (universal)
pub fn branching_tree() -> Result<Mechanism, DynamicsError> {
    let mut mechanism = Mechanism::new("branching tree");

    let root = mechanism.add_link(
        Link::new("root", Joint::revolute("root", Vector3::z_axis()), lumpy_body(2.0))?,
        None,
    )?;
    let slider = mechanism.add_link(
        Link::new(
            "slider",
            Joint::prismatic("slider", Vector3::x_axis())
                .with_parent_offset(Isometry3::translation(0., 0.5, 0.)),
            lumpy_body(1.0),
        )?,
        Some(root),
    )?;
    mechanism.add_link(
        Link::new(
            "nut",
            Joint::screw("nut", Vector3::y_axis(), 0.05)
                .with_parent_offset(Isometry3::translation(0.5, 0., 0.)),
            lumpy_body(0.5),
        )?,
        Some(slider),
    )?;
    let shoulder = mechanism.add_link(
        Link::new(
            "shoulder",
            Joint::ball("shoulder")
                .with_parent_offset(Isometry3::translation(1., 0., 0.))
                .with_child_offset(Isometry3::translation(-0.1, 0., 0.)),
            lumpy_body(1.5),
        )?,
        Some(root),
    )?;
    mechanism.add_link(
        Link::new(
            "wrist",
            Joint::universal("wrist", Vector3::x_axis(), Vector3::y_axis())
                .with_parent_offset(Isometry3::translation(1., 0., 0.)),
            lumpy_body(0.8),
        )?,
        Some(shoulder),
    )?;
    Ok(mechanism)
}

/// A single rigid body attached to the world by a free joint
pub fn floating_body() -> Result<Mechanism, DynamicsError> {
    let mut mechanism = Mechanism::new("floating body");
    mechanism.add_link(
        Link::new("body", Joint::free("float"), lumpy_body(3.0))?,
        None,
    )?;
    Ok(mechanism)
}
