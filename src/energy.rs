use na::Vector3;

use crate::{
    link::Link,
    mechanism::Mechanism,
    spatial::{angular, d_ad_inv_t, linear, SpatialVector},
    types::Float,
};

/// Momentum I V of a link as a wrench in the world frame about the world
/// origin
fn world_momentum(link: &Link) -> SpatialVector {
    d_ad_inv_t(link.world_transform(), &(link.inertia() * link.velocity()))
}

pub fn kinetic_energy(mechanism: &Mechanism) -> Float {
    mechanism.links().iter().map(|l| l.kinetic_energy()).sum()
}

/// Gravitational potential energy, zero at the world origin height
pub fn potential_energy(mechanism: &Mechanism) -> Float {
    let gravity = mechanism.gravity();
    mechanism
        .links()
        .iter()
        .map(|l| l.potential_energy(gravity))
        .sum()
}

pub fn total_energy(mechanism: &Mechanism) -> Float {
    kinetic_energy(mechanism) + potential_energy(mechanism)
}

pub fn total_mass(mechanism: &Mechanism) -> Float {
    mechanism.links().iter().map(|l| l.mass()).sum()
}

/// World-frame center of mass. Zero for a massless mechanism.
pub fn center_of_mass(mechanism: &Mechanism) -> Vector3<Float> {
    let mass = total_mass(mechanism);
    if mass == 0. {
        return Vector3::zeros();
    }
    let weighted: Vector3<Float> = mechanism
        .links()
        .iter()
        .map(|l| l.mass() * l.world_com())
        .sum();
    weighted / mass
}

/// World-frame linear momentum
pub fn linear_momentum(mechanism: &Mechanism) -> Vector3<Float> {
    mechanism
        .links()
        .iter()
        .map(|l| linear(&world_momentum(l)))
        .sum()
}

/// World-frame angular momentum about the world origin
pub fn angular_momentum(mechanism: &Mechanism) -> Vector3<Float> {
    mechanism
        .links()
        .iter()
        .map(|l| angular(&world_momentum(l)))
        .sum()
}
