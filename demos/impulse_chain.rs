use articulated_dynamics::{
    energy::{kinetic_energy, linear_momentum},
    error::DynamicsError,
    helpers::revolute_chain,
    integrators::semi_implicit_euler,
    spatial::spatial_vector,
};
use nalgebra::{vector, Vector3};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Strike the tip of a hanging chain with a spatial impulse and print how the
/// velocity jump spreads through the joints
pub fn main() -> Result<(), DynamicsError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "articulated_dynamics=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut mechanism = revolute_chain(4)?;
    mechanism.set_gravity(Vector3::zeros());

    let tip = mechanism.num_links() - 1;
    mechanism
        .link_mut(tip)?
        .add_constraint_impulse(&spatial_vector(&Vector3::zeros(), &vector![0., 0., 1.]));

    semi_implicit_euler(&mut mechanism);
    println!("dq after impulse = {}", mechanism.velocities());
    println!("kinetic energy = {:.6}", kinetic_energy(&mechanism));
    println!("linear momentum = {}", linear_momentum(&mechanism));

    for _ in 0..1000 {
        semi_implicit_euler(&mut mechanism);
    }
    println!("q(1 s) = {}", mechanism.positions());
    println!("kinetic energy = {:.6}", kinetic_energy(&mechanism));
    Ok(())
}
