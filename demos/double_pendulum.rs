use articulated_dynamics::{
    dynamics::{combined_vector, forward_dynamics},
    energy::total_energy,
    error::DynamicsError,
    helpers::double_pendulum,
    integrators::simulate,
    mechanism::mass_matrix,
};
use nalgebra::{dvector, DVector};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Release a double pendulum from rest and report the equations of motion at
/// the start and the energy drift over two seconds
pub fn main() -> Result<(), DynamicsError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "articulated_dynamics=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut mechanism = double_pendulum()?;
    mechanism.set_positions(&dvector![1., 1.])?;

    println!("M = {}", mass_matrix(&mechanism));
    println!("C - g = {}", combined_vector(&mechanism));
    println!("ddq = {}", forward_dynamics(&mut mechanism));

    let initial = total_energy(&mechanism);
    let (qs, _vs) = simulate(&mut mechanism, 2.0, |m| DVector::zeros(m.num_coords()))?;
    let last = qs.last().cloned().unwrap_or_else(|| mechanism.positions());
    println!("q(2 s) = {}", last);
    println!(
        "energy: initial {:.6}, final {:.6}",
        initial,
        total_energy(&mechanism)
    );
    Ok(())
}
