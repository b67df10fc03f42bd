use crate::types::Float;

/// Configuration errors rejected at the mutating call.
///
/// Numeric invariant violations (NaN/Inf in a propagated quantity, a
/// non-rigid transform, a singular projected inertia) are not represented
/// here: they abort the computation with a panic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DynamicsError {
    #[error("Mass must be finite and non-negative: {0}")]
    NegativeMass(Float),
    #[error("Principal moments of inertia must be finite and non-negative: ({0}, {1}, {2})")]
    NegativeInertia(Float, Float, Float),
    #[error("Coefficient of friction must be non-negative: {0}")]
    InvalidFrictionCoeff(Float),
    #[error("Coefficient of restitution must be in [0, 1]: {0}")]
    InvalidRestitutionCoeff(Float),
    #[error("Spring stiffness must be finite and non-negative: {0}")]
    NegativeSpringStiffness(Float),
    #[error("Damping coefficient must be finite and non-negative: {0}")]
    NegativeDampingCoefficient(Float),
    #[error("Time step must be finite and positive: {0}")]
    InvalidTimeStep(Float),
    #[error("Generalized coordinate index {index} out of range for joint with {dof} dofs")]
    CoordinateOutOfRange { index: usize, dof: usize },
    #[error("Link not found: {0}")]
    UnknownLink(usize),
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("Not supported: {0}")]
    Unsupported(String),
}
