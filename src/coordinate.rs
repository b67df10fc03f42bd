use crate::{error::DynamicsError, types::Float};

/// One scalar degree of freedom of a joint.
///
/// Tracks position, velocity, acceleration and force together with their
/// bounds and the joint spring/damper parameters. `index` is the position of
/// this coordinate in the mechanism-wide coordinate vector; it is assigned
/// when the owning joint is attached to a mechanism.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralizedCoordinate {
    pub q: Float,
    pub dq: Float,
    pub ddq: Float,
    pub tau: Float,

    pub q_min: Float,
    pub q_max: Float,
    pub dq_min: Float,
    pub dq_max: Float,
    pub ddq_min: Float,
    pub ddq_max: Float,
    pub tau_min: Float,
    pub tau_max: Float,

    pub rest_position: Float,
    spring_stiffness: Float,
    damping_coefficient: Float,

    /// Velocity jump produced by the last impulse pass
    pub velocity_change: Float,
    /// Generalized constraint impulse applied directly to this coordinate
    pub constraint_impulse: Float,

    index: Option<usize>,
}

impl Default for GeneralizedCoordinate {
    fn default() -> Self {
        GeneralizedCoordinate {
            q: 0.,
            dq: 0.,
            ddq: 0.,
            tau: 0.,
            q_min: Float::NEG_INFINITY,
            q_max: Float::INFINITY,
            dq_min: Float::NEG_INFINITY,
            dq_max: Float::INFINITY,
            ddq_min: Float::NEG_INFINITY,
            ddq_max: Float::INFINITY,
            tau_min: Float::NEG_INFINITY,
            tau_max: Float::INFINITY,
            rest_position: 0.,
            spring_stiffness: 0.,
            damping_coefficient: 0.,
            velocity_change: 0.,
            constraint_impulse: 0.,
            index: None,
        }
    }
}

impl GeneralizedCoordinate {
    pub fn new() -> Self {
        GeneralizedCoordinate::default()
    }

    /// Index in the mechanism coordinate vector, None until attached
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = Some(index);
    }

    pub fn spring_stiffness(&self) -> Float {
        self.spring_stiffness
    }

    pub fn set_spring_stiffness(&mut self, k: Float) -> Result<(), DynamicsError> {
        if !(k >= 0.0) || !k.is_finite() {
            return Err(DynamicsError::NegativeSpringStiffness(k));
        }
        self.spring_stiffness = k;
        Ok(())
    }

    pub fn damping_coefficient(&self) -> Float {
        self.damping_coefficient
    }

    pub fn set_damping_coefficient(&mut self, d: Float) -> Result<(), DynamicsError> {
        if !(d >= 0.0) || !d.is_finite() {
            return Err(DynamicsError::NegativeDampingCoefficient(d));
        }
        self.damping_coefficient = d;
        Ok(())
    }

    /// Spring force evaluated at the position reached after one implicit
    /// step of length dt: -k * (q - q_rest + dq * dt)
    pub fn spring_force(&self, dt: Float) -> Float {
        -self.spring_stiffness * (self.q - self.rest_position + self.dq * dt)
    }

    pub fn damping_force(&self) -> Float {
        -self.damping_coefficient * self.dq
    }

    pub fn is_within_position_limits(&self) -> bool {
        self.q_min <= self.q && self.q <= self.q_max
    }

    pub fn clamp_position(&self, q: Float) -> Float {
        q.clamp(self.q_min, self.q_max)
    }
}

#[cfg(test)]
mod coordinate_tests {
    use crate::assert_close;

    use super::*;

    #[test]
    fn default_is_unbounded_and_unindexed() {
        let coord = GeneralizedCoordinate::new();
        assert_eq!(coord.index(), None);
        assert!(coord.is_within_position_limits());
        assert_eq!(coord.q_max, Float::INFINITY);
    }

    #[test]
    fn spring_and_damping_forces() {
        // Arrange
        let mut coord = GeneralizedCoordinate::new();
        coord.set_spring_stiffness(10.0).unwrap();
        coord.set_damping_coefficient(2.0).unwrap();
        coord.rest_position = 0.5;
        coord.q = 1.0;
        coord.dq = -1.0;

        // Act & Assert
        assert_close!(coord.spring_force(0.1), -10.0 * (0.5 - 0.1), 1e-12);
        assert_close!(coord.damping_force(), 2.0, 1e-12);
    }

    #[test]
    fn rejects_negative_spring_and_damping() {
        let mut coord = GeneralizedCoordinate::new();
        assert_eq!(
            coord.set_spring_stiffness(-1.0),
            Err(DynamicsError::NegativeSpringStiffness(-1.0))
        );
        assert!(coord.set_damping_coefficient(-0.1).is_err());
        assert!(coord.set_spring_stiffness(Float::NAN).is_err());
        assert!(coord.set_damping_coefficient(Float::INFINITY).is_err());
        assert_eq!(coord.spring_stiffness(), 0.0);
        assert_eq!(coord.damping_coefficient(), 0.0);
    }

    #[test]
    fn clamp_position_respects_limits() {
        let mut coord = GeneralizedCoordinate::new();
        coord.q_min = -1.0;
        coord.q_max = 2.0;
        assert_eq!(coord.clamp_position(3.0), 2.0);
        assert_eq!(coord.clamp_position(-5.0), -1.0);
        assert_eq!(coord.clamp_position(0.5), 0.5);
    }
}
