use na::{Matrix3, Matrix6, Vector3};

use crate::{error::DynamicsError, spatial::SpatialVector, types::Float, util::skew_symmetric};

/// Mass distribution of a rigid body, described in the body frame by its
/// mass, center of mass and rotational inertia about the center of mass.
///
/// The 6x6 spatial inertia about the body frame origin is
/// I = | Ic + m[c][c]^T   m[c] |
///     | m[c]^T           m1   |
/// where Ic is the rotational inertia about the center of mass and c the
/// center of mass position.
#[derive(Debug, Clone, PartialEq)]
pub struct MassProperties {
    pub mass: Float,
    pub com: Vector3<Float>,
    pub ixx: Float,
    pub iyy: Float,
    pub izz: Float,
    pub ixy: Float,
    pub ixz: Float,
    pub iyz: Float,
}

impl Default for MassProperties {
    fn default() -> Self {
        MassProperties {
            mass: 1.0,
            com: Vector3::zeros(),
            ixx: 1.0,
            iyy: 1.0,
            izz: 1.0,
            ixy: 0.0,
            ixz: 0.0,
            iyz: 0.0,
        }
    }
}

impl MassProperties {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mass: Float,
        com: Vector3<Float>,
        ixx: Float,
        iyy: Float,
        izz: Float,
        ixy: Float,
        ixz: Float,
        iyz: Float,
    ) -> Self {
        MassProperties {
            mass,
            com,
            ixx,
            iyy,
            izz,
            ixy,
            ixz,
            iyz,
        }
    }

    /// Uniform solid sphere centered at the body origin
    pub fn sphere(m: Float, r: Float) -> Self {
        let moment = 2.0 / 5.0 * m * r * r;
        MassProperties::new(m, Vector3::zeros(), moment, moment, moment, 0., 0., 0.)
    }

    /// Thin uniform rod of length l lying along +x from the body origin
    pub fn rod_x(m: Float, l: Float) -> Self {
        let moment = m * l * l / 12.0;
        MassProperties::new(m, Vector3::new(l / 2.0, 0., 0.), 0., moment, moment, 0., 0., 0.)
    }

    /// Mass and principal moments must be finite and non-negative
    pub(crate) fn validate(&self) -> Result<(), DynamicsError> {
        check_mass(self.mass)?;
        check_moments(self.ixx, self.iyy, self.izz)
    }

    pub fn set_mass(&mut self, mass: Float) -> Result<(), DynamicsError> {
        check_mass(mass)?;
        self.mass = mass;
        Ok(())
    }

    pub fn set_moment(
        &mut self,
        ixx: Float,
        iyy: Float,
        izz: Float,
        ixy: Float,
        ixz: Float,
        iyz: Float,
    ) -> Result<(), DynamicsError> {
        check_moments(ixx, iyy, izz)?;
        self.ixx = ixx;
        self.iyy = iyy;
        self.izz = izz;
        self.ixy = ixy;
        self.ixz = ixz;
        self.iyz = iyz;
        Ok(())
    }

    /// Rotational inertia tensor about the center of mass
    #[rustfmt::skip]
    pub fn moment(&self) -> Matrix3<Float> {
        Matrix3::new(
            self.ixx, self.ixy, self.ixz,
            self.ixy, self.iyy, self.iyz,
            self.ixz, self.iyz, self.izz,
        )
    }

    /// Spatial inertia about the body frame origin, expressed in body frame
    pub fn spatial_inertia(&self) -> Matrix6<Float> {
        let m = self.mass;
        let c_hat = skew_symmetric(&self.com);

        let mut inertia = Matrix6::zeros();
        inertia
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(self.moment() + m * c_hat * c_hat.transpose()));
        inertia
            .fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(m * c_hat));
        inertia
            .fixed_view_mut::<3, 3>(3, 0)
            .copy_from(&(m * c_hat.transpose()));
        inertia
            .fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&(m * Matrix3::identity()));
        inertia
    }
}

/// Computes the kinetic energy of a body
/// Essentially implements KE = 1/2 * v^T * I * v
pub fn kinetic_energy(inertia: &Matrix6<Float>, twist: &SpatialVector) -> Float {
    0.5 * twist.dot(&(inertia * twist))
}

fn is_non_negative(x: Float) -> bool {
    x >= 0.0 && x.is_finite()
}

fn check_mass(mass: Float) -> Result<(), DynamicsError> {
    if !is_non_negative(mass) {
        return Err(DynamicsError::NegativeMass(mass));
    }
    Ok(())
}

fn check_moments(ixx: Float, iyy: Float, izz: Float) -> Result<(), DynamicsError> {
    if ![ixx, iyy, izz].into_iter().all(is_non_negative) {
        return Err(DynamicsError::NegativeInertia(ixx, iyy, izz));
    }
    Ok(())
}

#[cfg(test)]
mod inertia_tests {
    use na::vector;
    use rand::rng;

    use crate::{
        assert_close, assert_vec_close,
        spatial::spatial_vector,
        util::test_utils::random_vector,
    };

    use super::*;

    #[test]
    fn spatial_inertia_is_symmetric() {
        // Arrange
        let props = MassProperties::new(3.0, vector![0.1, -0.4, 0.7], 1.0, 2.0, 3.0, 0.1, 0.2, -0.3);

        // Act
        let inertia = props.spatial_inertia();

        // Assert
        assert_vec_close!(inertia, inertia.transpose(), 1e-12);
    }

    #[test]
    fn spatial_inertia_gravity_wrench() {
        // Arrange
        let m = 2.0;
        let com = vector![0.5, 0.0, 0.0];
        let props = MassProperties::new(m, com, 1.0, 1.0, 1.0, 0., 0., 0.);
        let g = vector![0.0, 0.0, -9.81];

        // Act
        let wrench = props.spatial_inertia() * spatial_vector(&Vector3::zeros(), &g);

        // Assert: gravity acts as force m*g applied at the center of mass
        assert_vec_close!(
            wrench,
            spatial_vector(&com.cross(&(m * g)), &(m * g)),
            1e-12
        );
    }

    #[test]
    fn kinetic_energy_is_non_negative() {
        // Arrange
        let mut rng = rng();
        let props = MassProperties::new(1.5, vector![0.2, 0.3, -0.1], 0.4, 0.5, 0.6, 0.01, 0.0, 0.02);
        let inertia = props.spatial_inertia();

        for _ in 0..100 {
            // Act
            let v = spatial_vector(&random_vector(&mut rng, 5.0), &random_vector(&mut rng, 5.0));
            let ke = kinetic_energy(&inertia, &v);

            // Assert
            assert!(ke >= 0.0, "negative kinetic energy {}", ke);
            if v.norm() > 1e-6 {
                assert!(ke > 0.0);
            }
        }
        assert_close!(kinetic_energy(&inertia, &SpatialVector::zeros()), 0.0, 1e-15);
    }

    #[test]
    fn kinetic_energy_of_translating_point_mass() {
        let props = MassProperties::new(2.0, Vector3::zeros(), 0., 0., 0., 0., 0., 0.);
        let v = spatial_vector(&Vector3::zeros(), &vector![3.0, 0.0, 4.0]);
        assert_close!(kinetic_energy(&props.spatial_inertia(), &v), 25.0, 1e-12);
    }

    #[test]
    fn rejects_negative_mass() {
        let mut props = MassProperties::default();
        assert_eq!(props.set_mass(-1.0), Err(DynamicsError::NegativeMass(-1.0)));
        assert_eq!(props.mass, 1.0);
    }

    #[test]
    fn rejects_negative_moment() {
        let mut props = MassProperties::default();
        assert!(props.set_moment(-1.0, 1.0, 1.0, 0., 0., 0.).is_err());
        assert_eq!(props.ixx, 1.0);
    }

    #[test]
    fn non_finite_mass_and_moments_are_rejected() {
        let mut props = MassProperties::sphere(1.0, 0.5);
        for bad in [Float::NAN, Float::INFINITY, -1.0] {
            assert!(matches!(props.set_mass(bad), Err(DynamicsError::NegativeMass(_))));
            assert!(matches!(
                props.set_moment(1.0, bad, 1.0, 0., 0., 0.),
                Err(DynamicsError::NegativeInertia(..))
            ));
        }
        assert_eq!(props.mass, 1.0);
        assert_eq!(props.validate(), Ok(()));

        props.izz = Float::NAN;
        assert!(props.validate().is_err());
    }
}
