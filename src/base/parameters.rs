use super::MaterialLaw;
use serde::{Deserialize, Serialize};

/// Holds parameters for an incompressible Newtonian fluid
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct ParamFluid {
    /// Density ρ
    pub density: f64,

    /// Kinematic viscosity ν (the dynamic viscosity is ρ·ν)
    pub viscosity: f64,
}

/// Holds parameters for an elastic solid (also used for the pseudo-elastic ALE mesh)
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct ParamSolid {
    /// Young's modulus
    pub young: f64,

    /// Poisson's coefficient
    pub poisson: f64,

    /// Density (used by the mass matrix of dynamic problems)
    pub density: f64,

    /// Constitutive law
    pub law: MaterialLaw,

    /// Local stiffening exponent χ
    ///
    /// The Lamé parameters are multiplied by (1/det J)^χ where J is the Jacobian of the
    /// geometry map; small cells become stiffer. Zero means no stiffening.
    pub local_stiffening: f64,
}

impl ParamFluid {
    /// Returns the parameters of the flapping-beam benchmark fluid
    pub fn sample_flapping_beam() -> Self {
        ParamFluid {
            density: 1.0e3,
            viscosity: 0.001,
        }
    }
}

impl ParamSolid {
    /// Returns the parameters of the flapping-beam benchmark structure
    pub fn sample_flapping_beam() -> Self {
        ParamSolid {
            young: 1.4e6,
            poisson: 0.4,
            density: 1.0e3,
            law: MaterialLaw::NeoHookeLn,
            local_stiffening: 0.0,
        }
    }

    /// Returns the parameters of a linear elastic material
    pub fn sample_linear_elastic(young: f64, poisson: f64) -> Self {
        ParamSolid {
            young,
            poisson,
            density: 1.0,
            law: MaterialLaw::LinearElastic,
            local_stiffening: 0.0,
        }
    }

    /// Returns the Lamé parameters (λ, μ) for plane strain
    pub fn lame(&self) -> (f64, f64) {
        let lambda = self.young * self.poisson / ((1.0 + self.poisson) * (1.0 - 2.0 * self.poisson));
        let mu = self.young / (2.0 * (1.0 + self.poisson));
        (lambda, mu)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{ParamFluid, ParamSolid};
    use crate::base::MaterialLaw;
    use russell_lab::approx_eq;

    #[test]
    fn samples_work() {
        let fluid = ParamFluid::sample_flapping_beam();
        assert_eq!(fluid.density, 1000.0);
        assert_eq!(fluid.viscosity, 0.001);
        let solid = ParamSolid::sample_flapping_beam();
        assert_eq!(solid.law, MaterialLaw::NeoHookeLn);
        let json = serde_json::to_string(&solid).unwrap();
        let read: ParamSolid = serde_json::from_str(&json).unwrap();
        assert_eq!(format!("{:?}", read), format!("{:?}", solid));
    }

    #[test]
    fn lame_works() {
        let solid = ParamSolid::sample_linear_elastic(1000.0, 0.25);
        let (lambda, mu) = solid.lame();
        approx_eq(lambda, 400.0, 1e-12);
        approx_eq(mu, 400.0, 1e-12);
        let solid = ParamSolid::sample_linear_elastic(2.0, 0.0);
        assert_eq!(solid.lame(), (0.0, 1.0));
    }
}
