use super::{IterationType, TimeScheme};
use crate::StrError;
use russell_sparse::Genie;
use std::fmt;

/// Defines the smallest allowed tolerance
pub const CONFIG_MIN_TOL: f64 = 1e-15;

/// Holds the options of the nonlinear iterative solver
#[derive(Clone, Copy, Debug)]
pub struct NonlinearConfig {
    /// Absolute tolerance on the norm of the update
    pub tol_abs: f64,

    /// Relative tolerance on the norm of the update (relative to the norm of the solution)
    pub tol_rel: f64,

    /// Maximum number of iterations
    pub n_max_iterations: usize,

    /// How the linear solution updates the trial point
    pub iteration_type: IterationType,

    /// Linear solver
    pub lin_sol_genie: Genie,

    /// Prints the iterations
    pub verbose: bool,
}

impl NonlinearConfig {
    /// Allocates a new instance with default values
    pub fn new() -> Self {
        NonlinearConfig {
            tol_abs: 1e-10,
            tol_rel: 1e-9,
            n_max_iterations: 50,
            iteration_type: IterationType::Update,
            lin_sol_genie: Genie::Umfpack,
            verbose: false,
        }
    }

    /// Sets the absolute and relative tolerances
    pub fn set_tolerances(&mut self, tol_abs: f64, tol_rel: f64) -> Result<&mut Self, StrError> {
        if tol_abs < CONFIG_MIN_TOL || tol_rel < CONFIG_MIN_TOL {
            return Err("tolerances must be ≥ 1e-15");
        }
        self.tol_abs = tol_abs;
        self.tol_rel = tol_rel;
        Ok(self)
    }

    /// Sets the maximum number of iterations
    pub fn set_n_max_iterations(&mut self, value: usize) -> Result<&mut Self, StrError> {
        if value < 1 {
            return Err("the maximum number of iterations must be ≥ 1");
        }
        self.n_max_iterations = value;
        Ok(self)
    }

    /// Sets the iteration type
    pub fn set_iteration_type(&mut self, value: IterationType) -> Result<&mut Self, StrError> {
        self.iteration_type = value;
        Ok(self)
    }

    /// Sets the verbose mode
    pub fn set_verbose(&mut self, flag: bool) -> Result<&mut Self, StrError> {
        self.verbose = flag;
        Ok(self)
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if self.tol_abs < CONFIG_MIN_TOL {
            return Some(format!(
                "tol_abs = {:?} is incorrect; it must be ≥ {:e}",
                self.tol_abs, CONFIG_MIN_TOL
            ));
        }
        if self.tol_rel < CONFIG_MIN_TOL {
            return Some(format!(
                "tol_rel = {:?} is incorrect; it must be ≥ {:e}",
                self.tol_rel, CONFIG_MIN_TOL
            ));
        }
        if self.n_max_iterations < 1 {
            return Some(format!(
                "n_max_iterations = {} is incorrect; it must be ≥ 1",
                self.n_max_iterations
            ));
        }
        None
    }
}

/// Holds the options of the flow time integrator
#[derive(Clone, Copy, Debug)]
pub struct FlowTimeConfig {
    /// Time integration scheme
    pub scheme: TimeScheme,

    /// Coefficient θ of the θ-method; 0 ≤ θ ≤ 1
    ///
    /// θ = 0 is the explicit Euler, θ = 0.5 the Crank-Nicolson and θ = 1 the implicit Euler method
    pub theta: f64,

    /// Options of the Newton iterations (implicit nonlinear scheme)
    pub nonlinear: NonlinearConfig,
}

impl FlowTimeConfig {
    /// Allocates a new instance with default values
    pub fn new() -> Self {
        let mut nonlinear = NonlinearConfig::new();
        nonlinear.tol_abs = 1e-10;
        nonlinear.tol_rel = 1e-7;
        nonlinear.iteration_type = IterationType::Next;
        FlowTimeConfig {
            scheme: TimeScheme::ImplicitLinear,
            theta: 0.5,
            nonlinear,
        }
    }

    /// Sets the time integration scheme
    pub fn set_scheme(&mut self, scheme: TimeScheme) -> Result<&mut Self, StrError> {
        self.scheme = scheme;
        Ok(self)
    }

    /// Sets the coefficient θ
    pub fn set_theta(&mut self, theta: f64) -> Result<&mut Self, StrError> {
        if theta < 0.0 || theta > 1.0 {
            return Err("theta must satisfy 0.0 ≤ θ ≤ 1.0");
        }
        self.theta = theta;
        Ok(self)
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if self.theta < 0.0 || self.theta > 1.0 {
            return Some(format!("theta = {:?} is incorrect; it must be 0.0 ≤ θ ≤ 1.0", self.theta));
        }
        if self.nonlinear.iteration_type != IterationType::Next {
            return Some("the flow time integrator requires IterationType::Next".to_string());
        }
        self.nonlinear.validate()
    }
}

/// Holds the options of the elasticity (Newmark) time integrator
#[derive(Clone, Copy, Debug)]
pub struct ElasticityTimeConfig {
    /// Time integration scheme
    pub scheme: TimeScheme,

    /// Newmark coefficient β
    pub beta: f64,

    /// Newmark coefficient γ
    pub gamma: f64,

    /// Options of the Newton iterations (implicit nonlinear scheme)
    pub nonlinear: NonlinearConfig,
}

impl ElasticityTimeConfig {
    /// Allocates a new instance with default values (average acceleration method)
    pub fn new() -> Self {
        ElasticityTimeConfig {
            scheme: TimeScheme::ImplicitLinear,
            beta: 0.25,
            gamma: 0.5,
            nonlinear: NonlinearConfig::new(),
        }
    }

    /// Sets the time integration scheme
    pub fn set_scheme(&mut self, scheme: TimeScheme) -> Result<&mut Self, StrError> {
        self.scheme = scheme;
        Ok(self)
    }

    /// Sets the Newmark coefficients
    pub fn set_newmark(&mut self, beta: f64, gamma: f64) -> Result<&mut Self, StrError> {
        if beta <= 0.0 || beta > 0.5 {
            return Err("beta must satisfy 0.0 < β ≤ 0.5");
        }
        if gamma < 0.0 || gamma > 1.0 {
            return Err("gamma must satisfy 0.0 ≤ γ ≤ 1.0");
        }
        self.beta = beta;
        self.gamma = gamma;
        Ok(self)
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if self.beta <= 0.0 || self.beta > 0.5 {
            return Some(format!("beta = {:?} is incorrect; it must be 0.0 < β ≤ 0.5", self.beta));
        }
        if self.gamma < 0.0 || self.gamma > 1.0 {
            return Some(format!("gamma = {:?} is incorrect; it must be 0.0 ≤ γ ≤ 1.0", self.gamma));
        }
        if self.nonlinear.iteration_type != IterationType::Update {
            return Some("the elasticity time integrator requires IterationType::Update".to_string());
        }
        self.nonlinear.validate()
    }
}

impl fmt::Display for NonlinearConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tol_abs = {:?}\n", self.tol_abs)?;
        write!(f, "tol_rel = {:?}\n", self.tol_rel)?;
        write!(f, "n_max_iterations = {}\n", self.n_max_iterations)?;
        write!(f, "iteration_type = {:?}\n", self.iteration_type)?;
        write!(f, "lin_sol_genie = {:?}\n", self.lin_sol_genie)?;
        Ok(())
    }
}

impl fmt::Display for FlowTimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flow time integration\n")?;
        write!(f, "=====================\n")?;
        write!(f, "scheme = {:?}\n", self.scheme)?;
        write!(f, "theta = {:?}\n", self.theta)?;
        write!(f, "{}", self.nonlinear)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{ElasticityTimeConfig, FlowTimeConfig, NonlinearConfig};
    use crate::base::{IterationType, TimeScheme};

    #[test]
    fn new_works() {
        let config = NonlinearConfig::new();
        assert_eq!(config.tol_abs, 1e-10);
        assert_eq!(config.tol_rel, 1e-9);
        assert_eq!(config.n_max_iterations, 50);
        assert_eq!(config.iteration_type, IterationType::Update);
        assert_eq!(config.validate(), None);

        let config = FlowTimeConfig::new();
        assert_eq!(config.scheme, TimeScheme::ImplicitLinear);
        assert_eq!(config.theta, 0.5);
        assert_eq!(config.nonlinear.tol_rel, 1e-7);
        assert_eq!(config.validate(), None);

        let config = ElasticityTimeConfig::new();
        assert_eq!(config.beta, 0.25);
        assert_eq!(config.gamma, 0.5);
        assert_eq!(config.validate(), None);
    }

    #[test]
    fn setters_capture_errors() {
        let mut config = NonlinearConfig::new();
        assert_eq!(config.set_tolerances(0.0, 1e-8).err(), Some("tolerances must be ≥ 1e-15"));
        assert_eq!(
            config.set_n_max_iterations(0).err(),
            Some("the maximum number of iterations must be ≥ 1")
        );
        config
            .set_tolerances(1e-8, 1e-6)
            .unwrap()
            .set_n_max_iterations(3)
            .unwrap()
            .set_verbose(true)
            .unwrap();
        assert_eq!(config.tol_abs, 1e-8);
        assert_eq!(config.n_max_iterations, 3);
        assert!(config.verbose);

        let mut config = FlowTimeConfig::new();
        assert_eq!(config.set_theta(1.5).err(), Some("theta must satisfy 0.0 ≤ θ ≤ 1.0"));
        config.set_theta(1.0).unwrap().set_scheme(TimeScheme::ImplicitNonlinear).unwrap();
        assert_eq!(config.theta, 1.0);

        let mut config = ElasticityTimeConfig::new();
        assert_eq!(config.set_newmark(0.0, 0.5).err(), Some("beta must satisfy 0.0 < β ≤ 0.5"));
        assert_eq!(config.set_newmark(0.25, 1.5).err(), Some("gamma must satisfy 0.0 ≤ γ ≤ 1.0"));
    }

    #[test]
    fn validate_works() {
        let mut config = NonlinearConfig::new();
        config.tol_abs = 0.0;
        assert_eq!(
            config.validate(),
            Some("tol_abs = 0.0 is incorrect; it must be ≥ 1e-15".to_string())
        );
        config.tol_abs = 1e-10;
        config.n_max_iterations = 0;
        assert_eq!(
            config.validate(),
            Some("n_max_iterations = 0 is incorrect; it must be ≥ 1".to_string())
        );

        let mut config = FlowTimeConfig::new();
        config.theta = -0.1;
        assert_eq!(
            config.validate(),
            Some("theta = -0.1 is incorrect; it must be 0.0 ≤ θ ≤ 1.0".to_string())
        );
        config.theta = 0.5;
        config.nonlinear.iteration_type = IterationType::Update;
        assert_eq!(
            config.validate(),
            Some("the flow time integrator requires IterationType::Next".to_string())
        );

        let mut config = ElasticityTimeConfig::new();
        config.nonlinear.iteration_type = IterationType::Next;
        assert_eq!(
            config.validate(),
            Some("the elasticity time integrator requires IterationType::Update".to_string())
        );
    }
}
