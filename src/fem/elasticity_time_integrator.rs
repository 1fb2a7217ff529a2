use super::{BlockBuilder, ElasticityAssembler, LinearSystem, MassAssembler, NonlinearSolver, NonlinearSystem};
use super::{SolveOutcome, SparseBlock};
use crate::base::{ElasticityTimeConfig, Field, FixedDofs, TimeScheme};
use crate::StrError;
use russell_lab::Vector;

/// Holds the coefficients of the Newmark method for a given time step
#[derive(Clone, Copy, Debug)]
pub struct NewmarkCoefficients {
    /// α1 = 1 / (β dt²)
    pub alpha1: f64,

    /// α2 = 1 / (β dt)
    pub alpha2: f64,

    /// α3 = (1 - 2β) / (2β)
    pub alpha3: f64,

    /// α4 = γ / (β dt)
    pub alpha4: f64,

    /// α5 = 1 - γ / β
    pub alpha5: f64,

    /// α6 = (1 - γ / (2β)) dt
    pub alpha6: f64,
}

impl NewmarkCoefficients {
    /// Computes the coefficients
    pub fn new(beta: f64, gamma: f64, dt: f64) -> Result<Self, StrError> {
        if dt <= 0.0 {
            return Err("the time step must be > 0.0");
        }
        Ok(NewmarkCoefficients {
            alpha1: 1.0 / (beta * dt * dt),
            alpha2: 1.0 / (beta * dt),
            alpha3: (1.0 - 2.0 * beta) / (2.0 * beta),
            alpha4: gamma / (beta * dt),
            alpha5: 1.0 - gamma / beta,
            alpha6: (1.0 - gamma / (2.0 * beta)) * dt,
        })
    }
}

/// Holds the saved state of the integrator
#[derive(Clone, Debug)]
struct NewmarkSnapshot {
    displacement: Vector,
    velocity: Vector,
    acceleration: Vector,
    initialized: bool,
}

/// Implements one Newton step system: (α1 M + K_T) Δu = F_ext - f_int(u) + M (α1 (d_n - u) + α2 v + α3 a)
struct NewmarkStep<'a> {
    assembler: &'a mut ElasticityAssembler,
    mass: &'a SparseBlock,
    predictor: Vector,
    alpha1: f64,
    system: Option<LinearSystem>,
}

impl<'a> NonlinearSystem for NewmarkStep<'a> {
    fn n_dof(&self) -> usize {
        self.assembler.n_dof()
    }

    fn fixed_dofs(&self) -> &FixedDofs {
        self.assembler.fixed_dofs()
    }

    fn assemble(&mut self, trial: &Vector, fixed: &FixedDofs) -> Result<bool, StrError> {
        if !self.assembler.assemble_at(trial, fixed)? {
            return Ok(false);
        }
        let mut rhs = self.assembler.rhs().clone();
        self.mass.mat_vec_add(&mut rhs, 1.0, &self.predictor)?;
        self.mass.mat_vec_add(&mut rhs, -self.alpha1, trial)?;
        let n = self.assembler.n_dof();
        let mut builder = BlockBuilder::new(n);
        builder
            .add(0, 0, self.alpha1, self.mass)?
            .add(0, 0, 1.0, self.assembler.matrix())?;
        self.system = Some(builder.build_system(rhs)?);
        Ok(true)
    }

    fn linear_system(&self) -> Result<LinearSystem, StrError> {
        match &self.system {
            Some(system) => Ok(system.clone()),
            None => Err("the Newmark system has not been assembled"),
        }
    }
}

/// Integrates the elastodynamics equations M ü + f_int(u) = F with the Newmark method
///
/// The prescribed displacements are assumed constant in time (e.g., clamped supports).
pub struct ElasticityTimeIntegrator {
    assembler: ElasticityAssembler,
    mass: MassAssembler,
    config: ElasticityTimeConfig,
    displacement: Vector,
    velocity: Vector,
    acceleration: Vector,
    n_iterations: usize,
    initialized: bool,
    saved: Option<NewmarkSnapshot>,
}

impl ElasticityTimeIntegrator {
    /// Allocates a new instance and assembles the mass matrix
    pub fn new(assembler: ElasticityAssembler, config: &ElasticityTimeConfig) -> Result<Self, StrError> {
        if let Some(msg) = config.validate() {
            println!("ERROR: {}", msg);
            return Err("cannot allocate elasticity time integrator because config.validate() failed");
        }
        if assembler.param().density <= 0.0 {
            return Err("the density of the solid must be > 0.0");
        }
        let mut mass = MassAssembler::new(
            assembler.mapper().clone(),
            assembler.param().density,
            assembler.fixed_dofs(),
        )?;
        if !mass.assemble(assembler.mesh())? {
            return Err("cannot assemble the mass matrix because the geometry is invalid");
        }
        let n = assembler.n_dof();
        Ok(ElasticityTimeIntegrator {
            assembler,
            mass,
            config: *config,
            displacement: Vector::new(n),
            velocity: Vector::new(n),
            acceleration: Vector::new(n),
            n_iterations: 0,
            initialized: false,
            saved: None,
        })
    }

    /// Computes the initial acceleration a = M⁻¹ (F - f_int(d))
    ///
    /// Returns false if the assembly failed.
    pub fn initialize(&mut self) -> Result<bool, StrError> {
        let fixed = self.assembler.fixed_dofs().clone();
        let rhs = match self.config.scheme {
            TimeScheme::ImplicitLinear => {
                if !self.assembler.assemble()? {
                    return Ok(false);
                }
                let mut rhs = self.assembler.rhs().clone();
                self.assembler.matrix().mat_vec_add(&mut rhs, -1.0, &self.displacement)?;
                rhs
            }
            TimeScheme::ImplicitNonlinear => {
                if !self.assembler.assemble_at(&self.displacement, &fixed)? {
                    return Ok(false);
                }
                self.assembler.rhs().clone()
            }
        };
        let system = LinearSystem::new(self.mass.matrix()?.clone(), rhs)?;
        self.acceleration = system.solve(self.config.nonlinear.lin_sol_genie, false)?;
        self.initialized = true;
        Ok(true)
    }

    /// Advances the solution by one time step
    ///
    /// The state is updated only if the outcome is Converged.
    pub fn make_time_step(&mut self, dt: f64) -> Result<SolveOutcome, StrError> {
        if !self.initialized {
            if !self.initialize()? {
                return Ok(SolveOutcome::AssemblyFailed(0));
            }
        }
        let c = NewmarkCoefficients::new(self.config.beta, self.config.gamma, dt)?;
        let n = self.assembler.n_dof();
        let mut predictor = Vector::new(n);
        for i in 0..n {
            predictor[i] = c.alpha1 * self.displacement[i] + c.alpha2 * self.velocity[i] + c.alpha3 * self.acceleration[i];
        }
        let mm = self.mass.matrix()?;
        let (outcome, new_displacement) = match self.config.scheme {
            TimeScheme::ImplicitLinear => {
                if !self.assembler.assemble()? {
                    return Ok(SolveOutcome::AssemblyFailed(1));
                }
                let mut rhs = self.assembler.rhs().clone();
                mm.mat_vec_add(&mut rhs, 1.0, &predictor)?;
                let mut builder = BlockBuilder::new(n);
                builder
                    .add(0, 0, c.alpha1, mm)?
                    .add(0, 0, 1.0, self.assembler.matrix())?;
                let system = builder.build_system(rhs)?;
                let x = system.solve(self.config.nonlinear.lin_sol_genie, false)?;
                (SolveOutcome::Converged(1), x)
            }
            TimeScheme::ImplicitNonlinear => {
                let fixed = self.assembler.fixed_dofs().clone();
                let mut solver = NonlinearSolver::new(&self.config.nonlinear, self.displacement.clone(), fixed)?;
                let mut step = NewmarkStep {
                    assembler: &mut self.assembler,
                    mass: mm,
                    predictor,
                    alpha1: c.alpha1,
                    system: None,
                };
                let outcome = solver.solve(&mut step)?;
                (outcome, solver.solution().clone())
            }
        };
        self.n_iterations = outcome.n_iterations();
        if !outcome.converged() {
            return Ok(outcome);
        }
        for i in 0..n {
            let delta = new_displacement[i] - self.displacement[i];
            let v = self.velocity[i];
            let a = self.acceleration[i];
            self.velocity[i] = c.alpha4 * delta + c.alpha5 * v + c.alpha6 * a;
            self.acceleration[i] = c.alpha1 * delta - c.alpha2 * v - c.alpha3 * a;
        }
        self.displacement = new_displacement;
        Ok(outcome)
    }

    /// Returns the displacement (free DOFs)
    pub fn displacement(&self) -> &Vector {
        &self.displacement
    }

    /// Returns the velocity (free DOFs)
    pub fn velocity(&self) -> &Vector {
        &self.velocity
    }

    /// Returns the acceleration (free DOFs)
    pub fn acceleration(&self) -> &Vector {
        &self.acceleration
    }

    /// Returns the nodal displacement field
    pub fn displacement_field(&self) -> Result<Field, StrError> {
        self.assembler
            .construct_solution(&self.displacement, self.assembler.fixed_dofs())
    }

    /// Returns the assembler
    pub fn assembler(&self) -> &ElasticityAssembler {
        &self.assembler
    }

    /// Returns the mass matrix
    pub fn mass_matrix(&self) -> Result<&SparseBlock, StrError> {
        self.mass.matrix()
    }

    /// Returns the number of iterations of the last step
    pub fn n_iterations(&self) -> usize {
        self.n_iterations
    }

    /// Saves displacement, velocity and acceleration
    pub fn save_state(&mut self) {
        self.saved = Some(NewmarkSnapshot {
            displacement: self.displacement.clone(),
            velocity: self.velocity.clone(),
            acceleration: self.acceleration.clone(),
            initialized: self.initialized,
        });
    }

    /// Recovers the state saved by save_state; the saved state is kept
    pub fn recover_state(&mut self) -> Result<(), StrError> {
        match &self.saved {
            Some(snapshot) => {
                self.displacement = snapshot.displacement.clone();
                self.velocity = snapshot.velocity.clone();
                self.acceleration = snapshot.acceleration.clone();
                self.initialized = snapshot.initialized;
                Ok(())
            }
            None => Err("cannot recover the elasticity state because it has not been saved"),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
