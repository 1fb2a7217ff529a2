use super::LinearSystem;
use crate::base::{FixedDofs, IterationType, NonlinearConfig};
use crate::StrError;
use russell_lab::{vec_norm, Norm, Vector};

/// Defines the capability required by the nonlinear iterative solver
///
/// Implemented by the assemblers (stationary problems) and by the time integrators (one time step).
pub trait NonlinearSystem {
    /// Returns the number of free DOFs
    fn n_dof(&self) -> usize;

    /// Returns the current fixed DOFs
    fn fixed_dofs(&self) -> &FixedDofs;

    /// Assembles the linear system at the trial point
    ///
    /// Returns false if the assembly failed because of an invalid geometry or deformation.
    fn assemble(&mut self, trial: &Vector, fixed: &FixedDofs) -> Result<bool, StrError>;

    /// Returns the last assembled linear system
    fn linear_system(&self) -> Result<LinearSystem, StrError>;
}

/// Holds the outcome of a nonlinear solve (or of a time step)
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SolveOutcome {
    /// The iterations converged after the given number of iterations
    Converged(usize),

    /// The maximum number of iterations was reached without convergence
    DidNotConverge(usize),

    /// The assembly failed at the given iteration
    AssemblyFailed(usize),
}

impl SolveOutcome {
    /// Returns true if the iterations converged
    pub fn converged(&self) -> bool {
        match self {
            SolveOutcome::Converged(_) => true,
            _ => false,
        }
    }

    /// Returns the number of iterations
    pub fn n_iterations(&self) -> usize {
        match self {
            SolveOutcome::Converged(n) => *n,
            SolveOutcome::DidNotConverge(n) => *n,
            SolveOutcome::AssemblyFailed(n) => *n,
        }
    }
}

/// Holds the saved state of the solver
#[derive(Clone, Debug)]
struct SolverSnapshot {
    solution: Vector,
    fixed: FixedDofs,
    n_iterations: usize,
}

/// Implements a fixed-point/Newton driver over a NonlinearSystem
///
/// At each iteration, the system is assembled at the trial point and the linear system is solved.
/// With `IterationType::Update` the result is an increment; with `IterationType::Next` the result
/// replaces the trial point. The iterations stop when `‖Δ‖ ≤ tol_abs` or `‖Δ‖ ≤ tol_rel · ‖x‖`.
pub struct NonlinearSolver {
    /// Configuration
    config: NonlinearConfig,

    /// Current trial point (solution after convergence)
    solution: Vector,

    /// Fixed DOFs passed to the assembly
    fixed: FixedDofs,

    /// Number of iterations of the last solve
    n_iterations: usize,

    /// Single-slot checkpoint
    saved: Option<SolverSnapshot>,
}

impl NonlinearSolver {
    /// Allocates a new instance
    pub fn new(config: &NonlinearConfig, initial: Vector, fixed: FixedDofs) -> Result<Self, StrError> {
        if let Some(msg) = config.validate() {
            println!("ERROR: {}", msg);
            return Err("cannot allocate nonlinear solver because config.validate() failed");
        }
        Ok(NonlinearSolver {
            config: *config,
            solution: initial,
            fixed,
            n_iterations: 0,
            saved: None,
        })
    }

    /// Runs the iterations starting from the current solution
    pub fn solve<S: NonlinearSystem>(&mut self, system: &mut S) -> Result<SolveOutcome, StrError> {
        let n_dof = system.n_dof();
        if self.solution.dim() != n_dof {
            return Err("the initial guess is incompatible with the nonlinear system");
        }
        self.n_iterations = 0;
        self.print_header();
        for it in 0..self.config.n_max_iterations {
            self.n_iterations = it + 1;
            if !system.assemble(&self.solution, &self.fixed)? {
                log::warn!("nonlinear solver: assembly failed at iteration {}", it + 1);
                return Ok(SolveOutcome::AssemblyFailed(it + 1));
            }
            let lin_sys = system.linear_system()?;
            let x = lin_sys.solve(self.config.lin_sol_genie, false)?;
            if x.dim() != n_dof {
                return Err("the linear system is incompatible with the nonlinear system");
            }
            let norm_update = match self.config.iteration_type {
                IterationType::Update => {
                    for i in 0..n_dof {
                        self.solution[i] += x[i];
                    }
                    vec_norm(&x, Norm::Euc)
                }
                IterationType::Next => {
                    let mut delta = Vector::new(n_dof);
                    for i in 0..n_dof {
                        delta[i] = x[i] - self.solution[i];
                    }
                    self.solution = x;
                    vec_norm(&delta, Norm::Euc)
                }
            };
            let norm_solution = vec_norm(&self.solution, Norm::Euc);
            if !norm_update.is_finite() || !norm_solution.is_finite() {
                return Err("found NaN or Inf in the nonlinear iterations");
            }
            let converged = norm_update <= self.config.tol_abs || norm_update <= self.config.tol_rel * norm_solution;
            self.print_iteration(it + 1, norm_update, norm_solution, converged);
            if converged {
                self.print_footer();
                return Ok(SolveOutcome::Converged(it + 1));
            }
        }
        self.print_footer();
        log::warn!(
            "nonlinear solver: no convergence after {} iterations",
            self.config.n_max_iterations
        );
        Ok(SolveOutcome::DidNotConverge(self.config.n_max_iterations))
    }

    /// Resets the solution to zero and replaces the fixed DOFs
    pub fn reset(&mut self, fixed: &FixedDofs) {
        self.solution.fill(0.0);
        self.fixed = fixed.clone();
        self.n_iterations = 0;
    }

    /// Replaces the current solution (initial guess of the next solve)
    pub fn set_solution(&mut self, solution: Vector) -> Result<(), StrError> {
        if solution.dim() != self.solution.dim() {
            return Err("the solution vector has an incorrect dimension");
        }
        self.solution = solution;
        Ok(())
    }

    /// Replaces the fixed DOFs
    pub fn set_fixed_dofs(&mut self, fixed: &FixedDofs) {
        self.fixed = fixed.clone();
    }

    /// Returns the current solution
    pub fn solution(&self) -> &Vector {
        &self.solution
    }

    /// Returns the fixed DOFs
    pub fn fixed_dofs(&self) -> &FixedDofs {
        &self.fixed
    }

    /// Returns the number of iterations of the last solve
    pub fn n_iterations(&self) -> usize {
        self.n_iterations
    }

    /// Saves the solution, the fixed DOFs and the iteration count
    pub fn save_state(&mut self) {
        self.saved = Some(SolverSnapshot {
            solution: self.solution.clone(),
            fixed: self.fixed.clone(),
            n_iterations: self.n_iterations,
        });
    }

    /// Recovers the state saved by save_state; the saved state is kept
    pub fn recover_state(&mut self) -> Result<(), StrError> {
        match &self.saved {
            Some(snapshot) => {
                self.solution = snapshot.solution.clone();
                self.fixed = snapshot.fixed.clone();
                self.n_iterations = snapshot.n_iterations;
                Ok(())
            }
            None => Err("cannot recover the solver state because it has not been saved"),
        }
    }

    fn print_header(&self) {
        if self.config.verbose {
            println!("{}", "─".repeat(52));
            println!("{:>5} {:>12} {:>12} {:>12}   ", "iter", "‖Δ‖", "‖x‖", "‖Δ‖/‖x‖");
            println!("{}", "─".repeat(52));
        }
    }

    fn print_iteration(&self, it: usize, norm_update: f64, norm_solution: f64, converged: bool) {
        if self.config.verbose {
            let icon = if converged { "✅" } else { "🔹" };
            let rel = if norm_solution > 0.0 {
                format!("{:>12.2e}", norm_update / norm_solution)
            } else {
                format!("{:>12}", "·")
            };
            println!(
                "{:>5} {:>12.2e} {:>12.2e} {} {}",
                it, norm_update, norm_solution, rel, icon
            );
        }
    }

    fn print_footer(&self) {
        if self.config.verbose {
            println!("{}", "─".repeat(52));
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{NonlinearSolver, NonlinearSystem, SolveOutcome};
    use crate::base::{FixedDofs, IterationType, NonlinearConfig};
    use crate::fem::{LinearSystem, SparseBlock};
    use crate::StrError;
    use russell_lab::{approx_eq, Vector};

    /// Solves x² - 4 = 0 and y - 1 = 0 with Newton's method (update mode)
    struct Quadratic {
        fixed: FixedDofs,
        system: Option<LinearSystem>,
        fail_at_negative: bool,
    }

    impl NonlinearSystem for Quadratic {
        fn n_dof(&self) -> usize {
            2
        }
        fn fixed_dofs(&self) -> &FixedDofs {
            &self.fixed
        }
        fn assemble(&mut self, trial: &Vector, _fixed: &FixedDofs) -> Result<bool, StrError> {
            if self.fail_at_negative && trial[0] < 0.0 {
                return Ok(false);
            }
            let mut kk = SparseBlock::new(2, 2);
            kk.put(0, 0, 2.0 * trial[0])?;
            kk.put(1, 1, 1.0)?;
            let rhs = Vector::from(&[4.0 - trial[0] * trial[0], 1.0 - trial[1]]);
            self.system = Some(LinearSystem::new(kk, rhs)?);
            Ok(true)
        }
        fn linear_system(&self) -> Result<LinearSystem, StrError> {
            match &self.system {
                Some(s) => Ok(s.clone()),
                None => Err("not assembled"),
            }
        }
    }

    /// Picard iterations for x = (1 + x₀/2, 2) in next mode; the fixed point is (2, 2)
    struct FixedPoint {
        fixed: FixedDofs,
        system: Option<LinearSystem>,
    }

    impl NonlinearSystem for FixedPoint {
        fn n_dof(&self) -> usize {
            2
        }
        fn fixed_dofs(&self) -> &FixedDofs {
            &self.fixed
        }
        fn assemble(&mut self, trial: &Vector, _fixed: &FixedDofs) -> Result<bool, StrError> {
            let mut kk = SparseBlock::new(2, 2);
            kk.put(0, 0, 1.0)?;
            kk.put(1, 1, 1.0)?;
            let rhs = Vector::from(&[1.0 + trial[0] / 2.0, 2.0]);
            self.system = Some(LinearSystem::new(kk, rhs)?);
            Ok(true)
        }
        fn linear_system(&self) -> Result<LinearSystem, StrError> {
            match &self.system {
                Some(s) => Ok(s.clone()),
                None => Err("not assembled"),
            }
        }
    }

    fn no_fixed() -> FixedDofs {
        FixedDofs { values: Vec::new() }
    }

    #[test]
    fn new_captures_errors() {
        let mut config = NonlinearConfig::new();
        config.n_max_iterations = 0;
        assert_eq!(
            NonlinearSolver::new(&config, Vector::new(2), no_fixed()).err(),
            Some("cannot allocate nonlinear solver because config.validate() failed")
        );
    }

    #[test]
    fn update_mode_converges() {
        let config = NonlinearConfig::new();
        let mut system = Quadratic {
            fixed: no_fixed(),
            system: None,
            fail_at_negative: false,
        };
        let mut solver = NonlinearSolver::new(&config, Vector::from(&[3.0, 0.0]), no_fixed()).unwrap();
        let outcome = solver.solve(&mut system).unwrap();
        assert!(outcome.converged());
        assert!(outcome.n_iterations() > 2);
        assert_eq!(solver.n_iterations(), outcome.n_iterations());
        approx_eq(solver.solution()[0], 2.0, 1e-12);
        approx_eq(solver.solution()[1], 1.0, 1e-15);
    }

    #[test]
    fn next_mode_converges() {
        let mut config = NonlinearConfig::new();
        config.iteration_type = IterationType::Next;
        let mut system = FixedPoint {
            fixed: no_fixed(),
            system: None,
        };
        let mut solver = NonlinearSolver::new(&config, Vector::new(2), no_fixed()).unwrap();
        let outcome = solver.solve(&mut system).unwrap();
        assert!(outcome.converged());
        approx_eq(solver.solution()[0], 2.0, 1e-8);
        assert_eq!(solver.solution()[1], 2.0);
    }

    #[test]
    fn converged_initial_guess_takes_one_iteration() {
        let mut config = NonlinearConfig::new();
        config.iteration_type = IterationType::Next;
        let mut system = FixedPoint {
            fixed: no_fixed(),
            system: None,
        };
        let mut solver = NonlinearSolver::new(&config, Vector::from(&[2.0, 2.0]), no_fixed()).unwrap();
        assert_eq!(solver.solve(&mut system), Ok(SolveOutcome::Converged(1)));
        assert_eq!(solver.n_iterations(), 1);
    }

    #[test]
    fn non_convergence_is_reported() {
        let mut config = NonlinearConfig::new();
        config.set_n_max_iterations(2).unwrap();
        let mut system = Quadratic {
            fixed: no_fixed(),
            system: None,
            fail_at_negative: false,
        };
        let mut solver = NonlinearSolver::new(&config, Vector::from(&[100.0, 0.0]), no_fixed()).unwrap();
        let outcome = solver.solve(&mut system).unwrap();
        assert_eq!(outcome, SolveOutcome::DidNotConverge(2));
        assert!(!outcome.converged());
    }

    #[test]
    fn assembly_failure_is_reported() {
        let config = NonlinearConfig::new();
        let mut system = Quadratic {
            fixed: no_fixed(),
            system: None,
            fail_at_negative: true,
        };
        let mut solver = NonlinearSolver::new(&config, Vector::from(&[-1.0, 0.0]), no_fixed()).unwrap();
        assert_eq!(solver.solve(&mut system), Ok(SolveOutcome::AssemblyFailed(1)));
    }

    #[test]
    fn solve_captures_errors() {
        let config = NonlinearConfig::new();
        let mut system = Quadratic {
            fixed: no_fixed(),
            system: None,
            fail_at_negative: false,
        };
        let mut solver = NonlinearSolver::new(&config, Vector::new(3), no_fixed()).unwrap();
        assert_eq!(
            solver.solve(&mut system).err(),
            Some("the initial guess is incompatible with the nonlinear system")
        );
        // zero tangent
        let mut solver = NonlinearSolver::new(&config, Vector::new(2), no_fixed()).unwrap();
        assert!(solver.solve(&mut system).is_err());
    }

    #[test]
    fn save_and_recover_work() {
        let config = NonlinearConfig::new();
        let mut solver = NonlinearSolver::new(&config, Vector::from(&[3.0, 0.0]), no_fixed()).unwrap();
        assert_eq!(
            solver.recover_state().err(),
            Some("cannot recover the solver state because it has not been saved")
        );
        solver.save_state();
        let mut system = Quadratic {
            fixed: no_fixed(),
            system: None,
            fail_at_negative: false,
        };
        solver.solve(&mut system).unwrap();
        solver.recover_state().unwrap();
        assert_eq!(solver.solution().as_data(), &[3.0, 0.0]);
        assert_eq!(solver.n_iterations(), 0);
        // the checkpoint is kept
        solver.set_solution(Vector::from(&[1.0, 1.0])).unwrap();
        solver.recover_state().unwrap();
        assert_eq!(solver.solution().as_data(), &[3.0, 0.0]);
        solver.reset(&no_fixed());
        assert_eq!(solver.solution().as_data(), &[0.0, 0.0]);
    }
}
