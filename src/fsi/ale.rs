use crate::base::{BoundaryConditions, Field, MultiPatch, NonlinearConfig, ParamSolid, Side};
use crate::fem::{ElasticityAssembler, NonlinearSolver, NonlinearSystem, SolveOutcome};
use crate::StrError;
use russell_lab::{Matrix, Vector};

/// Moves the ALE mesh with a pseudo-elastic problem driven by the interface displacements
///
/// Each step solves for the displacement increment of the mesh, starting from zero, on the
/// current (moved) ALE geometry. The accumulated displacement and the mesh velocity
/// `(d_new - d_old) / dt` are kept in buffers.
pub struct AleMotion {
    assembler: ElasticityAssembler,
    solver: NonlinearSolver,
    reference: MultiPatch,
    displacement: Field,
    velocity: Field,
    increment: Field,
}

impl AleMotion {
    /// Allocates a new instance
    ///
    /// # Input
    ///
    /// * `mesh` -- the ALE mesh
    /// * `bcs` -- the Dirichlet conditions (usually zero on the whole boundary)
    /// * `param` -- pseudo-material parameters, including the local stiffening exponent
    /// * `config` -- nonlinear solver configuration; must use the update mode
    pub fn new(
        mesh: MultiPatch,
        bcs: &BoundaryConditions,
        param: ParamSolid,
        config: &NonlinearConfig,
    ) -> Result<Self, StrError> {
        let nnode = mesh.nnode();
        let reference = mesh.clone();
        let assembler = ElasticityAssembler::new(mesh, bcs, param, [0.0, 0.0])?;
        let solver = NonlinearSolver::new(config, Vector::new(assembler.n_dof()), assembler.fixed_dofs().clone())?;
        Ok(AleMotion {
            assembler,
            solver,
            reference,
            displacement: Field::new(nnode, 2),
            velocity: Field::new(nnode, 2),
            increment: Field::new(nnode, 2),
        })
    }

    /// Sets the displacement increment of a boundary side from a (n_side_node, 2) matrix
    pub fn set_side_increment(&mut self, patch: usize, side: Side, values: &Matrix) -> Result<(), StrError> {
        self.assembler.set_side_fixed_dofs(patch, side, values)
    }

    /// Solves for the mesh increment of one time step and updates the buffers
    ///
    /// The solve is bounded by the configured number of iterations; hence, DidNotConverge is
    /// accepted. Nothing is updated if the assembly fails or if the increment would invert cells.
    pub fn advance(&mut self, dt: f64) -> Result<SolveOutcome, StrError> {
        if dt <= 0.0 {
            return Err("the time step must be > 0.0");
        }
        let fixed = self.assembler.fixed_dofs().clone();
        self.solver.reset(&fixed);
        let outcome = self.solver.solve(&mut self.assembler)?;
        if let SolveOutcome::AssemblyFailed(_) = outcome {
            return Ok(outcome);
        }
        let increment = self
            .assembler
            .construct_solution(self.solver.solution(), self.solver.fixed_dofs())?;
        if let Some(p) = self.assembler.check_solution(&increment)? {
            log::warn!("ALE increment inverts cells of patch {}", p);
            return Ok(SolveOutcome::AssemblyFailed(outcome.n_iterations()));
        }
        // velocity first, then the displacement buffer is overwritten
        for n in 0..self.displacement.nnode() {
            for c in 0..2 {
                let d_old = self.displacement.get(n, c);
                let d_new = d_old + increment.get(n, c);
                self.velocity.set(n, c, (d_new - d_old) / dt);
                self.displacement.set(n, c, d_new);
            }
        }
        self.assembler.displace_mesh(&increment)?;
        self.increment = increment;
        Ok(outcome)
    }

    /// Returns the number of free DOFs
    pub fn n_dof(&self) -> usize {
        self.assembler.n_dof()
    }

    /// Returns the accumulated mesh displacement
    pub fn displacement(&self) -> &Field {
        &self.displacement
    }

    /// Returns the mesh velocity of the last step
    pub fn velocity(&self) -> &Field {
        &self.velocity
    }

    /// Returns the mesh displacement increment of the last step
    pub fn increment(&self) -> &Field {
        &self.increment
    }

    /// Returns the current (moved) ALE mesh
    pub fn mesh(&self) -> &MultiPatch {
        self.assembler.mesh()
    }

    /// Returns the initial ALE mesh
    pub fn reference_mesh(&self) -> &MultiPatch {
        &self.reference
    }

    /// Returns the number of iterations of the last solve
    pub fn n_iterations(&self) -> usize {
        self.solver.n_iterations()
    }

    /// Returns the L2 norm of the accumulated displacement over the initial mesh
    pub fn norm(&self) -> Result<f64, StrError> {
        self.displacement.l2_norm(&self.reference)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::AleMotion;
    use crate::base::{BoundaryConditions, MaterialLaw, MultiPatch, NonlinearConfig, ParamSolid, Side};
    use crate::fem::SolveOutcome;
    use russell_lab::{approx_eq, Matrix};

    fn setup(law: MaterialLaw, n_max_iterations: usize) -> AleMotion {
        let mut mesh = MultiPatch::new();
        mesh.add_quad_patch([[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]], 4, 4)
            .unwrap();
        let mut bcs = BoundaryConditions::new();
        for side in Side::ALL {
            bcs.fix(0, side, 2);
        }
        let param = ParamSolid {
            young: 1.0,
            poisson: 0.4,
            density: 1.0,
            law,
            local_stiffening: 2.5,
        };
        let mut config = NonlinearConfig::new();
        config.set_n_max_iterations(n_max_iterations).unwrap();
        AleMotion::new(mesh, &bcs, param, &config).unwrap()
    }

    #[test]
    fn advance_captures_errors() {
        let mut ale = setup(MaterialLaw::LinearElastic, 1);
        assert_eq!(ale.advance(0.0).err(), Some("the time step must be > 0.0"));
        assert_eq!(
            ale.set_side_increment(0, Side::North, &Matrix::new(2, 2)).err(),
            Some("side values matrix has incompatible dimensions")
        );
    }

    #[test]
    fn rigid_boundary_motion_translates_the_mesh() {
        let mut ale = setup(MaterialLaw::LinearElastic, 1);
        let mut shift = Matrix::new(5, 2);
        for m in 0..5 {
            shift.set(m, 1, 0.01);
        }
        for side in Side::ALL {
            ale.set_side_increment(0, side, &shift).unwrap();
        }
        let dt = 0.5;
        let outcome = ale.advance(dt).unwrap();
        assert!(outcome.n_iterations() >= 1);
        let nnode = ale.mesh().nnode();
        for n in 0..nnode {
            approx_eq(ale.increment().get(n, 0), 0.0, 1e-12);
            approx_eq(ale.increment().get(n, 1), 0.01, 1e-12);
            approx_eq(ale.velocity().get(n, 1), 0.02, 1e-11);
            approx_eq(ale.mesh().coords[n][1], ale.reference_mesh().coords[n][1] + 0.01, 1e-12);
        }

        // the same boundary increment again: the displacement accumulates
        ale.advance(dt).unwrap();
        for n in 0..nnode {
            approx_eq(ale.displacement().get(n, 1), 0.02, 1e-12);
            approx_eq(ale.velocity().get(n, 1), 0.02, 1e-11);
        }
        approx_eq(ale.norm().unwrap(), 0.02, 1e-12);
    }

    #[test]
    fn bounded_iterations_are_accepted() {
        let mut ale = setup(MaterialLaw::NeoHookeLn, 1);
        let mut bulge = Matrix::new(5, 2);
        bulge.set(2, 1, 0.05);
        ale.set_side_increment(0, Side::North, &bulge).unwrap();
        let outcome = ale.advance(1.0).unwrap();
        assert!(match outcome {
            SolveOutcome::Converged(1) | SolveOutcome::DidNotConverge(1) => true,
            _ => false,
        });
        assert_eq!(ale.n_iterations(), 1);
        assert_eq!(ale.mesh().check_geometry(), None);

        // velocity identity: v = (d_new - d_old) / dt
        let d_old = ale.displacement().clone();
        ale.advance(0.25).unwrap();
        for n in 0..ale.mesh().nnode() {
            for c in 0..2 {
                let expected = (ale.displacement().get(n, c) - d_old.get(n, c)) / 0.25;
                approx_eq(ale.velocity().get(n, c), expected, 1e-12);
            }
        }
    }
}
