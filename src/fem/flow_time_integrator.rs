use super::{BlockBuilder, FlowBlocks, LinearSystem, MassAssembler, NonlinearSolver, NonlinearSystem};
use super::{SolveOutcome, SparseBlock, StationaryFlowAssembler};
use crate::base::{Field, FixedDofs, FlowAssembly, FlowTimeConfig, MultiPatch, PatchCorrespondence, Side, TimeScheme};
use crate::StrError;
use russell_lab::{Matrix, Vector};

/// Links the flow mesh to the ALE mesh through corresponding patches
///
/// Both meshes must have the same resolution on corresponding patches.
#[derive(Clone, Debug)]
pub struct AleLink {
    correspondence: PatchCorrespondence,
    node_pairs: Vec<(usize, usize)>,
    n_ale_node: usize,
}

impl AleLink {
    /// Allocates a new instance
    ///
    /// `flow_mesh` is the velocity mesh of the flow assembler.
    pub fn new(correspondence: PatchCorrespondence, flow_mesh: &MultiPatch, ale_mesh: &MultiPatch) -> Result<Self, StrError> {
        let node_pairs = correspondence.node_pairs(flow_mesh, ale_mesh)?;
        Ok(AleLink {
            correspondence,
            node_pairs,
            n_ale_node: ale_mesh.nnode(),
        })
    }

    /// Returns the patch correspondence
    pub fn correspondence(&self) -> &PatchCorrespondence {
        &self.correspondence
    }

    /// Returns the (flow node, ALE node) pairs
    pub fn node_pairs(&self) -> &[(usize, usize)] {
        &self.node_pairs
    }

    /// Transfers a vector field from the ALE mesh to the flow mesh
    ///
    /// Flow nodes outside the ALE region receive zero.
    pub fn transfer(&self, ale_field: &Field, n_flow_node: usize) -> Result<Field, StrError> {
        if ale_field.nnode() != self.n_ale_node || ale_field.ncomp() != 2 {
            return Err("the field is incompatible with the ALE mesh");
        }
        let mut flow_field = Field::new(n_flow_node, 2);
        for (f, a) in &self.node_pairs {
            if *f >= n_flow_node {
                return Err("the ALE link is incompatible with the flow mesh");
            }
            flow_field.set(*f, 0, ale_field.get(*a, 0));
            flow_field.set(*f, 1, ale_field.get(*a, 1));
        }
        Ok(flow_field)
    }
}

/// Computes the explicit part of the θ-scheme
///
/// ```text
/// velocity rows: dt (1 - θ) (rhs_v,old - A_old u_old) + M u_old - m_old
/// pressure rows: dt (1 - θ) rhs_p,old
/// ```
///
/// where `m_old = -E u_D,old` is the mass contribution of the old fixed DOFs.
/// The result has the length of the full solution vector.
pub fn theta_explicit_part(
    mass: &SparseBlock,
    old: &FlowBlocks,
    old_velocity: &Vector,
    old_mass_rhs: &Vector,
    theta: f64,
    dt: f64,
) -> Result<Vector, StrError> {
    let nv = old.rhs_v.dim();
    let np = old.rhs_p.dim();
    if old_velocity.dim() != nv || old_mass_rhs.dim() != nv {
        return Err("vectors are incompatible with the flow blocks");
    }
    let w = dt * (1.0 - theta);
    let mut explicit_v = Vector::new(nv);
    for i in 0..nv {
        explicit_v[i] = w * old.rhs_v[i] - old_mass_rhs[i];
    }
    old.a_vv.mat_vec_add(&mut explicit_v, -w, old_velocity)?;
    mass.mat_vec_add(&mut explicit_v, 1.0, old_velocity)?;
    let mut explicit = Vector::new(nv + np);
    for i in 0..nv {
        explicit[i] = explicit_v[i];
    }
    for i in 0..np {
        explicit[nv + i] = w * old.rhs_p[i];
    }
    Ok(explicit)
}

/// Composes the θ-scheme system
///
/// ```text
/// ┌                        ┐ ┌   ┐   ┌                                    ┐
/// │ M + θ dt A    dt B_vp  │ │ u │   │ explicit_v + θ dt rhs_v + m_new    │
/// │ dt B_pv       0        │ │ p │ = │ explicit_p + θ dt rhs_p            │
/// └                        ┘ └   ┘   └                                    ┘
/// ```
fn theta_system(
    mass: &SparseBlock,
    blocks: &FlowBlocks,
    explicit: &Vector,
    mass_rhs: &Vector,
    theta: f64,
    dt: f64,
) -> Result<LinearSystem, StrError> {
    let nv = blocks.rhs_v.dim();
    let np = blocks.rhs_p.dim();
    if explicit.dim() != nv + np || mass_rhs.dim() != nv {
        return Err("vectors are incompatible with the flow blocks");
    }
    let mut rhs = Vector::new(nv + np);
    for i in 0..nv {
        rhs[i] = explicit[i] + theta * dt * blocks.rhs_v[i] + mass_rhs[i];
    }
    for i in 0..np {
        rhs[nv + i] = explicit[nv + i] + theta * dt * blocks.rhs_p[i];
    }
    let mut builder = BlockBuilder::new(nv + np);
    builder
        .add(0, 0, 1.0, mass)?
        .add(0, 0, theta * dt, &blocks.a_vv)?
        .add(0, nv, dt, &blocks.b_vp)?
        .add(nv, 0, dt, &blocks.b_pv)?;
    builder.build_system(rhs)
}

/// Holds the data of one implicit-nonlinear time step (Newton iterations)
struct ThetaStep<'a> {
    assembler: &'a mut StationaryFlowAssembler,
    mass: &'a SparseBlock,
    mesh_velocity: Option<&'a Field>,
    explicit: Vector,
    mass_rhs: Vector,
    theta: f64,
    dt: f64,
    system: Option<LinearSystem>,
}

impl<'a> NonlinearSystem for ThetaStep<'a> {
    fn n_dof(&self) -> usize {
        self.assembler.n_dof()
    }

    fn fixed_dofs(&self) -> &FixedDofs {
        self.assembler.fixed_dofs()
    }

    fn assemble(&mut self, trial: &Vector, fixed: &FixedDofs) -> Result<bool, StrError> {
        let (velocity, _) = self.assembler.construct_solution(trial, fixed)?;
        if !self
            .assembler
            .assemble_linearized(&velocity, self.mesh_velocity, FlowAssembly::Newton)?
        {
            return Ok(false);
        }
        let system = theta_system(
            self.mass,
            self.assembler.blocks(),
            &self.explicit,
            &self.mass_rhs,
            self.theta,
            self.dt,
        )?;
        self.system = Some(system);
        Ok(true)
    }

    fn linear_system(&self) -> Result<LinearSystem, StrError> {
        match &self.system {
            Some(system) => Ok(system.clone()),
            None => Err("the time step system has not been assembled"),
        }
    }
}

/// Holds the saved state of the flow time integrator
#[derive(Clone, Debug)]
struct FlowSnapshot {
    solution: Vector,
    old_solution: Vector,
    old_blocks: FlowBlocks,
    old_mass_rhs: Vector,
    old_dt: f64,
    fixed: FixedDofs,
    initialized: bool,
}

/// Integrates the incompressible Navier-Stokes equations in time with the θ-scheme
///
/// The solution vector is `[velocity free DOFs | pressure free DOFs]`. The velocity is
/// blended between the old and the new time levels while the pressure is fully implicit.
pub struct FlowTimeIntegrator {
    assembler: StationaryFlowAssembler,
    mass: MassAssembler,
    config: FlowTimeConfig,
    ale: Option<AleLink>,
    mesh_velocity: Option<Field>,
    solution: Vector,
    old_solution: Vector,
    old_blocks: FlowBlocks,
    old_mass_rhs: Vector,
    old_dt: f64,
    n_iterations: usize,
    initialized: bool,
    saved: Option<FlowSnapshot>,
}

impl FlowTimeIntegrator {
    /// Allocates a new instance
    ///
    /// The solution is initialized with zero free values.
    pub fn new(assembler: StationaryFlowAssembler, config: &FlowTimeConfig, ale: Option<AleLink>) -> Result<Self, StrError> {
        if let Some(msg) = config.validate() {
            println!("ERROR: {}", msg);
            return Err("cannot allocate flow time integrator because config.validate() failed");
        }
        let mass = MassAssembler::new(
            assembler.velocity_mapper().clone(),
            assembler.param().density,
            assembler.fixed_dofs(),
        )?;
        let n = assembler.n_dof();
        let nv = assembler.n_dof_velocity();
        let np = assembler.n_dof_pressure();
        Ok(FlowTimeIntegrator {
            assembler,
            mass,
            config: *config,
            ale,
            mesh_velocity: None,
            solution: Vector::new(n),
            old_solution: Vector::new(n),
            old_blocks: FlowBlocks::new(nv, np),
            old_mass_rhs: Vector::new(nv),
            old_dt: 1.0,
            n_iterations: 0,
            initialized: false,
            saved: None,
        })
    }

    /// Replaces the current solution vector
    pub fn set_solution_vector(&mut self, solution: Vector) {
        self.solution = solution;
    }

    /// Replaces the fixed DOFs (e.g., new inflow or interface velocities)
    pub fn set_fixed_dofs(&mut self, fixed: &FixedDofs) -> Result<(), StrError> {
        self.assembler.set_fixed_dofs(fixed)?;
        self.mass.set_fixed_dofs(fixed)
    }

    /// Returns the fixed velocities on a patch side as a (n_side_node, 2) matrix
    pub fn side_fixed_dofs(&self, patch: usize, side: Side) -> Result<Matrix, StrError> {
        self.assembler.side_fixed_dofs(patch, side)
    }

    /// Sets the fixed velocities on a patch side from a (n_side_node, 2) matrix
    pub fn set_side_fixed_dofs(&mut self, patch: usize, side: Side, values: &Matrix) -> Result<(), StrError> {
        self.assembler.set_side_fixed_dofs(patch, side, values)?;
        self.mass.set_fixed_dofs(self.assembler.fixed_dofs())
    }

    /// Initializes the history: assembles the operator at the current state and the mass matrix
    ///
    /// Returns false if the assembly failed.
    pub fn initialize(&mut self) -> Result<bool, StrError> {
        if self.solution.dim() != self.assembler.n_dof() {
            return Err("the solution vector must be sized to the number of flow DOFs before initialization");
        }
        let fixed = self.assembler.fixed_dofs().clone();
        let (velocity, _) = self.assembler.construct_solution(&self.solution, &fixed)?;
        if !self.assembler.assemble_linearized(&velocity, None, FlowAssembly::Oseen)? {
            return Ok(false);
        }
        if !self.mass.assembled() {
            if !self.mass.assemble(self.assembler.mesh())? {
                return Ok(false);
            }
        }
        self.mass.set_fixed_dofs(&fixed)?;
        self.mass.eliminate_fixed_dofs()?;
        self.old_mass_rhs = self.mass.rhs().clone();
        self.old_blocks = self.assembler.blocks().clone();
        self.old_solution = self.solution.clone();
        self.old_dt = 1.0;
        self.initialized = true;
        log::debug!("flow time integrator initialized with {} DOFs", self.solution.dim());
        Ok(true)
    }

    /// Advances the flow by one time step
    ///
    /// With `use_ale`, the convective velocity is corrected by the mesh velocity set by
    /// `set_ale_velocity`, which must have been called before. The state is committed only if
    /// the outcome is Converged.
    pub fn make_time_step(&mut self, dt: f64, use_ale: bool) -> Result<SolveOutcome, StrError> {
        if dt <= 0.0 {
            return Err("the time step must be > 0.0");
        }
        if use_ale && self.ale.is_none() {
            return Err("the ALE correction requires an ALE link");
        }
        if use_ale && self.mesh_velocity.is_none() {
            return Err("the ALE correction requires the mesh velocity from set_ale_velocity");
        }
        if !self.initialized {
            if !self.initialize()? {
                return Ok(SolveOutcome::AssemblyFailed(0));
            }
        }
        let theta = self.config.theta;
        let nv = self.assembler.n_dof_velocity();
        let n = self.assembler.n_dof();
        let fixed = self.assembler.fixed_dofs().clone();

        // mass contribution of the new fixed DOFs
        self.mass.set_fixed_dofs(&fixed)?;
        self.mass.eliminate_fixed_dofs()?;
        let mass_rhs = self.mass.rhs().clone();
        let mm = self.mass.matrix()?;

        // explicit part from the old time level
        let mut old_velocity = Vector::new(nv);
        for i in 0..nv {
            old_velocity[i] = self.solution[i];
        }
        let explicit = theta_explicit_part(mm, &self.old_blocks, &old_velocity, &self.old_mass_rhs, theta, dt)?;

        let mesh_velocity = if use_ale { self.mesh_velocity.as_ref() } else { None };
        let (outcome, new_solution) = match self.config.scheme {
            TimeScheme::ImplicitLinear => {
                // Oseen linearization about the extrapolated state
                let ratio = dt / self.old_dt;
                let mut extrapolated = Vector::new(n);
                for i in 0..n {
                    extrapolated[i] = self.solution[i] + ratio * (self.solution[i] - self.old_solution[i]);
                }
                let (velocity, _) = self.assembler.construct_solution(&extrapolated, &fixed)?;
                if !self
                    .assembler
                    .assemble_linearized(&velocity, mesh_velocity, FlowAssembly::Oseen)?
                {
                    return Ok(SolveOutcome::AssemblyFailed(1));
                }
                let system = theta_system(mm, self.assembler.blocks(), &explicit, &mass_rhs, theta, dt)?;
                let x = system.solve(self.config.nonlinear.lin_sol_genie, false)?;
                (SolveOutcome::Converged(1), x)
            }
            TimeScheme::ImplicitNonlinear => {
                let mut solver = NonlinearSolver::new(&self.config.nonlinear, self.solution.clone(), fixed)?;
                let mut step = ThetaStep {
                    assembler: &mut self.assembler,
                    mass: mm,
                    mesh_velocity,
                    explicit,
                    mass_rhs: mass_rhs.clone(),
                    theta,
                    dt,
                    system: None,
                };
                let outcome = solver.solve(&mut step)?;
                (outcome, solver.solution().clone())
            }
        };
        self.n_iterations = outcome.n_iterations();
        if !outcome.converged() {
            log::warn!("flow time step not committed: {:?}", outcome);
            return Ok(outcome);
        }
        self.old_solution = std::mem::replace(&mut self.solution, new_solution);
        self.old_dt = dt;
        self.old_blocks = self.assembler.blocks().clone();
        self.old_mass_rhs = mass_rhs;
        Ok(outcome)
    }

    /// Sets the mesh velocity from a velocity field on the ALE mesh
    pub fn set_ale_velocity(&mut self, ale_velocity: &Field) -> Result<(), StrError> {
        let link = match &self.ale {
            Some(link) => link,
            None => return Err("the ALE correction requires an ALE link"),
        };
        self.mesh_velocity = Some(link.transfer(ale_velocity, self.assembler.mesh().nnode())?);
        Ok(())
    }

    /// Moves the flow geometry by a displacement increment given on the ALE mesh
    pub fn move_mesh(&mut self, ale_increment: &Field) -> Result<(), StrError> {
        let link = match &self.ale {
            Some(link) => link,
            None => return Err("the mesh motion requires an ALE link"),
        };
        let increment = link.transfer(ale_increment, self.assembler.mesh().nnode())?;
        self.assembler.displace_mesh(&increment.as_vectors()?)
    }

    /// Decodes the current solution into velocity and pressure fields
    pub fn construct_solution(&self) -> Result<(Field, Field), StrError> {
        self.assembler
            .construct_solution(&self.solution, self.assembler.fixed_dofs())
    }

    /// Saves the full internal state (single slot)
    pub fn save_state(&mut self) {
        self.saved = Some(FlowSnapshot {
            solution: self.solution.clone(),
            old_solution: self.old_solution.clone(),
            old_blocks: self.old_blocks.clone(),
            old_mass_rhs: self.old_mass_rhs.clone(),
            old_dt: self.old_dt,
            fixed: self.assembler.fixed_dofs().clone(),
            initialized: self.initialized,
        });
    }

    /// Recovers the state saved by save_state; the saved state is kept
    pub fn recover_state(&mut self) -> Result<(), StrError> {
        let snapshot = match &self.saved {
            Some(snapshot) => snapshot.clone(),
            None => return Err("cannot recover the flow state because it has not been saved"),
        };
        self.assembler.set_fixed_dofs(&snapshot.fixed)?;
        self.mass.set_fixed_dofs(&snapshot.fixed)?;
        self.solution = snapshot.solution;
        self.old_solution = snapshot.old_solution;
        self.old_blocks = snapshot.old_blocks;
        self.old_mass_rhs = snapshot.old_mass_rhs;
        self.old_dt = snapshot.old_dt;
        self.initialized = snapshot.initialized;
        Ok(())
    }

    /// Returns the current solution
    pub fn solution(&self) -> &Vector {
        &self.solution
    }

    /// Returns the solution of the previous time level
    pub fn old_solution(&self) -> &Vector {
        &self.old_solution
    }

    /// Returns the current fixed DOFs
    pub fn fixed_dofs(&self) -> &FixedDofs {
        self.assembler.fixed_dofs()
    }

    /// Returns the operator blocks of the last committed time level
    pub fn stiffness_blocks(&self) -> &FlowBlocks {
        &self.old_blocks
    }

    /// Returns the mass contribution of the fixed DOFs of the last committed time level
    pub fn mass_rhs(&self) -> &Vector {
        &self.old_mass_rhs
    }

    /// Returns the mass matrix
    pub fn mass_matrix(&self) -> Result<&SparseBlock, StrError> {
        self.mass.matrix()
    }

    /// Returns the size of the last committed time step (1.0 after initialization)
    pub fn old_time_step(&self) -> f64 {
        self.old_dt
    }

    /// Returns the number of iterations of the last time step
    pub fn n_iterations(&self) -> usize {
        self.n_iterations
    }

    /// Returns the mesh velocity on the flow mesh, if set
    pub fn mesh_velocity(&self) -> Option<&Field> {
        self.mesh_velocity.as_ref()
    }

    /// Returns true if the history has been initialized
    pub fn initialized(&self) -> bool {
        self.initialized
    }

    /// Returns the flow assembler
    pub fn assembler(&self) -> &StationaryFlowAssembler {
        &self.assembler
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
