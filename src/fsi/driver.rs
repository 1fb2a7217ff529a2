use super::{AleMotion, FlappingBeamGeometry, LogFile, LogRecord};
use crate::base::{ElasticityTimeConfig, Field, FlowTimeConfig, MaterialLaw, NonlinearConfig};
use crate::base::{ParamFluid, ParamSolid, Side, TimeScheme};
use crate::fem::{ElasticityAssembler, ElasticityTimeIntegrator, FlowTimeIntegrator, SolveOutcome};
use crate::fem::{AleLink, StationaryFlowAssembler};
use crate::StrError;
use russell_lab::Matrix;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use std::time::Instant;

/// Defines the tolerance to decide whether the end of the time span has been reached
const TIME_TOLERANCE: f64 = 1e-10;

/// Holds all options of the flapping-beam FSI simulation
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FsiConfig {
    /// Young's modulus of the beam
    pub young: f64,

    /// Poisson's coefficient of the beam
    pub poisson: f64,

    /// Density of the beam
    pub solid_density: f64,

    /// Gravitational acceleration acting on the beam (along y)
    pub loading: f64,

    /// Kinematic viscosity of the fluid
    pub viscosity: f64,

    /// Mean inflow velocity
    pub mean_velocity: f64,

    /// Density of the fluid
    pub fluid_density: f64,

    /// Poisson's coefficient of the ALE pseudo-material
    pub mesh_poisson: f64,

    /// Local stiffening exponent χ of the ALE pseudo-material
    pub mesh_stiffening: f64,

    /// Number of uniform refinements of the block layout
    pub refine: usize,

    /// Time step
    pub time_step: f64,

    /// Simulated time span
    pub time_span: f64,

    /// Coefficient θ of the flow time integrator
    pub theta: f64,

    /// Uses Newton iterations for the flow instead of the linear (IMEX) scheme
    pub newton: bool,

    /// Uses the large warm-up step at the beginning
    pub warm_up: bool,

    /// Duration of the warm-up phase
    pub warm_up_time: f64,

    /// Time step of the warm-up phase
    pub warm_up_step: f64,

    /// Duration of the inflow ramp
    pub ramp_time: f64,

    /// Maximum number of iterations of the ALE solve
    pub ale_max_iterations: usize,

    /// Number of sampling points per patch for visualization (0 = no plotting)
    pub n_plot_points: usize,
}

impl FsiConfig {
    /// Allocates a new instance with the parameters of the flapping-beam benchmark
    pub fn new() -> Self {
        FsiConfig {
            young: 1.4e6,
            poisson: 0.4,
            solid_density: 1.0e3,
            loading: 2.0,
            viscosity: 0.001,
            mean_velocity: 1.0,
            fluid_density: 1.0e3,
            mesh_poisson: 0.4,
            mesh_stiffening: 2.5,
            refine: 1,
            time_step: 0.01,
            time_span: 3.0,
            theta: 0.5,
            newton: false,
            warm_up: false,
            warm_up_time: 2.0,
            warm_up_step: 0.1,
            ramp_time: 2.0,
            ale_max_iterations: 1,
            n_plot_points: 1000,
        }
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if self.young <= 0.0 {
            return Some(format!("young = {:?} is incorrect; it must be > 0.0", self.young));
        }
        if self.poisson <= -1.0 || self.poisson >= 0.5 {
            return Some(format!("poisson = {:?} is incorrect; it must be -1.0 < ν < 0.5", self.poisson));
        }
        if self.solid_density <= 0.0 {
            return Some(format!("solid_density = {:?} is incorrect; it must be > 0.0", self.solid_density));
        }
        if self.viscosity <= 0.0 {
            return Some(format!("viscosity = {:?} is incorrect; it must be > 0.0", self.viscosity));
        }
        if self.fluid_density <= 0.0 {
            return Some(format!("fluid_density = {:?} is incorrect; it must be > 0.0", self.fluid_density));
        }
        if self.mesh_poisson <= -1.0 || self.mesh_poisson >= 0.5 {
            return Some(format!(
                "mesh_poisson = {:?} is incorrect; it must be -1.0 < ν < 0.5",
                self.mesh_poisson
            ));
        }
        if self.mesh_stiffening < 0.0 {
            return Some(format!(
                "mesh_stiffening = {:?} is incorrect; it must be ≥ 0.0",
                self.mesh_stiffening
            ));
        }
        if self.time_step <= 0.0 {
            return Some(format!("time_step = {:?} is incorrect; it must be > 0.0", self.time_step));
        }
        if self.time_span <= 0.0 {
            return Some(format!("time_span = {:?} is incorrect; it must be > 0.0", self.time_span));
        }
        if self.theta < 0.0 || self.theta > 1.0 {
            return Some(format!("theta = {:?} is incorrect; it must be 0.0 ≤ θ ≤ 1.0", self.theta));
        }
        if self.warm_up && self.warm_up_step <= 0.0 {
            return Some(format!("warm_up_step = {:?} is incorrect; it must be > 0.0", self.warm_up_step));
        }
        if self.ale_max_iterations < 1 {
            return Some(format!(
                "ale_max_iterations = {} is incorrect; it must be ≥ 1",
                self.ale_max_iterations
            ));
        }
        None
    }

    /// Returns the time step at a given time (the warm-up step during the warm-up phase)
    pub fn step_size(&self, time: f64) -> f64 {
        if self.warm_up && time < self.warm_up_time {
            self.warm_up_step
        } else {
            self.time_step
        }
    }

    /// Returns the inflow ramp factor `(1 - cos(π t / T)) / 2`, clamped to 1 for t ≥ T
    pub fn ramp_factor(&self, time: f64) -> f64 {
        if self.ramp_time <= 0.0 || time >= self.ramp_time {
            1.0
        } else {
            (1.0 - f64::cos(std::f64::consts::PI * time / self.ramp_time)) / 2.0
        }
    }

    /// Reads a JSON file containing the configuration
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn read_json<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let input = File::open(path).map_err(|_| "cannot open file")?;
        let buffered = BufReader::new(input);
        let config = serde_json::from_reader(buffered).map_err(|_| "cannot parse JSON file")?;
        Ok(config)
    }

    /// Writes a JSON file with the configuration
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn write_json<P>(&self, full_path: &P) -> Result<(), StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        write_json_file(self, full_path)
    }
}

impl fmt::Display for FsiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flapping beam FSI configuration\n")?;
        write!(f, "===============================\n")?;
        write!(f, "beam: E = {:?}, ν = {:?}, ρ = {:?}, load = {:?}\n", self.young, self.poisson, self.solid_density, self.loading)?;
        write!(f, "flow: ν = {:?}, U = {:?}, ρ = {:?}\n", self.viscosity, self.mean_velocity, self.fluid_density)?;
        write!(f, "mesh: ν = {:?}, χ = {:?}\n", self.mesh_poisson, self.mesh_stiffening)?;
        write!(f, "refine = {}\n", self.refine)?;
        write!(f, "time_step = {:?}, time_span = {:?}, theta = {:?}\n", self.time_step, self.time_span, self.theta)?;
        write!(f, "newton = {}, warm_up = {}\n", self.newton, self.warm_up)?;
        Ok(())
    }
}

/// Explains why the simulation stopped
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StopReason {
    /// The time span has been covered
    Completed,

    /// The beam step failed
    BeamFailed(SolveOutcome),

    /// The ALE solve failed (assembly failure or inverted cells)
    AleFailed(SolveOutcome),

    /// The moved flow mesh has inverted cells in the given patch
    InvalidMesh(usize),

    /// The flow step failed
    FlowFailed(SolveOutcome),
}

/// Holds the result of one global time step
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepStatus {
    /// The step was accepted
    Accepted(LogRecord),

    /// The step failed and the simulation must stop
    Stopped(StopReason),
}

/// Holds a summary of the simulation, written as JSON at the end of the run
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FsiSummary {
    /// Number of accepted time steps
    pub n_steps: usize,

    /// Final simulation time
    pub sim_time: f64,

    /// True if the whole time span was covered
    pub completed: bool,

    /// Reason for stopping
    pub stop_reason: String,

    /// Number of flow DOFs
    pub n_dof_flow: usize,

    /// Number of beam DOFs
    pub n_dof_beam: usize,

    /// Number of ALE DOFs
    pub n_dof_ale: usize,

    /// Total wall time (seconds)
    pub total_time: f64,

    /// Last log record
    pub last: LogRecord,
}

impl FsiSummary {
    /// Writes a JSON file with the summary
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn write_json<P>(&self, full_path: &P) -> Result<(), StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        write_json_file(self, full_path)
    }
}

/// Runs the one-way coupled flapping-beam simulation
///
/// Each time step runs three stages in a fixed order:
///
/// 1. the beam is advanced (Newmark, neo-Hookean)
/// 2. the displacement increment of the beam drives the ALE mesh motion; the flow mesh is moved
///    and its interface velocity is set to the mesh velocity
/// 3. the flow is advanced with the ALE correction
pub struct FlappingBeamDriver {
    config: FsiConfig,
    geometry: FlappingBeamGeometry,
    flow: FlowTimeIntegrator,
    beam: ElasticityTimeIntegrator,
    ale: AleMotion,
    inflow: Vec<(usize, Matrix)>,
    force_sides: Vec<(usize, Side)>,
    sim_time: f64,
    n_steps: usize,
    ale_time: f64,
    flow_time: f64,
    beam_time: f64,
}

impl FlappingBeamDriver {
    /// Allocates a new instance
    ///
    /// Generates the meshes and the three solvers. The inflow starts from rest.
    pub fn new(config: &FsiConfig) -> Result<Self, StrError> {
        if let Some(msg) = config.validate() {
            println!("ERROR: {}", msg);
            return Err("cannot allocate FSI driver because config.validate() failed");
        }
        let geometry = FlappingBeamGeometry::new(config.refine)?;

        // flow
        let param_fluid = ParamFluid {
            density: config.fluid_density,
            viscosity: config.viscosity,
        };
        let flow_bcs = geometry.flow_conditions(config.mean_velocity)?;
        let flow_assembler = StationaryFlowAssembler::new(geometry.flow.clone(), &flow_bcs, param_fluid, [0.0, 0.0])?;
        let link = AleLink::new(geometry.correspondence.clone(), flow_assembler.mesh(), &geometry.ale)?;
        let mut flow_config = FlowTimeConfig::new();
        flow_config.set_theta(config.theta)?.set_scheme(if config.newton {
            TimeScheme::ImplicitNonlinear
        } else {
            TimeScheme::ImplicitLinear
        })?;
        let mut flow = FlowTimeIntegrator::new(flow_assembler, &flow_config, Some(link))?;

        // save the inflow profile and start from rest
        let mut inflow = Vec::new();
        for bj in 0..5 {
            let p = geometry.flow_patch(0, bj)?;
            inflow.push((p, flow.side_fixed_dofs(p, Side::West)?));
        }
        let mut fixed = flow.fixed_dofs().clone();
        fixed.homogenize();
        flow.set_fixed_dofs(&fixed)?;
        if !flow.initialize()? {
            return Err("cannot initialize the flow because the geometry is invalid");
        }

        // beam
        let param_beam = ParamSolid {
            young: config.young,
            poisson: config.poisson,
            density: config.solid_density,
            law: MaterialLaw::NeoHookeLn,
            local_stiffening: 0.0,
        };
        let body_force = [0.0, config.loading * config.solid_density];
        let beam_assembler = ElasticityAssembler::new(geometry.beam.clone(), &geometry.beam_conditions(), param_beam, body_force)?;
        let mut beam_config = ElasticityTimeConfig::new();
        beam_config.set_scheme(TimeScheme::ImplicitNonlinear)?;
        let mut beam = ElasticityTimeIntegrator::new(beam_assembler, &beam_config)?;
        if !beam.initialize()? {
            return Err("cannot initialize the beam because the geometry is invalid");
        }

        // ALE
        let param_mesh = ParamSolid {
            young: 1.0,
            poisson: config.mesh_poisson,
            density: 1.0,
            law: MaterialLaw::NeoHookeLn,
            local_stiffening: config.mesh_stiffening,
        };
        let mut ale_config = NonlinearConfig::new();
        ale_config.set_n_max_iterations(config.ale_max_iterations)?;
        let ale = AleMotion::new(geometry.ale.clone(), &geometry.ale_conditions(), param_mesh, &ale_config)?;

        let force_sides = geometry.force_sides()?;
        log::info!(
            "flapping beam: {} flow DOFs, {} beam DOFs, {} ALE DOFs",
            flow.solution().dim(),
            beam.displacement().dim(),
            ale.n_dof()
        );
        Ok(FlappingBeamDriver {
            config: config.clone(),
            geometry,
            flow,
            beam,
            ale,
            inflow,
            force_sides,
            sim_time: 0.0,
            n_steps: 0,
            ale_time: 0.0,
            flow_time: 0.0,
            beam_time: 0.0,
        })
    }

    /// Advances the coupled problem by one time step
    pub fn step(&mut self) -> Result<StepStatus, StrError> {
        let dt = self.config.step_size(self.sim_time);

        // smooth start of the inflow
        let factor = self.config.ramp_factor(self.sim_time + dt);
        for (p, values) in &self.inflow {
            let (nrow, ncol) = values.dims();
            let mut scaled = Matrix::new(nrow, ncol);
            for i in 0..nrow {
                for j in 0..ncol {
                    scaled.set(i, j, factor * values.get(i, j));
                }
            }
            self.flow.set_side_fixed_dofs(*p, Side::West, &scaled)?;
        }

        // beam
        let clock = Instant::now();
        let old_displacement = self.beam.displacement_field()?;
        let outcome = self.beam.make_time_step(dt)?;
        self.beam_time += clock.elapsed().as_secs_f64();
        if !outcome.converged() {
            return Ok(StepStatus::Stopped(StopReason::BeamFailed(outcome)));
        }
        let new_displacement = self.beam.displacement_field()?;
        let increment = difference(&new_displacement, &old_displacement);

        // ALE
        let clock = Instant::now();
        let beam_mesh = self.beam.assembler().mesh();
        for (beam_side, (a, ale_side)) in self.geometry.ale_interfaces()? {
            let values = increment.side_values(beam_mesh, 0, beam_side)?;
            self.ale.set_side_increment(a, ale_side, &values)?;
        }
        let outcome = self.ale.advance(dt)?;
        if let SolveOutcome::AssemblyFailed(_) = outcome {
            self.ale_time += clock.elapsed().as_secs_f64();
            return Ok(StepStatus::Stopped(StopReason::AleFailed(outcome)));
        }
        self.flow.move_mesh(self.ale.increment())?;
        if let Some(p) = self.flow.assembler().check_geometry() {
            self.ale_time += clock.elapsed().as_secs_f64();
            return Ok(StepStatus::Stopped(StopReason::InvalidMesh(p)));
        }
        self.flow.set_ale_velocity(self.ale.velocity())?;
        self.ale_time += clock.elapsed().as_secs_f64();

        // flow
        let clock = Instant::now();
        let ale_interfaces = self.geometry.ale_interfaces()?;
        for (k, (_, (f, flow_side))) in self.geometry.interfaces()?.into_iter().enumerate() {
            let (_, (a, ale_side)) = ale_interfaces[k];
            let values = self.ale.velocity().side_values(self.ale.mesh(), a, ale_side)?;
            self.flow.set_side_fixed_dofs(f, flow_side, &values)?;
        }
        let outcome = self.flow.make_time_step(dt, true)?;
        self.flow_time += clock.elapsed().as_secs_f64();
        if !outcome.converged() {
            return Ok(StepStatus::Stopped(StopReason::FlowFailed(outcome)));
        }

        self.sim_time += dt;
        self.n_steps += 1;
        Ok(StepStatus::Accepted(self.record()?))
    }

    /// Runs the simulation until the end of the time span or until a step fails
    ///
    /// Writes the initial state and every accepted step to the log.
    pub fn run(&mut self, log: &mut LogFile) -> Result<FsiSummary, StrError> {
        let clock = Instant::now();
        log.write(&self.record()?)?;
        let mut reason = StopReason::Completed;
        while self.config.time_span - self.sim_time > TIME_TOLERANCE {
            match self.step()? {
                StepStatus::Accepted(record) => {
                    log.write(&record)?;
                    log::debug!("t = {:.4}, drag = {:.6}, lift = {:.6}", record.sim_time, record.drag, record.lift);
                }
                StepStatus::Stopped(why) => {
                    log::warn!("simulation stopped at t = {}: {:?}", self.sim_time, why);
                    reason = why;
                    break;
                }
            }
        }
        let total_time = clock.elapsed().as_secs_f64();
        log::info!(
            "complete in {:.3} s; ALE time: {:.3} s, flow time: {:.3} s, beam time: {:.3} s",
            total_time,
            self.ale_time,
            self.flow_time,
            self.beam_time
        );
        Ok(FsiSummary {
            n_steps: self.n_steps,
            sim_time: self.sim_time,
            completed: reason == StopReason::Completed,
            stop_reason: format!("{:?}", reason),
            n_dof_flow: self.flow.solution().dim(),
            n_dof_beam: self.beam.displacement().dim(),
            n_dof_ale: self.ale.n_dof(),
            total_time,
            last: match log.records().last() {
                Some(record) => *record,
                None => LogRecord::default(),
            },
        })
    }

    /// Computes the quantities of interest at the current state
    pub fn record(&self) -> Result<LogRecord, StrError> {
        let (velocity, pressure) = self.flow.construct_solution()?;
        let assembler = self.flow.assembler();
        let force = assembler.compute_force(&velocity, &pressure, &self.force_sides, false)?;
        let [front, back] = self.geometry.pressure_probes()?;
        let p_front = pressure.eval(assembler.pressure_mesh(), front.0, front.1, front.2)?;
        let p_back = pressure.eval(assembler.pressure_mesh(), back.0, back.1, back.2)?;
        let displacement = self.beam.displacement_field()?;
        let disp_a = displacement.eval(self.beam.assembler().mesh(), 0, 1.0, 0.5)?;
        Ok(LogRecord {
            sim_time: self.sim_time,
            drag: force.total[0],
            lift: force.total[1],
            pressure_diff: p_front[0] - p_back[0],
            disp_a: [disp_a[0], disp_a[1]],
            ale_norm: self.ale.norm()?,
            ale_time: self.ale_time,
            flow_time: self.flow_time,
            beam_time: self.beam_time,
            flow_iter: self.flow.n_iterations(),
            beam_iter: self.beam.n_iterations(),
        })
    }

    /// Returns the current simulation time
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Returns the number of accepted steps
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Returns the configuration
    pub fn config(&self) -> &FsiConfig {
        &self.config
    }

    /// Returns the geometry
    pub fn geometry(&self) -> &FlappingBeamGeometry {
        &self.geometry
    }

    /// Returns the flow time integrator
    pub fn flow(&self) -> &FlowTimeIntegrator {
        &self.flow
    }

    /// Returns the beam time integrator
    pub fn beam(&self) -> &ElasticityTimeIntegrator {
        &self.beam
    }

    /// Returns the ALE mesh motion
    pub fn ale(&self) -> &AleMotion {
        &self.ale
    }
}

/// Returns a - b
fn difference(a: &Field, b: &Field) -> Field {
    let mut res = Field::new(a.nnode(), a.ncomp());
    for n in 0..a.nnode() {
        for c in 0..a.ncomp() {
            res.set(n, c, a.get(n, c) - b.get(n, c));
        }
    }
    res
}

fn write_json_file<T, P>(data: &T, full_path: &P) -> Result<(), StrError>
where
    T: Serialize,
    P: AsRef<OsStr> + ?Sized,
{
    let path = Path::new(full_path).to_path_buf();
    if let Some(p) = path.parent() {
        fs::create_dir_all(p).map_err(|_| "cannot create directory")?;
    }
    let mut file = File::create(&path).map_err(|_| "cannot create file")?;
    serde_json::to_writer_pretty(&mut file, data).map_err(|_| "cannot write file")?;
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
