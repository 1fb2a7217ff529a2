//! Implements the assemblers, the nonlinear solver and the time integrators

mod elasticity_assembler;
mod elasticity_time_integrator;
mod flow_assembler;
mod flow_time_integrator;
mod linear_system;
mod mass_assembler;
mod nonlinear_solver;
mod sparse_block;
pub use crate::fem::elasticity_assembler::*;
pub use crate::fem::elasticity_time_integrator::*;
pub use crate::fem::flow_assembler::*;
pub use crate::fem::flow_time_integrator::*;
pub use crate::fem::linear_system::*;
pub use crate::fem::mass_assembler::*;
pub use crate::fem::nonlinear_solver::*;
pub use crate::fem::sparse_block::*;
