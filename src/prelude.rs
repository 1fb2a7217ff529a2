//! Makes available common structures needed to run a simulation
//!
//! You may write `use fsisim::prelude::*` in your code and obtain
//! access to commonly used functionality.

pub use crate::base::{BoundaryConditions, Field, FixedDofs, MultiPatch, PatchCorrespondence, Side};
pub use crate::base::{ElasticityTimeConfig, FlowTimeConfig, NonlinearConfig};
pub use crate::base::{FlowAssembly, IterationType, MaterialLaw, ParamFluid, ParamSolid, TimeScheme};
pub use crate::fem::{AleLink, ElasticityAssembler, ElasticityTimeIntegrator, FlowTimeIntegrator};
pub use crate::fem::{NonlinearSolver, NonlinearSystem, SolveOutcome, StationaryFlowAssembler};
pub use crate::fsi::{FlappingBeamDriver, FsiConfig, LogFile};
