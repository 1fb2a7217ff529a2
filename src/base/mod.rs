//! Implements the base structures: geometry, DOF bookkeeping, fields, parameters and configuration

mod boundary_conditions;
mod config;
mod dof_mapper;
mod enums;
mod field;
mod multi_patch;
mod parameters;
mod patch_map;
mod quadrature;
pub use crate::base::boundary_conditions::*;
pub use crate::base::config::*;
pub use crate::base::dof_mapper::*;
pub use crate::base::enums::*;
pub use crate::base::field::*;
pub use crate::base::multi_patch::*;
pub use crate::base::parameters::*;
pub use crate::base::patch_map::*;
pub use crate::base::quadrature::*;
