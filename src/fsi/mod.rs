//! Implements the one-way fluid-structure interaction driver of the flapping-beam benchmark

mod ale;
mod benchmark;
mod driver;
mod log_file;
pub use crate::fsi::ale::*;
pub use crate::fsi::benchmark::*;
pub use crate::fsi::driver::*;
pub use crate::fsi::log_file::*;
