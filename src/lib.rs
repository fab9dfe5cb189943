//! Heap abstraction for dependence-graph construction: bounded
//! mod/ref interfaces per procedure and per-context aliasing of
//! access paths.

pub mod accesspath;
pub mod candidates;
pub mod entity;
mod errors;
pub mod monitor;
pub mod params;
pub mod passes;
pub mod program;
pub mod propagate;
pub mod tvl;

pub use errors::*;
pub use monitor::{CancelFlag, Fuel, NullMonitor, ProgressMonitor};
pub use params::{compute, InterfaceSink, Interfaces, Options, ProcReport, Stats};
pub use tvl::Tvl;
