//! Simulation engine, workloads, presets and run reporting.

mod engine;
mod events;
mod preset;
mod summary;
mod workload;

pub use engine::{Simulation, StepResult};
pub use events::{EventKind, EventLog, SimEvent};
pub use preset::Preset;
pub use summary::{CoolingLedger, LedgerShares, Summary, Termination};
pub use workload::{ConstantLoad, CyclicLoad, PeakWindow, Workload, WorkloadSpec};
