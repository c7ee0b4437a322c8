//! Discrete-time thermal simulator for a hybrid CO₂ / Peltier / fan
//! cooling rig, plus the controller that drives real actuators from the
//! same decision core.

pub mod config;
pub mod error;
pub mod hw;
pub mod sim;
pub mod thermal;
pub mod tracing;

pub use config::SimulationConfig;
pub use error::{ConfigError, Error, Result};
pub use sim::{Preset, Simulation, Summary, Termination};
