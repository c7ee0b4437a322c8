//! Cooling mechanisms and the state they act on.
//!
//! Each controller is a plain struct driven one step at a time by
//! [`crate::sim::Simulation`]; none of them reads a clock or does I/O.

mod co2;
mod fan;
mod filter;
mod peltier;
mod pressure;
mod resources;
mod state;

pub use co2::{Co2Subsystem, PurgeOutcome, PurgeReason, SupplyOutcome};
pub use fan::{FanController, FanMode};
pub use filter::TemperatureFilter;
pub use peltier::{PeltierController, PeltierOutput};
pub use pressure::{PressureModel, Vent};
pub use resources::ResourceStore;
pub use state::{BandLimits, ThermalBand, ThermalState};
