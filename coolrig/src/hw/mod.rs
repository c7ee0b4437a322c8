//! Actuator binding layer.
//!
//! The simulation core decides; this layer turns those decisions into
//! hardware calls. Nothing in [`crate::sim`] or [`crate::thermal`] depends
//! on it, so the core runs and tests without any hardware present.

mod controller;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use controller::{RigController, RigStatus};

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("{actuator} is not responding: {reason}")]
    Unresponsive {
        actuator: &'static str,
        reason: String,
    },

    #[error("I/O error driving {actuator}: {source}")]
    Io {
        actuator: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Outputs of a physical rig: PWM fan, CO₂ solenoid valve and Peltier
/// relay.
#[async_trait]
pub trait CoolingActuators: Send {
    /// Set fan PWM duty, 0-100 %.
    async fn set_fan_duty(&mut self, percent: u8) -> Result<(), ActuatorError>;

    /// Open the CO₂ valve for `duration`, then close it.
    async fn pulse_valve(&mut self, duration: Duration) -> Result<(), ActuatorError>;

    async fn set_peltier(&mut self, on: bool) -> Result<(), ActuatorError>;
}
