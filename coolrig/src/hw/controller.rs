use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::{ActuatorError, CoolingActuators};
use crate::sim::{Simulation, StepResult};
use crate::thermal::{FanMode, TemperatureFilter};
use crate::tracing::prelude::*;

/// Latest decision published by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RigStatus {
    pub temperature_c: f32,
    pub fan_duty: u8,
    pub fan_mode: FanMode,
    pub peltier_on: bool,
    pub purge_count: u32,
    pub battery_fraction: f64,
    pub co2_remaining_j: f64,
}

/// Drives a physical rig from the simulation's decision core.
///
/// Every tick it takes the newest sensor reading, filters it, runs one
/// policy pass with [`Simulation::step_measured`], and forwards the
/// resulting decisions to the actuators. Fan and Peltier commands are only
/// sent when they change.
pub struct RigController<A> {
    simulation: Simulation,
    actuators: A,
    filter: TemperatureFilter,
    tick_duration: Duration,
    purge_valve_open: Duration,
    temperature_rx: watch::Receiver<Option<f32>>,
    status_tx: watch::Sender<RigStatus>,
    last_fan_duty: Option<u8>,
    last_peltier: Option<bool>,
}

impl<A: CoolingActuators> RigController<A> {
    pub fn new(
        simulation: Simulation,
        actuators: A,
        temperature_rx: watch::Receiver<Option<f32>>,
        status_tx: watch::Sender<RigStatus>,
    ) -> Self {
        let config = simulation.config();
        let filter = TemperatureFilter::from_config(&config.hardware);
        let tick_duration = Duration::from_secs(config.time_step_s);
        let purge_valve_open = Duration::try_from_secs_f64(config.hardware.purge_valve_open_s)
            .unwrap_or(Duration::ZERO);

        Self {
            simulation,
            actuators,
            filter,
            tick_duration,
            purge_valve_open,
            temperature_rx,
            status_tx,
            last_fan_duty: None,
            last_peltier: None,
        }
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Tick until cancelled or until the run ends on its own (battery
    /// depleted, or CO₂ exhausted with a halting supply), then put the rig
    /// in a safe state.
    pub async fn run(mut self, cancellation: CancellationToken) -> A {
        let mut interval = tokio::time::interval(self.tick_duration);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "Failed to drive cooling actuators");
                    }
                    if let Some(termination) = self.simulation.termination() {
                        info!(%termination, "Rig run ended");
                        break;
                    }
                }
            }
        }

        self.shutdown().await;
        self.actuators
    }

    async fn tick(&mut self) -> Result<(), ActuatorError> {
        let reading = match *self.temperature_rx.borrow() {
            Some(temp) => temp,
            None => {
                debug!("Rig controller tick: no temperature reading available yet");
                return Ok(());
            }
        };

        let Some(temperature) = self.filter.consider(reading) else {
            debug!(temp_c = %reading, "Rig controller tick: reading rejected as noise");
            return Ok(());
        };

        let result = self.simulation.step_measured(f64::from(temperature));
        self.apply(&result).await?;
        self.publish(temperature, &result);
        Ok(())
    }

    async fn apply(&mut self, result: &StepResult) -> Result<(), ActuatorError> {
        let duty = result.fan_duty.round().clamp(0.0, 100.0) as u8;
        if self.last_fan_duty != Some(duty) {
            self.actuators.set_fan_duty(duty).await?;
            self.last_fan_duty = Some(duty);
        }

        if self.last_peltier != Some(result.peltier_active) {
            info!(on = result.peltier_active, "Peltier switched");
            self.actuators.set_peltier(result.peltier_active).await?;
            self.last_peltier = Some(result.peltier_active);
        }

        let valve_open = if result.purged {
            Some(self.purge_valve_open)
        } else {
            result
                .burst_s
                .and_then(|burst_s| Duration::try_from_secs_f64(burst_s).ok())
        };
        if let Some(duration) = valve_open {
            debug!(open_ms = duration.as_millis() as u64, purge = result.purged, "Pulsing CO2 valve");
            self.actuators.pulse_valve(duration).await?;
        }

        Ok(())
    }

    fn publish(&self, temperature: f32, result: &StepResult) {
        let resources = self.simulation.resources();
        let status = RigStatus {
            temperature_c: temperature,
            fan_duty: self.last_fan_duty.unwrap_or(0),
            fan_mode: result.fan_mode,
            peltier_on: result.peltier_active,
            purge_count: resources.purge_count(),
            battery_fraction: resources.battery_fraction(),
            co2_remaining_j: resources.total_co2_j(),
        };

        if self.status_tx.send(status).is_err() {
            debug!("Rig status channel closed");
        }
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.actuators.set_peltier(false).await {
            warn!(error = %e, "Failed to switch Peltier off on shutdown");
        }
        if let Err(e) = self.actuators.set_fan_duty(0).await {
            warn!(error = %e, "Failed to stop fan on shutdown");
        }
        info!("Rig controller stopped");
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::config::SimulationConfig;
    use crate::sim::ConstantLoad;

    #[derive(Debug, Clone, PartialEq)]
    enum Command {
        Fan(u8),
        Valve(Duration),
        Peltier(bool),
    }

    #[derive(Debug, Default)]
    struct Recorder {
        commands: Vec<Command>,
        fail_fan: bool,
    }

    #[async_trait]
    impl CoolingActuators for Recorder {
        async fn set_fan_duty(&mut self, percent: u8) -> Result<(), ActuatorError> {
            if self.fail_fan {
                return Err(ActuatorError::Unresponsive {
                    actuator: "fan",
                    reason: "no tach signal".into(),
                });
            }
            self.commands.push(Command::Fan(percent));
            Ok(())
        }

        async fn pulse_valve(&mut self, duration: Duration) -> Result<(), ActuatorError> {
            self.commands.push(Command::Valve(duration));
            Ok(())
        }

        async fn set_peltier(&mut self, on: bool) -> Result<(), ActuatorError> {
            self.commands.push(Command::Peltier(on));
            Ok(())
        }
    }

    fn create_controller() -> (
        RigController<Recorder>,
        watch::Sender<Option<f32>>,
        watch::Receiver<RigStatus>,
    ) {
        create_controller_with(
            Simulation::with_workload(SimulationConfig::default(), ConstantLoad { power_w: 15.0 })
                .unwrap(),
        )
    }

    fn create_controller_with(
        simulation: Simulation,
    ) -> (
        RigController<Recorder>,
        watch::Sender<Option<f32>>,
        watch::Receiver<RigStatus>,
    ) {
        let (temp_tx, temp_rx) = watch::channel(None::<f32>);
        let (status_tx, status_rx) = watch::channel(RigStatus::default());

        let controller = RigController::new(simulation, Recorder::default(), temp_rx, status_tx);

        (controller, temp_tx, status_rx)
    }

    #[tokio::test]
    async fn should_not_act_without_temperature_reading() {
        let (mut controller, _temp_tx, _status_rx) = create_controller();

        controller.tick().await.unwrap();

        assert!(controller.actuators.commands.is_empty());
        assert_eq!(controller.simulation().steps(), 0);
    }

    #[tokio::test]
    async fn should_drive_actuators_from_decision() {
        let (mut controller, temp_tx, status_rx) = create_controller();

        temp_tx.send(Some(72.0)).unwrap();
        controller.tick().await.unwrap();

        let commands = &controller.actuators.commands;
        assert_eq!(commands[0], Command::Fan(10));
        assert_eq!(commands[1], Command::Peltier(true));
        assert!(matches!(commands[2], Command::Valve(_)));

        let status = *status_rx.borrow();
        assert_eq!(status.temperature_c, 72.0);
        assert_eq!(status.fan_duty, 10);
        assert!(status.peltier_on);
    }

    #[tokio::test]
    async fn should_only_send_changed_commands() {
        let (mut controller, temp_tx, _status_rx) = create_controller();

        temp_tx.send(Some(30.0)).unwrap();
        controller.tick().await.unwrap();
        let after_first = controller.actuators.commands.len();
        controller.tick().await.unwrap();

        let repeated: Vec<_> = controller.actuators.commands[after_first..]
            .iter()
            .filter(|command| !matches!(command, Command::Valve(_)))
            .collect();
        assert!(repeated.is_empty(), "resent {repeated:?}");
    }

    #[tokio::test]
    async fn should_open_valve_for_purge() {
        let (mut controller, temp_tx, status_rx) = create_controller();

        temp_tx.send(Some(91.0)).unwrap();
        controller.tick().await.unwrap();

        assert!(controller
            .actuators
            .commands
            .contains(&Command::Valve(Duration::from_millis(1500))));
        assert_eq!(status_rx.borrow().purge_count, 1);
    }

    #[tokio::test]
    async fn should_ignore_noisy_reading() {
        let (mut controller, temp_tx, _status_rx) = create_controller();

        temp_tx.send(Some(40.0)).unwrap();
        controller.tick().await.unwrap();
        temp_tx.send(Some(95.0)).unwrap();
        controller.tick().await.unwrap();

        assert_eq!(controller.simulation().steps(), 1);
        assert_eq!(controller.simulation().resources().purge_count(), 0);
    }

    #[tokio::test]
    async fn should_report_actuator_failure() {
        let (mut controller, temp_tx, _status_rx) = create_controller();
        controller.actuators.fail_fan = true;

        temp_tx.send(Some(72.0)).unwrap();
        let result = controller.tick().await;

        assert!(matches!(
            result,
            Err(ActuatorError::Unresponsive { actuator: "fan", .. })
        ));
    }

    #[tokio::test]
    async fn should_keep_controlling_past_configured_duration() {
        let config = SimulationConfig {
            total_duration_s: 60,
            ..SimulationConfig::default()
        };
        let simulation =
            Simulation::with_workload(config, ConstantLoad { power_w: 15.0 }).unwrap();
        let (mut controller, temp_tx, status_rx) = create_controller_with(simulation);

        temp_tx.send(Some(60.0)).unwrap();
        for _ in 0..24 {
            controller.tick().await.unwrap();
        }
        for reading in (63..=93).step_by(3) {
            temp_tx.send(Some(reading as f32)).unwrap();
            controller.tick().await.unwrap();
        }

        assert!(!controller.simulation().is_finished());
        assert_eq!(status_rx.borrow().temperature_c, 93.0);
        assert_eq!(status_rx.borrow().purge_count, 1);
        assert!(controller
            .actuators
            .commands
            .contains(&Command::Valve(Duration::from_millis(1500))));
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_outputs_when_battery_runs_out() {
        let mut simulation =
            Simulation::with_workload(SimulationConfig::default(), ConstantLoad { power_w: 15.0 })
                .unwrap();
        simulation.set_battery_wh(0.00001);
        let (controller, temp_tx, _status_rx) = create_controller_with(simulation);
        temp_tx.send(Some(80.0)).unwrap();

        let actuators = tokio::time::timeout(
            Duration::from_secs(60),
            controller.run(CancellationToken::new()),
        )
        .await
        .expect("run should end once the battery is depleted");

        let tail = &actuators.commands[actuators.commands.len() - 2..];
        assert_eq!(tail, &[Command::Peltier(false), Command::Fan(0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_tick_until_cancelled_then_stop_outputs() {
        let (controller, temp_tx, status_rx) = create_controller();
        let cancellation = CancellationToken::new();
        temp_tx.send(Some(72.0)).unwrap();

        let handle = tokio::spawn(controller.run(cancellation.clone()));
        tokio::time::sleep(Duration::from_secs(12)).await;
        cancellation.cancel();
        let actuators = handle.await.unwrap();

        assert_eq!(status_rx.borrow().temperature_c, 72.0);
        let tail = &actuators.commands[actuators.commands.len() - 2..];
        assert_eq!(tail, &[Command::Peltier(false), Command::Fan(0)]);
    }
}
