use std::fmt;

use serde::Serialize;

use crate::thermal::{FanMode, PurgeReason, ThermalBand};
use crate::tracing::prelude::*;

/// One entry of the chronological event log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimEvent {
    pub timestamp_s: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, strum::IntoStaticStr)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Purge {
        reason: PurgeReason,
        temperature_before_c: f64,
        temp_drop_c: f64,
        energy_j: f64,
        canister: usize,
        canister_after_j: f64,
        fan_duty: f64,
    },
    PurgeSkipped {
        reason: PurgeReason,
        temperature_c: f64,
        available_j: f64,
        required_j: f64,
    },
    Swap {
        from: usize,
        to: usize,
        energy_j: f64,
    },
    Refill {
        refill_count: u32,
    },
    CanistersExhausted {
        canisters: [f64; 2],
    },
    Status {
        temperature_c: f64,
        fan_duty: f64,
        fan_mode: FanMode,
        peltier_active: bool,
        battery_fraction: f64,
        active_canister: usize,
        canisters: [f64; 2],
    },
    BandChange {
        from: ThermalBand,
        to: ThermalBand,
        temperature_c: f64,
    },
    PressureVent {
        from_pa: f64,
        to_pa: f64,
        after_purge: bool,
    },
    ReliefValve {
        pressure_pa: f64,
    },
    BatteryDepleted {
        temperature_c: f64,
    },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Purge {
                reason,
                temperature_before_c,
                temp_drop_c,
                canister,
                canister_after_j,
                fan_duty,
                ..
            } => write!(
                f,
                "{reason} purge at {temperature_before_c:.2}°C, -{temp_drop_c:.2}°C, \
                 canister {canister} left {canister_after_j:.0} J, fan {fan_duty:.0}%"
            ),
            EventKind::PurgeSkipped {
                reason,
                temperature_c,
                available_j,
                required_j,
            } => write!(
                f,
                "{reason} purge skipped at {temperature_c:.2}°C: \
                 {available_j:.0} J available, {required_j:.0} J needed"
            ),
            EventKind::Swap { from, to, energy_j } => {
                write!(f, "canister swap {from} -> {to} ({energy_j:.0} J)")
            }
            EventKind::Refill { refill_count } => {
                write!(f, "both canisters refilled (refill #{refill_count})")
            }
            EventKind::CanistersExhausted { canisters } => write!(
                f,
                "both canisters exhausted ({:.0} J, {:.0} J)",
                canisters[0], canisters[1]
            ),
            EventKind::Status {
                temperature_c,
                fan_duty,
                fan_mode,
                peltier_active,
                battery_fraction,
                active_canister,
                canisters,
            } => write!(
                f,
                "{temperature_c:.2}°C, fan {fan_duty:.0}% ({fan_mode}), peltier {}, \
                 battery {:.1}%, CO₂ {:.0} J (canister {active_canister})",
                if *peltier_active { "on" } else { "off" },
                battery_fraction * 100.0,
                canisters[*active_canister],
            ),
            EventKind::BandChange {
                from,
                to,
                temperature_c,
            } => write!(f, "{from} -> {to} at {temperature_c:.2}°C"),
            EventKind::PressureVent {
                from_pa,
                to_pa,
                after_purge,
            } => write!(
                f,
                "{} vent {:.2} bar -> {:.2} bar",
                if *after_purge { "post-purge" } else { "pressure" },
                from_pa / 1e5,
                to_pa / 1e5
            ),
            EventKind::ReliefValve { pressure_pa } => {
                write!(f, "relief valve opened at {:.2} bar", pressure_pa / 1e5)
            }
            EventKind::BatteryDepleted { temperature_c } => {
                write!(f, "battery depleted at {temperature_c:.2}°C")
            }
        }
    }
}

impl fmt::Display for SimEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>8}s] {}: {}", self.timestamp_s, self.kind.name(), self.kind)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<SimEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, timestamp_s: u64, kind: EventKind) {
        match &kind {
            EventKind::Status { .. } | EventKind::PurgeSkipped { .. } => {
                debug!(t = timestamp_s, event = kind.name(), "{kind}")
            }
            _ => info!(t = timestamp_s, event = kind.name(), "{kind}"),
        }
        self.events.push(SimEvent { timestamp_s, kind });
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .iter()
            .filter(|event| event.kind.name() == name)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_with_kind_tag() {
        let event = SimEvent {
            timestamp_s: 300,
            kind: EventKind::Swap {
                from: 0,
                to: 1,
                energy_j: 2900.0,
            },
        };

        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["kind"], "SWAP");
        assert_eq!(json["timestamp_s"], 300);
        assert_eq!(json["to"], 1);
    }

    #[test]
    fn should_render_log_line() {
        let event = SimEvent {
            timestamp_s: 45,
            kind: EventKind::BandChange {
                from: ThermalBand::Warm,
                to: ThermalBand::Critical,
                temperature_c: 90.5,
            },
        };

        assert_eq!(
            event.to_string(),
            "[      45s] BAND_CHANGE: WARM -> CRITICAL at 90.50°C"
        );
    }

    #[test]
    fn should_count_events_by_name() {
        let mut log = EventLog::new();
        log.record(0, EventKind::Refill { refill_count: 1 });
        log.record(5, EventKind::Refill { refill_count: 2 });
        log.record(
            10,
            EventKind::BatteryDepleted {
                temperature_c: 70.0,
            },
        );

        assert_eq!(log.count("REFILL"), 2);
        assert_eq!(log.count("BATTERY_DEPLETED"), 1);
        assert_eq!(log.events().len(), 3);
    }
}
