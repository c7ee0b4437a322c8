use crate::config::PressureConfig;

/// Ideal gas constant, J/(mol·K).
const R: f64 = 8.314;

fn kelvin(temp_c: f64) -> f64 {
    temp_c + 273.15
}

/// Pressure change caused by a vent, in pascals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vent {
    pub from_pa: f64,
    pub to_pa: f64,
}

/// CO₂ held in the sealed chamber around the device.
///
/// Microbursts add gas, the relief valve caps it, and the exit valve vents
/// back down to the moisture-protection floor. Pressure follows the device
/// temperature through `p = nRT/V`.
#[derive(Debug, Clone)]
pub struct PressureModel {
    config: PressureConfig,
    moles: f64,
    hold_until_s: u64,
    vent_count: u32,
    relief_count: u32,
}

impl PressureModel {
    /// Start pre-purged with dry CO₂ at the moisture-protection floor.
    pub fn new(config: PressureConfig, initial_temp_c: f64) -> Self {
        let moles = Self::moles_at(&config, config.moisture_floor_pa, initial_temp_c);
        Self {
            config,
            moles,
            hold_until_s: 0,
            vent_count: 0,
            relief_count: 0,
        }
    }

    fn moles_at(config: &PressureConfig, pressure_pa: f64, temp_c: f64) -> f64 {
        pressure_pa * config.vessel_volume_m3 / (R * kelvin(temp_c))
    }

    pub fn pressure_pa(&self, temp_c: f64) -> f64 {
        self.moles * R * kelvin(temp_c) / self.config.vessel_volume_m3
    }

    pub fn vent_count(&self) -> u32 {
        self.vent_count
    }

    pub fn relief_count(&self) -> u32 {
        self.relief_count
    }

    /// Bursts are held while the chamber is at or above the vent threshold
    /// and for a while after any vent.
    pub fn injection_allowed(&self, temp_c: f64, elapsed_s: u64) -> bool {
        elapsed_s >= self.hold_until_s && self.pressure_pa(temp_c) < self.config.vent_threshold_pa
    }

    /// Add the gas from a burst of `burst_s` seconds. Returns `true` when
    /// the relief valve had to open.
    pub fn inject(&mut self, burst_s: f64, temp_c: f64) -> bool {
        self.moles += self.config.injection_mol_per_s * burst_s.max(0.0);

        let max_moles = Self::moles_at(&self.config, self.config.relief_pa, temp_c);
        if self.moles > max_moles {
            self.moles = max_moles;
            self.relief_count += 1;
            return true;
        }
        false
    }

    /// Dump surplus gas while the device is cool enough not to need it.
    pub fn maybe_vent(&mut self, temp_c: f64, cool_below_c: f64, elapsed_s: u64) -> Option<Vent> {
        let pressure = self.pressure_pa(temp_c);
        if pressure > self.config.vent_threshold_pa && temp_c < cool_below_c {
            Some(self.vent(temp_c, elapsed_s, self.config.vent_hold_s))
        } else {
            None
        }
    }

    /// A purge floods and then clears the chamber.
    pub fn vent_after_purge(&mut self, temp_c: f64, elapsed_s: u64) -> Vent {
        self.vent(temp_c, elapsed_s, self.config.purge_hold_s)
    }

    fn vent(&mut self, temp_c: f64, elapsed_s: u64, hold_s: u64) -> Vent {
        let from_pa = self.pressure_pa(temp_c);
        self.moles = Self::moles_at(&self.config, self.config.moisture_floor_pa, temp_c);
        self.hold_until_s = elapsed_s + hold_s;
        self.vent_count += 1;
        Vent {
            from_pa,
            to_pa: self.pressure_pa(temp_c),
        }
    }

    /// Denser gas carries more heat: `clamp(p / p_ref, 1, max)`.
    pub fn fan_factor(&self, temp_c: f64) -> f64 {
        let ratio = self.pressure_pa(temp_c) / self.config.reference_pa;
        if ratio.is_finite() {
            ratio.clamp(1.0, self.config.max_fan_factor.max(1.0))
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> PressureModel {
        PressureModel::new(PressureConfig::default(), 25.0)
    }

    #[test]
    fn should_start_at_moisture_floor() {
        let pressure = model().pressure_pa(25.0);

        assert!((pressure - 1.1e5).abs() < 1e-6);
    }

    #[test]
    fn should_rise_with_temperature() {
        let model = model();

        assert!(model.pressure_pa(60.0) > model.pressure_pa(25.0));
    }

    #[test]
    fn should_cap_at_relief_pressure() {
        let mut model = model();

        let relieved = model.inject(1000.0, 25.0);

        assert!(relieved);
        assert!((model.pressure_pa(25.0) - 5.0e5).abs() < 1e-6);
        assert_eq!(model.relief_count(), 1);
    }

    #[test]
    fn should_hold_injections_above_vent_threshold() {
        let mut model = model();
        model.inject(30.0, 25.0);

        assert!(model.pressure_pa(25.0) > 2.5e5);
        assert!(!model.injection_allowed(25.0, 0));
    }

    #[test]
    fn should_vent_surplus_when_cool_and_hold() {
        let mut model = model();
        model.inject(30.0, 25.0);

        let vent = model.maybe_vent(25.0, 65.0, 100);

        let vent = vent.unwrap();
        assert!(vent.from_pa > 2.5e5);
        assert!((vent.to_pa - 1.1e5).abs() < 1e-6);
        assert!(!model.injection_allowed(25.0, 105));
        assert!(model.injection_allowed(25.0, 110));
    }

    #[test]
    fn should_keep_gas_while_hot() {
        let mut model = model();
        model.inject(30.0, 70.0);

        assert!(model.maybe_vent(70.0, 65.0, 100).is_none());
    }

    #[test]
    fn should_hold_longer_after_purge() {
        let mut model = model();

        model.vent_after_purge(91.0, 200);

        assert!(!model.injection_allowed(50.0, 229));
        assert!(model.injection_allowed(50.0, 230));
        assert_eq!(model.vent_count(), 1);
    }

    #[test]
    fn should_clamp_fan_factor() {
        let mut model = model();
        assert!((model.fan_factor(25.0) - 1.1).abs() < 1e-9);

        model.inject(1000.0, 25.0);
        assert_eq!(model.fan_factor(25.0), 2.0);
    }
}
