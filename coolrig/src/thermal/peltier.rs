use crate::config::PeltierConfig;

use super::state::ThermalState;

/// Result of running the Peltier for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeltierOutput {
    /// Heat pumped off the device, before any fan boost (W).
    pub cooling_w: f64,
    /// Battery energy consumed (Wh).
    pub energy_wh: f64,
}

/// On/off thermoelectric cooler with a hysteresis band, a battery reserve,
/// a hot-side safety ceiling and a maximum continuous runtime.
#[derive(Debug, Clone)]
pub struct PeltierController {
    config: PeltierConfig,
    battery_capacity_wh: f64,
    active: bool,
    runtime_s: f64,
}

impl PeltierController {
    pub fn new(config: PeltierConfig, battery_capacity_wh: f64) -> Self {
        Self {
            config,
            battery_capacity_wh,
            active: false,
            runtime_s: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn runtime_s(&self) -> f64 {
        self.runtime_s
    }

    /// Decide whether the cooler runs this step.
    ///
    /// While active, any shutdown condition turns it off and resets the
    /// runtime to zero. While inactive, it starts only when every
    /// activation condition holds.
    pub fn update(
        &mut self,
        temperature_c: f64,
        battery_wh: f64,
        hot_side_temp_c: f64,
        time_since_purge_s: Option<u64>,
    ) -> bool {
        let c = &self.config;

        if self.active {
            let shutdown = temperature_c < c.deactivate_below_c
                || battery_wh < c.critical_battery_fraction * self.battery_capacity_wh
                || hot_side_temp_c > c.hot_side_cutoff_c
                || self.runtime_s >= c.max_runtime_s;
            if shutdown {
                self.active = false;
                self.runtime_s = 0.0;
            }
        } else {
            let post_purge_bonus =
                time_since_purge_s.is_some_and(|since| since < c.post_purge_window_s);
            let wanted = temperature_c > c.activate_above_c || post_purge_bonus;
            let allowed = battery_wh > c.min_battery_fraction * self.battery_capacity_wh
                && self.runtime_s < c.max_runtime_s
                && hot_side_temp_c < c.hot_side_limit_c;
            self.active = wanted && allowed;
        }

        self.active
    }

    /// Coefficient of performance proxy, within `[0.1 * base, base]`.
    pub fn efficiency(&self, cpu_temp_c: f64, hot_side_temp_c: f64) -> f64 {
        let c = &self.config;
        let base = c.efficiency_base;

        let delta = hot_side_temp_c - cpu_temp_c;
        if delta <= 0.0 {
            return base;
        }

        let mut efficiency = if c.differential_span_c > 0.0 {
            (base * (1.0 - (delta / c.differential_span_c).powi(2))).max(0.0)
        } else {
            0.0
        };
        if hot_side_temp_c > c.derate_above_c {
            efficiency *= 0.5;
        }

        efficiency.clamp(0.1 * base, base)
    }

    /// Run (or rest) the cooler for one step, moving the hot side
    /// accordingly. The hot side never ends up below the device.
    pub fn operate(&mut self, state: &mut ThermalState, time_step_s: u64) -> PeltierOutput {
        let c = &self.config;
        let dt = time_step_s as f64;
        let device = state.temperature_c;

        let output = if self.active {
            let cooling_w = c.max_cooling_w * self.efficiency(device, state.hot_side_temp_c);
            let rejected_w = c.hot_side_dissipation_w_per_c * (state.hot_side_temp_c - device);
            state.hot_side_temp_c +=
                (c.power_draw_w + cooling_w - rejected_w) * dt / c.hot_side_thermal_mass_j_per_c;
            self.runtime_s += dt;

            PeltierOutput {
                cooling_w,
                energy_wh: c.power_draw_w * dt / 3600.0,
            }
        } else {
            let relax = (c.hot_side_relax_per_s * dt).min(1.0);
            state.hot_side_temp_c -= (state.hot_side_temp_c - device) * relax;
            PeltierOutput::default()
        };

        state.enforce_hot_side_floor();
        output
    }

    /// Shut down immediately, e.g. when the battery is gone.
    pub fn force_off(&mut self) {
        self.active = false;
        self.runtime_s = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const BATTERY_WH: f64 = 60.0;

    fn controller() -> PeltierController {
        PeltierController::new(PeltierConfig::default(), BATTERY_WH)
    }

    #[test]
    fn should_activate_above_threshold() {
        let mut peltier = controller();

        assert!(peltier.update(72.0, BATTERY_WH, 72.0, None));
    }

    #[test]
    fn should_activate_shortly_after_purge() {
        let mut peltier = controller();

        assert!(peltier.update(67.0, BATTERY_WH, 67.0, Some(30)));
    }

    #[test]
    fn should_not_activate_after_bonus_window() {
        let mut peltier = controller();

        assert!(!peltier.update(67.0, BATTERY_WH, 67.0, Some(60)));
    }

    #[test_case(72.0, 2.0, 72.0; "battery below reserve")]
    #[test_case(72.0, BATTERY_WH, 91.0; "hot side too hot")]
    #[test_case(68.0, BATTERY_WH, 68.0; "inside hysteresis gap")]
    fn should_stay_off(temperature_c: f64, battery_wh: f64, hot_side_c: f64) {
        let mut peltier = controller();

        assert!(!peltier.update(temperature_c, battery_wh, hot_side_c, None));
    }

    #[test]
    fn should_keep_running_inside_hysteresis_gap() {
        let mut peltier = controller();
        peltier.update(72.0, BATTERY_WH, 72.0, None);

        assert!(peltier.update(67.0, BATTERY_WH, 72.0, None));
    }

    #[test_case(60.0, BATTERY_WH, 72.0; "cooled down")]
    #[test_case(72.0, 1.0, 72.0; "battery critical")]
    #[test_case(72.0, BATTERY_WH, 96.0; "hot side cutoff")]
    fn should_shut_down_and_reset_runtime(temperature_c: f64, battery_wh: f64, hot_side_c: f64) {
        let mut peltier = controller();
        let mut state = ThermalState::new(72.0);
        peltier.update(72.0, BATTERY_WH, 72.0, None);
        peltier.operate(&mut state, 5);
        assert_eq!(peltier.runtime_s(), 5.0);

        assert!(!peltier.update(temperature_c, battery_wh, hot_side_c, None));
        assert_eq!(peltier.runtime_s(), 0.0);
    }

    #[test]
    fn should_rest_after_max_runtime() {
        let mut peltier = controller();
        let mut state = ThermalState::new(80.0);

        let mut steps = 0;
        while peltier.update(80.0, BATTERY_WH, state.temperature_c, None) {
            peltier.operate(&mut state, 5);
            state.hot_side_temp_c = state.temperature_c;
            steps += 1;
        }

        assert_eq!(steps, 24);
        assert_eq!(peltier.runtime_s(), 0.0);
    }

    #[test]
    fn should_be_at_base_efficiency_without_differential() {
        let peltier = controller();

        assert_eq!(peltier.efficiency(70.0, 70.0), 0.6);
        assert_eq!(peltier.efficiency(70.0, 50.0), 0.6);
    }

    #[test]
    fn should_lose_efficiency_as_hot_side_heats() {
        let peltier = controller();

        let mut previous = peltier.efficiency(40.0, 40.0);
        for step in 1..=200 {
            let hot = 40.0 + step as f64 * 0.5;
            let efficiency = peltier.efficiency(40.0, hot);
            assert!(efficiency <= previous, "efficiency rose at hot side {hot}");
            assert!((0.1 * 0.6..=0.6).contains(&efficiency));
            previous = efficiency;
        }
    }

    #[test]
    fn should_halve_efficiency_when_hot_side_is_very_hot() {
        let peltier = controller();

        let cool = peltier.efficiency(70.0, 84.0);
        let hot = peltier.efficiency(71.0, 85.5);

        assert!((cool - 0.6 * (1.0 - (14.0f64 / 70.0).powi(2))).abs() < 1e-12);
        assert!((hot - 0.5 * 0.6 * (1.0 - (14.5f64 / 70.0).powi(2))).abs() < 1e-12);
    }

    #[test]
    fn should_heat_hot_side_and_drain_battery_while_active() {
        let mut peltier = controller();
        let mut state = ThermalState::new(75.0);
        peltier.update(75.0, BATTERY_WH, 75.0, None);

        let output = peltier.operate(&mut state, 5);

        assert_eq!(output.cooling_w, 15.0 * 0.6);
        assert!((output.energy_wh - 30.0 * 5.0 / 3600.0).abs() < 1e-12);
        assert!((state.hot_side_temp_c - (75.0 + 39.0 * 5.0 / 50.0)).abs() < 1e-12);
    }

    #[test]
    fn should_relax_hot_side_toward_device_while_resting() {
        let mut peltier = controller();
        let mut state = ThermalState::new(50.0);
        state.hot_side_temp_c = 70.0;

        let output = peltier.operate(&mut state, 5);

        assert_eq!(output, PeltierOutput::default());
        assert_eq!(state.hot_side_temp_c, 60.0);
    }

    #[test]
    fn should_never_leave_hot_side_below_device() {
        let config = PeltierConfig {
            hot_side_dissipation_w_per_c: 1000.0,
            ..PeltierConfig::default()
        };
        let mut peltier = PeltierController::new(config, BATTERY_WH);
        let mut state = ThermalState::new(75.0);
        state.hot_side_temp_c = 80.0;
        peltier.update(75.0, BATTERY_WH, 80.0, None);

        peltier.operate(&mut state, 5);

        assert!(state.hot_side_temp_c >= state.temperature_c);
    }
}
