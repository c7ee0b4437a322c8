use serde::{Deserialize, Serialize};

use crate::config::FanConfig;

const DUTY_MIN: f64 = 0.0;
const DUTY_MAX: f64 = 100.0;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FanMode {
    #[default]
    Passive,
    SlowHiss,
    PurgeAssist,
    Normal,
    Emergency,
}

/// Variable-speed fan: picks a target duty from temperature, ramps toward
/// it, and reports how much it amplifies every other cooling path.
#[derive(Debug, Clone)]
pub struct FanController {
    config: FanConfig,
    conduction_window_s: u64,
    duty_cycle: f64,
    mode: FanMode,
}

impl FanController {
    pub fn new(config: FanConfig, conduction_window_s: u64) -> Self {
        Self {
            config,
            conduction_window_s,
            duty_cycle: 0.0,
            mode: FanMode::Passive,
        }
    }

    pub fn duty_cycle(&self) -> f64 {
        self.duty_cycle
    }

    pub fn mode(&self) -> FanMode {
        self.mode
    }

    /// Pick the mode and target duty. Rules are checked in order and the
    /// first match wins.
    pub fn decide(
        &self,
        temperature_c: f64,
        is_post_purge: bool,
        elapsed_s: u64,
        time_step_s: u64,
    ) -> (FanMode, f64) {
        let c = &self.config;

        if temperature_c < c.passive_below_c && !is_post_purge {
            (FanMode::Passive, 0.0)
        } else if temperature_c < c.warning_below_c {
            let pulse = c.pulse_period_s > 0 && elapsed_s % c.pulse_period_s < time_step_s;
            (FanMode::SlowHiss, if pulse { c.pulse_duty } else { 0.0 })
        } else if is_post_purge {
            (FanMode::PurgeAssist, c.purge_assist_duty)
        } else if temperature_c > c.high_above_c {
            (FanMode::Emergency, DUTY_MAX)
        } else {
            (FanMode::Normal, self.normal_duty(temperature_c))
        }
    }

    fn normal_duty(&self, temperature_c: f64) -> f64 {
        let c = &self.config;
        if !c.scale_normal_duty {
            return c.normal_duty;
        }

        let span = c.high_above_c - c.warning_below_c;
        if span <= 0.0 {
            return c.normal_duty;
        }
        let fraction = ((temperature_c - c.warning_below_c) / span).clamp(0.0, 1.0);
        c.normal_duty + fraction * (DUTY_MAX - c.normal_duty)
    }

    /// Move `current` toward `target` by at most one step's worth of
    /// ramp. The result is always within [0, 100].
    pub fn ramp(&self, current: f64, target: f64, time_step_s: u64) -> f64 {
        let dt = time_step_s as f64;
        let target = target.clamp(DUTY_MIN, DUTY_MAX);

        let next = if target > current {
            (current + self.config.ramp_up_pct_per_s * dt).min(target)
        } else if target < current {
            (current - self.config.ramp_down_pct_per_s * dt).max(target)
        } else {
            current
        };

        if next.is_finite() {
            next.clamp(DUTY_MIN, DUTY_MAX)
        } else {
            DUTY_MIN
        }
    }

    /// Factor (>= 1.0) applied to every cooling path. A stopped fan is the
    /// identity no matter what else is going on.
    pub fn multiplier(&self, duty: f64, is_post_purge: bool, post_purge_remaining_s: f64) -> f64 {
        if duty <= 0.0 || !duty.is_finite() {
            return 1.0;
        }
        self.capped(self.uncapped_multiplier(duty, is_post_purge, post_purge_remaining_s))
    }

    /// Product of the boost, speed and post-purge factors with no ceiling
    /// applied. Callers folding in extra factors cap the result themselves.
    pub fn uncapped_multiplier(
        &self,
        duty: f64,
        is_post_purge: bool,
        post_purge_remaining_s: f64,
    ) -> f64 {
        if duty <= 0.0 || !duty.is_finite() {
            return 1.0;
        }

        let c = &self.config;
        let fraction = (duty / DUTY_MAX).min(1.0);
        let base_mult = 1.0 + (c.efficiency_multiplier_base - 1.0) * fraction;
        let speed_factor = 1.0 + fraction * c.speed_gain;

        let purge_boost = if is_post_purge && self.conduction_window_s > 0 {
            let decay =
                (post_purge_remaining_s / self.conduction_window_s as f64).clamp(0.0, 1.0);
            1.0 + c.purge_boost_gain * decay
        } else {
            1.0
        };

        base_mult * speed_factor * purge_boost
    }

    /// Apply the configured ceiling, never dropping below the identity.
    pub fn capped(&self, multiplier: f64) -> f64 {
        let multiplier = match self.config.efficiency_multiplier_max {
            Some(max) => multiplier.min(max),
            None => multiplier,
        };
        multiplier.max(1.0)
    }

    /// Decide, ramp, and store the new duty.
    pub fn update(
        &mut self,
        temperature_c: f64,
        is_post_purge: bool,
        elapsed_s: u64,
        time_step_s: u64,
    ) -> f64 {
        let (mode, target) = self.decide(temperature_c, is_post_purge, elapsed_s, time_step_s);
        self.mode = mode;
        self.duty_cycle = self.ramp(self.duty_cycle, target, time_step_s);
        self.duty_cycle
    }

    /// Stop immediately, e.g. when the battery is gone.
    pub fn force_off(&mut self) {
        self.mode = FanMode::Passive;
        self.duty_cycle = 0.0;
    }

    /// Battery energy consumed over one step at `duty` (Wh).
    pub fn energy_wh(&self, duty: f64, time_step_s: u64) -> f64 {
        self.config.power_draw_w * (duty / DUTY_MAX) * time_step_s as f64 / 3600.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn controller() -> FanController {
        FanController::new(FanConfig::default(), 180)
    }

    #[test_case(30.0, false, 0, FanMode::Passive, 0.0; "cool and idle")]
    #[test_case(30.0, true, 0, FanMode::SlowHiss, 30.0; "cool after purge pulses")]
    #[test_case(55.0, false, 15, FanMode::SlowHiss, 30.0; "pulse on period boundary")]
    #[test_case(55.0, false, 10, FanMode::SlowHiss, 0.0; "no pulse between boundaries")]
    #[test_case(70.0, true, 0, FanMode::PurgeAssist, 80.0; "warm after purge")]
    #[test_case(80.0, true, 0, FanMode::PurgeAssist, 80.0; "post purge outranks emergency")]
    #[test_case(80.0, false, 0, FanMode::Emergency, 100.0; "hot")]
    #[test_case(70.0, false, 0, FanMode::Normal, 50.0; "normal")]
    fn should_pick_mode_in_priority_order(
        temperature_c: f64,
        is_post_purge: bool,
        elapsed_s: u64,
        mode: FanMode,
        target: f64,
    ) {
        assert_eq!(
            controller().decide(temperature_c, is_post_purge, elapsed_s, 5),
            (mode, target)
        );
    }

    #[test]
    fn should_scale_normal_duty_between_thresholds() {
        let config = FanConfig {
            scale_normal_duty: true,
            ..FanConfig::default()
        };
        let fan = FanController::new(config, 180);

        let (_, at_warning) = fan.decide(65.0, false, 0, 5);
        let (_, midway) = fan.decide(70.0, false, 0, 5);
        let (_, at_high) = fan.decide(75.0, false, 0, 5);

        assert_eq!(at_warning, 50.0);
        assert_eq!(midway, 75.0);
        assert_eq!(at_high, 100.0);
    }

    #[test]
    fn should_ramp_up_faster_than_down() {
        let fan = controller();

        assert_eq!(fan.ramp(0.0, 100.0, 5), 10.0);
        assert_eq!(fan.ramp(100.0, 0.0, 5), 95.0);
    }

    #[test]
    fn should_not_overshoot_target() {
        let fan = controller();

        assert_eq!(fan.ramp(45.0, 50.0, 5), 50.0);
        assert_eq!(fan.ramp(52.0, 50.0, 5), 50.0);
    }

    #[test]
    fn should_keep_duty_within_bounds_for_any_target_sequence() {
        let config = FanConfig {
            ramp_up_pct_per_s: 40.0,
            ramp_down_pct_per_s: 30.0,
            ..FanConfig::default()
        };
        let fan = FanController::new(config, 180);
        let targets = [250.0, -40.0, 100.0, 0.0, 1e9, -1e9, 55.5, f64::NAN, 100.0];

        let mut duty = 0.0;
        for target in targets {
            duty = fan.ramp(duty, target, 5);
            assert!((0.0..=100.0).contains(&duty), "duty {duty} out of range");
        }
    }

    #[test_case(false, 0.0; "idle")]
    #[test_case(true, 0.0; "window just ended")]
    #[test_case(true, 90.0; "mid window")]
    #[test_case(true, 180.0; "just purged")]
    fn should_be_identity_with_fan_stopped(is_post_purge: bool, remaining_s: f64) {
        assert_eq!(controller().multiplier(0.0, is_post_purge, remaining_s), 1.0);
    }

    #[test]
    fn should_combine_boost_and_speed_factors() {
        let multiplier = controller().multiplier(50.0, false, 0.0);

        assert!((multiplier - 1.15 * 1.35).abs() < 1e-12);
    }

    #[test]
    fn should_boost_more_right_after_purge() {
        let fan = FanController::new(
            FanConfig {
                efficiency_multiplier_max: None,
                ..FanConfig::default()
            },
            180,
        );

        let base = fan.multiplier(50.0, false, 0.0);
        let fresh = fan.multiplier(50.0, true, 180.0);
        let halfway = fan.multiplier(50.0, true, 90.0);
        let spent = fan.multiplier(50.0, true, 0.0);

        assert!((fresh / base - 1.5).abs() < 1e-12);
        assert!((halfway / base - 1.25).abs() < 1e-12);
        assert!((spent - base).abs() < 1e-12);
    }

    #[test]
    fn should_cap_multiplier() {
        let multiplier = controller().multiplier(100.0, true, 180.0);

        assert_eq!(multiplier, 2.5);
    }

    #[test]
    fn should_ignore_post_purge_boost_without_conduction_window() {
        let fan = FanController::new(FanConfig::default(), 0);

        assert_eq!(
            fan.multiplier(50.0, true, 0.0),
            fan.multiplier(50.0, false, 0.0)
        );
    }

    #[test]
    fn should_store_mode_and_duty_on_update() {
        let mut fan = controller();

        let duty = fan.update(80.0, false, 0, 5);

        assert_eq!(duty, 10.0);
        assert_eq!(fan.duty_cycle(), 10.0);
        assert_eq!(fan.mode(), FanMode::Emergency);
    }

    #[test]
    fn should_stop_on_force_off() {
        let mut fan = controller();
        fan.update(80.0, false, 0, 5);

        fan.force_off();

        assert_eq!(fan.duty_cycle(), 0.0);
        assert_eq!(fan.mode(), FanMode::Passive);
    }
}
