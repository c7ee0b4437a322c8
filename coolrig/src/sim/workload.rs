use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Heat input to the device as a function of elapsed time.
pub trait Workload: Send {
    /// Power dissipated by the device at `elapsed_s` (W).
    fn power_w(&self, elapsed_s: u64) -> f64;
}

impl<F> Workload for F
where
    F: Fn(u64) -> f64 + Send,
{
    fn power_w(&self, elapsed_s: u64) -> f64 {
        self(elapsed_s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantLoad {
    pub power_w: f64,
}

impl Workload for ConstantLoad {
    fn power_w(&self, _elapsed_s: u64) -> f64 {
        self.power_w
    }
}

/// Sustained high load between `start_s` and `end_s`, both exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakWindow {
    pub start_s: u64,
    pub end_s: u64,
}

impl PeakWindow {
    fn contains(&self, elapsed_s: u64) -> bool {
        self.start_s < elapsed_s && elapsed_s < self.end_s
    }
}

/// Baseline load with a sinusoidal swing, interrupted by peak windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CyclicLoad {
    pub rated_w: f64,
    pub base_fraction: f64,
    pub swing_fraction: f64,
    /// Half the sine period (s).
    pub half_period_s: f64,
    pub peak_fraction: f64,
    pub peaks: Vec<PeakWindow>,
}

impl CyclicLoad {
    /// Busy laptop: 85 % baseline, ±15 % every five minutes, two bursts
    /// at 110 % during the first hour.
    pub fn laptop(rated_w: f64) -> Self {
        Self {
            rated_w,
            base_fraction: 0.85,
            swing_fraction: 0.15,
            half_period_s: 300.0,
            peak_fraction: 1.1,
            peaks: vec![
                PeakWindow {
                    start_s: 900,
                    end_s: 1100,
                },
                PeakWindow {
                    start_s: 2400,
                    end_s: 2700,
                },
            ],
        }
    }

    /// Always-on machine: slow five-hour swing with a two-hour peak at 10 %
    /// of the run and a four-hour peak at 60 %.
    pub fn endurance(rated_w: f64, total_duration_s: u64) -> Self {
        let first = total_duration_s / 10;
        let second = total_duration_s * 6 / 10;
        Self {
            rated_w,
            base_fraction: 0.85,
            swing_fraction: 0.15,
            half_period_s: 300.0 * 60.0,
            peak_fraction: 1.1,
            peaks: vec![
                PeakWindow {
                    start_s: first,
                    end_s: first + 7200,
                },
                PeakWindow {
                    start_s: second,
                    end_s: second + 14_400,
                },
            ],
        }
    }
}

impl Workload for CyclicLoad {
    fn power_w(&self, elapsed_s: u64) -> f64 {
        if self.peaks.iter().any(|peak| peak.contains(elapsed_s)) {
            return self.rated_w * self.peak_fraction;
        }

        let swing = if self.half_period_s > 0.0 {
            (elapsed_s as f64 / self.half_period_s * PI).sin()
        } else {
            0.0
        };
        self.rated_w * (self.base_fraction + swing * self.swing_fraction)
    }
}

/// Serializable description of the workload a run uses.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkloadSpec {
    /// Fixed power.
    Constant { power_w: f64 },
    /// [`CyclicLoad::laptop`] at the rated device power.
    #[default]
    Laptop,
    /// [`CyclicLoad::endurance`] at the rated device power.
    Endurance,
    Cyclic(CyclicLoad),
}

impl WorkloadSpec {
    pub fn build(&self, rated_w: f64, total_duration_s: u64) -> Box<dyn Workload> {
        match self {
            WorkloadSpec::Constant { power_w } => Box::new(ConstantLoad { power_w: *power_w }),
            WorkloadSpec::Laptop => Box::new(CyclicLoad::laptop(rated_w)),
            WorkloadSpec::Endurance => Box::new(CyclicLoad::endurance(rated_w, total_duration_s)),
            WorkloadSpec::Cyclic(load) => Box::new(load.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn should_accept_closures() {
        let ramp = |elapsed_s: u64| elapsed_s as f64 * 0.01;

        assert_eq!(ramp.power_w(500), 5.0);
    }

    #[test_case(0, 18.5 * 0.85; "baseline at start")]
    #[test_case(150, 18.5; "top of the swing")]
    #[test_case(450, 18.5 * 0.7; "bottom of the swing")]
    #[test_case(1000, 18.5 * 1.1; "first peak")]
    #[test_case(2500, 18.5 * 1.1; "second peak")]
    fn should_follow_laptop_profile(elapsed_s: u64, expected_w: f64) {
        let load = CyclicLoad::laptop(18.5);

        assert!((load.power_w(elapsed_s) - expected_w).abs() < 1e-9);
    }

    #[test]
    fn should_exclude_peak_window_edges() {
        let load = CyclicLoad::laptop(18.5);

        assert!(load.power_w(900) < 18.5 * 1.1);
        assert!(load.power_w(905) == 18.5 * 1.1);
    }

    #[test]
    fn should_place_endurance_peaks_relative_to_run_length() {
        let year = 365 * 24 * 3600;
        let load = CyclicLoad::endurance(18.5, year);

        assert_eq!(load.power_w(year / 10 + 3600), 18.5 * 1.1);
        assert_eq!(load.power_w(year * 6 / 10 + 10_000), 18.5 * 1.1);
        assert!(load.power_w(year / 2) < 18.5 * 1.1);
    }

    #[test]
    fn should_parse_tagged_spec() {
        let spec: WorkloadSpec =
            serde_json::from_str(r#"{ "type": "constant", "power_w": 15.0 }"#).unwrap();

        assert_eq!(spec, WorkloadSpec::Constant { power_w: 15.0 });
        assert_eq!(spec.build(18.5, 3600).power_w(1234), 15.0);
    }
}
