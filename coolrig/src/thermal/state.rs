use serde::Serialize;

/// Device and Peltier hot-side temperatures plus the simulation clock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThermalState {
    pub temperature_c: f64,

    /// Never below `temperature_c` once a step completes.
    pub hot_side_temp_c: f64,

    pub elapsed_s: u64,

    /// `None` until the first purge.
    pub last_purge_s: Option<u64>,

    /// Running maximum of `temperature_c`.
    pub peak_temp_c: f64,
}

impl ThermalState {
    pub fn new(initial_temp_c: f64) -> Self {
        Self {
            temperature_c: initial_temp_c,
            hot_side_temp_c: initial_temp_c,
            elapsed_s: 0,
            last_purge_s: None,
            peak_temp_c: initial_temp_c,
        }
    }

    pub fn time_since_purge_s(&self) -> Option<u64> {
        self.last_purge_s
            .map(|last| self.elapsed_s.saturating_sub(last))
    }

    /// Seconds left in the post-purge window, or `None` outside it.
    ///
    /// The window is inclusive at both ends: a purge at `t` keeps it open
    /// through `t + window_s`.
    pub fn post_purge_remaining_s(&self, window_s: u64) -> Option<f64> {
        self.time_since_purge_s()
            .filter(|&since| since <= window_s)
            .map(|since| (window_s - since) as f64)
    }

    pub fn enforce_hot_side_floor(&mut self) {
        if self.hot_side_temp_c < self.temperature_c {
            self.hot_side_temp_c = self.temperature_c;
        }
    }

    pub fn record_peak(&mut self) {
        if self.temperature_c > self.peak_temp_c {
            self.peak_temp_c = self.temperature_c;
        }
    }
}

/// Coarse temperature classification used for threshold-crossing events.
///
/// Rising temperatures move up immediately, possibly skipping bands.
/// Falling temperatures only leave a band once they are `hysteresis_c`
/// below its threshold, so readings hovering at a boundary do not flap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThermalBand {
    Nominal,
    Warm,
    Emergency,
    Critical,
}

/// Thresholds separating the bands; each is the lower edge of the band
/// above it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandLimits {
    pub warm_c: f64,
    pub emergency_c: f64,
    pub critical_c: f64,
    pub hysteresis_c: f64,
}

impl ThermalBand {
    pub fn from_temperature(temp: f64, previous: ThermalBand, limits: &BandLimits) -> Self {
        let rising = Self::classify(temp, limits);
        if rising >= previous {
            return rising;
        }

        Self::classify(temp + limits.hysteresis_c, limits).min(previous)
    }

    fn classify(temp: f64, limits: &BandLimits) -> Self {
        if temp > limits.critical_c {
            ThermalBand::Critical
        } else if temp > limits.emergency_c {
            ThermalBand::Emergency
        } else if temp >= limits.warm_c {
            ThermalBand::Warm
        } else {
            ThermalBand::Nominal
        }
    }
}
