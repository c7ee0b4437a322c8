use std::collections::VecDeque;

use crate::config::HardwareConfig;

/// Sliding-window filter for rig temperature sensor readings.
///
/// Rejects readings outside the sensor's plausible range, and readings
/// that deviate too far from the moving average of recently accepted
/// ones. A CO₂ purge legitimately drops the device temperature by several
/// degrees in one go, so after `max_rejections` consecutive outliers the
/// window is discarded and the next in-range reading is taken as the new
/// baseline.
#[derive(Debug, Clone)]
pub struct TemperatureFilter {
    window: VecDeque<f32>,
    window_size: u8,
    max_deviation_c: f32,
    valid_range: (f32, f32),
    max_rejections: u8,
    rejections: u8,
}

impl TemperatureFilter {
    /// # Arguments
    /// * `window_size` - Number of recent readings in the moving average
    /// * `max_deviation_c` - Maximum allowed deviation from that average (°C)
    pub fn new(window_size: u8, max_deviation_c: f32) -> Self {
        Self {
            window: VecDeque::with_capacity(window_size as usize),
            window_size: window_size.max(1),
            max_deviation_c,
            valid_range: (-20.0, 110.0),
            max_rejections: u8::MAX,
            rejections: 0,
        }
    }

    pub fn from_config(config: &HardwareConfig) -> Self {
        Self::new(config.filter_window, config.filter_max_deviation_c)
            .with_valid_range(config.sensor_min_c, config.sensor_max_c)
            .with_max_rejections(config.filter_max_rejections)
    }

    pub fn with_valid_range(mut self, min_c: f32, max_c: f32) -> Self {
        self.valid_range = (min_c, max_c);
        self
    }

    pub fn with_max_rejections(mut self, max_rejections: u8) -> Self {
        self.max_rejections = max_rejections.max(1);
        self
    }

    /// Considers a new reading; returns `Some(temp)` if accepted, `None` if
    /// rejected as noise.
    pub fn consider(&mut self, temp: f32) -> Option<f32> {
        let (min_c, max_c) = self.valid_range;
        if !(min_c..=max_c).contains(&temp) {
            return None;
        }

        if !self.window.is_empty() {
            let avg = self.window.iter().sum::<f32>() / self.window.len() as f32;
            if (temp - avg).abs() > self.max_deviation_c {
                self.rejections = self.rejections.saturating_add(1);
                if self.rejections < self.max_rejections {
                    return None;
                }
                self.window.clear();
            }
        }

        self.rejections = 0;
        if self.window.len() == self.window_size as usize {
            self.window.pop_front();
        }
        self.window.push_back(temp);

        Some(temp)
    }
}
