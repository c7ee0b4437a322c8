use serde::Serialize;

/// Finite consumables: two interchangeable CO₂ canisters and a battery.
///
/// Canister energy stays within `[0, capacity]` and the battery never goes
/// negative. Every joule taken out of a canister is added to
/// `co2_spent_j`, and every joule put back by a refill to `co2_refilled_j`,
/// so `sum(canisters) + spent == initial + refilled` holds at all times.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceStore {
    canisters: [f64; 2],
    active: usize,
    canister_capacity_j: f64,
    battery_wh: f64,
    battery_capacity_wh: f64,
    purge_count: u32,
    swap_count: u32,
    refill_count: u32,
    co2_spent_j: f64,
    co2_refilled_j: f64,
}

impl ResourceStore {
    pub fn new(canister_capacity_j: f64, battery_capacity_wh: f64) -> Self {
        Self {
            canisters: [canister_capacity_j; 2],
            active: 0,
            canister_capacity_j,
            battery_wh: battery_capacity_wh,
            battery_capacity_wh,
            purge_count: 0,
            swap_count: 0,
            refill_count: 0,
            co2_spent_j: 0.0,
            co2_refilled_j: 0.0,
        }
    }

    pub fn canisters(&self) -> [f64; 2] {
        self.canisters
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_energy_j(&self) -> f64 {
        self.canisters[self.active]
    }

    pub fn other_energy_j(&self) -> f64 {
        self.canisters[1 - self.active]
    }

    pub fn canister_capacity_j(&self) -> f64 {
        self.canister_capacity_j
    }

    pub fn total_co2_j(&self) -> f64 {
        self.canisters.iter().sum()
    }

    pub fn battery_wh(&self) -> f64 {
        self.battery_wh
    }

    pub fn battery_capacity_wh(&self) -> f64 {
        self.battery_capacity_wh
    }

    pub fn battery_fraction(&self) -> f64 {
        if self.battery_capacity_wh > 0.0 {
            self.battery_wh / self.battery_capacity_wh
        } else {
            0.0
        }
    }

    pub fn battery_depleted(&self) -> bool {
        self.battery_wh <= 0.0
    }

    pub fn purge_count(&self) -> u32 {
        self.purge_count
    }

    pub fn swap_count(&self) -> u32 {
        self.swap_count
    }

    pub fn refill_count(&self) -> u32 {
        self.refill_count
    }

    pub fn co2_spent_j(&self) -> f64 {
        self.co2_spent_j
    }

    pub fn co2_refilled_j(&self) -> f64 {
        self.co2_refilled_j
    }

    /// Take up to `requested_j` from the active canister and return what
    /// was actually drawn.
    pub fn draw(&mut self, requested_j: f64) -> f64 {
        if requested_j <= 0.0 || !requested_j.is_finite() {
            return 0.0;
        }
        let pool = &mut self.canisters[self.active];
        let drawn = requested_j.min(*pool);
        *pool -= drawn;
        self.co2_spent_j += drawn;
        drawn
    }

    pub fn record_purge(&mut self) {
        self.purge_count += 1;
    }

    /// Make the other canister active. Returns the new active index.
    pub fn swap_to_other(&mut self) -> usize {
        self.active = 1 - self.active;
        self.swap_count += 1;
        self.active
    }

    /// Top both canisters up to capacity and make canister 0 active.
    pub fn refill(&mut self) {
        let added: f64 = self
            .canisters
            .iter()
            .map(|energy| self.canister_capacity_j - energy)
            .sum();
        self.canisters = [self.canister_capacity_j; 2];
        self.active = 0;
        self.refill_count += 1;
        self.co2_refilled_j += added;
    }

    /// Remove `energy_wh` from the battery, stopping at empty. Returns
    /// what was actually drained.
    pub fn drain_battery(&mut self, energy_wh: f64) -> f64 {
        if energy_wh <= 0.0 || !energy_wh.is_finite() {
            return 0.0;
        }
        let drained = energy_wh.min(self.battery_wh);
        self.battery_wh -= drained;
        drained
    }

    #[cfg(test)]
    pub fn set_canisters(&mut self, canisters: [f64; 2]) {
        self.canisters = canisters;
    }

    #[cfg(test)]
    pub fn set_battery_wh(&mut self, battery_wh: f64) {
        self.battery_wh = battery_wh;
    }
}
