use serde::Serialize;

/// Heat removed per mechanism over a run (J), measured after the fan
/// boost. `fan_boost_j` is the part of the total the fan added on top of
/// the unboosted contributions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CoolingLedger {
    pub passive_j: f64,
    pub conduction_j: f64,
    pub hiss_j: f64,
    pub purge_j: f64,
    pub peltier_j: f64,
    pub fan_boost_j: f64,
    pub heat_generated_j: f64,
}

/// Share of total removed heat, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LedgerShares {
    pub passive_pct: f64,
    pub conduction_pct: f64,
    pub hiss_pct: f64,
    pub purge_pct: f64,
    pub peltier_pct: f64,
}

impl CoolingLedger {
    pub fn total_removed_j(&self) -> f64 {
        self.passive_j + self.conduction_j + self.hiss_j + self.purge_j + self.peltier_j
    }

    pub fn shares(&self) -> LedgerShares {
        let total = self.total_removed_j();
        if total <= 0.0 {
            return LedgerShares::default();
        }
        let pct = |joules: f64| joules / total * 100.0;
        LedgerShares {
            passive_pct: pct(self.passive_j),
            conduction_pct: pct(self.conduction_j),
            hiss_pct: pct(self.hiss_j),
            purge_pct: pct(self.purge_j),
            peltier_pct: pct(self.peltier_j),
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Termination {
    /// Ran the full configured duration.
    Completed,
    BatteryDepleted,
    /// Both canisters spent with the supply configured to halt.
    CanistersExhausted,
}

/// Final report of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub termination: Termination,
    pub steps: u64,
    pub simulated_s: u64,
    pub final_temp_c: f64,
    pub peak_temp_c: f64,
    pub purge_count: u32,
    pub canister_swap_count: u32,
    pub refill_count: u32,
    pub active_canister: usize,
    pub canisters_j: [f64; 2],
    pub co2_spent_j: f64,
    pub battery_wh: f64,
    pub battery_fraction: f64,
    pub ledger: CoolingLedger,
    pub shares: LedgerShares,
}

impl Summary {
    pub fn remaining_co2_j(&self) -> f64 {
        self.canisters_j.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_compute_shares_of_removed_heat() {
        let ledger = CoolingLedger {
            passive_j: 300.0,
            hiss_j: 100.0,
            purge_j: 600.0,
            heat_generated_j: 5000.0,
            ..CoolingLedger::default()
        };

        let shares = ledger.shares();

        assert_eq!(ledger.total_removed_j(), 1000.0);
        assert_eq!(shares.passive_pct, 30.0);
        assert_eq!(shares.purge_pct, 60.0);
        assert_eq!(shares.peltier_pct, 0.0);
    }

    #[test]
    fn should_report_zero_shares_for_empty_ledger() {
        assert_eq!(CoolingLedger::default().shares(), LedgerShares::default());
    }
}
