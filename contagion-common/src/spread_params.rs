use crate::material::Material;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ceiling on the number of simultaneously infected cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capacity {
    Unlimited,
    Limited(usize),
}

impl Capacity {
    /// Interprets a raw ceiling: `<= 0` disables it, anything else is taken as-is.
    pub fn from_ceiling(ceiling: i64) -> Self {
        if ceiling <= 0 {
            Capacity::Unlimited
        } else {
            Capacity::Limited(ceiling as usize)
        }
    }

    /// Whether one more cell may be infected while `active` cells are alive.
    #[inline(always)]
    pub fn allows(self, active: usize) -> bool {
        match self {
            Capacity::Unlimited => true,
            Capacity::Limited(max) => active < max,
        }
    }

    pub fn is_unlimited(self) -> bool {
        matches!(self, Capacity::Unlimited)
    }
}

/// Runtime spread parameters resolved from the configuration and snapshotted per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadParams {
    // Policy
    pub target_types: BTreeSet<Material>,
    pub infected_type: Material,
    pub revert_type: Material,

    // Timing (in host ticks)
    pub lifetime_ticks: u64,
    pub tick_interval: u32,

    // Budget
    pub per_tick: u32,
    pub spread_chance: f64, // Probability per neighbour attempt
    pub capacity: Capacity,
}

impl SpreadParams {
    /// Builds parameters, enforcing only the structural minimums
    /// (interval >= 1, per-tick >= 1, probability within [0, 1]).
    pub fn new(
        target_types: impl IntoIterator<Item = Material>,
        infected_type: Material,
        revert_type: Material,
        lifetime_ticks: u64,
        tick_interval: u32,
        per_tick: u32,
        spread_chance: f64,
        capacity: Capacity,
    ) -> Self {
        Self {
            target_types: target_types.into_iter().collect(),
            infected_type,
            revert_type,
            lifetime_ticks,
            tick_interval: tick_interval.max(1),
            per_tick: per_tick.max(1),
            spread_chance: clamp_probability(spread_chance, 0.0),
            capacity,
        }
    }

    /// A cell is eligible iff its type is targeted and it is not already infected.
    #[inline(always)]
    pub fn is_eligible(&self, current: Material) -> bool {
        current != self.infected_type && self.target_types.contains(&current)
    }

    /// Upper bound on frontier dequeues per tick.
    #[inline(always)]
    pub fn dequeue_guard(&self) -> u64 {
        self.per_tick as u64 * 4
    }
}

/// Clamps into [0, 1]; non-finite input is replaced with `fallback`.
pub fn clamp_probability(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback.clamp(0.0, 1.0)
    }
}
