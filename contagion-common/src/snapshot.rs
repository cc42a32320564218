use serde::{Deserialize, Serialize};

/// A snapshot of one contagion run at a specific host tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Host server tick at which the snapshot was taken.
    pub server_tick: u64,
    /// The run's own tick counter (advances by the tick interval per firing).
    pub run_tick: u64,
    /// Cells currently infected by the run.
    pub active: usize,
    /// Entries waiting in the frontier queue.
    pub frontier: usize,
    /// Distinct cells infected since the run started.
    pub visited: usize,
    /// Cells infected during the last engine tick.
    pub spread: usize,
    /// Cells reverted by expiry during the last engine tick.
    pub reverted: usize,
    /// Whether the run was still registered with the scheduler.
    pub running: bool,
}

/// Aggregate result of one scripted trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSummary {
    pub trial: u32,
    pub rng_seed: u64,
    pub seeded: usize,
    pub total_infected: usize,
    pub peak_active: usize,
    /// Server tick at which the run died out on its own, if it did.
    pub extinct_at_tick: Option<u64>,
    /// Server tick at which the script cancelled the run, if it did.
    pub cancelled_at_tick: Option<u64>,
    /// Infected cells left in the world after the trial finished (expected 0).
    pub residual_infected: usize,
}

/// Everything recorded for one trial: its summary plus the periodic snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub summary: TrialSummary,
    pub snapshots: Vec<Snapshot>,
}
