use crate::grid::{revert_cells, GridOracle};
use crate::host_tasks::{CleanupReport, HostTask, HostTaskSender, RevertCells};
use crate::run_state::RunState;
use crate::scheduler::{Scheduler, TaskHandle};
use contagion_common::{Position, SpreadParams};
use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;

/// Ceiling applied to a caller-supplied per-tick override.
pub const MAX_PER_TICK_OVERRIDE: u32 = 4000;

/// Result of [`ContagionEngine::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { run_id: u64, seeded: usize },
    /// The origin's world is not held by the grid; nothing changed.
    WorldUnavailable,
}

/// Result of an inline [`ContagionEngine::cancel`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CancelReport {
    pub was_running: bool,
    pub run_id: Option<u64>,
    pub reverted: usize,
    /// Tracked cells that had already been altered externally.
    pub skipped: usize,
}

/// What happened during one engine tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub run_id: u64,
    pub run_tick: u64,
    pub reverted: usize,
    pub stale: usize,
    pub dequeued: usize,
    pub dropped: usize,
    pub spread: usize,
    pub active: usize,
    pub frontier: usize,
    pub visited: usize,
    /// The run died out this tick and cancelled itself.
    pub extinct: bool,
}

/// Drives at most one contagion run at a time.
///
/// All grid access happens through the [`GridOracle`] handed to each call, so the
/// engine only ever owns bounded sets of positions.
#[derive(Debug)]
pub struct ContagionEngine {
    params: SpreadParams,
    rng: StdRng,
    run: Option<RunState>,
    runs_started: u64,
    /// Cells handed to the host by `cancel_deferred`, keyed by run id, until the
    /// host confirms the cleanup.
    awaiting_cleanup: HashMap<u64, Vec<Position>>,
}

impl ContagionEngine {
    pub fn new(params: SpreadParams, rng: StdRng) -> Self {
        Self {
            params,
            rng,
            run: None,
            runs_started: 0,
            awaiting_cleanup: HashMap::new(),
        }
    }

    pub fn with_seed(params: SpreadParams, seed: u64) -> Self {
        Self::new(params, StdRng::seed_from_u64(seed))
    }

    /// Replaces the configured parameters. A run in progress keeps its snapshot;
    /// the new values apply from the next `start`.
    pub fn reload(&mut self, params: SpreadParams) {
        debug!("Contagion parameters reloaded: {:?}", params);
        self.params = params;
    }

    pub fn params(&self) -> &SpreadParams {
        &self.params
    }

    /// Parameters the current run was started with.
    pub fn run_params(&self) -> Option<&SpreadParams> {
        self.run.as_ref().map(|run| &run.params)
    }

    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub fn run_id(&self) -> Option<u64> {
        self.run.as_ref().map(|run| run.run_id)
    }

    pub fn timer(&self) -> Option<TaskHandle> {
        self.run.as_ref().and_then(|run| run.timer)
    }

    pub fn tick_counter(&self) -> u64 {
        self.run.as_ref().map_or(0, |run| run.tick_counter)
    }

    pub fn active_len(&self) -> usize {
        self.run.as_ref().map_or(0, |run| run.active.len())
    }

    pub fn frontier_len(&self) -> usize {
        self.run.as_ref().map_or(0, |run| run.frontier.len())
    }

    pub fn visited_len(&self) -> usize {
        self.run.as_ref().map_or(0, |run| run.visited.len())
    }

    pub fn is_active(&self, pos: Position) -> bool {
        self.run.as_ref().is_some_and(|run| run.active.contains_key(&pos))
    }

    pub fn has_visited(&self, pos: Position) -> bool {
        self.run.as_ref().is_some_and(|run| run.visited.contains(&pos))
    }

    /// Number of deferred cleanups the host has not confirmed yet.
    pub fn awaiting_cleanup(&self) -> usize {
        self.awaiting_cleanup.len()
    }

    /// Positions currently infected by the run, in infection order.
    pub fn active_positions(&self) -> Vec<Position> {
        self.run
            .as_ref()
            .map(|run| run.active.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Starts a new run seeded around `origin`, replacing any run in progress.
    ///
    /// `per_tick_override` of `None` or `Some(0)` keeps the configured budget;
    /// larger values are capped at [`MAX_PER_TICK_OVERRIDE`].
    pub fn start<G, S>(
        &mut self,
        grid: &mut G,
        scheduler: &mut S,
        origin: Position,
        seed_radius: u32,
        per_tick_override: Option<u32>,
    ) -> StartOutcome
    where
        G: GridOracle + ?Sized,
        S: Scheduler + ?Sized,
    {
        if !grid.contains_world(origin.world) {
            return StartOutcome::WorldUnavailable;
        }

        let _ = self.cancel(grid, scheduler);

        let mut params = self.params.clone();
        if let Some(n) = per_tick_override.filter(|&n| n > 0) {
            params.per_tick = n.min(MAX_PER_TICK_OVERRIDE);
        }

        self.runs_started += 1;
        let mut run = RunState::new(self.runs_started, params);
        run.reserved = self.awaiting_cleanup.values().flatten().copied().collect();
        let seeded = run.seed(grid, origin, seed_radius);
        run.timer = Some(scheduler.schedule_repeating(run.params.tick_interval));

        debug!(
            "Run {} started at {} (radius {}, per-tick {}): {} cell(s) seeded.",
            run.run_id, origin, seed_radius, run.params.per_tick, seeded
        );
        let run_id = run.run_id;
        self.run = Some(run);
        StartOutcome::Started { run_id, seeded }
    }

    /// Scheduler callback. Firings for any handle other than the current run's
    /// timer are stale and ignored.
    pub fn on_timer<G, S>(&mut self, handle: TaskHandle, grid: &mut G, scheduler: &mut S) -> Option<TickReport>
    where
        G: GridOracle + ?Sized,
        S: Scheduler + ?Sized,
    {
        let run = self.run.as_mut()?;
        if run.timer != Some(handle) {
            trace!("Ignoring stale timer {:?}.", handle);
            return None;
        }

        run.tick_counter += run.params.tick_interval as u64;
        let now = run.tick_counter;

        let reaped = run.reap_expired(grid, now);
        let spread = run.spread(grid, &mut self.rng, now);
        let extinct = run.is_extinct();

        let report = TickReport {
            run_id: run.run_id,
            run_tick: now,
            reverted: reaped.reverted,
            stale: reaped.stale,
            dequeued: spread.dequeued,
            dropped: spread.dropped,
            spread: spread.spawned,
            active: run.active.len(),
            frontier: run.frontier.len(),
            visited: run.visited.len(),
            extinct,
        };
        trace!("{:?}", report);

        if extinct {
            debug!("Run {} died out at run tick {} after {} infection(s).", report.run_id, now, report.visited);
            let _ = self.cancel(grid, scheduler);
        }
        Some(report)
    }

    /// Stops the run and reverts every cell it still holds infected, inline.
    /// Safe to call when idle.
    pub fn cancel<G, S>(&mut self, grid: &mut G, scheduler: &mut S) -> CancelReport
    where
        G: GridOracle + ?Sized,
        S: Scheduler + ?Sized,
    {
        let Some(mut run) = self.run.take() else {
            return CancelReport::default();
        };
        if let Some(timer) = run.timer.take() {
            scheduler.cancel(timer);
        }

        let cells = run.take_active_positions();
        let outcome = revert_cells(grid, &cells, run.params.infected_type, run.params.revert_type);
        debug!(
            "Run {} cancelled at run tick {}: {} reverted, {} already altered.",
            run.run_id, run.tick_counter, outcome.reverted, outcome.skipped
        );

        CancelReport {
            was_running: true,
            run_id: Some(run.run_id),
            reverted: outcome.reverted,
            skipped: outcome.skipped,
        }
    }

    /// Stops the run from outside the grid's execution context.
    ///
    /// The timer is unregistered immediately; reverting the remaining cells is
    /// submitted to the host as a [`HostTask::RevertCells`] and completes when the
    /// host drains its queue. Returns whether a run was active.
    pub fn cancel_deferred<S>(&mut self, scheduler: &mut S, host: &HostTaskSender) -> bool
    where
        S: Scheduler + ?Sized,
    {
        let Some(mut run) = self.run.take() else {
            return false;
        };
        if let Some(timer) = run.timer.take() {
            scheduler.cancel(timer);
        }

        let cells = run.take_active_positions();
        let pending = cells.len();
        if pending > 0 {
            let task = HostTask::RevertCells(RevertCells {
                run_id: run.run_id,
                cells: cells.clone(),
                infected_type: run.params.infected_type,
                revert_type: run.params.revert_type,
            });
            if host.submit(task) {
                let _ = self.awaiting_cleanup.insert(run.run_id, cells);
            } else {
                warn!("Host task queue closed; {} infected cell(s) of run {} left in place.", pending, run.run_id);
            }
        }
        debug!("Run {} cancelled; cleanup of {} cell(s) deferred to host.", run.run_id, pending);
        true
    }

    /// Host confirmation that a deferred cleanup ran. The cancelled run's cells
    /// become claimable again, including by a run already in progress.
    pub fn cleanup_completed(&mut self, report: &CleanupReport) {
        let Some(cells) = self.awaiting_cleanup.remove(&report.run_id) else {
            return;
        };
        if let Some(run) = self.run.as_mut() {
            for pos in &cells {
                let _ = run.reserved.remove(pos);
            }
        }
        trace!("Cleanup of run {} confirmed ({} cell(s) released).", report.run_id, cells.len());
    }
}
