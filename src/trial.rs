//! Scripted headless runs: one sandbox, one engine, driven tick by tick.

use crate::engine::{ContagionEngine, StartOutcome};
use crate::host_tasks::HostTasks;
use crate::sandbox::SandboxGrid;
use crate::scheduler::TickScheduler;
use contagion_common::{Position, ScenarioConfig, Snapshot, TrialRecord, TrialSummary, WorldId};
use log::{debug, info, warn};

/// Runs the `[run]` script of `config` against a fresh sandbox.
///
/// Each server tick the host first drains its task queue, then dispatches due
/// timers, then applies scripted commands. The trial ends on extinction, on the
/// scripted stop, or at `max_ticks` (which cancels whatever is still alive).
pub fn run_trial(config: &ScenarioConfig, trial: u32, rng_seed: u64) -> TrialRecord {
    let params = config.contagion.to_spread_params();
    let infected_type = params.infected_type;
    let mut grid = SandboxGrid::flat(&config.sandbox);
    let mut scheduler = TickScheduler::new();
    let host = HostTasks::new();
    let mut engine = ContagionEngine::with_seed(params, rng_seed);

    let run = &config.run;
    let origin = Position::new(WorldId(run.world), run.origin[0], run.origin[1], run.origin[2]);
    let per_tick_override = (run.per_tick_override > 0).then_some(run.per_tick_override);
    let record_every = config.output.record_interval_ticks.max(1);

    let mut summary = TrialSummary {
        trial,
        rng_seed,
        seeded: 0,
        total_infected: 0,
        peak_active: 0,
        extinct_at_tick: None,
        cancelled_at_tick: None,
        residual_infected: 0,
    };
    let mut snapshots = Vec::new();

    match engine.start(&mut grid, &mut scheduler, origin, run.effective_seed_radius(), per_tick_override) {
        StartOutcome::Started { seeded, .. } => summary.seeded = seeded,
        StartOutcome::WorldUnavailable => {
            warn!("Trial {}: {} is not loaded; nothing to infect.", trial, origin.world);
            return TrialRecord { summary, snapshots };
        }
    }
    summary.peak_active = engine.active_len();
    snapshots.push(snapshot(&engine, &scheduler, 0, 0));

    while scheduler.current_tick() < run.max_ticks {
        for report in host.drain(&mut grid) {
            engine.cleanup_completed(&report);
        }

        let mut spread = 0;
        let mut reverted = 0;
        for handle in scheduler.advance() {
            if let Some(report) = engine.on_timer(handle, &mut grid, &mut scheduler) {
                spread += report.spread;
                reverted += report.reverted;
                summary.total_infected = report.visited;
                summary.peak_active = summary.peak_active.max(report.active);
                if report.extinct {
                    summary.extinct_at_tick = Some(scheduler.current_tick());
                }
            }
        }

        let now = scheduler.current_tick();
        if run.stop_at_tick > 0 && now == run.stop_at_tick && engine.is_running() {
            summary.total_infected = summary.total_infected.max(engine.visited_len());
            let report = engine.cancel(&mut grid, &mut scheduler);
            debug!("Trial {}: scripted stop at tick {} reverted {} cell(s).", trial, now, report.reverted);
            summary.cancelled_at_tick = Some(now);
        }

        if now % record_every == 0 || !engine.is_running() {
            snapshots.push(snapshot(&engine, &scheduler, spread, reverted));
        }
        if !engine.is_running() {
            break;
        }
    }

    if engine.is_running() {
        summary.total_infected = summary.total_infected.max(engine.visited_len());
        let report = engine.cancel(&mut grid, &mut scheduler);
        warn!(
            "Trial {}: still alive after {} ticks; cancelled ({} cell(s) reverted).",
            trial, run.max_ticks, report.reverted
        );
        summary.cancelled_at_tick = Some(scheduler.current_tick());
        snapshots.push(snapshot(&engine, &scheduler, 0, report.reverted));
    }
    for report in host.drain(&mut grid) {
        engine.cleanup_completed(&report);
    }

    summary.total_infected = summary.total_infected.max(summary.seeded);
    summary.residual_infected = grid.count(infected_type);
    if summary.residual_infected > 0 {
        warn!("Trial {}: {} infected cell(s) left behind.", trial, summary.residual_infected);
    }
    info!(
        "Trial {} (seed {}): {} infected in total, peak {} active, ended at tick {}.",
        trial,
        rng_seed,
        summary.total_infected,
        summary.peak_active,
        scheduler.current_tick()
    );

    TrialRecord { summary, snapshots }
}

fn snapshot(engine: &ContagionEngine, scheduler: &TickScheduler, spread: usize, reverted: usize) -> Snapshot {
    Snapshot {
        server_tick: scheduler.current_tick(),
        run_tick: engine.tick_counter(),
        active: engine.active_len(),
        frontier: engine.frontier_len(),
        visited: engine.visited_len(),
        spread,
        reverted,
        running: engine.is_running(),
    }
}
