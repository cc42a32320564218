use crate::grid::{revert_cells, GridOracle};
use contagion_common::{Material, Position};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;

/// Work that must run on the host's main context, where the grid lives.
#[derive(Debug, Clone, PartialEq)]
pub enum HostTask {
    /// Final reversion of a cancelled run's remaining infected cells.
    RevertCells(RevertCells),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RevertCells {
    pub run_id: u64,
    pub cells: Vec<Position>,
    pub infected_type: Material,
    pub revert_type: Material,
}

/// Completion event for a [`HostTask::RevertCells`] task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub run_id: u64,
    pub reverted: usize,
    pub skipped: usize,
}

/// Cloneable, `Send` submission side of the host task queue.
#[derive(Debug, Clone)]
pub struct HostTaskSender {
    tx: Sender<HostTask>,
}

impl HostTaskSender {
    /// Queues a task. Returns `false` if the host side has been dropped.
    pub fn submit(&self, task: HostTask) -> bool {
        self.tx.send(task).is_ok()
    }
}

/// Main-context task queue. The host drains it once per server tick, before
/// dispatching timers and commands.
#[derive(Debug)]
pub struct HostTasks {
    tx: Sender<HostTask>,
    rx: Receiver<HostTask>,
}

impl Default for HostTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTasks {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> HostTaskSender {
        HostTaskSender { tx: self.tx.clone() }
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Runs every queued task against `grid`, in submission order.
    pub fn drain<G: GridOracle + ?Sized>(&self, grid: &mut G) -> Vec<CleanupReport> {
        let mut reports = Vec::new();
        while let Ok(task) = self.rx.try_recv() {
            match task {
                HostTask::RevertCells(job) => {
                    let outcome = revert_cells(grid, &job.cells, job.infected_type, job.revert_type);
                    debug!(
                        "Deferred cleanup of run {}: {} reverted, {} already altered.",
                        job.run_id, outcome.reverted, outcome.skipped
                    );
                    reports.push(CleanupReport {
                        run_id: job.run_id,
                        reverted: outcome.reverted,
                        skipped: outcome.skipped,
                    });
                }
            }
        }
        reports
    }
}
