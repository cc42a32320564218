//! Spreading-contamination engine for voxel worlds.
//!
//! A [`ContagionEngine`] seeds infected cells around an origin, spreads them to
//! neighbouring cells each scheduler tick and reverts them once their lifetime
//! runs out. The world itself stays behind the [`GridOracle`] trait and the
//! periodic callback behind [`Scheduler`]; [`SandboxGrid`] and [`TickScheduler`]
//! are headless implementations of both.

pub mod engine;
pub mod grid;
pub mod host_tasks;
pub mod run_state;
pub mod sandbox;
pub mod scheduler;
pub mod spread;
pub mod trial;

pub use engine::{CancelReport, ContagionEngine, StartOutcome, TickReport, MAX_PER_TICK_OVERRIDE};
pub use grid::{revert_cells, Cells, GridOracle, RevertOutcome};
pub use host_tasks::{CleanupReport, HostTask, HostTaskSender, HostTasks, RevertCells};
pub use run_state::{InfectedCell, RunState};
pub use sandbox::{SandboxGrid, SandboxWorld, Terrain, WriteStats};
pub use scheduler::{Scheduler, TaskHandle, TickScheduler};
pub use spread::{ReapStats, SpreadStats};
pub use trial::run_trial;
