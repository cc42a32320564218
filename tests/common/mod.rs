#![allow(dead_code)]

use contagion_common::{Material, Position, WorldId};
use contagion_engine::{ContagionEngine, GridOracle, SandboxGrid, TickReport, TickScheduler};
use std::collections::HashMap;

pub const W: WorldId = WorldId(0);

/// Sandbox wrapper that counts how often each cell was written with a given material.
pub struct RecordingGrid {
    pub inner: SandboxGrid,
    pub watched: Material,
    pub writes: HashMap<Position, usize>,
}

impl RecordingGrid {
    pub fn new(inner: SandboxGrid, watched: Material) -> Self {
        Self { inner, watched, writes: HashMap::new() }
    }

    pub fn max_writes_per_cell(&self) -> usize {
        self.writes.values().copied().max().unwrap_or(0)
    }
}

impl GridOracle for RecordingGrid {
    fn contains_world(&self, world: WorldId) -> bool {
        self.inner.contains_world(world)
    }

    fn cell_type(&self, pos: Position) -> Material {
        self.inner.cell_type(pos)
    }

    fn set_cell_type(&mut self, pos: Position, material: Material, physics: bool) {
        if material == self.watched {
            *self.writes.entry(pos).or_default() += 1;
        }
        self.inner.set_cell_type(pos, material, physics);
    }

    fn is_region_loaded(&self, pos: Position) -> bool {
        self.inner.is_region_loaded(pos)
    }
}

/// Advances the clock until the engine's timer fires once (or `limit` server ticks pass).
pub fn fire_once<G: GridOracle>(
    engine: &mut ContagionEngine,
    grid: &mut G,
    scheduler: &mut TickScheduler,
    limit: u32,
) -> Option<TickReport> {
    for _ in 0..limit {
        for handle in scheduler.advance() {
            if let Some(report) = engine.on_timer(handle, grid, scheduler) {
                return Some(report);
            }
        }
    }
    None
}
