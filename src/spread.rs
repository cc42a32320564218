//! Per-run propagation steps: seeding, expiry and frontier spreading.

use crate::grid::GridOracle;
use crate::run_state::RunState;
use contagion_common::spread_params::clamp_probability;
use contagion_common::Position;
use log::trace;
use rand::Rng;

/// Counters from one expiry pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapStats {
    /// Expired cells reverted to the post-expiry type.
    pub reverted: usize,
    /// Expired cells that had been altered externally and were just forgotten.
    pub stale: usize,
}

/// Counters from one spreading pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpreadStats {
    /// Frontier entries popped (bounded by `per_tick * 4`).
    pub dequeued: usize,
    /// Sources dropped because their cell no longer bears the infected type.
    pub dropped: usize,
    /// Successful infections.
    pub spawned: usize,
    /// Sources put back on the frontier for a later tick.
    pub requeued: usize,
}

impl RunState {
    /// Infects the eligible cells within `radius` of `origin`, capacity permitting.
    ///
    /// Enumeration stops as soon as the capacity is used up. When nothing
    /// qualifies, the origin cell alone is tried; that fallback only bypasses the
    /// capacity check while nothing is active yet.
    pub fn seed<G: GridOracle + ?Sized>(&mut self, grid: &mut G, origin: Position, radius: u32) -> usize {
        let now = self.tick_counter;
        let mut seeded = 0;

        for pos in grid.cells_within_radius(origin, radius) {
            if !self.has_capacity() {
                break;
            }
            if !self.params.is_eligible(grid.cell_type(pos)) {
                continue;
            }
            if self.infect(grid, pos, now) {
                seeded += 1;
            }
        }

        if seeded == 0
            && self.params.is_eligible(grid.cell_type(origin))
            && (self.active.is_empty() || self.has_capacity())
            && self.infect(grid, origin, now)
        {
            seeded = 1;
        }

        trace!("Run {} seeded {} cell(s) around {} (r={}).", self.run_id, seeded, origin, radius);
        seeded
    }

    /// Reverts every active cell whose lifetime has elapsed at run tick `now`.
    pub fn reap_expired<G: GridOracle + ?Sized>(&mut self, grid: &mut G, now: u64) -> ReapStats {
        let infected = self.params.infected_type;
        let revert_to = self.params.revert_type;
        let mut stats = ReapStats::default();

        self.active.retain(|_, cell| {
            if cell.expires_at_tick > now {
                return true;
            }
            if grid.cell_type(cell.position) == infected {
                // Physics on: fluids refill and unsupported blocks fall.
                grid.set_cell_type(cell.position, revert_to, true);
                stats.reverted += 1;
            } else {
                stats.stale += 1;
            }
            false
        });

        stats
    }

    /// Drains up to `per_tick` successful spreads from the frontier.
    ///
    /// Only entries queued before this tick are drained; cells infected now wait
    /// for the next tick. Sources that are still alive afterwards are collected on
    /// the side and appended once the drain loop ends, so each source is tried at
    /// most once per tick.
    pub fn spread<G, R>(&mut self, grid: &mut G, rng: &mut R, now: u64) -> SpreadStats
    where
        G: GridOracle + ?Sized,
        R: Rng + ?Sized,
    {
        let per_tick = self.params.per_tick as usize;
        let infected = self.params.infected_type;
        let chance = clamp_probability(self.params.spread_chance, 0.0);
        let mut guard = self.params.dequeue_guard();
        let mut queued = self.frontier.len();
        let mut stats = SpreadStats::default();
        let mut requeue = Vec::new();

        while stats.spawned < per_tick && guard > 0 && queued > 0 {
            let Some(source) = self.frontier.pop_front() else {
                break;
            };
            guard -= 1;
            queued -= 1;
            stats.dequeued += 1;

            if grid.cell_type(source.position) != infected {
                stats.dropped += 1;
                continue;
            }

            for neighbor in grid.neighbors6(source.position) {
                if !self.has_capacity() {
                    break;
                }
                if !rng.random_bool(chance) {
                    continue;
                }
                if !grid.is_region_loaded(neighbor) {
                    continue;
                }
                if !self.params.is_eligible(grid.cell_type(neighbor)) {
                    continue;
                }
                if self.infect(grid, neighbor, now) {
                    stats.spawned += 1;
                    if stats.spawned >= per_tick {
                        break;
                    }
                }
            }

            if source.expires_at_tick > now && grid.cell_type(source.position) == infected {
                requeue.push(source);
            }
        }

        stats.requeued = requeue.len();
        self.frontier.extend(requeue);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cells;
    use crate::sandbox::SandboxGrid;
    use contagion_common::{Capacity, Material, SpreadParams, WorldId};
    use std::cell::Cell;
    use std::rc::Rc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const W: WorldId = WorldId(0);

    fn params(per_tick: u32, chance: f64, capacity: Capacity) -> SpreadParams {
        SpreadParams::new([Material::Dirt], Material::Sculk, Material::Air, 40, 5, per_tick, chance, capacity)
    }

    #[test]
    fn seed_respects_capacity() {
        let mut grid = SandboxGrid::uniform(W, 8, 8, 8, Material::Dirt);
        let mut run = RunState::new(1, params(10, 1.0, Capacity::Limited(3)));
        let seeded = run.seed(&mut grid, Position::new(W, 4, 4, 4), 2);
        assert_eq!(seeded, 3);
        assert_eq!(grid.count(Material::Sculk), 3);
    }

    /// Host whose sphere enumeration comes back empty (e.g. nothing discovered yet).
    struct Undiscovered(SandboxGrid);

    impl GridOracle for Undiscovered {
        fn contains_world(&self, world: WorldId) -> bool {
            self.0.contains_world(world)
        }
        fn cell_type(&self, pos: Position) -> Material {
            self.0.cell_type(pos)
        }
        fn set_cell_type(&mut self, pos: Position, material: Material, physics: bool) {
            self.0.set_cell_type(pos, material, physics)
        }
        fn is_region_loaded(&self, pos: Position) -> bool {
            self.0.is_region_loaded(pos)
        }
        fn cells_within_radius(&self, _origin: Position, _radius: u32) -> Cells {
            Box::new(std::iter::empty())
        }
    }

    #[test]
    fn seed_falls_back_to_origin_ignoring_capacity_when_empty() {
        let mut grid = Undiscovered(SandboxGrid::uniform(W, 4, 4, 4, Material::Dirt));
        let origin = Position::new(W, 1, 1, 1);
        let mut run = RunState::new(1, params(10, 1.0, Capacity::Limited(0)));
        assert_eq!(run.seed(&mut grid, origin, 2), 1);
        assert_eq!(grid.cell_type(origin), Material::Sculk);
    }

    /// Host that counts how many sphere cells the caller actually pulled.
    struct CountingSphere {
        grid: SandboxGrid,
        pulled: Rc<Cell<usize>>,
    }

    impl GridOracle for CountingSphere {
        fn contains_world(&self, world: WorldId) -> bool {
            self.grid.contains_world(world)
        }
        fn cell_type(&self, pos: Position) -> Material {
            self.grid.cell_type(pos)
        }
        fn set_cell_type(&mut self, pos: Position, material: Material, physics: bool) {
            self.grid.set_cell_type(pos, material, physics)
        }
        fn is_region_loaded(&self, pos: Position) -> bool {
            self.grid.is_region_loaded(pos)
        }
        fn cells_within_radius(&self, origin: Position, radius: u32) -> Cells {
            let pulled = Rc::clone(&self.pulled);
            Box::new(contagion_common::sphere(origin, radius).inspect(move |_| pulled.set(pulled.get() + 1)))
        }
    }

    #[test]
    fn seed_stops_enumerating_once_capacity_is_used() {
        let pulled = Rc::new(Cell::new(0));
        let mut grid = CountingSphere {
            grid: SandboxGrid::uniform(W, 8, 8, 8, Material::Dirt),
            pulled: Rc::clone(&pulled),
        };
        let mut run = RunState::new(1, params(10, 1.0, Capacity::Limited(2)));
        assert_eq!(run.seed(&mut grid, Position::new(W, 4, 4, 4), 3), 2);
        assert_eq!(pulled.get(), 3, "two infections plus the cell that found capacity exhausted");
    }

    #[test]
    fn seed_without_eligible_cells_infects_nothing() {
        let mut barren = SandboxGrid::uniform(W, 4, 4, 4, Material::Stone);
        let mut run = RunState::new(2, params(10, 1.0, Capacity::Unlimited));
        assert_eq!(run.seed(&mut barren, Position::new(W, 1, 1, 1), 3), 0);
        assert!(run.is_extinct());
        assert_eq!(barren.count(Material::Sculk), 0);
    }

    #[test]
    fn reaper_reverts_only_cells_still_infected() {
        let mut grid = SandboxGrid::uniform(W, 4, 4, 4, Material::Dirt);
        let mut run = RunState::new(1, params(10, 0.0, Capacity::Unlimited));
        let a = Position::new(W, 0, 0, 0);
        let b = Position::new(W, 1, 0, 0);
        assert!(run.infect(&mut grid, a, 0));
        assert!(run.infect(&mut grid, b, 0));
        grid.set_cell_type(b, Material::Stone, false);

        assert_eq!(run.reap_expired(&mut grid, 39), ReapStats::default());
        let stats = run.reap_expired(&mut grid, 40);
        assert_eq!(stats, ReapStats { reverted: 1, stale: 1 });
        assert_eq!(grid.cell_type(a), Material::Air);
        assert_eq!(grid.cell_type(b), Material::Stone);
        assert!(run.active.is_empty());
    }

    #[test]
    fn reaper_reverts_with_physics() {
        let mut grid = SandboxGrid::uniform(W, 1, 3, 1, Material::Sand);
        let bottom = Position::new(W, 0, 0, 0);
        grid.set_cell_type(bottom, Material::Dirt, false);
        let mut run = RunState::new(1, params(10, 0.0, Capacity::Unlimited));
        assert!(run.infect(&mut grid, bottom, 0));
        let before = grid.stats();

        let stats = run.reap_expired(&mut grid, 40);
        assert_eq!(stats.reverted, 1);
        assert_eq!(grid.stats().physics_writes, before.physics_writes + 1);
        assert_eq!(grid.stats().falls, 2);
        assert_eq!(grid.cell_type(bottom), Material::Sand);
        assert_eq!(grid.cell_type(Position::new(W, 0, 2, 0)), Material::Air);
    }

    #[test]
    fn out_of_range_chance_is_clamped_when_spreading() {
        let mut grid = SandboxGrid::uniform(W, 8, 8, 8, Material::Dirt);
        let mut rng = StdRng::seed_from_u64(4);

        let mut certain = params(10, 1.0, Capacity::Unlimited);
        certain.spread_chance = 7.5;
        let mut run = RunState::new(1, certain);
        assert!(run.infect(&mut grid, Position::new(W, 4, 4, 4), 0));
        assert_eq!(run.spread(&mut grid, &mut rng, 5).spawned, 6);

        let mut broken = params(10, 1.0, Capacity::Unlimited);
        broken.spread_chance = f64::NAN;
        let mut run = RunState::new(2, broken);
        assert!(run.infect(&mut grid, Position::new(W, 1, 1, 1), 0));
        assert_eq!(run.spread(&mut grid, &mut rng, 5).spawned, 0);
    }

    #[test]
    fn spread_honours_per_tick_budget() {
        let mut grid = SandboxGrid::uniform(W, 16, 16, 16, Material::Dirt);
        let mut run = RunState::new(1, params(4, 1.0, Capacity::Unlimited));
        let mut rng = StdRng::seed_from_u64(7);
        assert!(run.infect(&mut grid, Position::new(W, 8, 8, 8), 0));

        let stats = run.spread(&mut grid, &mut rng, 5);
        assert_eq!(stats.spawned, 4);
        assert_eq!(stats.dequeued, 1);
        assert_eq!(run.active.len(), 5);
        // Four new cells plus the still-alive source.
        assert_eq!(run.frontier.len(), 5);
        assert_eq!(run.frontier.back().map(|c| c.position), Some(Position::new(W, 8, 8, 8)));
    }

    #[test]
    fn zero_chance_never_spreads_and_guard_bounds_dequeues() {
        let mut grid = SandboxGrid::uniform(W, 16, 16, 16, Material::Dirt);
        let mut run = RunState::new(1, params(2, 0.0, Capacity::Unlimited));
        let mut rng = StdRng::seed_from_u64(1);
        for x in 0..12 {
            assert!(run.infect(&mut grid, Position::new(W, x, 0, 0), 0));
        }

        let stats = run.spread(&mut grid, &mut rng, 5);
        assert_eq!(stats.spawned, 0);
        assert_eq!(stats.dequeued, 8, "guard is per_tick * 4");
        assert_eq!(run.frontier.len(), 12);
    }

    #[test]
    fn sources_altered_externally_are_dropped() {
        let mut grid = SandboxGrid::uniform(W, 8, 8, 8, Material::Dirt);
        let mut run = RunState::new(1, params(10, 1.0, Capacity::Unlimited));
        let mut rng = StdRng::seed_from_u64(3);
        let pos = Position::new(W, 4, 4, 4);
        assert!(run.infect(&mut grid, pos, 0));
        grid.set_cell_type(pos, Material::Stone, false);

        let stats = run.spread(&mut grid, &mut rng, 5);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.spawned, 0);
        assert!(run.frontier.is_empty());
    }

    #[test]
    fn expired_sources_are_not_requeued() {
        let mut grid = SandboxGrid::uniform(W, 8, 8, 8, Material::Stone);
        let mut run = RunState::new(1, params(10, 1.0, Capacity::Unlimited));
        let mut rng = StdRng::seed_from_u64(3);
        let pos = Position::new(W, 4, 4, 4);
        grid.set_cell_type(pos, Material::Dirt, false);
        assert!(run.infect(&mut grid, pos, 0));

        let stats = run.spread(&mut grid, &mut rng, 40);
        assert_eq!(stats.requeued, 0);
        assert!(run.frontier.is_empty());
        assert_eq!(run.active.len(), 1, "expiry is left to the reaper");
    }

    #[test]
    fn unloaded_regions_are_skipped() {
        let mut grid = SandboxGrid::uniform(W, 32, 4, 4, Material::Dirt);
        grid.unload_chunk(W, (1, 0));
        let mut run = RunState::new(1, params(10, 1.0, Capacity::Unlimited));
        let mut rng = StdRng::seed_from_u64(3);
        let edge = Position::new(W, 15, 1, 1);
        assert!(run.infect(&mut grid, edge, 0));

        let _ = run.spread(&mut grid, &mut rng, 5);
        assert!(!run.visited.contains(&Position::new(W, 16, 1, 1)));
        assert!(run.visited.contains(&Position::new(W, 14, 1, 1)));
    }

    #[test]
    fn new_infections_wait_for_next_tick() {
        let mut grid = SandboxGrid::uniform(W, 16, 1, 1, Material::Dirt);
        let mut run = RunState::new(1, params(100, 1.0, Capacity::Unlimited));
        let mut rng = StdRng::seed_from_u64(2);
        assert!(run.infect(&mut grid, Position::new(W, 0, 0, 0), 0));

        for now in [5, 10, 15] {
            let stats = run.spread(&mut grid, &mut rng, now);
            assert_eq!(stats.spawned, 1, "one new cell per tick along a one-cell-wide strip");
        }
        assert_eq!(run.visited.len(), 4);
    }

    #[test]
    fn capacity_stops_spreading() {
        let mut grid = SandboxGrid::uniform(W, 16, 16, 16, Material::Dirt);
        let mut run = RunState::new(1, params(100, 1.0, Capacity::Limited(3)));
        let mut rng = StdRng::seed_from_u64(9);
        assert!(run.infect(&mut grid, Position::new(W, 8, 8, 8), 0));

        let stats = run.spread(&mut grid, &mut rng, 5);
        assert_eq!(stats.spawned, 2);
        assert_eq!(run.active.len(), 3);
    }
}
