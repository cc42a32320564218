use contagion_common::{sphere, Material, Position, WorldId};

/// Owned stream of positions; it holds no borrow of the grid, so cells can be
/// written while it is being consumed.
pub type Cells = Box<dyn Iterator<Item = Position>>;

/// Narrow view of the host's voxel storage.
///
/// The engine never owns the world: it only asks for cell types, writes cell types
/// and probes whether a region is addressable. Implementations decide what a
/// physics-enabled write does (fluids refilling, unsupported blocks falling).
pub trait GridOracle {
    /// Whether the host currently holds the given world.
    fn contains_world(&self, world: WorldId) -> bool;

    fn cell_type(&self, pos: Position) -> Material;

    /// Writes `material` at `pos`. With `physics` the host may react to the change.
    fn set_cell_type(&mut self, pos: Position, material: Material, physics: bool);

    /// Whether the region holding `pos` is loaded and may be read or written.
    fn is_region_loaded(&self, pos: Position) -> bool;

    /// Cells of the discrete sphere of `radius` around `origin`, produced lazily so
    /// callers can stop early.
    fn cells_within_radius(&self, origin: Position, radius: u32) -> Cells {
        Box::new(sphere(origin, radius))
    }

    fn neighbors6(&self, pos: Position) -> Cells {
        Box::new(pos.neighbors6())
    }
}

/// Result of reverting a batch of tracked cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevertOutcome {
    /// Cells that still bore the infected type and were reverted.
    pub reverted: usize,
    /// Cells already altered by something else; left untouched.
    pub skipped: usize,
}

/// Reverts every listed cell that still bears `infected` to `revert_to`, with physics.
pub fn revert_cells<G: GridOracle + ?Sized>(
    grid: &mut G,
    cells: &[Position],
    infected: Material,
    revert_to: Material,
) -> RevertOutcome {
    let mut outcome = RevertOutcome::default();
    for &pos in cells {
        if grid.cell_type(pos) == infected {
            grid.set_cell_type(pos, revert_to, true);
            outcome.reverted += 1;
        } else {
            outcome.skipped += 1;
        }
    }
    outcome
}
