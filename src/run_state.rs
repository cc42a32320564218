use crate::grid::GridOracle;
use crate::scheduler::TaskHandle;
use contagion_common::{Position, SpreadParams};
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};

/// A cell the engine has set to the infected type, with the run tick it expires at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfectedCell {
    pub position: Position,
    pub expires_at_tick: u64,
}

/// Mutable state of a single propagation run.
///
/// Created by `ContagionEngine::start` and dropped on cancel, natural extinction
/// or a superseding start; dropping it is what clears the sets.
#[derive(Debug)]
pub struct RunState {
    pub run_id: u64,
    /// Advances by `params.tick_interval` at the top of every tick.
    pub tick_counter: u64,
    /// Parameter snapshot taken when the run started.
    pub params: SpreadParams,
    /// Cells currently infected, in infection order.
    pub active: IndexMap<Position, InfectedCell>,
    /// Cells still allowed to attempt spreading.
    pub frontier: VecDeque<InfectedCell>,
    /// Every position infected during this run. Never pruned.
    pub visited: HashSet<Position>,
    /// Cells of earlier runs whose deferred reversion has not been confirmed yet.
    /// This run never claims them.
    pub reserved: HashSet<Position>,
    /// Repeating timer driving this run, once registered.
    pub timer: Option<TaskHandle>,
}

impl RunState {
    pub fn new(run_id: u64, params: SpreadParams) -> Self {
        Self {
            run_id,
            tick_counter: 0,
            params,
            active: IndexMap::new(),
            frontier: VecDeque::new(),
            visited: HashSet::new(),
            reserved: HashSet::new(),
            timer: None,
        }
    }

    /// Marks `pos` infected at run tick `now`. No-op (returns `false`) if the
    /// position was already infected once during this run or is reserved.
    ///
    /// The write skips physics so the infected region keeps its shape.
    pub fn infect<G: GridOracle + ?Sized>(&mut self, grid: &mut G, pos: Position, now: u64) -> bool {
        if self.reserved.contains(&pos) || !self.visited.insert(pos) {
            return false;
        }
        grid.set_cell_type(pos, self.params.infected_type, false);
        let cell = InfectedCell {
            position: pos,
            expires_at_tick: now + self.params.lifetime_ticks,
        };
        let _ = self.active.insert(pos, cell);
        self.frontier.push_back(cell);
        true
    }

    /// Whether capacity allows one more infection right now.
    #[inline(always)]
    pub fn has_capacity(&self) -> bool {
        self.params.capacity.allows(self.active.len())
    }

    pub fn is_extinct(&self) -> bool {
        self.active.is_empty() && self.frontier.is_empty()
    }

    /// Empties the active set and frontier, returning the positions that were active.
    pub fn take_active_positions(&mut self) -> Vec<Position> {
        self.frontier.clear();
        self.active.drain(..).map(|(pos, _)| pos).collect()
    }
}
