//! In-memory voxel host used by the headless driver and the tests.

use crate::grid::GridOracle;
use contagion_common::{Material, Position, SandboxConfig, WorldId};
use log::debug;
use std::collections::{HashMap, HashSet};

/// How a world's untouched cells are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terrain {
    /// Every cell inside `[0, size)` is `material`; everything else is air.
    Uniform { size: (i32, i32, i32), material: Material },
    /// Bedrock floor, stone, three layers of dirt and a grass surface at `surface_y`.
    Flat { width: i32, depth: i32, surface_y: i32 },
}

impl Terrain {
    fn generate(self, x: i32, y: i32, z: i32) -> Material {
        match self {
            Terrain::Uniform { size, material } => {
                let inside = (0..size.0).contains(&x) && (0..size.1).contains(&y) && (0..size.2).contains(&z);
                if inside { material } else { Material::Air }
            }
            Terrain::Flat { width, depth, surface_y } => {
                if !(0..width).contains(&x) || !(0..depth).contains(&z) || y < 0 || y > surface_y {
                    Material::Air
                } else if y == 0 {
                    Material::Bedrock
                } else if y == surface_y {
                    Material::GrassBlock
                } else if y >= surface_y - 3 {
                    Material::Dirt
                } else {
                    Material::Stone
                }
            }
        }
    }

    /// Box enclosing every generated non-air cell, as `(min, max_exclusive)` per axis.
    fn bounds(self) -> [(i32, i32); 3] {
        match self {
            Terrain::Uniform { size, .. } => [(0, size.0), (0, size.1), (0, size.2)],
            Terrain::Flat { width, depth, surface_y } => [(0, width), (0, surface_y + 1), (0, depth)],
        }
    }
}

/// A single world: generated terrain plus the cells written since.
#[derive(Debug, Clone)]
pub struct SandboxWorld {
    terrain: Terrain,
    edits: HashMap<(i32, i32, i32), Material>,
    loaded_chunks: HashSet<(i32, i32)>,
}

impl SandboxWorld {
    /// A world whose chunks covering the terrain box are all loaded.
    pub fn new(terrain: Terrain) -> Self {
        let [bx, _, bz] = terrain.bounds();
        let mut loaded_chunks = HashSet::new();
        for cx in (bx.0 >> 4)..=((bx.1 - 1).max(bx.0) >> 4) {
            for cz in (bz.0 >> 4)..=((bz.1 - 1).max(bz.0) >> 4) {
                let _ = loaded_chunks.insert((cx, cz));
            }
        }
        Self { terrain, edits: HashMap::new(), loaded_chunks }
    }

    fn get(&self, x: i32, y: i32, z: i32) -> Material {
        self.edits
            .get(&(x, y, z))
            .copied()
            .unwrap_or_else(|| self.terrain.generate(x, y, z))
    }

    fn put(&mut self, x: i32, y: i32, z: i32, material: Material) {
        if self.terrain.generate(x, y, z) == material {
            let _ = self.edits.remove(&(x, y, z));
        } else {
            let _ = self.edits.insert((x, y, z), material);
        }
    }

    fn count(&self, material: Material) -> usize {
        let [bx, by, bz] = self.terrain.bounds();
        let inside = |x: i32, y: i32, z: i32| {
            (bx.0..bx.1).contains(&x) && (by.0..by.1).contains(&y) && (bz.0..bz.1).contains(&z)
        };
        let mut total = 0;
        for x in bx.0..bx.1 {
            for y in by.0..by.1 {
                for z in bz.0..bz.1 {
                    if self.get(x, y, z) == material {
                        total += 1;
                    }
                }
            }
        }
        total
            + self
                .edits
                .iter()
                .filter(|(&(x, y, z), &m)| m == material && !inside(x, y, z))
                .count()
    }
}

/// Write counters, split by whether physics was requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub plain_writes: usize,
    pub physics_writes: usize,
    /// Falling blocks moved down into an opened cell.
    pub falls: usize,
    /// Cells refilled by adjacent water.
    pub flows: usize,
}

/// Multi-world voxel store implementing [`GridOracle`].
#[derive(Debug, Clone, Default)]
pub struct SandboxGrid {
    worlds: HashMap<WorldId, SandboxWorld>,
    stats: WriteStats,
}

impl SandboxGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// One world filled with `material` over `[0, sx) x [0, sy) x [0, sz)`, fully loaded.
    pub fn uniform(world: WorldId, sx: i32, sy: i32, sz: i32, material: Material) -> Self {
        let mut grid = Self::new();
        grid.add_world(world, SandboxWorld::new(Terrain::Uniform { size: (sx, sy, sz), material }));
        grid
    }

    /// Flat worlds built from the `[sandbox]` configuration table.
    pub fn flat(config: &SandboxConfig) -> Self {
        let width = config.width.max(1) as i32;
        let depth = config.depth.max(1) as i32;
        let surface_y = config.surface_y.max(1);
        let mut grid = Self::new();

        for id in 0..config.worlds.max(1) {
            let world = WorldId(id);
            let mut sandbox = SandboxWorld::new(Terrain::Flat { width, depth, surface_y });

            let center = ((width / 2) >> 4, (depth / 2) >> 4);
            let radius = config.loaded_chunk_radius as i32;
            sandbox
                .loaded_chunks
                .retain(|&(cx, cz)| (cx - center.0).abs() <= radius && (cz - center.1).abs() <= radius);

            if config.pond {
                // 3x3 pond, two deep, a few cells east of the centre
                let (px, pz) = (width / 2 + 4, depth / 2);
                for x in px..px + 3 {
                    for z in pz..pz + 3 {
                        sandbox.put(x, surface_y, z, Material::Water);
                        sandbox.put(x, surface_y - 1, z, Material::Water);
                    }
                }
            }

            debug!(
                "Sandbox {} ready: {}x{} columns, surface at y={}, {} chunk(s) loaded.",
                world,
                width,
                depth,
                surface_y,
                sandbox.loaded_chunks.len()
            );
            grid.add_world(world, sandbox);
        }
        grid
    }

    pub fn add_world(&mut self, world: WorldId, sandbox: SandboxWorld) {
        let _ = self.worlds.insert(world, sandbox);
    }

    pub fn remove_world(&mut self, world: WorldId) -> bool {
        self.worlds.remove(&world).is_some()
    }

    pub fn load_chunk(&mut self, world: WorldId, chunk: (i32, i32)) {
        if let Some(w) = self.worlds.get_mut(&world) {
            let _ = w.loaded_chunks.insert(chunk);
        }
    }

    pub fn unload_chunk(&mut self, world: WorldId, chunk: (i32, i32)) {
        if let Some(w) = self.worlds.get_mut(&world) {
            let _ = w.loaded_chunks.remove(&chunk);
        }
    }

    /// Number of cells of `material` across every world.
    pub fn count(&self, material: Material) -> usize {
        self.worlds.values().map(|w| w.count(material)).sum()
    }

    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    fn raw(&self, pos: Position) -> Material {
        self.worlds
            .get(&pos.world)
            .map_or(Material::Air, |w| w.get(pos.x, pos.y, pos.z))
    }

    fn put_raw(&mut self, pos: Position, material: Material) {
        if let Some(w) = self.worlds.get_mut(&pos.world) {
            w.put(pos.x, pos.y, pos.z, material);
        }
    }

    /// Reacts to a cell that just became `pos`'s new content.
    fn settle(&mut self, pos: Position) {
        if self.raw(pos).is_solid() {
            return;
        }

        // Unsupported falling blocks above slide down by one.
        let mut hole = pos;
        while let Some(above) = hole.above() {
            let falling = self.raw(above);
            if !falling.has_gravity() {
                break;
            }
            self.put_raw(hole, falling);
            self.put_raw(above, Material::Air);
            self.stats.falls += 1;
            hole = above;
        }

        // Adjacent water refills an emptied cell.
        if self.raw(hole).is_air() {
            let wet = [(0, 1, 0), (1, 0, 0), (-1, 0, 0), (0, 0, 1), (0, 0, -1)]
                .into_iter()
                .filter_map(|(dx, dy, dz)| hole.offset(dx, dy, dz))
                .any(|n| self.raw(n) == Material::Water);
            if wet {
                self.put_raw(hole, Material::Water);
                self.stats.flows += 1;
            }
        }
    }
}

impl GridOracle for SandboxGrid {
    fn contains_world(&self, world: WorldId) -> bool {
        self.worlds.contains_key(&world)
    }

    fn cell_type(&self, pos: Position) -> Material {
        self.raw(pos)
    }

    fn set_cell_type(&mut self, pos: Position, material: Material, physics: bool) {
        if !self.worlds.contains_key(&pos.world) {
            return;
        }
        self.put_raw(pos, material);
        if physics {
            self.stats.physics_writes += 1;
            self.settle(pos);
        } else {
            self.stats.plain_writes += 1;
        }
    }

    fn is_region_loaded(&self, pos: Position) -> bool {
        self.worlds
            .get(&pos.world)
            .is_some_and(|w| w.loaded_chunks.contains(&pos.chunk()))
    }
}
