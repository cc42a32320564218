use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The type of a single voxel cell.
///
/// Names follow the host world's material identifiers, so configuration files can
/// list `"GRASS_BLOCK"`, `"grass_block"` or `"minecraft:grass_block"` interchangeably.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Material {
    Air,
    Stone,
    Deepslate,
    Cobblestone,
    Dirt,
    GrassBlock,
    Sand,
    Gravel,
    Clay,
    Water,
    Lava,
    OakLog,
    OakLeaves,
    Netherrack,
    Sculk,
    Moss,
    Bedrock,
}

impl Material {
    /// Every material, in declaration order.
    pub const ALL: [Material; 17] = [
        Material::Air,
        Material::Stone,
        Material::Deepslate,
        Material::Cobblestone,
        Material::Dirt,
        Material::GrassBlock,
        Material::Sand,
        Material::Gravel,
        Material::Clay,
        Material::Water,
        Material::Lava,
        Material::OakLog,
        Material::OakLeaves,
        Material::Netherrack,
        Material::Sculk,
        Material::Moss,
        Material::Bedrock,
    ];

    /// Canonical upper-case identifier, e.g. `GRASS_BLOCK`.
    pub fn name(self) -> &'static str {
        match self {
            Material::Air => "AIR",
            Material::Stone => "STONE",
            Material::Deepslate => "DEEPSLATE",
            Material::Cobblestone => "COBBLESTONE",
            Material::Dirt => "DIRT",
            Material::GrassBlock => "GRASS_BLOCK",
            Material::Sand => "SAND",
            Material::Gravel => "GRAVEL",
            Material::Clay => "CLAY",
            Material::Water => "WATER",
            Material::Lava => "LAVA",
            Material::OakLog => "OAK_LOG",
            Material::OakLeaves => "OAK_LEAVES",
            Material::Netherrack => "NETHERRACK",
            Material::Sculk => "SCULK",
            Material::Moss => "MOSS",
            Material::Bedrock => "BEDROCK",
        }
    }

    /// Case-insensitive lookup that tolerates a `minecraft:` namespace prefix.
    pub fn match_name(raw: &str) -> Option<Material> {
        let trimmed = raw.trim();
        let bare = trimmed
            .strip_prefix("minecraft:")
            .or_else(|| trimmed.strip_prefix("MINECRAFT:"))
            .unwrap_or(trimmed);
        let wanted = bare.to_ascii_uppercase().replace([' ', '-'], "_");
        Material::ALL.into_iter().find(|m| m.name() == wanted)
    }

    pub fn is_air(self) -> bool {
        self == Material::Air
    }

    pub fn is_liquid(self) -> bool {
        matches!(self, Material::Water | Material::Lava)
    }

    /// Whether the material occupies its cell (supports blocks resting on it).
    pub fn is_solid(self) -> bool {
        !self.is_air() && !self.is_liquid()
    }

    /// Whether the material falls when the cell below it stops being solid.
    pub fn has_gravity(self) -> bool {
        matches!(self, Material::Sand | Material::Gravel)
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Material {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Material::match_name(s).ok_or_else(|| anyhow::anyhow!("unknown material '{}'", s))
    }
}
