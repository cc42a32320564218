use crate::material::Material;
use crate::spread_params::{clamp_probability, Capacity, SpreadParams};
use anyhow::Result;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MIN_LIFETIME_TICKS: i64 = 40;
pub const MIN_CAPACITY_CEILING: i64 = 100;
pub const DEFAULT_SPREAD_CHANCE: f64 = 0.45;
pub const DEFAULT_MAX_RADIUS: u32 = 64;

// Spread policy for the contagion effect, loaded from the [contagion] table.
// Values are raw: clamping happens in `to_spread_params`, never at parse time.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ContagionConfig {
    #[serde(default = "default_target_types")]
    pub target_types: Vec<String>,
    #[serde(default = "default_infected_type")]
    pub infected_type: String,
    #[serde(default = "default_revert_type")]
    pub revert_type: String,
    #[serde(default = "default_lifetime_ticks")]
    pub lifetime_ticks: i64,
    #[serde(default = "default_tick_interval")]
    pub tick_interval: i64,
    #[serde(default = "default_per_tick")]
    pub per_tick: i64,
    #[serde(default = "default_spread_chance")]
    pub spread_chance: f64,
    #[serde(default = "default_max_active")]
    pub max_active: i64, // <= 0 means unlimited
    #[serde(default)]
    pub seed: Option<u64>,
}

// Headless host world used by the driver, loaded from the [sandbox] table.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SandboxConfig {
    #[serde(default = "default_extent")]
    pub width: u32,
    #[serde(default = "default_extent")]
    pub depth: u32,
    #[serde(default = "default_surface_y")]
    pub surface_y: i32,
    #[serde(default = "default_loaded_chunk_radius")]
    pub loaded_chunk_radius: u32,
    #[serde(default = "default_worlds")]
    pub worlds: u32,
    #[serde(default)]
    pub pond: bool, // Carve a small water pond next to the origin
}

// Driver script, loaded from the [run] table.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunConfig {
    #[serde(default = "default_origin")]
    pub origin: [i32; 3],
    #[serde(default)]
    pub world: u32,
    #[serde(default = "default_seed_radius")]
    pub seed_radius: u32,
    #[serde(default = "default_max_radius")]
    pub max_radius: u32, // Upper bound applied to seed_radius
    #[serde(default)]
    pub per_tick_override: u32, // 0 = use [contagion].per_tick
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
    #[serde(default)]
    pub stop_at_tick: u64, // 0 = never
    #[serde(default = "default_trials")]
    pub trials: u32,
}

// Configuration for output settings, loaded from the [output] table.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_base_filename")]
    pub base_filename: String,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
    #[serde(default = "default_true")]
    pub save_stats: bool,
    #[serde(default = "default_true")]
    pub save_summary: bool,
    #[serde(default = "default_record_interval_ticks")]
    pub record_interval_ticks: u64,
}

// Main scenario configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub contagion: ContagionConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl ScenarioConfig {
    /// Loads the scenario configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: ScenarioConfig = toml::from_str(raw)?;
        Ok(config)
    }
}

impl ContagionConfig {
    /// Resolves the raw policy into runtime parameters. Never fails: out-of-range
    /// numbers are clamped and unknown material names are skipped or defaulted.
    pub fn to_spread_params(&self) -> SpreadParams {
        let mut target_types = Vec::with_capacity(self.target_types.len());
        for name in &self.target_types {
            match Material::match_name(name) {
                Some(m) => target_types.push(m),
                None => warn!("Ignoring unknown target material '{}'.", name),
            }
        }

        let infected_type = resolve_material(&self.infected_type, Material::Sculk, "infected_type");
        let revert_type = resolve_material(&self.revert_type, Material::Air, "revert_type");

        let lifetime_ticks = self.lifetime_ticks.max(MIN_LIFETIME_TICKS) as u64;
        let tick_interval = clamp_to_u32(self.tick_interval.max(1));
        let per_tick = clamp_to_u32(self.per_tick.max(1));
        let spread_chance = clamp_probability(self.spread_chance, DEFAULT_SPREAD_CHANCE);
        let capacity = if self.max_active <= 0 {
            Capacity::Unlimited
        } else {
            Capacity::from_ceiling(self.max_active.max(MIN_CAPACITY_CEILING))
        };

        SpreadParams {
            target_types: target_types.into_iter().collect(),
            infected_type,
            revert_type,
            lifetime_ticks,
            tick_interval,
            per_tick,
            spread_chance,
            capacity,
        }
    }
}

impl RunConfig {
    /// The seed radius to start with, capped at `max_radius`.
    pub fn effective_seed_radius(&self) -> u32 {
        if self.seed_radius > self.max_radius {
            warn!(
                "seed_radius {} exceeds max_radius {}; using {}.",
                self.seed_radius, self.max_radius, self.max_radius
            );
            self.max_radius
        } else {
            self.seed_radius
        }
    }
}

fn resolve_material(raw: &str, fallback: Material, field: &str) -> Material {
    Material::match_name(raw).unwrap_or_else(|| {
        warn!("Unknown {} '{}', falling back to {}.", field, raw, fallback);
        fallback
    })
}

fn clamp_to_u32(value: i64) -> u32 {
    value.min(u32::MAX as i64) as u32
}

impl Default for ContagionConfig {
    fn default() -> Self {
        ContagionConfig {
            target_types: default_target_types(),
            infected_type: default_infected_type(),
            revert_type: default_revert_type(),
            lifetime_ticks: default_lifetime_ticks(),
            tick_interval: default_tick_interval(),
            per_tick: default_per_tick(),
            spread_chance: default_spread_chance(),
            max_active: default_max_active(),
            seed: None,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig {
            width: default_extent(),
            depth: default_extent(),
            surface_y: default_surface_y(),
            loaded_chunk_radius: default_loaded_chunk_radius(),
            worlds: default_worlds(),
            pond: false,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            origin: default_origin(),
            world: 0,
            seed_radius: default_seed_radius(),
            max_radius: default_max_radius(),
            per_tick_override: 0,
            max_ticks: default_max_ticks(),
            stop_at_tick: 0,
            trials: default_trials(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: default_base_filename(),
            format: None,
            save_stats: true,
            save_summary: true,
            record_interval_ticks: default_record_interval_ticks(),
        }
    }
}

// Default functions
fn default_target_types() -> Vec<String> {
    ["GRASS_BLOCK", "DIRT", "STONE", "SAND", "GRAVEL", "MOSS"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_infected_type() -> String {
    "SCULK".to_string()
}

fn default_revert_type() -> String {
    "AIR".to_string()
}

fn default_lifetime_ticks() -> i64 {
    200
}

fn default_tick_interval() -> i64 {
    5
}

fn default_per_tick() -> i64 {
    120
}

fn default_spread_chance() -> f64 {
    DEFAULT_SPREAD_CHANCE
}

fn default_max_active() -> i64 {
    6000
}

fn default_extent() -> u32 {
    64
}

fn default_surface_y() -> i32 {
    8
}

fn default_loaded_chunk_radius() -> u32 {
    2
}

fn default_worlds() -> u32 {
    1
}

fn default_origin() -> [i32; 3] {
    [32, 8, 32]
}

fn default_seed_radius() -> u32 {
    2
}

fn default_max_radius() -> u32 {
    DEFAULT_MAX_RADIUS
}

fn default_max_ticks() -> u64 {
    4000
}

fn default_trials() -> u32 {
    1
}

fn default_base_filename() -> String {
    "contagion".to_string()
}

fn default_true() -> bool {
    true
}

fn default_record_interval_ticks() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = ScenarioConfig::from_toml_str("").expect("empty TOML parses");
        let params = config.contagion.to_spread_params();
        assert_eq!(params.infected_type, Material::Sculk);
        assert_eq!(params.revert_type, Material::Air);
        assert_eq!(params.lifetime_ticks, 200);
        assert_eq!(params.tick_interval, 5);
        assert_eq!(params.per_tick, 120);
        assert_eq!(params.capacity, Capacity::Limited(6000));
        assert!(params.target_types.contains(&Material::GrassBlock));
        assert_eq!(config.run.seed_radius, 2);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = ScenarioConfig::from_toml_str(
            r#"
            [contagion]
            lifetime_ticks = 3
            tick_interval = -2
            per_tick = 0
            spread_chance = 7.5
            max_active = 12
            "#,
        )
        .expect("valid TOML");
        let params = config.contagion.to_spread_params();
        assert_eq!(params.lifetime_ticks, 40);
        assert_eq!(params.tick_interval, 1);
        assert_eq!(params.per_tick, 1);
        assert_eq!(params.spread_chance, 1.0);
        assert_eq!(params.capacity, Capacity::Limited(100));
    }

    #[test]
    fn non_positive_ceiling_disables_capacity() {
        let config = ScenarioConfig::from_toml_str("[contagion]\nmax_active = 0\n").expect("valid TOML");
        assert!(config.contagion.to_spread_params().capacity.is_unlimited());
    }

    #[test]
    fn unknown_materials_fall_back() {
        let config = ScenarioConfig::from_toml_str(
            r#"
            [contagion]
            target_types = ["dirt", "unobtainium", "minecraft:stone"]
            infected_type = "glitter"
            revert_type = "nothing"
            "#,
        )
        .expect("valid TOML");
        let params = config.contagion.to_spread_params();
        assert_eq!(params.target_types.len(), 2);
        assert_eq!(params.infected_type, Material::Sculk);
        assert_eq!(params.revert_type, Material::Air);
    }

    #[test]
    fn nan_probability_uses_default() {
        let config = ContagionConfig {
            spread_chance: f64::NAN,
            ..ContagionConfig::default()
        };
        assert_eq!(config.to_spread_params().spread_chance, DEFAULT_SPREAD_CHANCE);
    }

    #[test]
    fn seed_radius_is_capped_by_max_radius() {
        let config = ScenarioConfig::from_toml_str("[run]\nseed_radius = 5000\n").expect("valid TOML");
        assert_eq!(config.run.max_radius, DEFAULT_MAX_RADIUS);
        assert_eq!(config.run.effective_seed_radius(), 64);

        let config = ScenarioConfig::from_toml_str("[run]\nseed_radius = 5\nmax_radius = 3\n").expect("valid TOML");
        assert_eq!(config.run.effective_seed_radius(), 3);
        assert_eq!(RunConfig::default().effective_seed_radius(), 2);
    }

    #[test]
    fn syntax_errors_are_reported() {
        assert!(ScenarioConfig::from_toml_str("[contagion\n").is_err());
    }
}
