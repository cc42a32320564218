pub mod config;
pub mod material;
pub mod position;
pub mod snapshot;
pub mod spread_params;

// Re-export key types for easier use by dependent crates
pub use config::{ContagionConfig, OutputConfig, RunConfig, SandboxConfig, ScenarioConfig};
pub use material::Material;
pub use position::{sphere, Position, WorldId};
pub use snapshot::{Snapshot, TrialRecord, TrialSummary};
pub use spread_params::{Capacity, SpreadParams};
