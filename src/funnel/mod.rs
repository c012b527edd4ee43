pub mod adjustments;
pub mod calculator;
pub mod stage;
pub mod warning;

pub use adjustments::{parse_numeric_input, AdjustmentEntry, StageAdjustments};
pub use calculator::{
    round2, sanitize_start, simulate, FunnelOutcome, ParseModeError, SimulationMode,
    SimulationParams, StageResult,
};
pub use stage::{build_stage_list, StageDefinition, StageKey};
pub use warning::FunnelWarning;
