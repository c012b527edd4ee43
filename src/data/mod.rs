pub mod filter;
pub mod record;
pub mod sample;
pub mod source;

pub use filter::{
    filter_options, filter_records, stage_definitions, FilterLevel, FilterOptions,
    FilterSelection,
};
pub use record::{normalize_row, SkippedRow, StageRecord};
pub use sample::sample_records;
pub use source::{
    load_snapshot, load_stage_records, parse_json_records, LoadReport, RecordOrigin,
    RecordSnapshot, SourceError, SourceFormat,
};
