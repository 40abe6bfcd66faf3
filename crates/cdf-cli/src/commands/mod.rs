pub mod completions;
pub mod config;
pub mod features;
pub mod query;
pub mod telemetry;
pub mod util;
