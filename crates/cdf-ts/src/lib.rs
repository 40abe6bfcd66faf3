//! Time-series feature pipeline for cloud usage telemetry.
//!
//! [`FeaturePipeline::run`] takes a [`cdf_core::RecordStore`] and produces a
//! [`FeatureTable`] with calendar, lag, rolling, ratio, synthetic, indicator
//! and label columns, plus a [`RunReport`]. [`frame`] and [`io`] move data in
//! and out of polars frames and CSV/Parquet files.

pub mod calendar;
pub mod derived;
pub mod encode;
pub mod frame;
pub mod io;
pub mod partition;
pub mod pipeline;
pub mod reconcile;
pub mod synthetic;
pub mod table;
pub mod temporal;

pub use frame::{feature_table_to_frame, record_store_from_frame};
pub use io::{read_frame, staged_output_path, write_frame_staged, FrameFormat};
pub use partition::{partition, Partitions, SeriesKey};
pub use pipeline::{FeaturePipeline, PipelineOutput, RunReport};
pub use reconcile::{ColumnCompleteness, CompletenessReport};
pub use table::{Column, ColumnData, FeatureTable, Stage};
