//! Frame I/O for raw usage tables and feature tables.
//!
//! Feature tables are written to `<parent>/<stage>/<file>` first and copied to
//! the requested path afterwards, so an aborted run leaves no truncated file
//! at the final location. Partitioned output stays in the stage directory as a
//! hive-style Parquet tree (`Region=East US/part-0000.parquet`).

use std::{
    ffi::OsStr,
    fs::{self, File},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use polars::frame::group_by::GroupsIndicator;
use polars::prelude::*;
#[cfg(feature = "parquet")]
use polars::prelude::{ParquetReader, ParquetWriter};
use tracing::debug;

/// On-disk table format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Csv,
    Parquet,
}

impl FrameFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(FrameFormat::Csv),
            "parquet" => Ok(FrameFormat::Parquet),
            other => Err(anyhow!(
                "unsupported file extension '{other}' for {}; use .csv or .parquet",
                path.display()
            )),
        }
    }

    fn ensure_available(self) -> Result<()> {
        if self == FrameFormat::Parquet && !cfg!(feature = "parquet") {
            bail!("parquet support is disabled; rebuild with the 'parquet' feature");
        }
        Ok(())
    }
}

/// Read a raw usage table or a feature table.
pub fn read_frame(path: &Path) -> Result<DataFrame> {
    let format = FrameFormat::from_path(path)?;
    format.ensure_available()?;
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let frame = match format {
        FrameFormat::Csv => CsvReader::new(&mut file)
            .has_header(true)
            .finish()
            .with_context(|| format!("reading CSV {}", path.display()))?,
        FrameFormat::Parquet => read_parquet(&mut file, path)?,
    };
    debug!(path = %path.display(), rows = frame.height(), "read frame");
    Ok(frame)
}

#[cfg(feature = "parquet")]
fn read_parquet(file: &mut File, path: &Path) -> Result<DataFrame> {
    ParquetReader::new(file)
        .finish()
        .with_context(|| format!("reading Parquet {}", path.display()))
}

#[cfg(not(feature = "parquet"))]
fn read_parquet(_file: &mut File, path: &Path) -> Result<DataFrame> {
    bail!("cannot read {}: parquet support is disabled", path.display())
}

fn write_file(df: &mut DataFrame, path: &Path, format: FrameFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    match format {
        FrameFormat::Csv => CsvWriter::new(&mut file)
            .finish(df)
            .with_context(|| format!("writing CSV {}", path.display())),
        FrameFormat::Parquet => write_parquet(df, &mut file, path),
    }
}

#[cfg(feature = "parquet")]
fn write_parquet(df: &mut DataFrame, file: &mut File, path: &Path) -> Result<()> {
    ParquetWriter::new(file)
        .finish(df)
        .map(|_| ())
        .with_context(|| format!("writing Parquet {}", path.display()))
}

#[cfg(not(feature = "parquet"))]
fn write_parquet(_df: &mut DataFrame, _file: &mut File, path: &Path) -> Result<()> {
    bail!("cannot write {}: parquet support is disabled", path.display())
}

/// Location of the staged copy of `output` for `stage`.
pub fn staged_output_path(output: &Path, stage: &str) -> PathBuf {
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    let file_name = output.file_name().unwrap_or_else(|| OsStr::new("features"));
    parent.join(stage).join(file_name)
}

/// Write a feature frame through the stage directory.
///
/// Returns where the data ended up: `output` for a single file, the staged
/// directory for partitioned output.
pub fn write_frame_staged(
    df: &mut DataFrame,
    output: &Path,
    stage: &str,
    partitions: &[String],
) -> Result<PathBuf> {
    let staged = staged_output_path(output, stage);
    if !partitions.is_empty() {
        FrameFormat::Parquet
            .ensure_available()
            .context("partitioned output is written as Parquet")?;
        write_hive_tree(df, &staged, partitions)?;
        return Ok(staged);
    }

    let format = FrameFormat::from_path(output)?;
    format.ensure_available()?;
    write_file(df, &staged, format)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(&staged, output)
        .with_context(|| format!("copying {} to {}", staged.display(), output.display()))?;
    debug!(staged = %staged.display(), output = %output.display(), "promoted staged output");
    Ok(output.to_path_buf())
}

/// One Parquet file per distinct combination of the `partitions` columns.
fn write_hive_tree(df: &DataFrame, root: &Path, partitions: &[String]) -> Result<()> {
    let grouped = df.group_by(partitions)?;
    for (index, group) in grouped.get_groups().iter().enumerate() {
        let (mut part, first_row) = match group {
            GroupsIndicator::Idx((first, rows)) => {
                (df.take(&IdxCa::new("row", rows.as_slice()))?, first as usize)
            }
            GroupsIndicator::Slice([first, len]) => {
                (df.slice(first as i64, len as usize), first as usize)
            }
        };
        let mut dir = root.to_path_buf();
        for name in partitions {
            dir.push(hive_segment(name, &df.column(name)?.get(first_row)?));
        }
        write_file(
            &mut part,
            &dir.join(format!("part-{index:04}.parquet")),
            FrameFormat::Parquet,
        )?;
    }
    Ok(())
}

fn hive_segment(name: &str, value: &AnyValue<'_>) -> String {
    let value = match value {
        AnyValue::Utf8(s) => s.to_string(),
        other => other.to_string(),
    };
    format!("{name}={}", value.replace(std::path::MAIN_SEPARATOR, "_"))
}
