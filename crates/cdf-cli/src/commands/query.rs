use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use cdf_core::QueryConfig;
use cdf_query::{DashboardView, FilterSpec, QueryRequest, QueryService, QueryTable};
use cdf_ts::read_frame;
use serde_json::Value;
use tracing::info;

pub struct QueryArgs<'a> {
    pub input: &'a Path,
    pub request: Option<&'a Path>,
    pub view: Option<&'a str>,
    pub filters: FilterSpec,
}

/// Print the JSON result on stdout. A `{error}` payload is printed too and
/// turns into a failing exit status.
pub fn handle(args: QueryArgs<'_>, config: &QueryConfig) -> Result<()> {
    let frame = read_frame(args.input)?;
    let table = QueryTable::from_frame(&frame)?;
    info!(rows = table.len(), input = %args.input.display(), "loaded feature table");
    let service = QueryService::new(table, config)?;

    let value = match (args.request, args.view) {
        (Some(path), _) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading request {}", path.display()))?;
            let request: QueryRequest = serde_json::from_str(&json)
                .with_context(|| format!("parsing request {}", path.display()))?;
            serde_json::to_value(service.query(&request))?
        }
        (None, Some(name)) => {
            let view: DashboardView = name.parse()?;
            service.view(view, &args.filters)
        }
        (None, None) => bail!("either --request or --view is required"),
    };

    println!("{}", serde_json::to_string_pretty(&value)?);
    if let Some(Value::String(message)) = value.get("error") {
        bail!("query failed: {message}");
    }
    Ok(())
}

pub fn list_views() {
    for view in DashboardView::ALL {
        println!("{view}");
    }
}
