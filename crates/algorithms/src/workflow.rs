//! Buffer a named region
//!
//! Select the features of a boundary dataset whose attribute matches a name,
//! buffer them with dissolve-all, write the result, and optionally register it
//! with a mapping project. The heavy lifting is delegated to a `Geoprocessor`.

use crate::engine::{BufferOptions, BufferSummary, DissolveOption, Geoprocessor, SelectionType, Severity};
use crate::filter::AttributeFilter;
use regionbuf_core::project::{Project, ProjectRef};
use regionbuf_core::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// File name used when the target value has no usable characters
const FALLBACK_OUTPUT_STEM: &str = "region";

/// Parameters for `buffer_named_region`
#[derive(Debug, Clone)]
pub struct RegionBufferParams {
    /// Boundary shapefile to select from
    pub source: PathBuf,
    /// Output shapefile; derived from `source` and `target_value` when `None`
    pub output: Option<PathBuf>,
    /// Distance with unit, e.g. `"0.5 Miles"`
    pub buffer_distance: String,
    /// Attribute field to match on
    pub field_name: String,
    /// Value the field must equal
    pub target_value: String,
    /// Replace an existing output dataset
    pub overwrite: bool,
    /// Project to add the output to, if any
    pub publish: Option<ProjectRef>,
    /// What `ProjectRef::Current` refers to in this session
    pub active_project: Option<PathBuf>,
}

impl Default for RegionBufferParams {
    fn default() -> Self {
        Self {
            source: PathBuf::from("CA_Counties.shp"),
            output: None,
            buffer_distance: "0.5 Miles".to_string(),
            field_name: "NAME".to_string(),
            target_value: "Fresno".to_string(),
            overwrite: true,
            publish: None,
            active_project: None,
        }
    }
}

/// Result of the optional publish step
#[derive(Debug, Clone, PartialEq)]
pub enum PublishStatus {
    /// Publishing was not requested
    Skipped,
    Published { project: PathBuf, map: String },
    /// The project opened but holds no map to add to
    NoMaps { project: PathBuf },
    /// Publishing failed; the output itself is unaffected
    Failed(String),
}

/// What a run produced
#[derive(Debug, Clone, PartialEq)]
pub enum BufferOutcome {
    /// No feature matched; nothing was written
    NoMatch { field: String, value: String },
    Created {
        output: PathBuf,
        summary: BufferSummary,
        publish: PublishStatus,
    },
}

impl BufferOutcome {
    /// The written dataset, if any
    pub fn output(&self) -> Option<&Path> {
        match self {
            BufferOutcome::NoMatch { .. } => None,
            BufferOutcome::Created { output, .. } => Some(output),
        }
    }
}

/// Default output path: `<dir of source>/<target>_buffer.shp`
pub fn derive_output_path(source: &Path, target_value: &str) -> PathBuf {
    let stem: String = target_value
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let stem = stem.trim_matches(|c: char| c == '_' || c == '-');
    let stem = if stem.is_empty() { FALLBACK_OUTPUT_STEM } else { stem };

    let dir = source.parent().unwrap_or_else(|| Path::new(""));
    dir.join(format!("{}_buffer.shp", stem))
}

/// Select `field_name = target_value` in `source`, buffer it and write the result.
///
/// A source that does not exist, or an output that would replace the source
/// shapefile, fails before the engine is used. An empty selection is not an error and yields `BufferOutcome::NoMatch`. Publishing
/// never fails the run; its outcome is reported in `PublishStatus`.
pub fn buffer_named_region<G>(engine: &mut G, params: &RegionBufferParams) -> Result<BufferOutcome>
where
    G: Geoprocessor + ?Sized,
{
    if !params.source.exists() {
        return Err(Error::NotFound(params.source.clone()));
    }

    let output = params
        .output
        .clone()
        .unwrap_or_else(|| derive_output_path(&params.source, &params.target_value));

    match run(engine, params, &output) {
        Ok(outcome) => Ok(outcome),
        Err(Error::Execution(msg)) => {
            for message in engine.messages(Severity::Error) {
                error!("{}", message);
            }
            Err(Error::Execution(msg))
        }
        Err(e) => {
            error!("Error: {}", e);
            Err(e)
        }
    }
}

fn run<G>(engine: &mut G, params: &RegionBufferParams, output: &Path) -> Result<BufferOutcome>
where
    G: Geoprocessor + ?Sized,
{
    if writes_over(output, &params.source) {
        return Err(Error::IncompatibleOutput {
            path: output.to_path_buf(),
            reason: "output would overwrite the source dataset".to_string(),
        });
    }

    let mut layer = engine.make_feature_layer(&params.source)?;
    debug!("Working layer {}", layer.name());

    let delimited = engine.add_field_delimiters(&params.source, &params.field_name);
    let filter = AttributeFilter::equals(params.field_name.as_str(), params.target_value.as_str())
        .with_delimited_field(delimited);
    debug!("Where clause: {}", filter.where_clause());

    engine.select_layer_by_attribute(&mut layer, SelectionType::NewSelection, Some(&filter))?;

    let count = engine.get_count(&layer);
    if count == 0 {
        info!(
            "No features selected for {} using {}.",
            params.target_value, params.field_name
        );
        return Ok(BufferOutcome::NoMatch {
            field: params.field_name.clone(),
            value: params.target_value.clone(),
        });
    }
    debug!("{} features selected", count);

    let options = BufferOptions {
        dissolve: DissolveOption::All,
        overwrite: params.overwrite,
    };
    let summary = engine.buffer(&layer, output, &params.buffer_distance, &options)?;
    info!("Buffer created: {}", output.display());

    let publish = match &params.publish {
        Some(project) => publish_to_project(output, project, params.active_project.as_deref()),
        None => PublishStatus::Skipped,
    };

    Ok(BufferOutcome::Created {
        output: output.to_path_buf(),
        summary,
        publish,
    })
}

/// True when writing `output` would replace the shapefile at `source`.
///
/// A shapefile is its set of sidecars sharing one stem, so paths compare
/// without their extension after resolving links and relative parts.
fn writes_over(output: &Path, source: &Path) -> bool {
    match (resolve_path(output), resolve_path(source)) {
        (Some(out), Some(src)) => out.with_extension("") == src.with_extension(""),
        _ => false,
    }
}

/// Canonical form of a path whose final component may not exist yet
fn resolve_path(path: &Path) -> Option<PathBuf> {
    if let Ok(resolved) = fs::canonicalize(path) {
        return Some(resolved);
    }
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    Some(fs::canonicalize(parent).ok()?.join(path.file_name()?))
}

/// Add `dataset` to the first map of a project and save it.
///
/// Failures are logged and returned as `PublishStatus::Failed`.
pub fn publish_to_project(dataset: &Path, project: &ProjectRef, active: Option<&Path>) -> PublishStatus {
    match try_publish(dataset, project, active) {
        Ok(status) => status,
        Err(e) => {
            warn!("Warning: could not add to project: {}", e);
            PublishStatus::Failed(e.to_string())
        }
    }
}

fn try_publish(dataset: &Path, project: &ProjectRef, active: Option<&Path>) -> Result<PublishStatus> {
    let path = project.resolve(active)?;
    let mut project = Project::open(&path)?;
    let data_source = fs::canonicalize(dataset).unwrap_or_else(|_| dataset.to_path_buf());

    let Some(map) = project.first_map_mut() else {
        info!("No maps found in project to add the layer to.");
        return Ok(PublishStatus::NoMaps { project: path });
    };
    map.add_data_from_path(&data_source);
    let map_name = map.name.clone();
    project.save()?;

    info!("Added buffer layer to the first map in the project.");
    Ok(PublishStatus::Published {
        project: path,
        map: map_name,
    })
}
