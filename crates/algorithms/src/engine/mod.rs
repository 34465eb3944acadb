//! Geoprocessing engine
//!
//! The `Geoprocessor` trait is the tool surface the buffer workflow drives:
//! open a dataset as a layer, select by attribute, count, buffer, and report
//! diagnostic messages. `NativeGeoprocessor` implements it on top of the
//! shapefile reader/writer and the vector algorithms in this crate.

mod native;

pub use native::NativeGeoprocessor;

use crate::filter::AttributeFilter;
use regionbuf_core::{Feature, Result, VectorDataset};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// How a new attribute query combines with the current selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionType {
    #[default]
    NewSelection,
    AddToSelection,
    RemoveFromSelection,
    SubsetSelection,
    ClearSelection,
}

/// Whether buffers are merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DissolveOption {
    /// One output feature per input feature, attributes kept
    None,
    /// All buffers merged into a single feature
    #[default]
    All,
}

/// Options for the buffer tool
#[derive(Debug, Clone)]
pub struct BufferOptions {
    pub dissolve: DissolveOption,
    /// Replace an existing output dataset
    pub overwrite: bool,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            dissolve: DissolveOption::All,
            overwrite: true,
        }
    }
}

/// What a buffer run produced
#[derive(Debug, Clone, PartialEq)]
pub struct BufferSummary {
    pub output: PathBuf,
    pub input_features: usize,
    pub output_features: usize,
    /// Distance actually applied, in dataset units
    pub distance: f64,
    /// Total output area in dataset units squared
    pub area: f64,
}

/// Message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("INFO"),
            Severity::Warning => f.write_str("WARNING"),
            Severity::Error => f.write_str("ERROR"),
        }
    }
}

/// A transient, named view over one dataset and its current selection
#[derive(Debug, Clone)]
pub struct Layer {
    name: String,
    dataset: VectorDataset,
    /// `None` means no selection is active
    selection: Option<BTreeSet<usize>>,
}

impl Layer {
    /// Wrap a dataset in a layer with a name unique to this call
    pub fn new(source: &Path, dataset: VectorDataset) -> Self {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "layer".to_string());
        Self {
            name: format!("{}_lyr_{}", stem, Uuid::new_v4().simple()),
            dataset,
            selection: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dataset(&self) -> &VectorDataset {
        &self.dataset
    }

    /// Indices of the features a tool operates on: the selection if any, else all
    pub fn active_indices(&self) -> Vec<usize> {
        match &self.selection {
            Some(sel) => sel.iter().copied().collect(),
            None => (0..self.dataset.len()).collect(),
        }
    }

    pub fn active_features(&self) -> Vec<&Feature> {
        self.active_indices()
            .into_iter()
            .map(|i| &self.dataset.features.features[i])
            .collect()
    }

    /// Apply a selection step given the set of features matching the query
    pub(crate) fn apply_selection(&mut self, kind: SelectionType, matched: BTreeSet<usize>) {
        let current = self.selection.take().unwrap_or_default();
        self.selection = match kind {
            SelectionType::NewSelection => Some(matched),
            SelectionType::AddToSelection => Some(current.union(&matched).copied().collect()),
            SelectionType::RemoveFromSelection => {
                Some(current.difference(&matched).copied().collect())
            }
            SelectionType::SubsetSelection => {
                Some(current.intersection(&matched).copied().collect())
            }
            SelectionType::ClearSelection => None,
        };
    }
}

/// Tool surface of a geoprocessing engine
pub trait Geoprocessor {
    /// Open a dataset as a queryable layer
    fn make_feature_layer(&mut self, source: &Path) -> Result<Layer>;

    /// Quote a field name in the SQL dialect of `source`
    fn add_field_delimiters(&self, source: &Path, field: &str) -> String;

    /// Select features by attribute; returns the resulting count.
    ///
    /// `filter` may only be `None` for `ClearSelection`.
    fn select_layer_by_attribute(
        &mut self,
        layer: &mut Layer,
        selection: SelectionType,
        filter: Option<&AttributeFilter>,
    ) -> Result<usize>;

    /// Number of selected features, or of all features when nothing is selected
    fn get_count(&self, layer: &Layer) -> usize;

    /// Buffer the layer's active features into a new dataset at `output`.
    ///
    /// `distance` is a magnitude with an optional unit, e.g. `"0.5 Miles"`.
    fn buffer(
        &mut self,
        layer: &Layer,
        output: &Path,
        distance: &str,
        options: &BufferOptions,
    ) -> Result<BufferSummary>;

    /// Messages of the most recent tool call at the given severity
    fn messages(&self, severity: Severity) -> Vec<String>;
}
