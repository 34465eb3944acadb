//! Native geoprocessing engine backed by shapefile I/O and `geo`

use super::{
    BufferOptions, BufferSummary, DissolveOption, Geoprocessor, Layer, SelectionType, Severity,
};
use crate::filter::{AttributeFilter, FieldDelimiter};
use crate::maybe_rayon::*;
use crate::vector::{area, buffer_dissolve, buffer_geometry, BufferParams};
use geo::{Geometry, MultiPolygon};
use regionbuf_core::io::{read_shapefile, write_shapefile, WriteOptions};
use regionbuf_core::{
    AttributeValue, Error, Feature, FeatureCollection, FieldDef, LinearDistance, LinearUnit,
    Result, VectorDataset, CRS,
};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

/// Field holding the applied buffer distance in outputs
const BUFF_DIST_FIELD: &str = "BUFF_DIST";

/// Engine that runs every tool in-process
#[derive(Debug, Default)]
pub struct NativeGeoprocessor {
    messages: Vec<(Severity, String)>,
}

impl NativeGeoprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a tool call; messages from the previous call are discarded
    fn begin(&mut self, tool: &str, detail: impl AsRef<str>) {
        self.messages.clear();
        self.info(format!("Executing: {} {}", tool, detail.as_ref()));
    }

    fn info(&mut self, text: impl Into<String>) {
        self.messages.push((Severity::Info, text.into()));
    }

    fn warning(&mut self, text: impl Into<String>) {
        let text = text.into();
        warn!("{}", text);
        self.messages.push((Severity::Warning, text));
    }

    /// Record an error message and hand the error back for propagation
    fn fail(&mut self, err: Error) -> Error {
        self.messages.push((Severity::Error, err.to_string()));
        err
    }

    fn succeeded(&mut self) {
        self.info("Succeeded");
    }

    /// Convert a distance string into dataset units for `crs`
    fn resolve_distance(&mut self, distance: &str, crs: Option<&CRS>) -> Result<f64> {
        let parsed: LinearDistance = distance
            .parse()
            .map_err(|e: Error| Error::Execution(format!("Invalid buffer distance: {}", e)))?;

        match parsed.unit {
            LinearUnit::Unknown => Ok(parsed.value),
            LinearUnit::DecimalDegrees => match crs {
                Some(c) if c.is_geographic() => Ok(parsed.value),
                _ => Err(Error::Execution(format!(
                    "Angular distance {} requires a geographic coordinate system",
                    parsed
                ))),
            },
            _ => {
                let meters = parsed.meters().unwrap_or(parsed.value);
                match crs {
                    Some(c) if c.is_geographic() => Err(Error::Execution(format!(
                        "Cannot apply linear distance {} to geographic coordinates ({}); project the data first",
                        parsed,
                        c.identifier()
                    ))),
                    Some(c) => match c.meters_per_unit() {
                        Some(per_unit) => Ok(meters / per_unit),
                        None => {
                            self.warning(format!(
                                "Coordinate system {} has no linear unit; assuming meters",
                                c.identifier()
                            ));
                            Ok(meters)
                        }
                    },
                    None => {
                        self.warning("Input has no coordinate system; assuming meters");
                        Ok(meters)
                    }
                }
            }
        }
    }

    fn dissolved_output(
        &self,
        dataset: &VectorDataset,
        features: &[&Feature],
        params: &BufferParams,
    ) -> Result<VectorDataset> {
        let geoms: Vec<Geometry<f64>> = features.iter().filter_map(|f| f.geometry.clone()).collect();
        let merged = buffer_dissolve(&geoms, params)?;
        if merged.0.is_empty() {
            return Err(Error::Execution(
                "Buffer produced an empty geometry; nothing to write".into(),
            ));
        }

        let feature = Feature::new(Geometry::MultiPolygon(merged))
            .with_property("Id", AttributeValue::Int(0))
            .with_property(BUFF_DIST_FIELD, AttributeValue::Float(params.distance));

        Ok(VectorDataset::new(
            vec![FieldDef::numeric("Id", 10, 0), FieldDef::numeric(BUFF_DIST_FIELD, 19, 8)],
            FeatureCollection::from_iter([feature]),
            dataset.crs.clone(),
        ))
    }

    fn per_feature_output(
        &mut self,
        dataset: &VectorDataset,
        features: &[&Feature],
        params: &BufferParams,
    ) -> Result<VectorDataset> {
        let buffered: Vec<(Option<MultiPolygon<f64>>, &Feature)> = features
            .par_iter()
            .map(|f| (f.geometry.as_ref().map(|g| buffer_geometry(g, params)), *f))
            .collect();

        let mut fields = dataset.fields.clone();
        if dataset.field(BUFF_DIST_FIELD).is_none() {
            fields.push(FieldDef::numeric(BUFF_DIST_FIELD, 19, 8));
        }
        let dist_name = fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(BUFF_DIST_FIELD))
            .map(|f| f.name.clone())
            .unwrap_or_else(|| BUFF_DIST_FIELD.to_string());

        let mut out = FeatureCollection::new();
        let mut skipped = 0usize;
        for (geometry, source) in buffered {
            match geometry {
                Some(mp) if !mp.0.is_empty() => {
                    let mut feature = Feature::new(Geometry::MultiPolygon(mp));
                    feature.properties = source.properties.clone();
                    feature.id = source.id.clone();
                    feature.set_property(dist_name.clone(), AttributeValue::Float(params.distance));
                    out.push(feature);
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            self.warning(format!("{} features produced no buffer and were skipped", skipped));
        }
        if out.is_empty() {
            return Err(Error::Execution(
                "Buffer produced no output features".into(),
            ));
        }

        Ok(VectorDataset::new(fields, out, dataset.crs.clone()))
    }

    fn run_buffer(
        &mut self,
        layer: &Layer,
        output: &Path,
        distance: &str,
        options: &BufferOptions,
    ) -> Result<BufferSummary> {
        let features = layer.active_features();
        if features.is_empty() {
            return Err(Error::Execution(format!(
                "Layer {} has no features to buffer",
                layer.name()
            )));
        }

        let dataset = layer.dataset();
        let distance = self.resolve_distance(distance, dataset.crs.as_ref())?;
        let params = BufferParams {
            distance,
            ..Default::default()
        };
        debug!("Buffering {} features by {} dataset units", features.len(), distance);

        let without_geometry = features.iter().filter(|f| f.geometry.is_none()).count();
        if without_geometry > 0 {
            self.warning(format!("{} features have no geometry", without_geometry));
        }

        let result = match options.dissolve {
            DissolveOption::All => self.dissolved_output(dataset, &features, &params)?,
            DissolveOption::None => self.per_feature_output(dataset, &features, &params)?,
        };

        write_shapefile(
            &result,
            output,
            &WriteOptions {
                overwrite: options.overwrite,
            },
        )?;

        let total_area = result
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .map(area)
            .sum();

        Ok(BufferSummary {
            output: output.to_path_buf(),
            input_features: features.len(),
            output_features: result.len(),
            distance,
            area: total_area,
        })
    }
}

impl Geoprocessor for NativeGeoprocessor {
    fn make_feature_layer(&mut self, source: &Path) -> Result<Layer> {
        self.begin("MakeFeatureLayer", source.display().to_string());
        match read_shapefile(source) {
            Ok(dataset) => {
                let layer = Layer::new(source, dataset);
                self.info(format!("Created layer {}", layer.name()));
                self.succeeded();
                Ok(layer)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn add_field_delimiters(&self, source: &Path, field: &str) -> String {
        FieldDelimiter::for_source(source).delimit(field)
    }

    fn select_layer_by_attribute(
        &mut self,
        layer: &mut Layer,
        selection: SelectionType,
        filter: Option<&AttributeFilter>,
    ) -> Result<usize> {
        let clause = filter.map(AttributeFilter::where_clause).unwrap_or_default();
        self.begin(
            "SelectLayerByAttribute",
            format!("{} {:?} {}", layer.name(), selection, clause),
        );

        if selection == SelectionType::ClearSelection {
            layer.apply_selection(selection, BTreeSet::new());
            self.succeeded();
            return Ok(self.get_count(layer));
        }

        let Some(filter) = filter else {
            return Err(self.fail(Error::Execution(format!(
                "{:?} requires a where clause",
                selection
            ))));
        };

        let dataset = layer.dataset();
        if dataset.field(filter.field()).is_none() {
            return Err(self.fail(Error::Execution(format!(
                "Invalid expression {}: attribute column not found: {}",
                clause,
                filter.field()
            ))));
        }

        let matched: BTreeSet<usize> = dataset
            .features
            .iter()
            .enumerate()
            .filter(|(_, f)| filter.matches(dataset, f))
            .map(|(i, _)| i)
            .collect();

        layer.apply_selection(selection, matched);
        let count = self.get_count(layer);
        self.info(format!("{} features selected", count));
        self.succeeded();
        Ok(count)
    }

    fn get_count(&self, layer: &Layer) -> usize {
        layer.active_indices().len()
    }

    fn buffer(
        &mut self,
        layer: &Layer,
        output: &Path,
        distance: &str,
        options: &BufferOptions,
    ) -> Result<BufferSummary> {
        self.begin(
            "Buffer",
            format!("{} {} {} {:?}", layer.name(), output.display(), distance, options.dissolve),
        );
        match self.run_buffer(layer, output, distance, options) {
            Ok(summary) => {
                self.info(format!(
                    "Wrote {} features to {}",
                    summary.output_features,
                    output.display()
                ));
                self.succeeded();
                Ok(summary)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn messages(&self, severity: Severity) -> Vec<String> {
        self.messages
            .iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use regionbuf_core::FieldDef;
    use std::path::PathBuf;

    const ALBERS: &str = r#"PROJCS["NAD_1983_California_Teale_Albers",GEOGCS["GCS_North_American_1983",UNIT["Degree",0.0174532925199433]],PROJECTION["Albers"],UNIT["Meter",1.0]]"#;
    const WGS84: &str = r#"GEOGCS["GCS_WGS_1984",UNIT["Degree",0.0174532925199433]]"#;
    const FEET: &str = r#"PROJCS["StatePlane_Feet",GEOGCS["GCS_North_American_1983",UNIT["Degree",0.0174532925199433]],UNIT["Foot_US",0.3048006096012192]]"#;

    fn write_counties(dir: &Path, wkt: Option<&str>) -> PathBuf {
        let county = |name: &str, x0: f64| {
            Feature::new(Geometry::Polygon(polygon![
                (x: x0, y: 0.0), (x: x0 + 1000.0, y: 0.0), (x: x0 + 1000.0, y: 1000.0),
                (x: x0, y: 1000.0), (x: x0, y: 0.0),
            ]))
            .with_property("NAME", AttributeValue::String(name.into()))
        };
        let ds = VectorDataset::new(
            vec![FieldDef::character("NAME", 32)],
            [county("Fresno", 0.0), county("Kern", 5000.0), county("Fresno", 20000.0)]
                .into_iter()
                .collect(),
            wkt.map(CRS::from_wkt),
        );
        let path = dir.join("counties.shp");
        write_shapefile(&ds, &path, &WriteOptions::default()).unwrap();
        path
    }

    #[test]
    fn test_select_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_counties(dir.path(), Some(ALBERS));
        let mut gp = NativeGeoprocessor::new();

        let mut layer = gp.make_feature_layer(&source).unwrap();
        assert_eq!(gp.get_count(&layer), 3);

        let fresno = AttributeFilter::equals("NAME", "Fresno");
        let n = gp
            .select_layer_by_attribute(&mut layer, SelectionType::NewSelection, Some(&fresno))
            .unwrap();
        assert_eq!(n, 2);

        let nobody = AttributeFilter::equals("NAME", "Alpine");
        let n = gp
            .select_layer_by_attribute(&mut layer, SelectionType::NewSelection, Some(&nobody))
            .unwrap();
        assert_eq!(n, 0);
        assert_eq!(gp.get_count(&layer), 0);
    }

    #[test]
    fn test_unknown_field_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_counties(dir.path(), Some(ALBERS));
        let mut gp = NativeGeoprocessor::new();
        let mut layer = gp.make_feature_layer(&source).unwrap();

        let filter = AttributeFilter::equals("COUNTY", "Fresno");
        let err = gp
            .select_layer_by_attribute(&mut layer, SelectionType::NewSelection, Some(&filter))
            .unwrap_err();
        assert!(matches!(err, Error::Execution(_)));
        let errors = gp.messages(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("COUNTY"));
    }

    #[test]
    fn test_distance_conversion() {
        let mut gp = NativeGeoprocessor::new();
        let albers = CRS::from_wkt(ALBERS);
        let feet = CRS::from_wkt(FEET);

        let d = gp.resolve_distance("0.5 Miles", Some(&albers)).unwrap();
        assert!((d - 804.672).abs() < 1e-9);

        let d = gp.resolve_distance("0.5 Miles", Some(&feet)).unwrap();
        assert!((d - 2640.0).abs() < 0.01);

        assert_eq!(gp.resolve_distance("25", Some(&albers)).unwrap(), 25.0);

        let geographic = CRS::from_wkt(WGS84);
        assert!(gp.resolve_distance("0.5 Miles", Some(&geographic)).is_err());
        assert_eq!(gp.resolve_distance("0.01 DecimalDegrees", Some(&geographic)).unwrap(), 0.01);
        assert!(gp.resolve_distance("0.01 DecimalDegrees", Some(&albers)).is_err());
    }

    #[test]
    fn test_missing_crs_warns() {
        let mut gp = NativeGeoprocessor::new();
        gp.begin("Buffer", "");
        let d = gp.resolve_distance("1 Kilometers", None).unwrap();
        assert_eq!(d, 1000.0);
        assert_eq!(gp.messages(Severity::Warning).len(), 1);
    }

    #[test]
    fn test_buffer_without_dissolve_keeps_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_counties(dir.path(), Some(ALBERS));
        let output = dir.path().join("each.shp");
        let mut gp = NativeGeoprocessor::new();
        let mut layer = gp.make_feature_layer(&source).unwrap();
        gp.select_layer_by_attribute(
            &mut layer,
            SelectionType::NewSelection,
            Some(&AttributeFilter::equals("NAME", "Fresno")),
        )
        .unwrap();

        let options = BufferOptions {
            dissolve: DissolveOption::None,
            overwrite: false,
        };
        let summary = gp.buffer(&layer, &output, "100 Meters", &options).unwrap();
        assert_eq!(summary.input_features, 2);
        assert_eq!(summary.output_features, 2);

        let written = read_shapefile(&output).unwrap();
        assert!(written.field("NAME").is_some());
        assert!(written.field("BUFF_DIST").is_some());
        for f in written.features.iter() {
            assert!(f.get_property("NAME").unwrap().matches_literal("Fresno"));
        }
    }

    #[test]
    fn test_buffer_reports_output_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_counties(dir.path(), Some(ALBERS));
        let output = dir.path().join("out.shp");
        let mut gp = NativeGeoprocessor::new();
        let layer = gp.make_feature_layer(&source).unwrap();

        let no_overwrite = BufferOptions {
            overwrite: false,
            ..Default::default()
        };
        gp.buffer(&layer, &output, "10 Meters", &no_overwrite).unwrap();
        let err = gp.buffer(&layer, &output, "10 Meters", &no_overwrite).unwrap_err();
        assert!(matches!(err, Error::OutputExists(_)));
        assert_eq!(gp.messages(Severity::Error).len(), 1);
    }
}
