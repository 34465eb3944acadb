//! Native shapefile reading and writing

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{geometry_kind, AttributeValue, Feature, FeatureCollection, FieldDef, FieldKind, VectorDataset};
use geo_types::Geometry;
use shapefile::dbase::{self, FieldName, FieldType, FieldValue, Record, TableWriterBuilder};
use shapefile::Shape;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sidecar extensions that make up one shapefile dataset
const COMPONENT_EXTENSIONS: [&str; 5] = ["shp", "shx", "dbf", "prj", "cpg"];

/// Options for writing shapefiles
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Replace an existing dataset at the output path
    pub overwrite: bool,
}

/// All sidecar paths belonging to the shapefile at `path`
pub fn shapefile_components(path: &Path) -> Vec<PathBuf> {
    COMPONENT_EXTENSIONS
        .iter()
        .map(|ext| path.with_extension(ext))
        .collect()
}

/// Read a shapefile (`.shp` + `.dbf`, optional `.prj`) into a dataset
pub fn read_shapefile<P: AsRef<Path>>(path: P) -> Result<VectorDataset> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::NotFound(path.to_path_buf()));
    }

    let dbf = path.with_extension("dbf");
    let table = dbase::Reader::from_path(&dbf)?;
    let mut fields: Vec<FieldDef> = table
        .fields()
        .iter()
        .filter(|info| info.name() != "DeletionFlag")
        .map(|info| FieldDef {
            name: info.name().to_string(),
            kind: field_kind(info.field_type()),
            length: info.length(),
            decimals: 0,
        })
        .collect();
    drop(table);

    let mut features = FeatureCollection::new();
    for (index, (shape, record)) in shapefile::read(path)?.into_iter().enumerate() {
        let mut feature = match shape_to_geometry(shape)? {
            Some(geometry) => Feature::new(geometry),
            None => Feature::empty(),
        };
        feature.id = Some(index.to_string());
        for field in &fields {
            let value = record
                .get(&field.name)
                .map(field_value_to_attribute)
                .unwrap_or(AttributeValue::Null);
            feature.set_property(field.name.clone(), value);
        }
        features.push(feature);
    }

    for field in fields.iter_mut().filter(|f| f.kind == FieldKind::Numeric) {
        let fractional = features.iter().any(|f| {
            f.get_property(&field.name)
                .and_then(AttributeValue::as_f64)
                .is_some_and(|v| v.fract() != 0.0)
        });
        if fractional {
            field.decimals = field.length.saturating_sub(2).min(15);
        }
    }

    let crs = CRS::read_prj(path)?;
    debug!(
        "Read {} features with {} fields from {}",
        features.len(),
        fields.len(),
        path.display()
    );
    Ok(VectorDataset::new(fields, features, crs))
}

/// Write a polygon dataset as a shapefile.
///
/// Every feature must carry a `Polygon` or `MultiPolygon`. Existing datasets
/// at `path` are replaced only when `options.overwrite` is set, and only once
/// the features and schema have been accepted.
pub fn write_shapefile<P: AsRef<Path>>(
    dataset: &VectorDataset,
    path: P,
    options: &WriteOptions,
) -> Result<()> {
    let path = path.as_ref();

    let shapes = dataset
        .features
        .iter()
        .map(|f| match &f.geometry {
            Some(Geometry::Polygon(p)) => Ok(shapefile::Polygon::from(p.clone())),
            Some(Geometry::MultiPolygon(mp)) => Ok(shapefile::Polygon::from(mp.clone())),
            Some(other) => Err(Error::UnsupportedGeometry(format!(
                "only polygon features can be written, got {}",
                geometry_kind(other)
            ))),
            None => Err(Error::UnsupportedGeometry(
                "features without geometry cannot be written".into(),
            )),
        })
        .collect::<Result<Vec<_>>>()?;

    let mut builder = TableWriterBuilder::new();
    for field in &dataset.fields {
        builder = add_field(builder, field)?;
    }

    prepare_output(path, options.overwrite)?;

    let mut writer = shapefile::Writer::from_path(path, builder)?;
    for (shape, feature) in shapes.iter().zip(dataset.features.iter()) {
        let record = feature_record(feature, &dataset.fields);
        writer.write_shape_and_record(shape, &record)?;
    }
    drop(writer);

    if let Some(crs) = &dataset.crs {
        crs.write_prj(path)?;
    }

    debug!("Wrote {} features to {}", dataset.len(), path.display());
    Ok(())
}

/// Validate the output location and clear a previous dataset when allowed
fn prepare_output(path: &Path, overwrite: bool) -> Result<()> {
    let is_shp = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("shp"));
    if !is_shp {
        return Err(Error::IncompatibleOutput {
            path: path.to_path_buf(),
            reason: "output path must end in .shp".into(),
        });
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            return Err(Error::NotFound(parent.to_path_buf()));
        }
    }

    let existing: Vec<PathBuf> = shapefile_components(path)
        .into_iter()
        .filter(|p| p.exists())
        .collect();
    if existing.is_empty() {
        return Ok(());
    }

    if let Some(dir) = existing.iter().find(|p| p.is_dir()) {
        return Err(Error::IncompatibleOutput {
            path: path.to_path_buf(),
            reason: format!("{} is a directory", dir.display()),
        });
    }
    if !overwrite {
        return Err(Error::OutputExists(path.to_path_buf()));
    }

    for component in existing {
        debug!("Removing existing {}", component.display());
        fs::remove_file(&component)?;
    }
    Ok(())
}

fn field_kind(field_type: FieldType) -> FieldKind {
    match field_type {
        FieldType::Character | FieldType::Memo => FieldKind::Character,
        FieldType::Numeric | FieldType::Integer | FieldType::Currency => FieldKind::Numeric,
        FieldType::Float | FieldType::Double => FieldKind::Float,
        FieldType::Logical => FieldKind::Logical,
        FieldType::Date | FieldType::DateTime => FieldKind::Date,
        #[allow(unreachable_patterns)]
        _ => FieldKind::Other,
    }
}

fn field_value_to_attribute(value: &FieldValue) -> AttributeValue {
    match value {
        FieldValue::Character(Some(s)) => AttributeValue::String(s.clone()),
        FieldValue::Memo(s) => AttributeValue::String(s.clone()),
        FieldValue::Numeric(Some(n)) => AttributeValue::Float(*n),
        FieldValue::Float(Some(f)) => AttributeValue::Float(f64::from(*f)),
        FieldValue::Double(d) | FieldValue::Currency(d) => AttributeValue::Float(*d),
        FieldValue::Integer(i) => AttributeValue::Int(i64::from(*i)),
        FieldValue::Logical(Some(b)) => AttributeValue::Bool(*b),
        // Null cells and date types carry no comparable value here
        _ => AttributeValue::Null,
    }
}

fn dbf_field_name(name: &str) -> Result<FieldName> {
    FieldName::try_from(name).map_err(|e| Error::Dbase(format!("invalid field name {}: {:?}", name, e)))
}

fn add_field(builder: TableWriterBuilder, field: &FieldDef) -> Result<TableWriterBuilder> {
    let name = dbf_field_name(&field.name)?;
    let length = field.length.clamp(1, 254);
    let builder = match field.kind {
        FieldKind::Numeric => builder.add_numeric_field(name, length, field.decimals),
        FieldKind::Float => builder.add_float_field(name, length, field.decimals),
        FieldKind::Logical => builder.add_logical_field(name),
        FieldKind::Character | FieldKind::Date | FieldKind::Other => {
            builder.add_character_field(name, length)
        }
    };
    Ok(builder)
}

fn feature_record(feature: &Feature, fields: &[FieldDef]) -> Record {
    let mut record = Record::default();
    for field in fields {
        let value = feature
            .get_property(&field.name)
            .unwrap_or(&AttributeValue::Null);
        let cell = match field.kind {
            FieldKind::Numeric => FieldValue::Numeric(value.as_f64()),
            FieldKind::Float => FieldValue::Float(value.as_f64().map(|v| v as f32)),
            FieldKind::Logical => FieldValue::Logical(match value {
                AttributeValue::Bool(b) => Some(*b),
                _ => None,
            }),
            FieldKind::Character | FieldKind::Date | FieldKind::Other => {
                FieldValue::Character(match value {
                    AttributeValue::Null => None,
                    other => Some(other.to_string()),
                })
            }
        };
        record.insert(field.name.clone(), cell);
    }
    record
}

/// Convert a shape to a geometry; null shapes carry none.
///
/// Polygon records come back as multipolygons and collapse to a plain
/// polygon when they hold a single part.
fn shape_to_geometry(shape: Shape) -> Result<Option<Geometry<f64>>> {
    if let Shape::NullShape = shape {
        return Ok(None);
    }
    let geometry = Geometry::try_from(shape).map_err(|e| Error::UnsupportedGeometry(e.to_string()))?;
    Ok(Some(match geometry {
        Geometry::MultiPolygon(mut mp) if mp.0.len() == 1 => Geometry::Polygon(mp.0.remove(0)),
        other => other,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{polygon, MultiPolygon, Point};

    fn counties() -> VectorDataset {
        let fresno = Feature::new(Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 100.0, y: 0.0), (x: 100.0, y: 100.0), (x: 0.0, y: 100.0), (x: 0.0, y: 0.0),
        ]))
        .with_property("NAME", AttributeValue::String("Fresno".into()))
        .with_property("POP", AttributeValue::Float(1008654.0));
        let kern = Feature::new(Geometry::Polygon(polygon![
            (x: 0.0, y: -100.0), (x: 100.0, y: -100.0), (x: 100.0, y: 0.0), (x: 0.0, y: 0.0), (x: 0.0, y: -100.0),
        ]))
        .with_property("NAME", AttributeValue::String("Kern".into()))
        .with_property("POP", AttributeValue::Null);

        VectorDataset::new(
            vec![FieldDef::character("NAME", 32), FieldDef::numeric("POP", 12, 0)],
            [fresno, kern].into_iter().collect(),
            Some(CRS::from_wkt(r#"PROJCS["Test_Albers",UNIT["Meter",1.0]]"#)),
        )
    }

    #[test]
    fn test_write_then_read_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counties.shp");
        write_shapefile(&counties(), &path, &WriteOptions::default()).unwrap();

        for component in ["shp", "shx", "dbf", "prj"] {
            assert!(path.with_extension(component).exists(), "missing .{}", component);
        }

        let ds = read_shapefile(&path).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.fields[0].name, "NAME");
        assert_eq!(ds.crs.as_ref().and_then(|c| c.name()), Some("Test_Albers"));

        let names: Vec<String> = ds
            .features
            .iter()
            .map(|f| f.get_property("NAME").unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Fresno", "Kern"]);
        assert!(ds.features.features[1].get_property("POP").unwrap().is_null());
        assert!(matches!(
            ds.features.features[0].geometry,
            Some(Geometry::Polygon(_))
        ));
    }

    #[test]
    fn test_refuses_to_overwrite_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counties.shp");
        write_shapefile(&counties(), &path, &WriteOptions::default()).unwrap();

        let err = write_shapefile(&counties(), &path, &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, Error::OutputExists(_)));

        write_shapefile(&counties(), &path, &WriteOptions { overwrite: true }).unwrap();
    }

    #[test]
    fn test_incompatible_outputs() {
        let dir = tempfile::tempdir().unwrap();

        let gdb = dir.path().join("work.gdb").join("fresno_buffer");
        let err = write_shapefile(&counties(), &gdb, &WriteOptions { overwrite: true }).unwrap_err();
        assert!(matches!(err, Error::IncompatibleOutput { .. }));

        let as_dir = dir.path().join("taken.shp");
        fs::create_dir(&as_dir).unwrap();
        let err = write_shapefile(&counties(), &as_dir, &WriteOptions { overwrite: true }).unwrap_err();
        assert!(matches!(err, Error::IncompatibleOutput { .. }));
    }

    #[test]
    fn test_missing_source() {
        let err = read_shapefile("/definitely/not/here.shp").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_rejects_non_polygon_features() {
        let mut ds = counties();
        ds.features.features[0].geometry = Some(Geometry::Point(Point::new(1.0, 1.0)));
        let dir = tempfile::tempdir().unwrap();
        let err = write_shapefile(&ds, dir.path().join("pts.shp"), &WriteOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedGeometry(_)));
    }

    #[test]
    fn test_rejected_overwrite_keeps_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counties.shp");
        write_shapefile(&counties(), &path, &WriteOptions::default()).unwrap();
        let before: Vec<Vec<u8>> = ["shp", "shx", "dbf", "prj"]
            .iter()
            .map(|ext| fs::read(path.with_extension(ext)).unwrap())
            .collect();

        let mut points = counties();
        points.features.features[0].geometry = Some(Geometry::Point(Point::new(1.0, 1.0)));
        let err = write_shapefile(&points, &path, &WriteOptions { overwrite: true }).unwrap_err();
        assert!(matches!(err, Error::UnsupportedGeometry(_)));

        let mut bad_schema = counties();
        bad_schema.fields.push(FieldDef::character("POPULATION_2020", 12));
        let err = write_shapefile(&bad_schema, &path, &WriteOptions { overwrite: true }).unwrap_err();
        assert!(matches!(err, Error::Dbase(_)));

        for (ext, bytes) in ["shp", "shx", "dbf", "prj"].iter().zip(before) {
            assert_eq!(fs::read(path.with_extension(ext)).unwrap(), bytes, ".{} changed", ext);
        }
        assert_eq!(read_shapefile(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_multipart_polygon_roundtrip() {
        let west = polygon![
            (x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0), (x: 0.0, y: 0.0),
        ];
        let east = polygon![
            (x: 20.0, y: 0.0), (x: 30.0, y: 0.0), (x: 30.0, y: 10.0), (x: 20.0, y: 10.0), (x: 20.0, y: 0.0),
        ];
        let mut ds = counties();
        ds.features.features[0].geometry = Some(Geometry::MultiPolygon(MultiPolygon::new(vec![west, east])));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parts.shp");
        write_shapefile(&ds, &path, &WriteOptions::default()).unwrap();

        let read = read_shapefile(&path).unwrap();
        match &read.features.features[0].geometry {
            Some(Geometry::MultiPolygon(mp)) => assert_eq!(mp.0.len(), 2),
            other => panic!("expected two parts, got {:?}", other),
        }
        assert!(matches!(read.features.features[1].geometry, Some(Geometry::Polygon(_))));
    }
}
