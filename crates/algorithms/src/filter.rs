//! Attribute filters
//!
//! An `AttributeFilter` is an exact-match predicate over one field. It is
//! evaluated structurally against attribute values; the SQL-style rendering
//! exists for messages and logs and quotes both the field and the literal.

use regionbuf_core::{Feature, VectorDataset};
use std::fmt;
use std::path::Path;

/// Identifier quoting rules of a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDelimiter {
    /// Shapefiles, dBase tables: `"FIELD"`
    DoubleQuote,
    /// Personal geodatabases: `[FIELD]`
    Brackets,
    /// File geodatabases: bare `FIELD`
    None,
}

impl FieldDelimiter {
    /// Pick the dialect from the data source path
    pub fn for_source(source: &Path) -> Self {
        let ext = |p: &Path| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
        };
        if source.ancestors().any(|p| ext(p).as_deref() == Some("gdb")) {
            return FieldDelimiter::None;
        }
        if source.ancestors().any(|p| ext(p).as_deref() == Some("mdb")) {
            return FieldDelimiter::Brackets;
        }
        FieldDelimiter::DoubleQuote
    }

    /// Quote a field name for this dialect
    pub fn delimit(&self, field: &str) -> String {
        let field = field.trim();
        match self {
            FieldDelimiter::DoubleQuote => format!("\"{}\"", field.replace('"', "\"\"")),
            FieldDelimiter::Brackets => format!("[{}]", field.replace(']', "]]")),
            FieldDelimiter::None => field.to_string(),
        }
    }
}

/// Escape a string literal for single-quoted SQL
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Exact-match predicate `field = value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFilter {
    field: String,
    value: String,
    delimited_field: String,
}

impl AttributeFilter {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        let field = field.into();
        let delimited_field = FieldDelimiter::DoubleQuote.delimit(&field);
        Self {
            field,
            value: value.into(),
            delimited_field,
        }
    }

    /// Use an already delimited field identifier for the rendered clause
    pub fn with_delimited_field(mut self, delimited: impl Into<String>) -> Self {
        self.delimited_field = delimited.into();
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// SQL rendering with the literal escaped
    pub fn where_clause(&self) -> String {
        format!("{} = {}", self.delimited_field, quote_literal(&self.value))
    }

    /// Evaluate against a feature, resolving the field through the dataset schema
    pub fn matches(&self, dataset: &VectorDataset, feature: &Feature) -> bool {
        let Some(def) = dataset.field(&self.field) else {
            return false;
        };
        feature
            .get_property(&def.name)
            .is_some_and(|v| v.matches_literal(&self.value))
    }
}

impl fmt::Display for AttributeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.where_clause())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regionbuf_core::{AttributeValue, FieldDef};

    #[test]
    fn test_delimiter_by_source() {
        assert_eq!(
            FieldDelimiter::for_source(Path::new("data/CA_Counties.shp")),
            FieldDelimiter::DoubleQuote
        );
        assert_eq!(
            FieldDelimiter::for_source(Path::new("data/ca.gdb/counties")),
            FieldDelimiter::None
        );
        assert_eq!(
            FieldDelimiter::for_source(Path::new("data/ca.mdb/counties")),
            FieldDelimiter::Brackets
        );
        assert_eq!(FieldDelimiter::Brackets.delimit("COUNTY NAME"), "[COUNTY NAME]");
    }

    #[test]
    fn test_where_clause_escapes_quotes() {
        let filter = AttributeFilter::equals("NAME", "Fresno' OR '1'='1");
        assert_eq!(filter.where_clause(), r#""NAME" = 'Fresno'' OR ''1''=''1'"#);
    }

    #[test]
    fn test_injection_does_not_widen_selection() {
        let ds = VectorDataset::new(vec![FieldDef::character("NAME", 32)], Default::default(), None);
        let kern = Feature::empty().with_property("NAME", AttributeValue::String("Kern".into()));
        let odd = Feature::empty()
            .with_property("NAME", AttributeValue::String("O'Brien".into()));

        assert!(!AttributeFilter::equals("NAME", "x' OR '1'='1").matches(&ds, &kern));
        assert!(AttributeFilter::equals("name", "O'Brien").matches(&ds, &odd));
        assert!(!AttributeFilter::equals("MISSING", "Kern").matches(&ds, &kern));
    }
}
