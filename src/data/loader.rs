use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value as JsonValue;

use super::catalog::{Catalog, CatalogConfig};
use super::model::{Component, FieldDef, FieldValue, RawCurve, RawRecord, Schema};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a catalog snapshot from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.json` – `{ "config": {...}, "schema": [...], "records": [...] }` or a
///   bare array of records
/// * `.csv`  – one row per record; `periods` and `S1`…`B3` columns contain
///   semicolon-separated floats
///
/// A CSV table carries no configuration, so catalogs read from one have no
/// standard grids; use [`load_file_with`] to supply them.
pub fn load_file(path: &Path) -> Result<Catalog> {
    load_file_with(path, None)
}

/// Like [`load_file`], with `config` taking the place of the JSON `config`
/// object or of the CSV defaults when given.
pub fn load_file_with(path: &Path, config: Option<CatalogConfig>) -> Result<Catalog> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let catalog = match ext.as_str() {
        "json" => load_json(path, config),
        "csv" => load_csv(path, config.unwrap_or_default()),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading catalog from {}", path.display()))?;

    log::info!("loaded {} records from {}", catalog.len(), path.display());
    Ok(catalog)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON layout:
///
/// ```json
/// {
///   "config":  { "noise": { "field": "SNR", "min_ratio": 3.0 },
///                "grids": { "standard": [0.01, 0.1, 1.0], "natural": [...] } },
///   "schema":  [ { "name": "siteClass", "kind": "categorical" } ],
///   "records": [
///     {
///       "gmNo": 1, "Mw": 7.0, "Repi": 10.0, "Rjb": 8.0, "Vs30": 760.0, "ASflag": 0,
///       "siteClass": "C", "SNR": 12.5,
///       "spectra": { "S1": { "periods": [0.01, 0.1], "sa": [0.3, 0.9] } }
///     }
///   ]
/// }
/// ```
///
/// `config` and `schema` are optional; without a schema the extended field
/// kinds are inferred from the values. A `config_override` replaces the
/// file's `config` object.
pub fn load_json(path: &Path, config_override: Option<CatalogConfig>) -> Result<Catalog> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json_with(&text, config_override)
}

/// Parse a JSON catalog snapshot held in memory.
pub fn parse_json(text: &str) -> Result<Catalog> {
    parse_json_with(text, None)
}

pub fn parse_json_with(text: &str, config_override: Option<CatalogConfig>) -> Result<Catalog> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;

    let (config, schema, records) = match root {
        JsonValue::Array(records) => (CatalogConfig::default(), None, records),
        JsonValue::Object(mut obj) => {
            let config = match obj.remove("config") {
                Some(v) => serde_json::from_value(v).context("parsing `config`")?,
                None => CatalogConfig::default(),
            };
            let schema = match obj.remove("schema") {
                Some(v) => Some(
                    serde_json::from_value::<Vec<FieldDef>>(v).context("parsing `schema`")?,
                ),
                None => None,
            };
            let records = match obj.remove("records") {
                Some(JsonValue::Array(records)) => records,
                _ => bail!("Expected a `records` array"),
            };
            (config, schema, records)
        }
        _ => bail!("Expected a top-level JSON object or array"),
    };
    let config = config_override.unwrap_or(config);

    let mut raw = Vec::with_capacity(records.len());

    for (i, rec) in records.into_iter().enumerate() {
        let JsonValue::Object(obj) = rec else {
            bail!("Row {i} is not a JSON object");
        };

        let mut record = RawRecord::default();
        for (key, val) in obj {
            if key == "spectra" {
                record.spectra = json_spectra(val).with_context(|| format!("Row {i}: spectra"))?;
                continue;
            }
            record.fields.insert(key, json_to_field(&val));
        }
        raw.push(record);
    }

    let catalog = match schema {
        Some(fields) => Catalog::build(Schema::new(fields)?, raw, config)?,
        None => Catalog::from_raw(raw, config)?,
    };
    Ok(catalog)
}

fn json_spectra(val: JsonValue) -> Result<BTreeMap<Component, RawCurve>> {
    let curves: BTreeMap<String, RawCurve> =
        serde_json::from_value(val).context("expected component → {periods, sa} object")?;

    curves
        .into_iter()
        .map(|(name, curve)| -> Result<(Component, RawCurve)> { Ok((name.parse()?, curve)) })
        .collect()
}

fn json_to_field(val: &JsonValue) -> FieldValue {
    match val {
        JsonValue::String(s) => FieldValue::Text(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                FieldValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                FieldValue::Float(f)
            } else {
                FieldValue::Text(n.to_string())
            }
        }
        JsonValue::Bool(b) => FieldValue::Flag(*b),
        JsonValue::Null => FieldValue::Null,
        other => FieldValue::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

const PERIODS_COLUMN: &str = "periods";

/// CSV layout:  header row with column names.
/// The `periods` column and the component columns (`S1` … `B3`) contain
/// semicolon-separated floats:
///   `"0.01;0.1;1.0"`, `"0.31;0.92;0.12"`
/// An empty component cell means the record lacks that component.
/// All other columns are treated as metadata; empty cells are absent values.
pub fn load_csv(path: &Path, config: CatalogConfig) -> Result<Catalog> {
    let reader = csv::Reader::from_path(path).context("opening CSV")?;
    read_csv(reader, config)
}

fn read_csv<R: std::io::Read>(mut reader: csv::Reader<R>, config: CatalogConfig) -> Result<Catalog> {
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let periods_idx = headers.iter().position(|h| h == PERIODS_COLUMN);
    let component_cols: Vec<(usize, Component)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| h.parse::<Component>().ok().map(|c| (i, c)))
        .collect();

    if periods_idx.is_none() && !component_cols.is_empty() {
        bail!("CSV has component columns but no '{PERIODS_COLUMN}' column");
    }

    let mut raw = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let mut out = RawRecord::default();

        let periods = match periods_idx {
            Some(idx) => {
                parse_semicolon_floats(record.get(idx).unwrap_or(""), row_no, PERIODS_COLUMN)?
            }
            None => Vec::new(),
        };

        for &(col_idx, component) in &component_cols {
            let cell = record.get(col_idx).unwrap_or("").trim();
            if cell.is_empty() {
                continue;
            }
            let values = parse_semicolon_floats(cell, row_no, component.as_str())?;
            out.spectra.insert(
                component,
                RawCurve {
                    periods: periods.clone(),
                    values,
                },
            );
        }

        for (col_idx, value) in record.iter().enumerate() {
            if Some(col_idx) == periods_idx || component_cols.iter().any(|(i, _)| *i == col_idx) {
                continue;
            }
            let value = guess_field_type(value.trim());
            if value != FieldValue::Null {
                out.fields.insert(headers[col_idx].clone(), value);
            }
        }

        raw.push(out);
    }

    Ok(Catalog::from_raw(raw, config)?)
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

fn guess_field_type(s: &str) -> FieldValue {
    if s.is_empty() {
        return FieldValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return FieldValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return FieldValue::Float(f);
    }
    if s == "true" || s == "false" {
        return FieldValue::Flag(s == "true");
    }
    FieldValue::Text(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_bare_array_infers_schema() {
        let catalog = parse_json(
            r#"[
                {"gmNo": 2, "Mw": 6.1, "Repi": 30.5, "Rjb": 28.0, "Vs30": 350, "ASflag": 1,
                 "siteClass": "D", "depth": 12,
                 "spectra": {"S1": {"periods": [0.1, 1.0], "sa": [0.5, 0.1]}}}
            ]"#,
        )
        .unwrap();

        let record = catalog.get(2).unwrap();
        assert!(record.is_aftershock());
        assert_eq!(record.vs30(), 350.0);
        assert_eq!(record.value("siteClass"), Some(FieldValue::Text("D".into())));
        assert_eq!(record.curve(Component::S1).unwrap().len(), 2);
        assert!(record.curve(Component::S2).is_none());

        let names: Vec<&str> = catalog.schema().extended().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["depth", "siteClass"]);
    }

    #[test]
    fn json_rejects_bad_component_and_curve() {
        let err = parse_json(
            r#"[{"gmNo": 1, "Mw": 6, "Repi": 1, "Rjb": 1, "Vs30": 1, "ASflag": 0,
                 "spectra": {"Z9": {"periods": [0.1], "sa": [0.5]}}}]"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("unknown component `Z9`"), "{err:#}");

        let err = parse_json(
            r#"[{"gmNo": 1, "Mw": 6, "Repi": 1, "Rjb": 1, "Vs30": 1, "ASflag": 0,
                 "spectra": {"S1": {"periods": [1.0, 0.1], "sa": [0.5, 0.2]}}}]"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("strictly increasing"), "{err:#}");
    }

    #[test]
    fn csv_reads_metadata_and_curves() {
        let data = "\
gmNo,Mw,Repi,Rjb,Vs30,ASflag,SNR,periods,S1,S2,B1
1,7.0,10.0,8.0,760.0,0,12.0,0.1;1.0,0.8;0.2,0.7;0.3,
2,5.5,40.0,39.0,300.0,1,,0.1;1.0,0.1;0.05,0.2;0.01,0.02;0.01
";
        let reader = csv::Reader::from_reader(data.as_bytes());
        let catalog = read_csv(reader, CatalogConfig::default()).unwrap();

        assert_eq!(catalog.len(), 2);
        let first = catalog.get(1).unwrap();
        assert!(first.noise_ok());
        assert!(first.curve(Component::B1).is_none());
        let second = catalog.get(2).unwrap();
        assert!(!second.noise_ok());
        assert_eq!(second.curve(Component::B1).unwrap().values(), [0.02, 0.01]);
    }

    #[test]
    fn guess_types() {
        assert_eq!(guess_field_type("12"), FieldValue::Integer(12));
        assert_eq!(guess_field_type("1.5"), FieldValue::Float(1.5));
        assert_eq!(guess_field_type("true"), FieldValue::Flag(true));
        assert_eq!(guess_field_type("C"), FieldValue::Text("C".into()));
        assert_eq!(guess_field_type(""), FieldValue::Null);
    }
}
