use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use super::model::{
    FieldDef, FieldKind, FieldValue, GmNo, GroundMotionRecord, RawRecord, Schema, SpectralCurve,
    AS_FLAG, DEFAULT_FIELDS, GM_NO, MW, REPI, RJB, VS30,
};
use crate::error::CatalogError;

// ---------------------------------------------------------------------------
// Configuration supplied with the catalog
// ---------------------------------------------------------------------------

/// How the derived noise-quality flag is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseRule {
    /// Numeric signal-to-noise field consulted for every record.
    pub field: String,
    /// Records with `field >= min_ratio` are considered clean.
    pub min_ratio: f64,
}

impl Default for NoiseRule {
    fn default() -> Self {
        Self {
            field: "SNR".to_string(),
            min_ratio: 3.0,
        }
    }
}

/// Period grids selected by the `-1` and `-2` sentinels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardGrids {
    pub standard: Vec<f64>,
    /// Periods at which the PSA values were natively computed.
    pub natural: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub noise: NoiseRule,
    pub grids: StandardGrids,
}

// ---------------------------------------------------------------------------
// Catalog – the immutable snapshot
// ---------------------------------------------------------------------------

/// Validated, read-only collection of ground-motion records in ingestion
/// order.
#[derive(Debug, Clone)]
pub struct Catalog {
    schema: Schema,
    records: Vec<GroundMotionRecord>,
    index: HashMap<GmNo, usize>,
    config: CatalogConfig,
}

impl Catalog {
    /// Validate `raw` against an explicit schema.
    pub fn build(
        schema: Schema,
        raw: Vec<RawRecord>,
        config: CatalogConfig,
    ) -> Result<Self, CatalogError> {
        validate_grid("standard", &config.grids.standard)?;
        validate_grid("natural", &config.grids.natural)?;

        let noise_declared = match schema.field(&config.noise.field) {
            Some(def) if def.kind != FieldKind::Numeric => {
                return Err(CatalogError::NoiseField(config.noise.field.clone()))
            }
            Some(_) => true,
            None => {
                log::warn!(
                    "noise field `{}` is not part of the schema; every record counts as clean",
                    config.noise.field
                );
                false
            }
        };

        let mut records = Vec::with_capacity(raw.len());
        let mut index = HashMap::with_capacity(raw.len());

        for raw_record in raw {
            let mut record = validate_record(&schema, raw_record)?;
            record.noise_ok = !noise_declared
                || record
                    .numeric(&config.noise.field)
                    .is_some_and(|snr| snr >= config.noise.min_ratio);

            if index.insert(record.gm_no, records.len()).is_some() {
                return Err(CatalogError::DuplicateGmNo(record.gm_no));
            }
            records.push(record);
        }

        let catalog = Self {
            schema,
            records,
            index,
            config,
        };
        log::info!(
            "catalog ready: {} records ({} noisy), {} extended fields",
            catalog.len(),
            catalog.noisy_count(),
            catalog.schema.extended().len()
        );
        Ok(catalog)
    }

    /// Validate `raw`, inferring extended field kinds from the values.
    ///
    /// Extended fields are declared in name order; the kind is taken from
    /// the first non-null value seen for each field.
    pub fn from_raw(raw: Vec<RawRecord>, config: CatalogConfig) -> Result<Self, CatalogError> {
        let schema = Schema::new(infer_fields(&raw))?;
        Self::build(schema, raw, config)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn grids(&self) -> &StandardGrids {
        &self.config.grids
    }

    /// Records in ingestion order.
    pub fn records(&self) -> &[GroundMotionRecord] {
        &self.records
    }

    pub fn get(&self, gm_no: GmNo) -> Option<&GroundMotionRecord> {
        self.index.get(&gm_no).map(|&i| &self.records[i])
    }

    pub fn contains(&self, gm_no: GmNo) -> bool {
        self.index.contains_key(&gm_no)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn noisy_count(&self) -> usize {
        self.records.iter().filter(|r| !r.noise_ok).count()
    }
}

fn validate_grid(grid: &'static str, periods: &[f64]) -> Result<(), CatalogError> {
    match periods.iter().find(|t| !t.is_finite() || **t < 0.0) {
        Some(t) => Err(CatalogError::InvalidGrid {
            grid,
            reason: format!("period {t} is negative or not finite"),
        }),
        None => Ok(()),
    }
}

fn infer_fields(raw: &[RawRecord]) -> Vec<FieldDef> {
    let mut kinds: BTreeMap<&str, FieldKind> = BTreeMap::new();
    for record in raw {
        for (name, value) in &record.fields {
            if DEFAULT_FIELDS.contains(&name.as_str()) || kinds.contains_key(name.as_str()) {
                continue;
            }
            if let Some(kind) = FieldKind::infer(value) {
                kinds.insert(name.as_str(), kind);
            }
        }
    }
    kinds
        .into_iter()
        .map(|(name, kind)| FieldDef::new(name, kind))
        .collect()
}

fn validate_record(schema: &Schema, raw: RawRecord) -> Result<GroundMotionRecord, CatalogError> {
    let RawRecord { mut fields, spectra } = raw;

    let gm_no = match fields.remove(GM_NO) {
        Some(value) => parse_gm_no(&value)?,
        None => return Err(CatalogError::InvalidGmNo("<missing>".to_string())),
    };

    let mut numeric = |name: &str| -> Result<f64, CatalogError> {
        let value = fields.remove(name).ok_or_else(|| CatalogError::MissingField {
            gm_no,
            field: name.to_string(),
        })?;
        value
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| CatalogError::FieldType {
                gm_no,
                field: name.to_string(),
                expected: FieldKind::Numeric,
                found: value.to_string(),
            })
    };
    let mw = numeric(MW)?;
    let repi = numeric(REPI)?;
    let rjb = numeric(RJB)?;
    let vs30 = numeric(VS30)?;

    let as_flag = match fields.remove(AS_FLAG) {
        Some(value) => value.as_flag().ok_or_else(|| CatalogError::FieldType {
            gm_no,
            field: AS_FLAG.to_string(),
            expected: FieldKind::Flag,
            found: value.to_string(),
        })?,
        None => {
            return Err(CatalogError::MissingField {
                gm_no,
                field: AS_FLAG.to_string(),
            })
        }
    };

    let mut extended = BTreeMap::new();
    for (name, value) in fields {
        if value == FieldValue::Null {
            continue;
        }
        let def = schema
            .field(&name)
            .ok_or_else(|| CatalogError::UndeclaredField {
                gm_no,
                field: name.clone(),
            })?;
        let found = value.to_string();
        let value = def
            .kind
            .normalize(value)
            .ok_or_else(|| CatalogError::FieldType {
                gm_no,
                field: name.clone(),
                expected: def.kind,
                found,
            })?;
        extended.insert(name, value);
    }

    let spectra = spectra
        .into_iter()
        .map(|(component, curve)| {
            SpectralCurve::new(curve.periods, curve.values)
                .map(|checked| (component, checked))
                .map_err(|e| CatalogError::InvalidCurve {
                    gm_no,
                    component,
                    reason: e.to_string(),
                })
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    Ok(GroundMotionRecord {
        gm_no,
        mw,
        repi,
        rjb,
        vs30,
        as_flag,
        extended,
        spectra,
        noise_ok: true,
    })
}

fn parse_gm_no(value: &FieldValue) -> Result<GmNo, CatalogError> {
    let parsed = match value {
        FieldValue::Integer(i) => GmNo::try_from(*i).ok(),
        FieldValue::Float(f) if f.fract() == 0.0 && *f >= 0.0 && *f <= GmNo::MAX as f64 => {
            Some(*f as GmNo)
        }
        _ => None,
    };
    parsed
        .filter(|&n| n > 0)
        .ok_or_else(|| CatalogError::InvalidGmNo(value.to_string()))
}

// ---------------------------------------------------------------------------
// CatalogHandle – swappable snapshot
// ---------------------------------------------------------------------------

/// Holds the current catalog snapshot.
///
/// Readers clone the `Arc` and keep querying that snapshot; `replace` swaps
/// the pointer, so an in-flight query sees either the old or the new catalog
/// in full.
#[derive(Debug)]
pub struct CatalogHandle {
    current: RwLock<Arc<Catalog>>,
}

impl CatalogHandle {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install `catalog` and return the snapshot it replaced.
    pub fn replace(&self, catalog: Catalog) -> Arc<Catalog> {
        let next = Arc::new(catalog);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        log::info!("swapping catalog snapshot ({} -> {} records)", guard.len(), next.len());
        std::mem::replace(&mut *guard, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Component;

    fn raw(gm_no: i64, snr: Option<f64>) -> RawRecord {
        let mut r = RawRecord::default()
            .with_field(GM_NO, gm_no)
            .with_field(MW, 6.5)
            .with_field(REPI, 20.0)
            .with_field(RJB, 15.0)
            .with_field(VS30, 400.0)
            .with_field(AS_FLAG, 0);
        if let Some(snr) = snr {
            r = r.with_field("SNR", snr);
        }
        r
    }

    #[test]
    fn noise_flag_is_derived_from_snr() {
        let catalog = Catalog::from_raw(
            vec![raw(1, Some(10.0)), raw(2, Some(1.0)), raw(3, None)],
            CatalogConfig::default(),
        )
        .unwrap();
        let flags: Vec<bool> = catalog.records().iter().map(|r| r.noise_ok()).collect();
        assert_eq!(flags, [true, false, false]);
        assert_eq!(catalog.noisy_count(), 2);
    }

    #[test]
    fn catalog_without_noise_field_is_all_clean() {
        let catalog =
            Catalog::from_raw(vec![raw(1, None), raw(2, None)], CatalogConfig::default()).unwrap();
        assert_eq!(catalog.noisy_count(), 0);
    }

    #[test]
    fn rejects_duplicate_and_invalid_ids() {
        let err = Catalog::from_raw(vec![raw(4, None), raw(4, None)], CatalogConfig::default())
            .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateGmNo(4));

        let err = Catalog::from_raw(vec![raw(0, None)], CatalogConfig::default()).unwrap_err();
        assert_eq!(err, CatalogError::InvalidGmNo("0".into()));

        let err = Catalog::from_raw(vec![raw(-3, None)], CatalogConfig::default()).unwrap_err();
        assert_eq!(err, CatalogError::InvalidGmNo("-3".into()));
    }

    #[test]
    fn rejects_missing_default_field() {
        let mut r = raw(9, None);
        r.fields.remove(VS30);
        let err = Catalog::from_raw(vec![r], CatalogConfig::default()).unwrap_err();
        assert_eq!(
            err,
            CatalogError::MissingField {
                gm_no: 9,
                field: VS30.into()
            }
        );
    }

    #[test]
    fn rejects_mistyped_extended_field() {
        let schema = Schema::new(vec![FieldDef::new("depth", FieldKind::Numeric)]).unwrap();
        let r = raw(2, None).with_field("depth", "deep");
        let err = Catalog::build(schema.clone(), vec![r], CatalogConfig::default()).unwrap_err();
        assert!(matches!(err, CatalogError::FieldType { gm_no: 2, expected: FieldKind::Numeric, .. }));

        let r = raw(3, None).with_field("mystery", 1.0);
        let err = Catalog::build(schema, vec![r], CatalogConfig::default()).unwrap_err();
        assert_eq!(
            err,
            CatalogError::UndeclaredField {
                gm_no: 3,
                field: "mystery".into()
            }
        );
    }

    #[test]
    fn rejects_invalid_spectral_curve() {
        let r = raw(7, None)
            .with_curve(Component::S1, vec![0.1, 1.0], vec![0.5, 0.2])
            .with_curve(Component::B2, vec![1.0, 0.1], vec![0.3, 0.1]);
        let err = Catalog::from_raw(vec![r], CatalogConfig::default()).unwrap_err();
        assert!(
            matches!(
                &err,
                CatalogError::InvalidCurve { gm_no: 7, component: Component::B2, reason }
                    if reason.contains("strictly increasing")
            ),
            "{err}"
        );

        let r = raw(8, None).with_curve(Component::S1, vec![0.1, 1.0], vec![0.5]);
        let err = Catalog::from_raw(vec![r], CatalogConfig::default()).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidCurve { gm_no: 8, .. }));
    }

    #[test]
    fn rejects_categorical_noise_field() {
        let r = raw(1, None).with_field("SNR", "high");
        let err = Catalog::from_raw(vec![r], CatalogConfig::default()).unwrap_err();
        assert_eq!(err, CatalogError::NoiseField("SNR".into()));
    }

    #[test]
    fn handle_swaps_whole_snapshots() {
        let first = Catalog::from_raw(vec![raw(1, None)], CatalogConfig::default()).unwrap();
        let second =
            Catalog::from_raw(vec![raw(1, None), raw(2, None)], CatalogConfig::default()).unwrap();
        let handle = CatalogHandle::new(first);

        let before = handle.snapshot();
        let old = handle.replace(second);
        assert_eq!(before.len(), 1);
        assert!(Arc::ptr_eq(&before, &old));
        assert_eq!(handle.snapshot().len(), 2);
    }
}
