use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{CatalogError, QueryError};

/// Ground-motion number. Unique and positive within a catalog.
pub type GmNo = u32;

// ---------------------------------------------------------------------------
// Field names of the default projection
// ---------------------------------------------------------------------------

pub const GM_NO: &str = "gmNo";
pub const MW: &str = "Mw";
pub const REPI: &str = "Repi";
pub const RJB: &str = "Rjb";
pub const VS30: &str = "Vs30";
pub const AS_FLAG: &str = "ASflag";

/// The default field set, in projection order.
pub const DEFAULT_FIELDS: [&str; 6] = [GM_NO, MW, REPI, RJB, VS30, AS_FLAG];

// ---------------------------------------------------------------------------
// FieldValue – a single metadata cell
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value.
///
/// `Null` marks an empty cell in adapter input and never appears in a
/// stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Flag(bool),
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Text(s) => write!(f, "{s:?}"),
            FieldValue::Flag(b) => write!(f, "{b}"),
            FieldValue::Null => write!(f, "<null>"),
        }
    }
}

impl FieldValue {
    /// Try to interpret the value as an `f64` for numeric comparison.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Flags are stored as booleans but commonly written as `0` / `1`.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            FieldValue::Integer(0) => Some(false),
            FieldValue::Integer(1) => Some(true),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(v as i64)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Flag(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Declared type of a catalog field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Numeric,
    Categorical,
    Flag,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Numeric => "numeric",
            FieldKind::Categorical => "categorical",
            FieldKind::Flag => "flag",
        };
        f.write_str(name)
    }
}

impl FieldKind {
    /// Guess the kind of a column from one of its values.
    pub fn infer(value: &FieldValue) -> Option<FieldKind> {
        match value {
            FieldValue::Integer(_) | FieldValue::Float(_) => Some(FieldKind::Numeric),
            FieldValue::Text(_) => Some(FieldKind::Categorical),
            FieldValue::Flag(_) => Some(FieldKind::Flag),
            FieldValue::Null => None,
        }
    }

    /// Bring a stored value into the canonical representation for this kind.
    /// Returns `None` when the value does not belong to the kind.
    pub fn normalize(self, value: FieldValue) -> Option<FieldValue> {
        match self {
            FieldKind::Numeric => value.as_f64().map(|_| value),
            FieldKind::Categorical => value.as_text().is_some().then_some(value),
            FieldKind::Flag => value.as_flag().map(FieldValue::Flag),
        }
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered field declarations: the six default fields, then the extended
/// fields in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    fields: Vec<FieldDef>,
}

impl Schema {
    pub fn new(extended: Vec<FieldDef>) -> Result<Self, CatalogError> {
        let mut fields = Self::default().fields;
        for def in extended {
            if fields.iter().any(|f| f.name == def.name) {
                return Err(CatalogError::DuplicateField(def.name));
            }
            fields.push(def);
        }
        Ok(Self { fields })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// All declared fields, defaults first.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Extended fields only, in declaration order.
    pub fn extended(&self) -> &[FieldDef] {
        &self.fields[DEFAULT_FIELDS.len()..]
    }
}

impl Default for Schema {
    /// The default fields only.
    fn default() -> Self {
        Self {
            fields: vec![
                FieldDef::new(GM_NO, FieldKind::Numeric),
                FieldDef::new(MW, FieldKind::Numeric),
                FieldDef::new(REPI, FieldKind::Numeric),
                FieldDef::new(RJB, FieldKind::Numeric),
                FieldDef::new(VS30, FieldKind::Numeric),
                FieldDef::new(AS_FLAG, FieldKind::Flag),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Component – a named sensor channel
// ---------------------------------------------------------------------------

/// Sensor channel of a KiK-net station.
///
/// `S*` are the surface instrument, `B*` the borehole instrument; `1` is EW,
/// `2` NS and `3` vertical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Component {
    S1,
    S2,
    S3,
    B1,
    B2,
    B3,
}

impl Component {
    pub const ALL: [Component; 6] = [
        Component::S1,
        Component::S2,
        Component::S3,
        Component::B1,
        Component::B2,
        Component::B3,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Component::S1 => "S1",
            Component::S2 => "S2",
            Component::S3 => "S3",
            Component::B1 => "B1",
            Component::B2 => "B2",
            Component::B3 => "B3",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Component::ALL
            .into_iter()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| QueryError::UnknownComponent(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// SpectralCurve – one response spectrum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurveError {
    #[error("curve has no points")]
    Empty,
    #[error("{periods} periods but {values} spectral values")]
    LengthMismatch { periods: usize, values: usize },
    #[error("period {0} is negative or not finite")]
    BadPeriod(f64),
    #[error("periods must be strictly increasing ({prev} followed by {next})")]
    NotIncreasing { prev: f64, next: f64 },
    #[error("spectral value at period {0} is not finite")]
    BadValue(f64),
}

/// Response spectrum sampled at strictly increasing, non-negative periods.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralCurve {
    periods: Vec<f64>,
    values: Vec<f64>,
}

impl SpectralCurve {
    pub fn new(periods: Vec<f64>, values: Vec<f64>) -> Result<Self, CurveError> {
        if periods.len() != values.len() {
            return Err(CurveError::LengthMismatch {
                periods: periods.len(),
                values: values.len(),
            });
        }
        if periods.is_empty() {
            return Err(CurveError::Empty);
        }
        for (i, (&t, &sa)) in periods.iter().zip(&values).enumerate() {
            if !t.is_finite() || t < 0.0 {
                return Err(CurveError::BadPeriod(t));
            }
            if !sa.is_finite() {
                return Err(CurveError::BadValue(t));
            }
            if i > 0 && periods[i - 1] >= t {
                return Err(CurveError::NotIncreasing {
                    prev: periods[i - 1],
                    next: t,
                });
            }
        }
        Ok(Self { periods, values })
    }

    pub fn periods(&self) -> &[f64] {
        &self.periods
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Spectrum exactly as a catalog adapter read it; checked when the catalog
/// is built.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCurve {
    pub periods: Vec<f64>,
    #[serde(rename = "sa")]
    pub values: Vec<f64>,
}

/// An unvalidated record as produced by a catalog adapter.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    /// Metadata columns, default and extended alike.
    pub fields: BTreeMap<String, FieldValue>,
    pub spectra: BTreeMap<Component, RawCurve>,
}

impl RawRecord {
    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn with_curve(
        mut self,
        component: Component,
        periods: Vec<f64>,
        values: Vec<f64>,
    ) -> Self {
        self.spectra.insert(component, RawCurve { periods, values });
        self
    }
}

/// A validated ground-motion record.
#[derive(Debug, Clone)]
pub struct GroundMotionRecord {
    pub(crate) gm_no: GmNo,
    pub(crate) mw: f64,
    pub(crate) repi: f64,
    pub(crate) rjb: f64,
    pub(crate) vs30: f64,
    pub(crate) as_flag: bool,
    pub(crate) extended: BTreeMap<String, FieldValue>,
    pub(crate) spectra: BTreeMap<Component, SpectralCurve>,
    pub(crate) noise_ok: bool,
}

impl GroundMotionRecord {
    pub fn gm_no(&self) -> GmNo {
        self.gm_no
    }

    pub fn mw(&self) -> f64 {
        self.mw
    }

    pub fn repi(&self) -> f64 {
        self.repi
    }

    pub fn rjb(&self) -> f64 {
        self.rjb
    }

    pub fn vs30(&self) -> f64 {
        self.vs30
    }

    pub fn is_aftershock(&self) -> bool {
        self.as_flag
    }

    /// Derived signal-to-noise quality; `false` marks a noisy record.
    pub fn noise_ok(&self) -> bool {
        self.noise_ok
    }

    /// Value of any field by name, or `None` if the record lacks it.
    pub fn value(&self, field: &str) -> Option<FieldValue> {
        match field {
            GM_NO => Some(FieldValue::Integer(self.gm_no as i64)),
            MW => Some(FieldValue::Float(self.mw)),
            REPI => Some(FieldValue::Float(self.repi)),
            RJB => Some(FieldValue::Float(self.rjb)),
            VS30 => Some(FieldValue::Float(self.vs30)),
            AS_FLAG => Some(FieldValue::Flag(self.as_flag)),
            other => self.extended.get(other).cloned(),
        }
    }

    /// Numeric view of a field, without cloning text values.
    pub fn numeric(&self, field: &str) -> Option<f64> {
        match field {
            GM_NO => Some(self.gm_no as f64),
            MW => Some(self.mw),
            REPI => Some(self.repi),
            RJB => Some(self.rjb),
            VS30 => Some(self.vs30),
            AS_FLAG => None,
            other => self.extended.get(other).and_then(FieldValue::as_f64),
        }
    }

    pub fn extended(&self) -> &BTreeMap<String, FieldValue> {
        &self.extended
    }

    pub fn curve(&self, component: Component) -> Option<&SpectralCurve> {
        self.spectra.get(&component)
    }
}
