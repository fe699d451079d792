use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::data::catalog::{Catalog, CatalogHandle};
use crate::data::filter::{ranges_to_filter, Clause, CompiledFilter, FilterSpec, Operator};
use crate::data::model::{FieldValue, GmNo, GroundMotionRecord, Schema, DEFAULT_FIELDS, GM_NO};
use crate::error::{QueryError, QueryResult};
use crate::spectra::{ComponentSelection, PeriodSpec, Spectra, SpectraResolver};

/// Wildcard entry selecting every field present on a record.
pub const WILDCARD: &str = "*";

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Which fields each result row carries.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Projection {
    /// `gmNo, Mw, Repi, Rjb, Vs30, ASflag`.
    #[default]
    Default,
    /// Exactly these fields, in this order. Records lacking any of them
    /// are left out of the result.
    Fields(Vec<String>),
    /// Default fields, then every extended field present on the record in
    /// schema order.
    All,
}

impl Projection {
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Fields(names.into_iter().map(Into::into).collect())
    }

    /// Interpret a requested-parameter list: empty means the default set and
    /// any `*` entry means all fields. Repeated names are kept once.
    pub fn from_requested<S: AsRef<str>>(names: &[S]) -> Self {
        let names: Vec<&str> = names
            .iter()
            .map(|n| n.as_ref().trim())
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Projection::Default;
        }
        if names.contains(&WILDCARD) {
            return Projection::All;
        }
        let mut unique: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if !unique.iter().any(|n| n == name) {
                unique.push(name.to_string());
            }
        }
        Projection::Fields(unique)
    }

    /// Check every explicitly requested name against the schema.
    pub fn validate(&self, schema: &Schema) -> QueryResult<()> {
        if let Projection::Fields(names) = self {
            if let Some(unknown) = names.iter().find(|n| !schema.contains(n)) {
                return Err(QueryError::UnknownField(unknown.clone()));
            }
        }
        Ok(())
    }

    /// `None` when the record lacks an explicitly requested field.
    fn project(&self, schema: &Schema, record: &GroundMotionRecord) -> Option<Row> {
        let mut row = Row::default();
        match self {
            Projection::Default => row.extend_defaults(record),
            Projection::Fields(names) => {
                for name in names {
                    row.push(name.clone(), record.value(name)?);
                }
            }
            Projection::All => {
                row.extend_defaults(record);
                for def in schema.extended() {
                    if let Some(value) = record.extended().get(&def.name) {
                        row.push(def.name.clone(), value.clone());
                    }
                }
            }
        }
        Some(row)
    }
}

// ---------------------------------------------------------------------------
// Row – one projected record
// ---------------------------------------------------------------------------

/// Ordered field → value mapping for one matching record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, FieldValue)>,
}

impl Row {
    fn push(&mut self, name: String, value: FieldValue) {
        self.fields.push((name, value));
    }

    fn extend_defaults(&mut self, record: &GroundMotionRecord) {
        for name in DEFAULT_FIELDS {
            if let Some(value) = record.value(name) {
                self.push(name.to_string(), value);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// The record's gmNo, when it was projected.
    pub fn gm_no(&self) -> Option<GmNo> {
        match self.get(GM_NO)? {
            FieldValue::Integer(i) => GmNo::try_from(*i).ok(),
            _ => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// QueryEngine
// ---------------------------------------------------------------------------

/// Read-only query surface over one catalog snapshot.
///
/// Cloning is cheap; clones share the snapshot.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    catalog: Arc<Catalog>,
}

impl QueryEngine {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Engine bound to the handle's current snapshot. Later swaps on the
    /// handle do not affect it.
    pub fn from_handle(handle: &CatalogHandle) -> Self {
        Self::new(handle.snapshot())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Records passing the noise filter and `filter`, in catalog order.
    ///
    /// `filter` and `projection` are fully validated before the scan starts.
    /// A record missing a field named by an explicit projection is skipped.
    pub fn query(
        &self,
        filter: &FilterSpec,
        projection: &Projection,
        filter_noisy: bool,
    ) -> QueryResult<Vec<Row>> {
        let schema = self.catalog.schema();
        projection.validate(schema)?;
        let rows: Vec<Row> = self
            .scan(filter, filter_noisy)?
            .filter_map(|record| projection.project(schema, record))
            .collect();

        log::debug!(
            "query with {} clause(s) matched {} of {} records",
            filter.clauses.len(),
            rows.len(),
            self.catalog.len()
        );
        Ok(rows)
    }

    /// Number of matching records, without projecting them.
    pub fn count(&self, filter: &FilterSpec, filter_noisy: bool) -> QueryResult<usize> {
        Ok(self.scan(filter, filter_noisy)?.count())
    }

    fn scan<'a>(
        &'a self,
        filter: &FilterSpec,
        filter_noisy: bool,
    ) -> QueryResult<impl Iterator<Item = &'a GroundMotionRecord> + 'a> {
        let compiled = CompiledFilter::compile(self.catalog.schema(), filter)?;
        Ok(self
            .catalog
            .records()
            .iter()
            .filter(move |r| !filter_noisy || r.noise_ok())
            .filter(move |r| compiled.matches(r)))
    }

    fn compare(
        &self,
        field: &str,
        operator: Operator,
        value: FieldValue,
        projection: &Projection,
        filter_noisy: bool,
    ) -> QueryResult<Vec<Row>> {
        let filter = FilterSpec::from(Clause::new(field, operator, value));
        self.query(&filter, projection, filter_noisy)
    }

    /// Records where `field == value`.
    pub fn param_equals(
        &self,
        field: &str,
        value: impl Into<FieldValue>,
        projection: &Projection,
        filter_noisy: bool,
    ) -> QueryResult<Vec<Row>> {
        self.compare(field, Operator::Eq, value.into(), projection, filter_noisy)
    }

    /// Records where `field < value`.
    pub fn param_less_than(
        &self,
        field: &str,
        value: impl Into<FieldValue>,
        projection: &Projection,
        filter_noisy: bool,
    ) -> QueryResult<Vec<Row>> {
        self.compare(field, Operator::Lt, value.into(), projection, filter_noisy)
    }

    /// Records where `field <= value`.
    pub fn param_less_than_equals(
        &self,
        field: &str,
        value: impl Into<FieldValue>,
        projection: &Projection,
        filter_noisy: bool,
    ) -> QueryResult<Vec<Row>> {
        self.compare(field, Operator::Le, value.into(), projection, filter_noisy)
    }

    /// Records where `field > value`.
    pub fn param_greater_than(
        &self,
        field: &str,
        value: impl Into<FieldValue>,
        projection: &Projection,
        filter_noisy: bool,
    ) -> QueryResult<Vec<Row>> {
        self.compare(field, Operator::Gt, value.into(), projection, filter_noisy)
    }

    /// Records where `field >= value`.
    pub fn param_greater_than_equals(
        &self,
        field: &str,
        value: impl Into<FieldValue>,
        projection: &Projection,
        filter_noisy: bool,
    ) -> QueryResult<Vec<Row>> {
        self.compare(field, Operator::Ge, value.into(), projection, filter_noisy)
    }

    /// Records where `field` lies within `range` (`"<low> to <high>"`,
    /// both bounds inclusive).
    pub fn param_in_range(
        &self,
        field: &str,
        range: &str,
        projection: &Projection,
        filter_noisy: bool,
    ) -> QueryResult<Vec<Row>> {
        let filter = FilterSpec::from(Clause::in_range(field, range));
        self.query(&filter, projection, filter_noisy)
    }

    /// Records where the i-th field lies within the i-th range, for every i.
    pub fn multi_params_in_range<F, R>(
        &self,
        fields: &[F],
        ranges: &[R],
        projection: &Projection,
        filter_noisy: bool,
    ) -> QueryResult<Vec<Row>>
    where
        F: AsRef<str>,
        R: AsRef<str>,
    {
        let filter = ranges_to_filter(fields, ranges)?;
        self.query(&filter, projection, filter_noisy)
    }

    pub fn resolver(&self) -> SpectraResolver<'_> {
        SpectraResolver::new(&self.catalog)
    }

    /// Response spectra for `gm_nos`.
    ///
    /// `periods` is an explicit period list, `[-1]` (or empty) for the
    /// standard grid, or `[-2]` for the natural-period grid. An empty
    /// `components` list selects `S1` and `S2`.
    pub fn spectra_for_gm_nos<S: AsRef<str>>(
        &self,
        gm_nos: &[GmNo],
        periods: &[f64],
        components: &[S],
    ) -> QueryResult<Spectra> {
        let components = ComponentSelection::parse(components)?;
        let periods = PeriodSpec::from_list(periods)?;
        self.resolver().resolve(gm_nos, &periods, &components)
    }
}
