use std::fmt;

use super::model::{FieldKind, FieldValue, GroundMotionRecord, Schema};
use crate::error::{QueryError, QueryResult};

// ---------------------------------------------------------------------------
// Filter clauses
// ---------------------------------------------------------------------------

/// Comparison applied by a single clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    InRange,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::InRange => "in-range",
        };
        f.write_str(symbol)
    }
}

/// Right-hand side of a clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(FieldValue),
    /// Unparsed `"<low> to <high>"` text.
    Range(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(v) => write!(f, "{v}"),
            Operand::Range(r) => write!(f, "{r:?}"),
        }
    }
}

impl From<FieldValue> for Operand {
    fn from(v: FieldValue) -> Self {
        Operand::Value(v)
    }
}

macro_rules! operand_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Operand {
            fn from(v: $t) -> Self {
                Operand::Value(v.into())
            }
        })*
    };
}

operand_from!(f64, i64, i32, bool, &str, String);

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: String,
    pub operator: Operator,
    pub operand: Operand,
}

impl Clause {
    pub fn new(field: impl Into<String>, operator: Operator, operand: impl Into<Operand>) -> Self {
        Self {
            field: field.into(),
            operator,
            operand: operand.into(),
        }
    }

    pub fn in_range(field: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: Operator::InRange,
            operand: Operand::Range(range.into()),
        }
    }
}

/// Clauses combined by logical AND. An empty spec matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub clauses: Vec<Clause>,
}

impl FilterSpec {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl From<Clause> for FilterSpec {
    fn from(clause: Clause) -> Self {
        Self {
            clauses: vec![clause],
        }
    }
}

impl From<Vec<Clause>> for FilterSpec {
    fn from(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }
}

// ---------------------------------------------------------------------------
// Ranges
// ---------------------------------------------------------------------------

/// Inclusive numeric interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub low: f64,
    pub high: f64,
}

impl Range {
    /// Parse `"<low> to <high>"`. Whitespace around the tokens is free and
    /// `to` is case-insensitive.
    pub fn parse(text: &str) -> QueryResult<Self> {
        let malformed = || QueryError::MalformedRange(text.to_string());
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let [low, to, high] = tokens.as_slice() else {
            return Err(malformed());
        };
        if !to.eq_ignore_ascii_case("to") {
            return Err(malformed());
        }
        let low: f64 = low.parse().map_err(|_| malformed())?;
        let high: f64 = high.parse().map_err(|_| malformed())?;
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(malformed());
        }
        Ok(Self { low, high })
    }

    pub fn contains(&self, v: f64) -> bool {
        self.low <= v && v <= self.high
    }
}

// ---------------------------------------------------------------------------
// Compiled predicates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Test {
    Numeric(Operator, f64),
    Within(Range),
    TextEquals(String),
    FlagEquals(bool),
}

/// A clause checked against the schema, ready to run over records.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    field: String,
    test: Test,
}

impl Predicate {
    /// Validate `clause` against `schema`.
    ///
    /// Fails with `UnknownField`, `TypeMismatch` or `MalformedRange`; a
    /// successfully compiled predicate never fails at evaluation time.
    pub fn compile(schema: &Schema, clause: &Clause) -> QueryResult<Self> {
        let def = schema
            .field(&clause.field)
            .ok_or_else(|| QueryError::UnknownField(clause.field.clone()))?;

        let mismatch = || QueryError::TypeMismatch {
            field: clause.field.clone(),
            kind: def.kind,
            operator: clause.operator,
            operand: clause.operand.to_string(),
        };

        let test = match (def.kind, clause.operator, &clause.operand) {
            (FieldKind::Numeric, Operator::InRange, Operand::Range(text)) => {
                Test::Within(Range::parse(text)?)
            }
            (_, Operator::InRange, _) | (_, _, Operand::Range(_)) => return Err(mismatch()),
            (FieldKind::Numeric, op, Operand::Value(v)) => {
                let v = v.as_f64().ok_or_else(mismatch)?;
                if v.is_nan() {
                    return Err(mismatch());
                }
                Test::Numeric(op, v)
            }
            (FieldKind::Categorical, Operator::Eq, Operand::Value(FieldValue::Text(s))) => {
                Test::TextEquals(s.clone())
            }
            (FieldKind::Flag, Operator::Eq, Operand::Value(v)) => {
                Test::FlagEquals(v.as_flag().ok_or_else(mismatch)?)
            }
            _ => return Err(mismatch()),
        };

        Ok(Self {
            field: clause.field.clone(),
            test,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Evaluate against one record. A record lacking the field fails the
    /// clause.
    pub fn matches(&self, record: &GroundMotionRecord) -> bool {
        match &self.test {
            Test::Numeric(op, rhs) => match record.numeric(&self.field) {
                Some(lhs) => match op {
                    Operator::Eq => lhs == *rhs,
                    Operator::Lt => lhs < *rhs,
                    Operator::Le => lhs <= *rhs,
                    Operator::Gt => lhs > *rhs,
                    Operator::Ge => lhs >= *rhs,
                    Operator::InRange => false,
                },
                None => false,
            },
            Test::Within(range) => record
                .numeric(&self.field)
                .is_some_and(|v| range.contains(v)),
            Test::TextEquals(s) => record
                .extended()
                .get(&self.field)
                .and_then(FieldValue::as_text)
                .is_some_and(|v| v == s),
            Test::FlagEquals(b) => record
                .value(&self.field)
                .and_then(|v| v.as_flag())
                .is_some_and(|v| v == *b),
        }
    }
}

/// A whole [`FilterSpec`] compiled against a schema.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilter {
    predicates: Vec<Predicate>,
}

impl CompiledFilter {
    pub fn compile(schema: &Schema, spec: &FilterSpec) -> QueryResult<Self> {
        let predicates = spec
            .clauses
            .iter()
            .map(|c| Predicate::compile(schema, c))
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(Self { predicates })
    }

    pub fn matches(&self, record: &GroundMotionRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Single-clause check: does `record` satisfy `field operator operand`?
pub fn test(
    schema: &Schema,
    record: &GroundMotionRecord,
    field: &str,
    operator: Operator,
    operand: &Operand,
) -> QueryResult<bool> {
    let clause = Clause {
        field: field.to_string(),
        operator,
        operand: operand.clone(),
    };
    Ok(Predicate::compile(schema, &clause)?.matches(record))
}

/// Pair the i-th field with the i-th range and AND the results together.
pub fn ranges_to_filter<F, R>(fields: &[F], ranges: &[R]) -> QueryResult<FilterSpec>
where
    F: AsRef<str>,
    R: AsRef<str>,
{
    if fields.len() != ranges.len() {
        return Err(QueryError::ArityMismatch {
            fields: fields.len(),
            ranges: ranges.len(),
        });
    }
    Ok(fields
        .iter()
        .zip(ranges)
        .map(|(f, r)| Clause::in_range(f.as_ref(), r.as_ref()))
        .collect::<Vec<_>>()
        .into())
}
