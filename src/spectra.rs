//! Response-spectrum resolution onto requested period grids.
//!
//! Stored curves are sampled at whatever periods the processing produced;
//! callers ask for arbitrary periods. Between stored points the ordinate is
//! interpolated linearly, outside the stored range the nearest endpoint is
//! held.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::data::catalog::{Catalog, StandardGrids};
use crate::data::model::{Component, GmNo, SpectralCurve};
use crate::error::{QueryError, QueryResult};

/// First element of a period list selecting [`StandardGrids::standard`].
pub const STANDARD_GRID_SENTINEL: f64 = -1.0;
/// First element of a period list selecting [`StandardGrids::natural`].
pub const NATURAL_GRID_SENTINEL: f64 = -2.0;

// ---------------------------------------------------------------------------
// Period selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub enum PeriodSpec {
    /// The catalog's standard grid.
    #[default]
    Standard,
    /// The catalog's natural-period grid.
    NaturalPeriods,
    /// Caller-supplied periods, used in the order given.
    Explicit(Vec<f64>),
}

impl PeriodSpec {
    /// Interpret a sentinel-coded period list.
    ///
    /// Empty or `[-1]` selects the standard grid and `[-2]` the natural
    /// grid. Otherwise every entry must be a finite, non-negative period.
    pub fn from_list(periods: &[f64]) -> QueryResult<Self> {
        let spec = match periods.first() {
            None => return Ok(PeriodSpec::Standard),
            Some(&t) if t == STANDARD_GRID_SENTINEL => PeriodSpec::Standard,
            Some(&t) if t == NATURAL_GRID_SENTINEL => PeriodSpec::NaturalPeriods,
            Some(_) => {
                if let Some(bad) = periods.iter().find(|t| !t.is_finite() || **t < 0.0) {
                    return Err(QueryError::InvalidPeriods(format!(
                        "period {bad} is negative or not finite"
                    )));
                }
                return Ok(PeriodSpec::Explicit(periods.to_vec()));
            }
        };
        if periods.len() > 1 {
            return Err(QueryError::InvalidPeriods(format!(
                "grid sentinel {} cannot be combined with explicit periods",
                periods[0]
            )));
        }
        Ok(spec)
    }

    /// The concrete periods this spec stands for.
    pub fn resolve<'a>(&'a self, grids: &'a StandardGrids) -> QueryResult<&'a [f64]> {
        match self {
            PeriodSpec::Explicit(periods) => Ok(periods),
            PeriodSpec::Standard if grids.standard.is_empty() => {
                Err(QueryError::UnconfiguredGrid("standard"))
            }
            PeriodSpec::Standard => Ok(&grids.standard),
            PeriodSpec::NaturalPeriods if grids.natural.is_empty() => {
                Err(QueryError::UnconfiguredGrid("natural"))
            }
            PeriodSpec::NaturalPeriods => Ok(&grids.natural),
        }
    }
}

// ---------------------------------------------------------------------------
// Component selection
// ---------------------------------------------------------------------------

/// Set of requested components. Defaults to the two horizontal surface
/// channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSelection(BTreeSet<Component>);

impl Default for ComponentSelection {
    fn default() -> Self {
        Self([Component::S1, Component::S2].into_iter().collect())
    }
}

impl ComponentSelection {
    /// Parse component names; an empty list yields the default selection.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> QueryResult<Self> {
        if names.is_empty() {
            return Ok(Self::default());
        }
        let components = names
            .iter()
            .map(|n| n.as_ref().parse::<Component>())
            .collect::<QueryResult<BTreeSet<_>>>()?;
        Ok(Self(components))
    }

    pub fn contains(&self, component: Component) -> bool {
        self.0.contains(&component)
    }

    pub fn iter(&self) -> impl Iterator<Item = Component> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Component> for ComponentSelection {
    fn from_iter<I: IntoIterator<Item = Component>>(iter: I) -> Self {
        let set: BTreeSet<Component> = iter.into_iter().collect();
        if set.is_empty() {
            Self::default()
        } else {
            Self(set)
        }
    }
}

// ---------------------------------------------------------------------------
// Interpolation
// ---------------------------------------------------------------------------

/// Ordinate of `curve` at `period`.
///
/// Exact at stored periods, linear between the two bracketing points, and
/// clamped to the first / last stored value outside the stored range.
pub fn ordinate_at(curve: &SpectralCurve, period: f64) -> f64 {
    let periods = curve.periods();
    let values = curve.values();
    let last = periods.len() - 1;

    if period <= periods[0] {
        return values[0];
    }
    if period >= periods[last] {
        return values[last];
    }

    // First stored period >= `period`; 1 <= hi <= last here.
    let hi = periods.partition_point(|&t| t < period);
    if periods[hi] == period {
        return values[hi];
    }
    let lo = hi - 1;
    let w = (period - periods[lo]) / (periods[hi] - periods[lo]);
    values[lo] + w * (values[hi] - values[lo])
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Spectra of one component for the ground motions that carry it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComponentSpectra {
    /// Ground motions contributing a list, in request order.
    pub gm_nos: Vec<GmNo>,
    /// One ordinate list per entry of `gm_nos`, one value per period.
    pub ordinates: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spectra {
    /// Periods the ordinates were evaluated at.
    pub periods: Vec<f64>,
    /// One entry per requested component.
    pub components: BTreeMap<Component, ComponentSpectra>,
}

impl Spectra {
    pub fn get(&self, component: Component) -> Option<&ComponentSpectra> {
        self.components.get(&component)
    }

    pub fn ordinates(&self, component: Component) -> Option<&[Vec<f64>]> {
        self.get(component).map(|c| c.ordinates.as_slice())
    }

    /// Drop the bookkeeping and keep component → ordinate lists.
    pub fn into_ordinates(self) -> BTreeMap<Component, Vec<Vec<f64>>> {
        self.components
            .into_iter()
            .map(|(c, s)| (c, s.ordinates))
            .collect()
    }
}

/// Resolves spectra against one catalog snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SpectraResolver<'a> {
    catalog: &'a Catalog,
}

impl<'a> SpectraResolver<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Evaluate the requested components of every ground motion in `gm_nos`
    /// at the requested periods.
    ///
    /// Every id is checked before any interpolation; the first unknown one
    /// fails the whole call. A ground motion lacking a component is left out
    /// of that component's lists rather than padded.
    pub fn resolve(
        &self,
        gm_nos: &[GmNo],
        periods: &PeriodSpec,
        components: &ComponentSelection,
    ) -> QueryResult<Spectra> {
        let periods = periods.resolve(self.catalog.grids())?;
        let records = gm_nos
            .iter()
            .map(|&gm_no| {
                self.catalog
                    .get(gm_no)
                    .ok_or(QueryError::UnknownRecord(gm_no))
            })
            .collect::<QueryResult<Vec<_>>>()?;

        let mut out = BTreeMap::new();
        for component in components.iter() {
            let mut spectra = ComponentSpectra::default();
            for record in &records {
                let Some(curve) = record.curve(component) else {
                    continue;
                };
                spectra.gm_nos.push(record.gm_no());
                spectra
                    .ordinates
                    .push(periods.iter().map(|&t| ordinate_at(curve, t)).collect());
            }
            let missing = records.len() - spectra.gm_nos.len();
            if missing > 0 {
                log::debug!(
                    "{missing} of {} ground motion(s) have no {component} record",
                    records.len()
                );
            }
            out.insert(component, spectra);
        }

        Ok(Spectra {
            periods: periods.to_vec(),
            components: out,
        })
    }
}
