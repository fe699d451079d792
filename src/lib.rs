//! Query layer over an in-memory catalog of KiK-net ground-motion records.
//!
//! A [`Catalog`] is validated once and then only read. [`QueryEngine`]
//! filters its records by metadata and projects the requested fields;
//! [`SpectraResolver`] interpolates the stored response spectra onto the
//! requested periods.
//!
//! ```no_run
//! use std::sync::Arc;
//! use kiknet_query::{loader, Projection, QueryEngine};
//!
//! # fn main() -> anyhow::Result<()> {
//! let catalog = loader::load_file("catalog.json".as_ref())?;
//! let engine = QueryEngine::new(Arc::new(catalog));
//!
//! let rows = engine.param_in_range("Vs30", "700 to 760", &Projection::Default, true)?;
//! let spectra = engine.spectra_for_gm_nos(&[1, 2], &[0.1, 1.0], &["S1", "B1"])?;
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod error;
pub mod query;
pub mod request;
pub mod spectra;

pub use data::catalog::{Catalog, CatalogConfig, CatalogHandle, NoiseRule, StandardGrids};
pub use data::filter::{Clause, FilterSpec, Operand, Operator, Range};
pub use data::loader;
pub use data::model::{
    Component, FieldDef, FieldKind, FieldValue, GmNo, GroundMotionRecord, RawCurve, RawRecord,
    Schema, SpectralCurve, DEFAULT_FIELDS,
};
pub use error::{CatalogError, QueryError, QueryResult};
pub use query::{Projection, QueryEngine, Row, WILDCARD};
pub use spectra::{ComponentSelection, ComponentSpectra, PeriodSpec, Spectra, SpectraResolver};
