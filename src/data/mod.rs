//! Data layer: core types, catalog snapshot, loading, and filtering.
//!
//! Architecture:
//! ```text
//!  .json / .csv
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → Vec<RawRecord> + CatalogConfig
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ catalog   │  validate fields + curves once → immutable Catalog
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  compile clauses against the schema → record predicates
//!   └──────────┘
//! ```

pub mod catalog;
pub mod filter;
pub mod loader;
pub mod model;
