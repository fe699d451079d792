#![allow(dead_code)]

use std::sync::Arc;

use kiknet_query::{
    Catalog, CatalogConfig, Component, FieldDef, FieldKind, GmNo, QueryEngine, RawRecord, Row,
    Schema, StandardGrids,
};

pub const PERIODS: [f64; 4] = [0.1, 0.2, 0.5, 1.0];
const SHAPE: [f64; 4] = [0.4, 0.8, 0.6, 0.2];

pub const STANDARD_GRID: [f64; 3] = [0.1, 0.5, 1.0];
pub const NATURAL_GRID: [f64; 4] = PERIODS;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Stored ordinate of `gm_no`'s `component` at `PERIODS[idx]`.
pub fn sa(gm_no: GmNo, component: Component, idx: usize) -> f64 {
    let scale = match component {
        Component::B1 | Component::B2 | Component::B3 => 0.5,
        _ => 1.0,
    };
    SHAPE[idx] * gm_no as f64 * scale
}

fn curve_values(gm_no: GmNo, component: Component) -> Vec<f64> {
    (0..PERIODS.len()).map(|i| sa(gm_no, component, i)).collect()
}

struct Spec {
    gm_no: GmNo,
    mw: f64,
    repi: f64,
    rjb: f64,
    vs30: f64,
    as_flag: i64,
    snr: f64,
    site_class: Option<&'static str>,
    depth: Option<f64>,
    components: &'static [Component],
}

use Component::*;

/// Six records in ingestion order. Records 2 and 5 are noisy (SNR < 3).
fn specs() -> Vec<Spec> {
    vec![
        Spec { gm_no: 1, mw: 7.0, repi: 10.0, rjb: 8.0, vs30: 760.0, as_flag: 0, snr: 12.0,
               site_class: Some("B"), depth: Some(10.0), components: &[S1, S2, S3, B1, B2, B3] },
        Spec { gm_no: 2, mw: 6.5, repi: 50.0, rjb: 45.0, vs30: 400.0, as_flag: 1, snr: 1.5,
               site_class: Some("C"), depth: None, components: &[S1, S2] },
        Spec { gm_no: 3, mw: 7.0, repi: 120.0, rjb: 118.0, vs30: 300.0, as_flag: 0, snr: 8.0,
               site_class: Some("D"), depth: Some(25.0), components: &[S1, S2, B1] },
        Spec { gm_no: 4, mw: 5.2, repi: 5.0, rjb: 2.0, vs30: 700.0, as_flag: 0, snr: 20.0,
               site_class: None, depth: None, components: &[S1, S2] },
        Spec { gm_no: 5, mw: 7.0, repi: 30.0, rjb: 25.0, vs30: 1100.0, as_flag: 0, snr: 0.5,
               site_class: Some("A"), depth: Some(3.0), components: &[S1] },
        Spec { gm_no: 6, mw: 6.0, repi: 8.0, rjb: 5.0, vs30: 760.0, as_flag: 1, snr: 4.0,
               site_class: Some("B"), depth: Some(5.0), components: &[S1, S2] },
    ]
}

pub fn raw_records() -> Vec<RawRecord> {
    specs()
        .into_iter()
        .map(|s| {
            let mut r = RawRecord::default()
                .with_field("gmNo", s.gm_no as i64)
                .with_field("Mw", s.mw)
                .with_field("Repi", s.repi)
                .with_field("Rjb", s.rjb)
                .with_field("Vs30", s.vs30)
                .with_field("ASflag", s.as_flag)
                .with_field("SNR", s.snr);
            if let Some(class) = s.site_class {
                r = r.with_field("siteClass", class);
            }
            if let Some(depth) = s.depth {
                r = r.with_field("depth", depth);
            }
            for &c in s.components {
                r = r.with_curve(c, PERIODS.to_vec(), curve_values(s.gm_no, c));
            }
            r
        })
        .collect()
}

pub fn schema() -> Schema {
    Schema::new(vec![
        FieldDef::new("siteClass", FieldKind::Categorical),
        FieldDef::new("depth", FieldKind::Numeric),
        FieldDef::new("SNR", FieldKind::Numeric),
    ])
    .unwrap()
}

pub fn config() -> CatalogConfig {
    CatalogConfig {
        grids: StandardGrids {
            standard: STANDARD_GRID.to_vec(),
            natural: NATURAL_GRID.to_vec(),
        },
        ..CatalogConfig::default()
    }
}

pub fn catalog() -> Catalog {
    init_logging();
    Catalog::build(schema(), raw_records(), config()).unwrap()
}

pub fn engine() -> QueryEngine {
    QueryEngine::new(Arc::new(catalog()))
}

pub fn gm_nos(rows: &[Row]) -> Vec<GmNo> {
    rows.iter().map(|r| r.gm_no().unwrap()).collect()
}
