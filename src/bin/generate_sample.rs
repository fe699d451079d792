use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

const SITE_CLASSES: [(f64, &str); 4] = [(1500.0, "A"), (760.0, "B"), (360.0, "C"), (180.0, "D")];
const FAULT_TYPES: [&str; 3] = ["normal", "reverse", "strike-slip"];

/// Rough spectral shape: plateau around `corner`, decaying on both sides.
fn spectral_shape(period: f64, corner: f64) -> f64 {
    let x = period / corner;
    if x <= 1.0 {
        1.0 + 1.5 * x
    } else {
        2.5 / x.powf(1.2)
    }
}

fn site_class(vs30: f64) -> &'static str {
    SITE_CLASSES
        .iter()
        .find(|(limit, _)| vs30 >= *limit)
        .map(|(_, class)| *class)
        .unwrap_or("E")
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn round_to(v: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (v * scale).round() / scale
}

fn curve(periods: &[f64], pga: f64, corner: f64, rng: &mut SimpleRng) -> Value {
    let sa: Vec<f64> = periods
        .iter()
        .map(|&t| round_to(pga * spectral_shape(t, corner) * rng.gauss(0.0, 0.1).exp(), 5))
        .collect();
    json!({ "periods": periods, "sa": sa })
}

fn main() -> Result<()> {
    env_logger::init();

    let output_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_catalog.json".to_string());
    let mut rng = SimpleRng::new(42);

    // Natural periods: 0.01 s → 10 s, 31 log-spaced points
    let natural: Vec<f64> = (0..=30)
        .map(|i| round_to(10f64.powf(-2.0 + 3.0 * i as f64 / 30.0), 4))
        .collect();
    let standard = vec![
        0.01, 0.02, 0.05, 0.1, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 3.0, 5.0, 10.0,
    ];

    let mut records = Vec::new();
    let mut with_borehole = 0;

    for gm_no in 1..=60u32 {
        let mw = round_to(rng.uniform(4.0, 7.5), 1);
        let repi = round_to(rng.uniform(5.0, 200.0), 1);
        let rjb = round_to((repi - rng.uniform(0.0, 15.0)).max(0.0), 1);
        let vs30 = round_to(rng.uniform(150.0, 1200.0), 0);
        let as_flag = i64::from(rng.next_f64() < 0.2);
        let snr = round_to(rng.gauss(1.5, 0.8).exp(), 2);
        let depth = round_to(rng.uniform(2.0, 60.0), 1);

        // Crude attenuation for the PGA, in g
        let pga = round_to(
            (0.5 * mw - 1.3 * (repi + 10.0).ln() + 0.5 + rng.gauss(0.0, 0.3)).exp(),
            5,
        );
        let corner = 0.1 + 0.08 * (mw - 4.0);

        let mut spectra = Map::new();
        for name in ["S1", "S2"] {
            spectra.insert(name.to_string(), curve(&natural, pga, corner, &mut rng));
        }
        spectra.insert("S3".to_string(), curve(&natural, 0.6 * pga, 0.7 * corner, &mut rng));

        // About three quarters of the stations carry a borehole instrument.
        if rng.next_f64() < 0.75 {
            with_borehole += 1;
            for name in ["B1", "B2"] {
                spectra.insert(name.to_string(), curve(&natural, 0.4 * pga, corner, &mut rng));
            }
            spectra.insert("B3".to_string(), curve(&natural, 0.3 * pga, 0.7 * corner, &mut rng));
        }

        records.push(json!({
            "gmNo": gm_no,
            "Mw": mw,
            "Repi": repi,
            "Rjb": rjb,
            "Vs30": vs30,
            "ASflag": as_flag,
            "siteClass": site_class(vs30),
            "faultType": FAULT_TYPES[(rng.next_u64() % FAULT_TYPES.len() as u64) as usize],
            "depth": depth,
            "PGA": pga,
            "SNR": snr,
            "spectra": spectra,
        }));
    }

    let count = records.len();
    let catalog = json!({
        "config": {
            "noise": { "field": "SNR", "min_ratio": 3.0 },
            "grids": { "standard": standard, "natural": natural },
        },
        "schema": [
            { "name": "siteClass", "kind": "categorical" },
            { "name": "faultType", "kind": "categorical" },
            { "name": "depth", "kind": "numeric" },
            { "name": "PGA", "kind": "numeric" },
            { "name": "SNR", "kind": "numeric" },
        ],
        "records": records,
    });

    let file = File::create(&output_path)
        .with_context(|| format!("creating {output_path}"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &catalog).context("writing catalog")?;
    writer.flush().context("flushing catalog")?;

    log::info!("{with_borehole} of {count} records carry borehole spectra");
    println!(
        "Wrote {count} ground motions ({} natural periods each) to {output_path}",
        natural.len()
    );
    Ok(())
}
