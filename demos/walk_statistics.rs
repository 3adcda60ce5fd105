//! Two-photon statistics of a three-step walk seeded with weak coherent
//! light, for perfect and imperfect overlap between the heralded photon and
//! the seed.
//!
//! Run with `RUST_LOG=debug cargo run --example walk_statistics` to see the
//! circuit build and evaluation spans.

use tracing::info;
use utbe::{Simulator, WalkConfig, WalkResult, partially_distinguishable_table};

fn main() -> WalkResult<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let seed_intensity: f64 = 0.08;
    let efficiency = 0.07;
    let overlap = 0.7;
    let max_photons = 2;

    let config = WalkConfig::new(3)
        .with_squeezing(0.07)
        .with_coherent(seed_intensity.sqrt(), 0.0)
        .with_loss(1.0 - efficiency)
        .with_dark_counts(5e-6);

    let simulator = Simulator::new();
    info!("{}", simulator.compile(&config)?);

    let ideal = partially_distinguishable_table(&simulator, &config, 1.0, max_photons)?;
    let imperfect = partially_distinguishable_table(&simulator, &config, overlap, max_photons)?;

    info!("two-photon outcomes (t0,t1,t2,t3): perfect | overlap {}", overlap);
    let twofold_ideal = ideal.filter_photon_number(2).normalized()?;
    let twofold_imperfect = imperfect.filter_photon_number(2).normalized()?;
    for (outcome, p) in twofold_ideal.iter() {
        let q = twofold_imperfect.get(outcome).unwrap_or(0.0);
        info!("  {:?}: {:.4} | {:.4}", outcome, p, q);
    }

    let shots = twofold_imperfect.sample(10_000, 2024)?;
    info!("10000 sampled two-photon events at overlap {}:", overlap);
    for (outcome, count) in &shots {
        info!("  {:?}: {}", outcome, count);
    }
    Ok(())
}
