//! Example: Anomalous-line search
//!
//! This example demonstrates the full search workflow on synthetic data:
//! 1. Assemble a dataset of noisy continuum spectra
//! 2. Inject a few laser-like lines at known positions
//! 3. Run the search pipeline and inspect the results
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example search_lines
//! ```

use rand::prelude::*;

use spectre::{inject, Lsf, SearchPipeline, SpectralDataset};

const NUM_SPECTRA: usize = 8;
const NUM_PIXELS: usize = 7000;

fn main() {
    // Build a synthetic dataset: each spectrum is a smooth continuum with
    // a little photon noise. In production the arrays come from the FITS
    // loading layer.
    let mut rng = StdRng::seed_from_u64(20250805);
    let wave: Vec<f64> = (0..NUM_PIXELS).map(|i| 15100.0 + 0.2 * i as f64).collect();

    let mut flux = Vec::with_capacity(NUM_SPECTRA * NUM_PIXELS);
    let mut ivar = Vec::with_capacity(NUM_SPECTRA * NUM_PIXELS);
    for m in 0..NUM_SPECTRA {
        let level = 1.5 + 0.25 * m as f64;
        for _ in 0..NUM_PIXELS {
            let noise: f64 = rng.random_range(-0.01..0.01);
            flux.push(level * (1.0 + noise));
            ivar.push(1.0 / (level * 0.01).powi(2));
        }
    }

    let ds = SpectralDataset::new(wave, flux, ivar).expect("synthetic arrays are well formed");
    println!(
        "Dataset: {} spectra x {} pixels",
        ds.num_spectra(),
        ds.num_pixels()
    );

    // Inject three lines of decreasing strength.
    let lsf = Lsf::apogee();
    let lines = [(1usize, 1200.5, 0.9), (4usize, 3500.0, 0.5), (6usize, 6600.25, 0.25)];
    let mut injected = ds;
    for &(spectrum, center, amplitude) in &lines {
        println!(
            "Injecting line: spectrum {} center {:.2} amplitude {:.2}",
            spectrum, center, amplitude
        );
        injected = inject(&injected, &lsf, spectrum, center, amplitude);
    }

    // === Search with default configuration ===
    println!("\n--- Search with default config ---");
    let pipeline = SearchPipeline::new();
    let result = pipeline.run(&injected);

    println!("Detections: {}", result.detections.len());
    println!(
        "Characterized: {} (continuum failures: {}, fit failures: {})",
        result.diagnostics.characterized,
        result.diagnostics.continuum_failures,
        result.diagnostics.characterization_failures
    );
    println!(
        "Median fitted width: {:.3} angstroms",
        result.diagnostics.median_width
    );

    // Emit the terminal records the way a downstream consumer would
    // receive them.
    println!("\nCharacterization records:");
    for c in &result.characterizations {
        let json = serde_json::to_string(c).expect("records serialize");
        println!("{}", json);
    }
}
