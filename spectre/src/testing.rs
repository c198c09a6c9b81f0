//! Shared synthetic-data helpers for tests.

#![allow(dead_code)]

use crate::dataset::SpectralDataset;

/// APOGEE-like wavelength grid: linear, 0.2 angstrom spacing.
pub fn wave_grid(n: usize) -> Vec<f64> {
    (0..n).map(|i| 15100.0 + 0.2 * i as f64).collect()
}

/// Flux baseline at `level` with a small deterministic ripple.
///
/// A perfectly constant spectrum has degenerate percentiles (nothing lies
/// strictly between the 70th and 80th), so synthetic continua carry a 1%
/// sinusoidal ripple to give the selection something to work with.
pub fn rippled_flux(n: usize, level: f64) -> Vec<f64> {
    (0..n)
        .map(|i| level * (1.0 + 0.01 * (i as f64 * 0.7).sin()))
        .collect()
}

/// Dataset of `m` identical rippled spectra at the given continuum level,
/// with unit inverse-variance everywhere.
pub fn rippled_dataset(m: usize, n: usize, level: f64) -> SpectralDataset {
    let row = rippled_flux(n, level);
    let flux: Vec<f64> = (0..m).flat_map(|_| row.iter().copied()).collect();
    let ivar = vec![1.0; m * n];
    SpectralDataset::new(wave_grid(n), flux, ivar).unwrap()
}

/// Single-spectrum dataset with a Gaussian bump on a flat baseline.
pub fn gaussian_bump_dataset(
    n: usize,
    center: f64,
    amplitude: f64,
    sigma: f64,
) -> SpectralDataset {
    let flux: Vec<f64> = (0..n)
        .map(|i| {
            let dx = i as f64 - center;
            amplitude * (-0.5 * dx * dx / (sigma * sigma)).exp()
        })
        .collect();
    SpectralDataset::new(wave_grid(n), flux, vec![1.0; n]).unwrap()
}
