//! Residual extraction against a cross-spectrum reference.
//!
//! A feature shared by most spectra in a batch is a systematic artifact
//! (telluric contamination, imperfect sky subtraction, instrument
//! signatures), not a genuine anomaly of one star. Subtracting the
//! per-pixel median across spectra isolates star-specific outliers.

use crate::dataset::SpectralDataset;
use crate::math::median_f64_mut;

/// Default floor below which normalized flux is considered unreliable
/// (saturated or badly calibrated) and excluded from the reference median.
pub const DEFAULT_RELIABILITY_FLOOR: f64 = 0.05;

/// Per-pixel median across spectra, ignoring NaN and values below `floor`.
///
/// Columns with no usable values get a NaN reference, which propagates
/// missingness into the residuals rather than inventing a baseline.
pub fn reference_spectrum(ds: &SpectralDataset, floor: f64) -> Vec<f64> {
    let n = ds.num_pixels();
    let m = ds.num_spectra();

    let mut reference = Vec::with_capacity(n);
    let mut column = Vec::with_capacity(m);
    for pixel in 0..n {
        column.clear();
        for spectrum in 0..m {
            let f = ds.flux_row(spectrum)[pixel];
            if f.is_finite() && f >= floor {
                column.push(f);
            }
        }
        if column.is_empty() {
            reference.push(f64::NAN);
        } else {
            reference.push(median_f64_mut(&mut column));
        }
    }
    reference
}

/// Subtract a reference vector from every spectrum.
///
/// Returns a new dataset snapshot; inverse-variance is carried through
/// unchanged since subtracting a constant reference does not change the
/// per-pixel uncertainty.
pub fn subtract_reference(ds: &SpectralDataset, reference: &[f64]) -> SpectralDataset {
    debug_assert_eq!(reference.len(), ds.num_pixels());

    let mut flux = Vec::with_capacity(ds.num_spectra() * ds.num_pixels());
    let mut ivar = Vec::with_capacity(ds.num_spectra() * ds.num_pixels());
    for m in 0..ds.num_spectra() {
        flux.extend(
            ds.flux_row(m)
                .iter()
                .zip(reference.iter())
                .map(|(f, r)| f - r),
        );
        ivar.extend_from_slice(ds.ivar_row(m));
    }
    ds.with_rows(flux, ivar)
}

/// Compute residuals of a normalized dataset against its own cross-spectrum
/// median reference.
pub fn residuals(ds: &SpectralDataset, floor: f64) -> (SpectralDataset, Vec<f64>) {
    let reference = reference_spectrum(ds, floor);
    let residual = subtract_reference(ds, &reference);
    (residual, reference)
}
