//! Synthetic line injection and recovery scoring.
//!
//! Injecting lines of known position and amplitude into real spectra and
//! re-running the detector measures the completeness and false-positive
//! rate of the search as a function of amplitude.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dataset::SpectralDataset;
use crate::detect::find_peaks;
use crate::lsf::Lsf;
use crate::math::interp_at_index;

/// A flagged pixel within this many pixels of the injected center counts
/// as a recovery of the injected line.
pub const DEFAULT_MATCH_RADIUS: usize = 3;

/// Outcome of a single injection trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InjectionResult {
    /// Spectrum the line was injected into.
    pub spectrum: usize,
    /// Wavelength of the injected (sub-pixel) center.
    pub wavelength: f64,
    /// Injected amplitude.
    pub amplitude: f64,
    /// Whether any detector output landed within the match radius.
    pub detected: bool,
    /// Flagged pixels in the same spectrum outside the match radius.
    pub false_positives: usize,
}

/// Render a line of unit amplitude at a fractional pixel `center`.
///
/// The LSF profile is linearly interpolated onto the integer pixel grid.
pub fn laser_signature(num_pixels: usize, lsf: &Lsf, center: f64) -> Vec<f64> {
    (0..num_pixels)
        .map(|i| lsf.sample(i as f64 - center))
        .collect()
}

/// Inject a line into one spectrum, returning a new dataset.
///
/// The wavelength grid is shared and every other spectrum, along with all
/// inverse-variance rows, is unchanged. Masked pixels stay masked: adding
/// to NaN keeps NaN.
pub fn inject(
    ds: &SpectralDataset,
    lsf: &Lsf,
    spectrum: usize,
    center: f64,
    amplitude: f64,
) -> SpectralDataset {
    assert!(spectrum < ds.num_spectra(), "spectrum index out of range");

    let signature = laser_signature(ds.num_pixels(), lsf, center);
    let mut out = ds.clone();
    for (f, s) in out.flux_row_mut(spectrum).iter_mut().zip(signature.iter()) {
        *f += amplitude * s;
    }
    out
}

/// Run randomized injection/recovery trials against a detector threshold.
///
/// Each trial picks a random spectrum, a random valid (non-NaN flux) pixel
/// with uniform sub-pixel jitter, and a random amplitude from `amp_range`,
/// injects the line, and re-runs peak detection on the perturbed spectrum.
///
/// The dataset should already be at the stage the detector normally sees
/// (residual or normalized flux) so that injected amplitudes are
/// commensurable with `height`.
pub fn injection_trials<R: Rng>(
    ds: &SpectralDataset,
    lsf: &Lsf,
    height: f64,
    count: usize,
    amp_range: (f64, f64),
    rng: &mut R,
) -> Vec<InjectionResult> {
    assert!(amp_range.0 < amp_range.1, "amplitude range must be increasing");

    // Spectra with at least one valid pixel; injection into a fully masked
    // spectrum is meaningless.
    let usable: Vec<usize> = (0..ds.num_spectra())
        .filter(|&m| ds.flux_row(m).iter().any(|f| f.is_finite()))
        .collect();
    if usable.is_empty() {
        tracing::warn!("no spectra with valid pixels, skipping injection trials");
        return Vec::new();
    }

    let mut results = Vec::with_capacity(count);
    for _ in 0..count {
        let spectrum = usable[rng.random_range(0..usable.len())];
        let flux = ds.flux_row(spectrum);
        let valid: Vec<usize> = (0..flux.len()).filter(|&i| flux[i].is_finite()).collect();

        let pixel = valid[rng.random_range(0..valid.len())];
        let jitter: f64 = rng.random_range(-0.5..0.5);
        let center = pixel as f64 + jitter;
        let wavelength = interp_at_index(ds.wave(), center);
        let amplitude = rng.random_range(amp_range.0..amp_range.1);

        let signature = laser_signature(flux.len(), lsf, center);
        let perturbed: Vec<f64> = flux
            .iter()
            .zip(signature.iter())
            .map(|(f, s)| f + amplitude * s)
            .collect();

        let peaks = find_peaks(&perturbed, height);
        let near = |p: usize| p.abs_diff(pixel) <= DEFAULT_MATCH_RADIUS;
        let detected = peaks.iter().any(|&p| near(p));
        let false_positives = peaks.iter().filter(|&&p| !near(p)).count();

        results.push(InjectionResult {
            spectrum,
            wavelength,
            amplitude,
            detected,
            false_positives,
        });
    }

    results
}

/// Fraction of trials whose injected line was recovered.
pub fn completeness(results: &[InjectionResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().filter(|r| r.detected).count() as f64 / results.len() as f64
}
