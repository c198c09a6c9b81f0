//! Continuum estimation for individual spectra.
//!
//! The stellar continuum is the smooth baseline a spectrum would have
//! without absorption or emission features. It is estimated per spectrum:
//!
//! 1. Partition the pixel axis into fixed-length segments.
//! 2. Per segment, keep "continuum pixels" whose flux lies strictly between
//!    the segment's low and high percentiles. This drops both features and
//!    outliers and retains quiet baseline points.
//! 3. Split the pixel range into three detector-chip bands and fit an
//!    independent low-order polynomial to the continuum pixels of each.
//! 4. Evaluate each fit over its band's full range and concatenate.
//!
//! The result is fully defined at every pixel, including masked stretches,
//! via polynomial extrapolation inside each band.

#[cfg(test)]
mod tests;

use thiserror::Error;

use crate::math::{percentile_mut, polyval, solve_linear_system};

/// Configuration for continuum estimation.
#[derive(Debug, Clone)]
pub struct ContinuumConfig {
    /// Segment length in pixels for percentile-based pixel selection.
    pub segment_len: usize,
    /// Lower percentile bound of the continuum-pixel band.
    pub percentile_lo: f64,
    /// Upper percentile bound of the continuum-pixel band.
    pub percentile_hi: f64,
    /// Degree of the per-band polynomial fit.
    pub poly_degree: usize,
    /// Pixel indices where the detector chips meet. The three bands are
    /// the half-open ranges `[0, e0)`, `[e0, e1)`, `[e1, N)`; each chip has
    /// independent throughput and gets its own fit.
    pub band_edges: [usize; 2],
}

impl Default for ContinuumConfig {
    fn default() -> Self {
        Self {
            segment_len: 100,
            percentile_lo: 70.0,
            percentile_hi: 80.0,
            poly_degree: 6,
            band_edges: [3400, 6250],
        }
    }
}

impl ContinuumConfig {
    /// Validate configuration invariants. Panics on programmer error.
    pub fn validate(&self) {
        assert!(self.segment_len > 0, "segment_len must be positive");
        assert!(
            (0.0..=100.0).contains(&self.percentile_lo)
                && (0.0..=100.0).contains(&self.percentile_hi),
            "percentiles must lie in 0..=100"
        );
        assert!(
            self.percentile_lo < self.percentile_hi,
            "percentile_lo must be below percentile_hi"
        );
        assert!(self.poly_degree >= 1, "poly_degree must be at least 1");
        assert!(
            self.band_edges[0] < self.band_edges[1],
            "band edges must be increasing"
        );
    }
}

/// Errors from a single spectrum's continuum fit.
///
/// These are per-spectrum conditions: callers processing a batch isolate
/// them and keep going.
#[derive(Debug, Error)]
pub enum ContinuumError {
    #[error(
        "band {band} has {found} continuum pixels, need at least {needed} for a degree-{degree} fit"
    )]
    InsufficientPixels {
        band: usize,
        found: usize,
        needed: usize,
        degree: usize,
    },

    #[error("normal equations for band {band} are singular")]
    SingularFit { band: usize },
}

/// Estimate the continuum of one spectrum.
///
/// `flux` may contain NaN for masked pixels; the returned continuum has the
/// same length and no missing values. Errors when a band does not hold
/// enough continuum pixels for a well-posed fit.
pub fn estimate_continuum(flux: &[f64], config: &ContinuumConfig) -> Result<Vec<f64>, ContinuumError> {
    let n = flux.len();
    let continuum_pixels = select_continuum_pixels(flux, config);

    let mut continuum = vec![0.0; n];
    for (band, (start, end)) in band_ranges(n, config.band_edges).into_iter().enumerate() {
        if start >= end {
            continue; // Band lies beyond the end of this grid.
        }
        fit_band(
            flux,
            &continuum_pixels,
            band,
            start,
            end,
            config.poly_degree,
            &mut continuum,
        )?;
    }

    Ok(continuum)
}

/// The three chip bands as half-open pixel ranges, clamped to the grid.
fn band_ranges(n: usize, edges: [usize; 2]) -> [(usize, usize); 3] {
    let e0 = edges[0].min(n);
    let e1 = edges[1].min(n);
    [(0, e0), (e0, e1), (e1, n)]
}

/// Indices of pixels whose flux lies strictly between the per-segment
/// percentile bounds.
///
/// Segments with no valid flux have undefined percentiles and contribute
/// no pixels; NaN flux never qualifies. The trailing partial segment is
/// handled as-is, which is equivalent to NaN-padding the spectrum up to a
/// segment multiple.
fn select_continuum_pixels(flux: &[f64], config: &ContinuumConfig) -> Vec<usize> {
    let n = flux.len();
    let mut selected = Vec::new();
    let mut valid = Vec::with_capacity(config.segment_len);

    let mut start = 0;
    while start < n {
        let end = (start + config.segment_len).min(n);

        valid.clear();
        valid.extend(flux[start..end].iter().copied().filter(|v| v.is_finite()));
        if !valid.is_empty() {
            let hi = percentile_mut(&mut valid, config.percentile_hi);
            let lo = percentile_mut(&mut valid, config.percentile_lo);
            for (i, &f) in flux[start..end].iter().enumerate() {
                if f > lo && f < hi {
                    selected.push(start + i);
                }
            }
        }

        start = end;
    }

    selected
}

/// Fit one band's polynomial and evaluate it over the band's full range.
fn fit_band(
    flux: &[f64],
    continuum_pixels: &[usize],
    band: usize,
    start: usize,
    end: usize,
    degree: usize,
    out: &mut [f64],
) -> Result<(), ContinuumError> {
    let needed = degree + 1;
    let in_band: Vec<usize> = continuum_pixels
        .iter()
        .copied()
        .filter(|&i| i >= start && i < end)
        .collect();

    if in_band.len() < needed {
        return Err(ContinuumError::InsufficientPixels {
            band,
            found: in_band.len(),
            needed,
            degree,
        });
    }

    // Map pixel indices affinely onto [-1, 1] before building the
    // Vandermonde normal equations; degree-6 powers of raw indices in the
    // thousands are catastrophically ill-conditioned.
    let scale = Scale::for_range(start, end);
    let xs: Vec<f64> = in_band.iter().map(|&i| scale.apply(i)).collect();
    let ys: Vec<f64> = in_band.iter().map(|&i| flux[i]).collect();

    let coeffs =
        fit_polynomial(&xs, &ys, degree).ok_or(ContinuumError::SingularFit { band })?;

    for (i, slot) in out.iter_mut().enumerate().take(end).skip(start) {
        *slot = polyval(&coeffs, scale.apply(i));
    }

    Ok(())
}

/// Affine map from a pixel index range onto [-1, 1].
#[derive(Clone, Copy)]
struct Scale {
    center: f64,
    half_span: f64,
}

impl Scale {
    fn for_range(start: usize, end: usize) -> Self {
        let lo = start as f64;
        let hi = (end - 1) as f64;
        Self {
            center: (lo + hi) / 2.0,
            half_span: ((hi - lo) / 2.0).max(1.0),
        }
    }

    fn apply(&self, i: usize) -> f64 {
        (i as f64 - self.center) / self.half_span
    }
}

/// Least-squares polynomial fit via normal equations.
///
/// Returns ascending coefficients, or `None` when the system is singular.
fn fit_polynomial(xs: &[f64], ys: &[f64], degree: usize) -> Option<Vec<f64>> {
    let terms = degree + 1;
    let mut ata = vec![vec![0.0; terms]; terms];
    let mut aty = vec![0.0; terms];

    let mut powers = vec![0.0; terms];
    for (&x, &y) in xs.iter().zip(ys.iter()) {
        let mut p = 1.0;
        for slot in powers.iter_mut() {
            *slot = p;
            p *= x;
        }
        for i in 0..terms {
            aty[i] += powers[i] * y;
            for j in i..terms {
                ata[i][j] += powers[i] * powers[j];
            }
        }
    }
    for i in 1..terms {
        for j in 0..i {
            ata[i][j] = ata[j][i];
        }
    }

    solve_linear_system(&ata, &aty)
}
