//! Continuum normalization.
//!
//! Dividing each spectrum by its estimated continuum puts every spectrum on
//! a common baseline near 1.0, which makes flux thresholds comparable
//! across stars. Inverse-variance is rescaled by the squared continuum so
//! that weights stay consistent with the transformed flux.

use rayon::prelude::*;

use crate::continuum::{estimate_continuum, ContinuumConfig, ContinuumError};
use crate::dataset::SpectralDataset;

/// Outcome of batch continuum normalization.
#[derive(Debug)]
pub struct NormalizeResult {
    /// The continuum-normalized dataset. Spectra whose continuum fit failed
    /// are carried as fully masked rows so spectrum indices stay aligned.
    pub dataset: SpectralDataset,
    /// Per-spectrum estimated continua; `None` for failed fits.
    pub continua: Vec<Option<Vec<f64>>>,
    /// Continuum failures, isolated per spectrum.
    pub failures: Vec<(usize, ContinuumError)>,
}

/// Normalize one spectrum by a known continuum. Pure and side-effect free.
///
/// Returns `(flux / continuum, ivar * continuum^2)`; NaN positions are
/// preserved.
pub fn normalize_spectrum(flux: &[f64], ivar: &[f64], continuum: &[f64]) -> (Vec<f64>, Vec<f64>) {
    debug_assert_eq!(flux.len(), continuum.len());
    debug_assert_eq!(ivar.len(), continuum.len());

    let norm_flux = flux
        .iter()
        .zip(continuum.iter())
        .map(|(f, c)| f / c)
        .collect();
    let norm_ivar = ivar
        .iter()
        .zip(continuum.iter())
        .map(|(v, c)| v * c * c)
        .collect();
    (norm_flux, norm_ivar)
}

/// Estimate a continuum for every spectrum and normalize the dataset.
///
/// Spectra are independent, so the continuum fits run in parallel. A failed
/// fit masks that spectrum's row and is reported in `failures`; it never
/// aborts the rest of the batch.
pub fn continuum_normalize(ds: &SpectralDataset, config: &ContinuumConfig) -> NormalizeResult {
    config.validate();
    let n = ds.num_pixels();

    let per_spectrum: Vec<Result<(Vec<f64>, Vec<f64>, Vec<f64>), ContinuumError>> = (0..ds
        .num_spectra())
        .into_par_iter()
        .map(|m| {
            let continuum = estimate_continuum(ds.flux_row(m), config)?;
            let (flux, ivar) = normalize_spectrum(ds.flux_row(m), ds.ivar_row(m), &continuum);
            Ok((flux, ivar, continuum))
        })
        .collect();

    let mut flux = Vec::with_capacity(ds.num_spectra() * n);
    let mut ivar = Vec::with_capacity(ds.num_spectra() * n);
    let mut continua = Vec::with_capacity(ds.num_spectra());
    let mut failures = Vec::new();

    for (m, outcome) in per_spectrum.into_iter().enumerate() {
        match outcome {
            Ok((f, v, c)) => {
                flux.extend(f);
                ivar.extend(v);
                continua.push(Some(c));
            }
            Err(err) => {
                tracing::warn!("continuum fit failed for spectrum {}: {}", m, err);
                flux.extend(std::iter::repeat(f64::NAN).take(n));
                ivar.extend(std::iter::repeat(0.0).take(n));
                continua.push(None);
                failures.push((m, err));
            }
        }
    }

    tracing::debug!(
        "normalized {} spectra ({} continuum failures)",
        ds.num_spectra(),
        failures.len()
    );

    NormalizeResult {
        dataset: ds.with_rows(flux, ivar),
        continua,
        failures,
    }
}
