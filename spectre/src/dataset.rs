//! Spectral dataset container.
//!
//! A [`SpectralDataset`] holds a batch of spectra sharing one wavelength
//! grid. Flux and inverse-variance are stored row-major (one row per
//! spectrum) in flat buffers with row accessors.
//!
//! Missing measurements are marked with NaN in `flux`; an inverse-variance
//! of zero or NaN marks an unusable pixel. A pixel masked in either array
//! is treated as masked in both, see [`SpectralDataset::valid_pixel`].

use thiserror::Error;

/// Errors raised while assembling a dataset.
///
/// These are batch-level invariant violations and are fatal: a dataset
/// that fails construction cannot enter the pipeline.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("flux ({flux_len}) and ivar ({ivar_len}) lengths differ")]
    ShapeMismatch { flux_len: usize, ivar_len: usize },

    #[error("flux length {flux_len} is not a multiple of the wavelength grid length {wave_len}")]
    RaggedRows { flux_len: usize, wave_len: usize },

    #[error("wavelength grid is empty")]
    EmptyWavelengthGrid,

    #[error("wavelength grid is not strictly increasing at index {index}")]
    NonMonotonicWavelength { index: usize },
}

/// A batch of spectra on a shared wavelength grid.
#[derive(Debug, Clone)]
pub struct SpectralDataset {
    wave: Vec<f64>,
    flux: Vec<f64>,
    ivar: Vec<f64>,
    num_spectra: usize,
}

impl SpectralDataset {
    /// Build a dataset from flat row-major flux/ivar buffers.
    ///
    /// Validates that flux and ivar have identical shape, that both are a
    /// whole number of rows of `wave.len()`, and that the wavelength grid
    /// is strictly increasing.
    pub fn new(wave: Vec<f64>, flux: Vec<f64>, ivar: Vec<f64>) -> Result<Self, DatasetError> {
        if wave.is_empty() {
            return Err(DatasetError::EmptyWavelengthGrid);
        }
        if flux.len() != ivar.len() {
            return Err(DatasetError::ShapeMismatch {
                flux_len: flux.len(),
                ivar_len: ivar.len(),
            });
        }
        if flux.len() % wave.len() != 0 {
            return Err(DatasetError::RaggedRows {
                flux_len: flux.len(),
                wave_len: wave.len(),
            });
        }
        for i in 1..wave.len() {
            if !(wave[i] > wave[i - 1]) {
                return Err(DatasetError::NonMonotonicWavelength { index: i });
            }
        }

        let num_spectra = flux.len() / wave.len();
        Ok(Self {
            wave,
            flux,
            ivar,
            num_spectra,
        })
    }

    /// Build a dataset from per-spectrum rows.
    pub fn from_spectra(
        wave: Vec<f64>,
        flux_rows: Vec<Vec<f64>>,
        ivar_rows: Vec<Vec<f64>>,
    ) -> Result<Self, DatasetError> {
        let flux: Vec<f64> = flux_rows.into_iter().flatten().collect();
        let ivar: Vec<f64> = ivar_rows.into_iter().flatten().collect();
        Self::new(wave, flux, ivar)
    }

    /// Number of spectra in the dataset.
    pub fn num_spectra(&self) -> usize {
        self.num_spectra
    }

    /// Number of pixels per spectrum.
    pub fn num_pixels(&self) -> usize {
        self.wave.len()
    }

    /// Shared wavelength grid (angstroms, strictly increasing).
    pub fn wave(&self) -> &[f64] {
        &self.wave
    }

    /// Flux row for spectrum `m`.
    pub fn flux_row(&self, m: usize) -> &[f64] {
        let n = self.wave.len();
        &self.flux[m * n..(m + 1) * n]
    }

    /// Inverse-variance row for spectrum `m`.
    pub fn ivar_row(&self, m: usize) -> &[f64] {
        let n = self.wave.len();
        &self.ivar[m * n..(m + 1) * n]
    }

    /// Whether pixel `n` of spectrum `m` carries a usable measurement.
    ///
    /// A pixel is valid when its flux is finite and its inverse-variance is
    /// finite and positive; masking in either array masks both.
    pub fn valid_pixel(&self, m: usize, n: usize) -> bool {
        let idx = m * self.wave.len() + n;
        self.flux[idx].is_finite() && self.ivar[idx].is_finite() && self.ivar[idx] > 0.0
    }

    /// Mutable flux row, for crate-internal construction of derived
    /// snapshots. External callers only ever see immutable datasets.
    pub(crate) fn flux_row_mut(&mut self, m: usize) -> &mut [f64] {
        let n = self.wave.len();
        &mut self.flux[m * n..(m + 1) * n]
    }

    /// Replace all rows at once, keeping the wavelength grid.
    ///
    /// Used by the batch stages to assemble derived datasets without
    /// revalidating the grid.
    pub(crate) fn with_rows(&self, flux: Vec<f64>, ivar: Vec<f64>) -> Self {
        debug_assert_eq!(flux.len(), self.flux.len());
        debug_assert_eq!(ivar.len(), self.ivar.len());
        Self {
            wave: self.wave.clone(),
            flux,
            ivar,
            num_spectra: self.num_spectra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let wave = vec![1.0, 2.0, 3.0];
        let flux = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let ivar = vec![1.0; 6];

        let ds = SpectralDataset::new(wave, flux, ivar).unwrap();
        assert_eq!(ds.num_spectra(), 2);
        assert_eq!(ds.num_pixels(), 3);
        assert_eq!(ds.flux_row(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let result = SpectralDataset::new(vec![1.0, 2.0], vec![1.0, 2.0], vec![1.0]);
        assert!(matches!(result, Err(DatasetError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = SpectralDataset::new(vec![1.0, 2.0], vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 3.0]);
        assert!(matches!(result, Err(DatasetError::RaggedRows { .. })));
    }

    #[test]
    fn test_non_monotonic_wave_rejected() {
        let result = SpectralDataset::new(vec![1.0, 3.0, 2.0], vec![0.0; 3], vec![1.0; 3]);
        assert!(matches!(
            result,
            Err(DatasetError::NonMonotonicWavelength { index: 2 })
        ));
    }

    #[test]
    fn test_valid_pixel_combines_flux_and_ivar_masks() {
        let wave = vec![1.0, 2.0, 3.0, 4.0];
        let flux = vec![1.0, f64::NAN, 1.0, 1.0];
        let ivar = vec![1.0, 1.0, 0.0, f64::NAN];

        let ds = SpectralDataset::new(wave, flux, ivar).unwrap();
        assert!(ds.valid_pixel(0, 0));
        assert!(!ds.valid_pixel(0, 1)); // flux NaN
        assert!(!ds.valid_pixel(0, 2)); // ivar zero
        assert!(!ds.valid_pixel(0, 3)); // ivar NaN
    }
}
