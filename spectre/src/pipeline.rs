//! End-to-end search pipeline.
//!
//! Composes the stages in their fixed order: continuum normalization,
//! residual extraction against the cross-spectrum median, peak detection,
//! and line characterization. Per-spectrum and per-candidate failures are
//! collected alongside the successes; only malformed input (rejected at
//! dataset construction) is fatal.

use serde::{Deserialize, Serialize};

use crate::characterize::{
    characterize, characterize_all, CharacterizeConfig, CharacterizeError, CharacterizeMethod,
    Characterization,
};
use crate::continuum::{estimate_continuum, ContinuumConfig, ContinuumError};
use crate::dataset::SpectralDataset;
use crate::detect::{detect_all, find_peaks, Detection, DEFAULT_HEIGHT_THRESHOLD};
use crate::lsf::Lsf;
use crate::math::median_f64_mut;
use crate::normalize::{continuum_normalize, normalize_spectrum};
use crate::residual::{residuals, DEFAULT_RELIABILITY_FLOOR};

/// Configuration for the full search pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Continuum estimation parameters.
    pub continuum: ContinuumConfig,
    /// Floor below which normalized flux is excluded from the reference
    /// median.
    pub reliability_floor: f64,
    /// Height threshold for peak detection on residual flux.
    pub height_threshold: f64,
    /// Characterization window and model selection.
    pub characterize: CharacterizeConfig,
    /// Instrumental line spread function used for characterization.
    pub lsf: Lsf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            continuum: ContinuumConfig::default(),
            reliability_floor: DEFAULT_RELIABILITY_FLOOR,
            height_threshold: DEFAULT_HEIGHT_THRESHOLD,
            characterize: CharacterizeConfig::default(),
            lsf: Lsf::apogee(),
        }
    }
}

impl PipelineConfig {
    /// Set the peak-detection height threshold.
    pub fn with_height_threshold(mut self, height: f64) -> Self {
        self.height_threshold = height;
        self
    }

    /// Set the characterization window half-width.
    pub fn with_window_radius(mut self, radius: usize) -> Self {
        self.characterize.window_radius = radius;
        self
    }

    /// Select the characterization model variant.
    pub fn with_method(mut self, method: CharacterizeMethod) -> Self {
        self.characterize.method = method;
        self
    }

    /// Substitute the instrumental LSF profile.
    pub fn with_lsf(mut self, lsf: Lsf) -> Self {
        self.lsf = lsf;
        self
    }

    /// Validate configuration invariants. Panics on programmer error.
    pub fn validate(&self) {
        self.continuum.validate();
        self.characterize.validate();
        assert!(
            self.height_threshold.is_finite(),
            "height_threshold must be finite"
        );
        assert!(
            self.reliability_floor.is_finite(),
            "reliability_floor must be finite"
        );
    }
}

/// Counts from each stage of a pipeline run, for tuning and debugging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Spectra in the input dataset.
    pub spectra: usize,
    /// Spectra whose continuum fit failed.
    pub continuum_failures: usize,
    /// Peaks found across all residual spectra.
    pub detections: usize,
    /// Candidates successfully characterized.
    pub characterized: usize,
    /// Candidates whose characterization failed.
    pub characterization_failures: usize,
    /// Median fitted line width in angstroms (0 when nothing was
    /// characterized).
    pub median_width: f64,
}

/// Result of a full pipeline run.
#[derive(Debug)]
pub struct SearchResult {
    /// Candidate features ordered by spectrum index, then pixel index.
    pub detections: Vec<Detection>,
    /// Characterized candidates, in detection order minus failures.
    pub characterizations: Vec<Characterization>,
    /// Per-spectrum continuum failures.
    pub continuum_failures: Vec<(usize, ContinuumError)>,
    /// Per-candidate characterization failures.
    pub characterization_failures: Vec<(Detection, CharacterizeError)>,
    /// The cross-spectrum median reference subtracted from every spectrum.
    pub reference: Vec<f64>,
    /// Stage-by-stage counts.
    pub diagnostics: Diagnostics,
}

/// Re-derived records for a single spectrum, see
/// [`SearchPipeline::reprocess_spectrum`].
#[derive(Debug)]
pub struct SpectrumSnapshot {
    /// Index of the reprocessed spectrum.
    pub spectrum: usize,
    /// Peaks found in the recomputed residual.
    pub detections: Vec<Detection>,
    /// Characterized candidates.
    pub characterizations: Vec<Characterization>,
    /// Per-candidate failures.
    pub failures: Vec<(Detection, CharacterizeError)>,
}

/// Anomalous-line search pipeline over a spectral dataset.
///
/// # Example
///
/// ```rust,ignore
/// use spectre::{PipelineConfig, SearchPipeline, SpectralDataset};
///
/// let ds = SpectralDataset::new(wave, flux, ivar)?;
/// let pipeline = SearchPipeline::new();
/// let result = pipeline.run(&ds);
/// println!("{} candidates", result.characterizations.len());
/// ```
#[derive(Debug)]
pub struct SearchPipeline {
    config: PipelineConfig,
}

impl Default for SearchPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchPipeline {
    /// Create a pipeline with default configuration.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    /// Create a pipeline from an existing configuration.
    pub fn from_config(config: PipelineConfig) -> Self {
        config.validate();
        Self { config }
    }

    /// Get reference to the underlying configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full search over a dataset.
    pub fn run(&self, ds: &SpectralDataset) -> SearchResult {
        self.config.validate();

        // Stage 1-2: per-spectrum continuum fit and normalization.
        let normalized = continuum_normalize(ds, &self.config.continuum);

        // Stage 3: residuals against the cross-spectrum median.
        let (residual, reference) = residuals(&normalized.dataset, self.config.reliability_floor);

        // Stage 4: peak detection, ordered by spectrum then pixel.
        let detections = detect_all(&residual, self.config.height_threshold);

        // Stage 5: line characterization on the residual flux.
        let (characterizations, characterization_failures) = characterize_all(
            &residual,
            &self.config.lsf,
            &detections,
            &self.config.characterize,
        );

        let mut widths: Vec<f64> = characterizations.iter().map(|c| c.width).collect();
        let median_width = if widths.is_empty() {
            0.0
        } else {
            median_f64_mut(&mut widths)
        };

        let diagnostics = Diagnostics {
            spectra: ds.num_spectra(),
            continuum_failures: normalized.failures.len(),
            detections: detections.len(),
            characterized: characterizations.len(),
            characterization_failures: characterization_failures.len(),
            median_width,
        };

        tracing::info!(
            "searched {} spectra: {} detections, {} characterized ({} continuum failures, {} fit failures)",
            diagnostics.spectra,
            diagnostics.detections,
            diagnostics.characterized,
            diagnostics.continuum_failures,
            diagnostics.characterization_failures
        );

        SearchResult {
            detections,
            characterizations,
            continuum_failures: normalized.failures,
            characterization_failures,
            reference,
            diagnostics,
        }
    }

    /// Recompute derived records for one spectrum against a fixed
    /// reference, returning a new immutable snapshot.
    ///
    /// Used for incremental work such as scoring an injection without
    /// re-deriving the whole batch: the reference from a previous [`run`]
    /// stays valid because a single perturbed spectrum barely moves the
    /// cross-spectrum median.
    ///
    /// [`run`]: SearchPipeline::run
    pub fn reprocess_spectrum(
        &self,
        ds: &SpectralDataset,
        reference: &[f64],
        spectrum: usize,
    ) -> Result<SpectrumSnapshot, ContinuumError> {
        assert!(spectrum < ds.num_spectra(), "spectrum index out of range");
        assert_eq!(reference.len(), ds.num_pixels());

        let continuum = estimate_continuum(ds.flux_row(spectrum), &self.config.continuum)?;
        let (norm_flux, norm_ivar) =
            normalize_spectrum(ds.flux_row(spectrum), ds.ivar_row(spectrum), &continuum);

        let residual_flux: Vec<f64> = norm_flux
            .iter()
            .zip(reference.iter())
            .map(|(f, r)| f - r)
            .collect();

        let peaks = find_peaks(&residual_flux, self.config.height_threshold);

        // A one-row dataset view of the recomputed residual for the
        // characterizer; records are remapped to the original index.
        let view = SpectralDataset::new(ds.wave().to_vec(), residual_flux, norm_ivar)
            .expect("residual view shares the validated input grid");

        let mut detections = Vec::with_capacity(peaks.len());
        let mut characterizations = Vec::new();
        let mut failures = Vec::new();
        for pixel in peaks {
            let local = Detection { spectrum: 0, pixel };
            let remapped = Detection { spectrum, pixel };
            detections.push(remapped);
            match characterize(&view, &self.config.lsf, local, &self.config.characterize) {
                Ok(mut c) => {
                    c.spectrum = spectrum;
                    characterizations.push(c);
                }
                Err(err) => failures.push((remapped, err)),
            }
        }

        Ok(SpectrumSnapshot {
            spectrum,
            detections,
            characterizations,
            failures,
        })
    }
}
