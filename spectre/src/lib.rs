//! Spectre - anomalous-line search in stellar spectra.
//!
//! This library detects narrow, laser-like emission features superimposed
//! on stellar continua in batches of APOGEE-style spectra. It provides:
//! - Continuum estimation and normalization
//! - Residual extraction against a cross-spectrum reference
//! - Peak detection and line-shape characterization (LSF or Gaussian)
//! - A synthetic injection/recovery harness for sensitivity validation
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use spectre::{SearchPipeline, SpectralDataset};
//!
//! // Assemble a dataset from externally loaded arrays
//! let ds = SpectralDataset::new(wave, flux, ivar)?;
//!
//! // Search for anomalous lines
//! let pipeline = SearchPipeline::new();
//! let result = pipeline.run(&ds);
//!
//! println!("Found {} candidates", result.characterizations.len());
//! ```
//!
//! File loading, persistence, and plotting are external concerns: the core
//! consumes plain wavelength/flux/inverse-variance arrays and produces
//! tabular detection, characterization, and injection records.

mod characterize;
mod continuum;
mod dataset;
mod detect;
mod inject;
mod lsf;
pub(crate) mod math;
mod normalize;
mod pipeline;
mod residual;

#[cfg(test)]
pub mod testing;

pub mod prelude;

// ============================================================================
// Core data types
// ============================================================================

pub use dataset::{DatasetError, SpectralDataset};
pub use lsf::Lsf;

// ============================================================================
// Continuum estimation and normalization
// ============================================================================

pub use continuum::{estimate_continuum, ContinuumConfig, ContinuumError};
pub use normalize::{continuum_normalize, normalize_spectrum, NormalizeResult};

// ============================================================================
// Residual extraction
// ============================================================================

pub use residual::{
    reference_spectrum, residuals, subtract_reference, DEFAULT_RELIABILITY_FLOOR,
};

// ============================================================================
// Detection
// ============================================================================

pub use detect::{detect_all, find_peaks, Detection, DEFAULT_HEIGHT_THRESHOLD};

// ============================================================================
// Characterization
// ============================================================================

pub use characterize::{
    characterize, characterize_all, fit_gaussian, CharacterizeConfig, CharacterizeError,
    CharacterizeMethod, Characterization, GaussianFitResult, LmConfig, LmModel, LmResult,
};

// ============================================================================
// Injection/recovery harness
// ============================================================================

pub use inject::{
    completeness, inject, injection_trials, laser_signature, InjectionResult,
    DEFAULT_MATCH_RADIUS,
};

// ============================================================================
// Pipeline
// ============================================================================

pub use pipeline::{
    Diagnostics, PipelineConfig, SearchPipeline, SearchResult, SpectrumSnapshot,
};
