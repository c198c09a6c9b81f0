//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types from the library.
//!
//! # Usage
//!
//! ```rust,ignore
//! use spectre::prelude::*;
//! ```

// Core data types
pub use crate::{DatasetError, Lsf, SpectralDataset};

// Pipeline - main API
pub use crate::{
    Detection, Characterization, PipelineConfig, SearchPipeline, SearchResult, SpectrumSnapshot,
};

// Stage configuration
pub use crate::{CharacterizeConfig, CharacterizeMethod, ContinuumConfig};

// Injection/recovery harness
pub use crate::{completeness, inject, injection_trials, InjectionResult};
