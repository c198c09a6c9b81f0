//! Peak detection over residual or normalized flux.
//!
//! A peak is a sample strictly greater than both neighbors whose value
//! exceeds the height threshold. Flat-topped peaks report their first
//! sample. NaN samples never qualify and also break plateaus, so masked
//! stretches cannot produce spurious detections.

use serde::{Deserialize, Serialize};

use crate::dataset::SpectralDataset;

/// Default height threshold for peak detection on residual flux.
pub const DEFAULT_HEIGHT_THRESHOLD: f64 = 0.05;

/// A candidate feature: one pixel of one spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    /// Index of the spectrum within its dataset.
    pub spectrum: usize,
    /// Pixel index of the local maximum.
    pub pixel: usize,
}

/// Find local maxima above `height` in one flux vector.
///
/// Returns ascending pixel indices. Endpoints are never peaks since they
/// lack a neighbor on one side.
pub fn find_peaks(values: &[f64], height: f64) -> Vec<usize> {
    let n = values.len();
    let mut peaks = Vec::new();

    let mut i = 1;
    while i + 1 < n {
        if values[i] > values[i - 1] {
            // Scan across a possible plateau of equal samples.
            let mut ahead = i + 1;
            while ahead < n && values[ahead] == values[i] {
                ahead += 1;
            }
            if ahead < n && values[ahead] < values[i] && values[i] > height {
                peaks.push(i);
            }
            i = ahead;
        } else {
            i += 1;
        }
    }

    peaks
}

/// Detect peaks in every spectrum of a dataset.
///
/// The aggregate output is ordered by spectrum index, then pixel index,
/// which keeps batch runs reproducible.
pub fn detect_all(ds: &SpectralDataset, height: f64) -> Vec<Detection> {
    let mut detections = Vec::new();
    for spectrum in 0..ds.num_spectra() {
        for pixel in find_peaks(ds.flux_row(spectrum), height) {
            detections.push(Detection { spectrum, pixel });
        }
    }
    tracing::debug!(
        "detected {} peaks across {} spectra",
        detections.len(),
        ds.num_spectra()
    );
    detections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::wave_grid;

    #[test]
    fn test_single_bump_yields_one_peak() {
        // An isolated Gaussian-shaped bump above threshold.
        let values: Vec<f64> = (0..100)
            .map(|i| 0.8 * (-((i as f64 - 50.0) / 3.0).powi(2) / 2.0).exp())
            .collect();

        let peaks = find_peaks(&values, DEFAULT_HEIGHT_THRESHOLD);
        assert_eq!(peaks, vec![50]);
    }

    #[test]
    fn test_noise_below_threshold_yields_nothing() {
        let values: Vec<f64> = (0..200).map(|i| 0.01 * (i as f64 * 1.7).sin()).collect();
        assert!(find_peaks(&values, DEFAULT_HEIGHT_THRESHOLD).is_empty());
    }

    #[test]
    fn test_plateau_reports_first_sample() {
        let values = vec![0.0, 0.2, 0.2, 0.2, 0.0];
        assert_eq!(find_peaks(&values, 0.05), vec![1]);
    }

    #[test]
    fn test_rising_plateau_is_not_a_peak() {
        let values = vec![0.0, 0.2, 0.2, 0.3, 0.0];
        assert_eq!(find_peaks(&values, 0.05), vec![3]);
    }

    #[test]
    fn test_endpoints_are_never_peaks() {
        let values = vec![1.0, 0.5, 0.8];
        assert!(find_peaks(&values, 0.05).is_empty());
    }

    #[test]
    fn test_nan_neighbors_disqualify() {
        let values = vec![0.0, f64::NAN, 0.5, f64::NAN, 0.0];
        assert!(find_peaks(&values, 0.05).is_empty());
    }

    #[test]
    fn test_threshold_is_strict() {
        let values = vec![0.0, 0.05, 0.0, 0.051, 0.0];
        assert_eq!(find_peaks(&values, 0.05), vec![3]);
    }

    #[test]
    fn test_detect_all_orders_by_spectrum_then_pixel() {
        let n = 30;
        let mut rows = vec![vec![0.0; n], vec![0.0; n]];
        for &(row, pixel) in &[(0usize, 20usize), (0, 5), (1, 12)] {
            rows[row][pixel] = 1.0;
        }
        let ivar = vec![vec![1.0; n]; 2];
        let ds = SpectralDataset::from_spectra(wave_grid(n), rows, ivar).unwrap();

        let detections = detect_all(&ds, 0.05);
        let pairs: Vec<(usize, usize)> = detections.iter().map(|d| (d.spectrum, d.pixel)).collect();
        assert_eq!(pairs, vec![(0, 5), (0, 20), (1, 12)]);
    }
}
