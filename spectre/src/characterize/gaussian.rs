//! Gaussian line-shape fitting, the legacy characterization path.
//!
//! Fits `a * exp(-(x - mean)^2 / (2 sigma^2))` to a local window by
//! Levenberg-Marquardt, with the fitted mean constrained to stay within two
//! pixels of the detected candidate.

use super::lm::{optimize, LmConfig, LmModel};
use super::CharacterizeError;

/// Result of a 1D Gaussian fit.
#[derive(Debug, Clone, Copy)]
pub struct GaussianFitResult {
    /// Fitted line center as a fractional pixel index.
    pub mean: f64,
    /// Fitted amplitude.
    pub amplitude: f64,
    /// Fitted sigma in pixels.
    pub sigma: f64,
    /// Mean squared residual of the fit, a quality metric.
    pub mean_squared_residual: f64,
    /// Number of optimizer iterations used.
    pub iterations: usize,
}

/// 1D Gaussian model for L-M optimization (3 parameters).
/// Parameters: [mean, amplitude, sigma]
struct Gaussian1d {
    /// Candidate pixel; the fitted mean may not drift more than
    /// `max_shift` pixels away from it.
    candidate: f64,
    max_shift: f64,
    max_sigma: f64,
}

impl LmModel<3> for Gaussian1d {
    #[inline]
    fn evaluate(&self, x: f64, params: &[f64; 3]) -> f64 {
        let [mean, amp, sigma] = *params;
        let dx = x - mean;
        amp * (-0.5 * dx * dx / (sigma * sigma)).exp()
    }

    #[inline]
    fn jacobian_row(&self, x: f64, params: &[f64; 3]) -> [f64; 3] {
        let [mean, amp, sigma] = *params;
        let sigma2 = sigma * sigma;
        let dx = x - mean;
        let exp_val = (-0.5 * dx * dx / sigma2).exp();
        let amp_exp = amp * exp_val;

        [
            amp_exp * dx / sigma2,               // df/dmean
            exp_val,                             // df/damp
            amp_exp * dx * dx / (sigma2 * sigma), // df/dsigma
        ]
    }

    #[inline]
    fn constrain(&self, params: &mut [f64; 3]) {
        params[0] = params[0].clamp(self.candidate - self.max_shift, self.candidate + self.max_shift);
        params[1] = params[1].max(1e-6); // Amplitude > 0
        params[2] = params[2].clamp(0.3, self.max_sigma);
    }
}

/// Walk outward from `pixel` while flux keeps decreasing, in each
/// direction. NaN samples stop the walk, so the window never contains
/// missing values.
pub(super) fn descent_window(flux: &[f64], pixel: usize) -> (usize, usize) {
    let mut lo = pixel;
    while lo > 0 && flux[lo - 1] < flux[lo] {
        lo -= 1;
    }
    let mut hi = pixel;
    while hi + 1 < flux.len() && flux[hi + 1] < flux[hi] {
        hi += 1;
    }
    (lo, hi)
}

/// Fit a Gaussian to `flux[lo..=hi]` in global pixel-index coordinates.
///
/// Non-convergence is surfaced as [`CharacterizeError::FitDiverged`], not a
/// crash; the caller decides what to do with the failed candidate.
pub fn fit_gaussian(
    flux: &[f64],
    lo: usize,
    hi: usize,
    candidate: usize,
) -> Result<GaussianFitResult, CharacterizeError> {
    let n = hi - lo + 1;
    if n < 4 {
        return Err(CharacterizeError::EmptyWindow {
            pixel: candidate,
            found: n,
            needed: 4,
        });
    }

    let data_x: Vec<f64> = (lo..=hi).map(|i| i as f64).collect();
    let data_y: Vec<f64> = flux[lo..=hi].to_vec();

    let model = Gaussian1d {
        candidate: candidate as f64,
        max_shift: 2.0,
        max_sigma: n as f64,
    };
    let initial = [candidate as f64, flux[candidate].max(1e-6), 1.5];

    let result = optimize(&model, &data_x, &data_y, initial, &LmConfig::default());
    if !result.converged {
        return Err(CharacterizeError::FitDiverged {
            pixel: candidate,
            iterations: result.iterations,
        });
    }

    Ok(GaussianFitResult {
        mean: result.params[0],
        amplitude: result.params[1],
        sigma: result.params[2],
        mean_squared_residual: result.chi2 / n as f64,
        iterations: result.iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian_flux(n: usize, center: f64, amp: f64, sigma: f64) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let dx = i as f64 - center;
                amp * (-0.5 * dx * dx / (sigma * sigma)).exp()
            })
            .collect()
    }

    #[test]
    fn test_descent_window_brackets_the_peak() {
        let flux = gaussian_flux(41, 20.0, 1.0, 2.0);
        let (lo, hi) = descent_window(&flux, 20);
        assert!(lo < 20 && hi > 20);
        // The walk runs to the array edges on a monotone profile.
        assert_eq!((lo, hi), (0, 40));
    }

    #[test]
    fn test_descent_window_stops_at_nan() {
        let mut flux = gaussian_flux(41, 20.0, 1.0, 2.0);
        flux[15] = f64::NAN;
        flux[26] = f64::NAN;
        let (lo, hi) = descent_window(&flux, 20);
        assert_eq!((lo, hi), (16, 25));
    }

    #[test]
    fn test_recovers_gaussian_parameters() {
        let flux = gaussian_flux(41, 20.3, 0.8, 1.8);
        let (lo, hi) = descent_window(&flux, 20);

        let fit = fit_gaussian(&flux, lo, hi, 20).unwrap();
        assert!((fit.mean - 20.3).abs() < 0.05);
        assert!((fit.amplitude - 0.8).abs() < 0.02);
        assert!((fit.sigma - 1.8).abs() < 0.05);
        assert!(fit.mean_squared_residual < 1e-6);
    }

    #[test]
    fn test_mean_is_bounded_near_candidate() {
        // Feed a profile whose true center is far from the candidate: the
        // constrained fit must keep the mean within two pixels.
        let flux = gaussian_flux(41, 28.0, 0.8, 2.0);
        let fit = fit_gaussian(&flux, 10, 40, 22);
        if let Ok(fit) = fit {
            assert!((fit.mean - 22.0).abs() <= 2.0 + 1e-9);
        }
    }

    #[test]
    fn test_tiny_window_is_rejected() {
        let flux = gaussian_flux(41, 20.0, 0.8, 2.0);
        let result = fit_gaussian(&flux, 19, 21, 20);
        assert!(matches!(
            result,
            Err(CharacterizeError::EmptyWindow { needed: 4, .. })
        ));
    }
}
