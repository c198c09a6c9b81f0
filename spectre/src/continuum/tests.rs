use super::*;

/// Flat baseline with a small deterministic ripple so that per-segment
/// percentile selection has a spread of values to work with.
fn rippled_flux(n: usize, level: f64) -> Vec<f64> {
    (0..n)
        .map(|i| level * (1.0 + 0.01 * (i as f64 * 0.7).sin()))
        .collect()
}

#[test]
fn test_flat_spectrum_recovers_constant_continuum() {
    let flux = rippled_flux(7000, 1.0);
    let config = ContinuumConfig::default();

    let continuum = estimate_continuum(&flux, &config).unwrap();
    assert_eq!(continuum.len(), 7000);
    for (i, &c) in continuum.iter().enumerate() {
        assert!(
            (c - 1.0).abs() < 0.02,
            "continuum at pixel {} is {}, expected ~1.0",
            i,
            c
        );
    }
}

#[test]
fn test_scale_invariance() {
    let flux = rippled_flux(7000, 2.0);
    let scaled: Vec<f64> = flux.iter().map(|f| f * 3.0).collect();
    let config = ContinuumConfig::default();

    let base = estimate_continuum(&flux, &config).unwrap();
    let tripled = estimate_continuum(&scaled, &config).unwrap();

    for (c, s) in base.iter().zip(tripled.iter()) {
        assert!((s - 3.0 * c).abs() < 1e-8 * c.abs());
    }
}

#[test]
fn test_narrow_line_does_not_move_continuum() {
    let mut flux = rippled_flux(7000, 2.0);
    // A strong emission spike spans only a few pixels; the percentile
    // selection should exclude it entirely.
    for i in 3498..=3502 {
        flux[i] += 5.0;
    }
    let config = ContinuumConfig::default();

    let continuum = estimate_continuum(&flux, &config).unwrap();
    assert!((continuum[3500] - 2.0).abs() < 0.05);
}

#[test]
fn test_masked_segment_is_extrapolated() {
    let mut flux = rippled_flux(1000, 1.5);
    for value in flux.iter_mut().take(500).skip(400) {
        *value = f64::NAN;
    }
    let config = ContinuumConfig::default();

    let continuum = estimate_continuum(&flux, &config).unwrap();
    // The fully masked segment contributes no continuum pixels but still
    // gets a defined continuum from the band polynomial.
    for &c in &continuum[400..500] {
        assert!(c.is_finite());
        assert!((c - 1.5).abs() < 0.1);
    }
}

#[test]
fn test_short_grid_uses_only_leading_bands() {
    let flux = rippled_flux(500, 1.0);
    let config = ContinuumConfig::default();

    let continuum = estimate_continuum(&flux, &config).unwrap();
    assert_eq!(continuum.len(), 500);
    assert!(continuum.iter().all(|c| c.is_finite()));
}

#[test]
fn test_constant_flux_has_no_continuum_pixels() {
    // Every value equal: nothing lies strictly between the 70th and 80th
    // percentile, so the band fit is ill-posed and must surface an error.
    let flux = vec![1.0; 300];
    let config = ContinuumConfig::default();

    let result = estimate_continuum(&flux, &config);
    assert!(matches!(
        result,
        Err(ContinuumError::InsufficientPixels { band: 0, .. })
    ));
}

#[test]
fn test_all_masked_spectrum_errors() {
    let flux = vec![f64::NAN; 300];
    let config = ContinuumConfig::default();

    let result = estimate_continuum(&flux, &config);
    assert!(matches!(
        result,
        Err(ContinuumError::InsufficientPixels { .. })
    ));
}

#[test]
fn test_sloped_continuum_is_tracked() {
    // A gentle linear slope across the grid; each band's polynomial should
    // follow it closely.
    let n = 7000;
    let flux: Vec<f64> = (0..n)
        .map(|i| {
            let slope = 1.0 + 0.5 * i as f64 / n as f64;
            slope * (1.0 + 0.01 * (i as f64 * 0.7).sin())
        })
        .collect();
    let config = ContinuumConfig::default();

    let continuum = estimate_continuum(&flux, &config).unwrap();
    for i in (0..n).step_by(250) {
        let expected = 1.0 + 0.5 * i as f64 / n as f64;
        assert!(
            (continuum[i] - expected).abs() < 0.05,
            "pixel {}: continuum {} vs slope {}",
            i,
            continuum[i],
            expected
        );
    }
}
