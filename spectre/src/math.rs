//! Scalar math utilities shared across the pipeline.
//!
//! All routines operate on `f64` slices; NaN handling is the caller's
//! responsibility unless a function says otherwise.

/// Calculate the median of f64 values, sorting the slice in place.
pub fn median_f64_mut(values: &mut [f64]) -> f64 {
    debug_assert!(!values.is_empty());

    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let len = values.len();
    if len % 2 == 0 {
        (values[len / 2 - 1] + values[len / 2]) / 2.0
    } else {
        values[len / 2]
    }
}

/// Calculate the q-th percentile (0..=100) of f64 values, sorting the slice
/// in place.
///
/// Uses linear interpolation between order statistics: the rank is
/// `q / 100 * (n - 1)` and the result is interpolated between the two
/// surrounding sorted values.
pub fn percentile_mut(values: &mut [f64], q: f64) -> f64 {
    debug_assert!(!values.is_empty());
    debug_assert!((0.0..=100.0).contains(&q));

    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = q / 100.0 * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        values[lo]
    } else {
        let frac = rank - lo as f64;
        values[lo] + frac * (values[hi] - values[lo])
    }
}

/// Linearly interpolate `ys` at position `x` given ascending knots `xs`.
///
/// Outside the knot range the end values are returned (clamped
/// extrapolation).
pub fn interp(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    debug_assert!(xs.len() >= 2);

    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[xs.len() - 1] {
        return ys[ys.len() - 1];
    }

    // partition_point returns the first knot strictly greater than x
    let hi = xs.partition_point(|&k| k <= x);
    let lo = hi - 1;
    let span = xs[hi] - xs[lo];
    if span <= 0.0 {
        return ys[lo];
    }
    let frac = (x - xs[lo]) / span;
    ys[lo] + frac * (ys[hi] - ys[lo])
}

/// Linearly interpolate a uniformly indexed sequence at fractional index
/// `idx`, clamping to the ends.
pub fn interp_at_index(values: &[f64], idx: f64) -> f64 {
    debug_assert!(!values.is_empty());

    if idx <= 0.0 {
        return values[0];
    }
    let last = values.len() - 1;
    if idx >= last as f64 {
        return values[last];
    }
    let lo = idx.floor() as usize;
    let frac = idx - lo as f64;
    values[lo] + frac * (values[lo + 1] - values[lo])
}

/// Evaluate a polynomial with ascending coefficients at `x` (Horner).
pub fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Solve a dense NxN linear system by Gaussian elimination with partial
/// pivoting.
///
/// Solves `Ax = b`; returns `None` when the matrix is singular (pivot below
/// tolerance). Intended for the small systems produced by polynomial and
/// profile fits.
pub fn solve_linear_system(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    debug_assert_eq!(a.len(), n);

    let mut matrix: Vec<Vec<f64>> = a.to_vec();
    let mut rhs: Vec<f64> = b.to_vec();

    // Forward elimination with partial pivoting
    for col in 0..n {
        let mut max_row = col;
        let mut max_val = matrix[col][col].abs();
        for row in (col + 1)..n {
            if matrix[row][col].abs() > max_val {
                max_val = matrix[row][col].abs();
                max_row = row;
            }
        }

        if max_val < 1e-12 {
            return None; // Singular matrix
        }

        if max_row != col {
            matrix.swap(col, max_row);
            rhs.swap(col, max_row);
        }

        for row in (col + 1)..n {
            let factor = matrix[row][col] / matrix[col][col];
            let pivot_row = matrix[col].clone();
            for (j, m) in matrix[row].iter_mut().enumerate().skip(col) {
                *m -= factor * pivot_row[j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    // Back substitution
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = rhs[i];
        for j in (i + 1)..n {
            sum -= matrix[i][j] * x[j];
        }
        x[i] = sum / matrix[i][i];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd() {
        let mut values = vec![1.0, 3.0, 2.0, 5.0, 4.0];
        assert!((median_f64_mut(&mut values) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_median_even() {
        let mut values = vec![1.0, 2.0, 3.0, 4.0];
        assert!((median_f64_mut(&mut values) - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_percentile_endpoints() {
        let mut values = vec![3.0, 1.0, 2.0];
        assert!((percentile_mut(&mut values, 0.0) - 1.0).abs() < f64::EPSILON);
        let mut values = vec![3.0, 1.0, 2.0];
        assert!((percentile_mut(&mut values, 100.0) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_percentile_interpolates() {
        // rank = 0.7 * 4 = 2.8 -> between sorted[2]=3 and sorted[3]=4
        let mut values = vec![5.0, 4.0, 3.0, 2.0, 1.0];
        assert!((percentile_mut(&mut values, 70.0) - 3.8).abs() < 1e-12);
    }

    #[test]
    fn test_interp_interior_and_clamp() {
        let xs = [0.0, 1.0, 2.0];
        let ys = [0.0, 10.0, 20.0];
        assert!((interp(0.5, &xs, &ys) - 5.0).abs() < 1e-12);
        assert!((interp(-1.0, &xs, &ys) - 0.0).abs() < 1e-12);
        assert!((interp(3.0, &xs, &ys) - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_interp_at_index() {
        let values = [10.0, 20.0, 40.0];
        assert!((interp_at_index(&values, 0.5) - 15.0).abs() < 1e-12);
        assert!((interp_at_index(&values, 1.25) - 25.0).abs() < 1e-12);
        assert!((interp_at_index(&values, -0.5) - 10.0).abs() < 1e-12);
        assert!((interp_at_index(&values, 5.0) - 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_polyval() {
        // 1 + 2x + 3x^2 at x = 2 -> 17
        let coeffs = [1.0, 2.0, 3.0];
        assert!((polyval(&coeffs, 2.0) - 17.0).abs() < 1e-12);
    }

    #[test]
    fn test_solve_diagonal() {
        let a = vec![vec![2.0, 0.0, 0.0], vec![0.0, 3.0, 0.0], vec![0.0, 0.0, 4.0]];
        let b = [2.0, 6.0, 12.0];
        let x = solve_linear_system(&a, &b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 2.0).abs() < 1e-10);
        assert!((x[2] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_solve_needs_pivoting() {
        let a = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let b = [2.0, 1.0];
        let x = solve_linear_system(&a, &b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-10);
        assert!((x[1] - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_solve_singular_returns_none() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        let b = [1.0, 2.0];
        assert!(solve_linear_system(&a, &b).is_none());
    }
}
