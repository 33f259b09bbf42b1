// ============================================
// Truncated SVD
// ============================================
//
// Reduced user representation U_k * Sigma_k of the interaction matrix.
// Computed with block subspace iteration on M M^T: every pass costs two
// products with the interaction matrix (O(users * products * block)), and
// a Rayleigh-Ritz step solves only a block x block eigenproblem with
// cyclic Jacobi. The starting block comes from a fixed seed and component
// signs are normalized, so rebuilds over the same data are reproducible.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use tracing::{debug, warn};

/// Extra directions iterated alongside the requested rank
const OVERSAMPLES: usize = 10;
const MAX_ITERATIONS: usize = 200;
/// Ritz residual bound, relative to the leading eigenvalue of M M^T
const RESIDUAL_TOLERANCE: f64 = 1e-12;
const RANDOM_STATE: u64 = 42;
/// A column keeping less than this share of its norm after projection
/// is treated as linearly dependent.
const DEPENDENCE_TOLERANCE: f64 = 1e-10;
const MAX_SWEEPS: usize = 100;

#[derive(Debug, Clone)]
pub struct Factorization {
    /// users x k
    user_factors: Array2<f64>,
    singular_values: Vec<f64>,
}

impl Factorization {
    pub fn user_factors(&self) -> &Array2<f64> {
        &self.user_factors
    }

    pub fn singular_values(&self) -> &[f64] {
        &self.singular_values
    }

    /// Effective rank after clamping
    pub fn rank(&self) -> usize {
        self.singular_values.len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TruncatedSvd {
    rank: usize,
}

impl TruncatedSvd {
    pub fn new(rank: usize) -> Self {
        Self { rank }
    }

    /// Rank is clamped to min(rows, cols); never errors.
    pub fn fit_transform(&self, matrix: &Array2<f64>) -> Factorization {
        let (rows, cols) = matrix.dim();
        let k = self.rank.min(rows).min(cols);

        if k == 0 {
            return Factorization {
                user_factors: Array2::zeros((rows, 0)),
                singular_values: Vec::new(),
            };
        }

        let block = (k + OVERSAMPLES).min(rows).min(cols);
        let mut rng = StdRng::seed_from_u64(RANDOM_STATE);
        let start = Array2::from_shape_fn((cols, block), |_| rng.gen_range(-1.0..1.0));
        let mut basis = orthonormalize(matrix.dot(&start));

        let tolerance = RESIDUAL_TOLERANCE.max(f64::EPSILON * (rows + cols) as f64);
        let mut eigenvalues = vec![0.0; block];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < MAX_ITERATIONS {
            iterations += 1;

            // Rayleigh-Ritz on span(basis): (M^T Q)^T (M^T Q) = Q^T M M^T Q
            let projected = matrix.t().dot(&basis);
            let (values, vectors) = symmetric_eigen(&projected.t().dot(&projected));
            let order = descending_order(&values);
            let rotation = vectors.select(Axis(1), &order);
            eigenvalues = order.iter().map(|&idx| values[idx].max(0.0)).collect();

            basis = basis.dot(&rotation);
            // M M^T applied to the Ritz vectors
            let image = matrix.dot(&projected.dot(&rotation));

            let scale = eigenvalues[0];
            let settled = (0..k).all(|component| {
                let residual = &image.column(component)
                    - &basis.column(component).mapv(|x| x * eigenvalues[component]);
                residual.dot(&residual).sqrt() <= tolerance * scale
            });
            if scale == 0.0 || settled {
                converged = true;
                break;
            }

            basis = orthonormalize(image);
        }

        if !converged {
            warn!(
                iterations = iterations,
                rank = k,
                "Truncated SVD stopped before the leading components converged"
            );
        }

        let mut user_factors = Array2::<f64>::zeros((rows, k));
        let mut singular_values = Vec::with_capacity(k);
        for component in 0..k {
            let sigma = eigenvalues[component].sqrt();
            singular_values.push(sigma);
            let mut column = basis.column(component).mapv(|x| x * sigma);
            normalize_sign(&mut column);
            user_factors.column_mut(component).assign(&column);
        }

        debug!(
            rows = rows,
            cols = cols,
            requested_rank = self.rank,
            rank = k,
            iterations = iterations,
            "Truncated SVD computed"
        );

        Factorization {
            user_factors,
            singular_values,
        }
    }
}

/// Modified Gram-Schmidt with one reorthogonalization pass.
/// Dependent columns come back as zero columns.
fn orthonormalize(mut matrix: Array2<f64>) -> Array2<f64> {
    for j in 0..matrix.ncols() {
        let mut column = matrix.column(j).to_owned();
        let original = column.dot(&column).sqrt();

        for _ in 0..2 {
            for i in 0..j {
                let previous = matrix.column(i);
                let projection = previous.dot(&column);
                column.scaled_add(-projection, &previous);
            }
        }

        let norm = column.dot(&column).sqrt();
        if norm == 0.0 || norm <= DEPENDENCE_TOLERANCE * original {
            column.fill(0.0);
        } else {
            column.mapv_inplace(|x| x / norm);
        }
        matrix.column_mut(j).assign(&column);
    }
    matrix
}

/// Flip a component so its largest-magnitude entry is positive.
fn normalize_sign(column: &mut Array1<f64>) {
    let largest = column.iter().fold(0.0f64, |acc, x| acc.max(x.abs()));
    let pivot = column
        .iter()
        .copied()
        .find(|x| x.abs() >= largest * (1.0 - 1e-9));
    if matches!(pivot, Some(value) if value < 0.0) {
        column.mapv_inplace(|x| -x);
    }
}

/// Eigen-pair order: eigenvalue descending, lower index first on ties.
fn descending_order(eigenvalues: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..eigenvalues.len()).collect();
    order.sort_by(|&a, &b| {
        eigenvalues[b]
            .partial_cmp(&eigenvalues[a])
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });
    order
}

/// Cyclic Jacobi eigendecomposition of a symmetric matrix, run until the
/// off-diagonal mass is at rounding level.
/// Returns eigenvalues and eigenvectors (as columns).
fn symmetric_eigen(matrix: &Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);

    let total_norm: f64 = a.iter().map(|x| x * x).sum::<f64>();
    let threshold = (f64::EPSILON * n as f64).powi(2) * total_norm;

    for _ in 0..MAX_SWEEPS {
        let off_diagonal: f64 = (0..n)
            .flat_map(|p| (0..n).filter(move |&q| q != p).map(move |q| (p, q)))
            .map(|(p, q)| a[[p, q]] * a[[p, q]])
            .sum();

        if off_diagonal <= threshold {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }

                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let eigenvalues = a.diag().to_vec();
    (eigenvalues, v)
}

/// Leading `k` columns, used by tests to compare partial reconstructions.
#[cfg(test)]
fn leading_columns(matrix: &Array2<f64>, k: usize) -> Array2<f64> {
    use ndarray::s;
    matrix.slice(s![.., ..k]).to_owned()
}
