use super::envelope::EnvelopeCholesky;
use super::gershgorin_bound;
use crate::eigensolver::EigenSolver;
use crate::error::LleError;
use crate::error::Result;
use nalgebra::DMatrix;
use ndarray::Array1;
use ndarray::Array2;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use sprs::CsMat;
use std::time::Instant;
use tracing::debug;
use tracing::info;

/// Ritz pairs are checked every this many Lanczos steps.
const CHECK_EVERY: usize = 4;

/// A Lanczos vector whose norm falls below this fraction of the norm of the
/// operator applied to the previous vector marks an invariant Krylov subspace.
const BREAKDOWN_TOLERANCE: f64 = 1e-12;

/// The factored matrix is `M + εI` with ε this fraction of the Gershgorin bound
/// of M, which keeps it positive definite when M is singular.
const SHIFT_FRACTION: f64 = 1e-9;

/// Iterative eigensolver for the bottom of a sparse symmetric PSD spectrum.
///
/// Runs shift-invert Lanczos with full reorthogonalization: M + εI is factored
/// once (reverse Cuthill-McKee ordering, envelope Cholesky) and each step
/// applies `(M + εI)⁻¹` through two triangular solves. The smallest
/// eigenvalues λ of M become the largest and best separated eigenvalues
/// θ = 1 / (λ + ε) of the inverted operator, so the bottom of the spectrum
/// converges in a number of steps that does not grow with the matrix size.
///
/// A Ritz pair is converged when its residual estimate `|β_j s_j|` is at most
/// `tolerance · θ_j`. A Krylov space that spans the whole matrix is exact and
/// always converges; otherwise running out of `max_iterations` steps yields
/// `EigenNotConverged`. Repeated eigenvalues are recovered through restarts
/// in fresh directions after the Krylov space becomes invariant.
#[derive(Debug, Clone)]
pub struct LanczosSolver {
  /// Maximum number of Lanczos steps.
  pub max_iterations: usize,
  /// Residual tolerance relative to each Ritz value of the inverted operator.
  pub tolerance: f64,
  /// Seed for the start vector.
  pub seed: u64,
}

impl Default for LanczosSolver {
  fn default() -> Self {
    Self {
      max_iterations: 1000,
      tolerance: 1e-10,
      seed: 42,
    }
  }
}

/// Random unit vector orthogonal to `basis` (assumed orthonormal).
fn fresh_direction(rng: &mut StdRng, basis: &[Array1<f64>], n: usize) -> Option<Array1<f64>> {
  for _ in 0..8 {
    let mut v: Array1<f64> = (0..n).map(|_| rng.random::<f64>() - 0.5).collect();
    for _ in 0..2 {
      for q in basis {
        let c = v.dot(q);
        v.scaled_add(-c, q);
      }
    }
    let norm = v.dot(&v).sqrt();
    if norm > 1e-8 {
      v /= norm;
      return Some(v);
    }
  }
  None
}

struct RitzPairs {
  /// Eigenvalues of M, ascending.
  values: Vec<f64>,
  /// Columns of the tridiagonal eigenvector matrix, matching `values`.
  columns: Vec<usize>,
  /// Whether each pair meets the residual tolerance, matching `values`.
  converged: Vec<bool>,
  eigenvectors: DMatrix<f64>,
}

fn ritz_pairs(
  alpha: &[f64],
  beta: &[f64],
  last_beta: f64,
  shift: f64,
  tolerance: f64,
  count: usize,
) -> RitzPairs {
  let m = alpha.len();
  let mut t = DMatrix::<f64>::zeros(m, m);
  for i in 0..m {
    t[(i, i)] = alpha[i];
    if i + 1 < m {
      t[(i, i + 1)] = beta[i];
      t[(i + 1, i)] = beta[i];
    }
  }
  let eigen = t.symmetric_eigen();

  // Largest θ of the inverted operator are the smallest λ = 1/θ − ε of M
  let mut order: Vec<usize> = (0..m).collect();
  order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
  order.truncate(count);

  RitzPairs {
    values: order
      .iter()
      .map(|&i| 1.0 / eigen.eigenvalues[i] - shift)
      .collect(),
    converged: order
      .iter()
      .map(|&i| {
        let residual = (last_beta * eigen.eigenvectors[(m - 1, i)]).abs();
        residual <= tolerance * eigen.eigenvalues[i].abs()
      })
      .collect(),
    columns: order,
    eigenvectors: eigen.eigenvectors,
  }
}

impl EigenSolver for LanczosSolver {
  fn name(&self) -> &'static str {
    "lanczos"
  }

  fn smallest_eigenpairs(
    &self,
    matrix: &CsMat<f64>,
    count: usize,
  ) -> Result<(Array1<f64>, Array2<f64>)> {
    let n = matrix.rows();
    if count == 0 || count > n {
      return Err(LleError::InvalidInput(format!(
        "requested {count} eigenpairs of a {n}x{n} matrix"
      )));
    }

    let started = Instant::now();
    let sigma = match gershgorin_bound(matrix) {
      s if s > 0.0 => s,
      _ => 1.0,
    };
    let shift = SHIFT_FRACTION * sigma;
    let factor = EnvelopeCholesky::factor(matrix, shift)?;
    debug!(
      duration_ms = started.elapsed().as_millis(),
      envelope = factor.envelope_size(),
      shift,
      "factored shifted operator"
    );
    let max_steps = self.max_iterations.min(n);

    let mut rng = StdRng::seed_from_u64(self.seed);
    let mut basis: Vec<Array1<f64>> = Vec::with_capacity(max_steps);
    let mut alpha: Vec<f64> = Vec::with_capacity(max_steps);
    let mut beta: Vec<f64> = Vec::with_capacity(max_steps);
    let mut q = fresh_direction(&mut rng, &basis, n)
      .ok_or_else(|| LleError::InvalidInput("cannot draw a Lanczos start vector".to_string()))?;
    let mut converged = 0;

    loop {
      let mut w = factor.solve(&q);
      let applied_norm = w.dot(&w).sqrt();
      alpha.push(w.dot(&q));
      basis.push(q);

      // Full reorthogonalization, twice for numerical safety
      for _ in 0..2 {
        for v in &basis {
          let c = w.dot(v);
          w.scaled_add(-c, v);
        }
      }
      let b = w.dot(&w).sqrt();
      let steps = alpha.len();
      let exhausted = steps == n;
      let breakdown = b <= BREAKDOWN_TOLERANCE * applied_norm;

      if steps >= count && (steps % CHECK_EVERY == 0 || exhausted || steps == max_steps) {
        let last_beta = if exhausted { 0.0 } else { b };
        let pairs = ritz_pairs(&alpha, &beta, last_beta, shift, self.tolerance, count);
        converged = pairs.converged.iter().filter(|&&c| c).count();
        debug!(steps, converged, requested = count, "lanczos check");

        if exhausted || converged == count {
          let mut values = Array1::zeros(count);
          let mut vectors = Array2::zeros((n, count));
          for (c, (&value, &col)) in pairs.values.iter().zip(&pairs.columns).enumerate() {
            values[c] = value;
            let mut column = vectors.column_mut(c);
            for (t, v) in basis.iter().enumerate() {
              column.scaled_add(pairs.eigenvectors[(t, col)], v);
            }
            let norm = column.dot(&column).sqrt();
            if norm > 0.0 {
              column /= norm;
            }
          }
          info!(
            duration_ms = started.elapsed().as_millis(),
            steps,
            n,
            count,
            "lanczos complete"
          );
          return Ok((values, vectors));
        }
      }

      if steps >= max_steps {
        return Err(LleError::EigenNotConverged {
          iterations: steps,
          converged,
          requested: count,
        });
      }

      if breakdown {
        // Invariant subspace: continue in a fresh orthogonal direction
        debug!(steps, "lanczos breakdown, restarting");
        beta.push(0.0);
        q = match fresh_direction(&mut rng, &basis, n) {
          Some(v) => v,
          None => {
            return Err(LleError::EigenNotConverged {
              iterations: steps,
              converged,
              requested: count,
            });
          }
        };
      } else {
        beta.push(b);
        q = w / b;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::LanczosSolver;
  use crate::eigensolver::EigenSolver;
  use crate::error::LleError;
  use crate::spectral::dense::DenseSolver;
  use approx::assert_abs_diff_eq;
  use sprs::CsMat;
  use sprs::TriMat;

  /// Path-graph Laplacian: eigenvalues 2 − 2cos(πj/n), j = 0..n.
  fn path_laplacian(n: usize) -> CsMat<f64> {
    let mut tri = TriMat::new((n, n));
    for i in 0..n {
      let degree = if i == 0 || i == n - 1 { 1.0 } else { 2.0 };
      tri.add_triplet(i, i, degree);
      if i + 1 < n {
        tri.add_triplet(i, i + 1, -1.0);
        tri.add_triplet(i + 1, i, -1.0);
      }
    }
    tri.to_csr::<usize>()
  }

  #[test]
  fn matches_dense_on_path_laplacian() {
    let m = path_laplacian(40);
    let (values, vectors) = LanczosSolver::default().smallest_eigenpairs(&m, 4).unwrap();
    let (dense_values, _) = DenseSolver.smallest_eigenpairs(&m, 4).unwrap();

    assert_eq!(vectors.shape(), &[40, 4]);
    for j in 0..4 {
      assert_abs_diff_eq!(values[j], dense_values[j], epsilon = 1e-8);
      let expected = 2.0 - 2.0 * (std::f64::consts::PI * j as f64 / 40.0).cos();
      assert_abs_diff_eq!(values[j], expected, epsilon = 1e-8);
      let norm: f64 = vectors.column(j).iter().map(|v| v * v).sum();
      assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-8);
    }
    for w in values.windows(2) {
      assert!(w[0] <= w[1]);
    }
  }

  #[test]
  fn diagonal_matrix_with_repeated_values() {
    let mut tri = TriMat::new((6, 6));
    for (i, v) in [3.0, 1.0, 1.0, 5.0, 0.5, 2.0].into_iter().enumerate() {
      tri.add_triplet(i, i, v);
    }
    let m = tri.to_csr::<usize>();
    let (values, _) = LanczosSolver::default().smallest_eigenpairs(&m, 3).unwrap();
    assert_abs_diff_eq!(values[0], 0.5, epsilon = 1e-10);
    assert_abs_diff_eq!(values[1], 1.0, epsilon = 1e-10);
    assert_abs_diff_eq!(values[2], 1.0, epsilon = 1e-10);
  }

  #[test]
  fn converges_on_path_longer_than_budget() {
    let n = 1500;
    let m = path_laplacian(n);
    let solver = LanczosSolver {
      max_iterations: 200,
      ..Default::default()
    };
    let (values, vectors) = solver.smallest_eigenpairs(&m, 3).unwrap();
    for j in 0..3 {
      let expected = 2.0 - 2.0 * (std::f64::consts::PI * j as f64 / n as f64).cos();
      assert_abs_diff_eq!(values[j], expected, epsilon = 1e-10);
    }
    // Second eigenvector of a path is cos(π(i + 1/2)/n) up to sign
    let column = vectors.column(1);
    let norm = (n as f64 / 2.0).sqrt();
    let dot: f64 = (0..n)
      .map(|i| column[i] * (std::f64::consts::PI * (i as f64 + 0.5) / n as f64).cos() / norm)
      .sum();
    assert_abs_diff_eq!(dot.abs(), 1.0, epsilon = 1e-6);
  }

  #[test]
  fn exhausted_budget_is_reported() {
    let m = path_laplacian(400);
    let solver = LanczosSolver {
      max_iterations: 5,
      ..Default::default()
    };
    let err = solver.smallest_eigenpairs(&m, 3).unwrap_err();
    assert!(matches!(
      err,
      LleError::EigenNotConverged {
        iterations: 5,
        requested: 3,
        ..
      }
    ));
  }
}
