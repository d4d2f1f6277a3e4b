use crate::eigensolver::EigenSolver;
use crate::error::LleError;
use crate::error::Result;
use nalgebra::DMatrix;
use ndarray::Array1;
use ndarray::Array2;
use sprs::CsMat;
use std::time::Instant;
use tracing::info;

/// Exact eigensolver: densify and run a full symmetric eigendecomposition.
///
/// Always converges, but costs O(N³) time and O(N²) memory, so it is only
/// practical up to a few thousand samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseSolver;

impl EigenSolver for DenseSolver {
  fn name(&self) -> &'static str {
    "dense"
  }

  fn smallest_eigenpairs(
    &self,
    matrix: &CsMat<f64>,
    count: usize,
  ) -> Result<(Array1<f64>, Array2<f64>)> {
    let n = matrix.rows();
    if count > n {
      return Err(LleError::InvalidInput(format!(
        "requested {count} eigenpairs of a {n}x{n} matrix"
      )));
    }

    let started = Instant::now();
    let mut dense = DMatrix::<f64>::zeros(n, n);
    for (&v, (r, c)) in matrix.iter() {
      dense[(r, c)] += v;
    }
    let eigen = dense.symmetric_eigen();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));
    order.truncate(count);

    let values: Array1<f64> = order.iter().map(|&i| eigen.eigenvalues[i]).collect();
    let vectors = Array2::from_shape_fn((n, count), |(r, c)| eigen.eigenvectors[(r, order[c])]);
    info!(
      duration_ms = started.elapsed().as_millis(),
      n,
      count,
      "dense eigendecomposition complete"
    );
    Ok((values, vectors))
  }
}
