use crate::error::Result;
use ndarray::Array1;
use ndarray::Array2;
use sprs::CsMat;
use std::fmt::Debug;

/// A symmetric eigensolver for the bottom of the spectrum.
///
/// Given a symmetric positive semi-definite `n × n` matrix, implementations
/// return the `count` smallest eigenvalues in ascending order together with
/// an `(n, count)` matrix whose columns are the matching unit eigenvectors.
/// Eigenvector signs are arbitrary.
pub trait EigenSolver: Debug + Send + Sync {
  /// Short name used in logs and fallback reports.
  fn name(&self) -> &'static str;

  /// Compute the `count` smallest eigenpairs of `matrix`.
  ///
  /// # Errors
  ///
  /// Iterative solvers return `EigenNotConverged` when their budget runs out.
  fn smallest_eigenpairs(
    &self,
    matrix: &CsMat<f64>,
    count: usize,
  ) -> Result<(Array1<f64>, Array2<f64>)>;
}
