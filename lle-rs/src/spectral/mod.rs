pub mod dense;
mod envelope;
pub mod lanczos;

use sprs::CsMat;

/// Gershgorin bound on the spectral radius: the largest absolute row sum.
pub(crate) fn gershgorin_bound(matrix: &CsMat<f64>) -> f64 {
  matrix
    .outer_iterator()
    .map(|row| row.data().iter().map(|v| v.abs()).sum::<f64>())
    .fold(0.0, f64::max)
}
