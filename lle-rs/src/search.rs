use crate::error::Result;
use ndarray::Array2;
use ndarray::ArrayView2;
use std::fmt::Debug;

/// A k-nearest-neighbor search capability.
///
/// Implementations return an `(n_samples, k)` matrix whose row `i` holds the
/// indices of the `k` nearest neighbors of sample `i`, never `i` itself and
/// without repeats. Neighbor order and tie breaking are up to the
/// implementation. Thread-safety (Send + Sync) is required so a search can be
/// shared with parallel workers.
pub trait NeighborSearch: Debug + Send + Sync {
  /// Short name used in logs and fallback reports.
  fn name(&self) -> &'static str;

  /// Find the `k` nearest neighbors of every row of `data`.
  ///
  /// # Errors
  ///
  /// `InvalidInput` if `k == 0`, `k >= n_samples` or `data` has fewer than two
  /// rows.
  fn search(&self, data: ArrayView2<f32>, k: usize) -> Result<Array2<u32>>;
}
