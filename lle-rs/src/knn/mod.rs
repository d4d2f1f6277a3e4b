pub mod brute_force;
#[cfg(feature = "kdtree")]
pub mod kdtree;

use crate::error::LleError;
use crate::error::Result;
use ndarray::Array2;

/// Shared input checks for every search strategy.
pub(crate) fn check_search_input(n_samples: usize, k: usize) -> Result<()> {
  if n_samples < 2 {
    return Err(LleError::InvalidInput(format!(
      "neighbor search needs at least 2 samples, got {n_samples}"
    )));
  }
  if k == 0 {
    return Err(LleError::InvalidInput(
      "neighbor count must be >= 1".to_string(),
    ));
  }
  if k >= n_samples {
    return Err(LleError::InvalidInput(format!(
      "neighbor count ({k}) must be less than n_samples ({n_samples})"
    )));
  }
  if n_samples >= u32::MAX as usize {
    return Err(LleError::InvalidInput(format!(
      "n_samples ({n_samples}) must be < 2^32 for u32 indices"
    )));
  }
  Ok(())
}

/// Pack per-row neighbor lists into an `(n_samples, k)` matrix.
pub(crate) fn rows_to_graph(rows: Vec<Vec<u32>>, k: usize) -> Result<Array2<u32>> {
  let n_samples = rows.len();
  let flat: Vec<u32> = rows.into_iter().flatten().collect();
  Array2::from_shape_vec((n_samples, k), flat)
    .map_err(|e| LleError::InvalidInput(format!("neighbor rows have inconsistent length: {e}")))
}
