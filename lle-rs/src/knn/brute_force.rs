use super::check_search_input;
use super::rows_to_graph;
use crate::distances::rdist;
use crate::error::Result;
use crate::search::NeighborSearch;
use ndarray::Array2;
use ndarray::ArrayView2;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Exact k-nearest-neighbor search by scanning every pair.
///
/// For each sample the squared Euclidean distance to every other sample is
/// computed and the `k` smallest are kept, ordered by ascending distance with
/// ties broken by the lower index. The sample itself is excluded by index, so
/// exact duplicates of a sample remain eligible neighbors. Rows are processed
/// in parallel; the result is fully deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceSearch;

#[inline]
fn by_distance_then_index(a: &(f64, u32), b: &(f64, u32)) -> Ordering {
  a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

impl NeighborSearch for BruteForceSearch {
  fn name(&self) -> &'static str {
    "brute_force"
  }

  fn search(&self, data: ArrayView2<f32>, k: usize) -> Result<Array2<u32>> {
    let n_samples = data.nrows();
    check_search_input(n_samples, k)?;

    let rows: Vec<Vec<u32>> = (0..n_samples)
      .into_par_iter()
      .map(|i| {
        let point = data.row(i);
        let mut candidates: Vec<(f64, u32)> = (0..n_samples)
          .filter(|&j| j != i)
          .map(|j| (rdist(&point, &data.row(j)), j as u32))
          .collect();

        // Partial selection first, then order only the k survivors.
        candidates.select_nth_unstable_by(k - 1, by_distance_then_index);
        candidates.truncate(k);
        candidates.sort_unstable_by(by_distance_then_index);
        candidates.into_iter().map(|(_, j)| j).collect()
      })
      .collect();

    rows_to_graph(rows, k)
  }
}
