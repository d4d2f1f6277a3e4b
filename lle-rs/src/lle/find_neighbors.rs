use crate::error::LleError;
use crate::error::Result;
use crate::search::NeighborSearch;
use ndarray::Array2;
use ndarray::ArrayView2;
use std::time::Instant;
use tracing::info;

/// Run `search` and check that its output is a well-formed neighbor graph.
///
/// Every capability goes through this, so a misbehaving accelerated search
/// fails with `InvalidInput` instead of producing a wrong-shaped graph.
pub fn find_neighbors(
  search: &dyn NeighborSearch,
  data: ArrayView2<f32>,
  k: usize,
) -> Result<Array2<u32>> {
  let started = Instant::now();
  let graph = search.search(data, k)?;
  validate_graph(graph.view(), data.nrows(), k)?;
  info!(
    duration_ms = started.elapsed().as_millis(),
    search = search.name(),
    n_samples = data.nrows(),
    n_neighbors = k,
    "neighbor graph complete"
  );
  Ok(graph)
}

/// Check shape, index range, self references and repeats.
pub fn validate_graph(graph: ArrayView2<u32>, n_samples: usize, k: usize) -> Result<()> {
  if graph.shape() != [n_samples, k] {
    return Err(LleError::InvalidInput(format!(
      "neighbor graph has shape {:?}, expected [{n_samples}, {k}]",
      graph.shape()
    )));
  }

  let mut seen = vec![usize::MAX; n_samples];
  for (i, row) in graph.outer_iter().enumerate() {
    for &j in row.iter() {
      let j = j as usize;
      if j >= n_samples {
        return Err(LleError::InvalidInput(format!(
          "neighbor {j} of point {i} is out of range"
        )));
      }
      if j == i {
        return Err(LleError::InvalidInput(format!(
          "point {i} lists itself as a neighbor"
        )));
      }
      // seen[j] == i marks a repeat within row i
      if seen[j] == i {
        return Err(LleError::InvalidInput(format!(
          "point {i} lists neighbor {j} twice"
        )));
      }
      seen[j] = i;
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::validate_graph;
  use crate::error::LleError;
  use ndarray::array;

  #[test]
  fn accepts_well_formed_graph() {
    let graph = array![[1u32, 2], [0, 2], [1, 0]];
    assert!(validate_graph(graph.view(), 3, 2).is_ok());
  }

  #[test]
  fn rejects_malformed_graphs() {
    let cases = [
      array![[1u32, 2], [0, 2], [1, 3]],
      array![[0u32, 2], [0, 2], [1, 0]],
      array![[1u32, 1], [0, 2], [1, 0]],
    ];
    for graph in cases {
      let err = validate_graph(graph.view(), 3, 2).unwrap_err();
      assert!(matches!(err, LleError::InvalidInput(_)));
    }
    let wrong_shape = array![[1u32], [0], [1]];
    assert!(validate_graph(wrong_shape.view(), 3, 2).is_err());
  }
}
