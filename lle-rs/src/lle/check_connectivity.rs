use ndarray::ArrayView2;
use tracing::debug;
use tracing::warn;

fn find(parent: &mut [usize], mut x: usize) -> usize {
  while parent[x] != x {
    parent[x] = parent[parent[x]];
    x = parent[x];
  }
  x
}

/// Number of weakly connected components of the neighbor graph.
pub fn count_components(graph: ArrayView2<u32>) -> usize {
  let n_samples = graph.nrows();
  let mut parent: Vec<usize> = (0..n_samples).collect();
  let mut components = n_samples;
  for (i, row) in graph.outer_iter().enumerate() {
    for &j in row.iter() {
      let a = find(&mut parent, i);
      let b = find(&mut parent, j as usize);
      if a != b {
        parent[a] = b;
        components -= 1;
      }
    }
  }
  components
}

/// Warn when the neighbor graph falls apart.
///
/// Each component contributes its own zero eigenvalue to the cost operator,
/// so the bottom eigenvectors become component indicators and the embedding
/// no longer relates the pieces to one another.
pub fn check_connectivity(graph: ArrayView2<u32>) -> usize {
  let components = count_components(graph);
  if components > 1 {
    warn!(
      "The neighbor graph has {components} disconnected components. The embedding will place each component independently; consider increasing n_neighbors."
    );
  } else {
    debug!("neighbor graph is connected");
  }
  components
}
