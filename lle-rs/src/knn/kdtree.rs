use super::check_search_input;
use super::rows_to_graph;
use crate::distances::rdist;
use crate::error::Result;
use crate::search::NeighborSearch;
use ndarray::Array2;
use ndarray::ArrayView2;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::collections::BinaryHeap;
use std::time::Instant;
use tracing::debug;

/// Exact k-nearest-neighbor search backed by a kd-tree.
///
/// The tree splits on the dimension of largest spread at the median. Queries
/// keep a bounded max-heap of `(distance, index)` pairs, so ties resolve to
/// the lower index exactly like [`BruteForceSearch`](super::brute_force::BruteForceSearch).
/// Pays off when the input dimensionality is low relative to `log2(n_samples)`.
#[derive(Debug, Clone, Copy)]
pub struct KdTreeSearch {
  /// Maximum number of points stored in a leaf.
  pub leaf_size: usize,
}

impl Default for KdTreeSearch {
  fn default() -> Self {
    Self { leaf_size: 16 }
  }
}

#[derive(Debug)]
enum Node {
  Leaf {
    start: usize,
    end: usize,
  },
  Split {
    dim: usize,
    value: f32,
    left: usize,
    right: usize,
  },
}

struct KdTree<'a> {
  data: ArrayView2<'a, f32>,
  order: Vec<u32>,
  nodes: Vec<Node>,
}

type Candidate = (OrderedFloat<f64>, u32);

impl<'a> KdTree<'a> {
  fn build(data: ArrayView2<'a, f32>, leaf_size: usize) -> Self {
    let mut order: Vec<u32> = (0..data.nrows() as u32).collect();
    let mut nodes = Vec::new();
    let len = order.len();
    build_node(data, &mut order, 0, len, leaf_size.max(1), &mut nodes);
    Self { data, order, nodes }
  }

  fn query(&self, i: usize, k: usize) -> Vec<u32> {
    let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
    self.visit(0, i, k, &mut heap);
    heap
      .into_sorted_vec()
      .into_iter()
      .map(|(_, j)| j)
      .collect()
  }

  fn visit(&self, node: usize, i: usize, k: usize, heap: &mut BinaryHeap<Candidate>) {
    match self.nodes[node] {
      Node::Leaf { start, end } => {
        let point = self.data.row(i);
        for &j in &self.order[start..end] {
          if j as usize == i {
            continue;
          }
          let candidate = (OrderedFloat(rdist(&point, &self.data.row(j as usize))), j);
          if heap.len() < k {
            heap.push(candidate);
          } else if heap.peek().is_some_and(|top| candidate < *top) {
            heap.pop();
            heap.push(candidate);
          }
        }
      }
      Node::Split {
        dim,
        value,
        left,
        right,
      } => {
        let diff = self.data[(i, dim)] as f64 - value as f64;
        let (near, far) = if diff < 0.0 {
          (left, right)
        } else {
          (right, left)
        };
        self.visit(near, i, k, heap);
        // <= keeps equal-distance candidates with a lower index reachable
        let bound = diff * diff;
        if heap.len() < k || heap.peek().is_some_and(|top| bound <= top.0.0) {
          self.visit(far, i, k, heap);
        }
      }
    }
  }
}

fn build_node(
  data: ArrayView2<f32>,
  order: &mut [u32],
  start: usize,
  end: usize,
  leaf_size: usize,
  nodes: &mut Vec<Node>,
) -> usize {
  let id = nodes.len();
  nodes.push(Node::Leaf { start, end });
  if end - start <= leaf_size {
    return id;
  }

  // Split on the dimension with the largest spread
  let slice = &mut order[start..end];
  let mut best_dim = 0;
  let mut best_spread = 0.0f32;
  for dim in 0..data.ncols() {
    let (lo, hi) = slice.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &j| {
      let v = data[(j as usize, dim)];
      (lo.min(v), hi.max(v))
    });
    if hi - lo > best_spread {
      best_spread = hi - lo;
      best_dim = dim;
    }
  }
  if best_spread <= 0.0 {
    // All points coincide
    return id;
  }

  let mid = slice.len() / 2;
  slice.select_nth_unstable_by(mid, |&a, &b| {
    data[(a as usize, best_dim)].total_cmp(&data[(b as usize, best_dim)])
  });
  let value = data[(slice[mid] as usize, best_dim)];

  let left = build_node(data, order, start, start + mid, leaf_size, nodes);
  let right = build_node(data, order, start + mid, end, leaf_size, nodes);
  nodes[id] = Node::Split {
    dim: best_dim,
    value,
    left,
    right,
  };
  id
}

impl NeighborSearch for KdTreeSearch {
  fn name(&self) -> &'static str {
    "kdtree"
  }

  fn search(&self, data: ArrayView2<f32>, k: usize) -> Result<Array2<u32>> {
    let n_samples = data.nrows();
    check_search_input(n_samples, k)?;

    let started = Instant::now();
    let tree = KdTree::build(data, self.leaf_size);
    debug!(
      duration_ms = started.elapsed().as_millis(),
      nodes = tree.nodes.len(),
      "kdtree build complete"
    );

    let rows: Vec<Vec<u32>> = (0..n_samples)
      .into_par_iter()
      .map(|i| tree.query(i, k))
      .collect();
    rows_to_graph(rows, k)
  }
}
