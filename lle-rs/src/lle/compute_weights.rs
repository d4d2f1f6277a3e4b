use super::solve_weights::solve_weights;
use crate::error::LleError;
use crate::error::Result;
use ndarray::Array1;
use ndarray::ArrayView2;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::ThreadPoolBuilder;
use sprs::CsMat;
use std::ops::Range;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc::sync_channel;
use std::time::Duration;
use std::time::Instant;
use tracing::debug;
use tracing::info;
use typed_builder::TypedBuilder;

/// What a worker hands back through the completion channel.
enum WorkerOutcome {
  /// Weight vectors for every point of the chunk, in chunk order.
  Done(Vec<Array1<f64>>),
  /// A point of the chunk could not be solved.
  Failed(LleError),
  /// Stopped early because another worker failed.
  Cancelled,
}

struct WorkerMessage {
  worker_id: usize,
  outcome: WorkerOutcome,
}

/// Split `0..n` into `n_chunks` contiguous ranges whose lengths differ by at
/// most one. The first `n % n_chunks` ranges get the extra point; surplus
/// chunks are empty when `n_chunks > n`.
pub fn partition(n: usize, n_chunks: usize) -> Vec<Range<usize>> {
  let n_chunks = n_chunks.max(1);
  let base = n / n_chunks;
  let extra = n % n_chunks;
  let mut start = 0;
  (0..n_chunks)
    .map(|c| {
      let len = base + usize::from(c < extra);
      let range = start..start + len;
      start += len;
      range
    })
    .collect()
}

/*
  Compute the global reconstruction weight matrix in parallel.

  The points are split into n_workers contiguous chunks. Each worker runs on a
  dedicated pool capped at n_workers threads, solves every point of its chunk
  into a local buffer and reports (worker_id, outcome) through a bounded
  completion channel. The merge places each chunk by its range, never by
  arrival order, so completion order cannot affect the result.

  If a worker fails, an abort flag stops the others early. All n_workers
  messages are still drained before the failure is returned and partial
  results are dropped.

  Parameters
  ----------
  data: array of shape (n_samples, n_features)
      The dataset, shared read-only with the workers.

  graph: array of shape (n_samples, n_neighbors)
      Validated neighbor graph.

  regularization: float
      Passed through to the per-point solver.

  n_workers: int
      Number of workers (>= 1).

  scheduling_jitter: int (optional)
      Seed for random per-worker delays. Only used to shake out ordering bugs.

  Returns
  -------
  weights: sparse matrix of shape (n_samples, n_samples), CSC
      Column i holds the weights of point i at the rows of its neighbors.
*/
#[derive(TypedBuilder, Debug)]
pub struct ComputeWeights<'a> {
  data: ArrayView2<'a, f32>,
  graph: ArrayView2<'a, u32>,
  regularization: f64,
  n_workers: usize,
  #[builder(default)]
  scheduling_jitter: Option<u64>,
}

impl<'a> ComputeWeights<'a> {
  pub fn exec(self) -> Result<CsMat<f64>> {
    let ComputeWeights {
      data,
      graph,
      regularization,
      n_workers,
      scheduling_jitter,
    } = self;

    let n_samples = data.nrows();
    let n_neighbors = graph.ncols();
    if graph.nrows() != n_samples {
      return Err(LleError::InvalidInput(format!(
        "neighbor graph has {} rows but data has {} samples",
        graph.nrows(),
        n_samples
      )));
    }
    if n_workers == 0 {
      return Err(LleError::InvalidConfiguration(
        "n_workers must be resolved to >= 1 before the weight phase".to_string(),
      ));
    }

    let started = Instant::now();
    let chunks = partition(n_samples, n_workers);
    let pool = ThreadPoolBuilder::new()
      .num_threads(n_workers)
      .thread_name(|i| format!("lle-weights-{i}"))
      .build()
      .map_err(|e| LleError::ThreadPool(e.to_string()))?;

    let abort = AtomicBool::new(false);
    let (tx, rx) = sync_channel::<WorkerMessage>(n_workers);
    let mut results: Vec<Option<Vec<Array1<f64>>>> = (0..n_workers).map(|_| None).collect();
    let mut failures: Vec<LleError> = Vec::new();

    pool.in_place_scope(|scope| {
      for (worker_id, range) in chunks.iter().cloned().enumerate() {
        let tx = tx.clone();
        let abort = &abort;
        scope.spawn(move |_| {
          let outcome = solve_chunk(
            data,
            graph,
            range,
            regularization,
            abort,
            scheduling_jitter.map(|seed| seed ^ worker_id as u64),
          );
          // The receiver outlives every worker
          let _ = tx.send(WorkerMessage { worker_id, outcome });
        });
      }
      drop(tx);

      // Fan-in: drain every worker, even after a failure
      for arrival in 0..n_workers {
        let Ok(WorkerMessage { worker_id, outcome }) = rx.recv() else {
          break;
        };
        debug!(worker_id, arrival, "weight worker finished");
        match outcome {
          WorkerOutcome::Done(weights) => results[worker_id] = Some(weights),
          WorkerOutcome::Failed(err) => failures.push(err),
          WorkerOutcome::Cancelled => {}
        }
      }
    });

    if !failures.is_empty() {
      // Report the lowest failing point for a stable message
      failures.sort_by_key(|err| match err {
        LleError::SingularSystem { point } => *point,
        _ => usize::MAX,
      });
      return Err(failures.swap_remove(0));
    }

    // Merge by chunk range: column i gets the weights of point i
    let nnz = n_samples * n_neighbors;
    let indptr: Vec<usize> = (0..=n_samples).map(|i| i * n_neighbors).collect();
    let mut indices = Vec::with_capacity(nnz);
    let mut values = Vec::with_capacity(nnz);
    for (worker_id, range) in chunks.into_iter().enumerate() {
      let Some(chunk) = results[worker_id].take() else {
        return Err(LleError::InvalidInput(format!(
          "weight worker {worker_id} produced no result"
        )));
      };
      for (i, weights) in range.zip(chunk) {
        let mut column: Vec<(usize, f64)> = graph
          .row(i)
          .iter()
          .map(|&j| j as usize)
          .zip(weights.iter().copied())
          .collect();
        column.sort_unstable_by_key(|&(j, _)| j);
        for (j, w) in column {
          indices.push(j);
          values.push(w);
        }
      }
    }

    let weights = CsMat::new_csc((n_samples, n_samples), indptr, indices, values);
    info!(
      duration_ms = started.elapsed().as_millis(),
      n_workers,
      nnz = weights.nnz(),
      "reconstruction weights complete"
    );
    Ok(weights)
  }
}

fn solve_chunk(
  data: ArrayView2<f32>,
  graph: ArrayView2<u32>,
  range: Range<usize>,
  regularization: f64,
  abort: &AtomicBool,
  jitter: Option<u64>,
) -> WorkerOutcome {
  let mut rng = jitter.map(StdRng::seed_from_u64);
  let mut weights = Vec::with_capacity(range.len());

  for i in range {
    if abort.load(Ordering::Relaxed) {
      return WorkerOutcome::Cancelled;
    }
    if let Some(rng) = rng.as_mut() {
      if rng.random_bool(0.25) {
        std::thread::sleep(Duration::from_micros(rng.random_range(0..2_000)));
      }
    }
    match solve_weights(data, i, graph.row(i), regularization) {
      Ok(w) => weights.push(w),
      Err(err) => {
        abort.store(true, Ordering::Relaxed);
        return WorkerOutcome::Failed(err);
      }
    }
  }

  WorkerOutcome::Done(weights)
}
