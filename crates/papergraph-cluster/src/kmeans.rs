//! Seeded k-means with k-means++ initialization.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::trace;

use crate::error::ClusterError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    /// Independent initializations; the lowest-inertia run wins.
    pub n_init: usize,
    pub max_iterations: usize,
    /// Convergence threshold on the summed squared centroid shift.
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self { n_init: 10, max_iterations: 300, tolerance: 1e-4, seed: 42 }
    }
}

#[derive(Debug, Clone)]
pub struct KMeansModel {
    pub centroids: Array2<f64>,
    pub labels: Vec<usize>,
    /// Sum of squared distances of samples to their centroid.
    pub inertia: f64,
    pub iterations: usize,
}

impl KMeansModel {
    pub fn k(&self) -> usize {
        self.centroids.nrows()
    }
}

pub(crate) fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Fits `k` clusters to the rows of `data`.
pub fn fit(
    data: ArrayView2<f64>,
    k: usize,
    config: &KMeansConfig,
) -> Result<KMeansModel, ClusterError> {
    let samples = data.nrows();
    if k == 0 || k > samples {
        return Err(ClusterError::InvalidClusterCount { k, samples });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<KMeansModel> = None;

    for run in 0..config.n_init.max(1) {
        let centroids = init_plus_plus(data, k, &mut rng);
        let model = lloyd(data, centroids, config);
        trace!(run, k, inertia = model.inertia, iterations = model.iterations, "k-means run");

        if best.as_ref().map_or(true, |b| model.inertia < b.inertia) {
            best = Some(model);
        }
    }

    best.ok_or(ClusterError::InvalidClusterCount { k, samples })
}

/// k-means++: the first centroid is uniform, each next one is drawn with
/// probability proportional to the squared distance to the nearest chosen centroid.
fn init_plus_plus(data: ArrayView2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let samples = data.nrows();
    let mut centroids = Array2::zeros((k, data.ncols()));
    centroids.row_mut(0).assign(&data.row(rng.gen_range(0..samples)));

    let mut nearest: Vec<f64> = data
        .outer_iter()
        .map(|row| squared_distance(row, centroids.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = nearest.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = samples - 1;
            for (i, d) in nearest.iter().enumerate() {
                if target < *d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        } else {
            // Every sample coincides with a centroid already
            rng.gen_range(0..samples)
        };

        centroids.row_mut(c).assign(&data.row(chosen));
        for (i, row) in data.outer_iter().enumerate() {
            nearest[i] = nearest[i].min(squared_distance(row, centroids.row(c)));
        }
    }

    centroids
}

fn assign(data: ArrayView2<f64>, centroids: &Array2<f64>, labels: &mut [usize]) -> f64 {
    let mut inertia = 0.0;
    for (i, row) in data.outer_iter().enumerate() {
        let (label, dist) = centroids
            .outer_iter()
            .enumerate()
            .map(|(c, centroid)| (c, squared_distance(row, centroid)))
            .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best });
        labels[i] = label;
        inertia += dist;
    }
    inertia
}

fn lloyd(data: ArrayView2<f64>, mut centroids: Array2<f64>, config: &KMeansConfig) -> KMeansModel {
    let k = centroids.nrows();
    let mut labels = vec![0; data.nrows()];
    let mut iterations = 0;

    for _ in 0..config.max_iterations.max(1) {
        iterations += 1;
        assign(data, &centroids, &mut labels);

        let mut sums = Array2::<f64>::zeros(centroids.raw_dim());
        let mut counts = vec![0usize; k];
        for (row, &label) in data.outer_iter().zip(&labels) {
            let mut sum = sums.row_mut(label);
            sum += &row;
            counts[label] += 1;
        }

        let mut updated = centroids.clone();
        for c in 0..k {
            if counts[c] > 0 {
                updated.row_mut(c).assign(&(&sums.row(c) / counts[c] as f64));
            } else {
                // Relocate an empty cluster onto the sample farthest from its centroid
                let far = data
                    .outer_iter()
                    .zip(&labels)
                    .map(|(row, &l)| squared_distance(row, centroids.row(l)))
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, cur| {
                        if cur.1 > best.1 {
                            cur
                        } else {
                            best
                        }
                    })
                    .0;
                updated.row_mut(c).assign(&data.row(far));
            }
        }

        let shift: f64 = updated
            .axis_iter(Axis(0))
            .zip(centroids.axis_iter(Axis(0)))
            .map(|(a, b)| squared_distance(a, b))
            .sum();
        centroids = updated;

        if shift <= config.tolerance {
            break;
        }
    }

    let inertia = assign(data, &centroids, &mut labels);
    KMeansModel { centroids, labels, inertia, iterations }
}
