//! Two-dimensional PCA projection of the embedding matrix, used for plotting.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

const MAX_ITERATIONS: usize = 200;
const TOLERANCE: f64 = 1e-12;

/// Projects the rows of `data` onto its two leading principal components.
///
/// Components come from power iteration on the centered matrix, so no
/// `d x d` covariance is ever built. The result is always `n x 2`; a column
/// stays zero when the data has no variance left in that direction.
pub fn project_2d(data: ArrayView2<f64>, seed: u64) -> Array2<f64> {
    let (samples, dims) = data.dim();
    let mut coords = Array2::zeros((samples, 2));
    let Some(mean) = data.mean_axis(Axis(0)) else {
        return coords;
    };
    if dims == 0 {
        return coords;
    }
    let centered = &data - &mean;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut components: Vec<Array1<f64>> = Vec::with_capacity(2);
    for column in 0..2 {
        let start = Array1::from_shape_fn(dims, |_| rng.gen_range(-1.0..1.0));
        let Some(component) = leading_component(centered.view(), start, &components) else {
            debug!(column, "No variance left to project");
            break;
        };
        coords.column_mut(column).assign(&centered.dot(&component));
        components.push(component);
    }
    coords
}

/// Power iteration for the dominant direction orthogonal to `found`.
fn leading_component(
    centered: ArrayView2<f64>,
    start: Array1<f64>,
    found: &[Array1<f64>],
) -> Option<Array1<f64>> {
    let mut v = normalized(orthogonalized(start, found))?;
    for iteration in 0..MAX_ITERATIONS {
        let scores = centered.dot(&v);
        let next = normalized(orthogonalized(centered.t().dot(&scores), found))?;
        let shift: f64 = next.iter().zip(v.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
        v = next;
        if shift < TOLERANCE {
            debug!(iteration, "Principal component converged");
            break;
        }
    }
    Some(v)
}

fn orthogonalized(mut v: Array1<f64>, basis: &[Array1<f64>]) -> Array1<f64> {
    for b in basis {
        let overlap = v.dot(b);
        v.scaled_add(-overlap, b);
    }
    v
}

fn normalized(v: Array1<f64>) -> Option<Array1<f64>> {
    let norm = v.dot(&v).sqrt();
    (norm > 1e-12).then(|| v / norm)
}
