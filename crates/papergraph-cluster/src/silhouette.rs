use ndarray::ArrayView2;

use crate::kmeans::squared_distance;

/// Mean silhouette coefficient over all samples, with Euclidean distance.
///
/// Samples alone in their cluster score 0. Returns `None` when the labels do not
/// form between 2 and `n - 1` clusters, where the score is undefined.
pub fn silhouette_score(data: ArrayView2<f64>, labels: &[usize]) -> Option<f64> {
    let n = data.nrows();
    if n == 0 || labels.len() != n {
        return None;
    }

    let k = labels.iter().max().map_or(0, |m| m + 1);
    let mut sizes = vec![0usize; k];
    for &label in labels {
        sizes[label] += 1;
    }
    let populated = sizes.iter().filter(|&&s| s > 0).count();
    if populated < 2 || populated >= n {
        return None;
    }

    let mut total = 0.0;
    let mut sums = vec![0.0f64; k];
    for i in 0..n {
        sums.iter_mut().for_each(|s| *s = 0.0);
        for j in 0..n {
            if i != j {
                sums[labels[j]] += squared_distance(data.row(i), data.row(j)).sqrt();
            }
        }

        let own = labels[i];
        if sizes[own] <= 1 {
            continue;
        }
        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own && sizes[c] > 0)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    Some(total / n as f64)
}
