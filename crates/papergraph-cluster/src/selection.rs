//! Choosing the number of clusters by silhouette score.

use ndarray::ArrayView2;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ClusterError;
use crate::kmeans::{self, KMeansConfig};
use crate::silhouette::silhouette_score;

/// Score of one candidate cluster count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KScore {
    pub k: usize,
    pub silhouette: f64,
    pub inertia: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KSelection {
    pub k: usize,
    /// Every candidate that was evaluated, in ascending `k`.
    pub scores: Vec<KScore>,
}

/// Candidate cluster counts for `samples` rows: `min_k ..= min(max_k, samples - 1)`.
pub fn candidate_range(
    samples: usize,
    min_k: usize,
    max_k: usize,
) -> std::ops::RangeInclusive<usize> {
    let upper = max_k.min(samples.saturating_sub(1));
    min_k.max(2)..=upper
}

/// Fits every candidate `k` and keeps the one with the highest silhouette
/// score, preferring the smallest `k` on ties. When no candidate exists (fewer
/// than three samples) the answer is a single cluster.
pub fn select_k(
    data: ArrayView2<f64>,
    min_k: usize,
    max_k: usize,
    config: &KMeansConfig,
) -> Result<KSelection, ClusterError> {
    let samples = data.nrows();
    if samples == 0 {
        return Err(ClusterError::NoAbstracts);
    }

    let mut scores = Vec::new();
    for k in candidate_range(samples, min_k, max_k) {
        let model = kmeans::fit(data, k, config)?;
        // Fewer populated clusters than requested makes the score undefined
        let silhouette = silhouette_score(data, &model.labels).unwrap_or(f64::NEG_INFINITY);
        debug!(k, silhouette, inertia = model.inertia, "Evaluated cluster count");
        scores.push(KScore { k, silhouette, inertia: model.inertia });
    }

    let best = scores
        .iter()
        .fold(None::<&KScore>, |best, s| match best {
            Some(b) if b.silhouette >= s.silhouette => Some(b),
            _ => Some(s),
        })
        .map_or(1, |s| s.k);

    info!("Selected {} clusters from {} candidates", best, scores.len());
    Ok(KSelection { k: best, scores })
}
