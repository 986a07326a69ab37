use serde::Serialize;
use tracing::info;

use crate::abstracts::AbstractsTable;
use crate::selection::KScore;

const PREVIEW_CHARS: usize = 200;
const PREVIEWS_PER_CLUSTER: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster: usize,
    pub size: usize,
    pub percentage: f64,
    pub previews: Vec<Preview>,
}

/// Outcome of one clustering run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterReport {
    pub total_rows: usize,
    pub clustered_rows: usize,
    pub k: usize,
    pub scores: Vec<KScore>,
    pub clusters: Vec<ClusterSummary>,
}

/// First 200 characters of `text`, with `...` appended when it was cut.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

impl ClusterReport {
    pub fn build(table: &AbstractsTable, labels: &[usize], k: usize, scores: Vec<KScore>) -> Self {
        let total = labels.len();
        let clusters = (0..k)
            .map(|cluster| {
                let members: Vec<usize> =
                    (0..total).filter(|&row| labels[row] == cluster).collect();
                let percentage =
                    if total == 0 { 0.0 } else { members.len() as f64 * 100.0 / total as f64 };
                ClusterSummary {
                    cluster,
                    size: members.len(),
                    percentage,
                    previews: members
                        .iter()
                        .take(PREVIEWS_PER_CLUSTER)
                        .map(|&row| Preview {
                            id: table.id(row).to_string(),
                            text: preview(table.text(row)),
                        })
                        .collect(),
                }
            })
            .collect();

        Self { total_rows: table.total_rows, clustered_rows: total, k, scores, clusters }
    }

    pub fn log(&self) {
        info!(
            "Clustered {} of {} abstracts into {} clusters",
            self.clustered_rows, self.total_rows, self.k
        );
        for summary in &self.clusters {
            info!(
                "Cluster {}: {} abstracts ({:.1}%)",
                summary.cluster, summary.size, summary.percentage
            );
            for p in &summary.previews {
                info!(cluster = summary.cluster, id = %p.id, "{}", p.text);
            }
        }
    }
}
