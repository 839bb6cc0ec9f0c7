// Display frame - everything a front-end needs to draw one redraw

use serde::{Deserialize, Serialize};

use crate::analysis::mapping::bucket_to_frequency;
use crate::analysis::{ResponseCurve, BUCKET_COUNT};
use crate::eq::Cluster;

/// One redraw worth of curves and overlays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayFrame {
    /// Generation of the live curve when the frame was built
    pub generation: u64,
    pub frozen: bool,
    /// Frequency in Hz of every bucket (x axis)
    pub frequencies: Vec<f32>,
    pub magnitude: Vec<f32>,
    pub phase: Vec<f32>,
    /// Threshold line, present while the overlay is enabled
    pub threshold: Option<f32>,
    /// Index of the held cluster each bucket is a member of
    pub cluster_of_bucket: Vec<Option<usize>>,
}

impl DisplayFrame {
    pub(crate) fn build(
        generation: u64,
        frozen: bool,
        curve: &ResponseCurve,
        threshold: Option<f32>,
        clusters: &[Cluster],
    ) -> Self {
        let mut cluster_of_bucket = vec![None; BUCKET_COUNT];
        for (index, cluster) in clusters.iter().enumerate() {
            for &member in cluster.members() {
                if let Some(slot) = cluster_of_bucket.get_mut(member) {
                    *slot = Some(index);
                }
            }
        }

        Self {
            generation,
            frozen,
            frequencies: (0..BUCKET_COUNT).map(bucket_to_frequency).collect(),
            magnitude: curve.magnitude.to_vec(),
            phase: curve.phase.to_vec(),
            threshold,
            cluster_of_bucket,
        }
    }
}
