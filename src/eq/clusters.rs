// Peak clustering - peaks in the smoothed magnitude grouped into a bounded set of clusters
//
// Detect runs three steps on one magnitude snapshot:
// 1. find_peaks: strict local maxima of |v| above the threshold
// 2. group_into_clusters: a new cluster starts when the gap to the previous peak
//    exceeds min_distance
// 3. limit_clusters: merge the closest adjacent pair until at most max_clusters remain

use serde::{Deserialize, Serialize};

/// Accepted peak threshold range
pub const THRESHOLD_RANGE: (f32, f32) = (0.5, 1.0);

/// Accepted cluster cap range
pub const MAX_CLUSTERS_RANGE: (usize, usize) = (1, 5);

/// Consecutive peak indices treated as one problem region
///
/// Members are non-empty and strictly increasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ClusterMembers")]
pub struct Cluster {
    members: Vec<usize>,
}

/// Unchecked wire form of a `Cluster`
#[derive(Deserialize)]
struct ClusterMembers {
    members: Vec<usize>,
}

impl Cluster {
    pub fn new(first: usize) -> Self {
        Self {
            members: vec![first],
        }
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn first(&self) -> usize {
        self.members[0]
    }

    pub fn last(&self) -> usize {
        self.members[self.members.len() - 1]
    }

    /// Number of peaks in the cluster
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// floor of the mean member index
    pub fn center(&self) -> usize {
        self.members.iter().sum::<usize>() / self.members.len()
    }

    fn push(&mut self, index: usize) {
        self.members.push(index);
    }

    fn absorb(&mut self, other: Cluster) {
        self.members.extend(other.members);
    }
}

impl TryFrom<ClusterMembers> for Cluster {
    type Error = String;

    fn try_from(raw: ClusterMembers) -> Result<Self, Self::Error> {
        if raw.members.is_empty() {
            return Err("a cluster needs at least one peak".to_string());
        }
        if !raw.members.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err("cluster members must be strictly increasing".to_string());
        }
        Ok(Self {
            members: raw.members,
        })
    }
}

impl From<Vec<usize>> for Cluster {
    /// # Panics
    /// Panics on an empty vector
    fn from(members: Vec<usize>) -> Self {
        assert!(!members.is_empty(), "a cluster needs at least one peak");
        Self { members }
    }
}

/// Indices in [1, len - 2] that are strict local maxima of |v| above `threshold`
pub fn find_peaks(values: &[f32], threshold: f32) -> Vec<usize> {
    if values.len() < 3 {
        return Vec::new();
    }

    (1..values.len() - 1)
        .filter(|&i| {
            let v = values[i].abs();
            v > threshold && v > values[i - 1].abs() && v > values[i + 1].abs()
        })
        .collect()
}

/// Split ascending peaks into clusters wherever the gap exceeds `min_distance`
pub fn group_into_clusters(peaks: &[usize], min_distance: usize) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();
    for &peak in peaks {
        match clusters.last_mut() {
            Some(current) if peak - current.last() <= min_distance => current.push(peak),
            _ => clusters.push(Cluster::new(peak)),
        }
    }
    clusters
}

/// Merge the adjacent pair with the smallest gap (leftmost on ties)
///
/// Returns false when fewer than two clusters exist.
pub fn merge_closest_pair(clusters: &mut Vec<Cluster>) -> bool {
    if clusters.len() < 2 {
        return false;
    }

    let mut best = 0;
    let mut best_gap = usize::MAX;
    for i in 0..clusters.len() - 1 {
        let gap = clusters[i + 1].first() - clusters[i].last();
        if gap < best_gap {
            best_gap = gap;
            best = i;
        }
    }

    let right = clusters.remove(best + 1);
    clusters[best].absorb(right);
    true
}

/// Merge clusters until at most `max_clusters` (at least 1) remain
pub fn limit_clusters(mut clusters: Vec<Cluster>, max_clusters: usize) -> Vec<Cluster> {
    let max_clusters = max_clusters.max(1);
    while clusters.len() > max_clusters {
        if !merge_closest_pair(&mut clusters) {
            break;
        }
    }
    clusters
}

/// Outcome of one detect pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub peaks: Vec<usize>,
    pub clusters: Vec<Cluster>,
}

/// Threshold, cap and grouping distance for detection
#[derive(Debug, Clone)]
pub struct PeakClusterEngine {
    threshold: f32,
    max_clusters: usize,
    min_distance: usize,
}

impl PeakClusterEngine {
    /// Out-of-range threshold and cap are clamped
    pub fn new(threshold: f32, max_clusters: usize, min_distance: usize) -> Self {
        let mut engine = Self {
            threshold: THRESHOLD_RANGE.0,
            max_clusters: MAX_CLUSTERS_RANGE.1,
            min_distance,
        };
        engine.set_threshold(threshold);
        engine.set_max_clusters(max_clusters);
        engine
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn max_clusters(&self) -> usize {
        self.max_clusters
    }

    pub fn min_distance(&self) -> usize {
        self.min_distance
    }

    /// Returns the value actually stored
    pub fn set_threshold(&mut self, threshold: f32) -> f32 {
        self.threshold = if threshold.is_nan() {
            THRESHOLD_RANGE.0
        } else {
            threshold.clamp(THRESHOLD_RANGE.0, THRESHOLD_RANGE.1)
        };
        self.threshold
    }

    /// Returns the value actually stored
    pub fn set_max_clusters(&mut self, max_clusters: usize) -> usize {
        self.max_clusters = max_clusters.clamp(MAX_CLUSTERS_RANGE.0, MAX_CLUSTERS_RANGE.1);
        self.max_clusters
    }

    pub fn detect(&self, magnitude: &[f32]) -> Detection {
        let peaks = find_peaks(magnitude, self.threshold);
        let clusters = limit_clusters(
            group_into_clusters(&peaks, self.min_distance),
            self.max_clusters,
        );
        Detection { peaks, clusters }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::BUCKET_COUNT;

    fn members(clusters: &[Cluster]) -> Vec<Vec<usize>> {
        clusters.iter().map(|c| c.members().to_vec()).collect()
    }

    #[test]
    fn test_single_peak_forms_single_cluster() {
        let mut magnitude = [0.0f32; BUCKET_COUNT];
        magnitude[100] = 0.9;

        let engine = PeakClusterEngine::new(0.5, 5, 0);
        let detection = engine.detect(&magnitude);
        assert_eq!(detection.peaks, vec![100]);
        assert_eq!(members(&detection.clusters), vec![vec![100]]);
    }

    #[test]
    fn test_peaks_need_strict_maximum_and_threshold() {
        let values = [0.0, 0.9, 0.9, 0.0, 0.6, 0.0, 0.4, 0.0, 0.7];
        // 1/2 plateau is not strict; 6 is below threshold; 8 is the last index
        assert_eq!(find_peaks(&values, 0.5), vec![4]);
    }

    #[test]
    fn test_peaks_compare_absolute_values() {
        let values = [0.0, -0.8, 0.1];
        assert_eq!(find_peaks(&values, 0.5), vec![1]);
    }

    #[test]
    fn test_edges_never_peak() {
        let values = [0.99, 0.1, 0.2, 0.1, 0.99];
        assert!(find_peaks(&values, 0.5).is_empty());
        assert!(find_peaks(&[0.9, 0.1], 0.5).is_empty());
    }

    #[test]
    fn test_zero_min_distance_separates_every_peak() {
        let clusters = group_into_clusters(&[10, 12, 13, 150], 0);
        assert_eq!(
            members(&clusters),
            vec![vec![10], vec![12], vec![13], vec![150]]
        );
    }

    #[test]
    fn test_min_distance_groups_neighbours() {
        let clusters = group_into_clusters(&[10, 12, 13, 150], 2);
        assert_eq!(members(&clusters), vec![vec![10, 12, 13], vec![150]]);
    }

    #[test]
    fn test_limit_merges_closest_pair() {
        let clusters = vec![
            Cluster::from(vec![10]),
            Cluster::from(vec![12]),
            Cluster::from(vec![150]),
        ];
        let limited = limit_clusters(clusters, 2);
        assert_eq!(members(&limited), vec![vec![10, 12], vec![150]]);
    }

    #[test]
    fn test_limit_prefers_leftmost_on_tie() {
        let clusters = vec![
            Cluster::from(vec![10]),
            Cluster::from(vec![15]),
            Cluster::from(vec![20]),
        ];
        let limited = limit_clusters(clusters, 2);
        assert_eq!(members(&limited), vec![vec![10, 15], vec![20]]);
    }

    #[test]
    fn test_limit_bounds_count_for_every_cap() {
        let peaks: Vec<usize> = (1..40).map(|i| i * 5).collect();
        for max in 1..=5 {
            let limited = limit_clusters(group_into_clusters(&peaks, 0), max);
            assert!(limited.len() <= max);
            // every peak survives, still ascending
            let flat: Vec<usize> = limited.iter().flat_map(|c| c.members().to_vec()).collect();
            assert_eq!(flat, peaks);
        }
    }

    #[test]
    fn test_each_merge_removes_exactly_one_cluster() {
        let peaks = [3, 9, 11, 40, 41, 90, 120, 121, 180];
        let mut clusters = group_into_clusters(&peaks, 0);
        let initial = clusters.len();
        let max = 2;

        let mut iterations = 0;
        while clusters.len() > max {
            let before = clusters.len();
            assert!(merge_closest_pair(&mut clusters));
            assert_eq!(clusters.len(), before - 1);
            iterations += 1;
        }
        assert_eq!(iterations, initial - max);
    }

    #[test]
    fn test_merge_needs_two_clusters() {
        let mut clusters = vec![Cluster::from(vec![7])];
        assert!(!merge_closest_pair(&mut clusters));
        assert!(limit_clusters(Vec::new(), 3).is_empty());
    }

    #[test]
    fn test_cluster_center_floors_mean() {
        assert_eq!(Cluster::from(vec![10, 12]).center(), 11);
        assert_eq!(Cluster::from(vec![10, 11]).center(), 10);
        assert_eq!(Cluster::from(vec![150]).center(), 150);
    }

    #[test]
    fn test_settings_are_clamped() {
        let mut engine = PeakClusterEngine::new(0.2, 9, 0);
        assert_eq!(engine.threshold(), 0.5);
        assert_eq!(engine.max_clusters(), 5);

        assert_eq!(engine.set_threshold(1.4), 1.0);
        assert_eq!(engine.set_threshold(0.75), 0.75);
        assert_eq!(engine.set_max_clusters(0), 1);
        assert_eq!(engine.set_max_clusters(3), 3);
    }

    #[test]
    fn test_flat_curve_detects_nothing() {
        let engine = PeakClusterEngine::new(0.5, 5, 0);
        let detection = engine.detect(&[0.5; BUCKET_COUNT]);
        assert!(detection.peaks.is_empty());
        assert!(detection.clusters.is_empty());
    }

    #[test]
    fn test_cluster_json_keeps_members() {
        let json = serde_json::to_string(&Cluster::from(vec![10, 12])).unwrap();
        assert_eq!(json, r#"{"members":[10,12]}"#);

        let parsed: Cluster = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.members(), &[10, 12]);
        assert_eq!(parsed.center(), 11);
    }

    #[test]
    fn test_cluster_json_rejects_empty_members() {
        let err = serde_json::from_str::<Cluster>(r#"{"members":[]}"#)
            .expect_err("empty cluster must not parse");
        assert!(err.to_string().contains("at least one peak"), "{}", err);
    }

    #[test]
    fn test_cluster_json_rejects_unordered_members() {
        assert!(serde_json::from_str::<Cluster>(r#"{"members":[12,10]}"#).is_err());
        assert!(serde_json::from_str::<Cluster>(r#"{"members":[10,10]}"#).is_err());
    }
}
