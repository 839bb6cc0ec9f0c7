//! EQ band derivation.
//!
//! Each cluster becomes one peaking band: centre frequency from the cluster's
//! mean bucket, Q from how many peaks the cluster holds (wide clusters get a
//! wide band) and a cut whose depth follows the smoothed magnitude at the
//! centre. Both lookups are ordered tables; the first matching rule wins.

use serde::{Deserialize, Serialize};

use super::clusters::Cluster;
use crate::analysis::mapping::bucket_to_frequency;

/// Q for clusters whose peak count lies in `[min_peaks, max_peaks]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QRule {
    pub min_peaks: usize,
    pub max_peaks: usize,
    pub q: f32,
}

/// Gain for magnitudes in `(above, up_to]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainRule {
    pub above: f32,
    pub up_to: f32,
    pub gain_db: f32,
}

/// One band ready to be sent to the console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    /// Console EQ slot the band is written to
    pub slot: usize,
    pub frequency_hz: f32,
    pub q: f32,
    pub gain_db: f32,
    /// Display bucket the band is centred on
    pub center_bucket: usize,
    pub peak_count: usize,
}

/// Q and gain lookup tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandPolicy {
    pub q_rules: Vec<QRule>,
    pub gain_rules: Vec<GainRule>,
    /// Q when no rule matches
    pub fallback_q: f32,
    /// Gain when no rule matches
    pub fallback_gain_db: f32,
}

impl Default for BandPolicy {
    fn default() -> Self {
        Self {
            q_rules: vec![
                QRule {
                    min_peaks: 1,
                    max_peaks: 1,
                    q: 4.0,
                },
                QRule {
                    min_peaks: 1,
                    max_peaks: 4,
                    q: 2.2,
                },
                QRule {
                    min_peaks: 5,
                    max_peaks: 14,
                    q: 1.5,
                },
                QRule {
                    min_peaks: 15,
                    max_peaks: usize::MAX,
                    q: 0.5,
                },
            ],
            gain_rules: vec![
                GainRule {
                    above: 0.71,
                    up_to: f32::INFINITY,
                    gain_db: -15.0,
                },
                GainRule {
                    above: 0.68,
                    up_to: f32::INFINITY,
                    gain_db: -10.0,
                },
                GainRule {
                    above: 0.52,
                    up_to: f32::INFINITY,
                    gain_db: -5.0,
                },
            ],
            fallback_q: 0.5,
            fallback_gain_db: 0.0,
        }
    }
}

impl BandPolicy {
    pub fn q_for(&self, peak_count: usize) -> f32 {
        self.q_rules
            .iter()
            .find(|rule| peak_count >= rule.min_peaks && peak_count <= rule.max_peaks)
            .map(|rule| rule.q)
            .unwrap_or(self.fallback_q)
    }

    pub fn gain_for(&self, magnitude: f32) -> f32 {
        self.gain_rules
            .iter()
            .find(|rule| magnitude > rule.above && magnitude <= rule.up_to)
            .map(|rule| rule.gain_db)
            .unwrap_or(self.fallback_gain_db)
    }

    /// One band per cluster, in cluster order, starting at console slot `first_slot`
    ///
    /// `magnitude` is the smoothed curve the gains are read from.
    pub fn derive(
        &self,
        clusters: &[Cluster],
        magnitude: &[f32],
        first_slot: usize,
    ) -> Vec<EqBand> {
        clusters
            .iter()
            .enumerate()
            .map(|(rank, cluster)| {
                let center = cluster.center();
                let level = magnitude.get(center).copied().unwrap_or(0.5);
                EqBand {
                    slot: rank + first_slot,
                    frequency_hz: bucket_to_frequency(center),
                    q: self.q_for(cluster.len()),
                    gain_db: self.gain_for(level),
                    center_bucket: center,
                    peak_count: cluster.len(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::BUCKET_COUNT;

    #[test]
    fn test_q_table_first_match_wins() {
        let policy = BandPolicy::default();
        assert_eq!(policy.q_for(1), 4.0);
        assert_eq!(policy.q_for(2), 2.2);
        assert_eq!(policy.q_for(4), 2.2);
        assert_eq!(policy.q_for(5), 1.5);
        assert_eq!(policy.q_for(14), 1.5);
        assert_eq!(policy.q_for(15), 0.5);
        assert_eq!(policy.q_for(200), 0.5);
    }

    #[test]
    fn test_gain_table_boundaries_are_exclusive() {
        let policy = BandPolicy::default();
        assert_eq!(policy.gain_for(0.9), -15.0);
        assert_eq!(policy.gain_for(0.71), -10.0);
        assert_eq!(policy.gain_for(0.70), -10.0);
        assert_eq!(policy.gain_for(0.68), -5.0);
        assert_eq!(policy.gain_for(0.53), -5.0);
        assert_eq!(policy.gain_for(0.52), 0.0);
        assert_eq!(policy.gain_for(0.1), 0.0);
    }

    #[test]
    fn test_two_peak_cluster_band() {
        let mut magnitude = [0.5f32; BUCKET_COUNT];
        magnitude[11] = 0.75;

        let bands = BandPolicy::default().derive(&[Cluster::from(vec![10, 12])], &magnitude, 2);
        assert_eq!(bands.len(), 1);
        let band = &bands[0];
        assert_eq!(band.slot, 2);
        assert_eq!(band.center_bucket, 11);
        assert_eq!(band.q, 2.2);
        assert_eq!(band.gain_db, -15.0);
        assert!((band.frequency_hz - bucket_to_frequency(11)).abs() < 1e-3);
    }

    #[test]
    fn test_slots_follow_cluster_rank() {
        let magnitude = [0.6f32; BUCKET_COUNT];
        let clusters = vec![
            Cluster::from(vec![20]),
            Cluster::from(vec![60, 61, 62, 63, 64]),
            Cluster::from(vec![150]),
        ];
        let bands = BandPolicy::default().derive(&clusters, &magnitude, 2);
        let slots: Vec<usize> = bands.iter().map(|b| b.slot).collect();
        assert_eq!(slots, vec![2, 3, 4]);
        assert_eq!(bands[1].q, 1.5);
        assert_eq!(bands[1].center_bucket, 62);
        assert!(bands.iter().all(|b| b.gain_db == -5.0));
    }

    #[test]
    fn test_no_clusters_no_bands() {
        let bands = BandPolicy::default().derive(&[], &[0.9; BUCKET_COUNT], 2);
        assert!(bands.is_empty());
    }
}
