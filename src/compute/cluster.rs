//! Spatial clustering of joints.
//!
//! A cluster is grown from a seed joint and contains every joint strictly
//! within `radius` of it. Clusters are indexed by seed and are not a
//! partition: neighbouring seeds produce overlapping clusters.

use crate::schema::{Cluster, Joint, JointId, JointRegistry};

/// Seed-indexed clusters over a registry, computed once per run.
#[derive(Debug, Clone)]
pub struct ClusterMap {
    clusters: Vec<Cluster>,
    radius: f32,
}

impl ClusterMap {
    /// Build the cluster of every joint in the registry.
    pub fn new(registry: &JointRegistry, radius: f32) -> Self {
        Self {
            clusters: build_clusters(registry.joints(), radius),
            radius,
        }
    }

    /// Cluster grown from `seed`.
    #[inline]
    pub fn get(&self, seed: JointId) -> Option<&Cluster> {
        self.clusters.get(seed)
    }

    /// Number of seeds (equal to the joint count).
    #[inline]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    /// Mean cluster size.
    pub fn mean_size(&self) -> f32 {
        if self.clusters.is_empty() {
            return 0.0;
        }
        self.clusters.iter().map(Cluster::len).sum::<usize>() as f32 / self.clusters.len() as f32
    }
}

/// Compute the cluster of every joint, indexed by seed id.
///
/// Quadratic in the joint count. A joint with no neighbours yields a
/// singleton cluster.
pub fn build_clusters(joints: &[Joint], radius: f32) -> Vec<Cluster> {
    joints
        .iter()
        .map(|seed| {
            let members = joints
                .iter()
                .filter(|other| other.id == seed.id || seed.distance(other) < radius)
                .map(|other| other.id)
                .collect();
            Cluster {
                seed: seed.id,
                members,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize, spacing: f32) -> JointRegistry {
        JointRegistry::from_positions((0..n).map(|i| [i as f32 * spacing, 0.0, 0.0])).unwrap()
    }

    #[test]
    fn test_isolated_joint_is_singleton() {
        let registry = line(3, 10.0);
        let map = ClusterMap::new(&registry, 1.0);
        for (seed, cluster) in map.iter().enumerate() {
            assert_eq!(cluster.seed, seed);
            assert_eq!(cluster.members, vec![seed]);
        }
    }

    #[test]
    fn test_radius_is_strict() {
        // Joints exactly one radius apart are not neighbours.
        let registry = line(3, 1.0);
        let map = ClusterMap::new(&registry, 1.0);
        assert_eq!(map.get(1).unwrap().members, vec![1]);

        let map = ClusterMap::new(&registry, 1.01);
        assert_eq!(map.get(0).unwrap().members, vec![0, 1]);
        assert_eq!(map.get(1).unwrap().members, vec![0, 1, 2]);
        assert_eq!(map.get(2).unwrap().members, vec![1, 2]);
    }

    #[test]
    fn test_clusters_are_seed_indexed_not_partition() {
        let registry = line(3, 1.0);
        let map = ClusterMap::new(&registry, 1.5);
        // 0 and 1 see each other, yet their clusters differ.
        assert!(map.get(0).unwrap().members.contains(&1));
        assert!(map.get(1).unwrap().members.contains(&0));
        assert_ne!(map.get(0), map.get(1));
        assert!((map.mean_size() - 7.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_three_dimensional_distance() {
        let registry =
            JointRegistry::from_positions([[0.0, 0.0, 0.0], [0.0, 0.0, 0.9], [0.5, 0.5, 0.5]])
                .unwrap();
        let map = ClusterMap::new(&registry, 1.0);
        assert_eq!(map.get(0).unwrap().members, vec![0, 1, 2]);
        assert_eq!(map.get(1).unwrap().members, vec![0, 1, 2]);
    }
}
