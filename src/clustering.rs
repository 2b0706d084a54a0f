//! Seeded k-means partitioning of segment embeddings.
//!
//! Any method satisfying the partition invariant could sit behind
//! [`cluster_embeddings`]; k-means is used because the cluster count is the
//! knob callers tune. The result is deterministic for identical embeddings
//! and seed: initialization draws only the first centroid from the seeded
//! RNG, the rest follow farthest-first selection with index tie-breaks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::vectors::{cosine_similarity, mean_vector};

const MAX_ROUNDS: usize = 50;

/// A group of semantically similar segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: usize,
    /// Segment indices in ascending document order.
    pub members: Vec<usize>,
    /// Mean of the member embeddings.
    pub centroid: Vec<f32>,
}

/// Partitions `embeddings` into exactly `min(cluster_count, n)` non-empty
/// clusters.
///
/// Every index lands in exactly one cluster. Fewer points than requested
/// clusters collapses to one cluster per point; a cluster emptied by a Lloyd
/// round is reseeded with the point least like its current centroid.
pub fn cluster_embeddings(embeddings: &[&[f32]], cluster_count: usize, seed: u64) -> Vec<Cluster> {
    let n = embeddings.len();
    if n == 0 {
        return Vec::new();
    }
    let k = cluster_count.clamp(1, n);
    if k == n {
        return embeddings
            .iter()
            .enumerate()
            .map(|(i, embedding)| Cluster {
                id: i,
                members: vec![i],
                centroid: embedding.to_vec(),
            })
            .collect();
    }

    let mut centroids = initial_centroids(embeddings, k, seed);
    let mut assignment = vec![0usize; n];

    for round in 0..MAX_ROUNDS {
        let mut changed = false;
        for (point, slot) in embeddings.iter().zip(assignment.iter_mut()) {
            let nearest = nearest_centroid(point, &centroids);
            if nearest != *slot {
                *slot = nearest;
                changed = true;
            }
        }
        if !changed && round > 0 {
            break;
        }
        for (cluster_id, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&[f32]> = assignment
                .iter()
                .zip(embeddings)
                .filter(|(slot, _)| **slot == cluster_id)
                .map(|(_, embedding)| *embedding)
                .collect();
            if !members.is_empty() {
                *centroid = mean_vector(&members);
            }
        }
    }

    repair_empty_clusters(&mut assignment, embeddings, &mut centroids);

    let mut clusters: Vec<Cluster> = Vec::new();
    for cluster_id in 0..k {
        let members: Vec<usize> = assignment
            .iter()
            .enumerate()
            .filter(|(_, slot)| **slot == cluster_id)
            .map(|(index, _)| index)
            .collect();
        if members.is_empty() {
            continue;
        }
        let rows: Vec<&[f32]> = members.iter().map(|&index| embeddings[index]).collect();
        clusters.push(Cluster {
            id: clusters.len(),
            members,
            centroid: mean_vector(&rows),
        });
    }
    debug!(
        points = n,
        requested = cluster_count,
        produced = clusters.len(),
        "clustering complete"
    );
    clusters
}

/// Farthest-first initialization: the first centroid is drawn from the
/// seeded RNG, each later one is the point with the largest cosine distance
/// to its nearest chosen centroid (lowest index wins ties).
fn initial_centroids(embeddings: &[&[f32]], k: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut chosen = vec![rng.gen_range(0..embeddings.len())];
    while chosen.len() < k {
        let mut best: Option<(usize, f64)> = None;
        for (index, point) in embeddings.iter().enumerate() {
            if chosen.contains(&index) {
                continue;
            }
            let nearest = chosen
                .iter()
                .map(|&c| 1.0 - cosine_similarity(point, embeddings[c]))
                .fold(f64::MAX, f64::min);
            let better = match best {
                None => true,
                Some((_, distance)) => nearest > distance,
            };
            if better {
                best = Some((index, nearest));
            }
        }
        match best {
            Some((index, _)) => chosen.push(index),
            None => break,
        }
    }
    chosen
        .into_iter()
        .map(|index| embeddings[index].to_vec())
        .collect()
}

/// Reseats one donor point into each empty cluster so the partition always
/// holds `min(k, n)` non-empty clusters. The donor is the point least like
/// its own centroid among clusters that can spare a member; ties go to the
/// lowest index, keeping the repair deterministic.
fn repair_empty_clusters(
    assignment: &mut [usize],
    embeddings: &[&[f32]],
    centroids: &mut [Vec<f32>],
) {
    let k = centroids.len();
    loop {
        let mut counts = vec![0usize; k];
        for &slot in assignment.iter() {
            counts[slot] += 1;
        }
        let Some(empty) = (0..k).find(|&cluster_id| counts[cluster_id] == 0) else {
            break;
        };
        let mut donor: Option<(usize, f64)> = None;
        for (index, point) in embeddings.iter().enumerate() {
            if counts[assignment[index]] <= 1 {
                continue;
            }
            let distance = 1.0 - cosine_similarity(point, &centroids[assignment[index]]);
            let better = match donor {
                None => true,
                Some((_, best)) => distance > best,
            };
            if better {
                donor = Some((index, distance));
            }
        }
        let Some((index, _)) = donor else {
            break;
        };
        assignment[index] = empty;
        centroids[empty] = embeddings[index].to_vec();
    }
}

fn nearest_centroid(point: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut nearest = 0usize;
    let mut best = f64::MIN;
    for (cluster_id, centroid) in centroids.iter().enumerate() {
        let similarity = cosine_similarity(point, centroid);
        if similarity > best {
            best = similarity;
            nearest = cluster_id;
        }
    }
    nearest
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn as_views(rows: &[Vec<f32>]) -> Vec<&[f32]> {
        rows.iter().map(Vec::as_slice).collect()
    }

    #[test]
    fn partition_covers_all_indices_exactly_once() {
        let mut rng = StdRng::seed_from_u64(7);
        let rows: Vec<Vec<f32>> = (0..9)
            .map(|_| (0..8).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect();
        let clusters = cluster_embeddings(&as_views(&rows), 3, 42);

        let mut seen: Vec<usize> = clusters.iter().flat_map(|c| c.members.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..9).collect::<Vec<_>>());
        assert!(clusters.iter().all(|c| !c.members.is_empty()));
        assert_eq!(clusters.len(), 3);
    }

    #[test]
    fn identical_seed_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(11);
        let rows: Vec<Vec<f32>> = (0..12)
            .map(|_| (0..6).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect();
        let first = cluster_embeddings(&as_views(&rows), 4, 5);
        let second = cluster_embeddings(&as_views(&rows), 4, 5);
        assert_eq!(first, second);
    }

    #[test]
    fn fewer_points_than_clusters_yields_singletons() {
        let rows = vec![vec![1.0f32, 0.0], vec![0.0f32, 1.0]];
        let clusters = cluster_embeddings(&as_views(&rows), 5, 0);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec![0]);
        assert_eq!(clusters[1].members, vec![1]);
    }

    #[test]
    fn separable_topics_split_apart() {
        let rows = vec![
            vec![1.0f32, 0.0, 0.0],
            vec![0.9f32, 0.1, 0.0],
            vec![0.0f32, 1.0, 0.1],
            vec![0.0f32, 0.9, 0.0],
        ];
        let clusters = cluster_embeddings(&as_views(&rows), 2, 3);
        assert_eq!(clusters.len(), 2);
        let holds = |c: &Cluster, a: usize, b: usize| c.members == vec![a, b];
        assert!(
            clusters.iter().any(|c| holds(c, 0, 1)) && clusters.iter().any(|c| holds(c, 2, 3)),
            "expected topic pairs to cluster together, got {clusters:?}"
        );
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        assert!(cluster_embeddings(&[], 3, 0).is_empty());
    }
}
