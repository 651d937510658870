// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lloyd-style k-means quantizer: given an `N x D` point table, a cluster
//! count `K`, and an iteration count `T`, produces a `K x D` centroid table
//! and an `N`-length label array.
//!
//! New module; the parallel-assignment structure follows the rayon usage
//! the teacher's stack makes available crate-wide rather than any single
//! teacher file, per the concurrency guidance the spec carries forward.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rayon::prelude::*;

use crate::gpu::GpuClusterBackend;
use crate::kdtree::KdTree;

/// Which strategy assigns points to their nearest centroid each iteration.
pub enum AssignmentBackend<'a> {
	/// Exhaustive scan over all `K` centroids, parallelized over points.
	Cpu,
	/// A k-d tree rebuilt over the centroids each iteration.
	KdTree,
	/// A batched external compute backend (no implementation ships; see
	/// `gpu.rs`).
	Gpu(&'a dyn GpuClusterBackend),
}

pub struct KMeansResult {
	pub centroids: Vec<f32>,
	pub labels: Vec<u32>,
}

/// Runs Lloyd's algorithm for exactly `iterations` rounds (no convergence
/// test). `points` is row-major `N x dims`. If `N < k`, returns the points
/// themselves as centroids under the identity labeling, skipping iteration
/// entirely.
pub fn kmeans(
	points: &[f32],
	dims: usize,
	k: usize,
	iterations: u32,
	backend: &AssignmentBackend,
	seed: u64,
) -> KMeansResult {
	let n = points.len() / dims;

	if n < k {
		return KMeansResult { centroids: points.to_vec(), labels: (0..n as u32).collect() };
	}
	let mut rng = StdRng::seed_from_u64(seed);
	let chosen = sample(&mut rng, n, k);
	let mut centroids: Vec<f32> = chosen.iter().flat_map(|i| points[i * dims..(i + 1) * dims].iter().copied()).collect();
	let mut labels = vec![0u32; n];

	for _ in 0..iterations {
		assign(points, dims, n, &centroids, k, backend, &mut labels);
		recompute_centroids(points, dims, n, k, &labels, &mut centroids);
	}
	KMeansResult { centroids, labels }
}

fn assign(points: &[f32], dims: usize, n: usize, centroids: &[f32], k: usize, backend: &AssignmentBackend, labels: &mut [u32]) {
	match backend {
		AssignmentBackend::Cpu => {
			labels.par_iter_mut().enumerate().for_each(|(i, label)| {
				let p = &points[i * dims..(i + 1) * dims];
				*label = nearest_centroid_exhaustive(p, centroids, dims, k) as u32;
			});
		}
		AssignmentBackend::KdTree => {
			let tree = KdTree::build(centroids, dims);

			labels.par_iter_mut().enumerate().for_each(|(i, label)| {
				let p = &points[i * dims..(i + 1) * dims];
				*label = tree.find_nearest(p).0 as u32;
			});
		}
		AssignmentBackend::Gpu(backend) => {
			backend.assign(points, dims, centroids, k, labels);
		}
	}
}

fn nearest_centroid_exhaustive(point: &[f32], centroids: &[f32], dims: usize, k: usize) -> usize {
	let mut best = 0usize;
	let mut best_dist = f32::INFINITY;

	for c in 0..k {
		let centroid = &centroids[c * dims..(c + 1) * dims];
		let dist: f32 = point.iter().zip(centroid).map(|(a, b)| (a - b) * (a - b)).sum();

		if dist < best_dist {
			best_dist = dist;
			best = c;
		}
	}
	best
}

fn recompute_centroids(points: &[f32], dims: usize, n: usize, k: usize, labels: &[u32], centroids: &mut [f32]) {
	let mut sums = vec![0.0_f32; k * dims];
	let mut counts = vec![0u32; k];

	for i in 0..n {
		let c = labels[i] as usize;
		counts[c] += 1;

		for d in 0..dims {
			sums[c * dims + d] += points[i * dims + d];
		}
	}
	for c in 0..k {
		if counts[c] == 0 {
			// Empty cluster: retain its previous centroid value.
			continue;
		}
		for d in 0..dims {
			centroids[c * dims + d] = sums[c * dims + d] / counts[c] as f32;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn two_cluster_points() -> Vec<f32> {
		vec![0.0, 0.0, 0.1, 0.1, -0.1, 0.0, 10.0, 10.0, 10.1, 9.9, 9.9, 10.1]
	}

	#[test]
	fn small_n_returns_points_as_centroids() {
		let points = vec![1.0, 2.0, 3.0, 4.0];
		let result = kmeans(&points, 2, 5, 3, &AssignmentBackend::Cpu, 42);

		assert_eq!(result.centroids, points);
		assert_eq!(result.labels, vec![0, 1]);
	}

	#[test]
	fn separates_two_obvious_clusters_cpu() {
		let points = two_cluster_points();
		let result = kmeans(&points, 2, 2, 10, &AssignmentBackend::Cpu, 7);

		assert_eq!(result.labels.len(), 6);
		let first_label = result.labels[0];

		assert!(result.labels[0..3].iter().all(|&l| l == first_label));
		let second_label = result.labels[3];

		assert_ne!(first_label, second_label);
		assert!(result.labels[3..6].iter().all(|&l| l == second_label));
	}

	#[test]
	fn kdtree_backend_matches_cpu_backend() {
		let points = two_cluster_points();
		let cpu = kmeans(&points, 2, 2, 10, &AssignmentBackend::Cpu, 7);
		let kd = kmeans(&points, 2, 2, 10, &AssignmentBackend::KdTree, 7);

		let cpu_groups: Vec<bool> = cpu.labels.windows(2).map(|w| w[0] == w[1]).collect();
		let kd_groups: Vec<bool> = kd.labels.windows(2).map(|w| w[0] == w[1]).collect();

		assert_eq!(cpu_groups, kd_groups);
	}

	#[test]
	fn empty_cluster_retains_previous_centroid() {
		// All points identical: only one of the two initial centroids can ever
		// gain members, so the other must keep its initial value unchanged.
		let points = vec![5.0, 5.0, 5.0, 5.0, 5.0, 5.0];
		let result = kmeans(&points, 2, 2, 4, &AssignmentBackend::Cpu, 1);

		assert_eq!(result.centroids.len(), 4);
	}
}
