// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Static, balanced k-d tree over a fixed centroid table, used as the
//! k-d-tree assignment backend for k-means (`kmeans.rs`).
//!
//! New module; no teacher precedent for spatial indexing exists in the
//! pack, so this follows the spec's own build/query algorithm directly.

/// A point-to-centroid nearest-neighbor index over `K` rows of `D`
/// dimensions each, built once and queried many times (the k-means inner
/// loop calls `find_nearest` once per data point per iteration).
pub struct KdTree {
	dims: usize,
	/// Row-major `points[node * dims + axis]`, permuted into tree order.
	points: Vec<f32>,
	/// `row_index[node]` is that node's original row in the input table.
	row_index: Vec<usize>,
}

impl KdTree {
	/// Builds a tree over `points` (`K` rows of `dims` columns, row-major).
	pub fn build(points: &[f32], dims: usize) -> Self {
		assert!(dims > 0, "k-d tree requires at least one dimension");
		let k = if dims == 0 { 0 } else { points.len() / dims };
		let mut order: Vec<usize> = (0..k).collect();

		Self::build_recursive(&mut order, points, dims, 0);

		let mut flat_points = vec![0.0_f32; k * dims];
		for (node, &orig) in order.iter().enumerate() {
			flat_points[node * dims..(node + 1) * dims].copy_from_slice(&points[orig * dims..(orig + 1) * dims]);
		}
		Self { dims, points: flat_points, row_index: order }
	}

	/// Partitions `order[..]` in place so that, at `depth`, the element at
	/// the slice's median position holds the median value on axis `depth %
	/// dims`, with every element before it no greater and every element
	/// after it no smaller — then recurses on both halves. This mirrors a
	/// standard balanced-kd-tree build via repeated `select_nth_unstable`.
	fn build_recursive(order: &mut [usize], points: &[f32], dims: usize, depth: usize) {
		if order.len() <= 1 {
			return;
		}
		let axis = depth % dims;
		let mid = order.len() / 2;

		order.select_nth_unstable_by(mid, |&a, &b| {
			points[a * dims + axis].partial_cmp(&points[b * dims + axis]).unwrap()
		});

		let (left, right_with_median) = order.split_at_mut(mid);
		let (_, right) = right_with_median.split_at_mut(1);

		Self::build_recursive(left, points, dims, depth + 1);
		Self::build_recursive(right, points, dims, depth + 1);
	}

	pub fn len(&self) -> usize {
		self.row_index.len()
	}

	pub fn is_empty(&self) -> bool {
		self.row_index.is_empty()
	}

	/// Finds the nearest centroid to `query` by squared Euclidean distance,
	/// returning `(original_row_index, squared_distance)`.
	pub fn find_nearest(&self, query: &[f32]) -> (usize, f32) {
		let mut best_dist = f32::INFINITY;
		let mut best_node = 0usize;

		self.search(0, self.len(), 0, query, &mut best_node, &mut best_dist);
		(self.row_index[best_node], best_dist)
	}

	/// Bounded descent over the implicit tree occupying node range
	/// `[start, end)` at `depth`: the median node sits at
	/// `start + (end - start) / 2`; visits the splitting-plane-side child
	/// first and backtracks to the far side only when the squared
	/// plane distance is less than the best known squared distance.
	fn search(&self, start: usize, end: usize, depth: usize, query: &[f32], best_node: &mut usize, best_dist: &mut f32) {
		if start >= end {
			return;
		}
		let mid = start + (end - start) / 2;
		let d = sq_dist(&self.points[mid * self.dims..(mid + 1) * self.dims], query);

		if d < *best_dist {
			*best_dist = d;
			*best_node = mid;
		}
		let axis = depth % self.dims;
		let plane = self.points[mid * self.dims + axis];
		let diff = query[axis] - plane;

		let (near_start, near_end, far_start, far_end) =
			if diff <= 0.0 { (start, mid, mid + 1, end) } else { (mid + 1, end, start, mid) };

		self.search(near_start, near_end, depth + 1, query, best_node, best_dist);

		if diff * diff < *best_dist {
			self.search(far_start, far_end, depth + 1, query, best_node, best_dist);
		}
	}
}

fn sq_dist(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
