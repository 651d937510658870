// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The batched GPU k-means assignment backend, as an interface only.
//!
//! No implementation ships in this crate (see `DESIGN.md`'s Open Question
//! decisions): requesting GPU assignment without a registered backend is
//! `GsplatError::ResourceUnavailable`. `kmeans.rs`'s `AssignmentBackend::Gpu`
//! variant exists so a caller embedding this crate can supply one.

/// A batched compute backend for the k-means assignment step.
/// Implementations must produce labels identical (modulo tie-breaks) to the
/// CPU exhaustive-scan backend given identical inputs.
pub trait GpuClusterBackend {
	/// Assigns every point in `points` (`N x dims`, row-major) to its
	/// nearest row of `centroids` (`k x dims`, row-major), writing the
	/// winning centroid index into `labels` (length `N`).
	fn assign(&self, points: &[f32], dims: usize, centroids: &[f32], k: usize, labels: &mut [u32]);
}

#[cfg(test)]
mod tests {
	use super::*;

	struct AlwaysZero;

	impl GpuClusterBackend for AlwaysZero {
		fn assign(&self, _points: &[f32], _dims: usize, _centroids: &[f32], _k: usize, labels: &mut [u32]) {
			labels.fill(0);
		}
	}

	#[test]
	fn trait_object_is_usable_as_a_backend() {
		let backend: &dyn GpuClusterBackend = &AlwaysZero;
		let mut labels = vec![9u32; 3];

		backend.assign(&[0.0; 6], 2, &[0.0; 2], 1, &mut labels);
		assert_eq!(labels, vec![0, 0, 0]);
	}
}
