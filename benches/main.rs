// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{Criterion, criterion_group, criterion_main};
use gsplat::kmeans::{self, AssignmentBackend};
use gsplat::morton::morton_order;

fn synthetic_positions(n: usize) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
	let mut x = Vec::with_capacity(n);
	let mut y = Vec::with_capacity(n);
	let mut z = Vec::with_capacity(n);

	for i in 0..n {
		let t = i as f32 * 0.001;
		x.push(t.sin() * 10.0);
		y.push((t * 1.3).cos() * 10.0);
		z.push((t * 0.7).sin() * 10.0);
	}
	(x, y, z)
}

fn bench_morton_order(c: &mut Criterion) {
	let (x, y, z) = synthetic_positions(50_000);

	c.bench_function("morton_order_50k", |b| b.iter(|| morton_order(&x, &y, &z)));
}

fn bench_kmeans_scales(c: &mut Criterion) {
	let (x, y, z) = synthetic_positions(20_000);
	let mut points = Vec::with_capacity(x.len() * 3);

	for i in 0..x.len() {
		points.push(x[i]);
		points.push(y[i]);
		points.push(z[i]);
	}

	c.bench_function("kmeans_k256_20k_points", |b| {
		b.iter(|| kmeans::kmeans(&points, 3, 256, 8, &AssignmentBackend::Cpu, 7))
	});
}

criterion_group!(kernels, bench_morton_order, bench_kmeans_scales);
criterion_main!(kernels);
