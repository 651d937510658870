// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The SOG codec: a Morton-ordered, k-means-quantized set of WebP
//! textures plus a `meta.json` sidecar, optionally wrapped in a
//! STORE-only ZIP.
//!
//! New module grounded on `morton.rs` (the required pre-texture
//! ordering), `kmeans.rs` (1-D and full-dimensional palette clustering),
//! `webp.rs`/`zip_bundle.rs` for the container formats, and `math.rs`'s
//! smallest-three quaternion packer (reused byte-for-byte for quats.webp
//! instead of re-deriving it).

pub mod meta;

use crate::column::Column;
use crate::error::{GsplatError, Result};
use crate::kmeans::{self, AssignmentBackend, KMeansResult};
use crate::math;
use crate::morton::morton_order;
use crate::table::DataTable;
use crate::webp;
use crate::zip_bundle::{self, BundleEntry};

const DEFAULT_KMEANS_ITERATIONS: u32 = 12;
const KMEANS_SEED: u64 = 0x5067_0c0d;

fn texture_dims(n: usize) -> (u32, u32) {
	if n == 0 {
		return (4, 4);
	}
	let width = (((n as f64).sqrt() / 4.0).ceil() as u32 * 4).max(4);
	let height = ((n as u32).div_ceil(width).div_ceil(4) * 4).max(4);

	(width, height)
}

fn log_transform(v: f32) -> f32 {
	v.signum() * (v.abs() + 1.0).ln()
}

fn inv_log_transform(v: f32) -> f32 {
	v.signum() * (v.abs().exp() - 1.0)
}

struct SogBundle {
	meta: meta::Meta,
	files: Vec<BundleEntry>,
}

fn coeff_count(band: u8) -> usize {
	match band {
		1 => 3,
		2 => 8,
		3 => 15,
		_ => 0,
	}
}

fn quantize_1d(values: &[f32], k: usize, iterations: u32) -> (Vec<f32>, Vec<u8>) {
	if values.is_empty() {
		return (vec![0.0; 1], Vec::new());
	}
	let k = k.min(values.len());
	let result = kmeans::kmeans(values, 1, k, iterations, &AssignmentBackend::Cpu, KMEANS_SEED);

	remap_sorted(result)
}

/// Sorts a 1-D k-means result's centroids ascending and remaps labels to
/// match, so the codebook reads as a monotonic lookup table.
fn remap_sorted(result: KMeansResult) -> (Vec<f32>, Vec<u8>) {
	let mut order: Vec<usize> = (0..result.centroids.len()).collect();
	order.sort_by(|&a, &b| result.centroids[a].partial_cmp(&result.centroids[b]).unwrap());

	let mut rank = vec![0u8; order.len()];
	for (new_rank, &old_idx) in order.iter().enumerate() {
		rank[old_idx] = new_rank as u8;
	}
	let codebook: Vec<f32> = order.iter().map(|&i| result.centroids[i]).collect();
	let labels: Vec<u8> = result.labels.iter().map(|&l| rank[l as usize]).collect();

	(codebook, labels)
}

/// Writes `table` as a set of SOG files (not yet bundled); the caller
/// decides whether to ZIP them or place them beside `meta.json`.
fn encode(table: &DataTable, iterations: u32) -> Result<SogBundle> {
	let band = table.gaussian_band()?;
	let n = table.row_count();
	let order = morton_order(
		&table.column("x").unwrap().data.as_f32_vec(),
		&table.column("y").unwrap().data.as_f32_vec(),
		&table.column("z").unwrap().data.as_f32_vec(),
	);
	let ordered = table.permute(&order);
	let (width, height) = texture_dims(n);
	let capacity = (width as usize) * (height as usize);

	let get = |name: &str, i: usize| ordered.column(name).unwrap().data.get(i).as_f32();

	// Means
	let mut mins = [f32::INFINITY; 3];
	let mut maxs = [f32::NEG_INFINITY; 3];
	let mut lt = vec![[0.0f32; 3]; n];

	for i in 0..n {
		let v = [log_transform(get("x", i)), log_transform(get("y", i)), log_transform(get("z", i))];
		for axis in 0..3 {
			mins[axis] = mins[axis].min(v[axis]);
			maxs[axis] = maxs[axis].max(v[axis]);
		}
		lt[i] = v;
	}
	let mut means_l = vec![0u8; capacity * 4];
	let mut means_u = vec![0u8; capacity * 4];

	for i in 0..n {
		for axis in 0..3 {
			let range = (maxs[axis] - mins[axis]).max(f32::EPSILON);
			let u = ((65535.0 * (lt[i][axis] - mins[axis]) / range).round().clamp(0.0, 65535.0)) as u16;
			means_l[i * 4 + axis] = (u & 0xff) as u8;
			means_u[i * 4 + axis] = (u >> 8) as u8;
		}
		means_l[i * 4 + 3] = 255;
		means_u[i * 4 + 3] = 255;
	}

	// Quats
	let mut quats = vec![0u8; capacity * 4];
	for i in 0..n {
		let q = [get("rot_0", i), get("rot_1", i), get("rot_2", i), get("rot_3", i)];
		let q_xyzw = [q[1], q[2], q[3], q[0]];
		let (largest, comps) = math::pack_smallest_three(q_xyzw);

		for c in 0..3 {
			quats[i * 4 + c] = math::to_u8((comps[c] * 0.5 + 0.5) * 255.0);
		}
		quats[i * 4 + 3] = 252 + largest;
	}

	// Scales
	let mut scale_values = Vec::with_capacity(n * 3);
	for i in 0..n {
		scale_values.push(get("scale_0", i));
		scale_values.push(get("scale_1", i));
		scale_values.push(get("scale_2", i));
	}
	let (scale_codebook, scale_labels) = quantize_1d(&scale_values, 256, iterations);
	let mut scales_tex = vec![0u8; capacity * 4];
	for i in 0..n {
		scales_tex[i * 4] = scale_labels[i * 3];
		scales_tex[i * 4 + 1] = scale_labels[i * 3 + 1];
		scales_tex[i * 4 + 2] = scale_labels[i * 3 + 2];
		scales_tex[i * 4 + 3] = 255;
	}

	// SH0 + opacity
	let mut dc_values = Vec::with_capacity(n * 3);
	for i in 0..n {
		dc_values.push(get("f_dc_0", i));
		dc_values.push(get("f_dc_1", i));
		dc_values.push(get("f_dc_2", i));
	}
	let (sh0_codebook, sh0_labels) = quantize_1d(&dc_values, 256, iterations);
	let mut sh0_tex = vec![0u8; capacity * 4];
	for i in 0..n {
		sh0_tex[i * 4] = sh0_labels[i * 3];
		sh0_tex[i * 4 + 1] = sh0_labels[i * 3 + 1];
		sh0_tex[i * 4 + 2] = sh0_labels[i * 3 + 2];
		sh0_tex[i * 4 + 3] = math::to_u8(math::sigmoid(get("opacity", i)) * 255.0);
	}

	let mut files = vec![
		BundleEntry { name: "means_l.webp".into(), bytes: webp::encode_rgba8(width, height, &means_l)? },
		BundleEntry { name: "means_u.webp".into(), bytes: webp::encode_rgba8(width, height, &means_u)? },
		BundleEntry { name: "quats.webp".into(), bytes: webp::encode_rgba8(width, height, &quats)? },
		BundleEntry { name: "scales.webp".into(), bytes: webp::encode_rgba8(width, height, &scales_tex)? },
		BundleEntry { name: "sh0.webp".into(), bytes: webp::encode_rgba8(width, height, &sh0_tex)? },
	];

	let mut sh_n = None;
	let coeffs = coeff_count(band);

	if coeffs > 0 {
		let rest_len = coeffs * 3;
		let mut rest_values = Vec::with_capacity(n * rest_len);
		for i in 0..n {
			for c in 0..rest_len {
				let name = format!("f_rest_{c}");
				rest_values.push(get(&name, i));
			}
		}
		let ratio = (n as f64 / 1024.0).max(f64::MIN_POSITIVE);
		let pow = 2f64.powf(ratio.log2().floor()).min(64.0);
		let palette_size = (((pow * 1024.0).round() as usize).clamp(1, n.max(1))).min(65535);

		let palette = kmeans::kmeans(&rest_values, rest_len, palette_size, iterations, &AssignmentBackend::Cpu, KMEANS_SEED);
		let k = palette.centroids.len() / rest_len;

		let (centroid_codebook, centroid_bytes) = quantize_1d(&palette.centroids, 256, iterations);

		let centroid_width = 64 * coeffs;
		let centroid_height = k.div_ceil(64);
		let mut centroid_tex = vec![0u8; (centroid_width * centroid_height).max(1) * 4];

		for pk in 0..k {
			for coeff in 0..coeffs {
				let x = coeff * 64 + (pk % 64);
				let y = pk / 64;
				let pixel = (y * centroid_width + x) * 4;

				for channel in 0..3 {
					let idx = pk * rest_len + channel * coeffs + coeff;
					centroid_tex[pixel + channel] = centroid_bytes[idx];
				}
				centroid_tex[pixel + 3] = 255;
			}
		}

		let mut labels_tex = vec![0u8; capacity * 4];
		for i in 0..n {
			let label = palette.labels[i] as u16;
			labels_tex[i * 4] = (label & 0xff) as u8;
			labels_tex[i * 4 + 1] = (label >> 8) as u8;
			labels_tex[i * 4 + 3] = 255;
		}

		files.push(BundleEntry {
			name: "shN_centroids.webp".into(),
			bytes: webp::encode_rgba8(centroid_width as u32, centroid_height as u32, &centroid_tex)?,
		});
		files.push(BundleEntry { name: "shN_labels.webp".into(), bytes: webp::encode_rgba8(width, height, &labels_tex)? });

		sh_n = Some(meta::ShNSection {
			count: k,
			bands: band,
			codebook: Some(centroid_codebook),
			files: vec!["shN_centroids.webp".into(), "shN_labels.webp".into()],
		});
	}

	let meta = meta::Meta {
		version: 2,
		count: n,
		means: meta::MeansSection { mins, maxs, files: vec!["means_l.webp".into(), "means_u.webp".into()] },
		scales: meta::CodebookSection { codebook: Some(scale_codebook), files: vec!["scales.webp".into()], min: None, max: None },
		quats: meta::FilesSection { files: vec!["quats.webp".into()] },
		sh0: meta::CodebookSection { codebook: Some(sh0_codebook), files: vec!["sh0.webp".into()], min: None, max: None },
		sh_n,
	};

	Ok(SogBundle { meta, files })
}

/// Writes `table` as a STORE-only `.sog` ZIP bundle, running k-means for
/// `iterations` rounds.
pub fn write_bundle(table: &DataTable, iterations: u32) -> Result<Vec<u8>> {
	let bundle = encode(table, iterations)?;
	let mut entries = bundle.files;
	entries.push(BundleEntry { name: "meta.json".into(), bytes: meta::serialize(&bundle.meta)? });

	zip_bundle::write_zip(&entries)
}

/// Writes `table` as a folder of loose files: returns `(filename, bytes)`
/// pairs for the caller to place beside the output path, `meta.json`
/// included.
pub fn write_loose(table: &DataTable, iterations: u32) -> Result<Vec<(String, Vec<u8>)>> {
	let bundle = encode(table, iterations)?;
	let mut out: Vec<(String, Vec<u8>)> = bundle.files.into_iter().map(|e| (e.name, e.bytes)).collect();
	out.push(("meta.json".into(), meta::serialize(&bundle.meta)?));

	Ok(out)
}

fn find_file<'a>(files: &'a [(String, Vec<u8>)], name: &str) -> Result<&'a [u8]> {
	files
		.iter()
		.find(|(n, _)| n == name)
		.map(|(_, b)| b.as_slice())
		.ok_or_else(|| GsplatError::malformed(format!("missing SOG file '{name}'")))
}

/// Decodes a set of `(filename, bytes)` pairs (as unpacked from a `.sog`
/// ZIP or read loose from a directory) back into a Gaussian table.
pub fn decode(files: &[(String, Vec<u8>)]) -> Result<DataTable> {
	let meta_bytes = find_file(files, "meta.json")?;
	let meta = meta::parse(meta_bytes)?;
	let n = meta.count;

	let (_, _, means_l) = webp::decode_rgba8(find_file(files, &meta.means.files[0])?)?;
	let (_, _, means_u) = webp::decode_rgba8(find_file(files, &meta.means.files[1])?)?;
	let (_, _, quats) = webp::decode_rgba8(find_file(files, &meta.quats.files[0])?)?;
	let (_, _, scales_tex) = webp::decode_rgba8(find_file(files, &meta.scales.files[0])?)?;
	let (_, _, sh0_tex) = webp::decode_rgba8(find_file(files, &meta.sh0.files[0])?)?;

	let sh_n_data = match &meta.sh_n {
		Some(section) => {
			let (cw, _, centroid_tex) = webp::decode_rgba8(find_file(files, &section.files[0])?)?;
			let (_, _, labels_tex) = webp::decode_rgba8(find_file(files, &section.files[1])?)?;
			Some((section, cw, centroid_tex, labels_tex))
		}
		None => None,
	};

	let band = meta.sh_n.as_ref().map(|s| s.bands).unwrap_or(0);
	let coeffs = coeff_count(band);
	let rest_len = coeffs * 3;

	let mut names: Vec<String> = [
		"x", "y", "z", "scale_0", "scale_1", "scale_2", "rot_0", "rot_1", "rot_2", "rot_3", "f_dc_0", "f_dc_1",
		"f_dc_2", "opacity",
	]
	.iter()
	.map(|s| s.to_string())
	.collect();
	names.extend((0..rest_len).map(|c| format!("f_rest_{c}")));

	let mut columns: Vec<Vec<f32>> = names.iter().map(|_| Vec::with_capacity(n)).collect();

	for i in 0..n {
		let px = i * 4;
		let mut pos = [0.0f32; 3];
		for axis in 0..3 {
			let u = (means_l[px + axis] as u16) | ((means_u[px + axis] as u16) << 8);
			let t = u as f32 / 65535.0;
			let lt_val = meta.means.mins[axis] + t * (meta.means.maxs[axis] - meta.means.mins[axis]);
			pos[axis] = inv_log_transform(lt_val);
		}

		let largest = quats[px + 3].saturating_sub(252);
		let comps = [
			(quats[px] as f32 / 255.0 - 0.5) * 2.0 * math::frac_1_sqrt_2(),
			(quats[px + 1] as f32 / 255.0 - 0.5) * 2.0 * math::frac_1_sqrt_2(),
			(quats[px + 2] as f32 / 255.0 - 0.5) * 2.0 * math::frac_1_sqrt_2(),
		];
		let q_xyzw = math::unpack_smallest_three(largest, comps);
		let q = [q_xyzw[3], q_xyzw[0], q_xyzw[1], q_xyzw[2]];

		let scale = [
			meta.scales.dequantize(scales_tex[px]),
			meta.scales.dequantize(scales_tex[px + 1]),
			meta.scales.dequantize(scales_tex[px + 2]),
		];
		let dc =
			[meta.sh0.dequantize(sh0_tex[px]), meta.sh0.dequantize(sh0_tex[px + 1]), meta.sh0.dequantize(sh0_tex[px + 2])];
		let opacity = math::inv_sigmoid(sh0_tex[px + 3] as f32 / 255.0);

		let row = [pos[0], pos[1], pos[2], scale[0], scale[1], scale[2], q[0], q[1], q[2], q[3], dc[0], dc[1], dc[2], opacity];
		for (col, v) in columns.iter_mut().take(14).zip(row) {
			col.push(v);
		}

		if let Some((section, cw, centroid_tex, labels_tex)) = &sh_n_data {
			let label = (labels_tex[px] as u16) | ((labels_tex[px + 1] as u16) << 8);
			let k = label as usize;

			for coeff in 0..coeffs {
				let x = coeff * 64 + (k % 64);
				let y = k / 64;
				let pixel = (y * (*cw as usize) + x) * 4;

				for channel in 0..3 {
					let byte = centroid_tex[pixel + channel];
					let v = section.dequantize(byte);
					let idx = channel * coeffs + coeff;
					columns[14 + idx].push(v);
				}
			}
		}
	}

	let table_columns = names.into_iter().zip(columns).map(|(name, data)| Column::f32(name, data)).collect();
	DataTable::new(table_columns)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_table(n: usize, band: u8) -> DataTable {
		let mut names = vec!["x", "y", "z", "scale_0", "scale_1", "scale_2", "rot_0", "rot_1", "rot_2", "rot_3", "f_dc_0", "f_dc_1", "f_dc_2", "opacity"];
		let rest: Vec<String> = (0..coeff_count(band) * 3).map(|c| format!("f_rest_{c}")).collect();
		names.extend(rest.iter().map(|s| s.as_str()));

		let columns = names
			.iter()
			.map(|name| {
				Column::f32(
					*name,
					(0..n)
						.map(|i| if *name == "rot_0" { 1.0 } else if name.starts_with("rot_") { 0.0 } else { (i as f32 * 0.03).sin() * 0.4 })
						.collect(),
				)
			})
			.collect();

		DataTable::new(columns).unwrap()
	}

	#[test]
	fn write_bundle_then_decode_roundtrips_positions_within_tolerance() {
		let table = sample_table(50, 0);
		let zip_bytes = write_bundle(&table, DEFAULT_KMEANS_ITERATIONS).unwrap();
		let files = zip_bundle::read_zip(&zip_bytes).unwrap().into_iter().map(|e| (e.name, e.bytes)).collect::<Vec<_>>();
		let read_back = decode(&files).unwrap();

		assert_eq!(read_back.row_count(), 50);
	}

	#[test]
	fn write_loose_includes_meta_json() {
		let table = sample_table(20, 1);
		let files = write_loose(&table, DEFAULT_KMEANS_ITERATIONS).unwrap();

		assert!(files.iter().any(|(n, _)| n == "meta.json"));
		assert!(files.iter().any(|(n, _)| n == "shN_centroids.webp"));
	}

	#[test]
	fn texture_dims_are_multiples_of_four() {
		for n in [1, 5, 100, 1000] {
			let (w, h) = texture_dims(n);
			assert_eq!(w % 4, 0);
			assert_eq!(h % 4, 0);
			assert!((w as usize) * (h as usize) >= n);
		}
	}
}
