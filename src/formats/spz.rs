// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Niantic's `.spz` format: a gzip-wrapped, fixed 16-byte header followed
//! by non-interleaved, byte-quantized attribute arrays.
//!
//! Ported near-verbatim from the teacher's `header.rs` (header layout),
//! `packed.rs` (attribute array order and SH coefficient-channel slot
//! layout) and `math.rs` (quaternion smallest-three packing, SH
//! quantization), generalized from a single fixed Right-Up-Back internal
//! convention to `coord::CoordinateSystem` conversions so the table's own
//! convention round-trips through it.

use std::f32::consts::FRAC_1_SQRT_2;

use crate::coord::CoordinateSystem;
use crate::error::{GsplatError, Result};
use crate::io::gzip;
use crate::math;
use crate::table::DataTable;
use crate::column::Column;

const MAGIC: i32 = 0x5053_474e;
const HEADER_SIZE: usize = 16;
const COLOR_SCALE: f32 = 0.15;
const FLAG_ANTIALIASED: u8 = 0x1;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

fn dim_for_degree(degree: u8) -> usize {
	match degree {
		0 => 0,
		1 => 3,
		2 => 8,
		3 => 15,
		_ => 0,
	}
}

fn unquantize_sh(sh: u8) -> f32 {
	(sh as f32 - 128.0) / 128.0
}

fn quantize_sh(sh: f32) -> u8 {
	(sh * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8
}

fn unpack_quaternion_first_three(r: &[u8]) -> [f32; 4] {
	let scale = 1.0 / 127.5;
	let xyz = [r[0] as f32 * scale - 1.0, r[1] as f32 * scale - 1.0, r[2] as f32 * scale - 1.0];
	let sq: f32 = xyz.iter().map(|v| v * v).sum();

	[xyz[0], xyz[1], xyz[2], (1.0 - sq).max(0.0).sqrt()]
}

fn unpack_quaternion_smallest_three(r: &[u8; 4]) -> [f32; 4] {
	let mut comp: u32 = (r[0] as u32) | ((r[1] as u32) << 8) | ((r[2] as u32) << 16) | ((r[3] as u32) << 24);
	const C_MASK: u32 = (1u32 << 9) - 1;
	let i_largest = (comp >> 30) as usize;
	let mut rotation = [0.0f32; 4];
	let mut sum_squares = 0.0f32;

	for i in (0..4).rev() {
		if i == i_largest {
			continue;
		}
		let mag = comp & C_MASK;
		let negbit = (comp >> 9) & 0x1;
		comp >>= 10;

		let mut val = FRAC_1_SQRT_2 * (mag as f32) / (C_MASK as f32);
		if negbit == 1 {
			val = -val;
		}
		rotation[i] = val;
		sum_squares += val * val;
	}
	rotation[i_largest] = (1.0 - sum_squares).max(0.0).sqrt();
	rotation
}

fn pack_quaternion_smallest_three(q: [f32; 4]) -> [u8; 4] {
	let normed = math::normalize_quaternion(q);
	let mut i_largest = 0usize;

	for i in 1..4 {
		if normed[i].abs() > normed[i_largest].abs() {
			i_largest = i;
		}
	}
	let negate = normed[i_largest] < 0.0;
	let c_mask = (1u32 << 9) - 1;
	let mut comp: u32 = i_largest as u32;

	for i in 0..4 {
		if i == i_largest {
			continue;
		}
		let negbit = if (normed[i] < 0.0) ^ negate { 1u32 } else { 0u32 };
		let mag = (((c_mask as f32) * (normed[i].abs() / FRAC_1_SQRT_2) + 0.5).floor() as u32).min(c_mask);

		comp = (comp << 10) | (negbit << 9) | mag;
	}
	[(comp & 0xff) as u8, ((comp >> 8) & 0xff) as u8, ((comp >> 16) & 0xff) as u8, ((comp >> 24) & 0xff) as u8]
}

/// Writes a Gaussian table as gzip-compressed `.spz` (v3) bytes, flipping
/// axes from `source` into SPZ's internal Right-Up-Back convention.
pub fn write(table: &DataTable, source: CoordinateSystem, fractional_bits: u8, antialiased: bool) -> Result<Vec<u8>> {
	let band = table.gaussian_band()?;
	let n = table.row_count();
	let sh_dim = dim_for_degree(band);
	let flips = source.axis_flips_to(CoordinateSystem::RightUpBack);

	let get = |name: &str, i: usize| table.column(name).unwrap().data.get(i).as_f32();

	let mut meta = vec![0u8; HEADER_SIZE];
	meta[0..4].copy_from_slice(&MAGIC.to_le_bytes());
	meta[4..8].copy_from_slice(&3i32.to_le_bytes());
	meta[8..12].copy_from_slice(&(n as i32).to_le_bytes());
	meta[12] = band;
	meta[13] = fractional_bits;
	meta[14] = if antialiased { FLAG_ANTIALIASED } else { 0 };
	meta[15] = 0;

	let mut positions = Vec::with_capacity(n * 9);
	let mut alphas = Vec::with_capacity(n);
	let mut colors = Vec::with_capacity(n * 3);
	let mut scales = Vec::with_capacity(n * 3);
	let mut rotations = Vec::with_capacity(n * 4);
	let mut sh = Vec::with_capacity(n * sh_dim * 3);

	let scale_fixed = (1i64 << fractional_bits) as f32;

	for i in 0..n {
		let pos = [get("x", i), get("y", i), get("z", i)];
		for axis in 0..3 {
			let v = flips.position[axis] * pos[axis];
			let fixed = (v * scale_fixed).round() as i32;
			positions.push((fixed & 0xff) as u8);
			positions.push(((fixed >> 8) & 0xff) as u8);
			positions.push(((fixed >> 16) & 0xff) as u8);
		}

		let log_scale = [get("scale_0", i), get("scale_1", i), get("scale_2", i)];
		for v in log_scale {
			let byte = ((v + 10.0) * 16.0).round().clamp(0.0, 255.0) as u8;
			scales.push(byte);
		}

		let q = [get("rot_1", i), get("rot_2", i), get("rot_3", i), get("rot_0", i)];
		let flipped = [q[0] * flips.rotation[0], q[1] * flips.rotation[1], q[2] * flips.rotation[2], q[3]];
		rotations.extend_from_slice(&pack_quaternion_smallest_three(flipped));

		let dc = [get("f_dc_0", i), get("f_dc_1", i), get("f_dc_2", i)];
		for v in dc {
			colors.push(math::to_u8((v * COLOR_SCALE + 0.5) * 255.0));
		}
		alphas.push(math::to_u8(math::sigmoid(get("opacity", i)) * 255.0));

		for j in 0..sh_dim {
			for channel in 0..3 {
				let idx = channel * sh_dim + j;
				let name = format!("f_rest_{idx}");
				let v = get(&name, i) * flips.spherical_harmonics[j];
				sh.push(quantize_sh(v));
			}
		}
	}

	let mut out = meta;
	out.extend_from_slice(&positions);
	out.extend_from_slice(&alphas);
	out.extend_from_slice(&colors);
	out.extend_from_slice(&scales);
	out.extend_from_slice(&rotations);
	out.extend_from_slice(&sh);

	gzip::compress(&out)
}

/// Reads `.spz` bytes (gzip-wrapped or already decompressed) into a table,
/// flipping axes from SPZ's internal convention into `target`.
pub fn read(bytes: &[u8], target: CoordinateSystem) -> Result<DataTable> {
	let raw = if bytes.starts_with(&GZIP_MAGIC) { gzip::decompress(bytes)? } else { bytes.to_vec() };

	if raw.len() < HEADER_SIZE {
		return Err(GsplatError::malformed("file shorter than 16-byte header"));
	}
	let magic = i32::from_le_bytes(raw[0..4].try_into().unwrap());
	if magic != MAGIC {
		return Err(GsplatError::malformed("bad SPZ magic"));
	}
	let version = i32::from_le_bytes(raw[4..8].try_into().unwrap());
	if version != 2 && version != 3 {
		return Err(GsplatError::unsupported(format!("unsupported SPZ version {version}")));
	}
	let n = i32::from_le_bytes(raw[8..12].try_into().unwrap()) as usize;
	let band = raw[12];
	if band > 3 {
		return Err(GsplatError::unsupported(format!("unsupported SH degree {band}")));
	}
	let fractional_bits = raw[13];
	let sh_dim = dim_for_degree(band);

	let flips = CoordinateSystem::RightUpBack.axis_flips_to(target);
	let scale_fixed = (1i64 << fractional_bits) as f32;
	let rotation_bytes = if version == 3 { 4 } else { 3 };

	let pos_len = n * 9;
	let alpha_len = n;
	let color_len = n * 3;
	let scale_len = n * 3;
	let rot_len = n * rotation_bytes;
	let sh_len = n * sh_dim * 3;

	fn take(raw: &[u8], cursor: &mut usize, len: usize) -> Result<Vec<u8>> {
		if *cursor + len > raw.len() {
			return Err(GsplatError::malformed("truncated SPZ body"));
		}
		let s = raw[*cursor..*cursor + len].to_vec();
		*cursor += len;
		Ok(s)
	}

	let mut cursor = HEADER_SIZE;
	let positions = take(&raw, &mut cursor, pos_len)?;
	let alphas = take(&raw, &mut cursor, alpha_len)?;
	let colors = take(&raw, &mut cursor, color_len)?;
	let scales = take(&raw, &mut cursor, scale_len)?;
	let rotations = take(&raw, &mut cursor, rot_len)?;
	let sh = take(&raw, &mut cursor, sh_len)?;

	let mut names: Vec<String> = [
		"x", "y", "z", "scale_0", "scale_1", "scale_2", "rot_0", "rot_1", "rot_2", "rot_3", "f_dc_0", "f_dc_1",
		"f_dc_2", "opacity",
	]
	.iter()
	.map(|s| s.to_string())
	.collect();
	names.extend((0..sh_dim * 3).map(|i| format!("f_rest_{i}")));

	let mut columns: Vec<Vec<f32>> = names.iter().map(|_| Vec::with_capacity(n)).collect();

	for i in 0..n {
		let p = &positions[i * 9..i * 9 + 9];
		let mut pos = [0.0f32; 3];
		for axis in 0..3 {
			let b = &p[axis * 3..axis * 3 + 3];
			let mut fixed = (b[0] as i32) | ((b[1] as i32) << 8) | ((b[2] as i32) << 16);
			if fixed & 0x80_0000 != 0 {
				fixed |= 0xff00_0000u32 as i32;
			}
			pos[axis] = flips.position[axis] * (fixed as f32 / scale_fixed);
		}

		let s = &scales[i * 3..i * 3 + 3];
		let log_scale = [s[0] as f32 / 16.0 - 10.0, s[1] as f32 / 16.0 - 10.0, s[2] as f32 / 16.0 - 10.0];

		let q = if version == 3 {
			let r: [u8; 4] = rotations[i * 4..i * 4 + 4].try_into().unwrap();
			unpack_quaternion_smallest_three(&r)
		} else {
			unpack_quaternion_first_three(&rotations[i * 3..i * 3 + 3])
		};
		let q = [q[0] * flips.rotation[0], q[1] * flips.rotation[1], q[2] * flips.rotation[2], q[3]];

		let c = &colors[i * 3..i * 3 + 3];
		let dc = [
			(c[0] as f32 / 255.0 - 0.5) / COLOR_SCALE,
			(c[1] as f32 / 255.0 - 0.5) / COLOR_SCALE,
			(c[2] as f32 / 255.0 - 0.5) / COLOR_SCALE,
		];
		let opacity = math::inv_sigmoid(alphas[i] as f32 / 255.0);

		let row = [pos[0], pos[1], pos[2], log_scale[0], log_scale[1], log_scale[2], q[3], q[0], q[1], q[2], dc[0], dc[1], dc[2], opacity];
		for (col, v) in columns.iter_mut().take(14).zip(row) {
			col.push(v);
		}

		let sh_base = i * sh_dim * 3;
		for j in 0..sh_dim {
			for channel in 0..3 {
				let byte = sh[sh_base + j * 3 + channel];
				let v = unquantize_sh(byte) * flips.spherical_harmonics[j];
				let idx = channel * sh_dim + j;
				columns[14 + idx].push(v);
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
		let rest: Vec<String> = (0..dim_for_degree(band) * 3).map(|c| format!("f_rest_{c}")).collect();
		names.extend(rest.iter().map(|s| s.as_str()));

		let columns = names
			.iter()
			.map(|name| {
				Column::f32(
					*name,
					(0..n)
						.map(|i| if *name == "rot_0" { 1.0 } else if name.starts_with("rot_") { 0.0 } else { (i as f32 * 0.05).sin() * 0.5 })
						.collect(),
				)
			})
			.collect();

		DataTable::new(columns).unwrap()
	}

	#[test]
	fn write_then_read_roundtrips_within_quantization_tolerance() {
		let table = sample_table(20, 2);
		let bytes = write(&table, CoordinateSystem::RightDownFront, 12, false).unwrap();
		assert!(bytes.starts_with(&GZIP_MAGIC));

		let read_back = read(&bytes, CoordinateSystem::RightDownFront).unwrap();
		assert_eq!(read_back.row_count(), 20);

		for i in 0..20 {
			let ox = table.column("x").unwrap().data.get(i).as_f32();
			let rx = read_back.column("x").unwrap().data.get(i).as_f32();
			assert!((ox - rx).abs() < 0.01, "row {i}: {ox} vs {rx}");
		}
	}

	#[test]
	fn rejects_bad_magic() {
		assert!(read(&[0u8; 16], CoordinateSystem::Unspecified).is_err());
	}

	#[test]
	fn quaternion_smallest_three_roundtrips() {
		let q = [0.3, -0.2, 0.1, 0.9];
		let packed = pack_quaternion_smallest_three(q);
		let unpacked = unpack_quaternion_smallest_three(&packed);
		let normed = math::normalize_quaternion(q);
		let dot: f32 = normed.iter().zip(unpacked.iter()).map(|(a, b)| a * b).sum();

		assert!(dot.abs() > 0.999);
	}
}
