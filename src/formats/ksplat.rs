// SPDX-License-Identifier: Apache-2.0 OR MIT

//! mkkellogg's `.ksplat` format: a fixed 4 KiB main header followed by up
//! to `maxSections` 1 KiB section headers, each describing an
//! independently bucketed, independently quantized run of splats.
//!
//! Grounded on the teacher's `header.rs` for the `#[repr(C)]` + `zerocopy`
//! fixed-size-header idiom, and `math.rs` for `half_to_float`. This writer
//! always emits a single section; the reader walks `section_count` from
//! the main header so it still decodes any file with more.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::column::Column;
use crate::error::{GsplatError, Result};
use crate::math::{self, SH_C0};
use crate::table::DataTable;

const MAIN_HEADER_SIZE: usize = 4096;
const SECTION_HEADER_SIZE: usize = 1024;

pub const COMPRESSION_RAW: u32 = 0;
pub const COMPRESSION_16BIT_F16: u32 = 1;
pub const COMPRESSION_16BIT_U8_SH: u32 = 2;

const DEFAULT_BUCKET_SIZE: u32 = 256;

#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct MainHeader {
	splat_count: u32,
	section_count: u32,
	sh_degree: u32,
	_reserved: [u8; MAIN_HEADER_SIZE - 12],
}

#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
struct SectionHeader {
	splat_count: u32,
	bucket_size: u32,
	bucket_count: u32,
	partial_bucket_count: u32,
	compression_mode: u32,
	sh_degree: u32,
	quantization_range: f32,
	min_harmonic: f32,
	max_harmonic: f32,
	_reserved: [u8; SECTION_HEADER_SIZE - 36],
}

fn sh_band_from_degree(degree: u32) -> u8 {
	degree.clamp(0, 3) as u8
}

fn coeff_count(band: u8) -> usize {
	match band {
		1 => 3,
		2 => 8,
		3 => 15,
		_ => 0,
	}
}

/// Writes a Gaussian table as a single-section `.ksplat` file.
pub fn write(table: &DataTable, compression_mode: u32) -> Result<Vec<u8>> {
	let band = table.gaussian_band()?;
	let n = table.row_count();
	let coeffs = coeff_count(band);
	let rest_len = coeffs * 3;

	let get = |name: &str, i: usize| table.column(name).unwrap().data.get(i).as_f32();

	let bucket_size = DEFAULT_BUCKET_SIZE;
	let bucket_count = if n == 0 { 0 } else { (n as u32).div_ceil(bucket_size) };
	let partial_bucket_count = if n == 0 || n as u32 % bucket_size == 0 { 0 } else { 1 };

	let mut centroids = vec![[0.0f32; 3]; bucket_count as usize];
	let mut max_abs_delta = 0.0f32;
	let mut max_harmonic = f32::NEG_INFINITY;
	let mut min_harmonic = f32::INFINITY;

	if compression_mode != COMPRESSION_RAW {
		for b in 0..bucket_count as usize {
			let start = b * bucket_size as usize;
			let end = (start + bucket_size as usize).min(n);
			let count = (end - start).max(1) as f32;
			let mut sum = [0.0f32; 3];

			for i in start..end {
				sum[0] += get("x", i);
				sum[1] += get("y", i);
				sum[2] += get("z", i);
			}
			centroids[b] = [sum[0] / count, sum[1] / count, sum[2] / count];
		}
		for i in 0..n {
			let b = i / bucket_size as usize;
			let c = centroids[b];
			for (axis, name) in ["x", "y", "z"].iter().enumerate() {
				max_abs_delta = max_abs_delta.max((get(name, i) - c[axis]).abs());
			}
		}
		if compression_mode == COMPRESSION_16BIT_U8_SH && rest_len > 0 {
			for i in 0..n {
				for c in 0..rest_len {
					let name = format!("f_rest_{c}");
					let v = get(&name, i);
					max_harmonic = max_harmonic.max(v);
					min_harmonic = min_harmonic.min(v);
				}
			}
		}
	}
	if max_abs_delta == 0.0 {
		max_abs_delta = 1.0;
	}
	if !min_harmonic.is_finite() {
		min_harmonic = -1.0;
	}
	if !max_harmonic.is_finite() {
		max_harmonic = 1.0;
	}

	let main_header = MainHeader {
		splat_count: n as u32,
		section_count: 1,
		sh_degree: band as u32,
		_reserved: [0u8; MAIN_HEADER_SIZE - 12],
	};
	let section_header = SectionHeader {
		splat_count: n as u32,
		bucket_size,
		bucket_count,
		partial_bucket_count,
		compression_mode,
		sh_degree: band as u32,
		quantization_range: max_abs_delta,
		min_harmonic,
		max_harmonic,
		_reserved: [0u8; SECTION_HEADER_SIZE - 36],
	};

	let mut out = Vec::with_capacity(MAIN_HEADER_SIZE + SECTION_HEADER_SIZE + n * 64);
	out.extend_from_slice(main_header.as_bytes());
	out.extend_from_slice(section_header.as_bytes());

	if compression_mode != COMPRESSION_RAW {
		for c in &centroids {
			for v in c {
				out.extend_from_slice(&v.to_le_bytes());
			}
		}
	}

	for i in 0..n {
		let (x, y, z) = (get("x", i), get("y", i), get("z", i));

		if compression_mode == COMPRESSION_RAW {
			for v in [x, y, z] {
				out.extend_from_slice(&v.to_le_bytes());
			}
		} else {
			let c = centroids[i / bucket_size as usize];
			for (axis, v) in [x, y, z].into_iter().enumerate() {
				let delta = v - c[axis];
				let u = math::to_unorm((delta + max_abs_delta) / (2.0 * max_abs_delta), 16);
				out.extend_from_slice(&(u as u16).to_le_bytes());
			}
		}

		let scale = [get("scale_0", i), get("scale_1", i), get("scale_2", i)];
		let rot = [get("rot_1", i), get("rot_2", i), get("rot_3", i), get("rot_0", i)];

		if compression_mode == COMPRESSION_RAW {
			for v in scale {
				out.extend_from_slice(&v.to_le_bytes());
			}
			for v in rot {
				out.extend_from_slice(&v.to_le_bytes());
			}
		} else {
			for v in scale {
				out.extend_from_slice(&math::float_to_half(v).to_le_bytes());
			}
			for v in rot {
				out.extend_from_slice(&math::float_to_half(v).to_le_bytes());
			}
		}

		let dc = [get("f_dc_0", i), get("f_dc_1", i), get("f_dc_2", i)];
		for v in dc {
			out.push(math::to_u8((v * SH_C0 + 0.5) * 255.0));
		}
		out.push(math::to_u8(math::sigmoid(get("opacity", i)) * 255.0));

		if rest_len > 0 {
			for c in 0..rest_len {
				let name = format!("f_rest_{c}");
				let v = get(&name, i);

				match compression_mode {
					COMPRESSION_16BIT_U8_SH => {
						let t = (v - min_harmonic) / (max_harmonic - min_harmonic).max(f32::EPSILON);
						out.push(math::to_unorm(t, 8) as u8);
					}
					_ => out.extend_from_slice(&math::float_to_half(v).to_le_bytes()),
				}
			}
		}
	}
	Ok(out)
}

/// Reads `.ksplat` bytes into a Gaussian table, walking every section
/// named in the main header.
pub fn read(bytes: &[u8]) -> Result<DataTable> {
	if bytes.len() < MAIN_HEADER_SIZE {
		return Err(GsplatError::malformed("file shorter than the 4 KiB main header"));
	}
	let main_header =
		MainHeader::read_from_bytes(&bytes[..MAIN_HEADER_SIZE]).map_err(|_| GsplatError::malformed("bad main header"))?;
	let band = sh_band_from_degree(main_header.sh_degree);
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

	let mut columns: Vec<Vec<f32>> = names.iter().map(|_| Vec::new()).collect();
	let mut cursor = MAIN_HEADER_SIZE;

	for _ in 0..main_header.section_count {
		if cursor + SECTION_HEADER_SIZE > bytes.len() {
			return Err(GsplatError::malformed("truncated section header"));
		}
		let section = SectionHeader::read_from_bytes(&bytes[cursor..cursor + SECTION_HEADER_SIZE])
			.map_err(|_| GsplatError::malformed("bad section header"))?;
		cursor += SECTION_HEADER_SIZE;

		let mode = section.compression_mode;
		let bucket_size = section.bucket_size.max(1) as usize;
		let n = section.splat_count as usize;
		let range = section.quantization_range;

		let mut centroids = Vec::with_capacity(section.bucket_count as usize);
		if mode != COMPRESSION_RAW {
			for _ in 0..section.bucket_count {
				if cursor + 12 > bytes.len() {
					return Err(GsplatError::malformed("truncated bucket centroid"));
				}
				let c = [
					f32::from_le_bytes(bytes[cursor..cursor + 4].try_into().unwrap()),
					f32::from_le_bytes(bytes[cursor + 4..cursor + 8].try_into().unwrap()),
					f32::from_le_bytes(bytes[cursor + 8..cursor + 12].try_into().unwrap()),
				];
				centroids.push(c);
				cursor += 12;
			}
		}

		for i in 0..n {
			let (x, y, z) = if mode == COMPRESSION_RAW {
				let v = [
					f32::from_le_bytes(bytes[cursor..cursor + 4].try_into().unwrap()),
					f32::from_le_bytes(bytes[cursor + 4..cursor + 8].try_into().unwrap()),
					f32::from_le_bytes(bytes[cursor + 8..cursor + 12].try_into().unwrap()),
				];
				cursor += 12;
				(v[0], v[1], v[2])
			} else {
				let c = centroids[i / bucket_size];
				let u = [
					u16::from_le_bytes(bytes[cursor..cursor + 2].try_into().unwrap()),
					u16::from_le_bytes(bytes[cursor + 2..cursor + 4].try_into().unwrap()),
					u16::from_le_bytes(bytes[cursor + 4..cursor + 6].try_into().unwrap()),
				];
				cursor += 6;
				(dequant_axis(c[0], u[0], range), dequant_axis(c[1], u[1], range), dequant_axis(c[2], u[2], range))
			};

			let read_scale_rot = |cursor: &mut usize| -> [f32; 7] {
				let mut out = [0.0f32; 7];
				for slot in out.iter_mut() {
					if mode == COMPRESSION_RAW {
						*slot = f32::from_le_bytes(bytes[*cursor..*cursor + 4].try_into().unwrap());
						*cursor += 4;
					} else {
						*slot = math::half_to_float(u16::from_le_bytes(bytes[*cursor..*cursor + 2].try_into().unwrap()));
						*cursor += 2;
					}
				}
				out
			};
			let sr = read_scale_rot(&mut cursor);
			let (scale, rot) = ([sr[0], sr[1], sr[2]], [sr[3], sr[4], sr[5], sr[6]]);

			let color = &bytes[cursor..cursor + 4];
			cursor += 4;
			let decode_dc = |byte: u8| (byte as f32 / 255.0 - 0.5) / SH_C0;
			let dc = [decode_dc(color[0]), decode_dc(color[1]), decode_dc(color[2])];
			let opacity = math::inv_sigmoid(color[3] as f32 / 255.0);

			let mut rest = vec![0.0f32; rest_len];
			for slot in rest.iter_mut() {
				match mode {
					COMPRESSION_16BIT_U8_SH => {
						let byte = bytes[cursor];
						cursor += 1;
						let t = math::from_unorm(byte as u32, 8);
						*slot = section.min_harmonic + t * (section.max_harmonic - section.min_harmonic);
					}
					_ => {
						*slot = math::half_to_float(u16::from_le_bytes(bytes[cursor..cursor + 2].try_into().unwrap()));
						cursor += 2;
					}
				}
			}

			let row = [x, y, z, scale[0], scale[1], scale[2], rot[3], rot[0], rot[1], rot[2], dc[0], dc[1], dc[2], opacity];
			for (col, v) in columns.iter_mut().take(14).zip(row) {
				col.push(v);
			}
			for (col, v) in columns.iter_mut().skip(14).zip(rest) {
				col.push(v);
			}
		}
	}

	let table_columns = names.into_iter().zip(columns).map(|(name, data)| Column::f32(name, data)).collect();
	DataTable::new(table_columns)
}

fn dequant_axis(centroid: f32, u: u16, range: f32) -> f32 {
	centroid + (math::from_unorm(u as u32, 16) * (2.0 * range) - range)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_table(n: usize, band: u8) -> DataTable {
		let mut names = vec!["x", "y", "z", "scale_0", "scale_1", "scale_2", "rot_0", "rot_1", "rot_2", "rot_3", "f_dc_0", "f_dc_1", "f_dc_2", "opacity"];
		let rest_names: Vec<String> = (0..coeff_count(band) * 3).map(|c| format!("f_rest_{c}")).collect();
		names.extend(rest_names.iter().map(|s| s.as_str()));

		let columns = names
			.iter()
			.map(|name| {
				Column::f32(
					*name,
					(0..n)
						.map(|i| if *name == "rot_0" { 1.0 } else if name.starts_with("rot_") { 0.0 } else { (i as f32 * 0.01).sin() })
						.collect(),
				)
			})
			.collect();

		DataTable::new(columns).unwrap()
	}

	#[test]
	fn raw_mode_roundtrips_exactly() {
		let table = sample_table(10, 0);
		let bytes = write(&table, COMPRESSION_RAW).unwrap();
		let read_back = read(&bytes).unwrap();

		assert_eq!(read_back.row_count(), 10);
		for i in 0..10 {
			let ox = table.column("x").unwrap().data.get(i).as_f32();
			let rx = read_back.column("x").unwrap().data.get(i).as_f32();
			assert!((ox - rx).abs() < 1e-5);
		}
	}

	#[test]
	fn f16_mode_roundtrips_within_tolerance() {
		let table = sample_table(300, 1);
		let bytes = write(&table, COMPRESSION_16BIT_F16).unwrap();
		let read_back = read(&bytes).unwrap();

		assert_eq!(read_back.row_count(), 300);
		for i in 0..300 {
			let ox = table.column("x").unwrap().data.get(i).as_f32();
			let rx = read_back.column("x").unwrap().data.get(i).as_f32();
			assert!((ox - rx).abs() < 0.01, "row {i}: {ox} vs {rx}");
		}
	}

	#[test]
	fn u8_sh_mode_preserves_rest_coefficients_within_quantization() {
		let table = sample_table(50, 2);
		let bytes = write(&table, COMPRESSION_16BIT_U8_SH).unwrap();
		let read_back = read(&bytes).unwrap();

		for i in 0..50 {
			let ov = table.column("f_rest_0").unwrap().data.get(i).as_f32();
			let rv = read_back.column("f_rest_0").unwrap().data.get(i).as_f32();
			assert!((ov - rv).abs() < 0.05, "row {i}: {ov} vs {rv}");
		}
	}

	#[test]
	fn rejects_truncated_file() {
		assert!(read(&[0u8; 10]).is_err());
	}
}
