// SPDX-License-Identifier: Apache-2.0 OR MIT

//! PlayCanvas's chunked, bit-packed "compressed PLY" variant.
//!
//! Builds on `formats/ply.rs`'s header-parsing idiom but needs two PLY
//! elements (`chunk`, `vertex`) rather than one, so the header is parsed
//! and emitted directly here instead of reusing `ply::read`/`write`.
//! Chunking itself reuses `morton::morton_order` to group spatially-close
//! splats before partitioning into 256-row chunks.

use crate::column::{Column, RowValue};
use crate::error::{GsplatError, Result};
use crate::math::{self, SH_C0};
use crate::morton::morton_order;
use crate::table::DataTable;

const CHUNK_SIZE: usize = 256;
const SCALE_CLAMP: f32 = 20.0;

const CHUNK_PROPS: &[&str] = &[
	"min_x", "min_y", "min_z", "max_x", "max_y", "max_z", "min_scale_x", "min_scale_y", "min_scale_z", "max_scale_x",
	"max_scale_y", "max_scale_z", "min_r", "min_g", "min_b", "max_r", "max_g", "max_b",
];

/// Sniffs the PLY header text for the `chunk` element `compressed PLY`
/// writers emit, without fully parsing it; used by `formats/mod.rs` to
/// route a bare `.ply` suffix to this codec instead of the standard one.
pub fn looks_compressed(bytes: &[u8]) -> bool {
	let search_window = &bytes[..bytes.len().min(4096)];
	let Ok(text) = std::str::from_utf8(search_window) else { return false };
	text.contains("element chunk")
}

struct ChunkHeader {
	min: [f32; 6],
	max: [f32; 6],
	color_min: [f32; 3],
	color_max: [f32; 3],
}

fn color_encode(dc: f32) -> f32 {
	dc * SH_C0 + 0.5
}

fn color_decode(encoded: f32) -> f32 {
	(encoded - 0.5) / SH_C0
}

fn pack_11_10_11(a: f32, b: f32, c: f32) -> u32 {
	let ua = math::to_unorm(a, 11);
	let ub = math::to_unorm(b, 10);
	let uc = math::to_unorm(c, 11);

	(ua << 21) | (ub << 11) | uc
}

fn unpack_11_10_11(packed: u32) -> [f32; 3] {
	let a = math::from_unorm((packed >> 21) & 0x7ff, 11);
	let b = math::from_unorm((packed >> 11) & 0x3ff, 10);
	let c = math::from_unorm(packed & 0x7ff, 11);

	[a, b, c]
}

fn pack_rotation(q: [f32; 4]) -> u32 {
	let (largest, comps) = math::pack_smallest_three(q);
	let bias = |c: f32| math::to_unorm(c * 0.5 + 0.5, 10);

	((largest as u32) << 30) | (bias(comps[0]) << 20) | (bias(comps[1]) << 10) | bias(comps[2])
}

fn unpack_rotation(packed: u32) -> [f32; 4] {
	let largest = ((packed >> 30) & 0x3) as u8;
	let unbias = |bits: u32| (math::from_unorm(bits, 10) - 0.5) * 2.0;
	let comps = [unbias((packed >> 20) & 0x3ff), unbias((packed >> 10) & 0x3ff), unbias(packed & 0x3ff)];
	let comps = comps.map(|c| c * math::frac_1_sqrt_2());

	math::unpack_smallest_three(largest, comps)
}

fn pack_color(r: f32, g: f32, b: f32, opacity: f32) -> u32 {
	let a = math::to_u8(math::sigmoid(opacity) * 255.0);
	u32::from_le_bytes([math::to_u8(r * 255.0), math::to_u8(g * 255.0), math::to_u8(b * 255.0), a])
}

fn unpack_color(packed: u32) -> [f32; 4] {
	let bytes = packed.to_le_bytes();
	[bytes[0] as f32 / 255.0, bytes[1] as f32 / 255.0, bytes[2] as f32 / 255.0, bytes[3] as f32 / 255.0]
}

/// Writes `table` (already a validated Gaussian set) as a compressed PLY.
pub fn write(table: &DataTable) -> Result<Vec<u8>> {
	table.gaussian_band()?;
	let n = table.row_count();

	let x_all = table.column("x").unwrap().data.as_f32_vec();
	let y_all = table.column("y").unwrap().data.as_f32_vec();
	let z_all = table.column("z").unwrap().data.as_f32_vec();

	let order = morton_order(&x_all, &y_all, &z_all);
	let ordered = table.permute(&order);

	let num_chunks = n.div_ceil(CHUNK_SIZE);
	let mut chunk_headers = Vec::with_capacity(num_chunks);
	let mut packed_positions = vec![0u32; n];
	let mut packed_rotations = vec![0u32; n];
	let mut packed_scales = vec![0u32; n];
	let mut packed_colors = vec![0u32; n];

	let get = |name: &str, i: usize| -> f32 { ordered.column(name).unwrap().data.get(i).as_f32() };

	for chunk_idx in 0..num_chunks {
		let start = chunk_idx * CHUNK_SIZE;
		let end = (start + CHUNK_SIZE).min(n);

		let mut min = [f32::INFINITY; 6];
		let mut max = [f32::NEG_INFINITY; 6];
		let mut color_min = [f32::INFINITY; 3];
		let mut color_max = [f32::NEG_INFINITY; 3];

		for i in start..end {
			let vals = [get("x", i), get("y", i), get("z", i), get("scale_0", i), get("scale_1", i), get("scale_2", i)];
			for k in 0..6 {
				min[k] = min[k].min(vals[k]);
				max[k] = max[k].max(vals[k]);
			}
			let colors =
				[color_encode(get("f_dc_0", i)), color_encode(get("f_dc_1", i)), color_encode(get("f_dc_2", i))];
			for k in 0..3 {
				color_min[k] = color_min[k].min(colors[k]);
				color_max[k] = color_max[k].max(colors[k]);
			}
		}
		chunk_headers.push(ChunkHeader { min, max, color_min, color_max });

		for i in start..end {
			let range = |axis: usize| (max[axis] - min[axis]).max(f32::EPSILON);
			let norm = |v: f32, axis: usize| (v - min[axis]) / range(axis);

			packed_positions[i] = pack_11_10_11(norm(get("x", i), 0), norm(get("y", i), 1), norm(get("z", i), 2));

			let q = [get("rot_1", i), get("rot_2", i), get("rot_3", i), get("rot_0", i)];
			packed_rotations[i] = pack_rotation(q);

			let clamp = |v: f32| v.clamp(-SCALE_CLAMP, SCALE_CLAMP);
			let sx = (clamp(get("scale_0", i)) - min[3]) / (max[3] - min[3]).max(f32::EPSILON);
			let sy = (clamp(get("scale_1", i)) - min[4]) / (max[4] - min[4]).max(f32::EPSILON);
			let sz = (clamp(get("scale_2", i)) - min[5]) / (max[5] - min[5]).max(f32::EPSILON);
			packed_scales[i] = pack_11_10_11(sx, sy, sz);

			let cr = (color_encode(get("f_dc_0", i)) - color_min[0]) / (color_max[0] - color_min[0]).max(f32::EPSILON);
			let cg = (color_encode(get("f_dc_1", i)) - color_min[1]) / (color_max[1] - color_min[1]).max(f32::EPSILON);
			let cb = (color_encode(get("f_dc_2", i)) - color_min[2]) / (color_max[2] - color_min[2]).max(f32::EPSILON);
			packed_colors[i] = pack_color(cr, cg, cb, get("opacity", i));
		}
	}

	let mut header = String::new();
	header.push_str("ply\nformat binary_little_endian 1.0\n");
	header.push_str(&format!("element chunk {num_chunks}\n"));
	for p in CHUNK_PROPS {
		header.push_str(&format!("property float {p}\n"));
	}
	header.push_str(&format!("element vertex {n}\n"));
	for p in ["packed_position", "packed_rotation", "packed_scale", "packed_color"] {
		header.push_str(&format!("property uint {p}\n"));
	}
	header.push_str("end_header\n");

	let mut out = header.into_bytes();

	for h in &chunk_headers {
		for v in h.min {
			out.extend_from_slice(&v.to_le_bytes());
		}
		for v in h.max {
			out.extend_from_slice(&v.to_le_bytes());
		}
		for v in h.color_min {
			out.extend_from_slice(&v.to_le_bytes());
		}
		for v in h.color_max {
			out.extend_from_slice(&v.to_le_bytes());
		}
	}
	for i in 0..n {
		out.extend_from_slice(&packed_positions[i].to_le_bytes());
		out.extend_from_slice(&packed_rotations[i].to_le_bytes());
		out.extend_from_slice(&packed_scales[i].to_le_bytes());
		out.extend_from_slice(&packed_colors[i].to_le_bytes());
	}
	Ok(out)
}

/// Reads a compressed PLY's bytes back into a Gaussian table (SH-rest-free:
/// the format carries no SH-rest coefficients).
pub fn read(bytes: &[u8]) -> Result<DataTable> {
	if !bytes.starts_with(b"ply\n") {
		return Err(GsplatError::malformed("missing 'ply' magic"));
	}
	let terminator = b"\nend_header\n";
	let pos = bytes
		.windows(terminator.len())
		.position(|w| w == terminator)
		.ok_or_else(|| GsplatError::malformed("no end_header"))?;
	let header_text = std::str::from_utf8(&bytes[..pos + 1]).map_err(|_| GsplatError::malformed("bad header utf8"))?;
	let body = &bytes[pos + terminator.len()..];

	let mut num_chunks = None;
	let mut num_vertices = None;

	for line in header_text.lines() {
		if let Some(rest) = line.strip_prefix("element chunk ") {
			num_chunks = rest.trim().parse::<usize>().ok();
		} else if let Some(rest) = line.strip_prefix("element vertex ") {
			num_vertices = rest.trim().parse::<usize>().ok();
		}
	}
	let num_chunks = num_chunks.ok_or_else(|| GsplatError::malformed("missing 'element chunk'"))?;
	let n = num_vertices.ok_or_else(|| GsplatError::malformed("missing 'element vertex'"))?;

	let chunk_bytes = CHUNK_PROPS.len() * 4;
	let chunk_total = num_chunks * chunk_bytes;

	if body.len() < chunk_total + n * 16 {
		return Err(GsplatError::malformed("body too short"));
	}
	let mut chunk_headers = Vec::with_capacity(num_chunks);

	for c in 0..num_chunks {
		let base = c * chunk_bytes;
		let read_f32 = |k: usize| f32::from_le_bytes(body[base + k * 4..base + k * 4 + 4].try_into().unwrap());
		let min = std::array::from_fn(|k| read_f32(k));
		let max = std::array::from_fn(|k| read_f32(6 + k));
		let color_min = std::array::from_fn(|k| read_f32(12 + k));
		let color_max = std::array::from_fn(|k| read_f32(15 + k));

		chunk_headers.push(ChunkHeader { min, max, color_min, color_max });
	}

	let vertex_body = &body[chunk_total..];
	let mut columns: Vec<Column> = [
		"x", "y", "z", "scale_0", "scale_1", "scale_2", "rot_0", "rot_1", "rot_2", "rot_3", "f_dc_0", "f_dc_1",
		"f_dc_2", "opacity",
	]
	.iter()
	.map(|name| Column::f32(*name, vec![0.0; n]))
	.collect();

	for i in 0..n {
		let base = i * 16;
		let read_u32 = |k: usize| u32::from_le_bytes(vertex_body[base + k * 4..base + k * 4 + 4].try_into().unwrap());
		let chunk = &chunk_headers[i / CHUNK_SIZE];

		let pos = unpack_11_10_11(read_u32(0));
		let rot = unpack_rotation(read_u32(1));
		let scl = unpack_11_10_11(read_u32(2));
		let col = unpack_color(read_u32(3));

		let lerp = |t: f32, min: f32, max: f32| min + t * (max - min);

		set(&mut columns, "x", i, lerp(pos[0], chunk.min[0], chunk.max[0]));
		set(&mut columns, "y", i, lerp(pos[1], chunk.min[1], chunk.max[1]));
		set(&mut columns, "z", i, lerp(pos[2], chunk.min[2], chunk.max[2]));

		set(&mut columns, "scale_0", i, lerp(scl[0], chunk.min[3], chunk.max[3]));
		set(&mut columns, "scale_1", i, lerp(scl[1], chunk.min[4], chunk.max[4]));
		set(&mut columns, "scale_2", i, lerp(scl[2], chunk.min[5], chunk.max[5]));

		set(&mut columns, "rot_0", i, rot[3]);
		set(&mut columns, "rot_1", i, rot[0]);
		set(&mut columns, "rot_2", i, rot[1]);
		set(&mut columns, "rot_3", i, rot[2]);

		set(&mut columns, "f_dc_0", i, color_decode(lerp(col[0], chunk.color_min[0], chunk.color_max[0])));
		set(&mut columns, "f_dc_1", i, color_decode(lerp(col[1], chunk.color_min[1], chunk.color_max[1])));
		set(&mut columns, "f_dc_2", i, color_decode(lerp(col[2], chunk.color_min[2], chunk.color_max[2])));

		set(&mut columns, "opacity", i, math::inv_sigmoid(col[3]));
	}

	DataTable::new(columns)
}

fn set(columns: &mut [Column], name: &str, row: usize, value: f32) {
	let col = columns.iter_mut().find(|c| c.name == name).expect("column present");
	col.data.set(row, RowValue::F32(value));
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_table(n: usize) -> DataTable {
		let names = ["x", "y", "z", "scale_0", "scale_1", "scale_2", "rot_0", "rot_1", "rot_2", "rot_3", "f_dc_0", "f_dc_1", "f_dc_2", "opacity"];
		let columns = names
			.iter()
			.enumerate()
			.map(|(ci, n_name)| {
				Column::f32(
					*n_name,
					(0..n)
						.map(|i| {
							if *n_name == "rot_0" {
								1.0
							} else if n_name.starts_with("rot_") {
								0.0
							} else {
								((i + ci) as f32 * 0.01).sin()
							}
						})
						.collect(),
				)
			})
			.collect();

		DataTable::new(columns).unwrap()
	}

	#[test]
	fn write_then_read_roundtrips_within_quantization_tolerance() {
		let table = sample_table(10);
		let bytes = write(&table).unwrap();
		let read_back = read(&bytes).unwrap();

		assert_eq!(read_back.row_count(), 10);
		for row in 0..10 {
			let ox = table.column("x").unwrap().data.get(row).as_f32();
			let rx = read_back.column("x").unwrap().data.get(row).as_f32();

			assert!((ox - rx).abs() < 0.01, "row {row}: {ox} vs {rx}");
		}
	}

	#[test]
	fn handles_more_than_one_chunk() {
		let table = sample_table(300);
		let bytes = write(&table).unwrap();
		let read_back = read(&bytes).unwrap();

		assert_eq!(read_back.row_count(), 300);
	}
}
