// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The antimatter15 `.splat` format: a flat array of fixed 32-byte
//! records, no header at all.
//!
//! Grounded on the teacher's `packed.rs` (`PackedGaussian::unpack`) for the
//! unpack-on-read shape, reused here for a simpler single-byte-per-channel
//! layout instead of SPZ's bit-packed one.

use crate::column::Column;
use crate::error::{GsplatError, Result};
use crate::math::{self, SH_C0};
use crate::table::DataTable;

const RECORD_LEN: usize = 32;

/// Reads `.splat` bytes into a Gaussian table. The format carries no
/// SH-rest coefficients, so the returned table only has the 14 required
/// columns.
pub fn read(bytes: &[u8]) -> Result<DataTable> {
	if bytes.len() % RECORD_LEN != 0 {
		return Err(GsplatError::malformed(format!(
			".splat byte length {} is not a multiple of {RECORD_LEN}",
			bytes.len()
		)));
	}
	let n = bytes.len() / RECORD_LEN;

	let names = [
		"x", "y", "z", "scale_0", "scale_1", "scale_2", "f_dc_0", "f_dc_1", "f_dc_2", "opacity", "rot_0", "rot_1",
		"rot_2", "rot_3",
	];
	let mut columns: Vec<Vec<f32>> = names.iter().map(|_| Vec::with_capacity(n)).collect();

	for i in 0..n {
		let rec = &bytes[i * RECORD_LEN..(i + 1) * RECORD_LEN];
		let f = |k: usize| f32::from_le_bytes(rec[k * 4..k * 4 + 4].try_into().unwrap());

		let (x, y, z) = (f(0), f(1), f(2));
		let (sx, sy, sz) = (f(3).max(f32::MIN_POSITIVE).ln(), f(4).max(f32::MIN_POSITIVE).ln(), f(5).max(f32::MIN_POSITIVE).ln());

		let color = &rec[24..28];
		let decode_color = |byte: u8| (byte as f32 / 255.0 - 0.5) / SH_C0;
		let dc0 = decode_color(color[0]);
		let dc1 = decode_color(color[1]);
		let dc2 = decode_color(color[2]);
		let opacity = math::inv_sigmoid(color[3] as f32 / 255.0);

		let quat_bytes = &rec[28..32];
		let raw = [quat_bytes[1], quat_bytes[2], quat_bytes[3], quat_bytes[0]];
		let to_component = |b: u8| (b as f32) / 127.5 - 1.0;
		let mut q = [to_component(raw[0]), to_component(raw[1]), to_component(raw[2]), to_component(raw[3])];
		let norm_sq: f32 = q.iter().map(|c| c * c).sum();

		// The symmetric (v/127.5 - 1) mapping has no exact integer zero point
		// (127.5 itself isn't representable), so a byte-128 "zero" quaternion
		// decodes to a small nonzero residual rather than precisely 0.
		if norm_sq < 1e-3 {
			q = [0.0, 0.0, 0.0, 1.0];
		} else {
			q = math::normalize_quaternion(q);
		}

		let values = [x, y, z, sx, sy, sz, dc0, dc1, dc2, opacity, q[3], q[0], q[1], q[2]];
		for (col, v) in columns.iter_mut().zip(values) {
			col.push(v);
		}
	}

	let table_columns = names.iter().zip(columns).map(|(name, data)| Column::f32(*name, data)).collect();
	DataTable::new(table_columns)
}

/// Writes a Gaussian table as `.splat` bytes. SH-rest coefficients, if
/// present, are dropped: the format has no slot for them.
pub fn write(table: &DataTable) -> Result<Vec<u8>> {
	table.gaussian_band()?;
	let n = table.row_count();
	let get = |name: &str, i: usize| table.column(name).unwrap().data.get(i).as_f32();

	let mut out = Vec::with_capacity(n * RECORD_LEN);

	for i in 0..n {
		for name in ["x", "y", "z"] {
			out.extend_from_slice(&get(name, i).to_le_bytes());
		}
		for name in ["scale_0", "scale_1", "scale_2"] {
			out.extend_from_slice(&get(name, i).exp().to_le_bytes());
		}
		let encode_color = |v: f32| math::to_u8((v * SH_C0 + 0.5) * 255.0);
		out.push(encode_color(get("f_dc_0", i)));
		out.push(encode_color(get("f_dc_1", i)));
		out.push(encode_color(get("f_dc_2", i)));
		out.push(math::to_u8(math::sigmoid(get("opacity", i)) * 255.0));

		let q = [get("rot_0", i), get("rot_1", i), get("rot_2", i), get("rot_3", i)];
		let q = math::normalize_quaternion(q);
		let encode_component = |c: f32| (((c + 1.0) * 127.5).clamp(0.0, 255.0).round() as u8);

		out.push(encode_component(q[0]));
		out.push(encode_component(q[1]));
		out.push(encode_component(q[2]));
		out.push(encode_component(q[3]));
	}
	Ok(out)
}
