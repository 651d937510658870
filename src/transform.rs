// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-file transform pipeline: a sequence of [`Action`]s applied
//! left-to-right to a Gaussian table.
//!
//! Grounded on the teacher's `GaussianSplat::convert_coordinates`
//! (`gaussian_splat.rs`), which mutates position/rotation arrays in place
//! under an axis-flip; generalized here to arbitrary translate/rotate/scale
//! composition, filters, and band truncation over a `DataTable`.

use crate::column::{Column, ColumnData, RowValue};
use crate::error::{GsplatError, Result};
use crate::math::{normalize_quaternion, quat_mul, quat_to_mat3};
use crate::sh::ShRotations;
use crate::table::DataTable;

/// A comparison operator for [`Action::FilterByValue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cmp {
	Lt,
	Lte,
	Gt,
	Gte,
	Eq,
	Neq,
}

impl Cmp {
	fn test(self, a: f64, b: f64) -> bool {
		match self {
			Cmp::Lt => a < b,
			Cmp::Lte => a <= b,
			Cmp::Gt => a > b,
			Cmp::Gte => a >= b,
			Cmp::Eq => a == b,
			Cmp::Neq => a != b,
		}
	}
}

#[derive(Clone, Debug)]
pub enum Action {
	Translate([f32; 3]),
	Rotate { x_deg: f32, y_deg: f32, z_deg: f32 },
	Scale(f32),
	/// Combined translate/rotate/scale under `mat4.setTRS` semantics:
	/// `p' = R*(s*p) + t`.
	Trs { translate: [f32; 3], rotate: [f32; 3], scale: f32 },
	FilterNaN,
	FilterByValue { column: String, cmp: Cmp, value: f64 },
	FilterBands(u8),
	/// Consumed only by the generator adapter; a no-op for the core pipeline.
	Param { name: String, value: String },
}

/// Applies `actions` in order to `table`, returning the final table.
pub fn apply_pipeline(mut table: DataTable, actions: &[Action]) -> Result<DataTable> {
	for action in actions {
		table = apply_action(table, action)?;
	}
	Ok(table)
}

fn apply_action(table: DataTable, action: &Action) -> Result<DataTable> {
	match action {
		Action::Translate(delta) => Ok(translate(table, *delta)),
		Action::Rotate { x_deg, y_deg, z_deg } => {
			let q = crate::math::quat_from_euler_xyz_deg(*x_deg, *y_deg, *z_deg);
			Ok(rotate(table, q)?)
		}
		Action::Scale(s) => Ok(scale(table, *s)),
		Action::Trs { translate: t, rotate: r, scale: s } => trs(table, *t, *r, *s),
		Action::FilterNaN => Ok(filter_nan(table)),
		Action::FilterByValue { column, cmp, value } => Ok(filter_by_value(table, column, *cmp, *value)),
		Action::FilterBands(n) => filter_bands(table, *n),
		Action::Param { .. } => Ok(table),
	}
}

fn translate(mut table: DataTable, delta: [f32; 3]) -> DataTable {
	for (axis, name) in ["x", "y", "z"].iter().enumerate() {
		if let Some(col) = table.column_mut(name) {
			if let Some(slice) = col.data.as_f32_mut_slice() {
				for v in slice.iter_mut() {
					*v += delta[axis];
				}
			}
		}
	}
	table
}

fn scale(mut table: DataTable, s: f32) -> DataTable {
	for name in ["x", "y", "z"] {
		if let Some(col) = table.column_mut(name) {
			if let Some(slice) = col.data.as_f32_mut_slice() {
				for v in slice.iter_mut() {
					*v *= s;
				}
			}
		}
	}
	let ln_s = s.ln();

	for name in ["scale_0", "scale_1", "scale_2"] {
		if let Some(col) = table.column_mut(name) {
			if let Some(slice) = col.data.as_f32_mut_slice() {
				for v in slice.iter_mut() {
					*v += ln_s;
				}
			}
		}
	}
	table
}

fn rotate(table: DataTable, q_r: [f32; 4]) -> Result<DataTable> {
	trs_with_quat(table, [0.0, 0.0, 0.0], q_r, 1.0)
}

fn trs(table: DataTable, t: [f32; 3], rotate_euler_deg: [f32; 3], s: f32) -> Result<DataTable> {
	let q_r = crate::math::quat_from_euler_xyz_deg(rotate_euler_deg[0], rotate_euler_deg[1], rotate_euler_deg[2]);
	trs_with_quat(table, t, q_r, s)
}

fn trs_with_quat(mut table: DataTable, t: [f32; 3], q_r: [f32; 4], s: f32) -> Result<DataTable> {
	let r = quat_to_mat3(q_r);
	let n = table.row_count();

	{
		let xs = table.column("x").map(|c| c.data.as_f32_vec());
		let ys = table.column("y").map(|c| c.data.as_f32_vec());
		let zs = table.column("z").map(|c| c.data.as_f32_vec());

		if let (Some(xs), Some(ys), Some(zs)) = (xs, ys, zs) {
			let mut new_x = vec![0.0; n];
			let mut new_y = vec![0.0; n];
			let mut new_z = vec![0.0; n];

			for i in 0..n {
				let p = [xs[i] * s, ys[i] * s, zs[i] * s];
				let rotated = crate::math::mat3_mul_vec3(r, p);

				new_x[i] = rotated[0] + t[0];
				new_y[i] = rotated[1] + t[1];
				new_z[i] = rotated[2] + t[2];
			}
			write_back(&mut table, "x", new_x);
			write_back(&mut table, "y", new_y);
			write_back(&mut table, "z", new_z);
		}
	}

	if table.has_column("rot_0") {
		for i in 0..n {
			// Columns are [w,x,y,z]; quat_mul expects and returns [x,y,z,w].
			let w = table.column("rot_0").unwrap().data.get(i).as_f32();
			let x = table.column("rot_1").unwrap().data.get(i).as_f32();
			let y = table.column("rot_2").unwrap().data.get(i).as_f32();
			let z = table.column("rot_3").unwrap().data.get(i).as_f32();
			let updated = normalize_quaternion(quat_mul(q_r, [x, y, z, w]));

			table.column_mut("rot_0").unwrap().data.set(i, RowValue::F32(updated[3]));
			table.column_mut("rot_1").unwrap().data.set(i, RowValue::F32(updated[0]));
			table.column_mut("rot_2").unwrap().data.set(i, RowValue::F32(updated[1]));
			table.column_mut("rot_3").unwrap().data.set(i, RowValue::F32(updated[2]));
		}
	}

	for name in ["scale_0", "scale_1", "scale_2"] {
		if let Some(col) = table.column_mut(name) {
			if let Some(slice) = col.data.as_f32_mut_slice() {
				for v in slice.iter_mut() {
					*v = (v.exp() * s).ln();
				}
			}
		}
	}

	rotate_sh_rest(&mut table, q_r)?;
	Ok(table)
}

fn write_back(table: &mut DataTable, name: &str, values: Vec<f32>) {
	if let Some(col) = table.column_mut(name) {
		if let Some(slice) = col.data.as_f32_mut_slice() {
			slice.copy_from_slice(&values);
		}
	}
}

fn rotate_sh_rest(table: &mut DataTable, q_r: [f32; 4]) -> Result<()> {
	let band = table.gaussian_band()?;

	if band == 0 {
		return Ok(());
	}
	let r = quat_to_mat3(q_r);
	let rotations = ShRotations::from_rotation_matrix(r);
	let block = rotations.for_band(band);
	let coeff_count = crate::table::DataTable::sh_band_coeff_count(band).unwrap();
	let n = table.row_count();

	// channel-major layout: index = ch * coeff_count + c
	let mut channels: Vec<Vec<f32>> = (0..3)
		.map(|ch| {
			(0..coeff_count)
				.flat_map(|c| {
					let idx = ch * coeff_count + c;
					table.column(&format!("f_rest_{idx}")).map(|col| col.data.as_f32_vec()).unwrap_or_default()
				})
				.collect::<Vec<f32>>()
		})
		.collect();

	for row in 0..n {
		for ch in channels.iter_mut() {
			let mut coeffs: Vec<f32> = (0..coeff_count).map(|c| ch[row + c * n]).collect();
			block.apply(&mut coeffs);

			for (c, v) in coeffs.into_iter().enumerate() {
				ch[row + c * n] = v;
			}
		}
	}
	for ch in 0..3 {
		for c in 0..coeff_count {
			let idx = ch * coeff_count + c;
			let name = format!("f_rest_{idx}");

			if let Some(col) = table.column_mut(&name) {
				if let Some(slice) = col.data.as_f32_mut_slice() {
					for row in 0..n {
						slice[row] = channels[ch][row + c * n];
					}
				}
			}
		}
	}
	Ok(())
}

fn filter_nan(table: DataTable) -> DataTable {
	let has_scale = ["scale_0", "scale_1", "scale_2"].iter().any(|n| table.has_column(n));
	let has_opacity = table.has_column("opacity");

	table.filter_rows(|i, t| {
		for col in t.columns() {
			let v = col.data.get(i).as_f32();

			if v.is_finite() {
				continue;
			}
			if has_opacity && col.name == "opacity" && v.is_infinite() {
				continue;
			}
			if has_scale && (col.name == "scale_0" || col.name == "scale_1" || col.name == "scale_2") && v == f32::NEG_INFINITY {
				continue;
			}
			return false;
		}
		true
	})
}

fn filter_by_value(table: DataTable, column: &str, cmp: Cmp, value: f64) -> DataTable {
	if !table.has_column(column) {
		return table;
	}
	table.filter_rows(|i, t| {
		let v = t.column(column).unwrap().data.get(i).as_f64();
		cmp.test(v, value)
	})
}

fn filter_bands(mut table: DataTable, target: u8) -> Result<DataTable> {
	let current = table.gaussian_band()?;

	if current <= target {
		return Ok(table);
	}
	let target_count = DataTable::sh_band_coeff_count(target).unwrap_or(0);
	let current_count = DataTable::sh_band_coeff_count(current).unwrap();
	let n = table.row_count();
	let mut retained: Vec<Column> = Vec::with_capacity(target_count * 3);

	for ch in 0..3 {
		for c in 0..target_count {
			let old_idx = ch * current_count + c;
			let new_idx = retained.len();
			let old_name = format!("f_rest_{old_idx}");
			let data = table.column(&old_name).map(|c| c.data.as_f32_vec()).unwrap_or_else(|| vec![0.0; n]);

			retained.push(Column::f32(format!("f_rest_{new_idx}"), data));
		}
	}
	for ch in 0..3 {
		for c in 0..current_count {
			let old_idx = ch * current_count + c;
			let name = format!("f_rest_{old_idx}");

			if table.has_column(&name) {
				let _ = table.remove_column(&name);
			}
		}
	}
	for col in retained {
		table.add_column(col)?;
	}
	Ok(table)
}

/// Builds an `Action::FilterByValue`, translating a short operator token
/// (as used by the CLI) into a [`Cmp`].
pub fn parse_cmp(token: &str) -> Result<Cmp> {
	Ok(match token {
		"lt" => Cmp::Lt,
		"lte" => Cmp::Lte,
		"gt" => Cmp::Gt,
		"gte" => Cmp::Gte,
		"eq" => Cmp::Eq,
		"neq" => Cmp::Neq,
		other => return Err(GsplatError::invalid_argument(format!("unknown comparison '{other}'"))),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::column::Column;

	fn gaussian_table(n: usize) -> DataTable {
		let names = ["x", "y", "z", "scale_0", "scale_1", "scale_2", "rot_0", "rot_1", "rot_2", "rot_3", "f_dc_0", "f_dc_1", "f_dc_2", "opacity"];
		let mut columns: Vec<Column> = names.iter().map(|name| Column::f32(*name, vec![0.0; n])).collect();

		for c in columns.iter_mut() {
			if c.name == "rot_0" {
				if let ColumnData::F32(v) = &mut c.data {
					v.fill(1.0);
				}
			}
		}
		DataTable::new(columns).unwrap()
	}

	#[test]
	fn translate_shifts_positions() {
		let t = gaussian_table(2);
		let out = apply_pipeline(t, &[Action::Translate([1.0, 2.0, 3.0])]).unwrap();

		assert_eq!(out.column("x").unwrap().data.get(0), RowValue::F32(1.0));
		assert_eq!(out.column("y").unwrap().data.get(0), RowValue::F32(2.0));
		assert_eq!(out.column("z").unwrap().data.get(0), RowValue::F32(3.0));
	}

	#[test]
	fn scale_updates_positions_and_log_scales() {
		let t = gaussian_table(1);
		let mut t = t;
		t.column_mut("x").unwrap().data.set(0, RowValue::F32(2.0));

		let out = apply_pipeline(t, &[Action::Scale(2.0)]).unwrap();

		assert_eq!(out.column("x").unwrap().data.get(0), RowValue::F32(4.0));
		let scale_0 = out.column("scale_0").unwrap().data.get(0).as_f32();
		assert!((scale_0 - 2.0_f32.ln()).abs() < 1e-5);
	}

	#[test]
	fn combined_trs_matches_set_trs_semantics() {
		let mut t = gaussian_table(1);
		t.column_mut("x").unwrap().data.set(0, RowValue::F32(1.0));

		let out = apply_pipeline(
			t,
			&[Action::Trs { translate: [0.0, 0.0, 1.0], rotate: [0.0, 90.0, 0.0], scale: 2.0 }],
		)
		.unwrap();

		let x = out.column("x").unwrap().data.get(0).as_f32();
		let y = out.column("y").unwrap().data.get(0).as_f32();
		let z = out.column("z").unwrap().data.get(0).as_f32();

		assert!(x.abs() < 1e-4, "x={x}");
		assert!(y.abs() < 1e-4, "y={y}");
		assert!((z - (-1.0)).abs() < 1e-4, "z={z}");

		let scale_0 = out.column("scale_0").unwrap().data.get(0).as_f32();
		assert!((scale_0 - 2.0_f32.ln()).abs() < 1e-4);

		let rot_0 = out.column("rot_0").unwrap().data.get(0).as_f32();
		let rot_1 = out.column("rot_1").unwrap().data.get(0).as_f32();
		let rot_2 = out.column("rot_2").unwrap().data.get(0).as_f32();
		let rot_3 = out.column("rot_3").unwrap().data.get(0).as_f32();
		assert!((rot_0 - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-4, "rot_0={rot_0}");
		assert!(rot_1.abs() < 1e-4, "rot_1={rot_1}");
		assert!((rot_2 - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-4, "rot_2={rot_2}");
		assert!(rot_3.abs() < 1e-4, "rot_3={rot_3}");
	}

	#[test]
	fn filter_nan_keeps_allowed_infinities() {
		let mut t = gaussian_table(3);
		t.column_mut("opacity").unwrap().data.set(0, RowValue::F32(f32::NEG_INFINITY));
		t.column_mut("x").unwrap().data.set(1, RowValue::F32(f32::NAN));

		let out = apply_pipeline(t, &[Action::FilterNaN]).unwrap();

		assert_eq!(out.row_count(), 2);
	}

	#[test]
	fn filter_by_value_drops_rows() {
		let mut t = gaussian_table(3);
		for i in 0..3 {
			t.column_mut("x").unwrap().data.set(i, RowValue::F32(i as f32));
		}
		let out = apply_pipeline(
			t,
			&[Action::FilterByValue { column: "x".into(), cmp: Cmp::Gte, value: 1.0 }],
		)
		.unwrap();

		assert_eq!(out.row_count(), 2);
	}

	#[test]
	fn filter_bands_truncates_rest_columns() {
		let mut t = gaussian_table(1);
		for i in 0..45 {
			t.add_column(Column::f32(format!("f_rest_{i}"), vec![i as f32])).unwrap();
		}
		let out = apply_pipeline(t, &[Action::FilterBands(1)]).unwrap();

		assert_eq!(out.gaussian_band().unwrap(), 1);
		// channel-major: first 3 red (indices 0,1,2), first 3 green (15,16,17), first 3 blue (30,31,32)
		assert_eq!(out.column("f_rest_0").unwrap().data.get(0), RowValue::F32(0.0));
		assert_eq!(out.column("f_rest_3").unwrap().data.get(0), RowValue::F32(15.0));
		assert_eq!(out.column("f_rest_6").unwrap().data.get(0), RowValue::F32(30.0));
	}

	#[test]
	fn param_action_is_a_no_op() {
		let t = gaussian_table(1);
		let out = apply_pipeline(t.clone(), &[Action::Param { name: "k".into(), value: "v".into() }]).unwrap();

		assert_eq!(out, t);
	}
}
