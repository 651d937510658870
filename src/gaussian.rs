// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diagnostics for a table recognized as a Gaussian set: bounding box,
//! median ellipsoid volume, and a human-readable summary.
//!
//! Follows the teacher's `GaussianSplat::bbox`/`median_volume`/
//! `pretty_print`, generalized from a fixed struct-of-vecs layout to
//! reading `x,y,z`/`scale_0..2` out of a `DataTable`.

use std::fmt;

use likely_stable::unlikely;

use crate::error::Result;
use crate::table::DataTable;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
	pub min_x: f32,
	pub max_x: f32,
	pub min_y: f32,
	pub max_y: f32,
	pub min_z: f32,
	pub max_z: f32,
}

impl BoundingBox {
	pub fn size(&self) -> (f32, f32, f32) {
		(self.max_x - self.min_x, self.max_y - self.min_y, self.max_z - self.min_z)
	}

	pub fn center(&self) -> (f32, f32, f32) {
		(
			(self.min_x + self.max_x) * 0.5,
			(self.min_y + self.max_y) * 0.5,
			(self.min_z + self.max_z) * 0.5,
		)
	}
}

/// A Gaussian-set table's summary statistics, computed on demand from its
/// `x,y,z`/`scale_0..2` columns.
pub struct GaussianSummary<'a> {
	table: &'a DataTable,
}

impl<'a> GaussianSummary<'a> {
	/// Validates `table` is a recognized Gaussian set before wrapping it.
	pub fn new(table: &'a DataTable) -> Result<Self> {
		table.gaussian_band()?;
		Ok(Self { table })
	}

	pub fn sh_band(&self) -> u8 {
		self.table.gaussian_band().expect("validated in new()")
	}

	pub fn bbox(&self) -> BoundingBox {
		let x = self.table.column("x").expect("validated").data.as_f32_vec();
		let y = self.table.column("y").expect("validated").data.as_f32_vec();
		let z = self.table.column("z").expect("validated").data.as_f32_vec();

		if x.is_empty() {
			return BoundingBox { min_x: 0.0, max_x: 0.0, min_y: 0.0, max_y: 0.0, min_z: 0.0, max_z: 0.0 };
		}
		let mut bbox = BoundingBox { min_x: x[0], max_x: x[0], min_y: y[0], max_y: y[0], min_z: z[0], max_z: z[0] };

		for i in 0..x.len() {
			bbox.min_x = bbox.min_x.min(x[i]);
			bbox.max_x = bbox.max_x.max(x[i]);
			bbox.min_y = bbox.min_y.min(y[i]);
			bbox.max_y = bbox.max_y.max(y[i]);
			bbox.min_z = bbox.min_z.min(z[i]);
			bbox.max_z = bbox.max_z.max(z[i]);
		}
		bbox
	}

	/// The median of `ln(volume)` across all rows' ellipsoid scales,
	/// exponentiated back. Scales are stored log-encoded, so summing the
	/// three logs and sorting that sum avoids exponentiating every row.
	pub fn median_volume(&self) -> f32 {
		let s0 = self.table.column("scale_0").expect("validated").data.as_f32_vec();
		let s1 = self.table.column("scale_1").expect("validated").data.as_f32_vec();
		let s2 = self.table.column("scale_2").expect("validated").data.as_f32_vec();

		let mut sums: Vec<f32> = (0..s0.len())
			.filter_map(|i| {
				let s = s0[i] + s1[i] + s2[i];

				if unlikely(!s.is_finite()) { None } else { Some(s) }
			})
			.collect();

		if unlikely(sums.is_empty()) {
			return 0.01;
		}
		sums.sort_by(|a, b| a.partial_cmp(b).unwrap());
		let mid = sums[sums.len() / 2];

		4.0 / 3.0 * std::f32::consts::PI * mid.exp()
	}
}

impl fmt::Display for GaussianSummary<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let bbox = self.bbox();
		let (size_x, size_y, size_z) = bbox.size();

		writeln!(f, "GaussianSet:")?;
		writeln!(f, "\tRows:\t\t\t\t{}", self.table.row_count())?;
		writeln!(f, "\tSpherical harmonics degree:\t{}", self.sh_band())?;
		writeln!(f, "\tMedian ellipsoid volume:\t{:.6}", self.median_volume())?;
		writeln!(
			f,
			"\tBounding box:\n\t\tx: {:.6} to {:.6} (size {:.6})\n\t\ty: {:.6} to {:.6} (size {:.6})\n\t\tz: {:.6} to {:.6} (size {:.6})",
			bbox.min_x, bbox.max_x, size_x, bbox.min_y, bbox.max_y, size_y, bbox.min_z, bbox.max_z, size_z
		)
	}
}

impl fmt::Display for DataTable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "DataTable{{rows={}, columns=[", self.row_count())?;
		for (i, c) in self.columns().iter().enumerate() {
			if i > 0 {
				write!(f, ", ")?;
			}
			write!(f, "{}:{}", c.name, c.element_type())?;
		}
		write!(f, "]}}")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::column::Column;

	fn gaussian_table(positions: &[[f32; 3]], scales: &[[f32; 3]]) -> DataTable {
		let n = positions.len();
		let mut columns = vec![
			Column::f32("x", positions.iter().map(|p| p[0]).collect()),
			Column::f32("y", positions.iter().map(|p| p[1]).collect()),
			Column::f32("z", positions.iter().map(|p| p[2]).collect()),
			Column::f32("scale_0", scales.iter().map(|s| s[0]).collect()),
			Column::f32("scale_1", scales.iter().map(|s| s[1]).collect()),
			Column::f32("scale_2", scales.iter().map(|s| s[2]).collect()),
		];
		for name in ["rot_0", "rot_1", "rot_2", "rot_3", "f_dc_0", "f_dc_1", "f_dc_2", "opacity"] {
			columns.push(Column::f32(name, vec![0.0; n]));
		}
		DataTable::new(columns).unwrap()
	}

	#[test]
	fn bbox_covers_all_points() {
		let t = gaussian_table(&[[-1.0, 0.0, 2.0], [3.0, -4.0, 0.0]], &[[0.0; 3]; 2]);
		let summary = GaussianSummary::new(&t).unwrap();
		let bbox = summary.bbox();

		assert_eq!(bbox.min_x, -1.0);
		assert_eq!(bbox.max_x, 3.0);
		assert_eq!(bbox.min_y, -4.0);
		assert_eq!(bbox.max_y, 0.0);
	}

	#[test]
	fn median_volume_ignores_non_finite() {
		let t = gaussian_table(&[[0.0; 3]; 3], &[[0.0, 0.0, 0.0], [f32::NAN, 0.0, 0.0], [1.0, 1.0, 1.0]]);
		let summary = GaussianSummary::new(&t).unwrap();

		assert!(summary.median_volume() > 0.0);
	}
}
