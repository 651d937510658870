// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`DataTable`]: an ordered sequence of same-length [`Column`]s.
//!
//! The struct-of-arrays shape follows the teacher's `PackedGaussians`
//! (`packed.rs`), generalized from a fixed Gaussian-attribute layout to an
//! arbitrary, order-preserving column set so readers/writers for six
//! formats and the transform/combine stages can all operate on the same
//! type.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::column::{Column, ColumnData, ElementType, RowValue};
use crate::error::{GsplatError, Result};

/// An ordered sequence of columns, all sharing one row count.
///
/// Invariants upheld by every constructor and mutator: all columns have
/// equal length; column names are unique within the table; insertion order
/// is preserved; a table always has at least one column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
	columns: Vec<Column>,
}

impl DataTable {
	/// Builds a table from `columns`, checking the shared-length and
	/// unique-name invariants.
	pub fn new(columns: Vec<Column>) -> Result<Self> {
		if columns.is_empty() {
			return Err(GsplatError::invalid_argument("a table must have at least one column"));
		}
		let n = columns[0].len();

		for c in &columns {
			if c.len() != n {
				return Err(GsplatError::invalid_argument(format!(
					"column '{}' has {} rows, expected {n}",
					c.name,
					c.len()
				)));
			}
		}
		let mut seen = HashMap::with_capacity(columns.len());

		for (i, c) in columns.iter().enumerate() {
			if seen.insert(c.name.as_str(), i).is_some() {
				return Err(GsplatError::invalid_argument(format!("duplicate column name '{}'", c.name)));
			}
		}
		Ok(Self { columns })
	}

	pub fn row_count(&self) -> usize {
		self.columns[0].len()
	}

	pub fn column_count(&self) -> usize {
		self.columns.len()
	}

	pub fn columns(&self) -> &[Column] {
		&self.columns
	}

	pub fn column(&self, name: &str) -> Option<&Column> {
		self.columns.iter().find(|c| c.name == name)
	}

	pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
		self.columns.iter_mut().find(|c| c.name == name)
	}

	pub fn has_column(&self, name: &str) -> bool {
		self.column(name).is_some()
	}

	pub fn column_index(&self, name: &str) -> Option<usize> {
		self.columns.iter().position(|c| c.name == name)
	}

	/// Appends a column, rejecting a length mismatch or a duplicate name.
	pub fn add_column(&mut self, column: Column) -> Result<()> {
		if column.len() != self.row_count() {
			return Err(GsplatError::invalid_argument(format!(
				"column '{}' has {} rows, table has {}",
				column.name,
				column.len(),
				self.row_count()
			)));
		}
		if self.has_column(&column.name) {
			return Err(GsplatError::invalid_argument(format!("duplicate column name '{}'", column.name)));
		}
		self.columns.push(column);
		Ok(())
	}

	/// Removes the named column. Errors if it is the table's last column,
	/// since a table always has at least one.
	pub fn remove_column(&mut self, name: &str) -> Result<Column> {
		if self.columns.len() == 1 {
			return Err(GsplatError::invalid_argument("cannot remove the last column of a table"));
		}
		let idx = self
			.column_index(name)
			.ok_or_else(|| GsplatError::invalid_argument(format!("no such column '{name}'")))?;
		Ok(self.columns.remove(idx))
	}

	/// Reads row `i` as a name-ordered vector of values.
	pub fn row(&self, i: usize) -> Vec<RowValue> {
		self.columns.iter().map(|c| c.data.get(i)).collect()
	}

	/// Overwrites row `i` from `values`, which must be column-ordered and
	/// equal in length to `column_count()`.
	pub fn set_row(&mut self, i: usize, values: &[RowValue]) -> Result<()> {
		if values.len() != self.columns.len() {
			return Err(GsplatError::invalid_argument(format!(
				"row has {} values, table has {} columns",
				values.len(),
				self.columns.len()
			)));
		}
		for (c, v) in self.columns.iter_mut().zip(values) {
			c.data.set(i, *v);
		}
		Ok(())
	}

	/// Returns a new table containing only rows `indices[j]`, copied to
	/// position `j`, for every column. `indices` may repeat or reorder rows
	/// arbitrarily; the output has `indices.len()` rows.
	pub fn permute(&self, indices: &[usize]) -> Self {
		let columns = self
			.columns
			.iter()
			.map(|c| Column::new(c.name.clone(), c.data.permute(indices)))
			.collect();

		Self { columns }
	}

	/// Keeps only rows for which `predicate(row_index, table)` is `true`,
	/// preserving relative order. Equivalent to `permute` over the kept
	/// indices, but avoids building the row-value vector for rows that are
	/// retained unchanged in the common "keep most rows" case.
	pub fn filter_rows(&self, mut predicate: impl FnMut(usize, &DataTable) -> bool) -> Self {
		let keep: Vec<usize> = (0..self.row_count()).filter(|&i| predicate(i, self)).collect();
		self.permute(&keep)
	}

	/// Gaussian band count `C(b)` for SH degree `b`: 3, 8, or 15.
	pub fn sh_band_coeff_count(band: u8) -> Option<usize> {
		match band {
			1 => Some(3),
			2 => Some(8),
			3 => Some(15),
			_ => None,
		}
	}

	/// Tests whether this table contains all required Gaussian columns
	/// (`x,y,z`, `scale_0..2`, `rot_0..3`, `f_dc_0..2`, `opacity`) and, if
	/// present, a complete `f_rest_*` band in channel-major order.
	pub fn is_gaussian_set(&self) -> bool {
		self.gaussian_band().is_ok()
	}

	/// Returns the SH band degree (0 if no `f_rest_*` columns are present)
	/// after validating the required columns and, if present, that the
	/// `f_rest_*` columns form one of the three legal band sizes.
	pub fn gaussian_band(&self) -> Result<u8> {
		const REQUIRED: &[&str] = &[
			"x", "y", "z", "scale_0", "scale_1", "scale_2", "rot_0", "rot_1", "rot_2", "rot_3", "f_dc_0", "f_dc_1",
			"f_dc_2", "opacity",
		];
		let missing: Vec<&str> = REQUIRED.iter().copied().filter(|n| !self.has_column(n)).collect();

		if !missing.is_empty() {
			return Err(GsplatError::missing_columns(missing.join(",")));
		}
		let rest_count = self.columns.iter().filter(|c| c.name.starts_with("f_rest_")).count();

		if rest_count == 0 {
			return Ok(0);
		}
		for band in [1u8, 2, 3] {
			let expected = 3 * Self::sh_band_coeff_count(band).unwrap();

			if rest_count == expected {
				for i in 0..expected {
					if !self.has_column(&format!("f_rest_{i}")) {
						return Err(GsplatError::missing_columns(format!("f_rest_{i}")));
					}
				}
				return Ok(band);
			}
		}
		Err(GsplatError::missing_columns(format!("f_rest_* has {rest_count} columns, not a valid SH band size")))
	}

	/// Column-set union of `tables`, keyed by `(name, element type)` in
	/// first-seen order. Every input must be a recognized Gaussian set.
	/// Rows are copied into matching output columns; columns absent from a
	/// given input default to zero for that input's row range.
	pub fn combine(tables: &[DataTable]) -> Result<DataTable> {
		if tables.is_empty() {
			return Err(GsplatError::invalid_argument("combine requires at least one table"));
		}
		for t in tables {
			t.gaussian_band()?;
		}
		let mut keys: Vec<(String, ElementType)> = Vec::new();
		let mut seen: HashMap<(String, ElementType), usize> = HashMap::new();

		for t in tables {
			for c in t.columns() {
				let key = (c.name.clone(), c.element_type());

				if !seen.contains_key(&key) {
					seen.insert(key.clone(), keys.len());
					keys.push(key);
				}
			}
		}
		let total_rows: usize = tables.iter().map(|t| t.row_count()).sum();
		let mut out_columns: Vec<ColumnData> =
			keys.iter().map(|(_, ty)| ColumnData::zeroed(*ty, total_rows)).collect();
		let mut offset = 0usize;

		for t in tables {
			let n = t.row_count();

			for (col_idx, (name, ty)) in keys.iter().enumerate() {
				if let Some(src) = t.column(name) {
					if src.element_type() == *ty {
						for row in 0..n {
							out_columns[col_idx].set(offset + row, src.data.get(row));
						}
					}
				}
			}
			offset += n;
		}
		let columns = keys
			.into_iter()
			.zip(out_columns)
			.map(|((name, _), data)| Column::new(name, data))
			.collect();

		DataTable::new(columns)
	}
}
