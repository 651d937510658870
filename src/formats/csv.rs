// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A plain-text CSV codec: one header row of column names, one data row
//! per splat.
//!
//! New module; provided for symmetry with every other codec's read+write
//! pair even though the CSV direction of travel is mostly export, per the
//! Open Question decision recorded in `DESIGN.md`.

use crate::column::{Column, ColumnData, ElementType, RowValue};
use crate::error::{GsplatError, Result};
use crate::table::DataTable;

fn format_value(value: &RowValue) -> String {
	match value {
		RowValue::F32(v) => format!("{v}"),
		RowValue::F64(v) => format!("{v}"),
		RowValue::I8(v) => format!("{v}"),
		RowValue::U8(v) => format!("{v}"),
		RowValue::I16(v) => format!("{v}"),
		RowValue::U16(v) => format!("{v}"),
		RowValue::I32(v) => format!("{v}"),
		RowValue::U32(v) => format!("{v}"),
	}
}

/// Serializes `table` as CSV text: one header line, then one line per row,
/// columns in their table order.
pub fn write(table: &DataTable) -> Result<Vec<u8>> {
	let mut out = String::new();
	let names: Vec<&str> = table.columns().iter().map(|c| c.name.as_str()).collect();
	out.push_str(&names.join(","));
	out.push('\n');

	for i in 0..table.row_count() {
		let row = table.row(i);
		let fields: Vec<String> = row.iter().map(format_value).collect();
		out.push_str(&fields.join(","));
		out.push('\n');
	}

	Ok(out.into_bytes())
}

fn split_line(line: &str) -> Vec<&str> {
	line.split(',').map(|s| s.trim()).collect()
}

/// Parses CSV text back into a table. Each column's element type is
/// inferred from whether every value in that column round-trips through
/// an integer parse; columns that don't are stored as `f32`.
pub fn read(bytes: &[u8]) -> Result<DataTable> {
	let text = std::str::from_utf8(bytes).map_err(|_| GsplatError::malformed("CSV is not valid UTF-8"))?;
	let mut lines = text.lines();
	let header = lines.next().ok_or_else(|| GsplatError::malformed("empty CSV"))?;
	let names: Vec<String> = split_line(header).iter().map(|s| s.to_string()).collect();

	if names.is_empty() {
		return Err(GsplatError::malformed("CSV header has no columns"));
	}
	let mut raw: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

	for line in lines {
		if line.trim().is_empty() {
			continue;
		}
		let fields = split_line(line);
		if fields.len() != names.len() {
			return Err(GsplatError::malformed(format!(
				"CSV row has {} fields, expected {}",
				fields.len(),
				names.len()
			)));
		}
		for (col, field) in raw.iter_mut().zip(fields.iter()) {
			let value: f64 = field.parse().map_err(|_| GsplatError::malformed(format!("bad numeric field '{field}'")))?;
			col.push(value);
		}
	}

	let columns = names
		.into_iter()
		.zip(raw)
		.map(|(name, values)| {
			let all_integral = values.iter().all(|v| v.fract() == 0.0 && v.abs() < i32::MAX as f64);
			let data = if all_integral {
				ColumnData::I32(values.iter().map(|&v| v as i32).collect())
			} else {
				ColumnData::F32(values.iter().map(|&v| v as f32).collect())
			};
			Column::new(name, data)
		})
		.collect();

	DataTable::new(columns)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_table() -> DataTable {
		DataTable::new(vec![
			Column::f32("x", vec![1.0, 2.5, -3.25]),
			Column::f32("y", vec![0.0, 1.0, 2.0]),
			Column::new("index", ColumnData::I32(vec![0, 1, 2])),
		])
		.unwrap()
	}

	#[test]
	fn write_then_read_roundtrips_values() {
		let table = sample_table();
		let csv = write(&table).unwrap();
		let read_back = read(&csv).unwrap();

		assert_eq!(read_back.row_count(), 3);
		let x = read_back.column("x").unwrap().data.as_f32_vec();
		assert!((x[1] - 2.5).abs() < 1e-6);
	}

	#[test]
	fn rejects_ragged_rows() {
		let csv = b"x,y\n1,2\n3\n";
		assert!(read(csv).is_err());
	}

	#[test]
	fn integral_columns_round_trip_as_integers() {
		let table = sample_table();
		let csv = write(&table).unwrap();
		let read_back = read(&csv).unwrap();

		assert_eq!(read_back.column("index").unwrap().element_type(), ElementType::I32);
	}
}
