// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`Column`]: a named, typed, densely packed 1-D array.
//!
//! Modeled as a tagged union over the eight permitted element types rather
//! than a trait object, so callers that need a type-specific fast path (the
//! binary codecs) can match once and then work with a plain `&[T]`/`&mut
//! Vec<T>`, while generic table operations go through the row-dictionary
//! interface in `RowValue`.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// One cell's value, detached from its column's storage. Used by the
/// row-dictionary interface (`DataTable::row`/`set_row`) and by filter
/// predicates that need to read arbitrary column types generically.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum RowValue {
	I8(i8),
	U8(u8),
	I16(i16),
	U16(u16),
	I32(i32),
	U32(u32),
	F32(f32),
	F64(f64),
}

impl RowValue {
	/// Widens any numeric variant to `f64`, for generic arithmetic (filter
	/// comparisons, CSV rendering fallbacks).
	pub fn as_f64(&self) -> f64 {
		match *self {
			RowValue::I8(v) => v as f64,
			RowValue::U8(v) => v as f64,
			RowValue::I16(v) => v as f64,
			RowValue::U16(v) => v as f64,
			RowValue::I32(v) => v as f64,
			RowValue::U32(v) => v as f64,
			RowValue::F32(v) => v as f64,
			RowValue::F64(v) => v,
		}
	}

	pub fn as_f32(&self) -> f32 {
		self.as_f64() as f32
	}
}

impl fmt::Display for RowValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match *self {
			RowValue::I8(v) => write!(f, "{v}"),
			RowValue::U8(v) => write!(f, "{v}"),
			RowValue::I16(v) => write!(f, "{v}"),
			RowValue::U16(v) => write!(f, "{v}"),
			RowValue::I32(v) => write!(f, "{v}"),
			RowValue::U32(v) => write!(f, "{v}"),
			RowValue::F32(v) => write!(f, "{v}"),
			RowValue::F64(v) => write!(f, "{v}"),
		}
	}
}

/// The eight element types a [`Column`] may hold, matching the PLY property
/// type names (`char,uchar,short,ushort,int,uint,float,double`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum ElementType {
	I8,
	U8,
	I16,
	U16,
	I32,
	U32,
	F32,
	F64,
}

impl ElementType {
	/// The PLY property type name for this element type.
	pub fn ply_type_name(self) -> &'static str {
		match self {
			ElementType::I8 => "char",
			ElementType::U8 => "uchar",
			ElementType::I16 => "short",
			ElementType::U16 => "ushort",
			ElementType::I32 => "int",
			ElementType::U32 => "uint",
			ElementType::F32 => "float",
			ElementType::F64 => "double",
		}
	}

	pub fn from_ply_type_name(name: &str) -> Option<Self> {
		Some(match name {
			"char" | "int8" => ElementType::I8,
			"uchar" | "uint8" => ElementType::U8,
			"short" | "int16" => ElementType::I16,
			"ushort" | "uint16" => ElementType::U16,
			"int" | "int32" => ElementType::I32,
			"uint" | "uint32" => ElementType::U32,
			"float" | "float32" => ElementType::F32,
			"double" | "float64" => ElementType::F64,
			_ => return None,
		})
	}

	pub fn byte_width(self) -> usize {
		match self {
			ElementType::I8 | ElementType::U8 => 1,
			ElementType::I16 | ElementType::U16 => 2,
			ElementType::I32 | ElementType::U32 | ElementType::F32 => 4,
			ElementType::F64 => 8,
		}
	}
}

/// A named, typed, densely packed 1-D array. All variants of a given
/// [`Column`] instance hold the same number of elements; see `DataTable`
/// for the invariant that ties every column in a table to one row count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
	I8(Vec<i8>),
	U8(Vec<u8>),
	I16(Vec<i16>),
	U16(Vec<u16>),
	I32(Vec<i32>),
	U32(Vec<u32>),
	F32(Vec<f32>),
	F64(Vec<f64>),
}

macro_rules! column_data_dispatch {
	($self:expr, $v:ident => $body:expr) => {
		match $self {
			ColumnData::I8($v) => $body,
			ColumnData::U8($v) => $body,
			ColumnData::I16($v) => $body,
			ColumnData::U16($v) => $body,
			ColumnData::I32($v) => $body,
			ColumnData::U32($v) => $body,
			ColumnData::F32($v) => $body,
			ColumnData::F64($v) => $body,
		}
	};
}

impl ColumnData {
	pub fn element_type(&self) -> ElementType {
		match self {
			ColumnData::I8(_) => ElementType::I8,
			ColumnData::U8(_) => ElementType::U8,
			ColumnData::I16(_) => ElementType::I16,
			ColumnData::U16(_) => ElementType::U16,
			ColumnData::I32(_) => ElementType::I32,
			ColumnData::U32(_) => ElementType::U32,
			ColumnData::F32(_) => ElementType::F32,
			ColumnData::F64(_) => ElementType::F64,
		}
	}

	pub fn len(&self) -> usize {
		column_data_dispatch!(self, v => v.len())
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn zeroed(element_type: ElementType, len: usize) -> Self {
		match element_type {
			ElementType::I8 => ColumnData::I8(vec![0; len]),
			ElementType::U8 => ColumnData::U8(vec![0; len]),
			ElementType::I16 => ColumnData::I16(vec![0; len]),
			ElementType::U16 => ColumnData::U16(vec![0; len]),
			ElementType::I32 => ColumnData::I32(vec![0; len]),
			ElementType::U32 => ColumnData::U32(vec![0; len]),
			ElementType::F32 => ColumnData::F32(vec![0.0; len]),
			ElementType::F64 => ColumnData::F64(vec![0.0; len]),
		}
	}

	pub fn get(&self, i: usize) -> RowValue {
		match self {
			ColumnData::I8(v) => RowValue::I8(v[i]),
			ColumnData::U8(v) => RowValue::U8(v[i]),
			ColumnData::I16(v) => RowValue::I16(v[i]),
			ColumnData::U16(v) => RowValue::U16(v[i]),
			ColumnData::I32(v) => RowValue::I32(v[i]),
			ColumnData::U32(v) => RowValue::U32(v[i]),
			ColumnData::F32(v) => RowValue::F32(v[i]),
			ColumnData::F64(v) => RowValue::F64(v[i]),
		}
	}

	/// Sets row `i` from `value`, numerically converting if the dynamic
	/// variant doesn't match this column's type.
	pub fn set(&mut self, i: usize, value: RowValue) {
		match self {
			ColumnData::I8(v) => v[i] = value.as_f64() as i8,
			ColumnData::U8(v) => v[i] = value.as_f64() as u8,
			ColumnData::I16(v) => v[i] = value.as_f64() as i16,
			ColumnData::U16(v) => v[i] = value.as_f64() as u16,
			ColumnData::I32(v) => v[i] = value.as_f64() as i32,
			ColumnData::U32(v) => v[i] = value.as_f64() as u32,
			ColumnData::F32(v) => v[i] = value.as_f32(),
			ColumnData::F64(v) => v[i] = value.as_f64(),
		}
	}

	/// Returns a new column containing only rows `indices[j]` copied to
	/// position `j`, preserving the element type.
	pub fn permute(&self, indices: &[usize]) -> Self {
		match self {
			ColumnData::I8(v) => ColumnData::I8(indices.iter().map(|&i| v[i]).collect()),
			ColumnData::U8(v) => ColumnData::U8(indices.iter().map(|&i| v[i]).collect()),
			ColumnData::I16(v) => ColumnData::I16(indices.iter().map(|&i| v[i]).collect()),
			ColumnData::U16(v) => ColumnData::U16(indices.iter().map(|&i| v[i]).collect()),
			ColumnData::I32(v) => ColumnData::I32(indices.iter().map(|&i| v[i]).collect()),
			ColumnData::U32(v) => ColumnData::U32(indices.iter().map(|&i| v[i]).collect()),
			ColumnData::F32(v) => ColumnData::F32(indices.iter().map(|&i| v[i]).collect()),
			ColumnData::F64(v) => ColumnData::F64(indices.iter().map(|&i| v[i]).collect()),
		}
	}

	/// Reads every element widened to `f32`, for numeric kernels (Morton,
	/// k-means, transforms) that operate uniformly regardless of storage
	/// type.
	pub fn as_f32_vec(&self) -> Vec<f32> {
		match self {
			ColumnData::I8(v) => v.iter().map(|&x| x as f32).collect(),
			ColumnData::U8(v) => v.iter().map(|&x| x as f32).collect(),
			ColumnData::I16(v) => v.iter().map(|&x| x as f32).collect(),
			ColumnData::U16(v) => v.iter().map(|&x| x as f32).collect(),
			ColumnData::I32(v) => v.iter().map(|&x| x as f32).collect(),
			ColumnData::U32(v) => v.iter().map(|&x| x as f32).collect(),
			ColumnData::F32(v) => v.clone(),
			ColumnData::F64(v) => v.iter().map(|&x| x as f32).collect(),
		}
	}

	pub fn as_f32_slice(&self) -> Option<&[f32]> {
		match self {
			ColumnData::F32(v) => Some(v),
			_ => None,
		}
	}

	pub fn as_f32_mut_slice(&mut self) -> Option<&mut [f32]> {
		match self {
			ColumnData::F32(v) => Some(v),
			_ => None,
		}
	}
}

/// A named column: an [`ElementType`]-tagged array plus its name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
	pub name: String,
	pub data: ColumnData,
}

impl Column {
	pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
		Self { name: name.into(), data }
	}

	pub fn f32(name: impl Into<String>, data: Vec<f32>) -> Self {
		Self::new(name, ColumnData::F32(data))
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	pub fn element_type(&self) -> ElementType {
		self.data.element_type()
	}

	/// A `(name, type)` pair is what `DataTable::combine` keys on for
	/// column-set union.
	pub fn key(&self) -> (&str, ElementType) {
		(self.name.as_str(), self.element_type())
	}
}
