// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A columnar, format-agnostic Gaussian-splat point-cloud toolkit:
//! reading, writing, converting, and transform-editing the on-disk
//! formats the splatting ecosystem has produced (PLY and its compressed
//! PlayCanvas variant, `.splat`, `.ksplat`, `.spz`, SOG, CSV), plus
//! interface-only HTML viewer and `.mjs` generator adapters.
//!
//! `DataTable`/`Column` are the crate's spine: every codec decodes into
//! the same tagged-union columnar table and every transform operates on
//! it generically, so adding a format means writing one module under
//! `formats/`, not touching the transform or combine layers.

pub mod column;
pub mod coord;
pub mod error;
pub mod formats;
pub mod gaussian;
pub mod generator;
pub mod gpu;
pub mod html;
pub mod io;
pub mod kdtree;
pub mod kmeans;
pub mod math;
pub mod morton;
pub mod sh;
pub mod table;
pub mod transform;
pub mod webp;
pub mod zip_bundle;

pub mod prelude {
	pub use super::column::{Column, ColumnData, ElementType, RowValue};
	pub use super::coord::{AxisFlips, CoordinateSystem};
	pub use super::error::{GsplatError, Result};
	pub use super::formats::Format;
	pub use super::gaussian::{BoundingBox, GaussianSummary};
	pub use super::table::DataTable;
	pub use super::transform::{Action, Cmp};
}
