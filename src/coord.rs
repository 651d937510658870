// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Coordinate-system conversion, scoped to the SPZ codec's internal
//! Right-Up-Back convention (`formats/spz.rs` is the only caller).
//!
//! Kept near-verbatim from the teacher's `coord.rs`, minus the `arbitrary`
//! derive (dropped crate-wide; see `DESIGN.md`).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported 3D coordinate systems for Gaussian splat data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateSystem {
	#[default]
	Unspecified = 0,

	LeftDownBack = 1,
	RightDownBack = 2,
	LeftUpBack = 3,
	RightUpBack = 4, // SPZ's internal convention
	LeftDownFront = 5,
	RightDownFront = 6, // PLY's convention
	LeftUpFront = 7,    // GLB's convention
	RightUpFront = 8,   // Unity's convention
}

impl std::fmt::Display for CoordinateSystem {
	#[inline]
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			CoordinateSystem::LeftDownBack => write!(f, "Left-Down-Back"),
			CoordinateSystem::RightDownBack => write!(f, "Right-Down-Back"),
			CoordinateSystem::LeftUpBack => write!(f, "Left-Up-Back"),
			CoordinateSystem::RightUpBack => write!(f, "Right-Up-Back"),
			CoordinateSystem::LeftDownFront => write!(f, "Left-Down-Front"),
			CoordinateSystem::RightDownFront => write!(f, "Right-Down-Front"),
			CoordinateSystem::LeftUpFront => write!(f, "Left-Up-Front"),
			CoordinateSystem::RightUpFront => write!(f, "Right-Up-Front"),
			CoordinateSystem::Unspecified => write!(f, "Unspecified"),
		}
	}
}

impl FromStr for CoordinateSystem {
	type Err = ();

	#[inline]
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_uppercase().as_str() {
			"LDB" | "LEFTDOWNBACK" | "LEFT-DOWN-BACK" | "LEFT_DOWN_BACK" => Ok(CoordinateSystem::LeftDownBack),
			"RDB" | "RIGHTDOWNBACK" | "RIGHT-DOWN-BACK" | "RIGHT_DOWN_BACK" => Ok(CoordinateSystem::RightDownBack),
			"LUB" | "LEFTUPBACK" | "LEFT-UP-BACK" | "LEFT_UP_BACK" => Ok(CoordinateSystem::LeftUpBack),
			"RUB" | "RIGHTUPBACK" | "RIGHT-UP-BACK" | "RIGHT_UP_BACK" => Ok(CoordinateSystem::RightUpBack),
			"LDF" | "LEFTDOWNFRONT" | "LEFT-DOWN-FRONT" | "LEFT_DOWN_FRONT" => Ok(CoordinateSystem::LeftDownFront),
			"RDF" | "RIGHTDOWNFRONT" | "RIGHT-DOWN-FRONT" | "RIGHT_DOWN_FRONT" => Ok(CoordinateSystem::RightDownFront),
			"LUF" | "LEFTUPFRONT" | "LEFT-UP-FRONT" | "LEFT_UP_FRONT" => Ok(CoordinateSystem::LeftUpFront),
			"RUF" | "RIGHTUPFRONT" | "RIGHT-UP-FRONT" | "RIGHT_UP_FRONT" => Ok(CoordinateSystem::RightUpFront),
			_ => Ok(CoordinateSystem::Unspecified),
		}
	}
}

impl CoordinateSystem {
	/// Axis flip multipliers for converting data from `self` to `target`.
	pub fn axis_flips_to(self, target: CoordinateSystem) -> AxisFlips {
		let (x_match, y_match, z_match) = self.axes_align(target);

		let x = if x_match { 1.0_f32 } else { -1.0_f32 };
		let y = if y_match { 1.0_f32 } else { -1.0_f32 };
		let z = if z_match { 1.0_f32 } else { -1.0_f32 };

		AxisFlips {
			position: [x, y, z],
			rotation: [y * z, x * z, x * y],
			spherical_harmonics: [
				y, z, x, x * y, y * z, 1.0, x * z, 1.0, y, x * y * z, y, z, x, z, x,
			],
		}
	}

	/// Compares axis orientations between two coordinate systems; `true`
	/// means that axis matches (no flip needed). `Unspecified` on either
	/// side is treated as matching on all axes.
	pub fn axes_align(self, other: CoordinateSystem) -> (bool, bool, bool) {
		let self_num = self as i8 - 1;
		let other_num = other as i8 - 1;

		if self_num < 0 || other_num < 0 {
			return (true, true, true);
		}
		let xm = (self_num & 1) == (other_num & 1);
		let ym = ((self_num >> 1) & 1) == ((other_num >> 1) & 1);
		let zm = ((self_num >> 2) & 1) == ((other_num >> 2) & 1);

		(xm, ym, zm)
	}
}

/// Sign multipliers (+1.0 or -1.0) for transforming Gaussian splat data
/// between coordinate systems.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisFlips {
	pub position: [f32; 3],
	pub rotation: [f32; 3],
	pub spherical_harmonics: [f32; 15],
}

impl Default for AxisFlips {
	#[inline]
	fn default() -> Self {
		Self { position: [1.0, 1.0, 1.0], rotation: [1.0, 1.0, 1.0], spherical_harmonics: [1.0; 15] }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unspecified_never_flips() {
		let flips = CoordinateSystem::Unspecified.axis_flips_to(CoordinateSystem::RightUpBack);
		assert_eq!(flips.position, [1.0, 1.0, 1.0]);
	}

	#[test]
	fn ply_to_spz_flips_expected_axes() {
		let (x, y, z) = CoordinateSystem::RightDownFront.axes_align(CoordinateSystem::RightUpBack);
		assert_eq!((x, y, z), (true, false, false));
	}

	#[test]
	fn from_str_accepts_abbreviation() {
		assert_eq!("RUB".parse::<CoordinateSystem>().unwrap(), CoordinateSystem::RightUpBack);
	}
}
