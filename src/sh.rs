// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Real spherical-harmonic rotation matrices for SH bands 1..3, applied to
//! the `f_rest_*` coefficients of a Gaussian table.
//!
//! New module; the fixed-size-array style (no heap allocation per block)
//! follows `math.rs`'s convention of returning `[[f32; N]; N]` rather than
//! a `Vec`-backed matrix type. The recurrence itself is the standard
//! Ivanic & Ruedenberg construction: band 1 is exact (a permutation of the
//! rotation matrix), bands 2 and 3 are derived recursively from band 1 and
//! the previous band.

/// The leading `C(b) x C(b)` Wigner-D rotation block for SH band `b`.
#[derive(Clone, Debug)]
pub enum ShRotation {
	Band1([[f32; 3]; 3]),
	Band2([[f32; 8]; 8]),
	Band3([[f32; 15]; 15]),
}

impl ShRotation {
	pub fn coeff_count(&self) -> usize {
		match self {
			ShRotation::Band1(_) => 3,
			ShRotation::Band2(_) => 8,
			ShRotation::Band3(_) => 15,
		}
	}

	/// Applies this block to one RGB channel's coefficient vector, in
	/// place. `coeffs.len()` must equal `coeff_count()`.
	pub fn apply(&self, coeffs: &mut [f32]) {
		debug_assert_eq!(coeffs.len(), self.coeff_count());
		match self {
			ShRotation::Band1(m) => apply_square(m, coeffs),
			ShRotation::Band2(m) => apply_square(m, coeffs),
			ShRotation::Band3(m) => apply_square(m, coeffs),
		}
	}
}

fn apply_square<const N: usize>(m: &[[f32; N]; N], coeffs: &mut [f32]) {
	let input: [f32; N] = std::array::from_fn(|i| coeffs[i]);

	for (row, out) in m.iter().zip(coeffs.iter_mut()) {
		*out = row.iter().zip(input.iter()).map(|(a, b)| a * b).sum();
	}
}

/// Builds the order-1 (3x3) real-SH rotation matrix directly from a
/// standard `(x,y,z)` rotation matrix `r`. Real-SH degree-1 basis functions
/// are proportional to `(y, z, x)` in that order, so this is `r` with rows
/// and columns permuted accordingly — exact, no recurrence needed.
fn band1_matrix(r: [[f32; 3]; 3]) -> [[f32; 3]; 3] {
	let idx = [1usize, 2, 0]; // maps SH order {0,1,2} -> cartesian {y,z,x}

	std::array::from_fn(|i| std::array::from_fn(|j| r[idx[i]][idx[j]]))
}

/// Full block-diagonal SH rotation transform for a given rotation matrix,
/// providing the leading sub-block for whichever band is requested.
pub struct ShRotations {
	band1: [[f32; 3]; 3],
	band2: [[f32; 5]; 5],
	band3: [[f32; 7]; 7],
}

impl ShRotations {
	pub fn from_rotation_matrix(r: [[f32; 3]; 3]) -> Self {
		let band1 = band1_matrix(r);
		let band2 = higher_band(&band1, 2);
		let band3 = higher_band(&band1, 3);

		Self { band1, band2, band3 }
	}

	/// Returns the leading sub-block for band `b` (`1..=3`), zero-padding
	/// the surrounding channel entries per spec so the returned
	/// `ShRotation` always matches `3 * C(b)` total coefficients when
	/// applied per-channel.
	pub fn for_band(&self, band: u8) -> ShRotation {
		match band {
			1 => ShRotation::Band1(self.band1),
			2 => {
				let mut m = [[0.0_f32; 8]; 8];
				embed(&self.band1, &mut m, 0);
				embed(&self.band2, &mut m, 3);
				ShRotation::Band2(m)
			}
			3 => {
				let mut m = [[0.0_f32; 15]; 15];
				embed(&self.band1, &mut m, 0);
				embed(&self.band2, &mut m, 3);
				embed(&self.band3, &mut m, 8);
				ShRotation::Band3(m)
			}
			_ => unreachable!("SH band must be 1..=3"),
		}
	}
}

fn embed<const K: usize, const N: usize>(block: &[[f32; K]; K], out: &mut [[f32; N]; N], offset: usize) {
	for i in 0..K {
		for j in 0..K {
			out[offset + i][offset + j] = block[i][j];
		}
	}
}

fn centered<const N: usize>(m: &[[f32; N]; N], row: i32, col: i32, l: i32) -> f32 {
	m[(row + l) as usize][(col + l) as usize]
}

/// `P(i, a, b)` helper from the Ivanic & Ruedenberg recursion: builds one
/// entry of the order-`l` matrix from the order-1 matrix (`r1`) and the
/// order-`(l-1)` matrix (`prev`).
fn p_term<const M: usize>(i: i32, a: i32, b: i32, l: i32, r1: &[[f32; 3]; 3], prev: &[[f32; M]; M]) -> f32 {
	let ri1 = r1[(i + 1) as usize][2];
	let ri0 = r1[(i + 1) as usize][1];
	let ri_m1 = r1[(i + 1) as usize][0];

	if b == l {
		ri1 * centered(prev, a, l - 1, l - 1) - ri_m1 * centered(prev, a, -(l - 1), l - 1)
	} else if b == -l {
		ri1 * centered(prev, a, -(l - 1), l - 1) + ri_m1 * centered(prev, a, l - 1, l - 1)
	} else {
		ri0 * centered(prev, a, b, l - 1)
	}
}

fn u_term<const M: usize>(l: i32, m: i32, n: i32, r1: &[[f32; 3]; 3], prev: &[[f32; M]; M]) -> f32 {
	p_term(0, m, n, l, r1, prev)
}

fn v_term<const M: usize>(l: i32, m: i32, n: i32, r1: &[[f32; 3]; 3], prev: &[[f32; M]; M]) -> f32 {
	if m == 0 {
		p_term(1, 1, n, l, r1, prev) + p_term(-1, -1, n, l, r1, prev)
	} else if m > 0 {
		let d = if m == 1 { 1.0 } else { 0.0 };
		p_term(1, m - 1, n, l, r1, prev) * (1.0 + d).sqrt() - p_term(-1, -m + 1, n, l, r1, prev) * (1.0 - d)
	} else {
		let d = if m == -1 { 1.0 } else { 0.0 };
		p_term(1, m + 1, n, l, r1, prev) * (1.0 - d) + p_term(-1, -m - 1, n, l, r1, prev) * (1.0 + d).sqrt()
	}
}

fn w_term<const M: usize>(l: i32, m: i32, n: i32, r1: &[[f32; 3]; 3], prev: &[[f32; M]; M]) -> f32 {
	if m > 0 {
		p_term(1, m + 1, n, l, r1, prev) + p_term(-1, -m - 1, n, l, r1, prev)
	} else {
		p_term(1, m - 1, n, l, r1, prev) - p_term(-1, -m + 1, n, l, r1, prev)
	}
}

fn uvw_coeffs(l: i32, m: i32, n: i32) -> (f32, f32, f32) {
	let d = if m == 0 { 1.0 } else { 0.0 };
	let denom = if n.abs() == l { (2 * l * (2 * l - 1)) as f32 } else { ((l + n) * (l - n)) as f32 };

	let u = (((l + m) * (l - m)) as f32 / denom).sqrt();
	let v = 0.5 * ((1.0 + d) * ((l + m.abs() - 1) * (l + m.abs())) as f32 / denom).sqrt() * (1.0 - 2.0 * d);
	let w = -0.5 * (((l - m.abs() - 1) * (l - m.abs())) as f32 / denom).sqrt() * (1.0 - d);

	(u, v, w)
}

/// Builds the order-`band` (`2` or `3`) matrix from the order-1 matrix via
/// the Ivanic & Ruedenberg recurrence, recursing through intermediate bands.
fn higher_band<const N: usize>(band1: &[[f32; 3]; 3], band: i32) -> [[f32; N]; N] {
	debug_assert_eq!(N as i32, 2 * band + 1);

	if band == 2 {
		let mut out = [[0.0_f32; N]; N];
		for m in -band..=band {
			for n in -band..=band {
				let (u, v, w) = uvw_coeffs(band, m, n);
				let mut val = 0.0;

				if u != 0.0 {
					val += u * u_term(band, m, n, band1, band1);
				}
				if v != 0.0 {
					val += v * v_term(band, m, n, band1, band1);
				}
				if w != 0.0 {
					val += w * w_term(band, m, n, band1, band1);
				}
				out[(m + band) as usize][(n + band) as usize] = val;
			}
		}
		out
	} else {
		// band == 3: recurse through the order-2 matrix.
		let band2: [[f32; 5]; 5] = higher_band(band1, 2);
		let mut out = [[0.0_f32; N]; N];

		for m in -band..=band {
			for n in -band..=band {
				let (u, v, w) = uvw_coeffs(band, m, n);
				let mut val = 0.0;

				if u != 0.0 {
					val += u * u_term(band, m, n, band1, &band2);
				}
				if v != 0.0 {
					val += v * v_term(band, m, n, band1, &band2);
				}
				if w != 0.0 {
					val += w * w_term(band, m, n, band1, &band2);
				}
				out[(m + band) as usize][(n + band) as usize] = val;
			}
		}
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;

	fn identity() -> [[f32; 3]; 3] {
		[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
	}

	#[test]
	fn identity_rotation_yields_identity_band1() {
		let rot = ShRotations::from_rotation_matrix(identity());
		let ShRotation::Band1(m) = rot.for_band(1) else { unreachable!() };

		for i in 0..3 {
			for j in 0..3 {
				let expected = if i == j { 1.0 } else { 0.0 };
				assert_relative_eq!(m[i][j], expected, epsilon = 1e-5);
			}
		}
	}

	#[test]
	fn identity_rotation_yields_identity_band2_and_band3() {
		let rot = ShRotations::from_rotation_matrix(identity());

		let ShRotation::Band2(m2) = rot.for_band(2) else { unreachable!() };
		for i in 0..8 {
			for j in 0..8 {
				let expected = if i == j { 1.0 } else { 0.0 };
				assert_relative_eq!(m2[i][j], expected, epsilon = 1e-4);
			}
		}

		let ShRotation::Band3(m3) = rot.for_band(3) else { unreachable!() };
		for i in 0..15 {
			for j in 0..15 {
				let expected = if i == j { 1.0 } else { 0.0 };
				assert_relative_eq!(m3[i][j], expected, epsilon = 1e-4);
			}
		}
	}

	#[test]
	fn band1_is_orthonormal_for_arbitrary_rotation() {
		// 90-degree rotation about Z: x->y, y->-x, z->z.
		let r = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
		let rot = ShRotations::from_rotation_matrix(r);
		let ShRotation::Band1(m) = rot.for_band(1) else { unreachable!() };

		// row norms of a rotation matrix must be 1
		for row in m.iter() {
			let norm: f32 = row.iter().map(|v| v * v).sum();
			assert_relative_eq!(norm, 1.0, epsilon = 1e-4);
		}
	}

	#[test]
	fn apply_preserves_vector_norm() {
		let r = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
		let rot = ShRotations::from_rotation_matrix(r);
		let block = rot.for_band(1);

		let mut v = [1.0_f32, 2.0, 3.0];
		let norm_before: f32 = v.iter().map(|x| x * x).sum();

		block.apply(&mut v);
		let norm_after: f32 = v.iter().map(|x| x * x).sum();

		assert_relative_eq!(norm_before, norm_after, epsilon = 1e-3);
	}
}
