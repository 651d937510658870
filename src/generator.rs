// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The `.mjs` generator-script adapter: an interface only. Per
//! `DESIGN.md`'s Open Question decisions, no scripting engine ships in
//! this crate; the provided implementation stubs the unreachable path the
//! same way the teacher stubs out-of-range/unpacked-load branches
//! elsewhere in its own code.

use std::collections::HashMap;

use crate::error::{GsplatError, Result};
use crate::table::DataTable;

/// Given a map of `(name, string value)` parameters, produces `count` rows
/// over a fixed column-name set into a pre-allocated row dictionary.
pub trait GeneratorAdapter {
	fn generate(&self, params: &HashMap<String, String>, count: usize) -> Result<DataTable>;
}

/// The only `GeneratorAdapter` this crate provides: always reports the
/// `.mjs` surface as unsupported, since no embedded scripting engine
/// ships here.
pub struct UnimplementedGenerator;

impl GeneratorAdapter for UnimplementedGenerator {
	fn generate(&self, _params: &HashMap<String, String>, _count: usize) -> Result<DataTable> {
		Err(GsplatError::codec(".mjs generator scripts are not implemented by this crate"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unimplemented_generator_reports_codec_error() {
		let generator = UnimplementedGenerator;
		let result = generator.generate(&HashMap::new(), 10);

		assert!(matches!(result, Err(GsplatError::Codec(_))));
	}
}
