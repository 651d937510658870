// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `meta.json`'s schema: the per-attribute codebooks and texture file
//! names that accompany a SOG bundle's WebP textures.
//!
//! New module (the teacher never touches JSON sidecars); shaped directly
//! from the written/read schema description and the brush-family splat
//! exporters in `other_examples/` for the general codebook-plus-textures
//! idea.

use serde::{Deserialize, Serialize};

use crate::error::{GsplatError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
	pub version: u32,
	pub count: usize,
	pub means: MeansSection,
	pub scales: CodebookSection,
	pub quats: FilesSection,
	pub sh0: CodebookSection,
	#[serde(rename = "shN", skip_serializing_if = "Option::is_none", default)]
	pub sh_n: Option<ShNSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeansSection {
	pub mins: [f32; 3],
	pub maxs: [f32; 3],
	pub files: Vec<String>,
}

/// A 256-entry (or fewer) 1-D quantization codebook, plus the legacy
/// `min`/`max` linear-range shape some older writers emit instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodebookSection {
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub codebook: Option<Vec<f32>>,
	pub files: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub min: Option<f32>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub max: Option<f32>,
}

impl CodebookSection {
	/// Maps a label byte back to its represented value, using the
	/// codebook when present or a linear `[min, max]` range otherwise.
	pub fn dequantize(&self, label: u8) -> f32 {
		if let Some(codebook) = &self.codebook {
			return codebook.get(label as usize).copied().unwrap_or(0.0);
		}
		let min = self.min.unwrap_or(0.0);
		let max = self.max.unwrap_or(1.0);
		min + (label as f32 / 255.0) * (max - min)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesSection {
	pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShNSection {
	pub count: usize,
	pub bands: u8,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub codebook: Option<Vec<f32>>,
	pub files: Vec<String>,
}

impl ShNSection {
	pub fn dequantize(&self, label: u8) -> f32 {
		self.codebook.as_ref().and_then(|cb| cb.get(label as usize).copied()).unwrap_or(0.0)
	}
}

pub fn parse(bytes: &[u8]) -> Result<Meta> {
	serde_json::from_slice(bytes).map_err(|e| GsplatError::malformed(format!("bad meta.json: {e}")))
}

pub fn serialize(meta: &Meta) -> Result<Vec<u8>> {
	serde_json::to_vec_pretty(meta).map_err(|e| GsplatError::codec(format!("meta.json serialize failed: {e}")))
}
