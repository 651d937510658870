// SPDX-License-Identifier: Apache-2.0 OR MIT

//! WebP texture encode/decode for the SOG codec, backed by the `image`
//! crate's `webp` feature.
//!
//! Grounded on the `image = { version = "0.25", features = ["webp"] }`
//! convention shared by the brush-family repos in the example pack
//! (`other_examples/manifests/ArthurBrussee-brush`,
//! `KeKsBoTer-brush`), since the teacher itself never touches textures.

use image::{ImageBuffer, ImageEncoder, RgbaImage};

use crate::error::{GsplatError, Result};

/// Encodes an RGBA8 buffer as lossless WebP bytes.
pub fn encode_rgba8(width: u32, height: u32, pixels: &[u8]) -> Result<Vec<u8>> {
	let image: RgbaImage = ImageBuffer::from_raw(width, height, pixels.to_vec())
		.ok_or_else(|| GsplatError::codec("pixel buffer does not match width*height*4"))?;

	let mut out = Vec::new();
	let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut out);

	encoder
		.write_image(image.as_raw(), width, height, image::ExtendedColorType::Rgba8)
		.map_err(|e| GsplatError::codec(format!("WebP encode failed: {e}")))?;
	Ok(out)
}

/// Decodes WebP bytes into an RGBA8 buffer, returning `(width, height,
/// pixels)`.
pub fn decode_rgba8(bytes: &[u8]) -> Result<(u32, u32, Vec<u8>)> {
	let image = image::load_from_memory_with_format(bytes, image::ImageFormat::WebP)
		.map_err(|e| GsplatError::codec(format!("WebP decode failed: {e}")))?
		.to_rgba8();
	let (w, h) = image.dimensions();

	Ok((w, h, image.into_raw()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn encode_decode_roundtrip_preserves_pixels() {
		let (w, h) = (4u32, 4u32);
		let pixels: Vec<u8> = (0..(w * h * 4)).map(|i| (i % 256) as u8).collect();

		let encoded = encode_rgba8(w, h, &pixels).unwrap();
		let (dw, dh, decoded) = decode_rgba8(&encoded).unwrap();

		assert_eq!((dw, dh), (w, h));
		assert_eq!(decoded, pixels);
	}
}
