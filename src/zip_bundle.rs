// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A minimal, STORE-only ZIP reader/writer for the SOG bundle format.
//!
//! Grounded on the `zip` dependency the brush-family repos in the example
//! pack pull in for the same purpose (`other_examples/manifests/*-brush`);
//! the teacher has no ZIP precedent. STORE-only (no deflate) keeps the
//! writer a thin wrapper, since SOG's payloads (WebP textures, JSON
//! metadata) are already compressed or small.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{GsplatError, Result};

/// One named, in-memory file to place in a ZIP bundle.
pub struct BundleEntry {
	pub name: String,
	pub bytes: Vec<u8>,
}

/// Writes `entries` into a STORE-method ZIP archive, returning its bytes.
pub fn write_zip(entries: &[BundleEntry]) -> Result<Vec<u8>> {
	let mut cursor = Cursor::new(Vec::new());
	let mut writer = ZipWriter::new(&mut cursor);
	let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

	for entry in entries {
		writer
			.start_file(&entry.name, options)
			.map_err(|e| GsplatError::codec(format!("zip start_file '{}' failed: {e}", entry.name)))?;
		writer.write_all(&entry.bytes)?;
	}
	writer.finish().map_err(|e| GsplatError::codec(format!("zip finish failed: {e}")))?;
	Ok(cursor.into_inner())
}

/// Reads every entry out of a ZIP archive's bytes, in directory order.
pub fn read_zip(bytes: &[u8]) -> Result<Vec<BundleEntry>> {
	let mut archive =
		ZipArchive::new(Cursor::new(bytes)).map_err(|e| GsplatError::malformed(format!("not a valid zip archive: {e}")))?;
	let mut entries = Vec::with_capacity(archive.len());

	for i in 0..archive.len() {
		let mut file = archive.by_index(i).map_err(|e| GsplatError::malformed(format!("zip entry {i}: {e}")))?;
		let mut bytes = Vec::with_capacity(file.size() as usize);

		file.read_to_end(&mut bytes)?;
		entries.push(BundleEntry { name: file.name().to_string(), bytes });
	}
	Ok(entries)
}

/// Lists entry names without reading their contents.
pub fn list_entries(bytes: &[u8]) -> Result<Vec<String>> {
	let archive =
		ZipArchive::new(Cursor::new(bytes)).map_err(|e| GsplatError::malformed(format!("not a valid zip archive: {e}")))?;
	Ok(archive.file_names().map(String::from).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn write_then_read_roundtrip() {
		let entries = vec![
			BundleEntry { name: "meta.json".into(), bytes: b"{}".to_vec() },
			BundleEntry { name: "means_l.webp".into(), bytes: vec![1, 2, 3, 4] },
		];
		let bytes = write_zip(&entries).unwrap();
		let read_back = read_zip(&bytes).unwrap();

		assert_eq!(read_back.len(), 2);
		assert_eq!(read_back[0].name, "meta.json");
		assert_eq!(read_back[1].bytes, vec![1, 2, 3, 4]);
	}

	#[test]
	fn list_entries_matches_written_names() {
		let entries = vec![BundleEntry { name: "a.bin".into(), bytes: vec![0] }, BundleEntry { name: "b.bin".into(), bytes: vec![1] }];
		let bytes = write_zip(&entries).unwrap();
		let names = list_entries(&bytes).unwrap();

		assert_eq!(names, vec!["a.bin", "b.bin"]);
	}
}
