// SPDX-License-Identifier: Apache-2.0 OR MIT

//! File I/O shared by every codec: memory-mapped reads, atomic writes
//! (temp file + rename), and thin `tokio` wrappers suspending only at the
//! read/write boundary around otherwise-synchronous in-memory codecs.
//!
//! Grounded on the teacher's `mmap.rs` (kept near-verbatim) and
//! `gaussian_splat.rs`'s dual sync/async load/save method pairs.

use std::path::Path;

use memmap2::Mmap;

use crate::error::{GsplatError, Result};

/// Memory-maps a file for read-only access.
#[inline]
pub fn mmap(filepath: impl AsRef<Path>) -> Result<Mmap> {
	let file = std::fs::File::open(&filepath)?;

	unsafe { Mmap::map(&file) }.map_err(|e| GsplatError::Io(e))
}

/// Reads a whole file into memory, preferring mmap except on macOS where
/// mmap-then-read has historically been slower than a plain read for the
/// small-to-medium files this tool handles.
pub fn read_whole_file(filepath: impl AsRef<Path>) -> Result<Vec<u8>> {
	if cfg!(target_os = "macos") {
		return Ok(std::fs::read(filepath)?);
	}
	let mapped = mmap(filepath)?;
	Ok(mapped.to_vec())
}

/// Writes `contents` to `path` atomically: writes to a sibling temp file
/// then renames over the destination, so a crash or concurrent reader
/// never observes a partially written file.
pub fn write_atomic(path: impl AsRef<Path>, contents: &[u8]) -> Result<()> {
	let path = path.as_ref();

	if let Some(parent) = path.parent() {
		if !parent.as_os_str().is_empty() {
			std::fs::create_dir_all(parent)?;
		}
	}
	let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
	tmp_name.push(".gsplat-tmp");
	let tmp_path = path.with_file_name(tmp_name);

	std::fs::write(&tmp_path, contents)?;
	std::fs::rename(&tmp_path, path)?;
	Ok(())
}

/// Async counterpart of [`read_whole_file`], suspending only at the file
/// read; the decode itself still runs synchronously once bytes are in
/// memory (see §5: no streaming partial decode).
pub async fn read_whole_file_async(filepath: impl AsRef<Path>) -> Result<Vec<u8>> {
	Ok(tokio::fs::read(filepath).await?)
}

/// Async counterpart of [`write_atomic`].
pub async fn write_atomic_async(path: impl AsRef<Path>, contents: Vec<u8>) -> Result<()> {
	let path = path.as_ref().to_path_buf();

	if let Some(parent) = path.parent() {
		if !parent.as_os_str().is_empty() {
			tokio::fs::create_dir_all(parent).await?;
		}
	}
	let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
	tmp_name.push(".gsplat-tmp");
	let tmp_path = path.with_file_name(tmp_name);

	tokio::fs::write(&tmp_path, &contents).await?;
	tokio::fs::rename(&tmp_path, &path).await?;
	Ok(())
}

pub mod gzip {
	use crate::error::Result;
	use std::io::Read;

	use flate2::Compression;
	use flate2::bufread::{GzDecoder, GzEncoder};

	pub fn compress(decompressed: &[u8]) -> Result<Vec<u8>> {
		let mut encoder = GzEncoder::new(decompressed, Compression::default());
		let mut out = Vec::with_capacity(decompressed.len() / 4);

		encoder.read_to_end(&mut out)?;
		Ok(out)
	}

	pub fn decompress(compressed: &[u8]) -> Result<Vec<u8>> {
		let mut decoder = GzDecoder::new(compressed);
		let mut out = Vec::new();

		decoder.read_to_end(&mut out)?;
		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn atomic_write_then_read_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("out.bin");

		write_atomic(&path, b"hello").unwrap();
		assert_eq!(read_whole_file(&path).unwrap(), b"hello");
	}

	#[test]
	fn atomic_write_creates_parent_dirs() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested/deep/out.bin");

		write_atomic(&path, b"x").unwrap();
		assert!(path.exists());
	}

	#[test]
	fn gzip_roundtrip() {
		let data = b"some gaussian splat bytes".repeat(10);
		let compressed = gzip::compress(&data).unwrap();
		let decompressed = gzip::decompress(&compressed).unwrap();

		assert_eq!(decompressed, data);
	}

	#[tokio::test]
	async fn async_atomic_write_then_read_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("out.bin");

		write_atomic_async(&path, b"hello async".to_vec()).await.unwrap();
		let contents = read_whole_file_async(&path).await.unwrap();

		assert_eq!(contents, b"hello async");
	}
}
