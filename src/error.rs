// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The error taxonomy shared by every module in this crate.
//!
//! Mirrors the shape of a single-format error enum (compare the teacher's
//! `SpzError`) but scoped to the whole pipeline: table shape violations,
//! codec failures, transform/CLI misuse, and resource unavailability each
//! get their own variant so callers can match on kind rather than parse
//! message text.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GsplatError {
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("io failure: {0}")]
	Io(#[from] std::io::Error),

	#[error("unsupported format: {0}")]
	UnsupportedFormat(String),

	#[error("malformed input: {0}")]
	MalformedInput(String),

	#[error("table is missing required Gaussian columns: {0}")]
	MissingRequiredColumns(String),

	#[error("codec failure: {0}")]
	Codec(String),

	#[error("resource unavailable: {0}")]
	ResourceUnavailable(String),
}

pub type Result<T> = std::result::Result<T, GsplatError>;

impl GsplatError {
	#[inline]
	pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
		Self::InvalidArgument(msg.into())
	}

	#[inline]
	pub fn malformed<S: Into<String>>(msg: S) -> Self {
		Self::MalformedInput(msg.into())
	}

	#[inline]
	pub fn unsupported<S: Into<String>>(msg: S) -> Self {
		Self::UnsupportedFormat(msg.into())
	}

	#[inline]
	pub fn codec<S: Into<String>>(msg: S) -> Self {
		Self::Codec(msg.into())
	}

	#[inline]
	pub fn missing_columns<S: Into<String>>(msg: S) -> Self {
		Self::MissingRequiredColumns(msg.into())
	}
}
