//! Common utilities for qlie-tools.
//!
//! This crate provides foundational types and utilities used across all
//! qlie-tools crates:
//!
//! - [`BinaryReader`] - Zero-copy little-endian reading from byte slices
//! - [`text`] - Legacy codepage (CP932) to UTF-8 conversion
//! - Shared [`Error`]/[`Result`] types

mod error;
mod reader;

pub mod text;

pub use error::{Error, Result};
pub use reader::BinaryReader;
