//! Error types for the PACK crate.

use thiserror::Error;

/// Errors that can occur when working with PACK archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] qlie_common::Error),

    /// The trailing version magic did not match any known PACK version.
    #[error("not a PACK archive")]
    NotPackArchive,

    /// Version recognized but its table layout is not known.
    #[error("PACK version {0} is not supported")]
    UnsupportedVersion(u32),

    /// The file table is internally inconsistent.
    #[error("invalid file table: {0}")]
    InvalidTable(String),

    /// Compressed data did not start with the expected magic.
    ///
    /// This usually means decryption produced garbage, i.e. the archive
    /// needs key material that was not supplied.
    #[error("unexpected magic in compressed data (wrong or missing key material?)")]
    InvalidCompressionMagic,

    /// Declared decompressed size disagrees with the table entry.
    #[error("size mismatch: declared {declared} bytes, expected {expected}")]
    SizeMismatch { declared: u64, expected: u64 },

    /// Unknown section tag inside a nested container.
    #[error("unknown section tag {0:?}")]
    UnknownSection(String),

    /// Required key material is missing for the selected encryption mode.
    #[error("missing key material: {0}")]
    MissingKeyMaterial(&'static str),

    /// The key signature was not found in the game executable.
    #[error("cannot find the key signature in the executable")]
    KeyNotFound,
}

/// Result type for PACK operations.
pub type Result<T> = std::result::Result<T, Error>;
