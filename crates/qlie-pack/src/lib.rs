//! PACK archive reader for QLiE engine game files.
//!
//! PACK (`FilePackVer3.0`) is the container format used by QLiE visual
//! novels to package game assets. It supports:
//!
//! - A trailing file table with per-entry encrypted names
//! - Two payload ciphers: a seed-only stream cipher and a keyed cipher
//!   parameterized by external key material (`--fkey` / game executable)
//! - A dictionary-tree compression scheme (`1PC\xff` payloads)
//! - Nested ABMP resource containers, unpacked recursively
//!
//! Versions 1 and 2 of the container are recognized but rejected, since
//! their table layout is not publicly known.
//!
//! # Example
//!
//! ```no_run
//! use qlie_pack::{KeyMaterial, PackArchive};
//!
//! let archive = PackArchive::open("data0.pack")?;
//! let keys = KeyMaterial::basic();
//!
//! for entry in archive.entries() {
//!     for file in archive.extract_entry(entry, &keys)? {
//!         println!("{}: {} bytes", file.name, file.data.len());
//!     }
//! }
//! # Ok::<(), qlie_pack::Error>(())
//! ```

mod archive;
mod classify;
mod crypto;
mod decompress;
mod entry;
mod error;
mod keys;
mod mt;

pub use archive::PackArchive;
pub use crypto::EncryptionMode;
pub use entry::{OutputFile, PackEntry};
pub use error::{Error, Result};
pub use keys::KeyMaterial;
