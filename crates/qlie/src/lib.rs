//! QLiE game archive extraction library.
//!
//! This crate provides a unified interface to the qlie-tools crates for
//! working with QLiE engine game files.
//!
//! # Crates
//!
//! - [`qlie_common`] - Common utilities (binary reading, CP932 conversion)
//! - [`qlie_pack`] - PACK archive reading (table, ciphers, decompression,
//!   nested ABMP containers)
//!
//! # Example
//!
//! ```no_run
//! use qlie::prelude::*;
//!
//! let archive = PackArchive::open("data0.pack")?;
//! let keys = KeyMaterial::basic();
//!
//! for entry in archive.entries() {
//!     let files = archive.extract_entry(entry, &keys)?;
//!     println!("{}: {} output file(s)", entry.name, files.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use qlie_common as common;
pub use qlie_pack as pack;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use qlie_common::BinaryReader;
    pub use qlie_pack::{
        EncryptionMode, KeyMaterial, OutputFile, PackArchive, PackEntry,
    };
}
