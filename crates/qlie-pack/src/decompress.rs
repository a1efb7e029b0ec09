//! Dictionary-tree decompressor for PACK payloads.
//!
//! Compressed payloads start with a `1PC\xff` magic, a flag word selecting
//! 16- vs 32-bit per-block symbol counts, and the declared output size.
//! Each block then carries a dictionary-update stream followed by symbols.
//!
//! The dictionary is an implicit binary tree over byte values: `leaf[d] == d`
//! marks `d` as a terminal symbol, anything else is an internal node with
//! children `right[d]` and `leaf[d]`. Symbols are unfolded depth-first
//! through a bounded expansion stack.

use qlie_common::BinaryReader;

use crate::{Error, Result};

const MAGIC: &[u8] = b"1PC\xff";

/// Maximum depth of the expansion stack.
const STACK_CAPACITY: usize = 512;

/// Per-block dictionary state, rebuilt for every compressed block.
struct Dictionary {
    leaf: [u8; 256],
    right: [u8; 256],
}

impl Dictionary {
    fn identity() -> Self {
        let mut leaf = [0u8; 256];
        for (d, slot) in leaf.iter_mut().enumerate() {
            *slot = d as u8;
        }
        Self {
            leaf,
            right: [0u8; 256],
        }
    }

    /// Apply the block's incremental override stream.
    ///
    /// A control byte above 0x7F advances the cursor, keeping identity
    /// mappings; otherwise `c + 1` entries are replaced, reading a right
    /// child only for entries that become internal nodes.
    fn apply_updates(&mut self, reader: &mut BinaryReader) -> Result<()> {
        let mut cursor = 0usize;
        while cursor < 256 {
            let control = reader.read_u8()?;
            if control > 0x7F {
                cursor += (control - 0x7F) as usize;
                if cursor >= 256 {
                    break;
                }
                continue;
            }

            for _ in 0..=control {
                if cursor >= 256 {
                    break;
                }
                let value = reader.read_u8()?;
                self.leaf[cursor] = value;
                if value != cursor as u8 {
                    self.right[cursor] = reader.read_u8()?;
                }
                cursor += 1;
            }
        }
        Ok(())
    }
}

/// Decompress a PACK payload.
///
/// `expected_size` is the original size from the file table; a disagreeing
/// declared size is a structural fault. Trailing input past the point where
/// the output fills is valid padding. Garbage input (e.g. an undecrypted
/// payload) surfaces as [`Error::InvalidCompressionMagic`].
pub fn decompress(input: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut reader = BinaryReader::new(input);
    reader
        .expect_magic(MAGIC)
        .map_err(|_| Error::InvalidCompressionMagic)?;

    let short_counts = reader.read_u32()? > 0;
    let declared = reader.read_u32()? as usize;
    if declared != expected_size {
        return Err(Error::SizeMismatch {
            declared: declared as u64,
            expected: expected_size as u64,
        });
    }

    let mut output = Vec::with_capacity(declared);
    if declared == 0 {
        // The buffer starts full; any remaining input is padding.
        return Ok(output);
    }
    let mut stack = [0u8; STACK_CAPACITY];

    while !reader.is_empty() {
        let mut dict = Dictionary::identity();
        dict.apply_updates(&mut reader)?;

        let mut symbols_left = if short_counts {
            reader.read_u16()? as usize
        } else {
            reader.read_u32()? as usize
        };

        let mut depth = 0usize;
        loop {
            let d = if depth > 0 {
                depth -= 1;
                stack[depth] as usize
            } else if symbols_left == 0 {
                break;
            } else {
                symbols_left -= 1;
                reader.read_u8()? as usize
            };

            if dict.leaf[d] as usize == d {
                output.push(d as u8);
                if output.len() >= declared {
                    return Ok(output);
                }
            } else {
                // A saturated stack means a cyclic dictionary; stop rather
                // than loop forever.
                if depth + 2 > STACK_CAPACITY {
                    return Ok(output);
                }
                stack[depth] = dict.right[d];
                stack[depth + 1] = dict.leaf[d];
                depth += 2;
            }
        }
    }

    Ok(output)
}
