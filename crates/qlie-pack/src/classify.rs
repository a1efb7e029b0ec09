//! Recursive classifier for decompressed payloads.
//!
//! PACK entries frequently hold nested resource containers (the ABMP
//! family). Every decoded blob is therefore probed against two grammars in
//! order: ABMP7 (length-prefixed records) and ABMP10/11/12 (tagged
//! sections). On a match the blob is split into sub-blobs which are fed
//! back into the classifier; anything unrecognized, and any blob whose
//! recognized grammar faults mid-parse, is emitted unchanged as a leaf file
//! with a signature-sniffed extension. Faults inside one blob never affect
//! its siblings.

use qlie_common::{text, BinaryReader};

use crate::entry::OutputFile;
use crate::{Error, Result};

/// Signature prefixes used to guess a leaf file's extension.
const EXTENSION_SIGNATURES: &[(&str, &[u8])] = &[
    ("b", b"abmp"),
    ("png", b"\x89PNG"),
    ("bmp", b"BM"),
    ("wav", b"RIFF"),
    ("ogg", b"OggS"),
    ("imoavi", b"IMOAVI"),
    ("jpeg", b"\xff\xd8\xff"),
];

/// Classify a blob, emitting leaf files into `out`.
///
/// Submission order is deterministic: depth-first in record order.
pub fn classify(name: &str, data: Vec<u8>, out: &mut Vec<OutputFile>) {
    if abmp7::recognize(&data) {
        match abmp7::parse(name, &data) {
            Ok(children) => {
                for (child_name, child_data) in children {
                    classify(&child_name, child_data, out);
                }
            }
            Err(_) => emit_leaf(name, data, out),
        }
        return;
    }

    if abmp10::recognize(&data) {
        match abmp10::parse(name, &data) {
            Ok(children) => {
                for (child_name, child_data) in children {
                    classify(&child_name, child_data, out);
                }
            }
            Err(_) => emit_leaf(name, data, out),
        }
        return;
    }

    emit_leaf(name, data, out);
}

fn emit_leaf(name: &str, data: Vec<u8>, out: &mut Vec<OutputFile>) {
    let name = match guess_extension(&data) {
        Some(ext) => change_extension(name, ext),
        None => name.to_string(),
    };
    out.push(OutputFile { name, data });
}

/// Match a leaf blob against the known signature prefixes.
fn guess_extension(data: &[u8]) -> Option<&'static str> {
    EXTENSION_SIGNATURES
        .iter()
        .find(|(_, magic)| data.len() >= magic.len() && &data[..magic.len()] == *magic)
        .map(|(ext, _)| *ext)
}

/// Replace the extension of the final path component, or append one.
fn change_extension(name: &str, ext: &str) -> String {
    let component_start = name
        .rfind(['/', '\\'])
        .map(|pos| pos + 1)
        .unwrap_or(0);
    match name[component_start..].rfind('.') {
        Some(dot) => format!("{}.{}", &name[..component_start + dot], ext),
        None => format!("{name}.{ext}"),
    }
}

/// Grammar A: `ABMP7`, a flat sequence of length-prefixed records.
mod abmp7 {
    use super::*;

    const MAGIC: &[u8] = b"ABMP7";

    pub fn recognize(data: &[u8]) -> bool {
        data.len() >= 12 && data[..MAGIC.len()] == *MAGIC
    }

    pub fn parse(base_name: &str, data: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
        let mut reader = BinaryReader::new(data);
        reader.seek(12);
        let header_len = reader.read_u32()? as usize;
        reader.skip(header_len);

        let mut children = Vec::new();

        // The first record carries no name, only a length.
        let first_len = reader.read_u32()? as usize;
        let first = reader.read_bytes(first_len)?.to_vec();
        children.push((format!("{base_name}$.dat"), first));

        while !reader.is_empty() {
            let name_len = reader.read_u8()? as usize;
            let encoded_name = reader.read_bytes(name_len)?.to_vec();
            let padding = 31usize
                .checked_sub(name_len)
                .ok_or_else(|| Error::InvalidTable("ABMP7 record name too long".into()))?;
            reader.skip(padding);
            let name = text::decode_cp932(&encoded_name);

            let len = reader.read_u32()? as usize;
            let payload = reader.read_bytes(len)?.to_vec();
            children.push((format!("{base_name}_{name}.dat"), payload));
        }

        Ok(children)
    }
}

/// Grammar B: `abmp10`/`abmp11`/`abmp12`, tagged sections holding image and
/// sound record lists.
mod abmp10 {
    use super::*;

    const MAGICS: [&[u8; 16]; 3] = [
        b"abmp10\0\0\0\0\0\0\0\0\0\0",
        b"abmp11\0\0\0\0\0\0\0\0\0\0",
        b"abmp12\0\0\0\0\0\0\0\0\0\0",
    ];

    const TAG_DATA: [&[u8; 16]; 4] = [
        b"abdata10\0\0\0\0\0\0\0\0",
        b"abdata11\0\0\0\0\0\0\0\0",
        b"abdata12\0\0\0\0\0\0\0\0",
        b"abdata13\0\0\0\0\0\0\0\0",
    ];
    const TAG_IMAGE_LIST: &[u8; 16] = b"abimage10\0\0\0\0\0\0\0";
    const TAG_SOUND_LIST: &[u8; 16] = b"absound10\0\0\0\0\0\0\0";

    const TAG_IMGDAT10: &[u8; 16] = b"abimgdat10\0\0\0\0\0\0";
    const TAG_IMGDAT11: &[u8; 16] = b"abimgdat11\0\0\0\0\0\0";
    const TAG_IMGDAT13: &[u8; 16] = b"abimgdat13\0\0\0\0\0\0";
    const TAG_IMGDAT14: &[u8; 16] = b"abimgdat14\0\0\0\0\0\0";
    const TAG_SNDDAT10: &[u8; 16] = b"absnddat10\0\0\0\0\0\0";
    const TAG_SNDDAT11: &[u8; 16] = b"absnddat11\0\0\0\0\0\0";

    pub fn recognize(data: &[u8]) -> bool {
        data.len() >= 16 && MAGICS.iter().any(|m| data[..16] == **m)
    }

    pub fn parse(base_name: &str, data: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
        let mut reader = BinaryReader::new(data);
        reader.seek(16);

        let mut children = Vec::new();
        while !reader.is_empty() {
            let tag: [u8; 16] = reader.read_bytes(16)?.try_into().unwrap();

            if TAG_DATA.iter().any(|t| **t == tag) {
                // Opaque bulk data, not decoded further.
                let len = reader.read_u32()? as usize;
                reader.skip(len);
            } else if tag == *TAG_IMAGE_LIST || tag == *TAG_SOUND_LIST {
                let count = reader.read_u8()?;
                for i in 0..count {
                    let record_base = format!("{base_name}_{i}");
                    match read_record(&mut reader, &record_base)? {
                        Some(child) => children.push(child),
                        // A zero payload length ends the list early. The
                        // reader is left mid-record, so later sections in
                        // the blob fault into the leaf fallback; that is
                        // the intended reading, not a missing skip.
                        None => break,
                    }
                }
            } else {
                return Err(Error::UnknownSection(
                    String::from_utf8_lossy(&tag).trim_end_matches('\0').to_string(),
                ));
            }
        }

        Ok(children)
    }

    fn read_record(
        reader: &mut BinaryReader,
        base_name: &str,
    ) -> Result<Option<(String, Vec<u8>)>> {
        let tag: [u8; 16] = reader.read_bytes(16)?.try_into().unwrap();
        let name_len = reader.read_u16()? as usize;
        let name = text::decode_cp932(reader.read_bytes(name_len)?);

        if tag == *TAG_SNDDAT11
            || tag == *TAG_IMGDAT11
            || tag == *TAG_IMGDAT13
            || tag == *TAG_IMGDAT14
        {
            let skip = reader.read_u16()? as usize;
            reader.skip(skip);
        } else if tag != *TAG_IMGDAT10 && tag != *TAG_SNDDAT10 {
            return Err(Error::UnknownSection(
                String::from_utf8_lossy(&tag).trim_end_matches('\0').to_string(),
            ));
        }

        reader.skip(1);
        if tag == *TAG_IMGDAT14 {
            reader.skip(76);
        } else if tag == *TAG_IMGDAT13 {
            reader.skip(12);
        }

        let len = reader.read_u32()? as usize;
        if len == 0 {
            return Ok(None);
        }

        let payload = reader.read_bytes(len)?.to_vec();
        Ok(Some((format!("{base_name}_{name}.dat"), payload)))
    }
}
