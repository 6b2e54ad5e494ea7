//! Vorbis-comment block builder, shared by the Ogg-FLAC, Ogg-Opus, and raw
//! FLAC muxers. Grounded on `src/vorbis_mappings.h` and the Xiph Vorbis
//! comment spec: 4-byte little-endian vendor length, vendor string,
//! 4-byte comment count, then per-comment 4-byte LE length + `key=value`
//! UTF-8 bytes.

use crate::types::TagList;

/// A non-standard FLAC channel layout forces chaining mode on by emitting
/// this tag; see §4.8.
pub const WAVEFORMATEXTENSIBLE_TAG_KEY: &str = "WAVEFORMATEXTENSIBLE_CHANNEL_MASK";

pub fn build_comment_block(vendor: &str, tags: &TagList) -> Vec<u8> {
    let mut out = Vec::new();
    crate::bits::pack_u32le(&mut out, vendor.len() as u32);
    out.extend_from_slice(vendor.as_bytes());

    let comments: Vec<Vec<u8>> = tags
        .tags
        .iter()
        .filter(|t| t.key != "APIC")
        .map(|t| {
            let mut c = Vec::with_capacity(t.key.len() + 1 + t.value.len());
            c.extend_from_slice(t.key.as_bytes());
            c.push(b'=');
            c.extend_from_slice(&t.value);
            c
        })
        .collect();

    crate::bits::pack_u32le(&mut out, comments.len() as u32);
    for c in comments {
        crate::bits::pack_u32le(&mut out, c.len() as u32);
        out.extend_from_slice(&c);
    }
    out
}

/// Base64-encodes a FLAC-style picture block for embedding as a
/// `METADATA_BLOCK_PICTURE` Vorbis comment value.
pub fn base64_picture(picture_block: &[u8]) -> String {
    base64::encode(picture_block)
}
