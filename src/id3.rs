//! ID3v2.4 tag writer: sync-safe frames, APIC conversion from a FLAC-style
//! picture block, and the `PRIV:com.apple.streaming.transportStreamTimestamp`
//! frame used to carry the 90 kHz PTS preamble.
//!
//! Grounded on `src/id3.c`: frame selection by key prefix (`T*`, `GRP1`,
//! `MVNM`, `MVIN`, `USLT` are text frames; `APIC` converts a FLAC picture
//! block; `PRIV:...` carries an 8-byte big-endian timestamp).

use crate::error::Id3Error;
use crate::types::{PictureBlock, Tag, TagList};

const PRIV_TIMESTAMP_OWNER: &str = "com.apple.streaming.transportStreamTimestamp";

/// Packs `val` into 4 bytes with the MSB of each byte cleared (7 payload
/// bits per byte), so the tag body can never contain an MPEG sync pattern.
pub fn pack_syncsafe_u32(val: u32) -> [u8; 4] {
    [
        ((val >> 21) & 0x7F) as u8,
        ((val >> 14) & 0x7F) as u8,
        ((val >> 7) & 0x7F) as u8,
        (val & 0x7F) as u8,
    ]
}

fn is_text_frame_key(key: &str) -> bool {
    key.starts_with('T') || matches!(key, "GRP1" | "MVNM" | "MVIN" | "USLT")
}

fn encode_text_frame(out: &mut Vec<u8>, tag: &Tag) {
    out.push(0x03); // UTF-8 encoding byte
    if let Some((_, desc)) = tag.key.split_once(':') {
        out.extend_from_slice(desc.as_bytes());
        out.push(0x00);
    }
    out.extend_from_slice(&tag.value);
    out.push(0x00);
}

fn encode_apic_frame(out: &mut Vec<u8>, tag: &Tag) -> Result<(), Id3Error> {
    let pic = PictureBlock::decode(&tag.value)
        .ok_or_else(|| Id3Error::UnsupportedFrame("APIC".into()))?;
    out.push(0x03); // encoding
    out.extend_from_slice(pic.mime_type.as_bytes());
    out.push(0x00);
    out.push(pic.picture_type as u8);
    out.extend_from_slice(pic.description.as_bytes());
    out.push(0x00);
    out.extend_from_slice(&pic.data);
    Ok(())
}

fn encode_priv_timestamp_frame(out: &mut Vec<u8>, pts_90khz: u64) {
    out.extend_from_slice(PRIV_TIMESTAMP_OWNER.as_bytes());
    out.push(0x00);
    // upper 31 bits zero, 33-bit value packed big-endian in 8 bytes
    out.extend_from_slice(&(pts_90khz & 0x1_FFFF_FFFF).to_be_bytes());
}

fn frame_id_for(key: &str) -> [u8; 4] {
    let mut id = [0u8; 4];
    let base = key.split_once(':').map(|(id, _)| id).unwrap_or(key);
    for (i, b) in base.as_bytes().iter().take(4).enumerate() {
        id[i] = *b;
    }
    id
}

fn encode_tag_body(out: &mut Vec<u8>, tag: &Tag) -> Result<(), Id3Error> {
    if is_text_frame_key(&tag.key) {
        encode_text_frame(out, tag);
        return Ok(());
    }
    if tag.key == "APIC" {
        return encode_apic_frame(out, tag);
    }
    if tag.key == format!("PRIV:{PRIV_TIMESTAMP_OWNER}") {
        let pts = crate::bits::unpack_u64be(&tag.value);
        encode_priv_timestamp_frame(out, pts);
        return Ok(());
    }
    Err(Id3Error::UnsupportedFrame(tag.key.clone()))
}

/// Appends one frame (4-byte id, sync-safe size, 2 flag bytes, payload)
/// to `out`.
fn add_frame(out: &mut Vec<u8>, tag: &Tag) -> Result<(), Id3Error> {
    let id = frame_id_for(&tag.key);
    out.extend_from_slice(&id);
    let size_pos = out.len();
    out.extend_from_slice(&[0, 0, 0, 0]); // size placeholder
    out.extend_from_slice(&[0, 0]); // flags
    let body_start = out.len();
    encode_tag_body(out, tag)?;
    let body_len = (out.len() - body_start) as u32;
    out[size_pos..size_pos + 4].copy_from_slice(&pack_syncsafe_u32(body_len));
    Ok(())
}

/// Builds a complete ID3v2.4 tag (header + frames) for an ordinary tag
/// list (text/APIC frames).
pub fn build_tag(tags: &TagList) -> Result<Vec<u8>, Id3Error> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(b"ID3");
    out.push(0x04);
    out.push(0x00);
    out.push(0x00); // flags
    out.extend_from_slice(&[0, 0, 0, 0]); // total size placeholder

    for tag in &tags.tags {
        add_frame(&mut out, tag)?;
    }

    let total = (out.len() - 10) as u32;
    out[6..10].copy_from_slice(&pack_syncsafe_u32(total));
    Ok(out)
}

/// Builds the PTS preamble tag: a single `PRIV` frame carrying the 33-bit
/// timestamp (rescaled to 90 kHz by the caller) big-endian in 8 bytes.
pub fn build_timestamp_tag(pts_90khz: u64) -> Vec<u8> {
    let tag = Tag {
        key: format!("PRIV:{PRIV_TIMESTAMP_OWNER}"),
        value: pts_90khz.to_be_bytes().to_vec(),
        priority: 0,
        order: 0,
    };
    let list = TagList { tags: vec![tag] };
    build_tag(&list).expect("PRIV timestamp frame always encodes")
}
