//! The shared data model: [`Packet`]/[`PacketSource`] upstream, and
//! [`Segment`] downstream. Every muxer in this crate speaks these types;
//! see §3 of the design spec.

/// Bitmask positions for `PacketSource::channel_layout`. Only the layouts
/// the ADTS and fMP4 writers need to recognise are named; higher layers
/// may combine any subset of these bits.
pub mod channel {
    pub const FRONT_LEFT: u64 = 1 << 0;
    pub const FRONT_RIGHT: u64 = 1 << 1;
    pub const FRONT_CENTER: u64 = 1 << 2;
    pub const LOW_FREQUENCY: u64 = 1 << 3;
    pub const BACK_LEFT: u64 = 1 << 4;
    pub const BACK_RIGHT: u64 = 1 << 5;
    pub const FRONT_LEFT_OF_CENTER: u64 = 1 << 6;
    pub const FRONT_RIGHT_OF_CENTER: u64 = 1 << 7;
    pub const BACK_CENTER: u64 = 1 << 8;
    pub const SIDE_LEFT: u64 = 1 << 9;
    pub const SIDE_RIGHT: u64 = 1 << 10;

    pub const LAYOUT_MONO: u64 = FRONT_CENTER;
    pub const LAYOUT_STEREO: u64 = FRONT_LEFT | FRONT_RIGHT;
    pub const LAYOUT_3_0: u64 = FRONT_LEFT | FRONT_RIGHT | FRONT_CENTER;
    pub const LAYOUT_4_0: u64 = FRONT_LEFT | FRONT_RIGHT | FRONT_CENTER | BACK_CENTER;
    pub const LAYOUT_5_0: u64 = FRONT_LEFT | FRONT_RIGHT | FRONT_CENTER | BACK_LEFT | BACK_RIGHT;
    pub const LAYOUT_5_1: u64 = LAYOUT_5_0 | LOW_FREQUENCY;
    pub const LAYOUT_7_1: u64 = LAYOUT_5_1 | SIDE_LEFT | SIDE_RIGHT;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Codec {
    Unknown,
    Aac,
    Alac,
    Flac,
    Opus,
    Mp3,
    Ac3,
    Eac3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AacProfile {
    Lc,
    He,
    HeV2,
    Usac,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RollType {
    Roll,
    Prol,
}

/// Description of the elementary stream, sent once via `Muxer::open`
/// before any packet.
#[derive(Clone, Debug)]
pub struct PacketSource {
    pub codec: Codec,
    pub profile: Option<AacProfile>,
    pub channel_layout: u64,
    pub sample_rate: u32,
    /// Samples per packet when fixed, 0 otherwise.
    pub frame_len: u32,
    pub bit_rate: u32,
    /// True iff every packet is independently decodable.
    pub sync_flag: bool,
    /// Encoder pre-roll, in samples.
    pub padding: u32,
    /// Signed frame count to discard on seek.
    pub roll_distance: i16,
    pub roll_type: RollType,
    /// Opaque decoder-specific init, codec-dependent (AudioSpecificConfig,
    /// FLAC STREAMINFO, OpusHead, ...).
    pub dsi: Vec<u8>,
}

impl PacketSource {
    pub fn channel_count(&self) -> u32 {
        self.channel_layout.count_ones()
    }
}

/// One compressed audio unit.
#[derive(Clone, Debug)]
pub struct Packet {
    pub data: Vec<u8>,
    pub duration: u32,
    pub sample_rate: u32,
    pub pts: u64,
    /// True if this packet is an independent decodable starting point.
    pub sync: bool,
    pub sample_group: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    Init,
    Media,
}

/// A typed byte blob produced by a muxer.
#[derive(Clone, Debug)]
pub struct Segment {
    pub kind: SegmentKind,
    pub data: Vec<u8>,
    pub pts: u64,
    pub samples: u64,
}

impl Segment {
    pub fn init(data: Vec<u8>) -> Self {
        Segment {
            kind: SegmentKind::Init,
            data,
            pts: 0,
            samples: 0,
        }
    }

    pub fn media(data: Vec<u8>, pts: u64, samples: u64) -> Self {
        Segment {
            kind: SegmentKind::Media,
            data,
            pts,
            samples,
        }
    }
}

/// Downstream tells upstream the target segment length, in milliseconds,
/// and optionally a sub-segment length for partial-segment delivery.
#[derive(Copy, Clone, Debug)]
pub struct SegmentParams {
    pub segment_length_ms: u32,
    pub sub_segment_length_ms: u32,
}

/// One (key, value, priority, order) tuple. A tag with key `"APIC"` carries
/// a FLAC-style picture descriptor.
#[derive(Clone, Debug)]
pub struct Tag {
    pub key: String,
    pub value: Vec<u8>,
    pub priority: u32,
    pub order: u32,
}

impl Tag {
    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        Tag {
            key: key.into(),
            value: value.into().into_bytes(),
            priority: 0,
            order: 0,
        }
    }
}

/// Ordered sequence of tags.
#[derive(Clone, Debug, Default)]
pub struct TagList {
    pub tags: Vec<Tag>,
}

impl TagList {
    pub fn new() -> Self {
        TagList::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn push(&mut self, tag: Tag) {
        self.tags.push(tag);
    }

    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.key == key)
    }
}

/// A FLAC-style picture block, as carried by a `TagList` entry whose key
/// is `"APIC"`. Layout: picture type u32be, mime-length u32be, mime,
/// description-length u32be, description, width/height/depth/colors
/// u32be x4, data-length u32be, data.
#[derive(Clone, Debug)]
pub struct PictureBlock {
    pub picture_type: u32,
    pub mime_type: String,
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub colors: u32,
    pub data: Vec<u8>,
}

impl PictureBlock {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + self.mime_type.len() + self.description.len() + self.data.len());
        crate::bits::pack_u32be(&mut out, self.picture_type);
        crate::bits::pack_u32be(&mut out, self.mime_type.len() as u32);
        out.extend_from_slice(self.mime_type.as_bytes());
        crate::bits::pack_u32be(&mut out, self.description.len() as u32);
        out.extend_from_slice(self.description.as_bytes());
        crate::bits::pack_u32be(&mut out, self.width);
        crate::bits::pack_u32be(&mut out, self.height);
        crate::bits::pack_u32be(&mut out, self.depth);
        crate::bits::pack_u32be(&mut out, self.colors);
        crate::bits::pack_u32be(&mut out, self.data.len() as u32);
        out.extend_from_slice(&self.data);
        out
    }

    pub fn decode(b: &[u8]) -> Option<Self> {
        if b.len() < 32 {
            return None;
        }
        let picture_type = crate::bits::unpack_u32be(&b[0..4]);
        let mime_len = crate::bits::unpack_u32be(&b[4..8]) as usize;
        let mut pos = 8;
        let mime_type = String::from_utf8_lossy(b.get(pos..pos + mime_len)?).to_string();
        pos += mime_len;
        let desc_len = crate::bits::unpack_u32be(b.get(pos..pos + 4)?) as usize;
        pos += 4;
        let description = String::from_utf8_lossy(b.get(pos..pos + desc_len)?).to_string();
        pos += desc_len;
        let width = crate::bits::unpack_u32be(b.get(pos..pos + 4)?);
        pos += 4;
        let height = crate::bits::unpack_u32be(b.get(pos..pos + 4)?);
        pos += 4;
        let depth = crate::bits::unpack_u32be(b.get(pos..pos + 4)?);
        pos += 4;
        let colors = crate::bits::unpack_u32be(b.get(pos..pos + 4)?);
        pos += 4;
        let data_len = crate::bits::unpack_u32be(b.get(pos..pos + 4)?) as usize;
        pos += 4;
        let data = b.get(pos..pos + data_len)?.to_vec();
        Some(PictureBlock {
            picture_type,
            mime_type,
            description,
            width,
            height,
            depth,
            colors,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picture_block_roundtrips() {
        let pic = PictureBlock {
            picture_type: 3,
            mime_type: "image/jpeg".into(),
            description: "cover".into(),
            width: 500,
            height: 500,
            depth: 24,
            colors: 0,
            data: vec![1, 2, 3, 4],
        };
        let encoded = pic.encode();
        let decoded = PictureBlock::decode(&encoded).unwrap();
        assert_eq!(decoded.picture_type, 3);
        assert_eq!(decoded.mime_type, "image/jpeg");
        assert_eq!(decoded.data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn channel_count_matches_popcount() {
        let src = PacketSource {
            codec: Codec::Aac,
            profile: Some(AacProfile::Lc),
            channel_layout: channel::LAYOUT_5_1,
            sample_rate: 48000,
            frame_len: 1024,
            bit_rate: 128000,
            sync_flag: true,
            padding: 0,
            roll_distance: 0,
            roll_type: RollType::Roll,
            dsi: vec![],
        };
        assert_eq!(src.channel_count(), 6);
    }
}
