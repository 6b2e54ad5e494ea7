//! Ogg-Opus muxer: buffers an `OpusHead` page, then a `OpusTags`
//! (Vorbis-comment) page, then frames encoded Opus packets into data
//! pages until the segment duration is reached.
//!
//! Grounded on `src/muxer_plugin_ogg_opus.c`, RFC 7845 (header/tags
//! layout), and RFC 6716 (the packet TOC byte used for the granule-position
//! lookback in §9).

use super::media::{OggFlavor, OggMediaMuxer};
use crate::error::MuxError;
use crate::muxer::{Muxer, MuxerCaps};
use crate::types::{Packet, PacketSource, Segment, SegmentParams, TagList};

pub struct OggOpusMuxer {
    inner: OggMediaMuxer,
}

impl OggOpusMuxer {
    pub fn new() -> Self {
        OggOpusMuxer {
            inner: OggMediaMuxer::new(OggFlavor::Opus),
        }
    }

    /// Given the first page's granule position and the raw packets that
    /// make up that page, computes the granule offset so subsequent PTS
    /// reporting matches the real stream position (§9 granule-position
    /// lookback).
    pub fn granule_lookback(page_granulepos: u64, packets: &[&[u8]]) -> u64 {
        let total: u64 = packets.iter().map(|p| opus_packet_duration(p)).sum();
        page_granulepos.saturating_sub(total)
    }
}

impl Default for OggOpusMuxer {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes the Opus TOC byte's config + frame-count fields into a total
/// packet duration in 48 kHz samples.
fn opus_packet_duration(packet: &[u8]) -> u64 {
    if packet.is_empty() {
        return 0;
    }
    let toc = packet[0];
    let config = toc >> 3;
    let frame_count_code = toc & 0x03;

    // Duration-per-frame table indexed by the 5-bit config field, in
    // 48 kHz samples (RFC 6716 §3.1).
    const DURATIONS: [u64; 32] = [
        480, 960, 1920, 2880, // SILK NB
        480, 960, 1920, 2880, // SILK MB
        480, 960, 1920, 2880, // SILK WB
        480, 960, // Hybrid SWB
        480, 960, // Hybrid FB
        120, 240, 480, 960, // CELT NB
        120, 240, 480, 960, // CELT WB
        120, 240, 480, 960, // CELT SWB
        120, 240, 480, 960, // CELT FB
    ];
    let per_frame = DURATIONS[config as usize & 0x1F];

    let frames = match frame_count_code {
        0 => 1,
        1 | 2 => 2,
        _ => {
            if packet.len() > 1 {
                (packet[1] & 0x3F) as u64
            } else {
                0
            }
        }
    };
    per_frame * frames
}

impl Muxer for OggOpusMuxer {
    fn caps(&self) -> MuxerCaps {
        MuxerCaps::GLOBAL_HEADERS | MuxerCaps::TAGS_RESET
    }

    fn segment_info(&self, source: &PacketSource) -> SegmentParams {
        self.inner.segment_info(source)
    }

    fn open(&mut self, source: PacketSource) -> Result<(), MuxError> {
        self.inner.open(source)
    }

    fn configure(&mut self, key: &str, value: &str) -> Result<(), MuxError> {
        self.inner.configure(key, value)
    }

    fn submit_packet(&mut self, packet: Packet) -> Result<Vec<Segment>, MuxError> {
        self.inner.submit_packet(packet)
    }

    fn submit_tags(&mut self, tags: TagList) -> Result<(), MuxError> {
        self.inner.submit_tags(tags)
    }

    fn flush(&mut self) -> Result<Vec<Segment>, MuxError> {
        self.inner.flush()
    }

    fn reset(&mut self) -> Result<(), MuxError> {
        self.inner.reset()
    }

    fn file_ext(&self) -> &'static str {
        "ogg"
    }

    fn mime_type(&self) -> &'static str {
        "application/ogg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silk_nb_20ms_frame_duration() {
        // config 3 = SILK NB 20ms, frame count code 0 (single frame)
        let toc = 3 << 3;
        assert_eq!(opus_packet_duration(&[toc]), 960);
    }

    #[test]
    fn celt_fb_2_5ms_single_frame() {
        let toc = 28 << 3; // CELT FB 2.5ms
        assert_eq!(opus_packet_duration(&[toc]), 120);
    }
}
