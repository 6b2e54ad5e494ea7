//! Ogg-FLAC muxer: buffers the `fLaC`-marker identification page, then a
//! Vorbis-comment page, then frames raw FLAC frames into data pages until
//! the segment duration is reached.
//!
//! Grounded on `src/muxer_plugin_ogg_flac.c` and the Xiph "Ogg FLAC"
//! mapping document. The padding field supplied at `open` time is folded
//! into the initial granule position as a negative bias and never consulted
//! again (§9): a frame's granule position is always `padding`-corrected
//! decode-sample count, matching how the reference plugin seeds `pts`.

use super::media::{OggFlavor, OggMediaMuxer};
use crate::error::MuxError;
use crate::muxer::{Muxer, MuxerCaps};
use crate::types::{Packet, PacketSource, Segment, SegmentParams, TagList};

pub struct OggFlacMuxer {
    inner: OggMediaMuxer,
}

impl OggFlacMuxer {
    pub fn new() -> Self {
        OggFlacMuxer {
            inner: OggMediaMuxer::new(OggFlavor::Flac),
        }
    }
}

impl Default for OggFlacMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Muxer for OggFlacMuxer {
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
        "oga"
    }

    fn mime_type(&self) -> &'static str {
        "audio/ogg"
    }
}
