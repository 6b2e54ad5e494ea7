//! Raw FLAC muxer: `fLaC` marker + STREAMINFO (from `dsi`) + a
//! `VORBIS_COMMENT` block, optionally followed by a `PICTURE` block, then
//! concatenated encoded frames.
//!
//! Grounded on `src/muxer_plugin_flac.c`.

use crate::error::{FlacMuxError, MuxError};
use crate::muxer::{Muxer, MuxerCaps};
use crate::types::{Packet, PacketSource, PictureBlock, Segment, SegmentParams, TagList};
use crate::vorbis;

pub struct FlacMuxer {
    source: Option<PacketSource>,
    pending_tags: TagList,
    header_written: bool,
    vendor: String,
    buffer: Vec<u8>,
    segment_pts: u64,
    accumulated_samples: u64,
}

impl FlacMuxer {
    pub fn new() -> Self {
        FlacMuxer {
            source: None,
            pending_tags: TagList::new(),
            header_written: false,
            vendor: format!("hls-coremux v{}", env!("CARGO_PKG_VERSION")),
            buffer: Vec::new(),
            segment_pts: 0,
            accumulated_samples: 0,
        }
    }

    fn write_header(&mut self, source: &PacketSource) -> Result<(), FlacMuxError> {
        if source.dsi.is_empty() {
            return Err(FlacMuxError::MissingStreamInfo);
        }
        self.buffer.extend_from_slice(b"fLaC");

        let picture = self.pending_tags.get("APIC").cloned();
        let comment_is_last = picture.is_none();

        self.buffer.push(0x00); // STREAMINFO, not last (VORBIS_COMMENT follows)
        crate::bits::pack_u24be(&mut self.buffer, source.dsi.len() as u32);
        self.buffer.extend_from_slice(&source.dsi);

        let block = vorbis::build_comment_block(&self.vendor, &self.pending_tags);
        self.buffer.push(if comment_is_last { 0x84 } else { 0x04 });
        crate::bits::pack_u24be(&mut self.buffer, block.len() as u32);
        self.buffer.extend_from_slice(&block);

        if let Some(tag) = picture {
            if let Some(pic) = PictureBlock::decode(&tag.value) {
                let encoded = pic.encode();
                self.buffer.push(0x86); // last-block flag set, type 6 (PICTURE)
                crate::bits::pack_u24be(&mut self.buffer, encoded.len() as u32);
                self.buffer.extend_from_slice(&encoded);
            }
        }

        self.header_written = true;
        Ok(())
    }
}

impl Default for FlacMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Muxer for FlacMuxer {
    fn caps(&self) -> MuxerCaps {
        MuxerCaps::GLOBAL_HEADERS
    }

    fn segment_info(&self, _source: &PacketSource) -> SegmentParams {
        SegmentParams {
            segment_length_ms: 6000,
            sub_segment_length_ms: 0,
        }
    }

    fn open(&mut self, source: PacketSource) -> Result<(), MuxError> {
        self.source = Some(source);
        Ok(())
    }

    fn configure(&mut self, key: &str, _value: &str) -> Result<(), MuxError> {
        crate::config::log_unknown_key("flac", key);
        Ok(())
    }

    fn submit_packet(&mut self, packet: Packet) -> Result<Vec<Segment>, MuxError> {
        let source = self.source.clone().expect("open() called before submit_packet()");
        if !self.header_written {
            self.write_header(&source)?;
            self.segment_pts = packet.pts;
        }
        self.buffer.extend_from_slice(&packet.data);
        self.accumulated_samples += packet.duration as u64;

        let target = (self.segment_info(&source).segment_length_ms as u64 * source.sample_rate as u64) / 1000;
        let mut out = Vec::new();
        if self.accumulated_samples >= target {
            out.push(Segment::media(
                std::mem::take(&mut self.buffer),
                self.segment_pts,
                self.accumulated_samples,
            ));
            self.accumulated_samples = 0;
            self.header_written = false;
        }
        Ok(out)
    }

    fn submit_tags(&mut self, tags: TagList) -> Result<(), MuxError> {
        self.pending_tags = tags;
        Ok(())
    }

    fn flush(&mut self) -> Result<Vec<Segment>, MuxError> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        let samples = self.accumulated_samples;
        self.accumulated_samples = 0;
        self.header_written = false;
        Ok(vec![Segment::media(
            std::mem::take(&mut self.buffer),
            self.segment_pts,
            samples,
        )])
    }

    fn reset(&mut self) -> Result<(), MuxError> {
        let source = self.source.clone();
        *self = FlacMuxer::new();
        if let Some(source) = source {
            self.open(source)?;
        }
        Ok(())
    }

    fn file_ext(&self) -> &'static str {
        "flac"
    }

    fn mime_type(&self) -> &'static str {
        "audio/flac"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{channel, Codec, RollType};

    fn flac_source() -> PacketSource {
        PacketSource {
            codec: Codec::Flac,
            profile: None,
            channel_layout: channel::LAYOUT_STEREO,
            sample_rate: 44100,
            frame_len: 4096,
            bit_rate: 0,
            sync_flag: true,
            padding: 0,
            roll_distance: 0,
            roll_type: RollType::Roll,
            dsi: vec![0x12; 34],
        }
    }

    #[test]
    fn header_begins_with_flac_marker_and_streaminfo() {
        let mut mux = FlacMuxer::new();
        mux.open(flac_source()).unwrap();
        mux.submit_packet(Packet {
            data: vec![0xAA; 8],
            duration: 4096,
            sample_rate: 44100,
            pts: 0,
            sync: true,
            sample_group: 0,
        })
        .unwrap();
        let segs = mux.flush().unwrap();
        let data = &segs[0].data;
        assert_eq!(&data[0..4], b"fLaC");
        assert_eq!(data[4], 0x00);
        let len = crate::bits::unpack_u24be(&data[5..8]);
        assert_eq!(len as usize, 34);
        assert_eq!(&data[8..42], &[0x12u8; 34][..]);
    }

    #[test]
    fn missing_dsi_is_rejected() {
        let mut source = flac_source();
        source.dsi.clear();
        let mut mux = FlacMuxer::new();
        mux.open(source).unwrap();
        let err = mux.submit_packet(Packet {
            data: vec![0u8; 4],
            duration: 4096,
            sample_rate: 44100,
            pts: 0,
            sync: true,
            sample_group: 0,
        });
        assert!(matches!(err, Err(MuxError::Flac(FlacMuxError::MissingStreamInfo))));
    }
}
