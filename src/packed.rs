//! Packed-audio muxer: a single continuous elementary bitstream (AAC as
//! ADTS, MP3, AC-3, E-AC-3) prefixed by an ID3 PTS preamble and, on tag
//! changes, a second ID3 tag carrying user tags.
//!
//! Grounded on `src/muxer_plugin_packedaudio.c`.

use crate::adts::AdtsMux;
use crate::error::{MuxError, PackedError};
use crate::muxer::{Muxer, MuxerCaps};
use crate::types::{Codec, Packet, PacketSource, Segment, SegmentParams, TagList};

pub struct PackedAudioMuxer {
    source: Option<PacketSource>,
    adts: Option<AdtsMux>,
    pending_tags: Option<TagList>,
    buffer: Vec<u8>,
    segment_pts: Option<u64>,
    accumulated_samples: u64,
    sub_segment_length_ms: u32,
}

impl PackedAudioMuxer {
    pub fn new() -> Self {
        PackedAudioMuxer {
            source: None,
            adts: None,
            pending_tags: None,
            buffer: Vec::new(),
            segment_pts: None,
            accumulated_samples: 0,
            sub_segment_length_ms: 0,
        }
    }

    fn rescale_to_90khz(&self, pts: u64, sample_rate: u32) -> u64 {
        if sample_rate == 0 {
            return 0;
        }
        pts.saturating_mul(90_000) / sample_rate as u64
    }

    fn encode_elementary(&self, payload: &[u8]) -> Result<Vec<u8>, PackedError> {
        match &self.adts {
            Some(mux) => Ok(mux.encode_packet(payload)?),
            // MP3 and (E-)AC-3 packets already carry their own self-framing
            // header, so they pass through unmodified.
            None => Ok(payload.to_vec()),
        }
    }

    /// The sample-count threshold at which the current buffer is closed out
    /// as a segment: the sub-segment length when configured (more frequent,
    /// smaller deliveries), otherwise the full segment length.
    fn flush_threshold(&self, source: &PacketSource) -> u64 {
        let info = self.segment_info(source);
        let target = (info.segment_length_ms as u64 * source.sample_rate as u64) / 1000;
        if info.sub_segment_length_ms > 0 {
            (info.sub_segment_length_ms as u64 * source.sample_rate as u64) / 1000
        } else {
            target
        }
    }
}

impl Default for PackedAudioMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Muxer for PackedAudioMuxer {
    fn caps(&self) -> MuxerCaps {
        MuxerCaps::NONE
    }

    fn segment_info(&self, _source: &PacketSource) -> SegmentParams {
        SegmentParams {
            segment_length_ms: 6000,
            sub_segment_length_ms: self.sub_segment_length_ms,
        }
    }

    fn open(&mut self, source: PacketSource) -> Result<(), MuxError> {
        if source.codec == Codec::Aac {
            self.adts = Some(AdtsMux::open(&source).map_err(PackedError::from)?);
        }
        self.source = Some(source);
        Ok(())
    }

    fn configure(&mut self, key: &str, value: &str) -> Result<(), MuxError> {
        let entry = crate::config::ConfigEntry::new(key, value);
        match key {
            "sub_segment_length_ms" => {
                self.sub_segment_length_ms = entry.as_u32().unwrap_or(0);
                Ok(())
            }
            _ => {
                crate::config::log_unknown_key("packed", key);
                Ok(())
            }
        }
    }

    fn submit_packet(&mut self, packet: Packet) -> Result<Vec<Segment>, MuxError> {
        let source = self.source.clone().expect("open() called before submit_packet()");

        let mut out = Vec::new();
        let threshold = self.flush_threshold(&source);
        if !self.buffer.is_empty() && threshold > 0 && self.accumulated_samples + packet.duration as u64 > threshold {
            let pts = self.segment_pts.unwrap_or(0);
            let samples = self.accumulated_samples;
            self.accumulated_samples = 0;
            self.segment_pts = None;
            out.push(Segment::media(std::mem::take(&mut self.buffer), pts, samples));
        }

        if self.buffer.is_empty() {
            let pts_90khz = self.rescale_to_90khz(packet.pts, packet.sample_rate);
            self.buffer
                .extend_from_slice(&crate::id3::build_timestamp_tag(pts_90khz));
            if let Some(tags) = self.pending_tags.take() {
                if !tags.is_empty() {
                    self.buffer
                        .extend_from_slice(&crate::id3::build_tag(&tags).map_err(PackedError::from)?);
                }
            }
            self.segment_pts = Some(packet.pts);
        }

        let frame = self
            .encode_elementary(&packet.data)
            .map_err(MuxError::from)?;
        self.buffer.extend_from_slice(&frame);
        self.accumulated_samples += packet.duration as u64;
        Ok(out)
    }

    fn submit_tags(&mut self, tags: TagList) -> Result<(), MuxError> {
        self.pending_tags = Some(tags);
        Ok(())
    }

    fn flush(&mut self) -> Result<Vec<Segment>, MuxError> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        let pts = self.segment_pts.unwrap_or(0);
        let samples = self.accumulated_samples;
        self.accumulated_samples = 0;
        self.segment_pts = None;
        Ok(vec![Segment::media(std::mem::take(&mut self.buffer), pts, samples)])
    }

    fn reset(&mut self) -> Result<(), MuxError> {
        let source = self.source.clone();
        *self = PackedAudioMuxer::new();
        if let Some(source) = source {
            self.open(source)?;
        }
        Ok(())
    }

    fn file_ext(&self) -> &'static str {
        "aac"
    }

    fn mime_type(&self) -> &'static str {
        "audio/aac"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{channel, AacProfile, RollType};

    fn aac_source() -> PacketSource {
        PacketSource {
            codec: Codec::Aac,
            profile: Some(AacProfile::Lc),
            channel_layout: channel::LAYOUT_STEREO,
            sample_rate: 48000,
            frame_len: 1024,
            bit_rate: 128000,
            sync_flag: true,
            padding: 0,
            roll_distance: 0,
            roll_type: RollType::Roll,
            dsi: vec![],
        }
    }

    #[test]
    fn first_segment_begins_with_priv_timestamp_frame() {
        let mut mux = PackedAudioMuxer::new();
        mux.open(aac_source()).unwrap();
        mux.submit_packet(Packet {
            data: vec![0x21, 0x00, 0x00, 0x00, 0x00],
            duration: 1024,
            sample_rate: 48000,
            pts: 0,
            sync: true,
            sample_group: 0,
        })
        .unwrap();
        let segs = mux.flush().unwrap();
        assert_eq!(segs.len(), 1);
        let data = &segs[0].data;
        assert_eq!(&data[0..3], b"ID3");
        assert_eq!(&data[10..14], b"PRIV");
        // ADTS sync word follows the ID3 tag. Decode the sync-safe total size.
        let id3_total_len = ((data[6] as usize & 0x7F) << 21)
            | ((data[7] as usize & 0x7F) << 14)
            | ((data[8] as usize & 0x7F) << 7)
            | (data[9] as usize & 0x7F);
        let adts_start = 10 + id3_total_len;
        assert_eq!(data[adts_start], 0xFF);
        assert_eq!(data[adts_start + 1] & 0xF0, 0xF0);
    }

    #[test]
    fn pending_tags_emit_a_second_id3_tag() {
        let mut mux = PackedAudioMuxer::new();
        mux.open(aac_source()).unwrap();
        let mut tags = TagList::new();
        tags.push(crate::types::Tag::text("TIT2", "Track"));
        mux.submit_tags(tags).unwrap();
        mux.submit_packet(Packet {
            data: vec![0x21, 0x00, 0x00, 0x00, 0x00],
            duration: 1024,
            sample_rate: 48000,
            pts: 0,
            sync: true,
            sample_group: 0,
        })
        .unwrap();
        let segs = mux.flush().unwrap();
        let data = &segs[0].data;
        // Two "ID3" occurrences: the PTS preamble and the user tag.
        let count = data.windows(3).filter(|w| *w == b"ID3").count();
        assert_eq!(count, 2);
    }

    #[test]
    fn sub_segment_length_closes_buffer_before_it_overflows() {
        let mut mux = PackedAudioMuxer::new();
        mux.open(aac_source()).unwrap();
        mux.configure("sub_segment_length_ms", "20").unwrap();

        let pkt = |pts: u64| Packet {
            data: vec![0x21, 0x00, 0x00, 0x00, 0x00],
            duration: 1024,
            sample_rate: 48000,
            pts,
            sync: true,
            sample_group: 0,
        };

        let first = mux.submit_packet(pkt(0)).unwrap();
        assert!(first.is_empty());
        let second = mux.submit_packet(pkt(1024)).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].samples, 1024);

        let tail = mux.flush().unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].samples, 1024);
    }

    #[test]
    fn mp3_packets_pass_through_unmodified() {
        let mut source = aac_source();
        source.codec = Codec::Mp3;
        let mut mux = PackedAudioMuxer::new();
        mux.open(source).unwrap();
        let mp3_frame = vec![0xFF, 0xFB, 0x90, 0x00];
        mux.submit_packet(Packet {
            data: mp3_frame.clone(),
            duration: 1152,
            sample_rate: 48000,
            pts: 0,
            sync: true,
            sample_group: 0,
        })
        .unwrap();
        let segs = mux.flush().unwrap();
        assert!(segs[0].data.windows(4).any(|w| w == mp3_frame.as_slice()));
    }
}
