//! MPEG-TS multiplexer: 188-byte packets carrying PAT/PMT sections, one
//! audio PES stream, and optionally an ID3 timed-metadata stream.
//!
//! Grounded on `src/ts.c`: bit layouts, PCR/PTS offset constants, and the
//! PES packetization loop are all taken directly from that file.

use crate::adts::AdtsMux;
use crate::error::{MuxError, TsError};
use crate::muxer::{Muxer, MuxerCaps};
use crate::types::{Codec, Packet, PacketSource, Segment, SegmentParams, TagList};

const PACKET_SIZE: usize = 188;
const HEADER_SIZE: usize = 4;
const MAX_PAYLOAD: usize = PACKET_SIZE - HEADER_SIZE;
const PAT_PID: u16 = 0x0000;
const PMT_PID: u16 = 0x1000;
const AUDIO_PID: u16 = 0x0100;
const ID3_PID: u16 = 0x0101;

fn ts_header(pid: u16, pusi: bool, adapt: u8, cc: u8) -> [u8; HEADER_SIZE] {
    let mut buf = Vec::with_capacity(HEADER_SIZE);
    let mut bw = crate::bits::BitWriter::new(&mut buf);
    bw.add(8, 0x47).unwrap();
    bw.add(1, 0).unwrap(); // transport error indicator
    bw.add(1, pusi as u64).unwrap();
    bw.add(1, 0).unwrap(); // priority
    bw.add(13, pid as u64).unwrap();
    bw.add(2, 0).unwrap(); // scrambling control
    bw.add(2, adapt as u64).unwrap();
    bw.add(4, cc as u64).unwrap();
    bw.align();
    let mut out = [0u8; HEADER_SIZE];
    out.copy_from_slice(&buf);
    out
}

fn adaptation_field(pcr_base: Option<u64>, stuffing: usize) -> Vec<u8> {
    let mut body_len = 1usize; // flags byte
    if pcr_base.is_some() {
        body_len += 6;
    }
    body_len += stuffing;

    let mut buf = Vec::with_capacity(1 + body_len);
    let mut bw = crate::bits::BitWriter::new(&mut buf);
    bw.add(8, body_len as u64).unwrap();
    bw.add(1, 0).unwrap(); // discontinuity
    bw.add(1, 0).unwrap(); // random access
    bw.add(1, 0).unwrap(); // es priority
    bw.add(1, pcr_base.is_some() as u64).unwrap();
    bw.add(1, 0).unwrap(); // opcr flag
    bw.add(1, 0).unwrap(); // splicing point flag
    bw.add(1, 0).unwrap(); // transport private data flag
    bw.add(1, 0).unwrap(); // adaptation field extension flag
    if let Some(base) = pcr_base {
        bw.add(33, base).unwrap();
        bw.add(6, 0x3f).unwrap();
        bw.add(9, 0).unwrap(); // PCR extension
    }
    for _ in 0..stuffing {
        bw.add(8, 0xff).unwrap();
    }
    bw.align();
    buf
}

fn pes_header(stream_id: u8, payload_len: usize, pts_90khz: u64, stuffing: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(14 + stuffing);
    out.extend_from_slice(&[0x00, 0x00, 0x01]);
    out.push(stream_id);
    let packet_length = (payload_len + 8 + stuffing) as u16;
    out.extend_from_slice(&packet_length.to_be_bytes());
    out.push(0x80);
    out.push(0x80);
    out.push((5 + stuffing) as u8);
    out.push(0x21 | ((pts_90khz >> 29) & 0x0f) as u8);
    out.push(((pts_90khz >> 22) & 0xff) as u8);
    out.push(0x01 | ((pts_90khz >> 14) & 0xff) as u8);
    out.push(((pts_90khz >> 7) & 0xff) as u8);
    out.push(0x01 | (((pts_90khz & 0xff) << 1) & 0xff) as u8);
    for _ in 0..stuffing {
        out.push(0xff);
    }
    out
}

/// Packetizes one PES (header + payload) into a sequence of 188-byte TS
/// packets, advancing `cc` per packet and setting the PCR flag on the
/// first packet.
fn encode_pes(pid: u16, stream_id: u8, pts_90khz: u64, payload: &[u8], pcr_base: Option<u64>, cc: &mut u8) -> Vec<u8> {
    let mut out = Vec::new();
    let mut rem = payload;

    let mut max = MAX_PAYLOAD - 14;
    let pcr_this_packet = pcr_base;
    if pcr_this_packet.is_some() {
        max -= 8;
    }
    let stuffing = if rem.len() < max { max - rem.len() } else { 0 };
    let header = pes_header(stream_id, payload.len(), pts_90khz, stuffing);

    let adapt_code: u8 = if pcr_this_packet.is_some() { 0x03 } else { 0x01 };
    out.extend_from_slice(&ts_header(pid, true, adapt_code, *cc));
    if adapt_code == 0x03 {
        out.extend_from_slice(&adaptation_field(pcr_this_packet, 0));
    }
    out.extend_from_slice(&header);
    let take = rem.len().min(max);
    out.extend_from_slice(&rem[..take]);
    rem = &rem[take..];
    *cc = (*cc + 1) & 0x0f;

    while !rem.is_empty() {
        let mut chunk_max = MAX_PAYLOAD;
        let mut need_adapt = false;
        let mut stuffing = 0usize;
        if rem.len() < chunk_max {
            need_adapt = true;
            chunk_max -= 2;
            if rem.len() < chunk_max {
                stuffing = chunk_max - rem.len();
            }
        }
        let take = rem.len().min(chunk_max);
        let adapt_code: u8 = if need_adapt { 0x03 } else { 0x01 };
        out.extend_from_slice(&ts_header(pid, false, adapt_code, *cc));
        if need_adapt {
            out.extend_from_slice(&adaptation_field(None, stuffing));
        }
        out.extend_from_slice(&rem[..take]);
        rem = &rem[take..];
        *cc = (*cc + 1) & 0x0f;
    }

    out
}

fn pat_packet(pmt_pid: u16) -> [u8; PACKET_SIZE] {
    let mut section = Vec::with_capacity(184);
    let mut bw = crate::bits::BitWriter::new(&mut section);
    bw.add(8, 0x00).unwrap(); // pointer field
    bw.add(8, 0x00).unwrap(); // table id
    bw.add(1, 1).unwrap(); // section_syntax_indicator
    bw.add(1, 0).unwrap();
    bw.add(2, 0x03).unwrap(); // reserved
    bw.add(12, 13).unwrap(); // section length
    bw.add(16, 0x0001).unwrap(); // transport_stream_id
    bw.add(2, 0x03).unwrap(); // reserved
    bw.add(5, 0).unwrap(); // version
    bw.add(1, 1).unwrap(); // current_next
    bw.add(8, 0).unwrap(); // section number
    bw.add(8, 0).unwrap(); // last section number
    bw.add(16, 0x0001).unwrap(); // program number
    bw.add(3, 0x07).unwrap(); // reserved
    bw.add(13, pmt_pid as u64).unwrap();
    bw.align();

    let crc = crate::crc::crc32_ts(&section[1..13]);
    section.extend_from_slice(&crc.to_be_bytes());
    section.resize(184, 0xff);

    let mut packet = [0u8; PACKET_SIZE];
    packet[0..HEADER_SIZE].copy_from_slice(&ts_header(PAT_PID, true, 0x01, 0));
    packet[HEADER_SIZE..].copy_from_slice(&section);
    packet
}

fn pmt_packet(codec: Codec, audio_pid: u16, id3_pid: Option<u16>) -> Result<[u8; PACKET_SIZE], TsError> {
    let stream_type: u8 = match codec {
        Codec::Mp3 => 0x03,
        Codec::Aac => 0x0f,
        Codec::Ac3 => 0x81,
        Codec::Eac3 => 0x87,
        Codec::Opus => 0x06,
        other => return Err(TsError::InvalidCodec(other)),
    };
    let es_info_len: u16 = match codec {
        Codec::Ac3 | Codec::Eac3 | Codec::Opus => 6,
        _ => 0,
    };
    let mut section_length: u16 = 13 + es_info_len;
    if id3_pid.is_some() {
        section_length += 37;
    }

    let mut section = Vec::with_capacity(184);
    let mut bw = crate::bits::BitWriter::new(&mut section);
    bw.add(8, 0x00).unwrap(); // pointer field
    bw.add(8, 0x02).unwrap(); // table id
    bw.add(1, 1).unwrap();
    bw.add(1, 0).unwrap();
    bw.add(2, 0x03).unwrap();
    bw.add(12, section_length as u64).unwrap();
    bw.add(16, 0x0001).unwrap(); // program number
    bw.add(2, 0x03).unwrap();
    bw.add(5, 0).unwrap();
    bw.add(1, 1).unwrap();
    bw.add(8, 0).unwrap();
    bw.add(8, 0).unwrap();
    bw.add(3, 0x07).unwrap();
    bw.add(13, audio_pid as u64).unwrap();
    bw.add(4, 0x0f).unwrap();
    bw.add(12, if id3_pid.is_some() { 17 } else { 0 }).unwrap();

    if id3_pid.is_some() {
        bw.add(8, 0x25).unwrap();
        bw.add(8, 15).unwrap();
        bw.add(16, 0xffff).unwrap();
        bw.add(32, 0x4944_3320).unwrap(); // "ID3 "
        bw.add(8, 0xff).unwrap();
        bw.add(32, 0x4944_3320).unwrap();
        bw.add(8, 0).unwrap();
        bw.add(1, 0).unwrap();
        bw.add(2, 0).unwrap();
        bw.add(5, 0x1f).unwrap();
        bw.add(16, 0x0001).unwrap();
    }

    bw.add(8, stream_type as u64).unwrap();
    bw.add(3, 0x07).unwrap();
    bw.add(13, audio_pid as u64).unwrap();
    bw.add(4, 0x0f).unwrap();
    bw.add(12, es_info_len as u64).unwrap();
    match codec {
        Codec::Ac3 => {
            bw.add(8, 0x05).unwrap();
            bw.add(8, 4).unwrap();
            bw.add(32, 0x4143_2d33).unwrap(); // "AC-3"
        }
        Codec::Eac3 => {
            bw.add(8, 0x05).unwrap();
            bw.add(8, 4).unwrap();
            bw.add(32, 0x4541_4333).unwrap(); // "EAC3"
        }
        Codec::Opus => {
            // HLS/Apple carriage: registration descriptor, format identifier "Opus".
            bw.add(8, 0x05).unwrap();
            bw.add(8, 4).unwrap();
            bw.add(32, 0x4F70_7573).unwrap(); // "Opus"
        }
        _ => {}
    }

    if let Some(id3_pid) = id3_pid {
        bw.add(8, 0x15).unwrap();
        bw.add(3, 0x07).unwrap();
        bw.add(13, id3_pid as u64).unwrap();
        bw.add(4, 0x0f).unwrap();
        bw.add(12, 15).unwrap();
        bw.add(8, 0x26).unwrap();
        bw.add(8, 13).unwrap();
        bw.add(16, 0xffff).unwrap();
        bw.add(32, 0x4944_3320).unwrap();
        bw.add(8, 0xff).unwrap();
        bw.add(32, 0x4944_3320).unwrap();
        bw.add(8, 0).unwrap();
        bw.add(3, 0).unwrap();
        bw.add(1, 0).unwrap();
        bw.add(4, 0x0f).unwrap();
    }
    bw.align();

    let crc = crate::crc::crc32_ts(&section[1..1 + section_length as usize - 1]);
    section.extend_from_slice(&crc.to_be_bytes());
    section.resize(184, 0xff);

    let mut packet = [0u8; PACKET_SIZE];
    packet[0..HEADER_SIZE].copy_from_slice(&ts_header(PMT_PID, true, 0x01, 0));
    packet[HEADER_SIZE..].copy_from_slice(&section);
    Ok(packet)
}

/// Wraps an Opus packet with the two-byte TS access-unit header, a
/// unary-coded length prefix, and (on the first packet of the stream) a
/// 16-bit start-trim count.
fn opus_ts_payload(packet: &[u8], pre_skip: u32, is_first: bool) -> Vec<u8> {
    let trim = is_first && pre_skip != 0;
    let mut out = Vec::with_capacity(packet.len() + 4);
    out.push(0x7F);
    out.push(0xE0 | if trim { 0x10 } else { 0x00 });
    let mut len = packet.len();
    while len >= 255 {
        out.push(0xff);
        len -= 255;
    }
    out.push(len as u8);
    out.extend_from_slice(packet);
    if trim {
        out.extend_from_slice(&(pre_skip as u16).to_be_bytes());
    }
    out
}

pub struct TsMux {
    source: Option<PacketSource>,
    adts: Option<AdtsMux>,
    audio_stream_id: u8,
    cc_pat: u8,
    cc_pmt: u8,
    cc_audio: u8,
    cc_id3: u8,
    id3_enabled: bool,
    pending_tags: Option<TagList>,
    first_packet: bool,
    buffer: Vec<u8>,
    segment_pts: u64,
    accumulated_samples: u64,
}

impl TsMux {
    pub fn new() -> Self {
        TsMux {
            source: None,
            adts: None,
            audio_stream_id: 0xC0,
            cc_pat: 0,
            cc_pmt: 0,
            cc_audio: 0,
            cc_id3: 0,
            id3_enabled: false,
            pending_tags: None,
            first_packet: true,
            buffer: Vec::new(),
            segment_pts: 0,
            accumulated_samples: 0,
        }
    }

    fn rescale_to_90khz(&self, pts: u64, sample_rate: u32) -> u64 {
        if sample_rate == 0 {
            return 0;
        }
        pts.saturating_mul(90_000) / sample_rate as u64
    }

    fn emit_pat_pmt(&mut self, out: &mut Vec<u8>, codec: Codec) -> Result<(), TsError> {
        out.extend_from_slice(&pat_packet(PMT_PID));
        let id3_pid = self.id3_enabled.then_some(ID3_PID);
        out.extend_from_slice(&pmt_packet(codec, AUDIO_PID, id3_pid)?);
        self.cc_pat = (self.cc_pat + 1) & 0x0f;
        self.cc_pmt = (self.cc_pmt + 1) & 0x0f;
        Ok(())
    }

    fn emit_id3_if_pending(&mut self, out: &mut Vec<u8>, next_pts_90khz: u64) -> Result<(), MuxError> {
        if let Some(tags) = self.pending_tags.take() {
            if !tags.is_empty() {
                let tag = crate::id3::build_tag(&tags)?;
                let packets = encode_pes(ID3_PID, 0xBD, next_pts_90khz, &tag, None, &mut self.cc_id3);
                out.extend_from_slice(&packets);
            }
        }
        Ok(())
    }
}

impl Default for TsMux {
    fn default() -> Self {
        Self::new()
    }
}

impl Muxer for TsMux {
    fn caps(&self) -> MuxerCaps {
        MuxerCaps::NONE
    }

    fn segment_info(&self, _source: &PacketSource) -> SegmentParams {
        SegmentParams {
            segment_length_ms: 6000,
            sub_segment_length_ms: 0,
        }
    }

    fn open(&mut self, source: PacketSource) -> Result<(), MuxError> {
        self.audio_stream_id = match source.codec {
            Codec::Aac | Codec::Mp3 => 0xC0,
            Codec::Ac3 | Codec::Eac3 | Codec::Opus => 0xBD,
            other => return Err(MuxError::Ts(TsError::InvalidCodec(other))),
        };
        if source.codec == Codec::Aac {
            self.adts = Some(AdtsMux::open(&source)?);
        }
        self.source = Some(source);
        Ok(())
    }

    fn configure(&mut self, key: &str, value: &str) -> Result<(), MuxError> {
        let entry = crate::config::ConfigEntry::new(key, value);
        match key {
            "id3" => {
                self.id3_enabled = entry.as_bool();
                Ok(())
            }
            _ => {
                crate::config::log_unknown_key("ts", key);
                Ok(())
            }
        }
    }

    fn submit_packet(&mut self, packet: Packet) -> Result<Vec<Segment>, MuxError> {
        let source = self.source.clone().expect("open() called before submit_packet()");

        let elementary = match self.adts.as_ref() {
            Some(mux) => mux.encode_packet(&packet.data)?,
            None if source.codec == Codec::Opus => {
                opus_ts_payload(&packet.data, source.padding, self.first_packet)
            }
            None => packet.data.clone(),
        };

        if self.buffer.is_empty() {
            self.segment_pts = packet.pts;
        }

        let mut pat_pmt = Vec::new();
        self.emit_pat_pmt(&mut pat_pmt, source.codec)?;
        self.buffer.extend_from_slice(&pat_pmt);

        let pts_90khz = self.rescale_to_90khz(packet.pts, packet.sample_rate);
        let mut id3_bytes = Vec::new();
        self.emit_id3_if_pending(&mut id3_bytes, pts_90khz)?;
        self.buffer.extend_from_slice(&id3_bytes);

        let pes_pts = pts_90khz + 126_000;
        let pcr_base = pts_90khz + 63_000;
        let pes = encode_pes(
            AUDIO_PID,
            self.audio_stream_id,
            pes_pts,
            &elementary,
            Some(pcr_base),
            &mut self.cc_audio,
        );
        self.buffer.extend_from_slice(&pes);

        self.first_packet = false;
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
        }
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
        let samples = self.accumulated_samples;
        self.accumulated_samples = 0;
        Ok(vec![Segment::media(std::mem::take(&mut self.buffer), self.segment_pts, samples)])
    }

    fn reset(&mut self) -> Result<(), MuxError> {
        let source = self.source.clone();
        *self = TsMux::new();
        if let Some(source) = source {
            self.open(source)?;
        }
        Ok(())
    }

    fn file_ext(&self) -> &'static str {
        "ts"
    }

    fn mime_type(&self) -> &'static str {
        "video/mp2t"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pat_matches_seed_vector_prefix() {
        let packet = pat_packet(PMT_PID);
        assert_eq!(&packet[0..4], &[0x47, 0x40, 0x00, 0x10]);
        assert_eq!(packet[4], 0x00); // pointer field
        assert_eq!(packet[5], 0x00); // table id
        assert_eq!(&packet[6..8], &[0xB0, 0x0D]);
        assert_eq!(&packet[8..10], &[0x00, 0x01]); // transport_stream_id
        assert_eq!(packet[10], 0xC1); // reserved+version+current_next
        assert_eq!(&packet[11..13], &[0x00, 0x00]); // section/last section number
        assert_eq!(&packet[13..15], &[0x00, 0x01]); // program number
        // reserved (0b111) + PMT PID 0x1000, matching muxer_plugin_ts.c's
        // hard-coded PAT program_map_pid.
        assert_eq!(&packet[15..17], &[0xF0, 0x00]);

        let crc = crate::crc::crc32_ts(&packet[5..17]);
        assert_eq!(&packet[17..21], &crc.to_be_bytes());
    }

    #[test]
    fn continuity_counter_wraps_at_sixteen() {
        let mut cc = 15u8;
        cc = (cc + 1) & 0x0f;
        assert_eq!(cc, 0);
    }

    #[test]
    fn pmt_rejects_non_audio_codec() {
        assert!(matches!(
            pmt_packet(Codec::Flac, AUDIO_PID, None),
            Err(TsError::InvalidCodec(Codec::Flac))
        ));
    }

    #[test]
    fn pmt_accepts_opus_with_registration_descriptor() {
        let packet = pmt_packet(Codec::Opus, AUDIO_PID, None).unwrap();
        // es_info_len is 6 for the registration descriptor; find the stream_type
        // byte (0x06) right after the program_info_length'd descriptor loop.
        assert!(packet.windows(4).any(|w| w == b"Opus"));
    }

    #[test]
    fn opus_first_packet_carries_start_trim() {
        let payload = opus_ts_payload(&[0xAA; 10], 312, true);
        assert_eq!(&payload[0..2], &[0x7F, 0xF0]);
        assert_eq!(payload[2], 10); // length byte
        assert_eq!(&payload[13..15], &312u16.to_be_bytes());
    }
}
