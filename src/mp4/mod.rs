//! Fragmented-MP4 (CMAF) writer: one init segment (`ftyp`+`moov`) followed
//! by a stream of media segments (`styp`+`emsg`*+`moof`+`mdat`), ID3-carrying
//! `emsg` boxes for timed metadata, and per-track loudness records.
//!
//! Grounded on `src/minifmp4.h` (box layouts, the trun/tfhd uniformity
//! heuristic, loudness/emsg encoding) and `src/muxer_plugin_fmp4.c` (codec
//! mapping, dsi conversion, the dual flush-timing strategy, and the emsg
//! open/backfill lifecycle on tag changes).

pub mod boxwriter;
pub mod emsg;
pub mod loudness;
pub mod sample;

use boxwriter::BoxWriter;
use emsg::Emsg;
use loudness::{Loudness, LoudnessKind, Measurement};
use sample::{SampleFlags, SampleInfo, UniformTracker};

use crate::error::{Mp4Error, MuxError};
use crate::muxer::{Muxer, MuxerCaps};
use crate::types::{Codec, Packet, PacketSource, RollType, Segment, SegmentParams, TagList};

const STREAM_TYPE_AUDIO: u8 = 0x05;
const OBJECT_TYPE_AAC: u8 = 0x40;
const OBJECT_TYPE_MP3: u8 = 0x6B;
const BRAND_MAJOR: &[u8; 4] = b"iso6";
const BRAND_EXTRA: &[u8; 4] = b"aid3";

fn iso639_code(lang: &str) -> u16 {
    let b = lang.as_bytes();
    let c = |i: usize| (b.get(i).copied().unwrap_or(b' ') as u16) & 0x1F;
    (c(0) << 10) | (c(1) << 5) | c(2)
}

struct Track {
    fourcc: [u8; 4],
    object_type: u8,
    channels: u16,
    timescale: u32,
    dsi: Vec<u8>,
    roll_distance: i16,
    roll_type: RollType,
    encoder_delay: u32,
    default_duration: u32,
    default_is_non_sync: bool,
}

impl Track {
    fn default_flags_encoded(&self) -> u32 {
        SampleFlags {
            is_non_sync: self.default_is_non_sync,
            ..Default::default()
        }
        .encode()
    }

    fn validate(&self) -> Result<(), Mp4Error> {
        if self.channels == 0 {
            return Err(Mp4Error::InvalidChannels(self.channels));
        }
        if self.timescale == 0 {
            return Err(Mp4Error::InvalidTimescale(self.timescale));
        }
        let needs_dsi = !(self.fourcc == *b"mp4a" && self.object_type == OBJECT_TYPE_MP3);
        if needs_dsi && self.dsi.is_empty() {
            return Err(Mp4Error::MissingDsi);
        }
        Ok(())
    }
}

/// Converts an Ogg `OpusHead` packet (little-endian, version 1, 8-byte
/// magic) into the big-endian, version-0 payload the `dOps` box expects.
fn opus_dsi_to_mp4(opus_head: &[u8]) -> Option<Vec<u8>> {
    if opus_head.len() <= 8 || &opus_head[0..8] != b"OpusHead" {
        return None;
    }
    let mut out = opus_head[8..].to_vec();
    if out.len() < 10 {
        return None;
    }
    out[0] = 0x00; // version 0 in the mp4 box
    let pre_skip = crate::bits::unpack_u16le(&out[2..4]);
    out[2..4].copy_from_slice(&pre_skip.to_be_bytes());
    let sample_rate = crate::bits::unpack_u32le(&out[4..8]);
    out[4..8].copy_from_slice(&sample_rate.to_be_bytes());
    let gain = crate::bits::unpack_u16le(&out[8..10]);
    out[8..10].copy_from_slice(&gain.to_be_bytes());
    Some(out)
}

/// Wraps a raw 34-byte FLAC STREAMINFO block in the metadata-block header
/// (`dfLa` expects a full FLAC metadata block, last-flag set).
fn flac_dsi_to_mp4(streaminfo: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + streaminfo.len());
    out.push(0x80); // last-metadata-block flag, block type 0 (STREAMINFO)
    crate::bits::pack_u24be(&mut out, streaminfo.len() as u32);
    out.extend_from_slice(streaminfo);
    out
}

pub struct Mp4Muxer {
    source: Option<PacketSource>,
    track: Option<Track>,
    uniform: UniformTracker,
    sample_infos: Vec<SampleInfo>,
    mdat_buf: Vec<u8>,
    current_duration: u64,
    base_media_decode_time: u64,
    fragment_count: u32,
    init_written: bool,
    samples_per_segment: u64,
    pending_emsgs: Vec<Emsg>,
    open_emsg: Option<Emsg>,
    next_emsg_id: u32,
    loudnesses: Vec<Loudness>,
    pending_loudness: Option<Loudness>,
    pending_method: Option<u8>,
}

impl Mp4Muxer {
    pub fn new() -> Self {
        Mp4Muxer {
            source: None,
            track: None,
            uniform: UniformTracker::new(),
            sample_infos: Vec::new(),
            mdat_buf: Vec::new(),
            current_duration: 0,
            base_media_decode_time: 0,
            fragment_count: 0,
            init_written: false,
            samples_per_segment: 0,
            pending_emsgs: Vec::new(),
            open_emsg: None,
            next_emsg_id: 0,
            loudnesses: Vec::new(),
            pending_loudness: None,
            pending_method: None,
        }
    }

    fn track(&self) -> &Track {
        self.track.as_ref().expect("open() called before use")
    }

    fn commit_pending_loudness(&mut self) {
        if let Some(l) = self.pending_loudness.take() {
            self.loudnesses.push(l);
        }
    }

    fn write_brand_box(&self, bw: &mut BoxWriter, typ: &[u8; 4]) -> Result<(), Mp4Error> {
        bw.begin(typ);
        bw.bytes(BRAND_MAJOR);
        bw.u32(0);
        bw.bytes(BRAND_MAJOR);
        bw.bytes(BRAND_EXTRA);
        bw.end(typ)
    }

    fn write_sample_entry(&self, bw: &mut BoxWriter) -> Result<(), Mp4Error> {
        let track = self.track();
        bw.begin(&track.fourcc);
        bw.u32(0);
        bw.u16(0);
        bw.u16(1); // data reference index

        bw.u32(0);
        bw.u32(0); // reserved
        bw.u16(track.channels);
        bw.u16(16); // sample size bits
        bw.u32(0);
        if track.timescale < 0x1_0000 {
            bw.u32(track.timescale << 16);
        } else {
            bw.u32(0);
        }

        if track.fourcc == *b"mp4a" {
            bw.begin_full(b"esds", 0, 0);
            bw.es_tag_begin(0x03);
            bw.u16(0); // ES_ID
            bw.u8(0); // flags
            bw.es_tag_begin(0x04);
            bw.u8(track.object_type);
            bw.u8(STREAM_TYPE_AUDIO << 2);
            bw.u24(track.channels as u32 * 6144 / 8);
            bw.u32(0); // max bitrate
            bw.u32(0); // avg bitrate
            if !track.dsi.is_empty() {
                bw.es_tag_begin(0x05);
                bw.bytes(&track.dsi);
                bw.es_tag_end(0x05)?;
            }
            bw.es_tag_end(0x04)?;
            bw.es_tag_begin(0x06);
            bw.u8(2);
            bw.es_tag_end(0x06)?;
            bw.es_tag_end(0x03)?;
            bw.end(b"esds")?;
        } else if track.fourcc == *b"alac" {
            bw.begin_full(b"alac", 0, 0);
            bw.bytes(&track.dsi);
            bw.end(b"alac")?;
        } else if track.fourcc == *b"fLaC" {
            bw.begin_full(b"dfLa", 0, 0);
            bw.bytes(&track.dsi);
            bw.end(b"dfLa")?;
        } else if track.fourcc == *b"Opus" {
            bw.begin(b"dOps");
            bw.bytes(&track.dsi);
            bw.end(b"dOps")?;
        } else if track.fourcc == *b"ac-3" {
            bw.begin(b"dac3");
            bw.bytes(&track.dsi);
            bw.end(b"dac3")?;
        } else if track.fourcc == *b"ec-3" {
            bw.begin(b"dec3");
            bw.bytes(&track.dsi);
            bw.end(b"dec3")?;
        }

        bw.end(&track.fourcc)
    }

    fn write_trak(&self, bw: &mut BoxWriter) -> Result<(), Mp4Error> {
        let track = self.track();
        bw.begin(b"trak");

        bw.begin_full(b"tkhd", 0, 0x07);
        bw.u32(0);
        bw.u32(0);
        bw.u32(1); // track id
        bw.u32(0);
        bw.u32(0); // duration
        bw.u32(0);
        bw.u32(0);
        bw.u16(0); // layer
        bw.u16(0); // alternate group
        bw.u16(0x0100); // volume
        bw.u16(0);
        for v in [0x0001_0000u32, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000] {
            bw.u32(v);
        }
        bw.u32(0); // width
        bw.u32(0); // height
        bw.end(b"tkhd")?;

        if track.encoder_delay > 0 {
            bw.begin(b"edts");
            bw.begin_full(b"elst", 0, 0);
            bw.u32(1);
            bw.u32(0);
            bw.u32(track.encoder_delay);
            bw.u16(1);
            bw.u16(0);
            bw.end(b"elst")?;
            bw.end(b"edts")?;
        }

        bw.begin(b"mdia");
        bw.begin_full(b"mdhd", 0, 0);
        bw.u32(0);
        bw.u32(0);
        bw.u32(track.timescale);
        bw.u32(0);
        bw.u16(iso639_code("und"));
        bw.u16(0);
        bw.end(b"mdhd")?;

        bw.begin_full(b"hdlr", 0, 0);
        bw.u32(0);
        bw.bytes(b"soun");
        bw.u32(0);
        bw.u32(0);
        bw.u32(0);
        bw.bytes(b"SoundHandler\0");
        bw.end(b"hdlr")?;

        bw.begin(b"minf");
        bw.begin_full(b"smhd", 0, 0);
        bw.u16(0);
        bw.u16(0);
        bw.end(b"smhd")?;

        bw.begin(b"dinf");
        bw.begin_full(b"dref", 0, 0);
        bw.u32(1);
        bw.begin_full(b"url ", 0, 0x01);
        bw.end(b"url ")?;
        bw.end(b"dref")?;
        bw.end(b"dinf")?;

        bw.begin(b"stbl");
        bw.begin_full(b"stsd", 0, 0);
        bw.u32(1);
        self.write_sample_entry(bw)?;
        bw.end(b"stsd")?;

        bw.begin_full(b"stts", 0, 0);
        bw.u32(0);
        bw.end(b"stts")?;

        bw.begin_full(b"stsc", 0, 0);
        bw.u32(0);
        bw.end(b"stsc")?;

        bw.begin_full(b"stsz", 0, 0);
        bw.u32(0);
        bw.u32(0);
        bw.end(b"stsz")?;

        bw.begin_full(b"stco", 0, 0);
        bw.u32(0);
        bw.end(b"stco")?;

        if track.roll_distance != 0 {
            bw.begin_full(b"sgpd", 1, 0);
            bw.bytes(roll_grouping_type(track.roll_type));
            bw.u32(2); // default length
            bw.u32(1); // entry count
            bw.i16(track.roll_distance);
            bw.end(b"sgpd")?;
        }

        bw.end(b"stbl")?;
        bw.end(b"minf")?;
        bw.end(b"mdia")?;

        self.write_udta(bw)?;

        bw.end(b"trak")
    }

    fn write_udta(&self, bw: &mut BoxWriter) -> Result<(), Mp4Error> {
        if self.loudnesses.is_empty() {
            return Ok(());
        }
        bw.begin(b"udta");
        bw.begin(b"ludt");
        for l in self.loudnesses.iter().filter(|l| l.kind == LoudnessKind::Track) {
            l.write(bw)?;
        }
        for l in self.loudnesses.iter().filter(|l| l.kind == LoudnessKind::Album) {
            l.write(bw)?;
        }
        bw.end(b"ludt")?;
        bw.end(b"udta")
    }

    fn build_init(&self) -> Result<Vec<u8>, Mp4Error> {
        self.track().validate()?;
        let mut bw = BoxWriter::new();
        self.write_brand_box(&mut bw, b"ftyp")?;

        bw.begin(b"moov");
        bw.begin_full(b"mvhd", 0, 0);
        bw.u32(0);
        bw.u32(0);
        bw.u32(1000); // timescale
        bw.u32(0); // duration
        bw.u32(0x0001_0000); // rate
        bw.u16(0x0100); // volume
        bw.u16(0);
        bw.u32(0);
        bw.u32(0);
        for v in [0x0001_0000u32, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000] {
            bw.u32(v);
        }
        for _ in 0..6 {
            bw.u32(0);
        }
        bw.u32(2); // next track id
        bw.end(b"mvhd")?;

        self.write_trak(&mut bw)?;

        let track = self.track();
        bw.begin(b"mvex");
        bw.begin_full(b"mehd", 0, 0);
        bw.u32(0);
        bw.end(b"mehd")?;
        bw.begin_full(b"trex", 0, 0);
        bw.u32(1); // track id
        bw.u32(1); // default sample description index
        bw.u32(track.default_duration);
        bw.u32(0); // default size
        bw.u32(track.default_flags_encoded());
        bw.end(b"trex")?;
        bw.end(b"mvex")?;

        bw.end(b"moov")?;
        Ok(bw.into_bytes())
    }

    fn build_traf(&self, bw: &mut BoxWriter) -> Result<usize, Mp4Error> {
        let track = self.track();
        bw.begin(b"traf");

        let default_flags = track.default_flags_encoded();
        let mut tfhd_flags = 0x02_0000u32; // default-base-is-moof
        let mut trun_flags = 0x01u32; // data-offset present

        if self.uniform.duration_set {
            if self.uniform.duration != track.default_duration {
                tfhd_flags |= 0x08;
            }
        } else {
            trun_flags |= 0x100;
        }

        if self.uniform.size_set {
            if self.uniform.size != 0 {
                tfhd_flags |= 0x10;
            }
        } else {
            trun_flags |= 0x200;
        }

        if self.uniform.flags_set {
            if self.uniform.flags != default_flags {
                tfhd_flags |= 0x20;
                if self.uniform.first_sample_flags != self.uniform.flags {
                    trun_flags |= 0x04;
                }
            } else if self.uniform.first_sample_flags != default_flags {
                trun_flags |= 0x04;
            }
        } else {
            trun_flags |= 0x400;
        }

        bw.begin_full(b"tfhd", 0, tfhd_flags);
        bw.u32(1); // track id
        if tfhd_flags & 0x08 != 0 {
            bw.u32(self.uniform.duration);
        }
        if tfhd_flags & 0x10 != 0 {
            bw.u32(self.uniform.size);
        }
        if tfhd_flags & 0x20 != 0 {
            bw.u32(self.uniform.flags);
        }
        bw.end(b"tfhd")?;

        bw.begin_full(b"tfdt", 1, 0);
        bw.u64(self.base_media_decode_time);
        bw.end(b"tfdt")?;

        bw.begin_full(b"trun", 0, trun_flags);
        bw.u32(self.sample_infos.len() as u32);
        let data_offset_pos = bw.len();
        bw.u32(0); // data offset, patched after mdat begins
        if trun_flags & 0x04 != 0 {
            bw.u32(self.uniform.first_sample_flags);
        }
        for info in &self.sample_infos {
            if trun_flags & 0x100 != 0 {
                bw.u32(info.duration);
            }
            if trun_flags & 0x200 != 0 {
                bw.u32(info.size);
            }
            if trun_flags & 0x400 != 0 {
                bw.u32(info.flags.encode());
            }
        }
        bw.end(b"trun")?;

        if track.roll_distance != 0 {
            bw.begin_full(b"sbgp", 0, 0);
            bw.bytes(roll_grouping_type(track.roll_type));
            let entry_count_pos = bw.len();
            bw.u32(0);
            let mut entry_count = 0u32;
            let mut last_group: Option<u32> = None;
            let mut sample_count_pos = 0usize;
            let mut sample_count = 0u32;
            for info in &self.sample_infos {
                if last_group != Some(info.sample_group) {
                    if last_group.is_some() {
                        bw.patch_u32(sample_count_pos, sample_count);
                    }
                    entry_count += 1;
                    last_group = Some(info.sample_group);
                    sample_count_pos = bw.len();
                    bw.u32(0);
                    bw.u32(info.sample_group);
                    sample_count = 1;
                } else {
                    sample_count += 1;
                }
            }
            if last_group.is_some() {
                bw.patch_u32(sample_count_pos, sample_count);
            }
            bw.patch_u32(entry_count_pos, entry_count);
            bw.end(b"sbgp")?;
        }

        bw.end(b"traf")?;
        Ok(data_offset_pos)
    }

    fn build_segment(&mut self) -> Result<Vec<u8>, Mp4Error> {
        if self.sample_infos.is_empty() {
            return Err(Mp4Error::NoSamples);
        }
        for e in &self.pending_emsgs {
            e.validate()?;
        }

        let mut bw = BoxWriter::new();
        self.write_brand_box(&mut bw, b"styp")?;
        for e in &self.pending_emsgs {
            e.write(&mut bw)?;
        }
        self.pending_emsgs.clear();

        let moof_offset = bw.len();
        bw.begin(b"moof");
        bw.begin_full(b"mfhd", 0, 0);
        self.fragment_count += 1;
        bw.u32(self.fragment_count);
        bw.end(b"mfhd")?;
        let data_offset_pos = self.build_traf(&mut bw)?;
        bw.end(b"moof")?;

        bw.begin(b"mdat");
        let data_offset = (bw.len() - moof_offset) as u32;
        bw.patch_u32(data_offset_pos, data_offset);
        bw.bytes(&self.mdat_buf);
        bw.end(b"mdat")?;

        self.base_media_decode_time += self.current_duration;
        self.mdat_buf.clear();
        self.sample_infos.clear();
        self.uniform = UniformTracker::new();
        self.current_duration = 0;

        Ok(bw.into_bytes())
    }

    fn flush_fragment(&mut self) -> Result<Option<Segment>, Mp4Error> {
        if self.sample_infos.is_empty() {
            return Ok(None);
        }
        let pts = self.base_media_decode_time;
        let samples = self.current_duration;
        let data = self.build_segment()?;
        Ok(Some(Segment::media(data, pts, samples)))
    }

    fn push_sample(&mut self, packet: &Packet) {
        let info = SampleInfo {
            duration: packet.duration,
            size: packet.data.len() as u32,
            flags: SampleFlags {
                depends_on: if packet.sync { 2 } else { 0 },
                is_non_sync: !packet.sync,
                ..Default::default()
            },
            sample_group: packet.sample_group,
        };
        self.uniform.observe(&info);
        self.sample_infos.push(info);
        self.mdat_buf.extend_from_slice(&packet.data);
        self.current_duration += packet.duration as u64;
    }
}

fn roll_grouping_type(kind: RollType) -> &'static [u8; 4] {
    match kind {
        RollType::Roll => b"roll",
        RollType::Prol => b"prol",
    }
}

impl Default for Mp4Muxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Muxer for Mp4Muxer {
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
        let (fourcc, object_type, dsi): (&[u8; 4], u8, Vec<u8>) = match source.codec {
            Codec::Aac => (b"mp4a", OBJECT_TYPE_AAC, source.dsi.clone()),
            Codec::Mp3 => (b"mp4a", OBJECT_TYPE_MP3, source.dsi.clone()),
            Codec::Alac => (b"alac", 0, source.dsi.clone()),
            Codec::Flac => {
                if source.dsi.len() != 34 {
                    return Err(Mp4Error::MissingDsi.into());
                }
                (b"fLaC", 0, flac_dsi_to_mp4(&source.dsi))
            }
            Codec::Opus => {
                let converted = opus_dsi_to_mp4(&source.dsi).ok_or(Mp4Error::MissingDsi)?;
                (b"Opus", 0, converted)
            }
            Codec::Ac3 => (b"ac-3", 0, source.dsi.clone()),
            Codec::Eac3 => (b"ec-3", 0, source.dsi.clone()),
            Codec::Unknown => return Err(Mp4Error::InvalidCodec.into()),
        };

        let track = Track {
            fourcc: *fourcc,
            object_type,
            channels: source.channel_count() as u16,
            timescale: source.sample_rate,
            dsi,
            roll_distance: source.roll_distance,
            roll_type: source.roll_type,
            encoder_delay: source.padding,
            default_duration: source.frame_len,
            default_is_non_sync: !source.sync_flag,
        };
        track.validate()?;

        self.samples_per_segment =
            (self.segment_info(&source).segment_length_ms as u64 * source.sample_rate as u64) / 1000;
        self.track = Some(track);
        self.source = Some(source);
        Ok(())
    }

    fn configure(&mut self, key: &str, value: &str) -> Result<(), MuxError> {
        match key {
            "loudness" => {
                self.commit_pending_loudness();
                let kind = match value {
                    "track" => LoudnessKind::Track,
                    "album" => LoudnessKind::Album,
                    _ => {
                        return Err(MuxError::InvalidConfigValue {
                            key: key.to_string(),
                            value: value.to_string(),
                        })
                    }
                };
                self.pending_loudness = Some(Loudness::new(kind));
                Ok(())
            }
            "true-peak" | "sample-peak" => {
                let db: f64 = value.parse().map_err(|_| MuxError::InvalidConfigValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
                let l = self.pending_loudness.as_mut().ok_or_else(|| MuxError::InvalidConfigValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
                if key == "true-peak" {
                    l.true_peak_db = Some(db);
                } else {
                    l.sample_peak_db = Some(db);
                }
                Ok(())
            }
            "measurement-system" | "reliability" => {
                let parsed = if key == "measurement-system" {
                    loudness::parse_system(value)
                } else {
                    loudness::parse_reliability(value)
                }
                .ok_or_else(|| MuxError::InvalidConfigValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
                let l = self.pending_loudness.as_mut().ok_or_else(|| MuxError::InvalidConfigValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
                if key == "measurement-system" {
                    l.system = parsed;
                } else {
                    l.reliability = parsed;
                }
                Ok(())
            }
            "measurement-method" => {
                let method = loudness::parse_method(value).ok_or_else(|| MuxError::InvalidConfigValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
                self.pending_method = Some(method);
                Ok(())
            }
            "value" => {
                let v: u8 = value.parse().map_err(|_| MuxError::InvalidConfigValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
                let method = self.pending_method.take().ok_or_else(|| MuxError::InvalidConfigValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
                let l = self.pending_loudness.as_mut().ok_or_else(|| MuxError::InvalidConfigValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
                l.measurements.push(Measurement {
                    method,
                    value: v,
                    system: l.system,
                    reliability: l.reliability,
                });
                Ok(())
            }
            _ => {
                crate::config::log_unknown_key("fmp4", key);
                Ok(())
            }
        }
    }

    fn submit_packet(&mut self, packet: Packet) -> Result<Vec<Segment>, MuxError> {
        self.commit_pending_loudness();
        let mut out = Vec::new();

        if !self.init_written {
            out.push(Segment::init(self.build_init()?));
            self.init_written = true;
        }

        if self.track().default_is_non_sync {
            if packet.sync && !self.sample_infos.is_empty() {
                if let Some(seg) = self.flush_fragment()? {
                    out.push(seg);
                }
            }
        } else if self.current_duration + packet.duration as u64 > self.samples_per_segment
            && !self.sample_infos.is_empty()
        {
            if let Some(seg) = self.flush_fragment()? {
                out.push(seg);
            }
        }

        self.push_sample(&packet);
        Ok(out)
    }

    fn submit_tags(&mut self, tags: TagList) -> Result<(), MuxError> {
        let message = crate::id3::build_tag(&tags)?;
        let timescale = self.track.as_ref().map(|t| t.timescale).unwrap_or(1);

        if let Some(mut prev) = self.open_emsg.take() {
            prev.event_duration = self.current_duration as u32;
            self.pending_emsgs.push(prev);
            self.next_emsg_id += 1;
        }

        let mut emsg = Emsg::new_id3(
            1,
            timescale,
            self.base_media_decode_time + self.current_duration,
            self.next_emsg_id,
            message,
        );
        emsg.event_duration = u32::MAX;
        self.open_emsg = Some(emsg);
        Ok(())
    }

    fn flush(&mut self) -> Result<Vec<Segment>, MuxError> {
        if let Some(e) = self.open_emsg.clone() {
            self.pending_emsgs.push(e);
        }
        match self.flush_fragment()? {
            Some(seg) => Ok(vec![seg]),
            None => Ok(Vec::new()),
        }
    }

    fn reset(&mut self) -> Result<(), MuxError> {
        let source = self.source.clone();
        *self = Mp4Muxer::new();
        if let Some(source) = source {
            self.open(source)?;
        }
        Ok(())
    }

    fn file_ext(&self) -> &'static str {
        if self.init_written {
            "m4s"
        } else {
            "mp4"
        }
    }

    fn mime_type(&self) -> &'static str {
        "audio/mp4"
    }
}
