//! ADTS bitstream packer: prepends a 7-byte ADTS header to each AAC
//! payload.
//!
//! Grounded on `src/adts_mux.c` / `src/adts_mux.h` / `src/channels.h`.
//! HE-AAC collapses to LC by halving the sample rate index; HEv2
//! downmixes stereo to mono for the purposes of the channel config field
//! (§4.2) — both are caller responsibilities via [`AacProfile`] resolution
//! upstream; this module only ever emits the AAC-LC object type.

use crate::error::AdtsError;
use crate::types::{channel, AacProfile, PacketSource};

pub const ADTS_MAX_PAYLOAD: usize = 8184;
const ADTS_HEADER_LEN: usize = 7;

fn sample_rate_index(rate: u32) -> Option<u8> {
    Some(match rate {
        96000 => 0x00,
        88200 => 0x01,
        64000 => 0x02,
        48000 => 0x03,
        44100 => 0x04,
        32000 => 0x05,
        24000 => 0x06,
        22050 => 0x07,
        16000 => 0x08,
        12000 => 0x09,
        11025 => 0x0A,
        8000 => 0x0B,
        7350 => 0x0C,
        _ => return None,
    })
}

fn channel_config(layout: u64) -> Option<u8> {
    Some(match layout {
        channel::LAYOUT_MONO => 1,
        channel::LAYOUT_STEREO => 2,
        channel::LAYOUT_3_0 => 3,
        channel::LAYOUT_4_0 => 4,
        channel::LAYOUT_5_0 => 5,
        channel::LAYOUT_5_1 => 6,
        channel::LAYOUT_7_1 => 7,
        _ => return None,
    })
}

/// Resolved, validated ADTS muxer state: a sample-rate index, channel
/// config, and AOT-1 profile value, locked in at `open` time.
pub struct AdtsMux {
    sample_rate_index: u8,
    ch_index: u8,
    profile: u8,
    version: u8,
}

impl AdtsMux {
    pub fn open(source: &PacketSource) -> Result<Self, AdtsError> {
        // HE-AAC/HEv2 both collapse to the AAC-LC object type in the ADTS
        // header; the actual SBR/PS signalling lives in the encoder's own
        // AudioSpecificConfig, not in ADTS.
        let effective_rate = match source.profile {
            Some(AacProfile::He) | Some(AacProfile::HeV2) => source.sample_rate / 2,
            _ => source.sample_rate,
        };
        let sample_rate_index = sample_rate_index(effective_rate)
            .ok_or(AdtsError::InvalidSampleRate(effective_rate))?;

        let effective_layout = match source.profile {
            Some(AacProfile::HeV2) if source.channel_layout == channel::LAYOUT_STEREO => {
                channel::LAYOUT_MONO
            }
            _ => source.channel_layout,
        };
        let ch_index = channel_config(effective_layout)
            .ok_or(AdtsError::InvalidChannelLayout(effective_layout))?;

        // AOT 2 (AAC-LC) is the only object type ADTS ever carries here;
        // profile field is (AOT - 1).
        let profile = 2u8 - 1;

        Ok(AdtsMux {
            sample_rate_index,
            ch_index,
            profile,
            version: 0,
        })
    }

    /// Prepends a 7-byte ADTS header to `payload` and returns the
    /// complete frame.
    pub fn encode_packet(&self, payload: &[u8]) -> Result<Vec<u8>, AdtsError> {
        if payload.len() > ADTS_MAX_PAYLOAD {
            return Err(AdtsError::PacketTooLarge(payload.len()));
        }
        let frame_len = payload.len() as u64 + ADTS_HEADER_LEN as u64;

        let mut buf = Vec::with_capacity(ADTS_HEADER_LEN + payload.len());
        let mut bw = crate::bits::BitWriter::new(&mut buf);
        bw.add(12, 0x0FFF).unwrap(); // syncword
        bw.add(1, self.version as u64).unwrap();
        bw.add(2, 0).unwrap(); // layer
        bw.add(1, 1).unwrap(); // protection absent
        bw.add(2, self.profile as u64).unwrap();
        bw.add(4, self.sample_rate_index as u64).unwrap();
        bw.add(1, 0).unwrap(); // private bit
        bw.add(3, self.ch_index as u64).unwrap();
        bw.add(1, 0).unwrap(); // originality
        bw.add(1, 0).unwrap(); // home
        bw.add(1, 0).unwrap(); // copyright
        bw.add(1, 0).unwrap(); // copyright_start
        bw.add(13, frame_len).unwrap();
        bw.add(11, 0x7FF).unwrap(); // buffer fullness, VBR
        bw.add(2, 0).unwrap(); // number of raw data blocks - 1
        bw.align();

        buf.extend_from_slice(payload);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_44k_source() -> PacketSource {
        PacketSource {
            codec: crate::types::Codec::Aac,
            profile: Some(AacProfile::Lc),
            channel_layout: channel::LAYOUT_STEREO,
            sample_rate: 44100,
            frame_len: 1024,
            bit_rate: 128000,
            sync_flag: true,
            padding: 0,
            roll_distance: 0,
            roll_type: crate::types::RollType::Roll,
            dsi: vec![],
        }
    }

    #[test]
    fn single_frame_matches_seed_vector() {
        let mux = AdtsMux::open(&stereo_44k_source()).unwrap();
        let payload = [0x21, 0x00, 0x00, 0x00, 0x00];
        let frame = mux.encode_packet(&payload).unwrap();
        assert_eq!(
            frame,
            vec![0xFF, 0xF1, 0x4C, 0x80, 0x01, 0x80, 0x7F, 0xFC, 0x21, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn frame_length_field_equals_payload_plus_seven() {
        let mux = AdtsMux::open(&stereo_44k_source()).unwrap();
        let payload = vec![0u8; 200];
        let frame = mux.encode_packet(&payload).unwrap();
        let len_field = ((frame[3] as u16 & 0x03) << 11) | ((frame[4] as u16) << 3) | (frame[5] as u16 >> 5);
        assert_eq!(len_field as usize, payload.len() + 7);
    }

    #[test]
    fn rejects_unsupported_sample_rate() {
        let mut source = stereo_44k_source();
        source.sample_rate = 12345;
        assert!(matches!(
            AdtsMux::open(&source),
            Err(AdtsError::InvalidSampleRate(12345))
        ));
    }

    #[test]
    fn rejects_oversized_payload() {
        let mux = AdtsMux::open(&stereo_44k_source()).unwrap();
        let payload = vec![0u8; ADTS_MAX_PAYLOAD + 1];
        assert!(matches!(
            mux.encode_packet(&payload),
            Err(AdtsError::PacketTooLarge(_))
        ));
    }
}
