//! Packed-audio first segment for AAC at 48 kHz: ID3v2.4 PRIV timestamp
//! preamble followed by one or more ADTS frames.

use hls_coremux::packed::PackedAudioMuxer;
use hls_coremux::types::{channel, AacProfile, Codec, RollType};
use hls_coremux::{Muxer, Packet, PacketSource};

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
fn first_segment_opens_with_priv_timestamp_then_adts_frames() {
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
    assert_eq!(data[3], 0x04); // ID3v2.4
    assert_eq!(&data[10..14], b"PRIV");
    let owner_len = "com.apple.streaming.transportStreamTimestamp".len() + 1;
    let owner_start = 10 + 10; // frame header is 10 bytes
    assert_eq!(
        &data[owner_start..owner_start + owner_len - 1],
        b"com.apple.streaming.transportStreamTimestamp"
    );

    let id3_total_len = ((data[6] as usize & 0x7F) << 21)
        | ((data[7] as usize & 0x7F) << 14)
        | ((data[8] as usize & 0x7F) << 7)
        | (data[9] as usize & 0x7F);
    let adts_start = 10 + id3_total_len;
    assert_eq!(data[adts_start], 0xFF);
    assert_eq!(data[adts_start + 1] & 0xF0, 0xF0);
}
