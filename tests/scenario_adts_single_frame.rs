//! ADTS single frame: AAC-LC payload of 5 bytes, 44100 Hz stereo.

use hls_coremux::adts::AdtsMux;
use hls_coremux::types::{channel, AacProfile, Codec, RollType};
use hls_coremux::PacketSource;

fn stereo_44k_source() -> PacketSource {
    PacketSource {
        codec: Codec::Aac,
        profile: Some(AacProfile::Lc),
        channel_layout: channel::LAYOUT_STEREO,
        sample_rate: 44100,
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
fn single_frame_matches_expected_header_and_payload() {
    let mux = AdtsMux::open(&stereo_44k_source()).unwrap();
    let payload = [0x21, 0x00, 0x00, 0x00, 0x00];
    let frame = mux.encode_packet(&payload).unwrap();
    assert_eq!(
        frame,
        vec![0xFF, 0xF1, 0x4C, 0x80, 0x01, 0x80, 0x7F, 0xFC, 0x21, 0x00, 0x00, 0x00, 0x00]
    );
}
