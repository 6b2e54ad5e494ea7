//! MPEG-TS PAT: the first 188-byte packet a newly opened TsMux writes.

use hls_coremux::crc::crc32_ts;
use hls_coremux::ts::TsMux;
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
fn first_packet_of_the_stream_is_the_pat() {
    let mut mux = TsMux::new();
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
    let data = &segs[0].data;

    assert_eq!(&data[0..4], &[0x47, 0x40, 0x00, 0x10]);
    assert_eq!(data[4], 0x00); // pointer field
    assert_eq!(data[5], 0x00); // table id
    assert_eq!(&data[6..8], &[0xB0, 0x0D]);
    assert_eq!(&data[8..10], &[0x00, 0x01]); // transport_stream_id
    assert_eq!(data[10], 0xC1);
    assert_eq!(&data[13..15], &[0x00, 0x01]); // program number
    assert_eq!(&data[15..17], &[0xF0, 0x00]); // PMT PID 0x1000

    let crc = crc32_ts(&data[5..17]);
    assert_eq!(&data[17..21], &crc.to_be_bytes());
}
