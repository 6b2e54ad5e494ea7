//! Ogg Opus header page: serial 0x00000001, OpusHead mono, pre-skip 312,
//! sample rate 48000, gain 0, channel mapping 0.

use hls_coremux::ogg::opus::OggOpusMuxer;
use hls_coremux::types::{channel, Codec, RollType};
use hls_coremux::{Muxer, Packet, PacketSource};

fn opus_head() -> Vec<u8> {
    let mut out = Vec::with_capacity(19);
    out.extend_from_slice(b"OpusHead");
    out.push(1); // version
    out.push(1); // channel count
    out.extend_from_slice(&312u16.to_le_bytes()); // pre-skip
    out.extend_from_slice(&48000u32.to_le_bytes()); // input sample rate
    out.extend_from_slice(&0i16.to_le_bytes()); // output gain
    out.push(0); // channel mapping family
    out
}

fn opus_source() -> PacketSource {
    PacketSource {
        codec: Codec::Opus,
        profile: None,
        channel_layout: channel::LAYOUT_MONO,
        sample_rate: 48000,
        frame_len: 0,
        bit_rate: 0,
        sync_flag: true,
        padding: 312,
        roll_distance: 0,
        roll_type: RollType::Roll,
        dsi: opus_head(),
    }
}

#[test]
fn header_page_carries_expected_ogg_page_header() {
    let mut mux = OggOpusMuxer::new();
    mux.open(opus_source()).unwrap();
    mux.submit_packet(Packet {
        data: vec![0xAA; 8],
        duration: 960,
        sample_rate: 48000,
        pts: 0,
        sync: true,
        sample_group: 0,
    })
    .unwrap();
    let segs = mux.flush().unwrap();
    let data = &segs[0].data;

    // The first page (identification page) is 27 fixed header bytes + a
    // one-byte lacing table (19-byte body fits in a single segment) + body.
    assert_eq!(&data[0..6], &[0x4F, 0x67, 0x67, 0x53, 0x00, 0x02]); // "OggS", version 0, BOS
    let granule = u64::from_le_bytes(data[6..14].try_into().unwrap());
    assert_eq!(granule, 0);
    assert_eq!(&data[14..18], &[0x01, 0x00, 0x00, 0x00]); // serial
    assert_eq!(&data[18..22], &[0x00, 0x00, 0x00, 0x00]); // page sequence
    assert_eq!(data[26], 1); // segment count
    assert_eq!(data[27], 0x13); // lacing value: 19-byte body

    let crc = u32::from_le_bytes(data[22..26].try_into().unwrap());
    let mut check = data[0..28 + 19].to_vec();
    check[22..26].copy_from_slice(&[0, 0, 0, 0]);
    assert_eq!(hls_coremux::crc::crc32_ogg(&check), crc);

    assert_eq!(&data[28..36], b"OpusHead");
}
