//! fMP4 fragment with 3 uniform samples: durations/sizes/sync flags all
//! equal, so tfhd carries the defaults and trun omits the per-sample arrays.

use hls_coremux::mp4::Mp4Muxer;
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
        dsi: vec![0x11, 0x90],
    }
}

fn uniform_packet(pts: u64) -> Packet {
    Packet {
        data: vec![0u8; 411],
        duration: 1024,
        sample_rate: 48000,
        pts,
        sync: true,
        sample_group: 0,
    }
}

#[test]
fn uniform_fragment_trun_only_carries_data_offset() {
    let mut mux = Mp4Muxer::new();
    mux.open(aac_source()).unwrap();
    mux.submit_packet(uniform_packet(0)).unwrap();
    mux.submit_packet(uniform_packet(1024)).unwrap();
    mux.submit_packet(uniform_packet(2048)).unwrap();
    let segs = mux.flush().unwrap();

    assert_eq!(segs.len(), 1);
    let data = &segs[0].data;
    assert!(data.windows(4).any(|w| w == b"styp"));
    assert!(data.windows(4).any(|w| w == b"moof"));
    assert!(data.windows(4).any(|w| w == b"mdat"));

    let tfhd_pos = data.windows(4).position(|w| w == b"tfhd").unwrap();
    let tfhd_flags = hls_coremux::bits::unpack_u32be(&data[tfhd_pos + 4..tfhd_pos + 8]) & 0x00FF_FFFF;
    assert_eq!(tfhd_flags & 0x08, 0x08); // default-sample-duration present
    assert_eq!(tfhd_flags & 0x10, 0x10); // default-sample-size present
    assert_eq!(tfhd_flags & 0x20, 0x20); // default-sample-flags present

    let trun_pos = data.windows(4).position(|w| w == b"trun").unwrap();
    let trun_flags = hls_coremux::bits::unpack_u32be(&data[trun_pos + 4..trun_pos + 8]) & 0x00FF_FFFF;
    assert_eq!(trun_flags, 0x01); // only data-offset present, no per-sample arrays
}
