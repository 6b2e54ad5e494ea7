//! fMP4 init segment for AAC-LC stereo 48 kHz: ftyp brand iso6, moov with
//! one mp4a trak carrying the AudioSpecificConfig in esds.

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

#[test]
fn init_segment_carries_ftyp_moov_and_audio_specific_config() {
    let mut mux = Mp4Muxer::new();
    mux.open(aac_source()).unwrap();
    let segs = mux
        .submit_packet(Packet {
            data: vec![0u8; 411],
            duration: 1024,
            sample_rate: 48000,
            pts: 0,
            sync: true,
            sample_group: 0,
        })
        .unwrap();

    assert_eq!(segs.len(), 1);
    let init = &segs[0].data;
    assert_eq!(&init[4..8], b"ftyp");
    assert_eq!(&init[8..12], b"iso6");
    assert!(init.windows(4).any(|w| w == b"aid3"));
    assert!(init.windows(4).any(|w| w == b"moov"));
    assert!(init.windows(4).any(|w| w == b"mdhd"));
    assert!(init.windows(4).any(|w| w == b"hdlr"));
    assert!(init.windows(4).any(|w| w == b"soun"));
    assert!(init.windows(4).any(|w| w == b"mp4a"));
    assert!(init.windows(4).any(|w| w == b"esds"));
    assert!(init.windows(4).any(|w| w == b"trex"));
    // AudioSpecificConfig bytes must appear verbatim somewhere in esds.
    assert!(init.windows(2).any(|w| w == [0x11, 0x90]));
}
