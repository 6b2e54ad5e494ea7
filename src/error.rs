//! Per-subsystem error enums, each convertible into the top-level
//! [`MuxError`]: a flat `thiserror` enum per concern, `#[error(transparent)]`
//! wrapping the underlying `std::io::Error` where a module performs raw I/O.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BitError {
    #[error("bitwriter operation would overflow the accumulator")]
    Overflow,
}

#[derive(Error, Debug)]
pub enum AdtsError {
    #[error("unsupported sample rate {0}")]
    InvalidSampleRate(u32),
    #[error("channel layout {0:#x} has no ADTS channel configuration")]
    InvalidChannelLayout(u64),
    #[error("unsupported AAC profile {0}")]
    InvalidProfile(u8),
    #[error("packet of {0} bytes exceeds the ADTS maximum payload")]
    PacketTooLarge(usize),
}

#[derive(Error, Debug)]
pub enum OggError {
    #[error("packet of {0} bytes cannot fit in any number of Ogg pages")]
    OutOfMemory(usize),
    #[error(transparent)]
    Write(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum Id3Error {
    #[error("frame {0} is not a recognised ID3 frame")]
    UnsupportedFrame(String),
    #[error(transparent)]
    Write(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum TsError {
    #[error("codec {0:?} cannot be carried in an MPEG-TS PES stream")]
    InvalidCodec(crate::types::Codec),
    #[error("segment duration produced a PES packet larger than 65535 bytes")]
    Overflow,
    #[error(transparent)]
    Write(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum Mp4Error {
    #[error("box stack imbalance: expected to close {expected:?}, found {found:?}")]
    StackMismatch { expected: [u8; 4], found: [u8; 4] },
    #[error("box payload of {0} bytes exceeds the 4 GiB box-size limit")]
    BoxTooBig(u64),
    #[error("descriptor tag payload of {0} bytes exceeds 2^28-1")]
    EsTagTooBig(usize),
    #[error("track is missing required decoder-specific info")]
    MissingDsi,
    #[error("invalid channel count {0}")]
    InvalidChannels(u16),
    #[error("invalid track timescale {0}")]
    InvalidTimescale(u32),
    #[error("track is missing a stream type")]
    InvalidStreamType,
    #[error("track is missing a codec")]
    InvalidCodec,
    #[error("loudness measurement has no sample_peak or true_peak set")]
    InvalidPeak,
    #[error("loudness measurement system {0} is out of range 0-5")]
    InvalidSystem(u8),
    #[error("loudness measurement reliability {0} is out of range 0-3")]
    InvalidReliability(u8),
    #[error("unrecognised loudness measurement method {0}")]
    InvalidMethod(u8),
    #[error("mux has no tracks")]
    NoTracks,
    #[error("fragment has no samples")]
    NoSamples,
    #[error("emsg is missing field {0}")]
    EmsgMissingField(&'static str),
    #[error("emsg version {0} is not 0 or 1")]
    InvalidEmsgVersion(u8),
    #[error(transparent)]
    Write(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum PackedError {
    #[error(transparent)]
    Id3(#[from] Id3Error),
    #[error(transparent)]
    Adts(#[from] AdtsError),
}

#[derive(Error, Debug)]
pub enum FlacMuxError {
    #[error("stream_info (dsi) is required to open a FLAC muxer")]
    MissingStreamInfo,
    #[error(transparent)]
    Write(#[from] std::io::Error),
}

/// Top-level error unifying every subsystem, returned from [`crate::muxer::Muxer`].
#[derive(Error, Debug)]
pub enum MuxError {
    #[error(transparent)]
    Adts(#[from] AdtsError),
    #[error(transparent)]
    Ogg(#[from] OggError),
    #[error(transparent)]
    Id3(#[from] Id3Error),
    #[error(transparent)]
    Ts(#[from] TsError),
    #[error(transparent)]
    Mp4(#[from] Mp4Error),
    #[error(transparent)]
    Packed(#[from] PackedError),
    #[error(transparent)]
    Flac(#[from] FlacMuxError),
    #[error(transparent)]
    Bit(#[from] BitError),
    #[error("unknown configuration key {0:?} for this muxer")]
    UnknownConfigKey(String),
    #[error("invalid configuration value {value:?} for key {key:?}")]
    InvalidConfigValue { key: String, value: String },
}
