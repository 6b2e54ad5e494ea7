//! Streaming audio muxer pipeline: takes codec packets (AAC, ALAC, FLAC,
//! Opus, MP3, AC-3, E-AC-3) and produces fragmented MP4, MPEG-TS, packed
//! elementary-stream, raw FLAC, and chained-Ogg segments for HLS delivery.
//!
//! Grounded on the `icecast-hls` muxer plugin family (`src/muxer_plugin_*.c`,
//! `src/minifmp4.h`, `src/miniogg.h`, `src/ts.c`); see `DESIGN.md` for the
//! module-by-module grounding ledger.

pub mod adts;
pub mod bits;
pub mod config;
pub mod crc;
pub mod error;
pub mod flacmux;
pub mod id3;
pub mod mp4;
pub mod muxer;
pub mod ogg;
pub mod packed;
pub mod ts;
pub mod types;
pub mod vorbis;

pub use error::MuxError;
pub use muxer::{Muxer, MuxerCaps};
pub use types::{Codec, Packet, PacketSource, Segment, SegmentKind, SegmentParams, Tag, TagList};
