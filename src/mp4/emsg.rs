//! `emsg` (ISO 23009-1) DASH event messages, used here to carry ID3-framed
//! timed metadata alongside a fragment.
//!
//! Grounded on `fmp4_box_emsg`/`fmp4_emsg_validate` in `src/minifmp4.h` and
//! the `AOID3_SCHEME_ID_URI`/`AOID3_VALUE` constants in
//! `src/muxer_plugin_fmp4.c`.

use crate::error::Mp4Error;

pub const ID3_SCHEME_ID_URI: &str = "https://aomedia.org/emsg/ID3";
pub const ID3_VALUE: &str = "0";

#[derive(Clone, Debug)]
pub struct Emsg {
    pub version: u8,
    pub timescale: u32,
    pub presentation_time: u64,
    pub presentation_time_delta: u32,
    pub event_duration: u32,
    pub id: u32,
    pub scheme_id_uri: String,
    pub value: String,
    pub message: Vec<u8>,
}

impl Emsg {
    pub fn new_id3(version: u8, timescale: u32, presentation_time: u64, id: u32, message: Vec<u8>) -> Self {
        Emsg {
            version,
            timescale,
            presentation_time,
            presentation_time_delta: 0,
            event_duration: u32::MAX,
            id,
            scheme_id_uri: ID3_SCHEME_ID_URI.to_string(),
            value: ID3_VALUE.to_string(),
            message,
        }
    }

    pub fn validate(&self) -> Result<(), Mp4Error> {
        if self.version > 1 {
            return Err(Mp4Error::InvalidEmsgVersion(self.version));
        }
        if self.timescale == 0 {
            return Err(Mp4Error::InvalidTimescale(self.timescale));
        }
        if self.scheme_id_uri.is_empty() {
            return Err(Mp4Error::EmsgMissingField("scheme_id_uri"));
        }
        if self.value.is_empty() {
            return Err(Mp4Error::EmsgMissingField("value"));
        }
        if self.message.is_empty() {
            return Err(Mp4Error::EmsgMissingField("message"));
        }
        Ok(())
    }

    pub fn write(&self, bw: &mut super::boxwriter::BoxWriter) -> Result<(), Mp4Error> {
        self.validate()?;
        bw.begin_full(b"emsg", self.version, 0);
        if self.version == 0 {
            bw.cstr(&self.scheme_id_uri);
            bw.cstr(&self.value);
            bw.u32(self.timescale);
            bw.u32(self.presentation_time_delta);
            bw.u32(self.event_duration);
            bw.u32(self.id);
        } else {
            bw.u32(self.timescale);
            bw.u64(self.presentation_time);
            bw.u32(self.event_duration);
            bw.u32(self.id);
            bw.cstr(&self.scheme_id_uri);
            bw.cstr(&self.value);
        }
        bw.bytes(&self.message);
        bw.end(b"emsg")
    }
}
