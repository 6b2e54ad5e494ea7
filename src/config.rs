//! Small `(key, value)` configuration helper used by every muxer's
//! `configure` method (§6). Mirrors the permissive option handling in the
//! reference demuxers: unrecognised keys are logged and ignored rather
//! than rejected outright, but a muxer may still choose to reject a
//! malformed *value* for a key it does recognise.

/// A single configuration directive passed to `Muxer::configure`.
pub struct ConfigEntry<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

impl<'a> ConfigEntry<'a> {
    pub fn new(key: &'a str, value: &'a str) -> Self {
        ConfigEntry { key, value }
    }

    pub fn as_bool(&self) -> bool {
        matches!(self.value, "true" | "1" | "yes" | "on")
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.value.parse().ok()
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.value.parse().ok()
    }
}

pub fn log_unknown_key(muxer: &str, key: &str) {
    log::debug!("{muxer}: ignoring unrecognised configuration key {key:?}");
}
