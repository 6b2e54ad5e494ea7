//! Per-sample bookkeeping for a fragment: flags packing and the running
//! uniformity tracker that drives the `tfhd`/`trun` field-selection
//! heuristic.
//!
//! Grounded on `fmp4_encode_sample_flags`/`fmp4_track_add_sample` in
//! `src/minifmp4.h`.

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleFlags {
    pub is_leading: u8,
    pub depends_on: u8,
    pub is_depended_on: u8,
    pub has_redundancy: u8,
    pub padding_value: u8,
    pub is_non_sync: bool,
    pub degradation_priority: u16,
}

impl SampleFlags {
    pub fn sync() -> Self {
        SampleFlags {
            depends_on: 2,
            is_non_sync: false,
            ..Default::default()
        }
    }

    pub fn non_sync() -> Self {
        SampleFlags {
            depends_on: 1,
            is_non_sync: true,
            ..Default::default()
        }
    }

    pub fn encode(&self) -> u32 {
        ((self.is_leading as u32 & 0x03) << 26)
            | ((self.depends_on as u32 & 0x03) << 24)
            | ((self.is_depended_on as u32 & 0x03) << 22)
            | ((self.has_redundancy as u32 & 0x03) << 20)
            | ((self.padding_value as u32 & 0x07) << 17)
            | ((self.is_non_sync as u32) << 16)
            | self.degradation_priority as u32
    }
}

#[derive(Copy, Clone, Debug)]
pub struct SampleInfo {
    pub duration: u32,
    pub size: u32,
    pub flags: SampleFlags,
    pub sample_group: u32,
}

/// Tracks whether every sample in the open fragment shares the same
/// duration, size, and flags, so the fragment writer can omit the
/// corresponding per-sample arrays.
#[derive(Default)]
pub struct UniformTracker {
    pub first_sample_flags: u32,
    pub duration_set: bool,
    pub duration: u32,
    pub size_set: bool,
    pub size: u32,
    pub flags_set: bool,
    pub flags: u32,
    count: usize,
}

impl UniformTracker {
    pub fn new() -> Self {
        UniformTracker::default()
    }

    pub fn observe(&mut self, info: &SampleInfo) {
        let encoded = info.flags.encode();
        self.count += 1;
        match self.count {
            1 => {
                self.first_sample_flags = encoded;
                self.flags_set = false;
                self.duration_set = true;
                self.duration = info.duration;
                self.size_set = true;
                self.size = info.size;
            }
            2 => {
                self.flags_set = true;
                self.flags = encoded;
                self.check_duration(info.duration);
                self.check_size(info.size);
            }
            _ => {
                if self.flags_set && self.flags != encoded {
                    self.flags_set = false;
                }
                self.check_duration(info.duration);
                self.check_size(info.size);
            }
        }
    }

    fn check_duration(&mut self, duration: u32) {
        if self.duration_set && self.duration != duration {
            self.duration_set = false;
        }
    }

    fn check_size(&mut self, size: u32) {
        if self.size_set && self.size != size {
            self.size_set = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(duration: u32, size: u32, flags: SampleFlags) -> SampleInfo {
        SampleInfo {
            duration,
            size,
            flags,
            sample_group: 0,
        }
    }

    #[test]
    fn uniform_fragment_keeps_all_bits_set() {
        let mut t = UniformTracker::new();
        t.observe(&sample(1024, 200, SampleFlags::sync()));
        t.observe(&sample(1024, 200, SampleFlags::sync()));
        t.observe(&sample(1024, 200, SampleFlags::sync()));
        assert!(t.duration_set && t.size_set && t.flags_set);
    }

    #[test]
    fn size_mismatch_clears_only_size_bit() {
        let mut t = UniformTracker::new();
        t.observe(&sample(1024, 200, SampleFlags::sync()));
        t.observe(&sample(1024, 201, SampleFlags::sync()));
        assert!(t.duration_set);
        assert!(!t.size_set);
    }

    #[test]
    fn sample_flags_encode_matches_bit_layout() {
        let f = SampleFlags {
            is_leading: 1,
            depends_on: 2,
            is_depended_on: 0,
            has_redundancy: 0,
            padding_value: 0,
            is_non_sync: true,
            degradation_priority: 0,
        };
        let v = f.encode();
        assert_eq!((v >> 26) & 0x03, 1);
        assert_eq!((v >> 24) & 0x03, 2);
        assert_eq!((v >> 16) & 0x01, 1);
    }
}
