//! Bounded, ordered jitter buffer keyed by RTP sequence number, per
//! spec.md §4.2. Holds raw (still codec-encoded) RTP payloads; the actual
//! PCM decode and packet-loss-concealment attenuation happen one layer up
//! in the media pipeline (C4) once a frame or a PLC marker comes out of
//! [`JitterBuffer::tick`].

use crate::stats::RtpStats;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_TARGET_DEPTH_MS: u32 = 40;
pub const DEFAULT_MAX_LATE_MS: u32 = 60;
const FRAME_MS: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playout {
    /// A decodable frame was available at the cursor.
    Frame(Bytes),
    /// Nothing was available; caller should synthesize concealment from
    /// the previously played frame.
    Conceal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
    Late,
}

/// Tracks one RTP stream's jitter buffer. `ext_seq` is the 16-bit wire
/// sequence number unwrapped to a monotonic `u64` so wraparound doesn't
/// break ordering.
pub struct JitterBuffer {
    max_late_ms: u32,
    target_depth_frames: u64,
    buffer: BTreeMap<u64, Bytes>,
    cursor: Option<u64>,
    highest_ext: Option<u64>,
    last_raw_seq: Option<u16>,
    stats: Option<Arc<RtpStats>>,
}

impl JitterBuffer {
    /// `target_depth_ms` is rounded up to whole 20 ms frames and must reach
    /// at least 1 frame of buffering before playout starts.
    pub fn new(target_depth_ms: u32, max_late_ms: u32) -> Self {
        let target_depth_frames = (target_depth_ms as u64).div_ceil(FRAME_MS as u64).max(1);
        JitterBuffer {
            max_late_ms,
            target_depth_frames,
            buffer: BTreeMap::new(),
            cursor: None,
            highest_ext: None,
            last_raw_seq: None,
            stats: None,
        }
    }

    pub fn with_stats(mut self, stats: Arc<RtpStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Unwraps a 16-bit wire sequence number against the highest one seen
    /// so far, picking whichever of {same cycle, one cycle back, one cycle
    /// forward} lands closest to the running high-water mark.
    fn extend_sequence(&mut self, raw: u16) -> u64 {
        let raw = raw as i64;
        let ext = match self.highest_ext {
            None => raw,
            Some(highest) => {
                let highest = highest as i64;
                let base = highest - (highest.rem_euclid(65536));
                let candidates = [base - 65536 + raw, base + raw, base + 65536 + raw];
                *candidates
                    .iter()
                    .min_by_key(|c| (*c - highest).abs())
                    .unwrap()
            }
        } as u64;
        if self.highest_ext.map_or(true, |h| ext > h) {
            self.highest_ext = Some(ext);
        }
        self.last_raw_seq = Some(raw as u16);
        ext
    }

    /// Resets all ordering state — called on SSRC change (spec.md §4.2).
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.cursor = None;
        self.highest_ext = None;
        self.last_raw_seq = None;
    }

    /// Inserts a packet's payload at its sequence position. Before the
    /// cursor starts, packets accumulate without ordering checks until
    /// `target_depth_frames` have arrived, per spec.md §4.2 — this is the
    /// buffering delay that absorbs jitter before playout begins.
    pub fn insert(&mut self, raw_seq: u16, payload: Bytes) -> InsertOutcome {
        let ext = self.extend_sequence(raw_seq);

        let Some(cursor) = self.cursor else {
            if self.buffer.contains_key(&ext) {
                return InsertOutcome::Duplicate;
            }
            self.buffer.insert(ext, payload);
            if self.buffer.len() as u64 >= self.target_depth_frames {
                self.cursor = self.buffer.keys().next().copied();
            }
            return InsertOutcome::Inserted;
        };

        if self.buffer.contains_key(&ext) {
            return InsertOutcome::Duplicate;
        }
        if ext < cursor {
            // Already past the playout cursor: there is no frame to
            // rewind to. Only count it as late-loss once it's further
            // behind than max_late_ms — ordinary jitter that lost the
            // race to the cursor by a frame or two is expected traffic.
            let late_ms = (cursor - ext) * FRAME_MS as u64;
            if late_ms > self.max_late_ms as u64 {
                if let Some(stats) = &self.stats {
                    stats.record_late();
                }
            }
            return InsertOutcome::Late;
        }
        if ext != cursor {
            if let Some(stats) = &self.stats {
                stats.record_reorder();
            }
        }
        self.buffer.insert(ext, payload);
        InsertOutcome::Inserted
    }

    /// Advances the playout cursor by one 20 ms frame, returning the frame
    /// at that position or [`Playout::Conceal`] if it never arrived.
    pub fn tick(&mut self) -> Playout {
        let cursor = match self.cursor {
            Some(c) => c,
            None => return Playout::Conceal,
        };
        let result = match self.buffer.remove(&cursor) {
            Some(payload) => Playout::Frame(payload),
            None => {
                if let Some(stats) = &self.stats {
                    stats.record_loss();
                }
                Playout::Conceal
            }
        };
        self.cursor = Some(cursor + 1);
        result
    }

    pub fn buffered_frames(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(n: u8) -> Bytes {
        Bytes::from(vec![n; 4])
    }

    #[test]
    fn sequential_insert_and_playout() {
        let mut jb = JitterBuffer::new(DEFAULT_TARGET_DEPTH_MS, DEFAULT_MAX_LATE_MS);
        jb.insert(100, payload(1));
        jb.insert(101, payload(2));
        assert_eq!(jb.tick(), Playout::Frame(payload(1)));
        assert_eq!(jb.tick(), Playout::Frame(payload(2)));
    }

    #[test]
    fn missing_frame_yields_conceal_and_advances_cursor() {
        let mut jb = JitterBuffer::new(DEFAULT_TARGET_DEPTH_MS, DEFAULT_MAX_LATE_MS);
        jb.insert(100, payload(1));
        jb.insert(102, payload(3));
        assert_eq!(jb.tick(), Playout::Frame(payload(1)));
        assert_eq!(jb.tick(), Playout::Conceal);
        assert_eq!(jb.tick(), Playout::Frame(payload(3)));
    }

    #[test]
    fn reordered_arrival_is_inserted_in_order() {
        let mut jb = JitterBuffer::new(DEFAULT_TARGET_DEPTH_MS, DEFAULT_MAX_LATE_MS);
        jb.insert(100, payload(1));
        jb.insert(102, payload(3));
        jb.insert(101, payload(2));
        assert_eq!(jb.tick(), Playout::Frame(payload(1)));
        assert_eq!(jb.tick(), Playout::Frame(payload(2)));
        assert_eq!(jb.tick(), Playout::Frame(payload(3)));
    }

    #[test]
    fn duplicate_seq_and_timestamp_is_dropped() {
        let mut jb = JitterBuffer::new(DEFAULT_TARGET_DEPTH_MS, DEFAULT_MAX_LATE_MS);
        jb.insert(100, payload(1));
        assert_eq!(jb.insert(100, payload(9)), InsertOutcome::Duplicate);
    }

    #[test]
    fn sequence_wraparound_stays_monotonic() {
        let mut jb = JitterBuffer::new(DEFAULT_TARGET_DEPTH_MS, DEFAULT_MAX_LATE_MS);
        jb.insert(65534, payload(1));
        jb.insert(65535, payload(2));
        jb.insert(0, payload(3));
        jb.insert(1, payload(4));
        assert_eq!(jb.tick(), Playout::Frame(payload(1)));
        assert_eq!(jb.tick(), Playout::Frame(payload(2)));
        assert_eq!(jb.tick(), Playout::Frame(payload(3)));
        assert_eq!(jb.tick(), Playout::Frame(payload(4)));
    }

    #[test]
    fn very_late_packet_is_dropped_as_late_loss() {
        let mut jb = JitterBuffer::new(FRAME_MS, 60);
        jb.insert(200, payload(1));
        jb.insert(199, payload(2)); // before cursor, within window
        assert_eq!(jb.insert(100, payload(3)), InsertOutcome::Late);
    }

    #[test]
    fn reset_clears_ordering_state() {
        let mut jb = JitterBuffer::new(FRAME_MS, DEFAULT_MAX_LATE_MS);
        jb.insert(100, payload(1));
        jb.reset();
        jb.insert(5000, payload(9));
        assert_eq!(jb.tick(), Playout::Frame(payload(9)));
    }
}
