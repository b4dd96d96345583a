//! Running per-session counters, per spec.md §4.2. Snapshots are taken
//! without locks by loading each atomic independently — see §5's "shared
//! resource policy" for why that's acceptable here (a CDR-time snapshot,
//! not a linearizable transaction).

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct RtpStats {
    pub packets_in: AtomicU64,
    pub packets_out: AtomicU64,
    pub bytes: AtomicU64,
    pub loss_count: AtomicU64,
    pub late_count: AtomicU64,
    pub reorder_count: AtomicU64,
    pub max_jitter: AtomicU32,
    pub ssrc_changes: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RtpStatsSnapshot {
    pub packets_in: u64,
    pub packets_out: u64,
    pub bytes: u64,
    pub loss_count: u64,
    pub late_count: u64,
    pub reorder_count: u64,
    pub max_jitter: u32,
    pub ssrc_changes: u64,
}

impl RtpStats {
    pub fn record_in(&self, payload_len: usize) {
        self.packets_in.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(payload_len as u64, Ordering::Relaxed);
    }

    pub fn record_out(&self, payload_len: usize) {
        self.packets_out.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(payload_len as u64, Ordering::Relaxed);
    }

    pub fn record_loss(&self) {
        self.loss_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_late(&self) {
        self.late_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reorder(&self) {
        self.reorder_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ssrc_change(&self) {
        self.ssrc_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_jitter(&self, jitter_samples: u32) {
        self.max_jitter.fetch_max(jitter_samples, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RtpStatsSnapshot {
        RtpStatsSnapshot {
            packets_in: self.packets_in.load(Ordering::Relaxed),
            packets_out: self.packets_out.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            loss_count: self.loss_count.load(Ordering::Relaxed),
            late_count: self.late_count.load(Ordering::Relaxed),
            reorder_count: self.reorder_count.load(Ordering::Relaxed),
            max_jitter: self.max_jitter.load(Ordering::Relaxed),
            ssrc_changes: self.ssrc_changes.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = RtpStats::default();
        stats.record_in(160);
        stats.record_in(160);
        stats.record_loss();
        let snap = stats.snapshot();
        assert_eq!(snap.packets_in, 2);
        assert_eq!(snap.bytes, 320);
        assert_eq!(snap.loss_count, 1);
    }

    #[test]
    fn max_jitter_keeps_the_high_watermark() {
        let stats = RtpStats::default();
        stats.update_jitter(10);
        stats.update_jitter(3);
        stats.update_jitter(25);
        assert_eq!(stats.snapshot().max_jitter, 25);
    }
}
