//! Per-call RTP session: outgoing sequence/timestamp/SSRC bookkeeping and
//! incoming packet classification, per spec.md §4.2.

use crate::jitter::JitterBuffer;
use crate::packet::{RtpPacket, TelephoneEvent, PT_TELEPHONE_EVENT};
use crate::stats::RtpStats;
use bytes::Bytes;
use rand::Rng;
use std::sync::Arc;

/// Outcome of feeding one inbound UDP datagram to [`RtpSession::receive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Audio payload was accepted into the jitter buffer for playout on a
    /// later tick, plus whether the SSRC changed on this packet (jitter
    /// buffer was reset as a result).
    Buffered { ssrc_changed: bool },
    Dtmf(TelephoneEvent),
    Discard,
}

pub struct RtpSession {
    ssrc: u32,
    next_sequence: u16,
    timestamp: u32,
    peer_ssrc: Option<u32>,
    stats: Arc<RtpStats>,
    jitter: JitterBuffer,
    last_dtmf: Option<(u8, u32)>, // (event, start timestamp) for dedup
}

impl RtpSession {
    pub fn new(target_depth_ms: u32, max_late_ms: u32) -> Self {
        let stats = Arc::new(RtpStats::default());
        let ssrc: u32 = rand::thread_rng().gen();
        let next_sequence: u16 = rand::thread_rng().gen();
        RtpSession {
            ssrc,
            next_sequence,
            timestamp: 0,
            peer_ssrc: None,
            jitter: JitterBuffer::new(target_depth_ms, max_late_ms).with_stats(stats.clone()),
            stats,
            last_dtmf: None,
        }
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn stats(&self) -> Arc<RtpStats> {
        self.stats.clone()
    }

    /// Builds and returns the next outgoing RTP packet. `sample_count` is
    /// the payload's sample count at the codec's clock rate (160 @ 8 kHz
    /// for a 20 ms G.711 frame), used to advance the RTP timestamp.
    pub fn send(&mut self, payload: Bytes, marker: bool, payload_type: u8, sample_count: u32) -> RtpPacket {
        let packet = RtpPacket {
            version: 2,
            marker,
            payload_type,
            sequence_number: self.next_sequence,
            timestamp: self.timestamp,
            ssrc: self.ssrc,
            payload: payload.clone(),
        };
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(sample_count);
        self.stats.record_out(payload.len());
        packet
    }

    /// Parses an inbound datagram, routes telephone-events to DTMF,
    /// PCMU/PCMA to the jitter buffer, and silently discards malformed or
    /// foreign-SSRC traffic per spec.md §4.2.
    pub fn receive(&mut self, datagram: &[u8], expected_codec_pt: u8) -> ReceiveOutcome {
        let packet = match RtpPacket::decode(datagram) {
            Ok(p) => p,
            Err(_) => return ReceiveOutcome::Discard,
        };

        let mut ssrc_changed = false;
        match self.peer_ssrc {
            None => self.peer_ssrc = Some(packet.ssrc),
            Some(current) if current != packet.ssrc => {
                self.peer_ssrc = Some(packet.ssrc);
                self.jitter.reset();
                self.stats.record_ssrc_change();
                ssrc_changed = true;
            }
            _ => {}
        }

        self.stats.record_in(packet.payload.len());

        if packet.payload_type == PT_TELEPHONE_EVENT {
            return match TelephoneEvent::decode(&packet.payload) {
                Ok(event) => {
                    let key = (event.event, packet.timestamp);
                    if self.last_dtmf == Some(key) && !event.end_of_event {
                        // Mid-event retransmit of an event we've already
                        // seen at this start timestamp: suppress.
                        return ReceiveOutcome::Discard;
                    }
                    if event.end_of_event {
                        self.last_dtmf = None;
                    } else {
                        self.last_dtmf = Some(key);
                    }
                    ReceiveOutcome::Dtmf(event)
                }
                Err(_) => ReceiveOutcome::Discard,
            };
        }

        if packet.payload_type != expected_codec_pt {
            return ReceiveOutcome::Discard;
        }

        match self.jitter.insert(packet.sequence_number, packet.payload) {
            crate::jitter::InsertOutcome::Inserted => ReceiveOutcome::Buffered { ssrc_changed },
            _ => ReceiveOutcome::Discard,
        }
    }

    /// Advances the jitter buffer's playout cursor by one 20 ms frame.
    pub fn tick_playout(&mut self) -> crate::jitter::Playout {
        self.jitter.tick()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_advances_sequence_and_timestamp() {
        let mut session = RtpSession::new(40, 60);
        let first = session.send(Bytes::from_static(&[0u8; 160]), false, 0, 160);
        let second = session.send(Bytes::from_static(&[0u8; 160]), false, 0, 160);
        assert_eq!(second.sequence_number, first.sequence_number.wrapping_add(1));
        assert_eq!(second.timestamp, first.timestamp.wrapping_add(160));
        assert_eq!(first.ssrc, session.ssrc());
    }

    #[test]
    fn receive_routes_telephone_event_to_dtmf() {
        let mut session = RtpSession::new(40, 60);
        let event = TelephoneEvent {
            event: 5,
            end_of_event: true,
            volume: 10,
            duration: 160,
        };
        let packet = RtpPacket {
            version: 2,
            marker: true,
            payload_type: PT_TELEPHONE_EVENT,
            sequence_number: 1,
            timestamp: 1000,
            ssrc: 0x1234,
            payload: event.encode(),
        };
        let outcome = session.receive(&packet.encode(), 0);
        assert_eq!(outcome, ReceiveOutcome::Dtmf(event));
    }

    #[test]
    fn receive_discards_malformed_packet() {
        let mut session = RtpSession::new(40, 60);
        assert_eq!(session.receive(&[0u8; 4], 0), ReceiveOutcome::Discard);
    }

    #[test]
    fn ssrc_change_resets_jitter_and_increments_counter() {
        let mut session = RtpSession::new(40, 60);
        let p1 = RtpPacket {
            version: 2,
            marker: false,
            payload_type: 0,
            sequence_number: 1,
            timestamp: 0,
            ssrc: 1,
            payload: Bytes::from_static(&[0u8; 160]),
        };
        session.receive(&p1.encode(), 0);
        let p2 = RtpPacket { ssrc: 2, sequence_number: 2, ..p1.clone() };
        let outcome = session.receive(&p2.encode(), 0);
        assert_eq!(outcome, ReceiveOutcome::Buffered { ssrc_changed: true });
        assert_eq!(session.stats().snapshot().ssrc_changes, 1);
    }

    #[test]
    fn retransmitted_dtmf_mid_event_is_suppressed() {
        let mut session = RtpSession::new(40, 60);
        let event = TelephoneEvent {
            event: 5,
            end_of_event: false,
            volume: 10,
            duration: 80,
        };
        let packet = RtpPacket {
            version: 2,
            marker: true,
            payload_type: PT_TELEPHONE_EVENT,
            sequence_number: 1,
            timestamp: 1000,
            ssrc: 9,
            payload: event.encode(),
        };
        session.receive(&packet.encode(), 0);
        // Same event/timestamp, still mid-event: a retransmit, suppressed.
        let outcome = session.receive(&packet.encode(), 0);
        assert_eq!(outcome, ReceiveOutcome::Discard);
    }
}
