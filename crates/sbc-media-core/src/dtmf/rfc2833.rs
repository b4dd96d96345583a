//! Relays RFC 2833 telephone-events (already parsed by `sbc-rtp-core`) into
//! digit events once the end-of-event marker arrives, so the pipeline only
//! needs to observe one completed digit per keypress.

use super::{DetectionMethod, DtmfDigitEvent};
use sbc_rtp_core::TelephoneEvent;

fn digit_for_event(event: u8) -> Option<char> {
    match event {
        0..=9 => Some((b'0' + event) as char),
        10 => Some('*'),
        11 => Some('#'),
        12..=15 => Some((b'A' + (event - 12)) as char),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct Rfc2833Extractor {
    pending: Option<u8>,
}

impl Rfc2833Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one decoded telephone-event packet. Returns a completed digit
    /// event only when the packet carries the end-of-event marker.
    pub fn push(&mut self, event: &TelephoneEvent) -> Option<DtmfDigitEvent> {
        if !event.end_of_event {
            self.pending = Some(event.event);
            return None;
        }
        self.pending = None;
        let digit = digit_for_event(event.event)?;
        // duration is in timestamp units (8000 Hz clock rate for audio RTP).
        let duration_ms = (event.duration as u32) / 8;
        Some(DtmfDigitEvent {
            digit,
            duration_ms,
            method: DetectionMethod::Rfc2833,
        })
    }
}
