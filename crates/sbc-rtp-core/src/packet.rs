//! RFC 3550 RTP packet encode/decode — the fixed 12-byte header plus
//! payload, no header extensions or CSRC list (neither is used on this
//! call path).

use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

pub const HEADER_LEN: usize = 12;
pub const RTP_VERSION: u8 = 2;

/// RFC 4733 telephone-event payload type.
pub const PT_TELEPHONE_EVENT: u8 = 101;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub version: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub payload: Bytes,
}

impl RtpPacket {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        let first_byte = (self.version << 6) | 0u8; // padding=0, extension=0, CC=0
        buf.put_u8(first_byte);
        let marker_bit = if self.marker { 0x80 } else { 0x00 };
        buf.put_u8(marker_bit | (self.payload_type & 0x7f));
        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(Error::TooShort(data.len()));
        }
        let version = data[0] >> 6;
        if version != RTP_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        let cc = (data[0] & 0x0f) as usize;
        let marker = data[1] & 0x80 != 0;
        let payload_type = data[1] & 0x7f;
        let sequence_number = u16::from_be_bytes([data[2], data[3]]);
        let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let csrc_len = cc * 4;
        let payload_start = HEADER_LEN + csrc_len;
        if data.len() < payload_start {
            return Err(Error::TooShort(data.len()));
        }

        Ok(RtpPacket {
            version,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            payload: Bytes::copy_from_slice(&data[payload_start..]),
        })
    }
}

/// RFC 4733 telephone-event payload: event code, end-bit, volume, duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelephoneEvent {
    pub event: u8,
    pub end_of_event: bool,
    pub volume: u8,
    pub duration: u16,
}

impl TelephoneEvent {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < 4 {
            return Err(Error::TooShort(payload.len()));
        }
        Ok(TelephoneEvent {
            event: payload[0],
            end_of_event: payload[1] & 0x80 != 0,
            volume: payload[1] & 0x3f,
            duration: u16::from_be_bytes([payload[2], payload[3]]),
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(4);
        buf.put_u8(self.event);
        let r_byte = if self.end_of_event { 0x80 } else { 0x00 } | (self.volume & 0x3f);
        buf.put_u8(r_byte);
        buf.put_u16(self.duration);
        buf.freeze()
    }

    /// Maps a DTMF digit to the RFC 4733 event code.
    pub fn event_for_digit(digit: char) -> Option<u8> {
        match digit {
            '0'..='9' => Some(digit as u8 - b'0'),
            '*' => Some(10),
            '#' => Some(11),
            'A'..='D' => Some(12 + (digit as u8 - b'A')),
            _ => None,
        }
    }

    pub fn digit_for_event(event: u8) -> Option<char> {
        match event {
            0..=9 => Some((b'0' + event) as char),
            10 => Some('*'),
            11 => Some('#'),
            12..=15 => Some((b'A' + (event - 12)) as char),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_audio_packet() -> RtpPacket {
        RtpPacket {
            version: RTP_VERSION,
            marker: false,
            payload_type: 0,
            sequence_number: 42,
            timestamp: 16000,
            ssrc: 0xdead_beef,
            payload: Bytes::from_static(&[0xffu8; 160]),
        }
    }

    #[test]
    fn encode_decode_round_trips() {
        let packet = sample_audio_packet();
        let wire = packet.encode();
        let decoded = RtpPacket::decode(&wire).unwrap();
        assert_eq!(packet, decoded);
    }

    #[test]
    fn rejects_short_packet() {
        assert_eq!(RtpPacket::decode(&[0u8; 4]), Err(Error::TooShort(4)));
    }

    #[test]
    fn rejects_wrong_version() {
        let mut wire = sample_audio_packet().encode().to_vec();
        wire[0] = 0b0100_0000; // version 1
        assert_eq!(RtpPacket::decode(&wire), Err(Error::UnsupportedVersion(1)));
    }

    #[test]
    fn marker_bit_survives_round_trip() {
        let mut packet = sample_audio_packet();
        packet.marker = true;
        let decoded = RtpPacket::decode(&packet.encode()).unwrap();
        assert!(decoded.marker);
    }

    #[test]
    fn telephone_event_round_trips() {
        let event = TelephoneEvent {
            event: 5,
            end_of_event: true,
            volume: 10,
            duration: 160,
        };
        let decoded = TelephoneEvent::decode(&event.encode()).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn digit_event_mapping_is_consistent() {
        for digit in "0123456789*#ABCD".chars() {
            let event = TelephoneEvent::event_for_digit(digit).unwrap();
            assert_eq!(TelephoneEvent::digit_for_event(event), Some(digit));
        }
    }
}
