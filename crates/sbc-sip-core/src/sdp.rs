//! SDP offer/answer, restricted to the subset of RFC 4566 this core needs:
//! `v`, `o`, `s`, `c`, `t`, `m`, `a` lines, single audio `m=` section,
//! PCMU(0)/PCMA(8) payload types only.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCodec {
    Pcmu,
    Pcma,
}

impl AudioCodec {
    pub fn payload_type(self) -> u8 {
        match self {
            AudioCodec::Pcmu => 0,
            AudioCodec::Pcma => 8,
        }
    }

    pub fn rtpmap_name(self) -> &'static str {
        match self {
            AudioCodec::Pcmu => "PCMU",
            AudioCodec::Pcma => "PCMA",
        }
    }

    fn from_payload_type(pt: u8) -> Option<Self> {
        match pt {
            0 => Some(AudioCodec::Pcmu),
            8 => Some(AudioCodec::Pcma),
            _ => None,
        }
    }
}

/// The preference order this core negotiates with, per spec.md §4.6.
pub const CODEC_PREFERENCE: [AudioCodec; 2] = [AudioCodec::Pcmu, AudioCodec::Pcma];

#[derive(Debug, Clone)]
pub struct SdpOffer {
    pub connection_ip: String,
    pub media_port: u16,
    pub payload_types: Vec<u8>,
}

/// Parses the subset of an SDP body needed to answer it: the connection
/// address/port and the audio `m=` line's payload-type list. Everything
/// else (`v=`, `o=`, `s=`, `t=`, unrecognized `a=`) is accepted and
/// ignored rather than rejected, matching the "parse only what's needed"
/// scope of spec.md §4.6.
pub fn parse_offer(body: &str) -> Result<SdpOffer> {
    let mut connection_ip = None;
    let mut media_port = None;
    let mut payload_types = Vec::new();

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("c=") {
            // c=IN IP4 <addr>
            let mut parts = rest.split_whitespace();
            let _nettype = parts.next();
            let _addrtype = parts.next();
            if let Some(addr) = parts.next() {
                connection_ip = Some(addr.to_string());
            }
        } else if let Some(rest) = line.strip_prefix("m=audio ") {
            // m=audio <port> RTP/AVP <pt> [<pt> ...]
            let mut parts = rest.split_whitespace();
            let port: u16 = parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| Error::InvalidSdp("malformed m=audio line".into()))?;
            media_port = Some(port);
            let _proto = parts.next();
            for pt in parts {
                if let Ok(pt) = pt.parse::<u8>() {
                    payload_types.push(pt);
                }
            }
        }
    }

    Ok(SdpOffer {
        connection_ip: connection_ip
            .ok_or_else(|| Error::InvalidSdp("missing c= line".into()))?,
        media_port: media_port.ok_or_else(|| Error::InvalidSdp("missing m=audio line".into()))?,
        payload_types,
    })
}

/// Selects the negotiated codec from an offer's payload-type list by the
/// fixed preference order {PCMU, PCMA}. Returns [`Error::NoCompatibleCodec`]
/// (mapped to SIP 488 by the caller) if neither is offered.
pub fn select_codec(offer: &SdpOffer) -> Result<AudioCodec> {
    for candidate in CODEC_PREFERENCE {
        if offer.payload_types.contains(&candidate.payload_type()) {
            return Ok(candidate);
        }
    }
    Err(Error::NoCompatibleCodec)
}

/// Builds the SDP answer body advertising `media_ip:media_port` and the
/// negotiated codec, per spec.md §4.6.
pub fn build_answer(media_ip: &str, media_port: u16, codec: AudioCodec) -> String {
    let pt = codec.payload_type();
    format!(
        "v=0\r\n\
o=- 0 0 IN IP4 {media_ip}\r\n\
s=-\r\n\
c=IN IP4 {media_ip}\r\n\
t=0 0\r\n\
m=audio {media_port} RTP/AVP {pt}\r\n\
a=rtpmap:{pt} {}/8000\r\n\
a=sendrecv\r\n",
        codec.rtpmap_name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFER_PCMU: &str = "v=0\r\no=- 1 1 IN IP4 198.51.100.2\r\ns=-\r\nc=IN IP4 198.51.100.2\r\nt=0 0\r\nm=audio 10000 RTP/AVP 0 101\r\na=rtpmap:0 PCMU/8000\r\n";
    const OFFER_NO_MATCH: &str = "v=0\r\no=- 1 1 IN IP4 198.51.100.2\r\ns=-\r\nc=IN IP4 198.51.100.2\r\nt=0 0\r\nm=audio 10000 RTP/AVP 18\r\n";

    #[test]
    fn parses_connection_and_payload_types() {
        let offer = parse_offer(OFFER_PCMU).unwrap();
        assert_eq!(offer.connection_ip, "198.51.100.2");
        assert_eq!(offer.media_port, 10000);
        assert_eq!(offer.payload_types, vec![0, 101]);
    }

    #[test]
    fn selects_pcmu_when_offered() {
        let offer = parse_offer(OFFER_PCMU).unwrap();
        assert_eq!(select_codec(&offer).unwrap(), AudioCodec::Pcmu);
    }

    #[test]
    fn rejects_offer_without_pcmu_or_pcma() {
        let offer = parse_offer(OFFER_NO_MATCH).unwrap();
        assert_eq!(select_codec(&offer), Err(Error::NoCompatibleCodec));
    }

    #[test]
    fn answer_advertises_local_media_and_codec() {
        let answer = build_answer("203.0.113.9", 20004, AudioCodec::Pcma);
        assert!(answer.contains("c=IN IP4 203.0.113.9"));
        assert!(answer.contains("m=audio 20004 RTP/AVP 8"));
        assert!(answer.contains("a=rtpmap:8 PCMA/8000"));
        assert!(answer.contains("a=sendrecv"));
    }

    #[test]
    fn prefers_pcmu_over_pcma_when_both_offered() {
        let offer = SdpOffer {
            connection_ip: "198.51.100.2".into(),
            media_port: 10000,
            payload_types: vec![8, 0],
        };
        assert_eq!(select_codec(&offer).unwrap(), AudioCodec::Pcmu);
    }
}
