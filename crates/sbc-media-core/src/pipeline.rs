//! Per-call media pipeline: RTP <-> AI-bridge audio transform, per
//! spec.md §4.4. A 20 ms ticker drives both the jitter buffer's playout
//! cursor (ingress) and the egress frame queue; socket I/O feeds in from
//! the edges. Grounded on the teacher's `media-core::relay` task-per-leg
//! shape, narrowed to the fixed PCMU/PCMA <-> 16 kHz PCM transform this
//! bridge needs.

use crate::codec;
use crate::dtmf::{DetectionMethod, DtmfDigitEvent, GoertzelDetector, Rfc2833Extractor};
use crate::ports::PortAllocator;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use sbc_rtp_core::{Playout, ReceiveOutcome, RtpSession};
use sbc_sip_core::AudioCodec;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

const EGRESS_QUEUE_CAPACITY: usize = 10;
/// PLC concealment attenuation: -3 dB per missed frame, i.e. amplitude *
/// 10^(-3/20) applied to the last successfully decoded frame.
const PLC_ATTENUATION: f32 = 0.7079458;

pub struct MediaPipeline {
    session: RtpSession,
    codec: AudioCodec,
    ingress_resampler: crate::resample::Resampler,
    egress_resampler: crate::resample::Resampler,
    rfc2833: Rfc2833Extractor,
    goertzel: GoertzelDetector,
    egress_queue: VecDeque<Vec<i16>>,
    egress_overflow_count: u64,
    last_good_pcm8k: Option<Vec<i16>>,
    concealment_runs: u32,
}

pub enum IngressOutput {
    /// 20 ms of PCM16@16k, base64-encoded, ready for a WS audio_data frame.
    AudioFrame(String),
    Dtmf(DtmfDigitEvent),
    Nothing,
}

impl MediaPipeline {
    pub fn new(codec: AudioCodec, target_depth_ms: u32, max_late_ms: u32) -> Self {
        MediaPipeline {
            session: RtpSession::new(target_depth_ms, max_late_ms),
            codec,
            ingress_resampler: crate::resample::Resampler::new(crate::resample::Direction::Upsample8kTo16k),
            egress_resampler: crate::resample::Resampler::new(crate::resample::Direction::Downsample16kTo8k),
            rfc2833: Rfc2833Extractor::new(),
            goertzel: GoertzelDetector::new(),
            egress_queue: VecDeque::with_capacity(EGRESS_QUEUE_CAPACITY),
            egress_overflow_count: 0,
            last_good_pcm8k: None,
            concealment_runs: 0,
        }
    }

    pub fn local_ssrc(&self) -> u32 {
        self.session.ssrc()
    }

    pub fn egress_overflow_count(&self) -> u64 {
        self.egress_overflow_count
    }

    /// Feeds one inbound UDP datagram. DTMF (RFC 2833 or, as a fallback,
    /// in-band Goertzel detection on the decoded audio) is surfaced
    /// immediately; audio payload is buffered and only emerges from a
    /// later `tick_ingress`.
    pub fn push_ingress_udp(&mut self, datagram: &[u8]) -> Option<DtmfDigitEvent> {
        match self.session.receive(datagram, self.codec.payload_type()) {
            ReceiveOutcome::Dtmf(event) => self.rfc2833.push(&event),
            ReceiveOutcome::Buffered { .. } | ReceiveOutcome::Discard => None,
        }
    }

    /// Advances the ingress path by one 20 ms frame: pulls the jitter
    /// buffer's playout cursor, decodes, resamples to 16 kHz, and
    /// base64-encodes for the AI Bridge. Runs Goertzel in-band DTMF
    /// detection on the decoded 8 kHz PCM as a fallback path.
    pub fn tick_ingress(&mut self) -> IngressOutput {
        let pcm8k = match self.session.tick_playout() {
            Playout::Frame(bytes) => match self.decode(&bytes) {
                Ok(pcm) => {
                    self.last_good_pcm8k = Some(pcm.clone());
                    self.concealment_runs = 0;
                    pcm
                }
                Err(e) => {
                    warn!(error = %e, "failed to decode ingress payload, concealing");
                    self.conceal()
                }
            },
            Playout::Conceal => self.conceal(),
        };

        if let Some(digit) = self.goertzel.push_frame(&pcm8k) {
            return IngressOutput::Dtmf(digit);
        }

        match self.ingress_resampler.resample(&pcm8k) {
            Ok(pcm16k) => IngressOutput::AudioFrame(encode_pcm16_base64(&pcm16k)),
            Err(e) => {
                warn!(error = %e, "ingress resample failed, dropping frame");
                IngressOutput::Nothing
            }
        }
    }

    fn decode(&self, payload: &Bytes) -> crate::error::Result<Vec<i16>> {
        match self.codec {
            AudioCodec::Pcmu => codec::decode_pcmu(payload),
            AudioCodec::Pcma => codec::decode_pcma(payload),
        }
    }

    fn encode(&self, pcm: &[i16]) -> crate::error::Result<Vec<u8>> {
        match self.codec {
            AudioCodec::Pcmu => codec::encode_pcmu(pcm),
            AudioCodec::Pcma => codec::encode_pcma(pcm),
        }
    }

    /// Synthesizes one frame of packet-loss concealment: the last good
    /// frame attenuated by 3 dB per consecutive miss, decaying to silence.
    fn conceal(&mut self) -> Vec<i16> {
        self.concealment_runs += 1;
        match &self.last_good_pcm8k {
            Some(last) => {
                let gain = PLC_ATTENUATION.powi(self.concealment_runs as i32);
                last.iter().map(|&s| (s as f32 * gain).round() as i16).collect()
            }
            None => vec![0i16; codec::SAMPLES_PER_FRAME_8K],
        }
    }

    /// Enqueues one 20 ms PCM16@16k frame for egress. Non-blocking: if the
    /// queue is already at capacity, the oldest frame is dropped and the
    /// overflow counter incremented.
    pub fn push_egress_pcm16_16k(&mut self, frame: Vec<i16>) {
        if self.egress_queue.len() >= EGRESS_QUEUE_CAPACITY {
            self.egress_queue.pop_front();
            self.egress_overflow_count += 1;
            debug!(overflow_count = self.egress_overflow_count, "egress queue overflow, dropped oldest frame");
        }
        self.egress_queue.push_back(frame);
    }

    /// Advances the egress path by one 20 ms frame: dequeues, resamples to
    /// 8 kHz, encodes to the negotiated codec, and RTP-packetizes.
    /// Returns `None` when there is nothing queued (silence is not sent).
    pub fn tick_egress(&mut self) -> Option<Bytes> {
        let pcm16k = self.egress_queue.pop_front()?;
        let pcm8k = match self.egress_resampler.resample(&pcm16k) {
            Ok(pcm) => pcm,
            Err(e) => {
                warn!(error = %e, "egress resample failed, dropping frame");
                return None;
            }
        };
        let encoded = match self.encode(&pcm8k) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "egress encode failed, dropping frame");
                return None;
            }
        };
        let packet = self.session.send(
            Bytes::from(encoded),
            false,
            self.codec.payload_type(),
            pcm8k.len() as u32,
        );
        Some(packet.encode())
    }

    pub fn stats(&self) -> Arc<sbc_rtp_core::RtpStats> {
        self.session.stats()
    }
}

fn encode_pcm16_base64(samples: &[i16]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    BASE64.encode(bytes)
}

pub fn decode_pcm16_base64(data: &str) -> crate::error::Result<Vec<i16>> {
    let bytes = BASE64
        .decode(data)
        .map_err(|_| crate::error::Error::InvalidFrameSize { expected: &[], actual: 0 })?;
    Ok(bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect())
}

/// Allocates and later releases RTP/RTCP port pairs on behalf of the media
/// pipeline's owning call; kept separate from `MediaPipeline` itself since
/// the allocator is process-wide shared state (spec.md §4.5).
pub struct MediaPortLease<'a> {
    allocator: &'a PortAllocator,
    rtp_port: u16,
}

impl<'a> MediaPortLease<'a> {
    pub fn acquire(allocator: &'a PortAllocator) -> crate::error::Result<Self> {
        let (rtp_port, _rtcp_port) = allocator.acquire()?;
        Ok(MediaPortLease { allocator, rtp_port })
    }

    pub fn rtp_port(&self) -> u16 {
        self.rtp_port
    }
}

impl<'a> Drop for MediaPortLease<'a> {
    fn drop(&mut self) {
        let _ = self.allocator.release(self.rtp_port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn egress_queue_drops_oldest_on_overflow() {
        let mut pipeline = MediaPipeline::new(AudioCodec::Pcmu, 40, 60);
        for i in 0..EGRESS_QUEUE_CAPACITY + 2 {
            pipeline.push_egress_pcm16_16k(vec![i as i16; 320]);
        }
        assert_eq!(pipeline.egress_overflow_count(), 2);
    }

    #[test]
    fn egress_tick_produces_rtp_packet_of_expected_size() {
        let mut pipeline = MediaPipeline::new(AudioCodec::Pcmu, 40, 60);
        pipeline.push_egress_pcm16_16k(vec![1000i16; 320]);
        let packet = pipeline.tick_egress().unwrap();
        // 12-byte RTP header + 160-byte PCMU payload.
        assert_eq!(packet.len(), 172);
    }

    #[test]
    fn tick_egress_returns_none_when_queue_empty() {
        let mut pipeline = MediaPipeline::new(AudioCodec::Pcmu, 40, 60);
        assert!(pipeline.tick_egress().is_none());
    }

    #[test]
    fn ingress_tick_without_packets_conceals_silence() {
        let mut pipeline = MediaPipeline::new(AudioCodec::Pcmu, 40, 60);
        match pipeline.tick_ingress() {
            IngressOutput::AudioFrame(b64) => {
                let pcm = decode_pcm16_base64(&b64).unwrap();
                assert_eq!(pcm.len(), 320);
            }
            _ => panic!("expected an audio frame even during concealment"),
        }
    }

    #[test]
    fn base64_pcm16_round_trips() {
        let samples = vec![100i16, -200, 32000, -32000];
        let encoded = encode_pcm16_base64(&samples);
        let decoded = decode_pcm16_base64(&encoded).unwrap();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn port_lease_releases_on_drop() {
        let allocator = PortAllocator::new(20000, 20010);
        {
            let lease = MediaPortLease::acquire(&allocator).unwrap();
            assert_eq!(lease.rtp_port(), 20000);
        }
        assert_eq!(allocator.in_use_count(), 0);
    }
}
