//! In-band DTMF detection via the Goertzel algorithm, for callers whose
//! media path collapses RFC 2833 events into audio (spec.md §4.3). Runs on
//! 20 ms / 160-sample frames at 8 kHz.

use super::{DetectionMethod, DtmfDigitEvent, DIGIT_TABLE, HIGH_FREQS, LOW_FREQS};

const SAMPLE_RATE: f32 = 8000.0;
const FRAME_SAMPLES: usize = 160;
const PERSISTENCE_FRAMES: u32 = 2; // 40 ms at 20 ms/frame
const DEBOUNCE_FRAMES: u32 = 2; // 40 ms of silence before a new digit can start
const TWIST_DB_MAX: f32 = 6.0; // max allowed |low_db - high_db|
const ENERGY_THRESHOLD: f32 = 1.0e5;

fn goertzel_power(samples: &[i16], target_freq: f32) -> f32 {
    let k = (0.5 + (FRAME_SAMPLES as f32 * target_freq) / SAMPLE_RATE).floor();
    let omega = (2.0 * std::f32::consts::PI * k) / FRAME_SAMPLES as f32;
    let coeff = 2.0 * omega.cos();

    let (mut q0, mut q1, mut q2) = (0.0f32, 0.0f32, 0.0f32);
    for &sample in samples {
        q0 = coeff * q1 - q2 + sample as f32;
        q2 = q1;
        q1 = q0;
    }
    q1 * q1 + q2 * q2 - coeff * q1 * q2
}

fn classify_frame(samples: &[i16]) -> Option<char> {
    let low_powers: Vec<f32> = LOW_FREQS.iter().map(|&f| goertzel_power(samples, f)).collect();
    let high_powers: Vec<f32> = HIGH_FREQS.iter().map(|&f| goertzel_power(samples, f)).collect();

    let (low_idx, &low_power) = low_powers
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())?;
    let (high_idx, &high_power) = high_powers
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())?;

    if low_power < ENERGY_THRESHOLD || high_power < ENERGY_THRESHOLD {
        return None;
    }

    let twist_db = 10.0 * (low_power / high_power).log10().abs();
    if twist_db > TWIST_DB_MAX {
        return None;
    }

    Some(DIGIT_TABLE[low_idx][high_idx])
}

#[derive(Debug, Default)]
pub struct GoertzelDetector {
    current: Option<char>,
    active_frames: u32,
    silence_frames: u32,
    reported: bool,
}

impl GoertzelDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one 160-sample (20 ms @ 8 kHz) frame. Returns a completed digit
    /// event once the same tone has persisted for `PERSISTENCE_FRAMES`
    /// consecutive frames and a debounce gap preceded it.
    pub fn push_frame(&mut self, samples: &[i16]) -> Option<DtmfDigitEvent> {
        if samples.len() != FRAME_SAMPLES {
            return None;
        }
        let detected = classify_frame(samples);

        match detected {
            Some(digit) if self.current == Some(digit) => {
                self.active_frames += 1;
                self.silence_frames = 0;
            }
            Some(digit) => {
                self.current = Some(digit);
                self.active_frames = 1;
                self.silence_frames = 0;
                self.reported = false;
            }
            None => {
                self.silence_frames += 1;
                if self.silence_frames >= DEBOUNCE_FRAMES {
                    self.current = None;
                    self.active_frames = 0;
                    self.reported = false;
                }
                return None;
            }
        }

        if !self.reported && self.active_frames >= PERSISTENCE_FRAMES {
            self.reported = true;
            return Some(DtmfDigitEvent {
                digit: self.current.unwrap(),
                duration_ms: self.active_frames * 20,
                method: DetectionMethod::InBand,
            });
        }
        None
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone_frame(low: f32, high: f32, amplitude: f32) -> Vec<i16> {
        (0..FRAME_SAMPLES)
            .map(|n| {
                let t = n as f32 / SAMPLE_RATE;
                let sample = amplitude * ((2.0 * PI * low * t).sin() + (2.0 * PI * high * t).sin());
                sample.clamp(i16::MIN as f32, i16::MAX as f32) as i16
            })
            .collect()
    }

    #[test]
    fn detects_digit_five_after_persistence() {
        let mut detector = GoertzelDetector::new();
        let frame = tone_frame(770.0, 1336.0, 8000.0);
        assert!(detector.push_frame(&frame).is_none());
        let event = detector.push_frame(&frame).unwrap();
        assert_eq!(event.digit, '5');
        assert_eq!(event.method, DetectionMethod::InBand);
    }

    #[test]
    fn silence_does_not_trigger_detection() {
        let mut detector = GoertzelDetector::new();
        let silence = vec![0i16; FRAME_SAMPLES];
        assert!(detector.push_frame(&silence).is_none());
        assert!(detector.push_frame(&silence).is_none());
    }

    #[test]
    fn reports_digit_only_once_while_held() {
        let mut detector = GoertzelDetector::new();
        let frame = tone_frame(697.0, 1209.0, 8000.0);
        detector.push_frame(&frame);
        let first = detector.push_frame(&frame);
        assert!(first.is_some());
        let second = detector.push_frame(&frame);
        assert!(second.is_none());
    }

    #[test]
    fn debounce_allows_repeated_digit_after_silence() {
        let mut detector = GoertzelDetector::new();
        let frame = tone_frame(697.0, 1209.0, 8000.0);
        let silence = vec![0i16; FRAME_SAMPLES];
        detector.push_frame(&frame);
        assert!(detector.push_frame(&frame).is_some());
        detector.push_frame(&silence);
        detector.push_frame(&silence);
        detector.push_frame(&frame);
        assert!(detector.push_frame(&frame).is_some());
    }
}
