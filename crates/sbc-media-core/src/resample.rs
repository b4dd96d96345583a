//! 8 kHz <-> 16 kHz linear-interpolation resampler, per spec.md §4.1.
//! Grounded on the teacher's `media-core::processing::format::Resampler`,
//! narrowed to the fixed 1:2 / 2:1 ratios this bridge needs and adapted to
//! carry interpolation state across 20 ms frame boundaries rather than
//! resetting position every call, so audio stays continuous frame-to-frame.

use crate::error::{Error, Result};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upsample8kTo16k,
    Downsample16kTo8k,
}

pub struct Resampler {
    direction: Direction,
    /// Fractional position within the input stream, carried across frames.
    position: f64,
    /// Last sample of the previous frame, used so interpolation doesn't
    /// glitch at the frame boundary.
    prev_sample: i16,
}

impl Resampler {
    pub fn new(direction: Direction) -> Self {
        Resampler {
            direction,
            position: 0.0,
            prev_sample: 0,
        }
    }

    pub fn reset(&mut self) {
        self.position = 0.0;
        self.prev_sample = 0;
        debug!("resampler state reset");
    }

    fn ratio(&self) -> f64 {
        match self.direction {
            Direction::Upsample8kTo16k => 2.0,
            Direction::Downsample16kTo8k => 0.5,
        }
    }

    /// Resamples one frame. Input length must be 160 (8 kHz, upsampling) or
    /// 320 (16 kHz, downsampling); output is the corresponding 320 or 160.
    pub fn resample(&mut self, input: &[i16]) -> Result<Vec<i16>> {
        let expected_in = match self.direction {
            Direction::Upsample8kTo16k => 160,
            Direction::Downsample16kTo8k => 320,
        };
        if input.len() != expected_in {
            return Err(Error::InvalidFrameSize {
                expected: match self.direction {
                    Direction::Upsample8kTo16k => &[160],
                    Direction::Downsample16kTo8k => &[320],
                },
                actual: input.len(),
            });
        }

        let ratio = self.ratio();
        let expected_out = (input.len() as f64 * ratio).round() as usize;
        let mut out = Vec::with_capacity(expected_out);

        while out.len() < expected_out {
            out.push(self.interpolate(input));
            self.position += 1.0 / ratio;
        }

        self.position -= input.len() as f64;
        self.prev_sample = input[input.len() - 1];
        Ok(out)
    }

    fn interpolate(&self, input: &[i16]) -> i16 {
        let index = self.position as usize;
        let fraction = self.position - index as f64;

        let current = if index < input.len() {
            input[index]
        } else {
            self.prev_sample
        };
        if fraction == 0.0 {
            return current;
        }

        let next = if index + 1 < input.len() {
            input[index + 1]
        } else {
            current
        };

        let result = current as f64 + (next as f64 - current as f64) * fraction;
        result.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsample_doubles_frame_length() {
        let mut r = Resampler::new(Direction::Upsample8kTo16k);
        let input = vec![100i16; 160];
        let out = r.resample(&input).unwrap();
        assert_eq!(out.len(), 320);
    }

    #[test]
    fn downsample_halves_frame_length() {
        let mut r = Resampler::new(Direction::Downsample16kTo8k);
        let input = vec![100i16; 320];
        let out = r.resample(&input).unwrap();
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn rejects_wrong_input_length() {
        let mut r = Resampler::new(Direction::Upsample8kTo16k);
        assert!(matches!(
            r.resample(&vec![0i16; 161]),
            Err(Error::InvalidFrameSize { .. })
        ));
    }

    #[test]
    fn constant_signal_stays_constant() {
        let mut r = Resampler::new(Direction::Upsample8kTo16k);
        let input = vec![500i16; 160];
        let out = r.resample(&input).unwrap();
        assert!(out.iter().all(|&s| s == 500));
    }

    #[test]
    fn state_carries_across_frame_boundary_without_discontinuity() {
        let mut r = Resampler::new(Direction::Downsample16kTo8k);
        let frame1: Vec<i16> = (0..320).map(|i| i as i16).collect();
        let frame2: Vec<i16> = (320..640).map(|i| i as i16).collect();
        let out1 = r.resample(&frame1).unwrap();
        let out2 = r.resample(&frame2).unwrap();
        // The transition sample shouldn't jump by more than the input step.
        let boundary_delta = (out2[0] - out1[out1.len() - 1]).abs();
        assert!(boundary_delta <= 4);
    }
}
