//! G.711 μ-law (PCMU) / A-law (PCMA) codec: bit-exact ITU-T tables, per
//! spec.md §4.1. Grounded on the scalar reference path of the teacher's
//! codec crate (its SIMD variants are an optimization this core doesn't
//! need at this traffic scale).

use crate::error::{Error, Result};

pub const SAMPLES_PER_FRAME_8K: usize = 160; // 20 ms @ 8 kHz
pub const SAMPLES_PER_FRAME_16K: usize = 320; // 20 ms @ 16 kHz

fn check_frame_size(len: usize) -> Result<()> {
    const VALID: &[usize] = &[SAMPLES_PER_FRAME_8K, SAMPLES_PER_FRAME_16K];
    if VALID.contains(&len) {
        Ok(())
    } else {
        Err(Error::InvalidFrameSize {
            expected: VALID,
            actual: len,
        })
    }
}

fn linear_to_mulaw(sample: i16) -> u8 {
    const CLIP: i16 = 32635;
    const BIAS: i16 = 0x84;
    const MULAW_MAX: u8 = 0x7F;

    let mut sample = sample;
    let sign = if sample < 0 {
        sample = if sample == i16::MIN { i16::MAX } else { -sample };
        0x80
    } else {
        0x00
    };

    if sample > CLIP {
        sample = CLIP;
    }
    sample += BIAS;

    let exponent = mulaw_exponent(sample);
    let mantissa = (sample >> (exponent + 3)) & 0x0F;
    let encoded = ((exponent << 4) | mantissa) as u8;
    (encoded ^ MULAW_MAX) | sign
}

fn mulaw_exponent(sample: i16) -> i16 {
    match sample {
        s if s <= 0x1F => 0,
        s if s <= 0x3F => 1,
        s if s <= 0x7F => 2,
        s if s <= 0xFF => 3,
        s if s <= 0x1FF => 4,
        s if s <= 0x3FF => 5,
        s if s <= 0x7FF => 6,
        _ => 7,
    }
}

fn mulaw_to_linear(encoded: u8) -> i16 {
    const BIAS: i16 = 0x84;
    const MULAW_MAX: u8 = 0x7F;

    let encoded = encoded ^ MULAW_MAX;
    let sign = encoded & 0x80;
    let exponent = ((encoded >> 4) & 0x07) as i16;
    let mantissa = (encoded & 0x0F) as i16;

    let mut sample = (mantissa << (exponent + 3)) + BIAS;
    if exponent > 0 {
        sample += 1i16 << (exponent + 2);
    }
    if sign != 0 {
        -sample
    } else {
        sample
    }
}

fn linear_to_alaw(sample: i16) -> u8 {
    const CLIP: i16 = 32635;
    const ALAW_MAX: u8 = 0x7F;

    let mut sample = sample;
    let sign = if sample < 0 {
        sample = if sample == i16::MIN { i16::MAX } else { -sample };
        0x80
    } else {
        0x00
    };
    if sample > CLIP {
        sample = CLIP;
    }

    let encoded = if sample < 256 {
        sample >> 4
    } else {
        let exponent = alaw_exponent(sample);
        let mantissa = (sample >> (exponent + 3)) & 0x0F;
        ((exponent << 4) | mantissa) + 16
    };
    ((encoded as u8) ^ ALAW_MAX) | sign
}

fn alaw_exponent(sample: i16) -> i16 {
    match sample {
        s if s < 512 => 1,
        s if s < 1024 => 2,
        s if s < 2048 => 3,
        s if s < 4096 => 4,
        s if s < 8192 => 5,
        s if s < 16384 => 6,
        _ => 7,
    }
}

fn alaw_to_linear(encoded: u8) -> i16 {
    const ALAW_MAX: u8 = 0x7F;

    let encoded = encoded ^ ALAW_MAX;
    let sign = encoded & 0x80;
    let magnitude = encoded & 0x7F;

    let sample = if magnitude < 16 {
        (magnitude as u16) << 4
    } else {
        let exponent = (magnitude >> 4) & 0x07;
        let mantissa = magnitude & 0x0F;
        let exp_shift = (exponent as u32 + 3).min(15);
        let gain_shift = (exponent as u32 + 2).min(15);
        ((mantissa as u16) << exp_shift) + (1u16 << gain_shift)
    } + 8;

    if sign != 0 {
        -(sample as i16)
    } else {
        sample as i16
    }
}

pub fn encode_pcmu(pcm: &[i16]) -> Result<Vec<u8>> {
    check_frame_size(pcm.len())?;
    Ok(pcm.iter().copied().map(linear_to_mulaw).collect())
}

pub fn decode_pcmu(encoded: &[u8]) -> Result<Vec<i16>> {
    check_frame_size(encoded.len())?;
    Ok(encoded.iter().copied().map(mulaw_to_linear).collect())
}

pub fn encode_pcma(pcm: &[i16]) -> Result<Vec<u8>> {
    check_frame_size(pcm.len())?;
    Ok(pcm.iter().copied().map(linear_to_alaw).collect())
}

pub fn decode_pcma(encoded: &[u8]) -> Result<Vec<i16>> {
    check_frame_size(encoded.len())?;
    Ok(encoded.iter().copied().map(alaw_to_linear).collect())
}
