//! DTMF extraction: RFC 2833 telephone-event relay and in-band Goertzel
//! detection, unified into a single digit stream per spec.md §4.3.

pub mod goertzel;
pub mod rfc2833;

pub use goertzel::GoertzelDetector;
pub use rfc2833::Rfc2833Extractor;

/// One detected DTMF digit, regardless of which path detected it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DtmfDigitEvent {
    pub digit: char,
    pub duration_ms: u32,
    pub method: DetectionMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    Rfc2833,
    InBand,
}

pub(crate) const DIGIT_TABLE: [[char; 4]; 4] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];

pub(crate) const LOW_FREQS: [f32; 4] = [697.0, 770.0, 852.0, 941.0];
pub(crate) const HIGH_FREQS: [f32; 4] = [1209.0, 1336.0, 1477.0, 1633.0];
