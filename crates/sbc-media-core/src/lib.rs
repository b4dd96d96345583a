//! G.711 codec, 8k/16k resampler, DTMF extraction, per-call media
//! pipeline, and UDP port-pair allocation (C1, C3, C4, C5).

pub mod codec;
pub mod dtmf;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod resample;

pub use codec::{decode_pcma, decode_pcmu, encode_pcma, encode_pcmu};
pub use dtmf::{DetectionMethod, DtmfDigitEvent, GoertzelDetector, Rfc2833Extractor};
pub use error::{Error, Result};
pub use pipeline::{IngressOutput, MediaPipeline, MediaPortLease};
pub use ports::PortAllocator;
pub use resample::{Direction, Resampler};
