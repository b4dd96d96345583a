use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared across the ambient infrastructure layer.
///
/// Protocol and media crates define their own domain errors; this type is
/// only for configuration, logging, and event-bus setup failures.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("event bus error: {0}")]
    EventBus(String),
}
