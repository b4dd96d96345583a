//! Layered configuration: built-in defaults -> TOML file -> CLI flags.
//!
//! Environment variables are read only as a CLI-flag fallback (`clap`'s
//! `env` attribute), matching the resolution order in SPEC_FULL.md §3.1.

use crate::errors::{Error, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::Path;

/// SIP signaling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SipConfig {
    pub listen_addr: String,
    pub listen_port: u16,
    #[serde(default = "default_true")]
    pub udp_enabled: bool,
    #[serde(default)]
    pub tcp_enabled: bool,
    pub digest_realm: String,
    #[serde(default = "default_nonce_window_secs")]
    pub nonce_window_secs: u64,
    #[serde(default = "default_max_auth_attempts")]
    pub max_auth_attempts: u32,
    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: u64,
    #[serde(default = "default_t1_ms")]
    pub t1_ms: u64,
    #[serde(default = "default_t2_ms")]
    pub t2_ms: u64,
    #[serde(default = "default_t4_ms")]
    pub t4_ms: u64,
    #[serde(default = "default_ring_timeout_secs")]
    pub ring_timeout_secs: u64,
}

/// Media / RTP configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub public_ip: String,
    pub rtp_port_min: u16,
    pub rtp_port_max: u16,
    #[serde(default = "default_jitter_depth_ms")]
    pub jitter_target_depth_ms: u32,
    #[serde(default = "default_jitter_max_late_ms")]
    pub jitter_max_late_ms: u32,
    #[serde(default = "default_no_media_timeout_secs")]
    pub no_media_timeout_secs: u64,
}

/// AI WebSocket bridge configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub endpoint_url: String,
    pub hmac_secret: String,
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    #[serde(default = "default_queue_depth")]
    pub send_queue_depth: usize,
    #[serde(default = "default_queue_depth")]
    pub recv_queue_depth: usize,
    #[serde(default = "default_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_ws_idle_timeout_secs")]
    pub ws_idle_timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Top-level SBC configuration, as loaded from defaults + file + CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct SbcConfig {
    pub sip: SipConfig,
    pub media: MediaConfig,
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_global_max_calls")]
    pub global_max_concurrent_calls: usize,
    #[serde(default = "default_per_user_max_calls")]
    pub per_user_max_concurrent_calls: usize,
    #[serde(default = "default_per_trunk_max_calls")]
    pub per_trunk_max_concurrent_calls: usize,
}

fn default_true() -> bool {
    true
}
fn default_nonce_window_secs() -> u64 {
    300
}
fn default_max_auth_attempts() -> u32 {
    5
}
fn default_lockout_secs() -> u64 {
    1800
}
fn default_t1_ms() -> u64 {
    500
}
fn default_t2_ms() -> u64 {
    4000
}
fn default_t4_ms() -> u64 {
    5000
}
fn default_ring_timeout_secs() -> u64 {
    60
}
fn default_jitter_depth_ms() -> u32 {
    40
}
fn default_jitter_max_late_ms() -> u32 {
    60
}
fn default_no_media_timeout_secs() -> u64 {
    30
}
fn default_handshake_timeout_secs() -> u64 {
    5
}
fn default_queue_depth() -> usize {
    100
}
fn default_reconnect_attempts() -> u32 {
    3
}
fn default_ws_idle_timeout_secs() -> u64 {
    60
}
fn default_global_max_calls() -> usize {
    1000
}
fn default_per_user_max_calls() -> usize {
    5
}
fn default_per_trunk_max_calls() -> usize {
    200
}

impl Default for SbcConfig {
    fn default() -> Self {
        SbcConfig {
            sip: SipConfig {
                listen_addr: "0.0.0.0".to_string(),
                listen_port: 5060,
                udp_enabled: true,
                tcp_enabled: false,
                digest_realm: "sbc.local".to_string(),
                nonce_window_secs: default_nonce_window_secs(),
                max_auth_attempts: default_max_auth_attempts(),
                lockout_secs: default_lockout_secs(),
                t1_ms: default_t1_ms(),
                t2_ms: default_t2_ms(),
                t4_ms: default_t4_ms(),
                ring_timeout_secs: default_ring_timeout_secs(),
            },
            media: MediaConfig {
                public_ip: "127.0.0.1".to_string(),
                rtp_port_min: 10000,
                rtp_port_max: 20000,
                jitter_target_depth_ms: default_jitter_depth_ms(),
                jitter_max_late_ms: default_jitter_max_late_ms(),
                no_media_timeout_secs: default_no_media_timeout_secs(),
            },
            bridge: BridgeConfig {
                endpoint_url: "wss://ai.local/v1/stream".to_string(),
                hmac_secret: "change-me".to_string(),
                handshake_timeout_secs: default_handshake_timeout_secs(),
                send_queue_depth: default_queue_depth(),
                recv_queue_depth: default_queue_depth(),
                max_reconnect_attempts: default_reconnect_attempts(),
                ws_idle_timeout_secs: default_ws_idle_timeout_secs(),
            },
            logging: LoggingConfig::default(),
            global_max_concurrent_calls: default_global_max_calls(),
            per_user_max_concurrent_calls: default_per_user_max_calls(),
            per_trunk_max_concurrent_calls: default_per_trunk_max_calls(),
        }
    }
}

impl SbcConfig {
    /// Load a TOML file and merge it over [`SbcConfig::default`].
    ///
    /// `toml` deserializes directly into the struct; because every field
    /// that isn't required carries a `#[serde(default = ...)]`, a partial
    /// file only overrides what it mentions within each present section.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.as_ref().display())))?;
        toml::from_str(&text).map_err(|e| Error::Config(format!("parsing config: {e}")))
    }

    /// Validate cross-field invariants that `serde` defaults can't express.
    pub fn validate(&self) -> Result<()> {
        if self.media.rtp_port_min % 2 != 0 {
            return Err(Error::Config("media.rtp_port_min must be even".into()));
        }
        if self.media.rtp_port_min >= self.media.rtp_port_max {
            return Err(Error::Config(
                "media.rtp_port_min must be < media.rtp_port_max".into(),
            ));
        }
        if self.sip.digest_realm.is_empty() {
            return Err(Error::Config("sip.digest_realm must not be empty".into()));
        }
        if self.bridge.hmac_secret.is_empty() {
            return Err(Error::Config("bridge.hmac_secret must not be empty".into()));
        }
        Ok(())
    }
}

/// CLI flags for the `sbc-daemon` binary. Values here override the TOML
/// file when present; the file path itself has no file-based default.
#[derive(Debug, Parser)]
#[command(name = "sbc-daemon", about = "SIP/RTP session border controller core")]
pub struct CliArgs {
    /// Path to a TOML configuration file.
    #[arg(long, env = "SBC_CONFIG")]
    pub config: Option<String>,

    /// Override the SIP listen port.
    #[arg(long, env = "SBC_SIP_PORT")]
    pub sip_port: Option<u16>,

    /// Override the log level (error|warn|info|debug|trace).
    #[arg(long, env = "SBC_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Resolve the full configuration: defaults, optional file, then flags.
    pub fn resolve(&self) -> Result<SbcConfig> {
        let mut cfg = match &self.config {
            Some(path) => SbcConfig::from_toml_file(path)?,
            None => SbcConfig::default(),
        };
        if let Some(port) = self.sip_port {
            cfg.sip.listen_port = port;
        }
        if let Some(level) = &self.log_level {
            cfg.logging.level = Some(level.clone());
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
