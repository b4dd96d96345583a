//! `sbc-daemon` entry point: resolves configuration, wires the registrar,
//! call supervisor, and SIP UDP listener together, and runs until a signal
//! asks it to stop. This binary is the one place in the workspace that is
//! allowed to depend on every other crate; `sbc-sip-core`,
//! `sbc-dialog-core`, `sbc-call-engine`, and `sbc-ai-bridge` never depend on
//! each other.

mod digest_header;
mod sip_server;

use anyhow::{Context, Result};
use clap::Parser;
use sbc_call_engine::{AdmissionControl, CallManager, InMemoryCdrSink};
use chrono::Duration as ChronoDuration;
use sbc_dialog_core::{Registrar, RegistrarConfig};
use sbc_infra_common::config::CliArgs;
use sbc_infra_common::{init_logging, EventBus};
use sbc_media_core::PortAllocator;
use sip_server::SipServer;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let config = args.resolve().context("resolving configuration")?;
    init_logging(&config.logging).context("initializing logging")?;

    info!(
        listen = %format!("{}:{}", config.sip.listen_addr, config.sip.listen_port),
        realm = %config.sip.digest_realm,
        "starting sbc-daemon"
    );

    let (shutdown_controller, shutdown_handle) = sbc_infra_common::lifecycle::ShutdownController::new();

    // No dedicated config field exists for the registrar's nonce secret; it
    // reuses the bridge HMAC secret, recorded as an open decision in
    // DESIGN.md.
    let mut registrar_config = RegistrarConfig::new(config.bridge.hmac_secret.as_bytes());
    registrar_config.nonce_window = ChronoDuration::seconds(config.sip.nonce_window_secs as i64);
    registrar_config.max_auth_attempts = config.sip.max_auth_attempts;
    registrar_config.lockout_duration = ChronoDuration::seconds(config.sip.lockout_secs as i64);
    let registrar = Arc::new(Registrar::new(registrar_config));

    let admission = AdmissionControl::new(
        config.global_max_concurrent_calls,
        config.per_user_max_concurrent_calls,
        config.per_trunk_max_concurrent_calls,
    );
    let events = EventBus::new();
    let cdr_sink = Arc::new(InMemoryCdrSink::new());
    let call_manager = Arc::new(CallManager::new(admission, events, cdr_sink));

    // Static outbound trunk table; a production deployment would load this
    // from the config file alongside `[sip]`/`[media]`/`[bridge]`.
    let trunks = Vec::new();

    let socket = UdpSocket::bind((config.sip.listen_addr.as_str(), config.sip.listen_port))
        .await
        .with_context(|| format!("binding SIP UDP socket on {}:{}", config.sip.listen_addr, config.sip.listen_port))?;
    info!(local_addr = ?socket.local_addr().ok(), "SIP UDP socket bound");

    let port_allocator = PortAllocator::new(config.media.rtp_port_min, config.media.rtp_port_max);
    let server = SipServer::new(
        Arc::new(socket),
        registrar,
        call_manager,
        trunks,
        config.sip.digest_realm.clone(),
        port_allocator,
        config.media.public_ip.clone(),
        config.media.jitter_target_depth_ms,
        config.media.jitter_max_late_ms,
        config.bridge.clone(),
    );
    let server_task = tokio::spawn(server.run(shutdown_handle));

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown signal received");
    shutdown_controller.shutdown();

    server_task.await.context("joining SIP listener task")?;
    info!("sbc-daemon stopped");
    Ok(())
}
