//! A single BridgeSession: one per Call, owning the WebSocket connection
//! to the AI backend through its full handshake/steady-state/reconnect/
//! close lifecycle, per spec.md §4.10.

use crate::error::{Error, Result};
use crate::frame::{AuthDetails, AuthFrame, CallDetails, InboundFrame, OutboundCallState, OutboundDtmf, OutboundFrame};
use crate::queue::SendQueue;
use crate::reconnect::{backoff_delay, MAX_ATTEMPTS};
use crate::signature::sign;
use crate::transport::{self, WsReader, WsWriter};
use chrono::{DateTime, Utc};
use sbc_infra_common::config::BridgeConfig;
use sbc_infra_common::events::BridgeState;
use std::time::Duration;
use tracing::{info, warn};

pub struct BridgeSession {
    config: BridgeConfig,
    call_id: String,
    state: BridgeState,
    writer: Option<WsWriter>,
    reader: Option<WsReader>,
    send_queue: SendQueue,
    sequence: u64,
    reconnect_attempt: u32,
}

impl BridgeSession {
    pub fn new(config: BridgeConfig, call_id: impl Into<String>) -> Self {
        let send_queue = SendQueue::new(config.send_queue_depth);
        BridgeSession { config, call_id: call_id.into(), state: BridgeState::Connecting, writer: None, reader: None, send_queue, sequence: 0, reconnect_attempt: 0 }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn dropped_audio_count(&self) -> u64 {
        self.send_queue.dropped_audio_count()
    }

    /// Opens the WebSocket and performs the auth handshake. Leaves the
    /// session in `Streaming` on success.
    pub async fn open(&mut self, token: &str, call: CallDetails, now: DateTime<Utc>) -> Result<()> {
        let (mut writer, mut reader) = transport::connect(&self.config.endpoint_url).await?;
        let timestamp = now.timestamp();
        let signature = sign(self.config.hmac_secret.as_bytes(), &self.call_id, timestamp);
        let auth = AuthFrame::new(
            AuthDetails { token: token.to_string(), signature, timestamp: timestamp.to_string(), call_id: self.call_id.clone() },
            call,
        );
        writer.send_json(&auth).await?;

        let handshake_timeout = Duration::from_secs(self.config.handshake_timeout_secs);
        match tokio::time::timeout(handshake_timeout, reader.recv_json::<InboundFrame>()).await {
            Ok(Some(Ok(InboundFrame::AuthOk))) => {
                self.writer = Some(writer);
                self.reader = Some(reader);
                self.state = BridgeState::Streaming;
                self.reconnect_attempt = 0;
                Ok(())
            }
            Ok(_) => Err(Error::AuthRejected),
            Err(_elapsed) => Err(Error::HandshakeTimeout(handshake_timeout)),
        }
    }

    pub fn enqueue_audio(&mut self, pcm16_base64: String, timestamp: impl Into<String>) {
        let sequence = self.sequence;
        self.sequence += 1;
        self.send_queue.push(OutboundFrame::AudioData {
            data: crate::frame::OutboundAudioData { call_id: self.call_id.clone(), audio: pcm16_base64, timestamp: timestamp.into(), sequence },
        });
    }

    pub fn enqueue_dtmf(&mut self, digit: char, duration_ms: u32) {
        self.send_queue.push(OutboundFrame::Dtmf { data: OutboundDtmf { call_id: self.call_id.clone(), digit, duration_ms } });
    }

    pub fn enqueue_call_state(&mut self, state: impl Into<String>) {
        self.send_queue.push(OutboundFrame::CallState { data: OutboundCallState { call_id: self.call_id.clone(), state: state.into() } });
    }

    /// Sends every queued frame in priority order. Stops and returns the
    /// first send error without discarding the remaining queue.
    pub async fn flush(&mut self) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(Error::Closed)?;
        while let Some(frame) = self.send_queue.pop() {
            writer.send_json(&frame).await?;
        }
        Ok(())
    }

    /// Awaits the next inbound frame. Returns `None` once the peer closes.
    pub async fn recv(&mut self) -> Option<Result<InboundFrame>> {
        self.reader.as_mut()?.recv_json::<InboundFrame>().await
    }

    /// Reconnects with exponential backoff, re-sending the auth frame on
    /// each attempt, up to [`MAX_ATTEMPTS`].
    pub async fn reconnect(&mut self, token: &str, call: CallDetails) -> Result<()> {
        self.state = BridgeState::Reconnecting;
        self.writer = None;
        self.reader = None;
        warn!(call_id = %self.call_id, "AI bridge connection lost, reconnecting");
        while self.reconnect_attempt < MAX_ATTEMPTS {
            self.reconnect_attempt += 1;
            tokio::time::sleep(backoff_delay(self.reconnect_attempt)).await;
            if self.open(token, call.clone(), Utc::now()).await.is_ok() {
                info!(call_id = %self.call_id, attempt = self.reconnect_attempt, "AI bridge reconnected");
                return Ok(());
            }
        }
        self.state = BridgeState::Closed;
        warn!(call_id = %self.call_id, "AI bridge reconnect attempts exhausted");
        Err(Error::ReconnectExhausted)
    }

    /// Graceful close: sends a close frame, drains any remaining inbound
    /// frames up to a 500 ms deadline, then releases the connection.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.send_close(1000, "normal").await;
        }
        if let Some(reader) = self.reader.as_mut() {
            let _ = tokio::time::timeout(Duration::from_millis(500), async {
                while reader.recv_json::<InboundFrame>().await.is_some() {}
            })
            .await;
        }
        self.writer = None;
        self.reader = None;
        self.state = BridgeState::Closed;
        Ok(())
    }
}
