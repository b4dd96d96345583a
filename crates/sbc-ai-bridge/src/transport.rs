//! Thin `tokio-tungstenite` wrapper isolating the rest of this crate from
//! the wire representation, grounded on the split-sink/split-stream shape
//! of a teacher-adjacent WebSocket client used elsewhere in the retrieval
//! pack, adapted here to JSON frames instead of raw text passthrough.

use crate::error::{Error, Result};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct WsWriter {
    sink: futures::stream::SplitSink<WsStream, Message>,
}

pub struct WsReader {
    stream: futures::stream::SplitStream<WsStream>,
}

impl WsWriter {
    pub async fn send_json<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let text = serde_json::to_string(value).map_err(Error::Malformed)?;
        self.sink.send(Message::Text(text)).await.map_err(Error::Connect)
    }

    pub async fn send_close(&mut self, code: u16, reason: &str) -> Result<()> {
        use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
        use tokio_tungstenite::tungstenite::protocol::CloseFrame;
        self.sink
            .send(Message::Close(Some(CloseFrame { code: CloseCode::from(code), reason: reason.to_string().into() })))
            .await
            .map_err(Error::Connect)
    }
}

impl WsReader {
    /// Reads the next JSON text frame, skipping ping/pong/binary frames.
    /// Returns `None` once the peer closes the stream.
    pub async fn recv_json<T: DeserializeOwned>(&mut self) -> Option<Result<T>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(serde_json::from_str(&text).map_err(Error::Malformed)),
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Some(Err(Error::Connect(e))),
            }
        }
    }
}

pub async fn connect(url: &str) -> Result<(WsWriter, WsReader)> {
    let (ws_stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(Error::Connect)?;
    let (sink, stream) = ws_stream.split();
    Ok((WsWriter { sink }, WsReader { stream }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connecting_to_an_unreachable_host_fails() {
        let result = connect("ws://127.0.0.1:1/invalid").await;
        assert!(result.is_err());
    }
}
