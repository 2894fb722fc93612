//! Socket event pump
//!
//! [`pump_socket`] owns one WebSocket, multiplexes its inbound frames
//! against the connection's outbound queue and a keep-alive timer, and
//! translates everything into [`SessionEvents`] calls. Session controllers
//! implement the trait instead of wrapping the socket, so the same pump
//! serves both sides of the wire. The pump emits exactly one terminal event
//! (`on_close` or `on_error`) and then returns.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tokio_tungstenite::WebSocketStream;

use relaycast_core::OutboundFrame;

/// Close code reported when the transport ends without a close frame
const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code reported when a close frame carries no status
const NO_STATUS: u16 = 1005;

// ----------------------------------------------------------------------------
// Session Event Interface
// ----------------------------------------------------------------------------

/// Details of a transport close event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
    /// Whether the peer, rather than the local side, initiated the close
    pub by_peer: bool,
}

impl CloseInfo {
    fn from_frame(frame: Option<CloseFrame<'_>>, by_peer: bool) -> Self {
        match frame {
            Some(frame) => Self {
                code: u16::from(frame.code),
                reason: frame.reason.into_owned(),
                by_peer,
            },
            None => Self {
                code: NO_STATUS,
                reason: String::new(),
                by_peer,
            },
        }
    }

    fn reset(by_peer: bool) -> Self {
        Self {
            code: ABNORMAL_CLOSURE,
            reason: "connection reset".to_string(),
            by_peer,
        }
    }
}

/// Transport event callbacks for one connection
///
/// Implemented by the server and client session controllers; the pump calls
/// these in socket-event order, one at a time.
#[async_trait]
pub trait SessionEvents: Send {
    /// The transport handshake completed
    async fn on_open(&mut self);
    /// A complete text payload arrived
    async fn on_message(&mut self, text: String);
    /// The transport closed; no further events follow
    async fn on_close(&mut self, info: CloseInfo);
    /// The transport failed; no further events follow
    async fn on_error(&mut self, reason: String);
}

// ----------------------------------------------------------------------------
// Socket Pump
// ----------------------------------------------------------------------------

/// Drive one WebSocket until it closes or fails
///
/// Inbound frames become `on_message`/`on_close`/`on_error` calls; frames
/// queued on `outbound` are written to the sink (a [`OutboundFrame::Close`]
/// starts the close handshake); when `keepalive` is set, Ping frames go out
/// on that interval so half-dead connections surface as events.
pub async fn pump_socket<S, H>(
    ws: WebSocketStream<S>,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    keepalive: Option<Duration>,
    handler: &mut H,
) where
    S: AsyncRead + AsyncWrite + Unpin,
    H: SessionEvents,
{
    let (mut sink, mut stream) = ws.split();
    handler.on_open().await;

    let mut ticker =
        tokio::time::interval(keepalive.unwrap_or_else(|| Duration::from_secs(3600)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; skip it.
    ticker.tick().await;

    let mut local_close = false;
    let mut outbound_open = true;

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => handler.on_message(text).await,
                Some(Ok(Message::Close(frame))) => {
                    handler
                        .on_close(CloseInfo::from_frame(frame, !local_close))
                        .await;
                    break;
                }
                // Pings are answered by the protocol layer; pongs and binary
                // frames carry nothing for a text relay.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    handler.on_error(e.to_string()).await;
                    break;
                }
                None => {
                    handler.on_close(CloseInfo::reset(!local_close)).await;
                    break;
                }
            },
            queued = outbound.recv(), if outbound_open => match queued {
                Some(OutboundFrame::Text(payload)) => {
                    if let Err(e) = sink.send(Message::Text(payload)).await {
                        handler.on_error(e.to_string()).await;
                        break;
                    }
                }
                Some(OutboundFrame::Close) => {
                    local_close = true;
                    // The peer's acknowledgment (or the stream ending)
                    // surfaces through the inbound arm.
                    if sink.send(Message::Close(None)).await.is_err() {
                        handler.on_close(CloseInfo::reset(false)).await;
                        break;
                    }
                }
                None => {
                    // Every sender is gone; treat it as a local close request.
                    outbound_open = false;
                    local_close = true;
                    let _ = sink.send(Message::Close(None)).await;
                }
            },
            _ = ticker.tick(), if keepalive.is_some() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    handler.on_error("keep-alive ping failed".to_string()).await;
                    break;
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::{accept_async, client_async};

    /// Records every callback in order
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    #[async_trait]
    impl SessionEvents for Recorder {
        async fn on_open(&mut self) {
            self.events.push("open".to_string());
        }
        async fn on_message(&mut self, text: String) {
            self.events.push(format!("message:{}", text));
        }
        async fn on_close(&mut self, info: CloseInfo) {
            self.events
                .push(format!("close:{}:{}", info.code, info.by_peer));
        }
        async fn on_error(&mut self, reason: String) {
            self.events.push(format!("error:{}", reason));
        }
    }

    /// In-memory WebSocket pair: (server stream, client stream)
    async fn socket_pair() -> (
        WebSocketStream<tokio::io::DuplexStream>,
        WebSocketStream<tokio::io::DuplexStream>,
    ) {
        let (server_io, client_io) = tokio::io::duplex(4096);
        let (server, client) = tokio::join!(
            accept_async(server_io),
            client_async("ws://relay.test/", client_io)
        );
        (server.unwrap(), client.unwrap().0)
    }

    #[tokio::test]
    async fn pump_reports_open_message_close_in_order() {
        let (server_ws, mut client_ws) = socket_pair().await;

        let (_tx, rx) = mpsc::channel(4);
        let mut recorder = Recorder::default();
        let pump = async {
            pump_socket(server_ws, rx, None, &mut recorder).await;
        };

        let client = async {
            client_ws
                .send(Message::Text("hello".to_string()))
                .await
                .unwrap();
            client_ws
                .close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "".into(),
                }))
                .await
                .unwrap();
            // Drain until the server's close reply arrives.
            while client_ws.next().await.is_some() {}
        };

        tokio::join!(pump, client);

        assert_eq!(
            recorder.events,
            vec!["open", "message:hello", "close:1000:true"]
        );
    }

    #[tokio::test]
    async fn queued_text_reaches_the_peer() {
        let (server_ws, mut client_ws) = socket_pair().await;

        let (tx, rx) = mpsc::channel(4);
        tx.send(OutboundFrame::Text("broadcast".to_string()))
            .await
            .unwrap();
        tx.send(OutboundFrame::Close).await.unwrap();

        let mut recorder = Recorder::default();
        let pump = async {
            pump_socket(server_ws, rx, None, &mut recorder).await;
        };

        let client = async {
            let mut seen = Vec::new();
            while let Some(Ok(msg)) = client_ws.next().await {
                match msg {
                    Message::Text(text) => seen.push(text),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            let _ = client_ws.close(None).await;
            while client_ws.next().await.is_some() {}
            seen
        };

        let (_, seen) = tokio::join!(pump, client);
        assert_eq!(seen, vec!["broadcast"]);
        // A locally requested close is not attributed to the peer.
        assert!(recorder
            .events
            .iter()
            .any(|e| e.starts_with("close:") && e.ends_with(":false")));
    }

    #[tokio::test]
    async fn dropped_stream_surfaces_as_abnormal_close() {
        let (server_ws, client_ws) = socket_pair().await;
        drop(client_ws);

        let (_tx, rx) = mpsc::channel(4);
        let mut recorder = Recorder::default();
        pump_socket(server_ws, rx, None, &mut recorder).await;

        assert_eq!(recorder.events.first().map(String::as_str), Some("open"));
        let last = recorder.events.last().unwrap();
        assert!(
            last.starts_with("close:1006") || last.starts_with("error:"),
            "unexpected terminal event: {}",
            last
        );
    }
}
