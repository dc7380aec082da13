//! Opens the realtime signalling socket for a session.
//!
//! Only the socket lifecycle is handled here. Signalling payloads are left to
//! the realtime layer and are not decoded.

use async_trait::async_trait;
use coach_core::{
    BootstrapError, ConnectionDetails, SessionEvent,
    session::{RoomConnector, RoomLink},
};
use futures_util::{SinkExt, Stream, StreamExt, stream::SplitSink};
use reqwest::Url;
use tokio::{net::TcpStream, sync::broadcast, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, protocol::Message as WsMessage},
};
use tracing::{debug, info, warn};

type SignalSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

/// Builds `<server_url>/rtc?access_token=<token>`, mapping http(s) to ws(s).
pub fn signal_url(details: &ConnectionDetails) -> Result<Url, BootstrapError> {
    let invalid = |reason: String| {
        BootstrapError::Connect(format!("invalid server URL '{}': {}", details.server_url, reason))
    };
    let mut url = Url::parse(&details.server_url).map_err(|e| invalid(e.to_string()))?;

    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => "",
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    };
    if !scheme.is_empty() {
        url.set_scheme(scheme)
            .map_err(|_| invalid(format!("cannot switch to '{}'", scheme)))?;
    }

    url.path_segments_mut()
        .map_err(|_| invalid("URL cannot carry a path".to_string()))?
        .pop_if_empty()
        .push("rtc");
    url.query_pairs_mut()
        .append_pair("access_token", &details.participant_token)
        .append_pair("auto_subscribe", "1");
    Ok(url)
}

/// Joins rooms over a WebSocket signalling connection.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalConnector;

struct SignalLink {
    sink: SignalSink,
    reader: JoinHandle<()>,
}

#[async_trait]
impl RoomLink for SignalLink {
    async fn close(&mut self) {
        // Stop the reader first so our own close is not reported as a failure.
        self.reader.abort();
        if let Err(e) = self.sink.send(WsMessage::Close(None)).await {
            warn!(error = %e, "Failed to send close frame.");
        }
        if let Err(e) = self.sink.close().await {
            debug!(error = %e, "Signal sink was already closed.");
        }
    }
}

/// Drains the signalling stream until it ends. Any way the socket goes away
/// while the link is open ends the session with [`SessionEvent::AgentFailed`].
async fn read_signals<S>(mut stream: S, events: broadcast::Sender<SessionEvent>)
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    let reason = loop {
        match stream.next().await {
            Some(Ok(WsMessage::Close(frame))) => {
                break frame
                    .map(|frame| frame.reason.to_string())
                    .filter(|reason| !reason.is_empty())
                    .unwrap_or_else(|| "The room was closed by the server.".to_string());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(error = %e, "Signal connection failed.");
                break e.to_string();
            }
            None => break "The signal connection was lost.".to_string(),
        }
    };
    let _ = events.send(SessionEvent::AgentFailed {
        reasons: vec![reason],
    });
}

#[async_trait]
impl RoomConnector for SignalConnector {
    async fn connect(
        &self,
        details: &ConnectionDetails,
        events: broadcast::Sender<SessionEvent>,
    ) -> Result<Box<dyn RoomLink>, BootstrapError> {
        let url = signal_url(details)?;
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| BootstrapError::Connect(e.to_string()))?;
        info!(room = %details.room_name, "Signal connection established.");
        let (sink, stream) = stream.split();
        let reader = tokio::spawn(read_signals(stream, events));

        Ok(Box::new(SignalLink { sink, reader }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;
    use tokio_tungstenite::{
        accept_async, accept_hdr_async,
        tungstenite::{
            handshake::server::{ErrorResponse, Request, Response},
            protocol::{CloseFrame, frame::coding::CloseCode},
        },
    };

    fn details(server_url: &str) -> ConnectionDetails {
        ConnectionDetails {
            server_url: server_url.to_string(),
            room_name: "voice_assistant_room_1".to_string(),
            participant_name: "voice_assistant_user_1".to_string(),
            participant_token: "tok en".to_string(),
        }
    }

    #[test]
    fn test_signal_url_schemes() {
        assert_eq!(
            signal_url(&details("wss://coach.livekit.cloud")).unwrap().as_str(),
            "wss://coach.livekit.cloud/rtc?access_token=tok+en&auto_subscribe=1"
        );
        assert_eq!(
            signal_url(&details("https://coach.livekit.cloud/")).unwrap().as_str(),
            "wss://coach.livekit.cloud/rtc?access_token=tok+en&auto_subscribe=1"
        );
        assert_eq!(
            signal_url(&details("http://127.0.0.1:7880")).unwrap().as_str(),
            "ws://127.0.0.1:7880/rtc?access_token=tok+en&auto_subscribe=1"
        );
    }

    #[test]
    fn test_signal_url_rejects_bad_input() {
        assert!(matches!(
            signal_url(&details("ftp://coach.example.com")),
            Err(BootstrapError::Connect(_))
        ));
        assert!(matches!(
            signal_url(&details("not a url")),
            Err(BootstrapError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn test_server_close_reports_agent_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen_uri = Arc::new(Mutex::new(None));
        let seen = seen_uri.clone();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let callback =
                |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    *seen.lock().unwrap() = Some(request.uri().to_string());
                    Ok(response)
                };
            let mut ws = accept_hdr_async(tcp, callback).await.unwrap();
            ws.close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "agent worker crashed".into(),
            }))
            .await
            .unwrap();
        });

        let (events_tx, mut events) = broadcast::channel(8);
        let _link = SignalConnector
            .connect(&details(&format!("ws://{}", addr)), events_tx)
            .await
            .unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::AgentFailed {
                reasons: vec!["agent worker crashed".to_string()]
            }
        );
        assert_eq!(
            seen_uri.lock().unwrap().as_deref(),
            Some("/rtc?access_token=tok+en&auto_subscribe=1")
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (events_tx, _events) = broadcast::channel(8);
        let result = SignalConnector
            .connect(&details(&format!("ws://{}", addr)), events_tx)
            .await;
        assert!(matches!(result, Err(BootstrapError::Connect(_))));
    }

    #[tokio::test]
    async fn test_socket_dropped_without_close_frame_reports_agent_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = accept_async(tcp).await.unwrap();
            drop(ws);
        });

        let (events_tx, mut events) = broadcast::channel(8);
        let _link = SignalConnector
            .connect(&details(&format!("ws://{}", addr)), events_tx)
            .await
            .unwrap();
        server.await.unwrap();

        match events.recv().await.unwrap() {
            SessionEvent::AgentFailed { reasons } => {
                assert_eq!(reasons.len(), 1);
                assert!(!reasons[0].is_empty());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_sends_close_frame_and_tolerates_repeat() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            matches!(ws.next().await, Some(Ok(WsMessage::Close(_))))
        });

        let (events_tx, mut events) = broadcast::channel(8);
        let mut link = SignalConnector
            .connect(&details(&format!("ws://{}", addr)), events_tx)
            .await
            .unwrap();
        link.close().await;
        link.close().await;

        assert!(server.await.unwrap());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_read_error_reports_agent_failure() {
        let (events_tx, mut events) = broadcast::channel(8);
        let stream = futures_util::stream::iter(vec![
            Ok(WsMessage::Text("offer".into())),
            Err(WsError::AlreadyClosed),
        ]);
        read_signals(stream, events_tx).await;

        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::AgentFailed {
                reasons: vec![WsError::AlreadyClosed.to_string()]
            }
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stream_end_reports_lost_connection() {
        let (events_tx, mut events) = broadcast::channel(8);
        let stream =
            futures_util::stream::iter(vec![Ok::<_, WsError>(WsMessage::Text("offer".into()))]);
        read_signals(stream, events_tx).await;

        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::AgentFailed {
                reasons: vec!["The signal connection was lost.".to_string()]
            }
        );
    }
}
