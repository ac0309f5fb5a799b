//! WebSocket transport implementation

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        handshake::server::{Request as HsRequest, Response as HsResponse},
        protocol::Message as WsMessage,
        protocol::WebSocketConfig as WsProtocolConfig,
    },
    WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{
    Transport, TransportEvent, TransportReceiver, TransportSender, TransportServer,
};

use roomcast_core::WS_SUBPROTOCOL;

/// WebSocket configuration
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Subprotocol to negotiate
    pub subprotocol: String,
    /// Maximum message size accepted from peers
    pub max_message_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            subprotocol: WS_SUBPROTOCOL.to_string(),
            max_message_size: 64 * 1024, // 64KB
        }
    }
}

/// WebSocket sender
pub struct WebSocketSender {
    tx: mpsc::Sender<WsMessage>,
    connected: Arc<Mutex<bool>>,
}

#[async_trait]
impl TransportSender for WebSocketSender {
    async fn send(&self, data: Bytes) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        self.tx
            .send(WsMessage::Binary(data.to_vec()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    async fn close(&self) -> Result<()> {
        let _ = self.tx.send(WsMessage::Close(None)).await;
        *self.connected.lock() = false;
        Ok(())
    }
}

/// WebSocket receiver
pub struct WebSocketReceiver {
    rx: mpsc::Receiver<TransportEvent>,
}

#[async_trait]
impl TransportReceiver for WebSocketReceiver {
    async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

/// Bridge a WebSocket stream into sender/receiver halves backed by channels
///
/// Spawns one writer task draining outbound frames and one reader task
/// translating inbound frames into [`TransportEvent`]s. Both ends mark the
/// shared flag disconnected when their stream half dies.
fn spawn_stream_tasks<S>(ws_stream: WebSocketStream<S>) -> (WebSocketSender, WebSocketReceiver)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut write, mut read) = ws_stream.split();

    let (send_tx, mut send_rx) = mpsc::channel::<WsMessage>(100);
    let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(100);

    let connected = Arc::new(Mutex::new(true));
    let connected_write = connected.clone();
    let connected_read = connected.clone();

    // Writer task
    tokio::spawn(async move {
        while let Some(msg) = send_rx.recv().await {
            if let Err(e) = write.send(msg).await {
                error!("WebSocket write error: {}", e);
                break;
            }
        }
        *connected_write.lock() = false;
    });

    // Reader task
    tokio::spawn(async move {
        let _ = event_tx.send(TransportEvent::Connected).await;

        while let Some(result) = read.next().await {
            match result {
                Ok(msg) => match msg {
                    WsMessage::Binary(data) => {
                        let _ = event_tx.send(TransportEvent::Data(Bytes::from(data))).await;
                    }
                    WsMessage::Text(_) => {
                        warn!("Ignoring text frame, protocol is binary");
                    }
                    WsMessage::Ping(_) | WsMessage::Pong(_) => {
                        // Control frames are answered by tungstenite itself
                        debug!("WebSocket control frame");
                    }
                    WsMessage::Close(frame) => {
                        let reason = frame.map(|f| f.reason.to_string());
                        debug!("WebSocket closed: {:?}", reason);
                        let _ = event_tx.send(TransportEvent::Disconnected { reason }).await;
                        break;
                    }
                    WsMessage::Frame(_) => {}
                },
                Err(e) => {
                    error!("WebSocket read error: {}", e);
                    let _ = event_tx.send(TransportEvent::Error(e.to_string())).await;
                    let _ = event_tx
                        .send(TransportEvent::Disconnected {
                            reason: Some(e.to_string()),
                        })
                        .await;
                    break;
                }
            }
        }

        *connected_read.lock() = false;
    });

    (
        WebSocketSender {
            tx: send_tx,
            connected,
        },
        WebSocketReceiver { rx: event_rx },
    )
}

/// WebSocket client transport
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    async fn connect(url: &str) -> Result<(Self::Sender, Self::Receiver)> {
        info!("Connecting to WebSocket: {}", url);

        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            WS_SUBPROTOCOL
                .parse()
                .map_err(|_| TransportError::InvalidUrl(WS_SUBPROTOCOL.to_string()))?,
        );

        let (ws_stream, response) = connect_async(request)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        debug!("WebSocket connected, response: {:?}", response.status());

        if let Some(protocol) = response.headers().get("Sec-WebSocket-Protocol") {
            debug!("Server subprotocol: {:?}", protocol);
        }

        Ok(spawn_stream_tasks(ws_stream))
    }
}

/// WebSocket server
pub struct WebSocketServer {
    listener: tokio::net::TcpListener,
    config: WebSocketConfig,
}

impl WebSocketServer {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        info!("WebSocket server listening on {}", addr);

        Ok(Self {
            listener,
            config: WebSocketConfig::default(),
        })
    }

    pub fn with_config(mut self, config: WebSocketConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl TransportServer for WebSocketServer {
    type Sender = WebSocketSender;
    type Receiver = WebSocketReceiver;

    async fn accept(&mut self) -> Result<(Self::Sender, Self::Receiver, SocketAddr)> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        debug!("Accepted TCP connection from {}", addr);

        let mut ws_config = WsProtocolConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size);

        // Upgrade to WebSocket with subprotocol negotiation
        let subprotocol = self.config.subprotocol.clone();
        let ws_stream = tokio_tungstenite::accept_hdr_async_with_config(
            stream,
            |req: &HsRequest, mut response: HsResponse| {
                // Echo our subprotocol back when the client requested it
                if let Some(protocols) = req.headers().get("Sec-WebSocket-Protocol") {
                    if let Ok(protocols_str) = protocols.to_str() {
                        let requested: Vec<&str> =
                            protocols_str.split(',').map(|s| s.trim()).collect();
                        if requested.contains(&subprotocol.as_str()) {
                            if let Ok(value) = subprotocol.parse() {
                                response
                                    .headers_mut()
                                    .insert("Sec-WebSocket-Protocol", value);
                            }
                        }
                    }
                }
                Ok(response)
            },
            Some(ws_config),
        )
        .await
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        info!("WebSocket client connected from {}", addr);

        let (sender, receiver) = spawn_stream_tasks(ws_stream);
        Ok((sender, receiver, addr))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(TransportError::Io)
    }

    async fn close(&self) -> Result<()> {
        // TCP listener closes on drop
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_websocket_config() {
        let config = WebSocketConfig::default();
        assert_eq!(config.subprotocol, "roomcast.v1");
        assert_eq!(config.max_message_size, 64 * 1024);
    }

    #[tokio::test]
    async fn test_connect_send_receive() {
        let mut server = WebSocketServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();

        let accept_task = tokio::spawn(async move { server.accept().await });

        let url = format!("ws://{}", addr);
        let (client_tx, mut client_rx) = WebSocketTransport::connect(&url).await.unwrap();
        let (server_tx, mut server_rx, _) = accept_task.await.unwrap().unwrap();

        // Both ends surface a Connected event first
        assert!(matches!(client_rx.recv().await, Some(TransportEvent::Connected)));
        assert!(matches!(server_rx.recv().await, Some(TransportEvent::Connected)));

        client_tx.send(Bytes::from_static(b"up")).await.unwrap();
        match server_rx.recv().await {
            Some(TransportEvent::Data(data)) => assert_eq!(&data[..], b"up"),
            other => panic!("expected data, got {:?}", other),
        }

        server_tx.send(Bytes::from_static(b"down")).await.unwrap();
        match client_rx.recv().await {
            Some(TransportEvent::Data(data)) => assert_eq!(&data[..], b"down"),
            other => panic!("expected data, got {:?}", other),
        }

        client_tx.close().await.unwrap();
        assert!(!client_tx.is_connected());
    }
}
