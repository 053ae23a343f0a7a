use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("transport closed")]
    Closed,
}

/// One live push connection delivering text frames
#[async_trait]
pub trait Transport: Send + 'static {
    /// Next inbound text frame; `None` once the peer has closed
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens push connections by channel name
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, channel: &str) -> Result<Box<dyn Transport>, TransportError>;
}

/// Dials `{ws_base}/{channel}` on the game server
pub struct WebSocketConnector {
    ws_base: String,
}

impl WebSocketConnector {
    pub fn new(ws_base: impl Into<String>) -> Self {
        Self { ws_base: ws_base.into() }
    }

    pub fn url_for(&self, channel: &str) -> String {
        format!("{}/{channel}", self.ws_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, channel: &str) -> Result<Box<dyn Transport>, TransportError> {
        let url = self.url_for(channel);
        debug!("dialing {url}");
        let (stream, _) = connect_async(url.as_str()).await?;
        Ok(Box::new(WebSocketTransport { stream }))
    }
}

struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(_)) => return None,
                Ok(Message::Ping(payload)) => {
                    if let Err(e) = self.stream.send(Message::Pong(payload)).await {
                        return Some(Err(e.into()));
                    }
                }
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.close(None).await?;
        Ok(())
    }
}
