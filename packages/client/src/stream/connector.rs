//! Socket seam for the stream client.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

use crate::error::StreamError;

/// Inbound frame as seen by the stream client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Binary, ping, pong and other control frames
    Ignored,
}

/// One open stream socket
#[async_trait]
pub trait StreamConnection: Send {
    /// Next inbound frame; `None` once the peer has closed the connection
    async fn next_frame(&mut self) -> Option<Result<Frame, StreamError>>;

    /// Close the socket from our side
    async fn close(&mut self);
}

/// Opens stream sockets
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamConnection>, StreamError>;
}

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamConnection>, StreamError> {
        let (socket, response) = connect_async(url)
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?;
        tracing::debug!("Stream handshake answered {}", response.status());

        Ok(Box::new(TungsteniteConnection { socket }))
    }
}

struct TungsteniteConnection {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamConnection for TungsteniteConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame, StreamError>> {
        match self.socket.next().await? {
            Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.as_str().to_owned()))),
            Ok(Message::Close(frame)) => {
                tracing::debug!("Server sent close frame: {:?}", frame);
                None
            }
            Ok(_) => Some(Ok(Frame::Ignored)),
            Err(e) => Some(Err(StreamError::Transport(e.to_string()))),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.socket.close(None).await {
            tracing::debug!("Closing stream socket failed: {}", e);
        }
    }
}
