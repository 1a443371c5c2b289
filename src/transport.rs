//! Streaming transport seam.
//!
//! A [`Transport`] opens [`Connection`]s; a connection yields raw text
//! frames until the peer goes away, and can be closed by the client. The
//! production implementation runs over `tokio-tungstenite`.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::RobinError;

/// Opens streaming connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to `url`. Returning `Ok` means the connection is ready.
    async fn open(&self, url: &str) -> Result<Box<dyn Connection>, RobinError>;
}

/// One live full-duplex connection.
#[async_trait]
pub trait Connection: Send {
    /// Next text frame. `None` once the connection has closed.
    async fn recv(&mut self) -> Option<Result<String, RobinError>>;

    /// Close the connection from our side.
    async fn close(&mut self) -> Result<(), RobinError>;
}

/// [`Transport`] over WebSockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str) -> Result<Box<dyn Connection>, RobinError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| RobinError::transport(url, e))?;
        Ok(Box::new(WsConnection {
            url: url.to_string(),
            stream,
            closed: false,
        }))
    }
}

struct WsConnection {
    url: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait]
impl Connection for WsConnection {
    async fn recv(&mut self) -> Option<Result<String, RobinError>> {
        if self.closed {
            return None;
        }
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => return Some(Ok(text)),
                Some(Ok(WsMessage::Binary(bytes))) => {
                    return Some(String::from_utf8(bytes).map_err(|e| {
                        RobinError::Protocol(format!("binary frame is not UTF-8: {e}"))
                    }));
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!(url = %self.url, ?frame, "server closed the socket");
                    self.closed = true;
                    return None;
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.closed = true;
                    return Some(Err(RobinError::transport(&self.url, e)));
                }
                None => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), RobinError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(RobinError::transport(&self.url, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use tokio::net::TcpListener;

    async fn echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                ws.send(WsMessage::Text(r#"{"type":"chat"}"#.to_string())).await.unwrap();
                ws.send(WsMessage::Ping(vec![1])).await.unwrap();
                ws.send(WsMessage::Binary(b"bin".to_vec())).await.unwrap();
                ws.close(None).await.unwrap();
            }
        });
        format!("ws://{}", addr)
    }

    #[tokio::test]
    async fn test_ws_transport_reads_frames_until_close() {
        let url = echo_server().await;
        let mut conn = WsTransport.open(&url).await.unwrap();

        assert_eq!(conn.recv().await.unwrap().unwrap(), r#"{"type":"chat"}"#);
        assert_eq!(conn.recv().await.unwrap().unwrap(), "bin");
        assert!(conn.recv().await.is_none());
        assert!(conn.recv().await.is_none());
        assert!(conn.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_ws_transport_connect_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        match WsTransport.open(&format!("ws://{}", addr)).await {
            Err(err) => assert!(err.is_transport()),
            Ok(_) => panic!("expected connection failure"),
        }
    }
}
