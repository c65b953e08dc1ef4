use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::ClientError;
use crate::objects::Notification;

/// A subscriber connected to the relay's `/ws` stream.
///
/// The relay never expects anything from the client, so this type only
/// exposes reading and closing.
pub struct RelayClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl RelayClient {
    /// Connect to `ws_url`, e.g. `ws://relay:5000/ws`.
    pub async fn connect(ws_url: &str) -> Result<Self, ClientError> {
        let (stream, _response) = connect_async(ws_url).await?;
        Ok(Self { stream })
    }

    /// Wait for the next notification.
    ///
    /// Returns `None` once the server closes the connection. Ping/pong and
    /// binary frames are skipped.
    pub async fn next_notification(&mut self) -> Option<Result<Notification, ClientError>> {
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    return Some(serde_json::from_str(&text).map_err(ClientError::Json));
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }

    /// Send a normal close frame and flush it.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.send(Message::Close(None)).await?;
        Ok(())
    }
}
