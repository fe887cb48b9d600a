//! Dials the in-sandbox ttyd WebSocket endpoint.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
#[error("backend connection failed: {0}")]
pub struct UpstreamError(String);

/// Dials `ws://<ip>:<ttyd_port>/ws` with the fixed 10s timeout from the
/// concurrency model.
pub async fn dial(ip: &str, ttyd_port: u16) -> Result<UpstreamSocket, UpstreamError> {
    let url = format!("ws://{ip}:{ttyd_port}/ws");

    let connect = tokio_tungstenite::connect_async(&url);
    match tokio::time::timeout(Duration::from_secs(10), connect).await {
        Ok(Ok((socket, _response))) => Ok(socket),
        Ok(Err(e)) => Err(UpstreamError(e.to_string())),
        Err(_) => Err(UpstreamError("dial timed out".to_string())),
    }
}
