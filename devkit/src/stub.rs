/*!
Stub appliance for development without real hardware

Binds an ephemeral TCP listener and serves a canned response to every
connection. Delivery can be fragmented or cut short to exercise the
transport edge cases of the frame reader.
*/

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

/// How the stub writes its response to a connection.
#[derive(Debug, Clone, Copy)]
pub enum DeliveryMode {
    /// Single write of the whole response.
    Whole,
    /// Fixed-size fragments with a pause between each, forcing the client
    /// through repeated partial reads.
    Chunked(usize),
    /// Only the first `n` bytes, then the connection closes.
    Truncated(usize),
}

/// Stand-in for the appliance status service.
pub struct StubAppliance {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
}

impl StubAppliance {
    /// Starts a stub serving `response` to every connection until dropped
    /// with the runtime.
    pub async fn serve(response: Vec<u8>, mode: DeliveryMode) -> Result<Self> {
        env_logger::try_init().ok(); // Init logging for tests

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let connections = Arc::new(AtomicUsize::new(0));

        let counter = connections.clone();
        tokio::spawn(async move {
            loop {
                let (socket, peer) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        log::warn!("[STUB] accept failed: {e}");
                        break;
                    }
                };
                counter.fetch_add(1, Ordering::SeqCst);
                log::info!("[STUB] connection from {peer}");
                tokio::spawn(deliver(socket, response.clone(), mode));
            }
        });

        Ok(Self { addr, connections })
    }

    /// Convenience for a stub that always serves the given frame intact.
    pub async fn serve_frame(frame: Vec<u8>) -> Result<Self> {
        Self::serve(frame, DeliveryMode::Whole).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Number of connections accepted so far (for assertions in tests).
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn deliver(mut socket: TcpStream, response: Vec<u8>, mode: DeliveryMode) {
    socket.set_nodelay(true).ok();

    let written = match mode {
        DeliveryMode::Whole => socket.write_all(&response).await,
        DeliveryMode::Chunked(size) => {
            let mut result = Ok(());
            for chunk in response.chunks(size.max(1)) {
                if let Err(e) = socket.write_all(chunk).await {
                    result = Err(e);
                    break;
                }
                if let Err(e) = socket.flush().await {
                    result = Err(e);
                    break;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            result
        }
        DeliveryMode::Truncated(n) => {
            let cut = n.min(response.len());
            socket.write_all(&response[..cut]).await
        }
    };

    if let Err(e) = written {
        log::warn!("[STUB] write failed: {e}");
    }
    socket.shutdown().await.ok();
}
