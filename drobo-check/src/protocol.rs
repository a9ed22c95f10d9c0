//! Frame reader for the appliance status protocol
//!
//! The appliance speaks a length-prefixed framing on TCP: a 16-byte header
//! whose trailing 4 bytes carry the body length as a big-endian signed
//! 32-bit integer, then the body, whose final byte is padding. This module
//! owns the socket byte stream and returns the complete status document
//! regardless of how the transport fragments delivery.

use crate::config::CheckConfig;
use crate::error::CheckError;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Well-known port of the appliance status service.
pub const STATUS_PORT: u16 = 5000;

/// Upper bound on a single read.
const CHUNK_SIZE: usize = 2048;

/// Fixed header size; the last 4 bytes declare the body length.
const HEADER_LEN: usize = 16;

/// Reads exactly `n` bytes, accumulating across as many partial deliveries
/// as the transport produces. EOF before `n` bytes is a hard failure,
/// never a short result.
pub async fn read_exact_chunked<R>(stream: &mut R, n: usize) -> Result<Vec<u8>, CheckError>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut collected = Vec::with_capacity(n);
    while collected.len() < n {
        let want = (n - collected.len()).min(CHUNK_SIZE);
        let received = stream.read(&mut chunk[..want]).await?;
        if received == 0 {
            return Err(CheckError::ConnectionClosed {
                expected: n,
                got: collected.len(),
            });
        }
        collected.extend_from_slice(&chunk[..received]);
    }
    Ok(collected)
}

/// Reads one status frame and returns the document bytes with the trailing
/// pad byte stripped.
pub async fn read_status_frame<R>(stream: &mut R) -> Result<Vec<u8>, CheckError>
where
    R: AsyncRead + Unpin,
{
    let header = read_exact_chunked(stream, HEADER_LEN).await?;

    let mut declared_bytes = [0u8; 4];
    declared_bytes.copy_from_slice(&header[HEADER_LEN - 4..]);
    let declared = i32::from_be_bytes(declared_bytes);
    if declared <= 0 {
        return Err(CheckError::Protocol(format!(
            "declared body length {declared} is not positive"
        )));
    }
    debug!("header declares a {declared}-byte body");

    let mut body = read_exact_chunked(stream, declared as usize).await?;
    body.truncate(declared as usize - 1); // drop the pad byte
    Ok(body)
}

/// Opens the TCP connection, bounded by the configured connect timeout.
pub async fn connect(host: &str, port: u16, timeout_secs: u64) -> Result<TcpStream, CheckError> {
    let addr = format!("{host}:{port}");
    debug!("connecting to {addr}");
    match tokio::time::timeout(Duration::from_secs(timeout_secs), TcpStream::connect(&addr)).await
    {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(CheckError::Connection(e)),
        Err(_) => Err(CheckError::Timeout {
            what: "connect",
            secs: timeout_secs,
        }),
    }
}

/// Connects and reads one status document, retrying transport failures up
/// to the configured bound. Framing and document errors are never retried.
pub async fn fetch_status(host: &str, config: &CheckConfig) -> Result<Vec<u8>, CheckError> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match fetch_once(host, config).await {
            Ok(document) => return Ok(document),
            Err(e) if e.is_transient() && attempt <= config.retries => {
                warn!("attempt {attempt} failed, retrying: {e}");
            }
            Err(e) => return Err(e),
        }
    }
}

async fn fetch_once(host: &str, config: &CheckConfig) -> Result<Vec<u8>, CheckError> {
    let mut stream = connect(host, config.port, config.connect_timeout_secs).await?;
    match tokio::time::timeout(
        Duration::from_secs(config.read_timeout_secs),
        read_status_frame(&mut stream),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(CheckError::Timeout {
            what: "status read",
            secs: config.read_timeout_secs,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drobo_devkit::{
        encode_frame, encode_frame_with_length, DeliveryMode, StatusDocumentBuilder, StubAppliance,
    };

    fn local_config(port: u16, retries: u32) -> CheckConfig {
        CheckConfig {
            port,
            connect_timeout_secs: 5,
            read_timeout_secs: 5,
            retries,
        }
    }

    #[tokio::test]
    async fn frame_round_trip() {
        let frame = encode_frame(b"<ESATMUpdate/>");
        let mut stream: &[u8] = &frame;
        let document = read_status_frame(&mut stream).await.unwrap();
        assert_eq!(document, b"<ESATMUpdate/>");
    }

    #[tokio::test]
    async fn one_byte_delivery_matches_bulk() {
        let frame = StatusDocumentBuilder::new().slot(0, 3).build_frame();
        let stub = StubAppliance::serve(frame.clone(), DeliveryMode::Chunked(1))
            .await
            .unwrap();

        let mut conn = TcpStream::connect(stub.addr()).await.unwrap();
        let chunked = read_status_frame(&mut conn).await.unwrap();

        let mut bulk: &[u8] = &frame;
        let whole = read_status_frame(&mut bulk).await.unwrap();
        assert_eq!(chunked, whole);
    }

    #[tokio::test]
    async fn premature_close_mid_header_fails() {
        let frame = encode_frame(b"<ESATMUpdate/>");
        let stub = StubAppliance::serve(frame, DeliveryMode::Truncated(10))
            .await
            .unwrap();

        let mut conn = TcpStream::connect(stub.addr()).await.unwrap();
        match read_status_frame(&mut conn).await {
            Err(CheckError::ConnectionClosed { expected, got }) => {
                assert_eq!(expected, 16);
                assert_eq!(got, 10);
            }
            other => panic!("expected ConnectionClosed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn premature_close_mid_body_fails() {
        // 16-byte header + 15-byte body; cut 4 bytes before the end
        let frame = encode_frame(b"<ESATMUpdate/>");
        let cut = frame.len() - 4;
        let stub = StubAppliance::serve(frame, DeliveryMode::Truncated(cut))
            .await
            .unwrap();

        let mut conn = TcpStream::connect(stub.addr()).await.unwrap();
        match read_status_frame(&mut conn).await {
            Err(CheckError::ConnectionClosed { expected, got }) => {
                assert_eq!(expected, 15);
                assert_eq!(got, 11);
            }
            other => panic!("expected ConnectionClosed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_positive_declared_length_rejected() {
        for declared in [0i32, -5] {
            let frame = encode_frame_with_length(declared, b"");
            let mut stream: &[u8] = &frame;
            match read_status_frame(&mut stream).await {
                Err(CheckError::Protocol(reason)) => {
                    assert!(reason.contains("not positive"), "unexpected reason: {reason}");
                }
                other => panic!("expected Protocol error, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn connection_refused_is_transient() {
        // bind then drop to grab a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = connect(&addr.ip().to_string(), addr.port(), 5)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn transport_errors_retry_up_to_bound() {
        let frame = StatusDocumentBuilder::new().build_frame();
        let stub = StubAppliance::serve(frame, DeliveryMode::Truncated(4))
            .await
            .unwrap();

        let err = fetch_status(&stub.host(), &local_config(stub.port(), 2))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::ConnectionClosed { .. }));
        assert_eq!(stub.connection_count(), 3);
    }

    #[tokio::test]
    async fn framing_errors_are_not_retried() {
        let frame = encode_frame_with_length(0, b"");
        let stub = StubAppliance::serve_frame(frame).await.unwrap();

        let err = fetch_status(&stub.host(), &local_config(stub.port(), 5))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::Protocol(_)));
        assert_eq!(stub.connection_count(), 1);
    }

    #[tokio::test]
    async fn fetch_status_returns_document_from_live_socket() {
        let builder = StatusDocumentBuilder::new().slot(0, 3);
        let stub = StubAppliance::serve_frame(builder.build_frame()).await.unwrap();

        let document = fetch_status(&stub.host(), &local_config(stub.port(), 0))
            .await
            .unwrap();
        assert_eq!(document, builder.build_xml().as_bytes());
    }
}
