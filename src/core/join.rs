//! # Join Module
//!
//! One-shot membership transfer over TCP, used when a node joins the cluster.
//! The contact writes its snapshot as concatenated [`HostRecord`]s and closes
//! the stream; the joining node reads until the end of the stream.
use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result};

use super::host::{HostRecord, HOST_RECORD_LEN};

pub fn encode_snapshot(records: &[HostRecord]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(records.len() * HOST_RECORD_LEN);
    for record in records {
        record.encode(&mut buf);
    }

    buf
}

/// Splits a transferred snapshot into records.
///
/// Fails with [`Error::MalformedRecord`] unless the length is an exact
/// multiple of [`HOST_RECORD_LEN`].
pub fn decode_snapshot(bytes: &[u8]) -> Result<Vec<HostRecord>> {
    if bytes.len() % HOST_RECORD_LEN != 0 {
        return Err(Error::malformed(format!(
            "snapshot of {} bytes has a trailing {} byte remainder",
            bytes.len(),
            bytes.len() % HOST_RECORD_LEN
        )));
    }

    bytes
        .chunks_exact(HOST_RECORD_LEN)
        .map(|mut frame| HostRecord::decode(&mut frame))
        .collect()
}

/// Writes `snapshot` to a freshly accepted join connection and closes it.
pub(crate) async fn serve_snapshot(mut stream: TcpStream, snapshot: &[HostRecord]) -> Result<()> {
    stream.write_all(&encode_snapshot(snapshot)).await?;
    stream.shutdown().await?;

    Ok(())
}

/// Downloads the membership snapshot of `contact`.
///
/// Every failure (refused connection, timeout, truncated stream) is reported
/// as [`Error::JoinFailed`].
pub(crate) async fn fetch_snapshot(
    contact: SocketAddr,
    timeout: Duration,
) -> Result<Vec<HostRecord>> {
    let transfer = async {
        let mut stream = TcpStream::connect(contact).await?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await?;

        Ok::<_, Error>(bytes)
    };

    let bytes = match tokio::time::timeout(timeout, transfer).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => return Err(Error::join_failed(format!("transfer from {contact}: {e}"))),
        Err(_) => return Err(Error::join_failed(format!("transfer from {contact} timed out"))),
    };

    let records = decode_snapshot(&bytes)
        .map_err(|e| Error::join_failed(format!("snapshot from {contact}: {e}")))?;
    if records.is_empty() {
        return Err(Error::join_failed(format!("empty snapshot from {contact}")));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use crate::{
        core::host::{HostId, HostRecord, HOST_RECORD_LEN},
        error::Error,
    };

    use super::{decode_snapshot, encode_snapshot, fetch_snapshot, serve_snapshot};

    fn hosts(n: u16) -> Vec<HostRecord> {
        (0..n)
            .map(|i| HostRecord::new(HostId::random(), Ipv4Addr::new(10, 0, 0, i as u8), 8000 + i))
            .collect()
    }

    #[test]
    fn test_join_decode_snapshot_preserves_order() {
        let records = hosts(5);
        let bytes = encode_snapshot(&records);

        assert_eq!(bytes.len(), 5 * HOST_RECORD_LEN);
        assert_eq!(decode_snapshot(&bytes).unwrap(), records);
    }

    #[test]
    fn test_join_decode_snapshot_rejects_remainder() {
        let bytes = encode_snapshot(&hosts(2));

        let result = decode_snapshot(&bytes[..bytes.len() - 3]);
        assert!(matches!(result, Err(Error::MalformedRecord { .. })));
    }

    #[tokio::test]
    async fn test_join_fetch_snapshot_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let records = hosts(3);
        let served = records.clone();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            serve_snapshot(stream, &served).await.unwrap();
        });

        let result = fetch_snapshot(addr, Duration::from_secs(1)).await.unwrap();
        assert_eq!(result, records);
    }

    #[tokio::test]
    async fn test_join_fetch_snapshot_truncated_stream_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let bytes = encode_snapshot(&hosts(2));
            stream.write_all(&bytes[..30]).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        let result = fetch_snapshot(addr, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::JoinFailed { .. })));
    }

    #[tokio::test]
    async fn test_join_fetch_snapshot_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = fetch_snapshot(addr, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::JoinFailed { .. })));
    }
}
