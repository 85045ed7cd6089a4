//! Byte-stream primitives shared by every network operation
//!
//! `read_all` accumulates one full message of unknown length off a stream.
//! The buffer grows one chunk at a time: a read that fills its chunk exactly
//! is taken to mean more data may follow, any shorter read ends the message.
//! This is a heuristic end-of-message signal, not a framing protocol; it
//! matches how proxy-style requests and CONNECT responses arrive in practice.

use crate::error::Result;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read chunk size. Growth happens in multiples of this.
pub const CHUNK_SIZE: usize = 4096;

/// Read a full message from the stream
///
/// Returns `Ok(None)` when the peer closed before sending anything; an I/O
/// error at any point discards whatever was accumulated. The returned buffer
/// is trimmed to the exact byte count read.
pub async fn read_all<R>(stream: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut data = vec![0u8; CHUNK_SIZE];
    let mut total = 0usize;

    loop {
        let n = stream.read(&mut data[total..total + CHUNK_SIZE]).await?;
        total += n;

        if n == CHUNK_SIZE {
            // may be more data to come
            data.resize(total + CHUNK_SIZE, 0);
            continue;
        }
        break;
    }

    if total == 0 {
        return Ok(None);
    }

    data.truncate(total);
    Ok(Some(data))
}

/// Write the whole buffer and flush
pub async fn write_all<W>(stream: &mut W, data: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    stream.write_all(data).await?;
    stream.flush().await?;
    Ok(())
}
