use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter, ReadHalf, WriteHalf,
};

use crate::protocol::error::{Result, RpcError};
use crate::protocol::{Header, Options};
use crate::transport::codec::Encoding;
use crate::transport::connect::Connection;

/// Upper bound on a single frame, to keep a corrupt or hostile length prefix
/// from exhausting memory.
const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

pub(crate) async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(RpcError::Transport(format!(
            "frame too large: {} bytes (max {} bytes)",
            len, MAX_FRAME_SIZE
        )));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

pub(crate) async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) -> Result<()> {
    writer.write_all(&(data.len() as u32).to_be_bytes()).await?;
    writer.write_all(data).await?;
    Ok(())
}

/// Sends the negotiation record as one frame. Always JSON, independent of
/// the codec being negotiated.
pub async fn write_options<W: AsyncWrite + Unpin>(writer: &mut W, options: &Options) -> Result<()> {
    let payload = serde_json::to_vec(options)?;
    write_frame(writer, &payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the peer's negotiation record.
pub async fn read_options<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Options> {
    let payload = read_frame(reader).await?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Splits a negotiated connection into its framed read and write halves.
pub fn open(conn: Box<dyn Connection>, encoding: Encoding) -> (CodecReader, CodecWriter) {
    let (read_half, write_half) = tokio::io::split(conn);
    (
        CodecReader {
            inner: read_half,
            encoding,
        },
        CodecWriter {
            inner: BufWriter::new(write_half),
            encoding,
        },
    )
}

/// Read half of a negotiated connection.
///
/// Every header frame is followed by exactly one body frame; callers that do
/// not want a body must still consume it with [`CodecReader::discard_body`]
/// so the stream stays aligned.
pub struct CodecReader {
    inner: ReadHalf<Box<dyn Connection>>,
    encoding: Encoding,
}

impl CodecReader {
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Blocks until a full header is decoded or the stream fails.
    pub async fn read_header(&mut self) -> Result<Header> {
        let frame = read_frame(&mut self.inner).await?;
        self.encoding.decode(&frame)
    }

    /// Decodes the body that follows the last header.
    pub async fn read_body<T: DeserializeOwned>(&mut self) -> Result<T> {
        let frame = read_frame(&mut self.inner).await?;
        self.encoding.decode(&frame)
    }

    /// Reads the body that follows the last header without decoding it.
    pub async fn read_body_raw(&mut self) -> Result<Vec<u8>> {
        read_frame(&mut self.inner).await
    }

    /// Consumes and discards the next body frame.
    pub async fn discard_body(&mut self) -> Result<()> {
        read_frame(&mut self.inner).await?;
        Ok(())
    }
}

/// Write half of a negotiated connection.
pub struct CodecWriter {
    inner: BufWriter<WriteHalf<Box<dyn Connection>>>,
    encoding: Encoding,
}

impl CodecWriter {
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Emits a header frame followed by a body frame and flushes the pair.
    pub async fn write<T: Serialize + ?Sized>(&mut self, header: &Header, body: &T) -> Result<()> {
        let body = self.encoding.encode(body)?;
        self.write_raw(header, &body).await
    }

    /// Like [`CodecWriter::write`] with an already-encoded body.
    pub async fn write_raw(&mut self, header: &Header, body: &[u8]) -> Result<()> {
        let header = self.encoding.encode(header)?;
        write_frame(&mut self.inner, &header).await?;
        write_frame(&mut self.inner, body).await?;
        if let Err(e) = self.inner.flush().await {
            // a torn frame must not stay on the wire
            let _ = self.inner.shutdown().await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Shuts the write side down, flushing anything buffered.
    pub async fn close(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
