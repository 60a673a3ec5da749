use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

use crate::protocol::error::{Result, RpcError};
use crate::protocol::Header;
use crate::transport::codec::CodecType;
use crate::transport::MAX_FRAME_SIZE;

/// Reads length-prefixed frames and decodes them with the negotiated codec.
///
/// Every message is two frames: a header, then a body. Callers must consume
/// the body after each header, either with [`read_body`](Self::read_body),
/// [`read_body_raw`](Self::read_body_raw) or
/// [`discard_body`](Self::discard_body).
///
/// # Wire Format
///
/// ```text
/// [4-byte length as u32 big-endian] [encoded header]
/// [4-byte length as u32 big-endian] [encoded body]
/// ```
pub struct CodecReader<R> {
    inner: R,
    codec: CodecType,
}

impl<R: AsyncRead + Unpin> CodecReader<R> {
    pub fn new(inner: R, codec: CodecType) -> Self {
        Self { inner, codec }
    }

    pub fn codec(&self) -> CodecType {
        self.codec
    }

    /// Reads the next header.
    ///
    /// A clean end of stream yields [`RpcError::Closed`].
    pub async fn read_header(&mut self) -> Result<Header> {
        let frame = self.read_frame().await?;
        self.codec.decode(&frame)
    }

    /// Reads the body that follows a header and decodes it as `T`.
    pub async fn read_body<T: DeserializeOwned>(&mut self) -> Result<T> {
        let frame = self.read_frame().await?;
        self.codec.decode(&frame)
    }

    /// Reads the body that follows a header without decoding it.
    pub async fn read_body_raw(&mut self) -> Result<Vec<u8>> {
        self.read_frame().await
    }

    /// Reads and drops the body that follows a header.
    pub async fn discard_body(&mut self) -> Result<()> {
        self.read_frame().await.map(|_| ())
    }

    async fn read_frame(&mut self) -> Result<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        self.inner.read_exact(&mut len_buf).await?;

        let len = u32::from_be_bytes(len_buf) as usize;

        // Validate length to prevent allocation of excessively large buffers
        if len > MAX_FRAME_SIZE {
            return Err(RpcError::Codec(format!(
                "frame too large: {} bytes (max {} bytes)",
                len, MAX_FRAME_SIZE
            )));
        }

        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf).await?;
        Ok(buf)
    }
}

/// Encodes header/body pairs and writes them as length-prefixed frames.
///
/// Output is buffered and flushed once per pair. If any step fails the
/// underlying stream is shut down and the error returned; the writer must
/// not be used afterwards.
pub struct CodecWriter<W> {
    inner: BufWriter<W>,
    codec: CodecType,
}

impl<W: AsyncWrite + Unpin> CodecWriter<W> {
    pub fn new(inner: W, codec: CodecType) -> Self {
        Self {
            inner: BufWriter::new(inner),
            codec,
        }
    }

    pub fn codec(&self) -> CodecType {
        self.codec
    }

    /// Encodes `body` and writes it after `header`.
    pub async fn write<T: Serialize + ?Sized>(&mut self, header: &Header, body: &T) -> Result<()> {
        let body = match self.codec.encode(body) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("rpc codec: encoding body: {}", e);
                let _ = self.inner.shutdown().await;
                return Err(e);
            }
        };
        self.write_raw(header, &body).await
    }

    /// Writes `header` followed by an already encoded body.
    pub async fn write_raw(&mut self, header: &Header, body: &[u8]) -> Result<()> {
        let result = self.write_pair(header, body).await;
        if let Err(e) = &result {
            tracing::error!("rpc codec: writing frame: {}", e);
            let _ = self.inner.shutdown().await;
        }
        result
    }

    /// Flushes and shuts down the write side.
    pub async fn close(&mut self) -> Result<()> {
        self.inner.flush().await?;
        self.inner.shutdown().await?;
        Ok(())
    }

    async fn write_pair(&mut self, header: &Header, body: &[u8]) -> Result<()> {
        let header = self.codec.encode(header)?;
        Self::check_len(header.len())?;
        Self::check_len(body.len())?;

        self.inner.write_all(&(header.len() as u32).to_be_bytes()).await?;
        self.inner.write_all(&header).await?;
        self.inner.write_all(&(body.len() as u32).to_be_bytes()).await?;
        self.inner.write_all(body).await?;
        self.inner.flush().await?;
        Ok(())
    }

    fn check_len(len: usize) -> Result<()> {
        if len > MAX_FRAME_SIZE {
            return Err(RpcError::Codec(format!(
                "frame too large: {} bytes (max {} bytes)",
                len, MAX_FRAME_SIZE
            )));
        }
        Ok(())
    }
}
