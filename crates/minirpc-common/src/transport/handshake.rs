//! Connection handshake.
//!
//! The client opens every connection with its [`Options`] encoded as one
//! JSON line. Everything after the newline is framed with the codec named
//! in `codec_type`.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::error::{Result, RpcError};
use crate::protocol::Options;

/// Upper bound on the options line.
const MAX_OPTIONS_LEN: usize = 4096;

/// Writes `opt` as a single JSON line and flushes.
pub async fn write_options<W>(writer: &mut W, opt: &Options) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(opt)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads and validates the options line.
///
/// The reader must be the same buffered reader used for the frames that
/// follow, since it may already hold bytes past the newline.
///
/// # Errors
///
/// - [`RpcError::Closed`] if the peer hung up before sending a line
/// - [`RpcError::InvalidOptions`] if the line is not valid options JSON,
///   names an unknown codec, or carries the wrong magic number
pub async fn read_options<R>(reader: &mut R) -> Result<Options>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if line.is_empty() {
                return Err(RpcError::Closed);
            }
            return Err(RpcError::InvalidOptions("unterminated options line".into()));
        }
        match available.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                line.extend_from_slice(&available[..pos]);
                reader.consume(pos + 1);
                break;
            }
            None => {
                let n = available.len();
                line.extend_from_slice(available);
                reader.consume(n);
            }
        }
        if line.len() > MAX_OPTIONS_LEN {
            return Err(RpcError::InvalidOptions("options line too long".into()));
        }
    }

    let opt: Options = serde_json::from_slice(&line)
        .map_err(|e| RpcError::InvalidOptions(format!("decoding options: {}", e)))?;

    if !opt.is_valid() {
        return Err(RpcError::InvalidOptions(format!(
            "invalid magic number {:#x}",
            opt.magic_number
        )));
    }

    Ok(opt)
}
