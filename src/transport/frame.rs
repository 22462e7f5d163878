use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::codec::FRAME_HEADER_LEN;

/// Outcome of reading one frame off the stream.
#[derive(Debug)]
pub enum Frame {
    Payload(Vec<u8>),
    /// The header announced more than the cap; the body was skipped so the
    /// stream stays aligned on the next frame.
    Oversized(usize),
}

pub async fn read_frame<R>(reader: &mut R, max_payload: usize) -> io::Result<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0_u8; FRAME_HEADER_LEN];
    reader.read_exact(&mut len_buf).await?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_payload {
        let skipped = tokio::io::copy(&mut (&mut *reader).take(len as u64), &mut tokio::io::sink()).await?;
        if (skipped as usize) < len {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        return Ok(Frame::Oversized(len));
    }

    let mut payload = vec![0_u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Frame::Payload(payload))
}

pub async fn write_frame<W>(writer: &mut W, payload: &[u8], max_payload: usize) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > max_payload {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {} > {}", payload.len(), max_payload),
        ));
    }

    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "payload exceeds u32"))?;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    Ok(())
}
