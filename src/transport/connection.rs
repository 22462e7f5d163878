use std::io;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::frame::{read_frame, write_frame, Frame};
use super::TransportError;
use crate::protocol::codec::DEFAULT_MAX_FRAME_BYTES;
use crate::protocol::{decode_payload, encode_payload, Envelope};

const INBOUND_BUFFER: usize = 64;

/// Cloneable handle for queueing outbound envelopes.
///
/// Sending never blocks: envelopes are queued in order and written by the
/// connection's writer task, so the tree owner may send directly.
#[derive(Clone, Debug)]
pub struct EnvelopeSender {
    tx: mpsc::UnboundedSender<Envelope>,
    max_frame_bytes: usize,
}

impl EnvelopeSender {
    pub fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.tx.send(envelope).map_err(|_| TransportError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Largest payload the writer will put on the wire. Anything bigger is
    /// dropped there, after `send` has already succeeded.
    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    pub fn with_frame_limit(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    /// A sender whose envelopes land in the returned receiver instead of a
    /// socket.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = Self {
            tx,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        };
        (sender, rx)
    }
}

/// One live session over a byte stream: a writer task draining the
/// outbound queue and a reader task decoding inbound frames.
///
/// The inbound receiver yields `None` once the peer closes the stream or an
/// I/O error ends it; that is the end of the session.
pub struct Connection {
    sender: EnvelopeSender,
    inbound: mpsc::Receiver<Envelope>,
}

impl Connection {
    /// Spawns the reader and writer tasks for `stream` on the current runtime.
    pub fn spawn<S>(stream: S, max_frame_bytes: usize) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);

        tokio::spawn(writer_loop(write_half, outbound_rx, max_frame_bytes));
        tokio::spawn(reader_loop(read_half, inbound_tx, max_frame_bytes));

        Self {
            sender: EnvelopeSender {
                tx: outbound_tx,
                max_frame_bytes,
            },
            inbound: inbound_rx,
        }
    }

    /// Two connected in-memory endpoints.
    pub fn pair(max_frame_bytes: usize) -> (Self, Self) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (
            Self::spawn(a, max_frame_bytes),
            Self::spawn(b, max_frame_bytes),
        )
    }

    pub fn sender(&self) -> EnvelopeSender {
        self.sender.clone()
    }

    pub async fn recv(&mut self) -> Option<Envelope> {
        self.inbound.recv().await
    }

    pub fn into_parts(self) -> (EnvelopeSender, mpsc::Receiver<Envelope>) {
        (self.sender, self.inbound)
    }
}

async fn writer_loop<W>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<Envelope>,
    max_frame_bytes: usize,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(envelope) = outbound.recv().await {
        let payload = match encode_payload(&envelope) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(kind = %envelope.kind(), error = %err, "Dropping unencodable envelope");
                continue;
            }
        };

        let written = async {
            write_frame(&mut writer, &payload, max_frame_bytes).await?;
            writer.flush().await
        }
        .await;

        match written {
            Ok(()) => {
                tracing::trace!(kind = %envelope.kind(), bytes = payload.len(), "Envelope written");
            }
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                tracing::error!(kind = %envelope.kind(), error = %err, "Dropping oversized envelope");
            }
            Err(err) => {
                tracing::info!(error = %err, "Writer stopped, transport closed");
                return;
            }
        }
    }

    let _ = writer.shutdown().await;
}

async fn reader_loop<R>(mut reader: R, inbound: mpsc::Sender<Envelope>, max_frame_bytes: usize)
where
    R: AsyncRead + Unpin,
{
    loop {
        let payload = match read_frame(&mut reader, max_frame_bytes).await {
            Ok(Frame::Payload(payload)) => payload,
            Ok(Frame::Oversized(len)) => {
                tracing::warn!(len, max = max_frame_bytes, "Skipped oversized frame");
                continue;
            }
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                tracing::debug!("Peer closed the transport");
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Reader stopped, transport closed");
                return;
            }
        };

        match decode_payload(&payload) {
            Ok(envelope) => {
                if inbound.send(envelope).await.is_err() {
                    tracing::debug!("Inbound receiver dropped, stopping reader");
                    return;
                }
            }
            Err(err) if err.is_unknown_type() => {
                tracing::debug!(error = %err, "Dropping envelope of unknown type");
            }
            Err(err) => {
                tracing::warn!(error = %err, "Dropping undecodable envelope");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{codec::DEFAULT_MAX_FRAME_BYTES, NotifyPayload};
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn pair_delivers_in_order() {
        let (left, mut right) = Connection::pair(DEFAULT_MAX_FRAME_BYTES);
        for i in 0..5 {
            left.sender()
                .send(Envelope::Notify(NotifyPayload {
                    node_id: format!("n{i}"),
                    action: "click".into(),
                    params: Default::default(),
                }))
                .expect("send");
        }
        for i in 0..5 {
            match right.recv().await {
                Some(Envelope::Notify(payload)) => assert_eq!(payload.node_id, format!("n{i}")),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn unknown_and_garbage_frames_are_dropped() {
        let (mut raw, stream) = tokio::io::duplex(4096);
        let mut connection = Connection::spawn(stream, DEFAULT_MAX_FRAME_BYTES);

        for payload in [
            &br#"{"type":"teleport","payload":{}}"#[..],
            &b"not json"[..],
            &br#"{"type":"quit"}"#[..],
        ] {
            raw.write_all(&(payload.len() as u32).to_be_bytes()).await.expect("header");
            raw.write_all(payload).await.expect("body");
        }

        assert_eq!(connection.recv().await, Some(Envelope::Quit));
    }

    #[tokio::test]
    async fn peer_drop_ends_inbound_stream() {
        let (left, mut right) = Connection::pair(DEFAULT_MAX_FRAME_BYTES);
        drop(left);
        assert_eq!(right.recv().await, None);
    }
}
