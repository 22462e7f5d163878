//! Ordered, reliable byte-stream transport between producer and renderer.
//!
//! One connection per application instance, over a process-private Unix
//! domain socket. There is no reconnection: when the stream ends, so does
//! the session.

mod connection;
pub mod frame;

pub use connection::{Connection, EnvelopeSender};

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("socket '{path}': {source}")]
    Socket {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Connects to a renderer listening at `path`.
#[cfg(unix)]
pub async fn connect(path: &Path, max_frame_bytes: usize) -> Result<Connection, TransportError> {
    let stream = tokio::net::UnixStream::connect(path)
        .await
        .map_err(|source| TransportError::Socket {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::info!(socket = %path.display(), "Connected to renderer");
    Ok(Connection::spawn(stream, max_frame_bytes))
}

/// Renderer-side listener. Removes a stale socket file on bind and on drop.
#[cfg(unix)]
pub struct Listener {
    inner: tokio::net::UnixListener,
    path: PathBuf,
    max_frame_bytes: usize,
}

#[cfg(unix)]
impl Listener {
    pub fn bind(path: &Path, max_frame_bytes: usize) -> Result<Self, TransportError> {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let socket_error = |source| TransportError::Socket {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(socket_error)?;
        }
        if path.exists() {
            if let Err(err) = fs::remove_file(path) {
                tracing::warn!(socket = %path.display(), error = %err, "Failed to remove stale socket");
            }
        }

        let inner = tokio::net::UnixListener::bind(path).map_err(socket_error)?;
        if let Err(err) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
            tracing::warn!(
                socket = %path.display(),
                error = %err,
                "Failed to restrict socket permissions, it stays at the umask default"
            );
        }
        tracing::info!(socket = %path.display(), "Listening for producer sessions");

        Ok(Self {
            inner,
            path: path.to_path_buf(),
            max_frame_bytes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn accept(&self) -> Result<Connection, TransportError> {
        let (stream, _addr) = self.inner.accept().await?;
        tracing::info!(socket = %self.path.display(), "Producer connected");
        Ok(Connection::spawn(stream, self.max_frame_bytes))
    }
}

#[cfg(unix)]
impl Drop for Listener {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::debug!(socket = %self.path.display(), error = %err, "Socket file already gone");
        }
    }
}
