use super::{Flow, Renderer};
use crate::owner::TreeOwner;
use crate::transport::Connection;

#[cfg(unix)]
use crate::shutdown::ShutdownHandle;
#[cfg(unix)]
use crate::transport::Listener;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The producer sent `quit`.
    Quit,
    /// The transport closed.
    Disconnected,
}

/// Runs one producer session to completion on the tree owner.
///
/// Inbound envelopes arrive from the connection's reader task and are
/// applied here, interleaved with jobs posted by event dispatch. The tree,
/// views and registrations of the session are dropped when it ends.
pub async fn run_session<V: 'static>(
    owner: &mut TreeOwner<Renderer<V>>,
    connection: Connection,
) -> SessionEnd {
    let (sender, mut inbound) = connection.into_parts();
    owner.state_mut().attach(sender);

    let end = loop {
        tokio::select! {
            envelope = inbound.recv() => match envelope {
                Some(envelope) => {
                    if owner.state_mut().handle_envelope(envelope) == Flow::Quit {
                        break SessionEnd::Quit;
                    }
                }
                None => break SessionEnd::Disconnected,
            },
            () = owner.run_next() => {}
        }
    };

    owner.state_mut().end_session();
    end
}

/// Accepts producer sessions one at a time until shutdown. A producer that
/// restarts (hot reload) simply connects again.
#[cfg(unix)]
pub async fn serve<V: 'static>(
    listener: Listener,
    owner: &mut TreeOwner<Renderer<V>>,
    shutdown: ShutdownHandle,
) {
    loop {
        let connection = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(connection) => connection,
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to accept producer");
                    continue;
                }
            },
            () = shutdown.wait() => break,
        };

        tokio::select! {
            end = run_session(owner, connection) => {
                tracing::info!(?end, "Session ended, waiting for the next producer");
            }
            () = shutdown.wait() => {
                owner.state_mut().send_quit();
                owner.state_mut().end_session();
                break;
            }
        }
    }
    tracing::info!(socket = %listener.path().display(), "Renderer host stopped");
}
