use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::ViewPublisher;
use crate::protocol::Envelope;
use crate::registry::ActionRegistry;
use crate::rpc::RpcClient;
use crate::shutdown::ShutdownHandle;
use crate::transport::Connection;

/// A live producer session: publisher and RPC client sharing one
/// connection, plus an inbound pump routing renderer messages.
///
/// The pump dispatches `notify` envelopes through the given action
/// registry (whose jobs run on the application's tree owner) and resolves
/// `serviceResponse` envelopes against the RPC pending table.
pub struct ProducerSession {
    pub publisher: ViewPublisher,
    pub rpc: RpcClient,
    ended: ShutdownHandle,
}

impl ProducerSession {
    pub fn start<S: 'static>(
        connection: Connection,
        actions: Arc<ActionRegistry<S>>,
        rpc_timeout: Duration,
    ) -> Self {
        let (sender, inbound) = connection.into_parts();
        let rpc = RpcClient::new(sender.clone(), rpc_timeout);
        let ended = rpc.closed();

        let publisher = ViewPublisher::new(sender).on_departed({
            let actions = Arc::clone(&actions);
            move |ids| {
                let dropped = actions.unregister_all(ids);
                if dropped > 0 {
                    tracing::debug!(dropped, "Unregistered handlers of departed nodes");
                }
            }
        });

        tokio::spawn(pump(inbound, actions, rpc.clone()));
        Self {
            publisher,
            rpc,
            ended,
        }
    }

    /// Connects to a renderer at `path` and starts the session.
    #[cfg(unix)]
    pub async fn connect<S: 'static>(
        path: &std::path::Path,
        max_frame_bytes: usize,
        actions: Arc<ActionRegistry<S>>,
        rpc_timeout: Duration,
    ) -> Result<Self, crate::transport::TransportError> {
        let connection = crate::transport::connect(path, max_frame_bytes).await?;
        Ok(Self::start(connection, actions, rpc_timeout))
    }

    /// Signaled once the renderer quits or the transport closes.
    pub fn ended(&self) -> ShutdownHandle {
        self.ended.clone()
    }

    pub fn is_ended(&self) -> bool {
        self.ended.is_shutting_down()
    }

    /// Splits the session so the publisher can move into application state.
    pub fn into_parts(self) -> (ViewPublisher, RpcClient, ShutdownHandle) {
        (self.publisher, self.rpc, self.ended)
    }
}

async fn pump<S: 'static>(
    mut inbound: mpsc::Receiver<Envelope>,
    actions: Arc<ActionRegistry<S>>,
    rpc: RpcClient,
) {
    while let Some(envelope) = inbound.recv().await {
        match envelope {
            Envelope::Notify(payload) => {
                actions.dispatch(payload.node_id, payload.action, payload.params);
            }
            Envelope::ServiceResponse(response) => {
                rpc.resolve(response);
            }
            Envelope::Quit => {
                tracing::info!("Renderer sent quit");
                break;
            }
            other => {
                tracing::warn!(kind = %other.kind(), "Ignoring renderer-bound envelope");
            }
        }
    }
    // Also signals the session's `ended` handle.
    rpc.disconnect();
    tracing::info!("Producer session ended");
}
