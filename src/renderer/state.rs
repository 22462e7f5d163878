use std::sync::Arc;

use super::ViewSink;
use crate::owner::{self, TreeOwner};
use crate::protocol::{Envelope, NotifyPayload, PatchPayload, RenderPayload};
use crate::registry::{ActionEvent, ActionHandler, ActionRegistry, NodeTypeRegistry};
use crate::rpc::ServiceRegistry;
use crate::transport::EnvelopeSender;
use crate::tree::{ChangeSet, Node, TreeStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Sends UI events on interactive nodes back to the producer.
struct ForwardToProducer;

impl<V: 'static> ActionHandler<Renderer<V>> for ForwardToProducer {
    fn handle(&self, renderer: &mut Renderer<V>, event: &ActionEvent) {
        renderer.notify(event);
    }
}

/// State of the renderer's tree owner. Every method runs on the owner.
pub struct Renderer<V: 'static> {
    store: TreeStore,
    types: Arc<NodeTypeRegistry<V>>,
    services: Arc<ServiceRegistry>,
    actions: Arc<ActionRegistry<Renderer<V>>>,
    forwarder: Arc<dyn ActionHandler<Renderer<V>>>,
    sink: Box<dyn ViewSink<V>>,
    outbound: Option<EnvelopeSender>,
    last_revision: Option<u64>,
}

impl<V: 'static> Renderer<V> {
    /// Builds the renderer together with the tree owner that runs it.
    pub fn owned<K>(
        types: Arc<NodeTypeRegistry<V>>,
        services: Arc<ServiceRegistry>,
        sink: K,
    ) -> TreeOwner<Self>
    where
        K: ViewSink<V> + 'static,
    {
        let (handle, queue) = owner::channel();
        let renderer = Self {
            store: TreeStore::new(),
            types,
            services,
            actions: Arc::new(ActionRegistry::new(handle.clone())),
            forwarder: Arc::new(ForwardToProducer),
            sink: Box::new(sink),
            outbound: None,
            last_revision: None,
        };
        TreeOwner::new(renderer, handle, queue)
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    /// Registry the UI layer dispatches events through, from any thread.
    pub fn actions(&self) -> Arc<ActionRegistry<Renderer<V>>> {
        Arc::clone(&self.actions)
    }

    pub fn last_revision(&self) -> Option<u64> {
        self.last_revision
    }

    pub fn attach(&mut self, outbound: EnvelopeSender) {
        self.outbound = Some(outbound);
    }

    pub fn is_attached(&self) -> bool {
        self.outbound.is_some()
    }

    pub fn handle_envelope(&mut self, envelope: Envelope) -> Flow {
        match envelope {
            Envelope::Render(payload) => self.render(payload),
            Envelope::Patch(payload) => self.patch(payload),
            request @ (Envelope::ServiceRequest(_)
            | Envelope::Clipboard(_)
            | Envelope::FileDialog(_)) => self.serve(request),
            Envelope::Quit => {
                tracing::info!("Producer sent quit");
                return Flow::Quit;
            }
            other @ (Envelope::Notify(_) | Envelope::ServiceResponse(_)) => {
                tracing::warn!(kind = %other.kind(), "Ignoring producer-bound envelope");
            }
        }
        Flow::Continue
    }

    /// Drops the tree, views and handler registrations of the ended session.
    pub fn end_session(&mut self) {
        let dropped = self.store.clear().len();
        self.sink.clear();
        self.actions.clear();
        self.outbound = None;
        self.last_revision = None;
        tracing::info!(nodes = dropped, "Session state cleared");
    }

    /// Tells the producer to shut down, if one is attached.
    pub fn send_quit(&self) {
        if let Some(outbound) = &self.outbound {
            let _ = outbound.send(Envelope::Quit);
        }
    }

    fn notify(&self, event: &ActionEvent) {
        let Some(outbound) = &self.outbound else {
            tracing::debug!(node_id = %event.node_id, "No producer attached, dropping event");
            return;
        };
        let envelope = Envelope::Notify(NotifyPayload {
            node_id: event.node_id.clone(),
            action: event.action.clone(),
            params: event.params.clone(),
        });
        if outbound.send(envelope).is_err() {
            tracing::debug!(node_id = %event.node_id, "Transport closed, dropping event");
        }
    }

    fn render(&mut self, payload: RenderPayload) {
        if let Some(last) = self.last_revision {
            tracing::debug!(last, revision = payload.revision, "Full render resets the revision");
        }

        match self.store.set_root(payload.root) {
            Ok(changes) => {
                self.last_revision = Some(payload.revision);
                self.actions.clear();
                self.sync_handlers(&changes.inserted);
                self.sink.clear();
                self.mount_root();
                tracing::info!(revision = payload.revision, nodes = self.store.len(), "Rendered tree");
            }
            Err(err) => {
                tracing::warn!(revision = payload.revision, error = %err, "Rejected render, keeping previous tree");
            }
        }
    }

    fn patch(&mut self, payload: PatchPayload) {
        match self.last_revision {
            Some(last) if payload.revision != last + 1 => {
                tracing::warn!(
                    expected = last + 1,
                    revision = payload.revision,
                    "Patch revision out of sequence, applying anyway"
                );
            }
            None => {
                tracing::warn!(revision = payload.revision, "Patch before any render");
            }
            _ => {}
        }
        self.last_revision = Some(payload.revision);

        let (changes, errors) = self.store.apply_batch(&payload.patches);
        tracing::debug!(
            revision = payload.revision,
            patches = payload.patches.len(),
            skipped = errors.len(),
            "Applied patch batch"
        );
        self.commit(changes);
    }

    fn commit(&mut self, changes: ChangeSet) {
        let departed: Vec<&String> = changes
            .removed
            .iter()
            .filter(|id| !self.store.contains(id))
            .collect();
        // A re-inserted id may come back with another type.
        self.sync_handlers(
            changes
                .removed
                .iter()
                .chain(&changes.inserted)
                .chain(&changes.rebuilt),
        );

        if changes.root_replaced {
            self.sink.clear();
            self.mount_root();
            return;
        }

        for id in departed {
            self.sink.unmount(id);
        }

        let live: Vec<&String> = changes
            .rebuilt
            .iter()
            .filter(|id| self.store.contains(id))
            .collect();
        for id in &live {
            let covered = live
                .iter()
                .any(|other| other != id && self.store.is_within(id, other));
            if !covered {
                self.rebuild(id);
            }
        }
    }

    fn rebuild(&mut self, id: &str) {
        let Some(subtree) = self.store.subtree(id) else {
            return;
        };
        match self.types.build(&subtree) {
            Ok(view) => self.sink.replace(id, view),
            Err(err) => tracing::error!(node_id = %id, error = %err, "Failed to build view"),
        }
    }

    fn mount_root(&mut self) {
        let Some(root) = self.store.snapshot() else {
            return;
        };
        match self.types.build(&root) {
            Ok(view) => self.sink.mount_root(&root.id, view),
            Err(err) => tracing::error!(node_id = %root.id, error = %err, "Failed to build root view"),
        }
    }

    /// Registers the forwarder for each id that is live and interactive and
    /// drops the handler of every other id.
    fn sync_handlers<'a>(&self, ids: impl IntoIterator<Item = &'a String>) {
        for id in ids {
            let interactive = self.store.get(id).is_some_and(|entry| {
                let mut node = Node::new(id.as_str(), entry.node_type());
                node.props = entry.props().clone();
                node.modifiers = entry.modifiers().to_vec();
                self.types.is_interactive(&node)
            });
            if interactive {
                self.actions
                    .register_shared(id.as_str(), Arc::clone(&self.forwarder));
            } else {
                self.actions.unregister(id);
            }
        }
    }

    fn serve(&self, request: Envelope) {
        let Some(outbound) = &self.outbound else {
            tracing::debug!(kind = %request.kind(), "No producer attached, dropping request");
            return;
        };
        Arc::clone(&self.services).serve(request, outbound.clone());
    }
}
