use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::owner::OwnerHandle;
use crate::value::Props;

#[derive(Debug, Clone, PartialEq)]
pub struct ActionEvent {
    pub node_id: String,
    pub action: String,
    pub params: Props,
}

/// Receives events for one node. Runs on the tree owner with mutable access
/// to its state.
pub trait ActionHandler<S>: Send + Sync {
    fn handle(&self, state: &mut S, event: &ActionEvent);
}

impl<S, F> ActionHandler<S> for F
where
    F: Fn(&mut S, &ActionEvent) + Send + Sync,
{
    fn handle(&self, state: &mut S, event: &ActionEvent) {
        self(state, event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Queued for the tree owner.
    Queued,
    /// No handler for the node id; nothing happened.
    Unregistered,
    /// The tree owner has shut down.
    OwnerGone,
}

type HandlerMap<S> = HashMap<String, Arc<dyn ActionHandler<S>>>;

/// Node id to live handler. Registration happens on the tree owner while
/// dispatch arrives from I/O tasks, so the map sits behind a mutex that is
/// never held while a handler runs.
pub struct ActionRegistry<S> {
    handlers: Arc<Mutex<HandlerMap<S>>>,
    owner: OwnerHandle<S>,
}

impl<S: 'static> ActionRegistry<S> {
    pub fn new(owner: OwnerHandle<S>) -> Self {
        Self {
            handlers: Arc::new(Mutex::new(HashMap::new())),
            owner,
        }
    }

    /// Registers `handler` for `node_id`, replacing any previous one.
    /// Returns true when a handler was replaced.
    pub fn register<H>(&self, node_id: impl Into<String>, handler: H) -> bool
    where
        H: ActionHandler<S> + 'static,
    {
        self.register_shared(node_id, Arc::new(handler))
    }

    pub fn register_shared(
        &self,
        node_id: impl Into<String>,
        handler: Arc<dyn ActionHandler<S>>,
    ) -> bool {
        self.handlers.lock().insert(node_id.into(), handler).is_some()
    }

    pub fn unregister(&self, node_id: &str) -> bool {
        self.handlers.lock().remove(node_id).is_some()
    }

    pub fn unregister_all<I>(&self, node_ids: I) -> usize
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut handlers = self.handlers.lock();
        node_ids
            .into_iter()
            .filter(|id| handlers.remove(id.as_ref()).is_some())
            .count()
    }

    pub fn clear(&self) {
        self.handlers.lock().clear();
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.handlers.lock().contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hands the event to the tree owner. Callable from any thread.
    ///
    /// The handler is looked up again when the job runs: a node removed in
    /// between (its handler unregistered or replaced) gets nothing.
    pub fn dispatch(
        &self,
        node_id: impl Into<String>,
        action: impl Into<String>,
        params: Props,
    ) -> DispatchOutcome {
        let event = ActionEvent {
            node_id: node_id.into(),
            action: action.into(),
            params,
        };

        let Some(handler) = self.handlers.lock().get(&event.node_id).cloned() else {
            tracing::debug!(node_id = %event.node_id, action = %event.action, "Dispatch to unregistered node ignored");
            return DispatchOutcome::Unregistered;
        };

        let handlers = Arc::clone(&self.handlers);
        let posted = self.owner.post(move |state| {
            let current = handlers.lock().get(&event.node_id).cloned();
            match current {
                Some(current) if Arc::ptr_eq(&current, &handler) => handler.handle(state, &event),
                _ => {
                    tracing::debug!(node_id = %event.node_id, action = %event.action, "Handler unregistered before dispatch ran");
                }
            }
        });

        match posted {
            Ok(()) => DispatchOutcome::Queued,
            Err(_) => {
                tracing::warn!("Dispatch after tree owner shut down");
                DispatchOutcome::OwnerGone
            }
        }
    }
}
