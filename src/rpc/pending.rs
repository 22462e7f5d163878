use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::protocol::ServiceResponse;

/// Completion slots for requests awaiting a `serviceResponse`, keyed by
/// request id.
#[derive(Default)]
pub struct PendingRequests {
    slots: Mutex<HashMap<String, oneshot::Sender<ServiceResponse>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, request_id: &str) -> oneshot::Receiver<ServiceResponse> {
        let (tx, rx) = oneshot::channel();
        self.slots.lock().insert(request_id.to_string(), tx);
        rx
    }

    /// Hands `response` to its waiter. False when nobody waits for that id
    /// any more (timed out, cancelled, or never issued).
    pub fn complete(&self, response: ServiceResponse) -> bool {
        let Some(slot) = self.slots.lock().remove(&response.request_id) else {
            return false;
        };
        slot.send(response).is_ok()
    }

    pub fn cancel(&self, request_id: &str) -> bool {
        self.slots.lock().remove(request_id).is_some()
    }

    /// Drops every slot; their waiters observe a closed channel.
    pub fn fail_all(&self) -> usize {
        let drained: Vec<_> = self.slots.lock().drain().collect();
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[tokio::test]
    async fn complete_delivers_and_frees_slot() {
        let pending = PendingRequests::new();
        let rx = pending.insert("r1");
        assert!(pending.complete(ServiceResponse::ok("r1", Value::Int(3))));
        assert_eq!(rx.await.expect("response").result, Some(Value::Int(3)));
        assert!(pending.is_empty());
    }

    #[test]
    fn unknown_id_is_not_completed() {
        let pending = PendingRequests::new();
        assert!(!pending.complete(ServiceResponse::ok("nobody", Value::Null)));
    }

    #[tokio::test]
    async fn fail_all_closes_waiters() {
        let pending = PendingRequests::new();
        let a = pending.insert("a");
        let b = pending.insert("b");
        assert_eq!(pending.fail_all(), 2);
        assert!(a.await.is_err());
        assert!(b.await.is_err());
        assert!(pending.is_empty());
    }
}
