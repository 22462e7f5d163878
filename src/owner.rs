//! Single-writer execution context for tree state.
//!
//! Work that mutates the tree (patch application, event handlers) is posted
//! as a job through an [`OwnerHandle`] from any thread and executed one job
//! at a time by the task that holds the [`TreeOwner`].

use std::future::Future;

use thiserror::Error;
use tokio::sync::mpsc;

pub type OwnerJob<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

#[derive(Debug, Error)]
#[error("tree owner is gone")]
pub struct OwnerGone;

pub struct OwnerHandle<S> {
    tx: mpsc::UnboundedSender<OwnerJob<S>>,
}

impl<S> Clone for OwnerHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: 'static> OwnerHandle<S> {
    pub fn post<F>(&self, job: F) -> Result<(), OwnerGone>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.tx.send(Box::new(job)).map_err(|_| OwnerGone)
    }
}

pub struct OwnerQueue<S> {
    rx: mpsc::UnboundedReceiver<OwnerJob<S>>,
}

/// Creates the handle/queue pair before the state exists, so the state can
/// hold registries that post back to its own owner.
pub fn channel<S>() -> (OwnerHandle<S>, OwnerQueue<S>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (OwnerHandle { tx }, OwnerQueue { rx })
}

pub struct TreeOwner<S> {
    state: S,
    handle: OwnerHandle<S>,
    queue: OwnerQueue<S>,
}

impl<S: 'static> TreeOwner<S> {
    pub fn new(state: S, handle: OwnerHandle<S>, queue: OwnerQueue<S>) -> Self {
        Self {
            state,
            handle,
            queue,
        }
    }

    pub fn handle(&self) -> OwnerHandle<S> {
        self.handle.clone()
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn into_state(self) -> S {
        self.state
    }

    /// Runs every job queued so far without waiting for more.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.queue.rx.try_recv() {
            job(&mut self.state);
            ran += 1;
        }
        ran
    }

    /// Waits for the next job and runs it.
    pub async fn run_next(&mut self) {
        // The owner keeps a handle of its own, so the queue never closes.
        if let Some(job) = self.queue.rx.recv().await {
            job(&mut self.state);
        }
    }

    /// Runs jobs as they arrive until `stop` completes, then drains whatever
    /// is already queued.
    pub async fn run_until<F: Future>(&mut self, stop: F) -> F::Output {
        tokio::pin!(stop);
        let output = loop {
            tokio::select! {
                output = &mut stop => break output,
                () = self.run_next() => {}
            }
        };
        self.run_pending();
        output
    }
}
