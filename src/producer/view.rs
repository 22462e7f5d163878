use crate::protocol::{encode_payload, EncodeError, Envelope, PatchPayload, RenderPayload};
use crate::reconcile::{departed_ids, diff};
use crate::transport::EnvelopeSender;
use crate::tree::Node;

use super::ProducerError;

type DepartedHook = Box<dyn Fn(&[String]) + Send + Sync>;

/// Result of publishing one tree revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// `None` when nothing changed and nothing was sent.
    pub revision: Option<u64>,
    pub patches: usize,
    /// Ids that left the tree with this commit.
    pub departed: Vec<String>,
}

/// Producer-side owner of the published tree.
///
/// Keeps a shadow copy of what the renderer holds and turns every new tree
/// into the smallest patch batch it can, tagged with a rising revision.
pub struct ViewPublisher {
    sender: EnvelopeSender,
    shadow: Option<Node>,
    revision: u64,
    on_departed: Option<DepartedHook>,
}

impl ViewPublisher {
    pub fn new(sender: EnvelopeSender) -> Self {
        Self {
            sender,
            shadow: None,
            revision: 0,
            on_departed: None,
        }
    }

    /// Called with the ids removed by each commit, so handlers registered
    /// for them can be dropped.
    pub fn on_departed<F>(mut self, hook: F) -> Self
    where
        F: Fn(&[String]) + Send + Sync + 'static,
    {
        self.on_departed = Some(Box::new(hook));
        self
    }

    pub fn current(&self) -> Option<&Node> {
        self.shadow.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Sends `root` in full, replacing whatever the renderer shows.
    pub fn render(&mut self, root: Node) -> Result<Commit, ProducerError> {
        root.validate()?;
        let revision = self.revision + 1;
        let departed = self
            .shadow
            .as_ref()
            .map(|old| departed_ids(old, &root))
            .unwrap_or_default();

        self.send(Envelope::Render(RenderPayload {
            revision,
            root: root.clone(),
        }))?;
        tracing::debug!(revision, nodes = root.subtree_len(), "Published full render");

        Ok(self.finish(root, revision, 0, departed))
    }

    /// Publishes `root` as a diff against the previous revision. The first
    /// call falls back to a full render.
    pub fn update(&mut self, root: Node) -> Result<Commit, ProducerError> {
        let Some(old) = self.shadow.as_ref() else {
            return self.render(root);
        };
        root.validate()?;

        let patches = diff(Some(old), &root);
        if patches.is_empty() {
            return Ok(Commit {
                revision: None,
                patches: 0,
                departed: Vec::new(),
            });
        }
        let departed = departed_ids(old, &root);
        let revision = self.revision + 1;
        let count = patches.len();

        self.send(Envelope::Patch(PatchPayload { revision, patches }))?;
        tracing::debug!(revision, patches = count, departed = departed.len(), "Published patch batch");

        Ok(self.finish(root, revision, count, departed))
    }

    /// Asks the renderer to end the session.
    pub fn quit(&self) -> Result<(), ProducerError> {
        self.sender.send(Envelope::Quit)?;
        Ok(())
    }

    /// Queues `envelope` only if it fits in one frame. The writer would drop
    /// an oversized one after the shadow had already moved on.
    fn send(&self, envelope: Envelope) -> Result<(), ProducerError> {
        let len = encode_payload(&envelope)?.len();
        let max = self.sender.max_frame_bytes();
        if len > max {
            tracing::warn!(kind = %envelope.kind(), len, max, "Revision exceeds the frame limit, not sent");
            return Err(EncodeError::FrameTooLarge { len, max }.into());
        }
        self.sender.send(envelope)?;
        Ok(())
    }

    fn finish(&mut self, root: Node, revision: u64, patches: usize, departed: Vec<String>) -> Commit {
        self.revision = revision;
        self.shadow = Some(root);
        if let Some(hook) = &self.on_departed {
            if !departed.is_empty() {
                hook(&departed);
            }
        }
        Commit {
            revision: Some(revision),
            patches,
            departed,
        }
    }
}
