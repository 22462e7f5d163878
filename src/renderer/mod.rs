//! Renderer process: owns the canonical tree, applies inbound patches on
//! the tree owner, and pushes rebuilt views into a [`ViewSink`].

pub mod headless;
mod host;
mod state;

#[cfg(unix)]
pub use host::serve;
pub use host::{run_session, SessionEnd};
pub use state::{Flow, Renderer};

/// Receives built views. This is where a concrete UI toolkit plugs in.
pub trait ViewSink<V>: Send {
    /// Replaces everything on screen with the view of a new root.
    fn mount_root(&mut self, root_id: &str, view: V);

    /// Swaps the view of one node (and its subtree) in place.
    fn replace(&mut self, node_id: &str, view: V);

    fn unmount(&mut self, node_id: &str);

    fn clear(&mut self);
}
