//! Remote view-tree synchronization between a producer process that builds
//! UI trees and a renderer process that displays them.
//!
//! The producer diffs successive trees ([`reconcile`]) and ships patches over
//! a framed socket ([`protocol`], [`transport`]); the renderer applies them to
//! its canonical tree ([`tree::TreeStore`]) on a single tree owner
//! ([`owner`]) and rebuilds only the affected views through a
//! [`registry::NodeTypeRegistry`]. Events flow back as `notify` envelopes
//! and service calls as correlated request/response pairs ([`rpc`]).

pub mod config;
pub mod logging;
pub mod owner;
pub mod producer;
pub mod protocol;
pub mod reconcile;
pub mod registry;
pub mod renderer;
pub mod rpc;
pub mod shutdown;
pub mod transport;
pub mod tree;
pub mod value;

pub use value::{Props, Value};
