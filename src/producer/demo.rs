//! Counter screen used by `viewsync demo`: renders once, bumps the counter
//! on a timer and on taps, calls `battery.get`, then quits.

use std::sync::Arc;
use std::time::Duration;

use super::{Commit, ProducerError, ProducerSession, ViewPublisher};
use crate::owner::{self, TreeOwner};
use crate::registry::{ActionEvent, ActionRegistry};
use crate::rpc::RpcError;
use crate::transport::Connection;
use crate::tree::{Modifier, ModifierKind, Node};
use crate::value::{Props, Value};

#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub ticks: u32,
    pub tick_interval: Duration,
    pub rpc_timeout: Duration,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            ticks: 5,
            tick_interval: Duration::from_millis(200),
            rpc_timeout: crate::rpc::DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug)]
pub struct DemoReport {
    pub count: i64,
    pub revision: u64,
    pub battery: Result<Value, RpcError>,
}

pub struct CounterApp {
    publisher: ViewPublisher,
    actions: Arc<ActionRegistry<CounterApp>>,
    count: i64,
}

impl CounterApp {
    pub fn new(publisher: ViewPublisher, actions: Arc<ActionRegistry<CounterApp>>) -> Self {
        Self {
            publisher,
            actions,
            count: 0,
        }
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn increment(&mut self) -> Result<Commit, ProducerError> {
        self.count += 1;
        self.show()
    }

    pub fn reset(&mut self) -> Result<Commit, ProducerError> {
        self.count = 0;
        self.show()
    }

    /// Publishes the current screen and wires handlers for its buttons.
    pub fn show(&mut self) -> Result<Commit, ProducerError> {
        let commit = self.publisher.update(counter_view(self.count))?;

        if !self.actions.contains("inc") {
            self.actions.register("inc", |app: &mut CounterApp, _: &ActionEvent| {
                let result = app.increment();
                app.log_failure(result);
            });
        }
        if self.count > 0 && !self.actions.contains("reset") {
            self.actions.register("reset", |app: &mut CounterApp, _: &ActionEvent| {
                let result = app.reset();
                app.log_failure(result);
            });
        }
        Ok(commit)
    }

    fn log_failure(&self, result: Result<Commit, ProducerError>) {
        if let Err(err) = result {
            tracing::warn!(count = self.count, error = %err, "Failed to publish counter");
        }
    }
}

pub fn counter_view(count: i64) -> Node {
    let mut root = Node::new("root", "Stack")
        .with_modifier(Modifier::new(ModifierKind::Padding).with_arg("all", 16))
        .with_child(
            Node::new("title", "Text")
                .with_prop("text", "viewsync counter")
                .with_modifier(Modifier::new(ModifierKind::Font).with_arg("weight", "bold")),
        )
        .with_child(Node::new("count", "Text").with_prop("text", format!("Count: {count}")))
        .with_child(Node::new("inc", "Button").with_prop("label", "+1"));
    if count > 0 {
        root = root.with_child(Node::new("reset", "Button").with_prop("label", "Reset"));
    }
    root
}

/// Runs the demo over an established connection.
pub async fn run(connection: Connection, options: DemoOptions) -> Result<DemoReport, ProducerError> {
    let (handle, queue) = owner::channel::<CounterApp>();
    let actions = Arc::new(ActionRegistry::new(handle.clone()));
    let (publisher, rpc, ended) =
        ProducerSession::start(connection, Arc::clone(&actions), options.rpc_timeout).into_parts();
    let mut owner = TreeOwner::new(CounterApp::new(publisher, actions), handle, queue);

    owner.state_mut().show()?;

    for tick in 0..options.ticks {
        if ended.is_shutting_down() {
            tracing::info!(tick, "Renderer went away, stopping early");
            break;
        }
        owner.state_mut().increment()?;
        // Taps arriving in between run here.
        owner
            .run_until(tokio::time::sleep(options.tick_interval))
            .await;
    }

    let battery = rpc.call("battery.get", Props::new()).await;
    match &battery {
        Ok(status) => tracing::info!(?status, "battery.get answered"),
        Err(err) => tracing::warn!(error = %err, "battery.get failed"),
    }

    owner.run_pending();
    let app = owner.state();
    if !ended.is_shutting_down() {
        app.publisher.quit()?;
    }

    Ok(DemoReport {
        count: app.count,
        revision: app.publisher.revision(),
        battery,
    })
}
