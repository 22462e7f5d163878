mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{RecordingSink, SinkEvent};
use viewsync::owner::{self, TreeOwner};
use viewsync::producer::demo::{self, CounterApp, DemoOptions};
use viewsync::producer::{ProducerSession, ViewPublisher};
use viewsync::protocol::codec::DEFAULT_MAX_FRAME_BYTES;
use viewsync::protocol::{Envelope, RenderPayload};
use viewsync::registry::{ActionRegistry, DispatchOutcome};
use viewsync::renderer::{headless, run_session, Renderer, SessionEnd};
use viewsync::transport::Connection;
use viewsync::tree::Node;
use viewsync::value::{Props, Value};

fn renderer(sink: RecordingSink) -> TreeOwner<Renderer<String>> {
    Renderer::owned(
        Arc::new(headless::node_types()),
        Arc::new(headless::services()),
        sink,
    )
}

fn options(ticks: u32) -> DemoOptions {
    DemoOptions {
        ticks,
        tick_interval: Duration::from_millis(5),
        rpc_timeout: Duration::from_secs(2),
    }
}

fn shows_count(sink: &RecordingSink, count: i64) -> bool {
    let needle = format!("Count: {count}");
    sink.saw(|event| match event {
        SinkEvent::Mount(_, view) | SinkEvent::Replace(_, view) => view.contains(&needle),
        _ => false,
    })
}

#[tokio::test]
async fn test_demo_session_runs_to_quit() {
    let sink = RecordingSink::default();
    let mut owner = renderer(sink.clone());
    let (producer, renderer_end) = Connection::pair(DEFAULT_MAX_FRAME_BYTES);

    let (end, report) = tokio::join!(
        run_session(&mut owner, renderer_end),
        demo::run(producer, options(3))
    );

    assert_eq!(end, SessionEnd::Quit);
    let report = report.expect("demo runs");
    assert_eq!(report.count, 3);
    // One full render plus one patch batch per tick.
    assert_eq!(report.revision, 4);

    let battery = report.battery.expect("battery.get answered");
    let Value::Map(status) = battery else {
        panic!("expected a map, got {battery:?}");
    };
    assert_eq!(status.get("state"), Some(&Value::from("unknown")));

    assert!(matches!(sink.events().first(), Some(SinkEvent::Clear)));
    assert!(sink.saw(|event| matches!(event, SinkEvent::Mount(id, _) if id == "root")));
    assert!(shows_count(&sink, 3));
    assert_eq!(sink.events().last(), Some(&SinkEvent::Clear));
}

#[tokio::test]
async fn test_tap_round_trips_to_producer_handler() {
    let sink = RecordingSink::default();
    let mut owner = renderer(sink.clone());
    let renderer_actions = owner.state().actions();
    let (producer, renderer_end) = Connection::pair(DEFAULT_MAX_FRAME_BYTES);
    let quit = producer.sender();

    let app = async {
        let (handle, queue) = owner::channel::<CounterApp>();
        let actions = Arc::new(ActionRegistry::new(handle.clone()));
        let session = ProducerSession::start(producer, Arc::clone(&actions), Duration::from_secs(2));
        let (publisher, _rpc, _ended) = session.into_parts();
        let mut app = TreeOwner::new(CounterApp::new(publisher, actions), handle, queue);
        app.state_mut().show().expect("first render");

        let mut tapped = false;
        for _ in 0..400 {
            // The button only accepts taps once the renderer has mounted it.
            if !tapped {
                tapped = renderer_actions.dispatch("inc", "tap", Props::new())
                    == DispatchOutcome::Queued;
            }
            app.run_until(tokio::time::sleep(Duration::from_millis(5)))
                .await;
            if app.state().count() == 1 {
                break;
            }
        }
        let count = app.state().count();
        quit.send(Envelope::Quit).expect("quit");
        count
    };

    let (end, count) = tokio::join!(run_session(&mut owner, renderer_end), app);

    assert_eq!(end, SessionEnd::Quit);
    assert_eq!(count, 1);
    assert!(shows_count(&sink, 1));
    assert!(sink.saw(|event| matches!(event, SinkEvent::Replace(_, view) if view.contains("Button#reset"))));
}

#[tokio::test]
async fn test_reconnecting_producer_starts_from_scratch() {
    let sink = RecordingSink::default();
    let mut owner = renderer(sink.clone());

    for ticks in [1_u32, 2] {
        let (producer, renderer_end) = Connection::pair(DEFAULT_MAX_FRAME_BYTES);
        let (end, report) = tokio::join!(
            run_session(&mut owner, renderer_end),
            demo::run(producer, options(ticks))
        );

        assert_eq!(end, SessionEnd::Quit);
        let report = report.expect("demo runs");
        assert_eq!(report.count, i64::from(ticks));
        assert_eq!(report.revision, u64::from(ticks) + 1);

        let renderer = owner.state();
        assert!(renderer.store().is_empty());
        assert_eq!(renderer.last_revision(), None);
        assert!(renderer.actions().is_empty());
        assert!(!renderer.is_attached());
    }

    let mounts = sink
        .events()
        .iter()
        .filter(|event| matches!(event, SinkEvent::Mount(..)))
        .count();
    assert_eq!(mounts, 2);
    assert!(shows_count(&sink, 2));
}

#[tokio::test]
async fn test_producer_crash_is_a_disconnect() {
    let sink = RecordingSink::default();
    let mut owner = renderer(sink.clone());
    let (producer, renderer_end) = Connection::pair(DEFAULT_MAX_FRAME_BYTES);

    let crash = async {
        producer
            .sender()
            .send(Envelope::Render(RenderPayload {
                revision: 1,
                root: Node::new("root", "Stack").with_child(Node::new("b", "Button")),
            }))
            .expect("render");
        // Let the writer flush before the whole connection goes away.
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(producer);
    };

    let (end, ()) = tokio::join!(run_session(&mut owner, renderer_end), crash);

    assert_eq!(end, SessionEnd::Disconnected);
    assert!(sink.saw(|event| matches!(event, SinkEvent::Mount(id, _) if id == "root")));
    assert!(owner.state().store().is_empty());
    assert!(owner.state().actions().is_empty());
}

fn screen(text: &str) -> Node {
    Node::new("root", "Stack").with_child(Node::new("t", "Text").with_prop("text", text))
}

#[tokio::test]
async fn test_oversized_revision_never_leaves_a_gap() {
    let (producer, mut renderer_end) = Connection::pair(512);
    let mut publisher = ViewPublisher::new(producer.sender());

    publisher.render(screen("0")).expect("render");
    assert!(publisher.update(screen(&"x".repeat(2048))).is_err());
    assert_eq!(publisher.update(screen("1")).expect("update").revision, Some(2));

    let mut revisions = Vec::new();
    while revisions.len() < 2 {
        match renderer_end.recv().await {
            Some(Envelope::Render(payload)) => revisions.push(payload.revision),
            Some(Envelope::Patch(payload)) => revisions.push(payload.revision),
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(revisions, vec![1, 2]);
}
