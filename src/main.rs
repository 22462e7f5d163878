#![cfg_attr(not(unix), allow(dead_code, unused_imports))]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tokio::io::AsyncBufReadExt;

use viewsync::config::Config;
use viewsync::producer::demo::{self, DemoOptions};
use viewsync::registry::{
    ActionRegistry, HttpFetcher, ResourceKind, ResourceRegistry, ResourceSource,
};
use viewsync::renderer::{headless, Renderer};
use viewsync::shutdown::{install_signal_handlers, ShutdownHandle};
use viewsync::value::Props;

#[derive(Parser, Debug)]
#[command(name = "viewsync", version, about = "Remote view-tree synchronization")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a headless renderer that logs every view change.
    Host(HostArgs),
    /// Connect a counter-screen producer to a running host.
    Demo(DemoArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Socket path (overrides `transport.socket_path`).
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Config file (default: the platform config dir).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct HostArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Register a font as NAME=SOURCE (path or http(s) URL) and prefetch it.
    #[arg(long = "font", value_name = "NAME=SOURCE")]
    fonts: Vec<String>,
}

#[derive(Args, Debug)]
struct DemoArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Number of counter updates to publish.
    #[arg(long, default_value_t = 5)]
    ticks: u32,

    /// Delay between updates in milliseconds.
    #[arg(long, default_value_t = 200)]
    interval_ms: u64,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

fn socket_path(common: &CommonArgs, config: &Config) -> PathBuf {
    common
        .socket
        .clone()
        .unwrap_or_else(|| config.transport.socket_path())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    viewsync::logging::init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Host(args) => cmd_host(args).await,
        Command::Demo(args) => cmd_demo(args).await,
    }
}

#[cfg(unix)]
async fn cmd_host(args: HostArgs) -> anyhow::Result<()> {
    let config = load_config(args.common.config.as_deref())?;
    let socket = socket_path(&args.common, &config);

    let fonts = font_registry(&config, &args.fonts)?;
    for name in fonts.names() {
        let fonts = Arc::clone(&fonts);
        tokio::spawn(async move {
            match fonts.resolve(&name).await {
                Ok(bytes) => tracing::info!(font = %name, bytes = bytes.len(), "Font ready"),
                Err(err) => tracing::warn!(font = %name, error = %err, "Font unavailable"),
            }
        });
    }

    let listener = viewsync::transport::Listener::bind(&socket, config.transport.max_frame_bytes)
        .with_context(|| format!("failed to listen on {}", socket.display()))?;
    println!("{}", socket.display());

    let mut owner = Renderer::owned(
        Arc::new(headless::node_types()),
        Arc::new(headless::services()),
        headless::LogSink,
    );
    spawn_tap_reader(owner.state().actions());

    let shutdown = ShutdownHandle::new();
    install_signal_handlers(shutdown.clone());

    viewsync::renderer::serve(listener, &mut owner, shutdown).await;
    Ok(())
}

#[cfg(not(unix))]
async fn cmd_host(_args: HostArgs) -> anyhow::Result<()> {
    anyhow::bail!("the host needs Unix domain sockets")
}

fn font_registry(config: &Config, entries: &[String]) -> anyhow::Result<Arc<ResourceRegistry>> {
    let fetcher = HttpFetcher::new(config.resources.fetch_timeout())?;
    let mut fonts = ResourceRegistry::new(ResourceKind::Font, Arc::new(fetcher));
    if let Some(dir) = &config.resources.cache_dir {
        fonts = fonts.with_cache_dir(dir);
    }
    for entry in entries {
        let (name, source) = entry
            .split_once('=')
            .with_context(|| format!("font must be NAME=SOURCE, got '{entry}'"))?;
        fonts.register(name, ResourceSource::parse(source));
    }
    Ok(Arc::new(fonts))
}

/// Reads `tap <node-id> [action]` lines from stdin and dispatches them as
/// UI events, standing in for a real input system.
fn spawn_tap_reader<S: 'static>(actions: Arc<ActionRegistry<S>>) {
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut words = line.split_whitespace();
            match (words.next(), words.next()) {
                (Some("tap"), Some(node_id)) => {
                    let action = words.next().unwrap_or("tap");
                    let outcome = actions.dispatch(node_id, action, Props::new());
                    tracing::info!(node_id, action, ?outcome, "Dispatched input");
                }
                (None, _) => {}
                _ => tracing::warn!(line = %line, "Expected: tap <node-id> [action]"),
            }
        }
    });
}

#[cfg(unix)]
async fn cmd_demo(args: DemoArgs) -> anyhow::Result<()> {
    let config = load_config(args.common.config.as_deref())?;
    let socket = socket_path(&args.common, &config);

    let connection = viewsync::transport::connect(&socket, config.transport.max_frame_bytes)
        .await
        .with_context(|| format!("is `viewsync host` running on {}?", socket.display()))?;

    let options = DemoOptions {
        ticks: args.ticks,
        tick_interval: Duration::from_millis(args.interval_ms),
        rpc_timeout: config.rpc.timeout(),
    };
    let report = demo::run(connection, options).await?;
    tracing::info!(
        count = report.count,
        revision = report.revision,
        battery = ?report.battery,
        "Demo finished"
    );
    Ok(())
}

#[cfg(not(unix))]
async fn cmd_demo(_args: DemoArgs) -> anyhow::Result<()> {
    anyhow::bail!("the demo needs Unix domain sockets")
}
