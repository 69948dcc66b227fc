//! The `poll` command.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use grid_core::{Dispatcher, Host, MemoryTemplates, Settings};
use grid_event_queue::{
    AGENT_DOMAIN_EVENT_QUEUE_CAP, Capability, EventQueueClient, EventQueueRole,
    http_client::ReqwestHttpClient,
};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Arguments for the poll command.
#[derive(Debug, clap::Args)]
pub(crate) struct PollArgs {
    /// Capability URL to poll
    #[arg(long)]
    cap_url: Url,

    /// Capability name; `event_queue` polls as an agent domain
    #[arg(long, default_value = "EventQueueGet")]
    cap_name: String,

    /// Simulator address to tag messages with, e.g. 10.0.0.5:13001
    #[arg(long)]
    host: Option<Host>,

    /// Seconds between polls (defaults to the role's configured interval)
    #[arg(long)]
    interval: Option<u64>,

    /// Settings file (JSON); missing fields take their defaults
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Disable request and response logging
    #[arg(short, long)]
    quiet: bool,

    /// Request timeout in seconds; should exceed the server's hold time
    #[arg(short, long, default_value = "90")]
    timeout: u64,
}

fn load_settings(args: &PollArgs) -> Result<Settings> {
    let settings = match &args.settings {
        Some(path) => {
            let raw = std::fs::read(path)
                .with_context(|| format!("reading settings from {}", path.display()))?;
            serde_json::from_slice(&raw)
                .with_context(|| format!("parsing settings from {}", path.display()))?
        }
        None if args.quiet => Settings::quiet(),
        None => Settings::default(),
    };

    Ok(if args.quiet {
        Settings {
            log_verbose: false,
            enable_eq_logging: false,
            log_task_spawns: false,
            ..settings
        }
    } else {
        settings
    })
}

/// Run the event queue until `token` is cancelled.
pub(crate) async fn run(args: PollArgs, token: CancellationToken) -> Result<()> {
    let settings = load_settings(&args)?;

    let role = if args.cap_name == AGENT_DOMAIN_EVENT_QUEUE_CAP {
        EventQueueRole::AgentDomain
    } else {
        EventQueueRole::Region
    };

    let http = ReqwestHttpClient::with_timeout(Duration::from_secs(args.timeout))?;
    let capability = Capability::new(args.cap_name, args.cap_url, http);

    let dispatcher = Dispatcher::new();
    let inbox = dispatcher.subscribe_all();

    let mut builder =
        EventQueueClient::builder(role, capability, MemoryTemplates::new(), dispatcher.clone())
            .settings(settings);
    if let Some(host) = args.host {
        builder = builder.host(host);
    }
    if let Some(secs) = args.interval {
        builder = builder.poll_interval(Duration::from_secs(secs));
    }
    let event_queue = builder.build();

    let printer = tokio::spawn(async move {
        while let Some(message) = inbox.recv().await {
            tracing::info!(
                msg = %message,
                id = ?message.event_queue_id(),
                "received event"
            );
            for block in message.blocks() {
                for var in block.variables() {
                    tracing::debug!(
                        block = block.name(),
                        var = var.name(),
                        value = %var.value(),
                        "field"
                    );
                }
            }
        }
    });

    let poll = event_queue.start()?;
    tracing::info!(role = %role, "event queue started, Ctrl+C to stop");

    token.cancelled().await;

    let stopped = event_queue.stop()?.wait().await;
    if stopped {
        poll.await?;
    } else {
        tracing::warn!("event queue did not stop in time, exiting anyway");
    }

    dispatcher.close();
    printer.await?;

    tracing::info!(
        last_event_id = ?event_queue.last_event_id(),
        dropped = dispatcher.dropped(),
        "event queue stopped"
    );
    Ok(())
}
