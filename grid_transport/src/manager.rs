//! The per-simulator transport coordinator.
//!
//! ```text
//!                    ┌──────────────────── MessageManager ───────────────────┐
//!  enqueue() ──────► │ OutgoingQueue ──► packet loop ──► PacketChannel (UDP) │
//!                    │                                                       │
//!                    │ EventQueueClient (HTTP long poll, optional)           │
//!                    └───────────────────────────────────────────────────────┘
//! ```
//!
//! Both loops deliver inbound messages to the dispatch registry on their own;
//! the coordinator only owns their lifecycle and the outgoing queue.

use core::{fmt, time::Duration};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use grid_core::{Host, Message, Settings, dispatch::Dispatch, template::TemplateRegistry};
use grid_event_queue::{
    CapabilityPost, EventQueueClient, EventQueueRole, REGION_EVENT_QUEUE_CAP, StopMonitor,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::TransportError,
    outgoing::{Outgoing, OutgoingQueue},
    packet_channel::PacketChannel,
};

/// Consecutive receive failures after which the packet loop gives up.
pub const MAX_CONSECUTIVE_RECEIVE_ERRORS: u32 = 5;

/// Pause after a receive failure, multiplied by the failure count.
pub const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(500);

struct Shared<P> {
    channel: P,
    host: Host,
    outgoing: OutgoingQueue,
    running: AtomicBool,
    cancel: CancellationToken,
    settings: Settings,
}

impl<P: PacketChannel> Shared<P> {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.cancel.is_cancelled()
    }

    fn host_label(&self) -> String {
        self.settings.host_label(Some(&self.host))
    }

    fn send(&self, message: &Message, endpoint: Host, reliable: bool) -> Result<(), P::Error> {
        if reliable {
            self.channel.send_reliable(message, endpoint, 0)
        } else {
            self.channel.send_message(message, endpoint)
        }
    }

    fn flush_outgoing(&self) -> Result<usize, P::Error> {
        let mut sent = 0;
        while let Some(Outgoing {
            message,
            endpoint,
            reliable,
        }) = self.outgoing.pop()
        {
            self.send(&message, endpoint, reliable)?;
            sent += 1;
        }
        Ok(sent)
    }

    fn drain_outgoing(&self) {
        while !self.outgoing.is_empty() {
            match self.flush_outgoing() {
                Ok(0) => {}
                Ok(sent) => {
                    if self.settings.log_verbose {
                        debug!(host = %self.host_label(), count = sent, "flushed outgoing queue");
                    }
                }
                Err(e) => warn!(host = %self.host_label(), error = %e, "dropping unsendable message"),
            }
        }
    }
}

/// Handles for the tasks spawned by [`MessageManager::start_monitors`].
#[derive(Debug)]
pub struct Monitors<E> {
    /// The packet loop. Resolves to [`TransportError::Packet`] if the
    /// channel kept failing to receive.
    pub packet: JoinHandle<Result<(), TransportError<E>>>,

    /// The event queue poll loop, if the connection has one.
    pub event_queue: Option<JoinHandle<()>>,
}

/// Owns the UDP circuit, the optional event queue, and the outgoing queue of
/// one simulator connection.
pub struct MessageManager<P, C, T, D> {
    shared: Arc<Shared<P>>,
    event_queue: Option<EventQueueClient<C, T, D>>,
}

impl<P, C, T, D> MessageManager<P, C, T, D>
where
    P: PacketChannel,
    C: CapabilityPost + 'static,
    T: TemplateRegistry + 'static,
    D: Dispatch + 'static,
{
    /// Create a coordinator for the simulator at `host`.
    ///
    /// An event queue is created when `capabilities` contains
    /// [`REGION_EVENT_QUEUE_CAP`] and
    /// [`Settings::enable_region_event_queue`] is set. `templates` and
    /// `dispatch` are handed to it; UDP routing is `channel`'s own concern.
    pub fn new<I>(
        channel: P,
        host: Host,
        capabilities: I,
        templates: T,
        dispatch: D,
        settings: Settings,
    ) -> Self
    where
        I: IntoIterator<Item = C>,
    {
        let cancel = CancellationToken::new();

        let event_queue = if settings.enable_region_event_queue {
            capabilities
                .into_iter()
                .find(|cap| cap.name() == REGION_EVENT_QUEUE_CAP)
                .map(|cap| {
                    EventQueueClient::builder(EventQueueRole::Region, cap, templates, dispatch)
                        .host(host)
                        .settings(settings.clone())
                        .cancel_token(&cancel)
                        .build()
                })
        } else {
            None
        };

        debug!(
            host = %settings.host_label(Some(&host)),
            event_queue = event_queue.is_some(),
            "initialized message manager"
        );

        Self {
            shared: Arc::new(Shared {
                channel,
                host,
                outgoing: OutgoingQueue::new(),
                running: AtomicBool::new(false),
                cancel,
                settings,
            }),
            event_queue,
        }
    }

    /// Queue `message` for the packet loop.
    ///
    /// `send_now` puts it ahead of everything already queued.
    pub fn enqueue(&self, message: Message, endpoint: Host, reliable: bool, send_now: bool) {
        let entry = Outgoing {
            message,
            endpoint,
            reliable,
        };
        if send_now {
            self.shared.outgoing.push_front(entry);
        } else {
            self.shared.outgoing.push_back(entry);
        }
    }

    /// Spawn the packet loop and, if present, start the event queue.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`TransportError::AlreadyRunning`] if the monitors are running.
    /// - [`TransportError::EventQueue`] if the event queue refuses to start;
    ///   nothing is spawned.
    pub fn start_monitors(&self) -> Result<Monitors<P::Error>, TransportError<P::Error>> {
        let shared = &self.shared;

        if shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TransportError::AlreadyRunning);
        }

        let event_queue = match self.event_queue.as_ref().map(EventQueueClient::start) {
            Some(Ok(handle)) => Some(handle),
            Some(Err(e)) => {
                shared.running.store(false, Ordering::Release);
                return Err(e.into());
            }
            None => None,
        };

        if shared.settings.log_task_spawns {
            info!(host = %shared.host_label(), "spawning packet loop");
        }
        let packet = tokio::spawn(packet_loop(shared.clone()));

        Ok(Monitors {
            packet,
            event_queue,
        })
    }

    /// Stop both loops.
    ///
    /// The packet loop exits at its next iteration boundary; a pending
    /// receive is not interrupted. Returns the event queue's stop monitor if
    /// it was running.
    pub fn stop_monitors(&self) -> Option<StopMonitor> {
        self.shared.running.store(false, Ordering::Release);

        let monitor = self
            .event_queue
            .as_ref()
            .filter(|eq| eq.is_running())
            .and_then(|eq| match eq.stop() {
                Ok(monitor) => Some(monitor),
                Err(e) => {
                    warn!(host = %self.shared.host_label(), error = %e, "could not stop event queue");
                    None
                }
            });

        self.shared.cancel.cancel();
        info!(host = %self.shared.host_label(), "stopping message manager");
        monitor
    }

    /// Send `message` to this connection's simulator immediately, bypassing
    /// the queue.
    ///
    /// # Errors
    ///
    /// Returns the packet channel's error.
    pub fn send_packet(&self, message: &Message, reliable: bool) -> Result<(), P::Error> {
        self.shared.send(message, self.shared.host, reliable)
    }

    /// Send queued messages head-first until the queue is empty or a send
    /// fails. Returns how many were sent.
    ///
    /// # Errors
    ///
    /// Returns the first send failure. The failed entry is dropped; the rest
    /// stay queued.
    pub fn flush_outgoing(&self) -> Result<usize, P::Error> {
        self.shared.flush_outgoing()
    }

    /// Number of queued outgoing messages.
    #[must_use]
    pub fn outgoing_len(&self) -> usize {
        self.shared.outgoing.len()
    }

    /// Whether the packet loop should keep running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// The simulator this coordinator talks to.
    #[must_use]
    pub fn host(&self) -> Host {
        self.shared.host
    }

    /// The event queue, if the connection has one.
    #[must_use]
    pub const fn event_queue(&self) -> Option<&EventQueueClient<C, T, D>> {
        self.event_queue.as_ref()
    }

    /// The packet channel.
    #[must_use]
    pub fn packet_channel(&self) -> &P {
        &self.shared.channel
    }

    /// Cancelling this token stops both loops, like [`stop_monitors`](Self::stop_monitors)
    /// without the event queue watchdog.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.shared.cancel
    }
}

impl<P, C: CapabilityPost, T, D> fmt::Debug for MessageManager<P, C, T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageManager")
            .field("host", &self.shared.host)
            .field("running", &self.shared.running.load(Ordering::Acquire))
            .field("outgoing", &self.shared.outgoing.len())
            .field("event_queue", &self.event_queue)
            .finish_non_exhaustive()
    }
}

async fn packet_loop<P: PacketChannel>(
    shared: Arc<Shared<P>>,
) -> Result<(), TransportError<P::Error>> {
    let host = shared.host_label();
    info!(host = %host, "starting packet loop");

    let mut consecutive_errors = 0;
    while shared.is_running() {
        tokio::task::yield_now().await;

        match shared.channel.receive().await {
            Ok(datagram) => {
                consecutive_errors = 0;
                let sender = datagram.sender;
                if let Err(e) = shared.channel.receive_check(datagram) {
                    warn!(host = %host, %sender, error = %e, "rejected inbound packet");
                }
            }
            Err(e) => {
                consecutive_errors += 1;
                warn!(host = %host, error = %e, consecutive_errors, "packet receive failed");

                if consecutive_errors >= MAX_CONSECUTIVE_RECEIVE_ERRORS {
                    error!(host = %host, "too many consecutive receive failures, stopping packet loop");
                    shared.running.store(false, Ordering::Release);
                    return Err(TransportError::Packet(e));
                }

                tokio::select! {
                    biased;
                    () = shared.cancel.cancelled() => break,
                    () = tokio::time::sleep(RECEIVE_ERROR_BACKOFF * consecutive_errors) => {}
                }
            }
        }

        if shared.channel.has_unacked() {
            if let Err(e) = shared.channel.process_acks() {
                warn!(host = %host, error = %e, "processing acks failed");
            }
        }

        shared.drain_outgoing();
    }

    info!(host = %host, "stopped packet loop");
    Ok(())
}
