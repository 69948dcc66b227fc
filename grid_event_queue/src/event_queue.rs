//! The event queue client.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    EventQueueClient                         │
//! │                                                             │
//! │  start() ──► poll task: wait ─► POST {ack} ─► decode ─┐     │
//! │                  ▲                                    │     │
//! │                  └──────────── dispatch ◄─────────────┘     │
//! │                                                             │
//! │  stop() ──► cancel ──► poll task exits, POST {ack, done}    │
//! │        └──► watchdog: checks `running` up to 10 intervals   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The client is a cheap handle over shared state; clones observe and
//! control the same queue.

mod poll_loop;

use core::{fmt, time::Duration};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering},
};

use grid_core::{Host, Settings, dispatch::Dispatch, template::TemplateRegistry};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    AGENT_DOMAIN_EVENT_QUEUE_CAP, REGION_EVENT_QUEUE_CAP, STOP_WATCHDOG_ATTEMPTS,
    capability::CapabilityPost, error::EventQueueError,
};

/// Stored in place of an event id before the server has assigned one.
pub(crate) const NO_EVENT_ID: i64 = -1;

/// Which server's queue a client polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventQueueRole {
    /// A simulator's per-region queue.
    Region,

    /// The agent domain's per-account queue.
    AgentDomain,
}

impl EventQueueRole {
    /// The capability name this role polls.
    #[must_use]
    pub const fn capability_name(self) -> &'static str {
        match self {
            Self::Region => REGION_EVENT_QUEUE_CAP,
            Self::AgentDomain => AGENT_DOMAIN_EVENT_QUEUE_CAP,
        }
    }

    /// The configured poll interval for this role.
    #[must_use]
    pub const fn poll_interval(self, settings: &Settings) -> Duration {
        match self {
            Self::Region => settings.region_poll_interval(),
            Self::AgentDomain => settings.agent_domain_poll_interval(),
        }
    }
}

impl fmt::Display for EventQueueRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Region => f.write_str("region"),
            Self::AgentDomain => f.write_str("agent domain"),
        }
    }
}

/// Lifecycle of an [`EventQueueClient`].
///
/// `Idle → Running → Stopping → Stopped`. There is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventQueueState {
    /// Built, not started.
    Idle = 0,

    /// Polling.
    Running = 1,

    /// Stop requested; the loop has not exited yet.
    Stopping = 2,

    /// The loop has exited and sent its final acknowledgement.
    Stopped = 3,
}

impl EventQueueState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

struct Shared<C, T, D> {
    role: EventQueueRole,
    capability: C,
    templates: T,
    dispatch: D,
    host: Option<Host>,
    settings: Settings,
    poll_interval: Duration,
    last_event_id: AtomicI64,
    /// Set by `start`, cleared only by the poll loop on exit.
    running: AtomicBool,
    state: AtomicU8,
    cancel: CancellationToken,
}

impl<C, T, D> Shared<C, T, D> {
    fn state(&self) -> EventQueueState {
        EventQueueState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: EventQueueState, to: EventQueueState) -> Result<(), EventQueueState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(EventQueueState::from_u8)
    }

    fn last_event_id(&self) -> Option<i64> {
        match self.last_event_id.load(Ordering::Acquire) {
            NO_EVENT_ID => None,
            id => Some(id),
        }
    }

    fn host_label(&self) -> String {
        self.settings.host_label(self.host.as_ref())
    }
}

/// Builder for an [`EventQueueClient`].
#[derive(Debug)]
pub struct EventQueueBuilder<C, T, D> {
    role: EventQueueRole,
    capability: C,
    templates: T,
    dispatch: D,
    host: Option<Host>,
    settings: Settings,
    poll_interval: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl<C, T, D> EventQueueBuilder<C, T, D>
where
    C: CapabilityPost + 'static,
    T: TemplateRegistry + 'static,
    D: Dispatch + 'static,
{
    /// Tag decoded messages with this simulator.
    #[must_use]
    pub const fn host(mut self, host: Host) -> Self {
        self.host = Some(host);
        self
    }

    /// Use these settings instead of the defaults.
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Override the role's configured poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Stop when `parent` is cancelled, in addition to on [`EventQueueClient::stop`].
    #[must_use]
    pub fn cancel_token(mut self, parent: &CancellationToken) -> Self {
        self.cancel = Some(parent.child_token());
        self
    }

    /// Build the client in the `Idle` state.
    #[must_use]
    pub fn build(self) -> EventQueueClient<C, T, D> {
        let poll_interval = self
            .poll_interval
            .unwrap_or_else(|| self.role.poll_interval(&self.settings));

        EventQueueClient {
            shared: Arc::new(Shared {
                role: self.role,
                capability: self.capability,
                templates: self.templates,
                dispatch: self.dispatch,
                host: self.host,
                settings: self.settings,
                poll_interval,
                last_event_id: AtomicI64::new(NO_EVENT_ID),
                running: AtomicBool::new(false),
                state: AtomicU8::new(EventQueueState::Idle as u8),
                cancel: self.cancel.unwrap_or_default(),
            }),
        }
    }
}

/// Long-poll client for one event-queue capability.
///
/// # Type Parameters
///
/// - `C`: The capability being polled
/// - `T`: The template registry deciding how events are decoded
/// - `D`: Where decoded messages are delivered
pub struct EventQueueClient<C, T, D> {
    shared: Arc<Shared<C, T, D>>,
}

impl<C, T, D> Clone for EventQueueClient<C, T, D> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<C: CapabilityPost, T, D> fmt::Debug for EventQueueClient<C, T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueueClient")
            .field("role", &self.shared.role)
            .field("capability", &self.shared.capability.name())
            .field("host", &self.shared.host)
            .field("state", &self.shared.state())
            .field("last_event_id", &self.shared.last_event_id())
            .finish_non_exhaustive()
    }
}

impl<C, T, D> EventQueueClient<C, T, D>
where
    C: CapabilityPost + 'static,
    T: TemplateRegistry + 'static,
    D: Dispatch + 'static,
{
    /// Start building a client for `role` bound to `capability`.
    ///
    /// The binding is fixed for the client's lifetime.
    pub fn builder(
        role: EventQueueRole,
        capability: C,
        templates: T,
        dispatch: D,
    ) -> EventQueueBuilder<C, T, D> {
        EventQueueBuilder {
            role,
            capability,
            templates,
            dispatch,
            host: None,
            settings: Settings::default(),
            poll_interval: None,
            cancel: None,
        }
    }

    /// Spawn the poll loop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`EventQueueError::RoleMismatch`] if the capability is not the one
    ///   this role polls. The loop is not started.
    /// - [`EventQueueError::AlreadyStarted`] if the client has left `Idle`.
    pub fn start(&self) -> Result<JoinHandle<()>, EventQueueError> {
        let shared = &self.shared;

        let expected = shared.role.capability_name();
        let found = shared.capability.name();
        if found != expected {
            warn!(
                role = %shared.role,
                expected,
                found,
                "refusing to start event queue on the wrong capability"
            );
            return Err(EventQueueError::RoleMismatch {
                role: shared.role,
                expected,
                found: found.to_owned(),
            });
        }

        shared
            .transition(EventQueueState::Idle, EventQueueState::Running)
            .map_err(EventQueueError::AlreadyStarted)?;
        shared.running.store(true, Ordering::Release);

        if shared.settings.log_task_spawns {
            info!(role = %shared.role, host = %shared.host_label(), "spawning event queue task");
        }

        Ok(tokio::spawn(poll_loop::run(shared.clone())))
    }

    /// Ask the poll loop to exit and watch for it to do so.
    ///
    /// The loop notices at its next iteration boundary; a request already in
    /// flight is allowed to finish. The returned [`StopMonitor`] resolves once
    /// the loop has exited or after [`STOP_WATCHDOG_ATTEMPTS`] poll intervals,
    /// whichever comes first. The loop is never forcibly cancelled.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`EventQueueError::NotRunning`] if the client was never started.
    pub fn stop(&self) -> Result<StopMonitor, EventQueueError> {
        let shared = &self.shared;

        match shared.transition(EventQueueState::Running, EventQueueState::Stopping) {
            Ok(()) | Err(EventQueueState::Stopping | EventQueueState::Stopped) => {}
            Err(EventQueueState::Idle | EventQueueState::Running) => {
                return Err(EventQueueError::NotRunning);
            }
        }

        info!(host = %shared.host_label(), "stopping event queue");
        shared.cancel.cancel();

        let watched = shared.clone();
        let handle = tokio::spawn(async move {
            let interval = watched.poll_interval;
            for _ in 0..STOP_WATCHDOG_ATTEMPTS {
                tokio::time::sleep(interval).await;
                if !watched.running.load(Ordering::Acquire) {
                    info!(host = %watched.host_label(), "stopped event queue processing");
                    return true;
                }
            }

            let waited = interval * STOP_WATCHDOG_ATTEMPTS;
            warn!(
                host = %watched.host_label(),
                ?waited,
                "failed to stop event queue"
            );
            false
        });

        Ok(StopMonitor { handle })
    }

    /// The role this client was built for.
    #[must_use]
    pub fn role(&self) -> EventQueueRole {
        self.shared.role
    }

    /// The bound capability.
    #[must_use]
    pub fn capability(&self) -> &C {
        &self.shared.capability
    }

    /// The simulator this queue belongs to, if any.
    #[must_use]
    pub fn host(&self) -> Option<Host> {
        self.shared.host
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EventQueueState {
        self.shared.state()
    }

    /// Whether the poll loop has started and not yet exited.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// The id that will be acknowledged on the next poll.
    #[must_use]
    pub fn last_event_id(&self) -> Option<i64> {
        self.shared.last_event_id()
    }

    /// The interval between polls.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.shared.poll_interval
    }
}

/// Resolves when a stopping [`EventQueueClient`] has exited, or gives up.
#[derive(Debug)]
pub struct StopMonitor {
    handle: JoinHandle<bool>,
}

impl StopMonitor {
    /// Wait for the watchdog.
    ///
    /// Returns `true` if the poll loop exited within the watchdog's bound.
    pub async fn wait(self) -> bool {
        match self.handle.await {
            Ok(stopped) => stopped,
            Err(e) => {
                warn!(error = %e, "event queue stop watchdog failed");
                false
            }
        }
    }
}
