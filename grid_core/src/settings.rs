//! Read-only configuration consumed by the transport at construction.
//!
//! Every field has a default, so a partial JSON document deserializes into a
//! complete [`Settings`].

use core::time::Duration;

use serde::{Deserialize, Serialize};

/// Default interval between region event-queue polls (1 second).
pub const DEFAULT_REGION_POLL_INTERVAL_SECS: u64 = 1;

/// Default interval between agent-domain event-queue polls (15 seconds).
pub const DEFAULT_AGENT_DOMAIN_POLL_INTERVAL_SECS: u64 = 15;

/// What to do with the acknowledged id when a response omits `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingIdPolicy {
    /// Keep acknowledging the last id the server sent.
    #[default]
    Retain,

    /// Forget the acknowledged id; the server may redeliver events.
    Reset,
}

/// Transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between polls of a region's event queue.
    pub region_event_queue_poll_interval: u64,

    /// Seconds between polls of an agent domain's event queue.
    pub agent_domain_event_queue_poll_interval: u64,

    /// Whether a region event queue is started with the UDP circuit.
    pub enable_region_event_queue: bool,

    /// Whether decoded event-queue messages are dispatched at all.
    pub handle_event_queue_data: bool,

    /// General verbose logging.
    pub log_verbose: bool,

    /// Log every event-queue request and response body.
    pub enable_eq_logging: bool,

    /// Include the simulator host in transport log lines.
    pub enable_host_logging: bool,

    /// Log each spawned transport task.
    pub log_task_spawns: bool,

    /// Handling of a response that lacks an `id`.
    pub missing_id_policy: MissingIdPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            region_event_queue_poll_interval: DEFAULT_REGION_POLL_INTERVAL_SECS,
            agent_domain_event_queue_poll_interval: DEFAULT_AGENT_DOMAIN_POLL_INTERVAL_SECS,
            enable_region_event_queue: true,
            handle_event_queue_data: true,
            log_verbose: true,
            enable_eq_logging: true,
            enable_host_logging: true,
            log_task_spawns: true,
            missing_id_policy: MissingIdPolicy::Retain,
        }
    }
}

impl Settings {
    /// Defaults with the verbose logging toggles switched off.
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            log_verbose: false,
            enable_eq_logging: false,
            log_task_spawns: false,
            ..Self::default()
        }
    }

    /// Region poll interval as a [`Duration`].
    #[must_use]
    pub const fn region_poll_interval(&self) -> Duration {
        Duration::from_secs(self.region_event_queue_poll_interval)
    }

    /// Agent-domain poll interval as a [`Duration`].
    #[must_use]
    pub const fn agent_domain_poll_interval(&self) -> Duration {
        Duration::from_secs(self.agent_domain_event_queue_poll_interval)
    }

    /// Set the region poll interval in seconds.
    #[must_use]
    pub const fn with_region_poll_interval(mut self, secs: u64) -> Self {
        self.region_event_queue_poll_interval = secs;
        self
    }

    /// Set the agent-domain poll interval in seconds.
    #[must_use]
    pub const fn with_agent_domain_poll_interval(mut self, secs: u64) -> Self {
        self.agent_domain_event_queue_poll_interval = secs;
        self
    }

    /// Set the missing-id policy.
    #[must_use]
    pub const fn with_missing_id_policy(mut self, policy: MissingIdPolicy) -> Self {
        self.missing_id_policy = policy;
        self
    }

    /// Format `host` for a log line, honouring
    /// [`enable_host_logging`](Self::enable_host_logging).
    #[must_use]
    pub fn host_label<H: core::fmt::Display>(&self, host: Option<&H>) -> String {
        match host {
            Some(host) if self.enable_host_logging => host.to_string(),
            _ => String::new(),
        }
    }
}
