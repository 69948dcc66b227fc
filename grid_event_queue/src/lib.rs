//! # Grid Event Queue
//!
//! Client for the HTTP long-poll "event queue" that simulators and agent
//! domains use to push protocol events that have no UDP equivalent, or that
//! are too large for a datagram.
//!
//! # Protocol
//!
//! ```text
//! ┌──────────┐                              ┌──────────┐
//! │  Client  │                              │  Server  │
//! └────┬─────┘                              └────┬─────┘
//!      │  POST <EventQueueGet cap>                │
//!      │  {}                                      │
//!      │ ───────────────────────────────────────► │
//!      │           ... (blocks) ...               │
//!      │  {"id": 1, "events": [...]}              │
//!      │ ◄─────────────────────────────────────── │
//!      │                                          │
//!      │  POST {"ack": 1}                         │
//!      │ ───────────────────────────────────────► │
//!      │  {"id": 2, "events": [...]}              │
//!      │ ◄─────────────────────────────────────── │
//!      │                                          │
//!      │  POST {"ack": 2, "done": true}           │
//!      │ ───────────────────────────────────────► │
//! ```
//!
//! Each event is `{"message": <name>, "body": {...}}`. Events whose name has
//! a binary template carry their body keyed by block name with a list of
//! repetitions; all others are a flat map of fields. See [`decode`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]
#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]

pub mod capability;
pub mod decode;
pub mod error;
pub mod event_queue;
pub mod http_client;

pub use capability::{Capability, CapabilityPost};
pub use event_queue::{EventQueueBuilder, EventQueueClient, EventQueueRole, EventQueueState, StopMonitor};

/// Capability name polled for a simulator's event queue.
pub const REGION_EVENT_QUEUE_CAP: &str = "EventQueueGet";

/// Capability name polled for an agent domain's event queue.
pub const AGENT_DOMAIN_EVENT_QUEUE_CAP: &str = "event_queue";

/// How many poll intervals [`EventQueueClient::stop`] waits for the loop to exit.
pub const STOP_WATCHDOG_ATTEMPTS: u32 = 10;
