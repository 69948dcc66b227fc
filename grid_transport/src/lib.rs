//! # Grid Transport
//!
//! Ties together the two paths by which a client talks to one simulator:
//! a UDP circuit ([`PacketChannel`]) and, optionally, the HTTP event queue
//! ([`grid_event_queue::EventQueueClient`]). [`MessageManager`] starts and
//! stops both as a unit and owns the queue of outgoing messages.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]
#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]

pub mod error;
pub mod manager;
pub mod outgoing;
pub mod packet_channel;

pub use error::TransportError;
pub use manager::{
    MAX_CONSECUTIVE_RECEIVE_ERRORS, MessageManager, Monitors, RECEIVE_ERROR_BACKOFF,
};
pub use outgoing::{Outgoing, OutgoingQueue};
pub use packet_channel::{Datagram, PacketChannel};
