//! The UDP side of a connection.
//!
//! Packet encoding, sequencing, acknowledgement and resend all live behind
//! [`PacketChannel`]; the coordinator only drives it. Routing of inbound
//! packets to the dispatch registry is also the channel's job.

use std::net::SocketAddr;

use futures::future::BoxFuture;
use grid_core::{Host, Message};

/// One received datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Where it came from.
    pub sender: SocketAddr,

    /// Raw payload.
    pub bytes: Vec<u8>,
}

/// A UDP circuit driven by the coordinator's packet loop.
///
/// Methods take `&self`; implementations share their socket and ack state
/// between the packet loop and direct [`send_packet`] callers.
///
/// [`send_packet`]: crate::manager::MessageManager::send_packet
pub trait PacketChannel: Send + Sync + 'static {
    /// A validated, sequenced inbound packet.
    type Packet: Send;

    /// Any failure of the channel.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Wait for the next datagram.
    fn receive(&self) -> BoxFuture<'_, Result<Datagram, Self::Error>>;

    /// Validate and sequence a datagram, routing it onward.
    ///
    /// `Ok(None)` means the datagram was consumed without yielding a packet,
    /// e.g. a duplicate or a bare acknowledgement.
    fn receive_check(&self, datagram: Datagram) -> Result<Option<Self::Packet>, Self::Error>;

    /// Whether reliable sends are waiting for acknowledgement.
    fn has_unacked(&self) -> bool;

    /// Resend or retire unacknowledged reliable packets.
    fn process_acks(&self) -> Result<(), Self::Error>;

    /// Send `message` to `host`, tracking it until acknowledged.
    fn send_reliable(&self, message: &Message, host: Host, retries: u32) -> Result<(), Self::Error>;

    /// Send `message` to `host` once.
    fn send_message(&self, message: &Message, host: Host) -> Result<(), Self::Error>;
}
