//! Error types for the transport coordinator.

use grid_event_queue::error::EventQueueError;
use thiserror::Error;

/// Lifecycle failure of a [`MessageManager`](crate::manager::MessageManager).
///
/// `E` is the packet channel's error type.
#[derive(Debug, Error)]
pub enum TransportError<E> {
    /// The packet channel failed too many times in a row; the packet loop
    /// has stopped.
    #[error("packet channel error: {0}")]
    Packet(#[source] E),

    /// The event queue refused to start or stop.
    #[error(transparent)]
    EventQueue(#[from] EventQueueError),

    /// `start_monitors` was called twice without `stop_monitors`.
    #[error("transport monitors already running")]
    AlreadyRunning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_queue_errors_pass_through() {
        let err: TransportError<std::io::Error> = EventQueueError::NotRunning.into();
        assert_eq!(err.to_string(), "event queue not running");
    }

    #[test]
    fn packet_errors_keep_their_source() {
        let err = TransportError::Packet(std::io::Error::other("socket closed"));
        assert_eq!(err.to_string(), "packet channel error: socket closed");
        assert!(core::error::Error::source(&err).is_some());
    }
}
