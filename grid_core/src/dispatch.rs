//! Fan-out of decoded messages to subscribers.
//!
//! Both the UDP circuit and the event queue hand every decoded [`Message`]
//! to a [`Dispatch`] implementation. The two run as independent tasks, so
//! implementations must accept concurrent callers.
//!
//! [`Dispatcher`] is the stock implementation: subscribers register interest
//! in a message name (or in everything) and receive clones over an unbounded
//! channel.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use async_channel::{Receiver, Sender, TrySendError};
use dashmap::DashMap;

use crate::{error::DispatchError, message::Message};

/// Receives every decoded message.
pub trait Dispatch: Send + Sync {
    /// Deliver one message.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if the message could not be accepted.
    fn handle(&self, message: Message) -> Result<(), DispatchError>;
}

impl<D: Dispatch + ?Sized> Dispatch for Arc<D> {
    fn handle(&self, message: Message) -> Result<(), DispatchError> {
        (**self).handle(message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Topic {
    All,
    Named(String),
}

/// A stream of messages from a [`Dispatcher`].
///
/// Dropping the subscription unregisters it on the next delivery.
#[derive(Debug, Clone)]
pub struct Subscription {
    rx: Receiver<Message>,
}

impl Subscription {
    /// Wait for the next message.
    ///
    /// Returns `None` once the dispatcher is closed and the backlog is empty.
    pub async fn recv(&self) -> Option<Message> {
        self.rx.recv().await.ok()
    }

    /// Take a message if one is waiting.
    #[must_use]
    pub fn try_recv(&self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Number of messages waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no messages are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Whether the dispatcher has closed this subscription.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }
}

/// Concurrent, channel-backed [`Dispatch`] registry.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    subscribers: Arc<DashMap<Topic, Vec<Sender<Message>>>>,
    dropped: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl Dispatcher {
    /// A dispatcher with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every message named `name`.
    pub fn subscribe(&self, name: impl Into<String>) -> Subscription {
        self.register(Topic::Named(name.into()))
    }

    /// Receive every message.
    pub fn subscribe_all(&self) -> Subscription {
        self.register(Topic::All)
    }

    fn register(&self, topic: Topic) -> Subscription {
        let (tx, rx) = async_channel::unbounded();
        self.subscribers.entry(topic).or_default().push(tx.clone());

        // A `close` racing the push may have swept the map before it.
        if self.closed.load(Ordering::Acquire) {
            tx.close();
        }
        Subscription { rx }
    }

    /// Messages that reached no subscriber.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Close every subscription and refuse further messages.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for entry in self.subscribers.iter() {
            for tx in entry.value() {
                tx.close();
            }
        }
        self.subscribers.clear();
    }

    fn deliver(&self, topic: &Topic, message: &Message) -> usize {
        let Some(mut senders) = self.subscribers.get_mut(topic) else {
            return 0;
        };

        let mut delivered = 0;
        senders.retain(|tx| match tx.try_send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Closed(_)) => false,
        });
        delivered
    }
}

impl Dispatch for Dispatcher {
    fn handle(&self, message: Message) -> Result<(), DispatchError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DispatchError::Closed);
        }

        let named = Topic::Named(message.name().to_owned());
        let delivered = self.deliver(&named, &message) + self.deliver(&Topic::All, &message);

        if delivered == 0 {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(msg = %message.name(), "no subscribers for message");
        }

        Ok(())
    }
}
