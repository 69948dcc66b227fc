//! Fakes shared by the coordinator tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
};

use futures::{FutureExt, future::BoxFuture};
use grid_core::{Dispatcher, Host, Message, dispatch::Dispatch};
use grid_event_queue::{CapabilityPost, error::CapabilityError};
use grid_transport::{Datagram, PacketChannel};
use serde_json::Value;

pub fn init_tracing() {
    static ONCE: OnceLock<()> = OnceLock::new();
    ONCE.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

pub fn sim() -> Host {
    "10.0.0.5:13001".parse().unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CircuitError {
    #[error("socket closed")]
    Closed,

    #[error("malformed packet")]
    Malformed,

    #[error("cannot send {0}")]
    SendFailed(String),

    #[error("routing failed")]
    Routing,

    #[error("receive interrupted")]
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub name: String,
    pub host: Host,
    pub reliable: bool,
}

/// A UDP circuit whose "datagrams" are message names.
///
/// Inbound datagrams are fed through [`FakeCircuit::inbox`]. A message named
/// `Unsendable` fails to send; a datagram reading `Garbage` fails validation
/// and an empty one is a bare ack. Dropping the inbox sender closes the
/// socket.
#[derive(Debug)]
pub struct FakeCircuit {
    inbound: async_channel::Receiver<Datagram>,
    dispatch: Dispatcher,
    sent: Mutex<Vec<Sent>>,
    unacked: AtomicUsize,
    ack_rounds: AtomicUsize,
    receives: AtomicUsize,
    failing_receives: AtomicUsize,
}

impl FakeCircuit {
    pub fn new(dispatch: Dispatcher) -> (Self, async_channel::Sender<Datagram>) {
        let (tx, rx) = async_channel::unbounded();
        let circuit = Self {
            inbound: rx,
            dispatch,
            sent: Mutex::new(Vec::new()),
            unacked: AtomicUsize::new(0),
            ack_rounds: AtomicUsize::new(0),
            receives: AtomicUsize::new(0),
            failing_receives: AtomicUsize::new(0),
        };
        (circuit, tx)
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_names(&self) -> Vec<String> {
        self.sent().into_iter().map(|s| s.name).collect()
    }

    pub fn ack_rounds(&self) -> usize {
        self.ack_rounds.load(Ordering::SeqCst)
    }

    /// How many times the packet loop called `receive`.
    pub fn receives(&self) -> usize {
        self.receives.load(Ordering::SeqCst)
    }

    /// Make the next `n` receives fail with [`CircuitError::Interrupted`].
    pub fn fail_next_receives(&self, n: usize) {
        self.failing_receives.store(n, Ordering::SeqCst);
    }
}

pub fn datagram(name: &str) -> Datagram {
    Datagram {
        sender: sim().addr(),
        bytes: name.as_bytes().to_vec(),
    }
}

impl PacketChannel for FakeCircuit {
    type Packet = Message;
    type Error = CircuitError;

    fn receive(&self) -> BoxFuture<'_, Result<Datagram, CircuitError>> {
        self.receives.fetch_add(1, Ordering::SeqCst);
        let interrupted = self
            .failing_receives
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        async move {
            if interrupted {
                return Err(CircuitError::Interrupted);
            }
            self.inbound.recv().await.map_err(|_| CircuitError::Closed)
        }
        .boxed()
    }

    fn receive_check(&self, datagram: Datagram) -> Result<Option<Message>, CircuitError> {
        let name = String::from_utf8(datagram.bytes).map_err(|_| CircuitError::Malformed)?;
        if name.is_empty() {
            return Ok(None);
        }
        if name == "Garbage" {
            return Err(CircuitError::Malformed);
        }

        let message = Message::new(name).with_host(Some(Host::from(datagram.sender)));
        self.dispatch
            .handle(message.clone())
            .map_err(|_| CircuitError::Routing)?;
        Ok(Some(message))
    }

    fn has_unacked(&self) -> bool {
        self.unacked.load(Ordering::SeqCst) > 0
    }

    fn process_acks(&self) -> Result<(), CircuitError> {
        self.ack_rounds.fetch_add(1, Ordering::SeqCst);
        self.unacked.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn send_reliable(&self, message: &Message, host: Host, _retries: u32) -> Result<(), CircuitError> {
        self.record(message, host, true)?;
        self.unacked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn send_message(&self, message: &Message, host: Host) -> Result<(), CircuitError> {
        self.record(message, host, false)
    }
}

impl FakeCircuit {
    fn record(&self, message: &Message, host: Host, reliable: bool) -> Result<(), CircuitError> {
        if message.name() == "Unsendable" {
            return Err(CircuitError::SendFailed(message.name().to_owned()));
        }
        self.sent.lock().unwrap().push(Sent {
            name: message.name().to_owned(),
            host,
            reliable,
        });
        Ok(())
    }
}

/// Replays scripted replies, then answers with nothing.
#[derive(Debug, Clone)]
pub struct ScriptedCapability {
    name: &'static str,
    script: Arc<Mutex<VecDeque<Value>>>,
    pub requests: Arc<Mutex<Vec<Value>>>,
}

impl ScriptedCapability {
    pub fn new(name: &'static str, replies: impl IntoIterator<Item = Value>) -> Self {
        Self {
            name,
            script: Arc::new(Mutex::new(replies.into_iter().collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl CapabilityPost for ScriptedCapability {
    fn name(&self) -> &str {
        self.name
    }

    fn post(&self, payload: Value) -> BoxFuture<'_, Result<Option<Value>, CapabilityError>> {
        self.requests.lock().unwrap().push(payload);
        let reply = self.script.lock().unwrap().pop_front();
        async move { Ok(reply) }.boxed()
    }
}
