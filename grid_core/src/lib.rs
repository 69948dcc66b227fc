//! # Grid Core
//!
//! Shared vocabulary for the grid transport crates:
//!
//! - [`message`]: the decoded [`Message`]/[`Block`]/[`Variable`] records
//!   produced by both the UDP circuit and the HTTP event queue.
//! - [`template`]: schema lookup by message name.
//! - [`dispatch`]: fan-out of decoded messages to subscribers.
//! - [`settings`]: read-only configuration consumed at construction.
//! - [`home`]: allow-listed parser for the home location sent at login.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]
#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]

pub mod dispatch;
pub mod error;
pub mod home;
pub mod host;
pub mod message;
pub mod settings;
pub mod template;

pub use dispatch::{Dispatch, Dispatcher, Subscription};
pub use host::Host;
pub use message::{Block, Message, Variable, VariableSize};
pub use settings::Settings;
pub use template::{MemoryTemplates, Template, TemplateRegistry};
