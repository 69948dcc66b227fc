//! Decoded protocol messages.
//!
//! A [`Message`] is an ordered list of [`Block`]s, and each block is an
//! ordered list of [`Variable`]s. The same shape is produced whether the
//! message arrived as a binary UDP packet or as an event-queue entry; only
//! [`VariableSize`] tells the two apart.

use core::fmt;

use serde_json::Value;

use crate::host::Host;

/// The byte length of a variable, when the transport knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableSize {
    /// Length taken from a binary template.
    Known(usize),

    /// Decoded from a structured transport, where byte length has no meaning.
    Unknown,
}

impl VariableSize {
    /// The known size, if any.
    #[must_use]
    pub const fn known(self) -> Option<usize> {
        match self {
            Self::Known(n) => Some(n),
            Self::Unknown => None,
        }
    }
}

/// A single named field value.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    value: Value,
    size: VariableSize,
}

impl Variable {
    /// Create a variable.
    pub fn new(name: impl Into<String>, value: Value, size: VariableSize) -> Self {
        Self {
            name: name.into(),
            value,
            size,
        }
    }

    /// The field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field value, verbatim as decoded.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// The declared size.
    #[must_use]
    pub const fn size(&self) -> VariableSize {
        self.size
    }
}

/// One repetition of a named group of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    name: String,
    variables: Vec<Variable>,
}

impl Block {
    /// Create an empty block.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
        }
    }

    /// The block name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a variable, keeping insertion order.
    pub fn add_variable(&mut self, variable: Variable) {
        self.variables.push(variable);
    }

    /// Variables in received order.
    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// First variable with the given name.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    name: String,
    blocks: Vec<Block>,
    event_queue_id: Option<i64>,
    host: Option<Host>,
}

impl Message {
    /// Create a message with no blocks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: Vec::new(),
            event_queue_id: None,
            host: None,
        }
    }

    /// Tag the message with the event-queue id that produced it.
    #[must_use]
    pub fn with_event_queue_id(mut self, id: Option<i64>) -> Self {
        self.event_queue_id = id;
        self
    }

    /// Tag the message with the host it came from.
    #[must_use]
    pub fn with_host(mut self, host: Option<Host>) -> Self {
        self.host = host;
        self
    }

    /// The message name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a block, keeping insertion order.
    pub fn add_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// All blocks in received order.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Every repetition of the named block, in order.
    pub fn blocks_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Block> + 'a {
        self.blocks.iter().filter(move |b| b.name == name)
    }

    /// The `index`th repetition of the named block.
    #[must_use]
    pub fn block(&self, name: &str, index: usize) -> Option<&Block> {
        self.blocks.iter().filter(|b| b.name == name).nth(index)
    }

    /// Value of `var` in the `index`th repetition of `block`.
    #[must_use]
    pub fn variable(&self, block: &str, index: usize, var: &str) -> Option<&Value> {
        self.block(block, index)
            .and_then(|b| b.variable(var))
            .map(Variable::value)
    }

    /// The event-queue id this message was decoded under.
    #[must_use]
    pub const fn event_queue_id(&self) -> Option<i64> {
        self.event_queue_id
    }

    /// The host this message came from.
    #[must_use]
    pub const fn host(&self) -> Option<Host> {
        self.host
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} blocks)", self.name, self.blocks.len())
    }
}
