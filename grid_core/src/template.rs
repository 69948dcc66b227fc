//! Message templates and the registry that looks them up by name.
//!
//! A template is the fixed schema of a binary protocol message. The event
//! queue only asks whether a name has one: events with a template carry their
//! body keyed by block name, events without one are flat key/value maps.

use std::collections::BTreeMap;

/// How many times a block repeats within a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockQuantity {
    /// Exactly once.
    Single,

    /// A fixed number of times.
    Multiple(u8),

    /// A count carried in the packet.
    Variable,
}

/// Message frequency class, which sets the width of the message number on
/// the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Frequency {
    /// One-byte number.
    High,

    /// Two-byte number.
    Medium,

    /// Four-byte number.
    #[default]
    Low,

    /// Fixed four-byte number outside the low range.
    Fixed,
}

/// A field within a block template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableTemplate {
    /// Field name.
    pub name: String,

    /// Wire type name, e.g. `LLUUID` or `U32`.
    pub kind: String,

    /// Fixed byte size, or `None` for variable-length fields.
    pub size: Option<usize>,
}

/// A block within a message template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    /// Block name.
    pub name: String,

    /// Repetition rule.
    pub quantity: BlockQuantity,

    /// Fields in wire order.
    pub variables: Vec<VariableTemplate>,
}

/// The schema of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Message name.
    pub name: String,

    /// Frequency class.
    pub frequency: Frequency,

    /// Message number within its frequency class.
    pub number: u32,

    /// Blocks in wire order.
    pub blocks: Vec<BlockTemplate>,
}

impl Template {
    /// A template with no blocks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frequency: Frequency::default(),
            number: 0,
            blocks: Vec::new(),
        }
    }

    /// Set the frequency class and message number.
    #[must_use]
    pub const fn with_number(mut self, frequency: Frequency, number: u32) -> Self {
        self.frequency = frequency;
        self.number = number;
        self
    }

    /// Append a block.
    #[must_use]
    pub fn with_block(mut self, block: BlockTemplate) -> Self {
        self.blocks.push(block);
        self
    }

    /// Look up a block template by name.
    #[must_use]
    pub fn block(&self, name: &str) -> Option<&BlockTemplate> {
        self.blocks.iter().find(|b| b.name == name)
    }
}

/// Schema lookup by message name.
pub trait TemplateRegistry: Send + Sync {
    /// The template for `name`, or `None` if the message has no binary form.
    fn lookup(&self, name: &str) -> Option<&Template>;
}

/// An in-memory [`TemplateRegistry`].
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplates {
    templates: BTreeMap<String, Template>,
}

impl MemoryTemplates {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template, replacing any with the same name.
    pub fn insert(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), template);
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with_template(mut self, template: Template) -> Self {
        self.insert(template);
        self
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the registry holds no templates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateRegistry for MemoryTemplates {
    fn lookup(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }
}

impl<T: TemplateRegistry + ?Sized> TemplateRegistry for std::sync::Arc<T> {
    fn lookup(&self, name: &str) -> Option<&Template> {
        (**self).lookup(name)
    }
}
