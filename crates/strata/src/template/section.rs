//! Section buffers and the start/stop state machine.

use std::collections::HashMap;

use crate::error::{RenderError, Result};

/// Reserved section holding a child template's output inside its layout.
pub const CONTENT_SECTION: &str = "content";

/// Named section buffers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    buffers: HashMap<String, String>,
}

impl Sections {
    /// Creates an empty set of sections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Content of `name`, if it has been written.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.buffers.get(name).map(String::as_str)
    }

    /// Content of `name`, or `default` if it has not been written.
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    /// Replaces the content of `name`.
    pub fn replace(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.buffers.insert(name.into(), content.into());
    }

    /// Appends to the content of `name`, starting from empty.
    pub fn append(&mut self, name: impl Into<String>, content: &str) {
        self.buffers.entry(name.into()).or_default().push_str(content);
    }

    /// Returns true if `name` has been written.
    pub fn contains(&self, name: &str) -> bool {
        self.buffers.contains_key(name)
    }

    /// Iterates over section names in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    /// Number of sections.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns true if no section has been written.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// Whether a section is currently collecting output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SectionState {
    #[default]
    Idle,
    Collecting { name: String, append: bool },
}

impl SectionState {
    /// Moves to `Collecting`. Used by both `start` (`append == false`) and `push`.
    pub fn begin(&mut self, name: &str, append: bool) -> Result<()> {
        if name == CONTENT_SECTION {
            return Err(RenderError::ReservedSection);
        }
        if let SectionState::Collecting { name: active, .. } = self {
            return Err(RenderError::NestedSection {
                active: active.clone(),
                requested: name.to_string(),
            });
        }
        *self = SectionState::Collecting {
            name: name.to_string(),
            append,
        };
        Ok(())
    }

    /// Moves back to `Idle`, returning the section that was collecting and its
    /// append flag.
    pub fn end(&mut self) -> Result<(String, bool)> {
        match std::mem::take(self) {
            SectionState::Collecting { name, append } => Ok((name, append)),
            SectionState::Idle => Err(RenderError::SectionNotStarted),
        }
    }

    /// Name of the collecting section.
    pub fn active(&self) -> Option<&str> {
        match self {
            SectionState::Collecting { name, .. } => Some(name),
            SectionState::Idle => None,
        }
    }
}
