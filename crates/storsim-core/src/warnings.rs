//! Accumulated advisory diagnostics.

use std::fmt::{Display, Formatter};

/// Ordered list of warnings produced by a component during a run.
///
/// Warnings never abort an estimate. A message is dropped if it is already contained in one of the
/// accumulated messages, so repeating a parameter sweep does not repeat its diagnostics.
#[derive(Clone, Debug, Default)]
pub struct Warnings {
    messages: Vec<String>,
}

impl Warnings {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message unless it was already reported. Returns true if the message was added.
    pub fn warn<S: Into<String>>(&mut self, msg: S) -> bool {
        let msg = msg.into();
        if self.messages.iter().any(|m| m.contains(msg.as_str())) {
            return false;
        }
        self.messages.push(msg);
        true
    }

    /// Appends a message unless some accumulated message already mentions `topic`.
    ///
    /// Used for diagnostics whose text carries parameters but which should be reported once per topic.
    pub fn warn_once<S: Into<String>>(&mut self, topic: &str, msg: S) -> bool {
        if self.messages.iter().any(|m| m.contains(topic)) {
            return false;
        }
        self.messages.push(msg.into());
        true
    }

    /// Returns the accumulated messages in order of appearance.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Removes and returns all accumulated messages.
    pub fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }

    /// Returns the number of accumulated messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Display for Warnings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for msg in &self.messages {
            writeln!(f, "\t{}", msg)?;
        }
        Ok(())
    }
}
