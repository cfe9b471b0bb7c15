//! Filter criteria for message views
//!
//! A `Criteria` value is the complete predicate a view applies: the channel
//! scope plus the user-adjustable `MessageFilter`. It is immutable; views
//! swap in a new value instead of mutating the current one.

use crate::store::types::{Direction, Message};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// User-adjustable part of the criteria
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFilter {
    /// Only messages travelling this way
    #[serde(default)]
    pub direction: Option<Direction>,
    /// Allowed opcodes; empty allows all
    #[serde(default)]
    pub opcodes: BTreeSet<u8>,
}

impl MessageFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn opcode(mut self, opcode: u8) -> Self {
        self.opcodes.insert(opcode);
        self
    }

    pub fn opcodes(mut self, opcodes: impl IntoIterator<Item = u8>) -> Self {
        self.opcodes.extend(opcodes);
        self
    }

    /// True when this filter hides the message
    pub fn is_blacklisted(&self, message: &Message) -> bool {
        if let Some(direction) = self.direction {
            if message.direction != direction {
                return true;
            }
        }
        !self.opcodes.is_empty() && !self.opcodes.contains(&message.opcode)
    }
}

/// Channel scope plus message filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    /// None shows every channel
    #[serde(default)]
    pub channel: Option<u32>,
    #[serde(flatten)]
    pub filter: MessageFilter,
}

impl Criteria {
    pub fn new(channel: Option<u32>, filter: MessageFilter) -> Self {
        Self { channel, filter }
    }

    /// Criteria that match every message
    pub fn all() -> Self {
        Self::default()
    }

    pub fn channel(mut self, channel_id: u32) -> Self {
        self.channel = Some(channel_id);
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.filter.direction = Some(direction);
        self
    }

    pub fn opcode(mut self, opcode: u8) -> Self {
        self.filter.opcodes.insert(opcode);
        self
    }

    /// Copy of these criteria scoped to another channel
    pub fn with_scope(&self, channel: Option<u32>) -> Self {
        Self {
            channel,
            filter: self.filter.clone(),
        }
    }

    /// Copy of these criteria with another message filter
    pub fn with_filter(&self, filter: MessageFilter) -> Self {
        Self {
            channel: self.channel,
            filter,
        }
    }

    /// Evaluate the criteria against a message
    ///
    /// All constraints must pass; an absent constraint matches anything.
    pub fn matches(&self, message: &Message) -> bool {
        if let Some(channel) = self.channel {
            if message.channel_id != channel {
                return false;
            }
        }
        !self.filter.is_blacklisted(message)
    }

    /// Render the criteria as a SQL predicate over the `messages` table
    ///
    /// Returns the clause (without `WHERE`) and its bound values in order.
    /// An unconstrained criteria renders as `1 = 1`.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(channel) = self.channel {
            clauses.push("channel_id = ?".to_string());
            values.push(Value::Integer(channel as i64));
        }

        if let Some(direction) = self.filter.direction {
            clauses.push("is_outgoing = ?".to_string());
            values.push(Value::Integer(direction.is_outgoing() as i64));
        }

        if !self.filter.opcodes.is_empty() {
            let placeholders = vec!["?"; self.filter.opcodes.len()].join(", ");
            clauses.push(format!("opcode IN ({})", placeholders));
            values.extend(
                self.filter
                    .opcodes
                    .iter()
                    .map(|&op| Value::Integer(op as i64)),
            );
        }

        if clauses.is_empty() {
            ("1 = 1".to_string(), values)
        } else {
            (clauses.join(" AND "), values)
        }
    }
}
