//! Column model for message tables
//!
//! Six read-only columns. Rows not yet loaded render a placeholder whose
//! shape depends on the column kind, so a table can draw immediately and
//! fill in once the page arrives.

use crate::store::{Direction, Message, MessageKey, Payload};
use chrono::{TimeZone, Utc};
use serde::Serialize;

/// Shown in text cells of rows that are still loading
pub const PLACEHOLDER_TEXT: &str = "..";

/// Shown instead of binary payloads
pub const BINARY_PAYLOAD: &str = "<binary data>";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Columns of the messages table, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Direction,
    Timestamp,
    Opcode,
    PayloadLength,
    Payload,
}

/// Value type a column holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Key,
    Direction,
    Text,
    Integer,
}

impl Column {
    pub const COUNT: usize = 6;

    pub fn all() -> &'static [Column] {
        &[
            Column::Id,
            Column::Direction,
            Column::Timestamp,
            Column::Opcode,
            Column::PayloadLength,
            Column::Payload,
        ]
    }

    pub fn from_index(index: usize) -> Option<Column> {
        Self::all().get(index).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => "Id",
            Column::Direction => "Direction",
            Column::Timestamp => "Timestamp",
            Column::Opcode => "Opcode",
            Column::PayloadLength => "Payload Length",
            Column::Payload => "Payload",
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Id => ColumnKind::Key,
            Column::Direction => ColumnKind::Direction,
            Column::Timestamp | Column::Opcode | Column::Payload => ColumnKind::Text,
            Column::PayloadLength => ColumnKind::Integer,
        }
    }

    /// Stand-in value for a row that is not loaded
    pub fn placeholder(&self) -> Cell {
        match self.kind() {
            ColumnKind::Text => Cell::Text(PLACEHOLDER_TEXT.to_string()),
            _ => Cell::Empty,
        }
    }

    /// Cells are never editable
    pub fn is_editable(&self) -> bool {
        false
    }
}

/// One rendered table cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Key(MessageKey),
    Direction(Direction),
    Text(String),
    Integer(u64),
    Empty,
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Key(key) => write!(f, "{}", key),
            Cell::Direction(direction) => write!(f, "{}", direction.arrow()),
            Cell::Text(text) => write!(f, "{}", text),
            Cell::Integer(n) => write!(f, "{}", n),
            Cell::Empty => Ok(()),
        }
    }
}

/// Render one column of a loaded message
pub fn render(message: &Message, column: Column, preview_length: usize) -> Cell {
    match column {
        Column::Id => Cell::Key(message.key()),
        Column::Direction => Cell::Direction(message.direction),
        Column::Timestamp => Cell::Text(format_timestamp(message.timestamp)),
        Column::Opcode => Cell::Text(format!(
            "{}={}",
            message.opcode,
            message.readable_opcode()
        )),
        Column::PayloadLength => Cell::Integer(message.payload_length),
        Column::Payload => Cell::Text(payload_preview(message, preview_length)),
    }
}

/// Millisecond timestamp as UTC wall-clock text
pub fn format_timestamp(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
        None => millis.to_string(),
    }
}

/// Payload text as shown in the payload column
///
/// Text beyond `preview_length` characters, or text already cut short by a
/// preview load, ends in `...`.
pub fn payload_preview(message: &Message, preview_length: usize) -> String {
    match &message.payload {
        Payload::Binary(_) => BINARY_PAYLOAD.to_string(),
        Payload::Text(text) => {
            let chars = text.chars().count();
            if chars > preview_length || (message.is_preview() && chars >= preview_length) {
                let keep = preview_length.saturating_sub(1);
                let mut cut: String = text.chars().take(keep).collect();
                cut.push_str("...");
                cut
            } else {
                text.clone()
            }
        }
    }
}
