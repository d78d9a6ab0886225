use serde::{Deserialize, Serialize};
use std::fmt;

/// One table value. JSON workbooks keep their native types; CSV tables only
/// ever produce [`Cell::Text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Missing value (`null` in JSON).
    Empty,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// The string value, if this is a text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Empty
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => f.write_str(s),
        }
    }
}
