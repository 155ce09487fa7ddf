use std::collections::HashMap;
use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

use crate::maps::error::MapError;

/// Errors surfaced while loading symbol files or symbolicating a stream.
#[derive(Debug)]
pub enum SymbolicatorError {
    Io(io::Error),
    Map(MapError),
    /// A `switch` position whose target is not a single `count` entry, or
    /// whose count runs past the end of the map.
    MalformedSwitch { index: u32, entries: usize },
    /// A `case` table entry that does not start with a `case` position.
    MalformedCase { index: u32 },
    /// Switch positions nested deeper than any real map produces.
    RecursionLimit { index: u32 },
    /// Symbol files are missing or inconsistent with each other.
    MissingSymbols(String),
}

impl fmt::Display for SymbolicatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolicatorError::Io(err) => write!(f, "I/O error: {err}"),
            SymbolicatorError::Map(err) => write!(f, "symbol map error: {err}"),
            SymbolicatorError::MalformedSwitch { index, entries } => write!(
                f,
                "malformed switch table at position {index} ({entries} entries in its count stack)"
            ),
            SymbolicatorError::MalformedCase { index } => {
                write!(f, "malformed switch case at position {index}")
            }
            SymbolicatorError::RecursionLimit { index } => {
                write!(f, "switch nesting too deep at position {index}")
            }
            SymbolicatorError::MissingSymbols(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for SymbolicatorError {}

impl From<io::Error> for SymbolicatorError {
    fn from(value: io::Error) -> Self {
        SymbolicatorError::Io(value)
    }
}

impl From<MapError> for SymbolicatorError {
    fn from(value: MapError) -> Self {
        SymbolicatorError::Map(value)
    }
}

/// Pseudo methods redex writes into the position map to describe switch
/// statements that were merged by outlining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoPosition {
    Pattern,
    Switch,
    Case,
    Count,
}

impl PseudoPosition {
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "redex.$Position.pattern" => Some(Self::Pattern),
            "redex.$Position.switch" => Some(Self::Switch),
            "redex.$Position.case" => Some(Self::Case),
            "redex.$Position.count" => Some(Self::Count),
            _ => None,
        }
    }

    pub fn as_method(&self) -> &'static str {
        match self {
            Self::Pattern => "redex.$Position.pattern",
            Self::Switch => "redex.$Position.switch",
            Self::Case => "redex.$Position.case",
            Self::Count => "redex.$Position.count",
        }
    }
}

/// One frame of a position stack.
///
/// For a real position `file` and `line` are the source location and `method`
/// is the fully qualified method it was inlined from (v2 maps only). For a
/// pseudo position `method` is one of the `redex.$Position.*` tags and `line`
/// is its operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub method: Option<String>,
    pub file: String,
    pub line: u32,
}

impl Position {
    pub fn new(method: Option<&str>, file: &str, line: u32) -> Self {
        Position {
            method: method.map(str::to_string),
            file: file.to_string(),
            line,
        }
    }

    pub fn pseudo(&self) -> Option<PseudoPosition> {
        self.method.as_deref().and_then(PseudoPosition::from_method)
    }
}

/// Rename record for one obfuscated class, keyed in the class map by its
/// obfuscated dotted name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMemberMapping {
    pub origin_class: String,
    pub method_mapping: HashMap<String, String>,
    pub field_mapping: HashMap<String, String>,
}

impl ClassMemberMapping {
    pub fn new(origin_class: &str) -> Self {
        ClassMemberMapping {
            origin_class: origin_class.to_string(),
            ..Default::default()
        }
    }
}

/// Obfuscated dotted class name to its rename record.
pub type ClassMap = HashMap<String, ClassMemberMapping>;
