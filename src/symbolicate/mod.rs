//! Line oriented symbolicators for the text formats an optimized app shows up in.

pub mod dexdump;
pub mod lines;
pub mod logcat;

use std::io::{self, Write};

use regex::{Captures, Regex};

use crate::maps::line_map::PositionMap;
use crate::types::{PseudoPosition, SymbolicatorError};

pub use dexdump::DexdumpSymbolicator;
pub use lines::LinesSymbolicator;
pub use logcat::LogcatSymbolicator;

/// Output for one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbolicated {
    /// Nothing is written for this line.
    Suppressed,
    Line(String),
    /// Several lines generated from one input line, each with its own line ending.
    Block(Vec<String>),
}

impl Symbolicated {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Symbolicated::Suppressed)
    }

    /// The output as a single string, `None` when suppressed.
    pub fn text(&self) -> Option<String> {
        match self {
            Symbolicated::Suppressed => None,
            Symbolicated::Line(line) => Some(line.clone()),
            Symbolicated::Block(lines) => Some(lines.concat()),
        }
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match self {
            Symbolicated::Suppressed => Ok(()),
            Symbolicated::Line(line) => out.write_all(line.as_bytes()),
            Symbolicated::Block(lines) => {
                for line in lines {
                    out.write_all(line.as_bytes())?;
                }
                Ok(())
            }
        }
    }
}

/// A stateful transformer fed one input line at a time.
pub trait LineSymbolicator {
    fn symbolicate(&mut self, line: &str) -> Result<Symbolicated, SymbolicatorError>;

    fn name(&self) -> &'static str;
}

/// `Regex::replace_all` for replacers that can fail.
pub(crate) fn try_replace_all<F>(re: &Regex, text: &str, mut replacer: F) -> Result<String, SymbolicatorError>
where
    F: FnMut(&Captures<'_>) -> Result<String, SymbolicatorError>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&text[last..whole.start()]);
        out.push_str(&replacer(&caps)?);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Number of branches of the switch whose table starts at `start`.
///
/// The table opens with exactly one `count` position followed by that many
/// case entries; anything else means the dump and the position map do not
/// belong together.
pub(crate) fn switch_count(line_map: &PositionMap, start: u32) -> Result<u32, SymbolicatorError> {
    let count_positions = line_map.get_stack(start as i64);
    match count_positions.as_slice() {
        [count]
            if count.pseudo() == Some(PseudoPosition::Count)
                && (start as u64 + count.line as u64) < line_map.len() as u64 =>
        {
            Ok(count.line)
        }
        _ => Err(SymbolicatorError::MalformedSwitch {
            index: start,
            entries: count_positions.len(),
        }),
    }
}
