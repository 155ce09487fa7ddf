use std::fmt;

macro_rules! err {
    ($base:ident, $fmtstr:literal, $($args:tt)*) => {
        MapError::with_context($base, format!($fmtstr, $($args)*))
    };
    ($fmtstr:literal, $($args:tt)*) => {
        MapError::new(&format!($fmtstr, $($args)*))
    };
}

#[macro_export]
macro_rules! fail {
    (($fmtstr:literal, $($args:tt)*), ($contextfmt:literal, $($contextargs:tt)*)) => {
        return Err(MapError::with_context(MapError::new(&format!($fmtstr, $($args)*)), format!($contextfmt, $($contextargs)*)))
    };
    ($fmtstr:literal, $($args:tt)*) => {
        return Err(MapError::new(&format!($fmtstr, $($args)*)))
    };
}

/// Error raised while decoding one of the redex symbol files.
///
/// Carries the innermost message plus the chain of places it was found in,
/// so a truncated entry reads as `Unexpected end of stream ... for entry 3 of line map`.
#[derive(Debug, PartialEq, Eq)]
pub struct MapError
{
    msg: String,
    contexts: Vec<String>,
}

impl MapError
{
    pub(crate) fn new(msg: &str) -> Self
    {
        MapError {
            msg: msg.to_string(),
            contexts: Vec::new(),
        }
    }

    pub(crate) fn with_context(base: MapError, context: String) -> Self
    {
        let mut contexts = base.contexts;
        contexts.push(context);
        MapError { msg: base.msg, contexts }
    }

    pub fn message(&self) -> &str
    {
        &self.msg
    }
}

impl fmt::Display for MapError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.msg)?;
        let mut connector = " for ";
        for context in &self.contexts
        {
            write!(f, "{}{}", connector, context)?;
            connector = " of ";
        }
        Ok(())
    }
}

impl std::error::Error for MapError {}

impl From<std::io::Error> for MapError
{
    fn from(value: std::io::Error) -> Self
    {
        MapError::new(&format!("I/O error: {value}"))
    }
}
