use crate::symbolicate::{LineSymbolicator, Symbolicated};
use crate::types::{ClassMap, SymbolicatorError};

/// Symbolicates a plain list of class names, one per line,
/// e.g. `X/A01.class` becomes `com/facebook/XyzClass.class`.
pub struct LinesSymbolicator<'a> {
    class_map: &'a ClassMap,
    skip_unsymbolicated: bool,
}

impl<'a> LinesSymbolicator<'a> {
    pub fn new(class_map: &'a ClassMap, skip_unsymbolicated: bool) -> Self {
        LinesSymbolicator {
            class_map,
            skip_unsymbolicated,
        }
    }

    pub fn symbolicate(&self, line: &str) -> Symbolicated {
        let name = line.trim_end_matches(['\n', '\r']);
        let name = name.strip_suffix(".class").unwrap_or(name);
        match self.class_map.get(&name.replace('/', ".")) {
            Some(mapping) => Symbolicated::Line(format!("{}.class\n", mapping.origin_class.replace('.', "/"))),
            None if self.skip_unsymbolicated => Symbolicated::Suppressed,
            None => Symbolicated::Line(line.to_string()),
        }
    }
}

impl LineSymbolicator for LinesSymbolicator<'_> {
    fn symbolicate(&mut self, line: &str) -> Result<Symbolicated, SymbolicatorError> {
        Ok(LinesSymbolicator::symbolicate(self, line))
    }

    fn name(&self) -> &'static str {
        "LinesSymbolicator"
    }
}
