use std::borrow::Cow;

use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::symbol_files::SymbolMaps;
use crate::symbolicate::{switch_count, try_replace_all, LineSymbolicator, Symbolicated};
use crate::types::{PseudoPosition, SymbolicatorError};

static CLASS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"L(?P<class>[A-Za-z][0-9A-Za-z_$]*/[0-9A-Za-z_$/]+);").unwrap());

static LINE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<prefix>0x[0-9a-f]+ line=)(?P<lineno>[0-9]+)").unwrap());

// Heads both the method and the field entries of a class
static METHOD_CLS_HDR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"#[0-9]+\s+:\s+\(in L(?P<class>[A-Za-z][0-9A-Za-z]*/[0-9A-Za-z_$/]+);\)").unwrap()
});

// Names both methods and fields
static METHOD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"name\s+:\s+'(?P<method>[<A-Za-z][>A-Za-z0-9_$]*)'").unwrap());

static CLS_CHUNK_HDR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^  [A-Z]").unwrap());
static CLS_HDR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Class #").unwrap());

static PROCESSING_DEX_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Processing '.*\.dex'").unwrap());
static CLASS_INDEX_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"Class #[0-9]+").unwrap());

const POSITIONS_MARKER: &str = "positions     :";
const LOCALS_MARKER: &str = "locals        :";
const LINE_INDENT: &str = "        ";

/// Real maps nest switches a handful of levels at most.
const MAX_SWITCH_DEPTH: usize = 64;

/// Rewrites `dexdump -d` output of an optimized dex back to source names
/// and positions.
///
/// Without IODI metadata every line only gets its class descriptors and
/// `line=` annotations rewritten. With it, the symbolicator also follows
/// which class and method the dump is in, so that line numbers shared
/// between methods can be resolved through the debug line map.
pub struct DexdumpSymbolicator<'a> {
    symbol_maps: &'a SymbolMaps,
    all_line_info: bool,
    reading_methods: bool,
    current_class: Option<String>,
    current_class_name: Option<String>,
    current_method: Option<String>,
    last_lineno: Option<u32>,
    prev_line: Option<String>,
}

impl<'a> DexdumpSymbolicator<'a> {
    /// `all_line_info` keeps the synthetic line number next to each decoded
    /// position and disables suppression of repeated lines.
    pub fn new(symbol_maps: &'a SymbolMaps, all_line_info: bool) -> Self {
        DexdumpSymbolicator {
            symbol_maps,
            all_line_info,
            reading_methods: false,
            current_class: None,
            current_class_name: None,
            current_method: None,
            last_lineno: None,
            prev_line: None,
        }
    }

    pub fn is_likely_dexdump(line: &str) -> bool {
        PROCESSING_DEX_REGEX.is_match(line) || CLASS_INDEX_REGEX.is_match(line)
    }

    pub fn reset_state(&mut self) {
        self.reading_methods = false;
        self.current_class = None;
        self.current_class_name = None;
        self.current_method = None;
        self.last_lineno = None;
        self.prev_line = None;
    }

    pub fn reading_methods(&self) -> bool {
        self.reading_methods
    }

    pub fn current_class(&self) -> Option<&str> {
        self.current_class.as_deref()
    }

    pub fn current_method(&self) -> Option<&str> {
        self.current_method.as_deref()
    }

    /// Renders the position stack at `idx`, outermost first.
    pub fn decode_positions_at(&self, idx: i64) -> Result<Vec<String>, SymbolicatorError> {
        self.decode_positions(idx, 0)
    }

    fn decode_positions(&self, idx: i64, depth: usize) -> Result<Vec<String>, SymbolicatorError> {
        if depth > MAX_SWITCH_DEPTH {
            return Err(SymbolicatorError::RecursionLimit { index: idx.max(0) as u32 });
        }
        let line_map = &self.symbol_maps.line_map;
        let mut results = vec![];
        for pos in line_map.get_stack(idx) {
            match pos.pseudo() {
                Some(PseudoPosition::Pattern) => results.push(format!("pattern {}", pos.line)),
                Some(PseudoPosition::Switch) => {
                    let start = pos.line;
                    let count = switch_count(line_map, start)?;
                    let mut switch_results = vec![];
                    for i in 0..count {
                        let branch = self.decode_positions(start as i64 + 1 + i as i64, depth + 1)?;
                        switch_results.push(format!("{{{}}}", branch.join(", ")));
                    }
                    results.push(format!("switch {{{}}}", switch_results.join(", ")));
                }
                Some(PseudoPosition::Case) => results.push(format!("case(pattern {})", pos.line)),
                _ => results.push(format!("{}:{}", pos.file, pos.line)),
            }
        }
        Ok(results)
    }

    fn line_info(&self, lineno: &str, decoded: &[String]) -> String {
        if self.all_line_info {
            format!("{} ({})", lineno, decoded.join(", "))
        } else {
            decoded.join(", ")
        }
    }

    fn class_replacer(&self, caps: &Captures<'_>) -> String {
        let m = &caps["class"];
        match self.symbol_maps.class_map.get(&m.replace('/', ".")) {
            Some(mapping) => format!("L{};", mapping.origin_class.replace('.', "/")),
            None => format!("L{};", m),
        }
    }

    fn line_replacer(&self, caps: &Captures<'_>) -> Result<String, SymbolicatorError> {
        let lineno_str = &caps["lineno"];
        let Ok(lineno) = lineno_str.parse::<i64>() else {
            return Ok(caps[0].to_string());
        };
        let decoded = self.decode_positions_at(lineno - 1)?;
        Ok(format!("{}{}", &caps["prefix"], self.line_info(lineno_str, &decoded)))
    }

    /// Swaps the quoted name for its original, picking the method or the
    /// field table depending on the sub-section being read.
    fn method_replacer(&self, caps: &Captures<'_>) -> String {
        let whole = &caps[0];
        let mapping = self
            .current_class
            .as_ref()
            .and_then(|cls| self.symbol_maps.class_map.get(&cls.replace('/', ".")));
        let (Some(mapping), Some(whole_match), Some(name)) = (mapping, caps.get(0), caps.name("method"))
        else {
            return whole.to_string();
        };
        let table = if self.reading_methods {
            &mapping.method_mapping
        } else {
            &mapping.field_mapping
        };
        match table.get(name.as_str()) {
            Some(original) => {
                let start = name.start() - whole_match.start();
                let end = name.end() - whole_match.start();
                format!("{}{}{}", &whole[..start], original, &whole[end..])
            }
            None => whole.to_string(),
        }
    }

    /// Processes one line of the dump, remembering it for the next call.
    pub fn symbolicate(&mut self, line: &str) -> Result<Symbolicated, SymbolicatorError> {
        let result = self.symbolicate_line(line);
        self.prev_line = Some(line.to_string());
        result
    }

    fn symbolicate_line(&mut self, line: &str) -> Result<Symbolicated, SymbolicatorError> {
        let mut line: Cow<'_, str> = Cow::Borrowed(line);

        let symbol_maps = self.symbol_maps;
        if let Some((iodi, debug_line_map)) = symbol_maps.iodi() {
            let class_header = METHOD_CLS_HDR_REGEX.captures(&line).map(|c| c["class"].to_string());
            let member_name = match (&class_header, &self.current_class) {
                (None, Some(_)) => METHOD_REGEX.captures(&line).map(|c| c["method"].to_string()),
                _ => None,
            };

            if let Some(cls) = class_header {
                self.current_class = Some(cls);
            } else if let Some(name) = member_name {
                self.current_method = Some(name);
                self.current_class_name = self.current_class.as_ref().map(|cls| cls.replace('/', "."));
                let replaced = METHOD_REGEX
                    .replace_all(&line, |c: &Captures<'_>| self.method_replacer(c))
                    .into_owned();
                line = Cow::Owned(replaced);
            } else if let Some(method) = self.current_method.clone() {
                let class_name = self.current_class_name.clone().unwrap_or_default();
                if let Some(caps) = LINE_REGEX.captures(&line) {
                    let lineno_str = &caps["lineno"];
                    let mapped = lineno_str
                        .parse::<u32>()
                        .ok()
                        .and_then(|lineno| iodi.map_iodi(debug_line_map, &class_name, &method, lineno).0)
                        .filter(|mapped| *mapped != 0);
                    if let Some(mapped_line) = mapped {
                        if !self.all_line_info && self.last_lineno == Some(mapped_line) {
                            debug!("Suppressing repeated line {} in {}.{}", mapped_line, class_name, method);
                            return Ok(Symbolicated::Suppressed);
                        }
                        self.last_lineno = Some(mapped_line);
                        let decoded = self.decode_positions_at(mapped_line as i64 - 1)?;
                        return Ok(Symbolicated::Line(format!(
                            "{}{}{}\n",
                            LINE_INDENT,
                            &caps["prefix"],
                            self.line_info(lineno_str, &decoded)
                        )));
                    }
                }

                let no_debug_info = self.prev_line.as_deref().is_some_and(|prev| prev.contains(POSITIONS_MARKER))
                    && line.contains(LOCALS_MARKER);
                if no_debug_info {
                    let Some(mappings) = iodi.map_iodi_no_debug_to_mappings(debug_line_map, &class_name, &method)
                    else {
                        return Ok(Symbolicated::Line(line.into_owned()));
                    };
                    debug!("Expanding {} positions for {}.{}", mappings.len(), class_name, method);
                    let mut block = Vec::with_capacity(mappings.len() + 1);
                    for (i, mapping) in mappings.iter().enumerate() {
                        let decoded = self.decode_positions_at(mapping.line as i64 - 1)?;
                        let pc = if i == 0 { 0 } else { mapping.offset };
                        block.push(format!("{}{:#06x} line={}\n", LINE_INDENT, pc, decoded.join(", ")));
                    }
                    block.push(line.into_owned());
                    return Ok(Symbolicated::Block(block));
                }
            }

            if CLS_CHUNK_HDR_REGEX.is_match(&line) {
                // Only method sub-sections keep the class context; anything
                // else is skipped until the next methods header
                let reading_methods = line.contains("Direct methods") || line.contains("Virtual methods");
                if !reading_methods {
                    self.reset_state();
                }
                self.reading_methods = reading_methods;
            } else if CLS_HDR_REGEX.is_match(&line) {
                self.reset_state();
            }
        }

        let line = CLASS_REGEX.replace_all(&line, |c: &Captures<'_>| self.class_replacer(c));
        let line = try_replace_all(&LINE_REGEX, &line, |c| self.line_replacer(c))?;
        Ok(Symbolicated::Line(line))
    }
}

impl LineSymbolicator for DexdumpSymbolicator<'_> {
    fn symbolicate(&mut self, line: &str) -> Result<Symbolicated, SymbolicatorError> {
        DexdumpSymbolicator::symbolicate(self, line)
    }

    fn name(&self) -> &'static str {
        "DexdumpSymbolicator"
    }
}
