use std::collections::VecDeque;

use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::symbol_files::SymbolMaps;
use crate::symbolicate::{switch_count, try_replace_all, LineSymbolicator, Symbolicated};
use crate::types::{Position, PseudoPosition, SymbolicatorError};

static CLASS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z][0-9A-Za-z_$]*\.[0-9A-Za-z_$.]+\b").unwrap());

static TRACE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?m)^(?P<prefix>.*)\s+at (?P<class>[A-Za-z][0-9A-Za-z_$]*\.[0-9A-Za-z_$.]+)",
        r"\.(?P<method>[0-9A-Za-z_$<>]+)\(((Unknown Source)?:(?P<lineno>[0-9]+))?\)\s*\n",
    ))
    .unwrap()
});

static LOGCAT_LINE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]/[A-Za-z0-9_$](\s*[0-9]+):").unwrap());

#[derive(Debug, Clone)]
struct PendingSwitch {
    prefix: String,
    line: u32,
}

/// Rewrites Java stack traces in `adb logcat` output.
///
/// A frame whose line number points at a `switch` position is resolved by a
/// later frame carrying the matching `pattern`, so switches stay pending
/// across lines.
pub struct LogcatSymbolicator<'a> {
    symbol_maps: &'a SymbolMaps,
    pending_switches: Vec<PendingSwitch>,
}

impl<'a> LogcatSymbolicator<'a> {
    pub fn new(symbol_maps: &'a SymbolMaps) -> Self {
        LogcatSymbolicator {
            symbol_maps,
            pending_switches: vec![],
        }
    }

    pub fn is_likely_logcat(line: &str) -> bool {
        line.starts_with("--------- beginning of") || LOGCAT_LINE_REGEX.is_match(line)
    }

    /// Looks up the positions of the case for `pattern_id` in the switch
    /// table at `start`. Cases follow the count entry sorted by pattern id.
    fn find_case_positions(&self, start: u32, pattern_id: u32) -> Result<Option<Vec<Position>>, SymbolicatorError> {
        let line_map = &self.symbol_maps.line_map;
        let count = switch_count(line_map, start)?;
        let mut lo = start as i64 + 1;
        let mut hi = start as i64 + count as i64;
        while lo <= hi {
            let middle = (lo + hi) / 2;
            let mut case_positions = line_map.get_stack(middle);
            let case_line = match case_positions.first() {
                Some(first) if first.pseudo() == Some(PseudoPosition::Case) => first.line,
                _ => return Err(SymbolicatorError::MalformedCase { index: middle as u32 }),
            };
            if case_line == pattern_id {
                case_positions.remove(0);
                return Ok(Some(case_positions));
            } else if case_line < pattern_id {
                lo = middle + 1;
            } else {
                hi = middle - 1;
            }
        }
        Ok(None)
    }

    // Without a debug info item frames carry no line number, e.g. `at X.OPu.A04()`
    fn replace_frame_without_lineno(&self, caps: &Captures<'_>) -> String {
        let class_name = &caps["class"];
        let method_name = &caps["method"];
        match self.symbol_maps.class_map.get(class_name) {
            Some(mapping) => {
                let method = mapping
                    .method_mapping
                    .get(method_name)
                    .map(String::as_str)
                    .unwrap_or(method_name);
                format!("{}\tat {}.{}()\n", &caps["prefix"], mapping.origin_class, method)
            }
            None => caps[0].to_string(),
        }
    }

    fn replace_frame(&mut self, caps: &Captures<'_>) -> Result<String, SymbolicatorError> {
        let Some(lineno) = caps.name("lineno").and_then(|l| l.as_str().parse::<u32>().ok()) else {
            return Ok(self.replace_frame_without_lineno(caps));
        };
        let symbol_maps = self.symbol_maps;
        let prefix = &caps["prefix"];
        let method_name = &caps["method"];
        let mut cls = &caps["class"];
        debug!("Starting with {}:{}", cls, lineno);

        let mut lineno = lineno;
        if let Some((iodi, debug_line_map)) = symbol_maps.iodi() {
            let (mapped_lineno, _) = iodi.map_iodi(debug_line_map, cls, method_name, lineno);
            lineno = mapped_lineno.filter(|l| *l != 0).unwrap_or(lineno);
            debug!("IODI mapped_lineno={:?} lineno={}", mapped_lineno, lineno);
        }
        let mut positions: VecDeque<Position> = symbol_maps.line_map.get_stack(lineno as i64 - 1).into();
        if let Some(mapping) = symbol_maps.class_map.get(cls) {
            cls = mapping.origin_class.as_str();
            debug!("Class-map: cls={}", cls);
        }

        let mut result = String::new();
        while let Some(pos) = positions.pop_front() {
            match pos.pseudo() {
                Some(PseudoPosition::Switch) => {
                    debug!("Switch position: {} {}", prefix, pos.line);
                    self.pending_switches.push(PendingSwitch { prefix: prefix.to_string(), line: pos.line });
                }
                Some(PseudoPosition::Pattern) => {
                    debug!("Switch pattern: {}", pos.line);
                    let pattern_id = pos.line;
                    if let Some(pending) = self.pending_switches.pop() {
                        debug!("Resolving against switch at {} from {}", pending.line, pending.prefix.trim());
                        if let Some(case_positions) = self.find_case_positions(pending.line, pattern_id)? {
                            if !case_positions.is_empty() {
                                let rest = std::mem::take(&mut positions);
                                positions = case_positions.into_iter().chain(rest).collect();
                                continue;
                            }
                        }
                    }
                    result.push_str(&format!("{}\t$(unresolved switch {})\n", prefix, pattern_id));
                }
                _ => match &pos.method {
                    None => {
                        debug!("Position without method");
                        result.push_str(&format!(
                            "{}\tat {}.{}({}:{})\n",
                            prefix, cls, method_name, pos.file, pos.line
                        ));
                    }
                    Some(method) => {
                        debug!("Position with method: {}/{}:{}", method, pos.file, pos.line);
                        result.push_str(&format!("{}\tat {}({}:{})\n", prefix, method, pos.file, pos.line));
                    }
                },
            }
        }
        Ok(result)
    }

    pub fn symbolicate(&mut self, line: &str) -> Result<Symbolicated, SymbolicatorError> {
        let symbol_maps = self.symbol_maps;
        let class_map = &symbol_maps.class_map;
        // dotted names first, frames are matched against the renamed text
        let line = CLASS_REGEX.replace_all(line, |c: &Captures<'_>| {
            let m = &c[0];
            class_map.get(m).map(|mapping| mapping.origin_class.clone()).unwrap_or_else(|| m.to_string())
        });
        let line = try_replace_all(&TRACE_REGEX, &line, |c| self.replace_frame(c))?;
        Ok(Symbolicated::Line(line))
    }
}

impl LineSymbolicator for LogcatSymbolicator<'_> {
    fn symbolicate(&mut self, line: &str) -> Result<Symbolicated, SymbolicatorError> {
        LogcatSymbolicator::symbolicate(self, line)
    }

    fn name(&self) -> &'static str {
        "LogcatSymbolicator"
    }
}
