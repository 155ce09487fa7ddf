use std::path::{Path, PathBuf};
use std::process::Command;

use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::maps::class_map::read_class_map;
use crate::maps::debug_line_map::DebugLineMap;
use crate::maps::iodi::IodiMetadata;
use crate::maps::line_map::PositionMap;
use crate::types::{ClassMap, SymbolicatorError};

static REDEX_RULE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^//(.*_redex)").unwrap());

/// Locations of the symbol files an optimized build leaves in its artifact directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolFiles {
    pub extracted_symbols: PathBuf,
    pub line_map: PathBuf,
    pub debug_line_map: PathBuf,
    pub iodi_metadata: PathBuf,
}

impl SymbolFiles {
    pub fn from_artifact_dir(artifact_dir: &Path) -> Self {
        let line_map_v1 = artifact_dir.join("redex-line-number-map");
        let line_map_v2 = artifact_dir.join("redex-line-number-map-v2");
        let line_map = if line_map_v2.exists() { line_map_v2 } else { line_map_v1 };
        SymbolFiles {
            extracted_symbols: artifact_dir.join("redex-class-rename-map.txt"),
            line_map,
            debug_line_map: artifact_dir.join("redex-debug-line-map-v2"),
            iodi_metadata: artifact_dir.join("iodi-metadata"),
        }
    }

    /// Asks buck where `target` put its artifacts. Slow, and the working
    /// directory has to be inside the buck project.
    pub fn from_buck_target(target: &str) -> Result<Self, SymbolicatorError> {
        let artifact_dir = find_buck_artifacts(target)?;
        info!("buck target {} has artifact dir at {}", target, artifact_dir.display());
        Ok(Self::from_artifact_dir(&artifact_dir))
    }
}

fn execute_command(cmd: &str, args: &[&str]) -> Result<String, SymbolicatorError> {
    let output = Command::new(cmd).args(args).output()?;
    if !output.status.success() {
        error!("Error executing command {} {:?}", cmd, args);
        error!("stderr: {}", String::from_utf8_lossy(&output.stderr));
        return Err(SymbolicatorError::MissingSymbols(format!(
            "{} exited with {}",
            cmd, output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn find_buck_artifacts(target: &str) -> Result<PathBuf, SymbolicatorError> {
    let root = execute_command("buck", &["root"])?;
    let targets = execute_command("buck", &["targets", "--show-output", target])?;
    let rule = targets.split_whitespace().next().unwrap_or_default();
    let rule_path = REDEX_RULE_REGEX
        .captures(rule)
        .and_then(|c| c.get(1))
        .ok_or_else(|| {
            SymbolicatorError::MissingSymbols(format!("{} is not a redex rule", rule))
        })?;
    Ok(artifact_dir_for_rule(Path::new(root.trim()), rule_path.as_str()))
}

fn artifact_dir_for_rule(root: &Path, rule_path: &str) -> PathBuf {
    root.join("buck-out")
        .join("gen")
        .join(format!("{}__redex", rule_path.replace(':', "/")))
}

/// Everything a symbolicator needs to undo the optimizer's renaming and
/// line number rewriting.
#[derive(Debug, Default)]
pub struct SymbolMaps {
    pub class_map: ClassMap,
    pub line_map: PositionMap,
    pub debug_line_map: Option<DebugLineMap>,
    pub iodi_metadata: Option<IodiMetadata>,
}

impl SymbolMaps {
    pub fn new(class_map: ClassMap, line_map: PositionMap) -> Self {
        SymbolMaps {
            class_map,
            line_map,
            debug_line_map: None,
            iodi_metadata: None,
        }
    }

    pub fn with_iodi(mut self, debug_line_map: DebugLineMap, iodi_metadata: IodiMetadata) -> Self {
        self.debug_line_map = Some(debug_line_map);
        self.iodi_metadata = Some(iodi_metadata);
        self
    }

    pub fn load(files: &SymbolFiles) -> Result<Self, SymbolicatorError> {
        let class_map = read_class_map(&files.extracted_symbols)?;
        let line_map = PositionMap::read_from(&files.line_map)?;
        let debug_line_map = if files.debug_line_map.exists() {
            Some(DebugLineMap::read_from(&files.debug_line_map)?)
        } else {
            None
        };
        let iodi_metadata = if files.iodi_metadata.exists() {
            if debug_line_map.is_none() {
                return Err(SymbolicatorError::MissingSymbols(
                    "In order to symbolicate with IODI, redex-debug-line-map-v2 is required!"
                        .to_string(),
                ));
            }
            Some(IodiMetadata::read_from(&files.iodi_metadata)?)
        } else {
            None
        };
        Ok(SymbolMaps {
            class_map,
            line_map,
            debug_line_map,
            iodi_metadata,
        })
    }

    /// IODI metadata together with the debug line map it indexes into.
    pub fn iodi(&self) -> Option<(&IodiMetadata, &DebugLineMap)> {
        match (&self.iodi_metadata, &self.debug_line_map) {
            (Some(iodi), Some(dlm)) => Some((iodi, dlm)),
            _ => None,
        }
    }
}
