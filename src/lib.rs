//! # Symbolicator
//!
//! Turns the output of tools run against a redex-optimized Android app back into
//! something a human can read: `dexdump` listings, `logcat` stack traces and plain
//! lists of class names.
//!
//! The optimizer leaves its symbol files in the build's artifact directory. Load
//! them with [`SymbolMaps::load`] and feed input, one line at a time, to one of the
//! symbolicators in [`symbolicate`].
//!
//! # Examples
//!
//! ```no_run
//!  use symbolicator::{SymbolFiles, SymbolMaps};
//!  use symbolicator::symbolicate::DexdumpSymbolicator;
//!  use std::path::Path;
//!
//!  let files = SymbolFiles::from_artifact_dir(Path::new("buck-out/gen/app__redex"));
//!  let maps = SymbolMaps::load(&files).unwrap();
//!  let mut symbolicator = DexdumpSymbolicator::new(&maps, false);
//!  let out = symbolicator.symbolicate("      0x0003 line=12\n").unwrap();
//!  print!("{}", out.text().unwrap_or_default());
//! ```
//!
pub mod maps;
pub mod symbol_files;
pub mod symbolicate;
mod tests;
pub mod types;

pub use symbol_files::{SymbolFiles, SymbolMaps};
pub use symbolicate::{LineSymbolicator, Symbolicated};
pub use types::{ClassMap, ClassMemberMapping, Position, PseudoPosition, SymbolicatorError};
