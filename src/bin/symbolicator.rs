use std::error::Error;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::{error, info, warn, LevelFilter};

use symbolicator::maps::class_map::read_class_map;
use symbolicator::maps::iodi::IodiMetadata;
use symbolicator::symbolicate::{DexdumpSymbolicator, LinesSymbolicator, LogcatSymbolicator};
use symbolicator::{LineSymbolicator, SymbolFiles, SymbolMaps};

/// Android symbolicator for redex-optimized builds.
///
/// Supports logcat and dexdump inputs when piped to stdin, e.g.
/// `adb logcat | symbolicator --artifacts /path/to/artifacts/` or
/// `dexdump -d secondary-1.dex | symbolicator --artifacts /path/to/artifacts/`.
#[derive(Debug, Parser)]
#[command(name = "symbolicator", version, about)]
struct Cli {
    /// Buck target that has been built. Slow, as it queries buck, and the
    /// working directory has to be inside the buck project.
    #[arg(long)]
    target: Option<String>,

    /// Artifact directory holding the symbol files,
    /// e.g. ~/buckrepo/buck-out/gen/path/to/app/artifacts/
    #[arg(long, value_name = "DIR")]
    artifacts: Option<PathBuf>,

    /// Kind of input; sniffed from the first line when omitted.
    #[arg(long, value_enum)]
    input_type: Option<InputType>,

    /// Drop lines that could not be symbolicated (lines input only).
    #[arg(long)]
    skip_unsymbolicated: bool,

    /// Keep synthetic line numbers next to decoded dexdump positions.
    #[arg(long)]
    all_line_info: bool,

    /// Logging level: critical, error, warn, warning, info, debug or trace.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the given iodi-metadata file as JSON and exit.
    #[arg(long, value_name = "FILE")]
    dump_iodi: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputType {
    Logcat,
    Dexdump,
    Lines,
}

fn init_logging(level: &str) -> Result<(), String> {
    let level = match level.to_ascii_lowercase().as_str() {
        "critical" | "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        other => return Err(format!("Unknown log level {}", other)),
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .init();
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    // Do everything else with the error trap
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn dump_iodi(path: &Path) -> Result<(), Box<dyn Error>> {
    let metadata = IodiMetadata::read_from(path)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &metadata)?;
    writeln!(out)?;
    Ok(())
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

fn pump<S, R, W>(symbolicator: &mut S, first_line: &str, reader: &mut R, out: &mut W) -> Result<(), Box<dyn Error>>
where
    S: LineSymbolicator + ?Sized,
    R: BufRead,
    W: Write,
{
    info!("Using {}", symbolicator.name());
    symbolicator.symbolicate(first_line)?.write_to(out)?;
    let mut buf = vec![];
    while let Some(line) = read_line(reader, &mut buf)? {
        symbolicator.symbolicate(&line)?.write_to(out)?;
    }
    out.flush()?;
    Ok(())
}

/* This is where all the processing takes place, to make error handling easier */
fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    if let Some(path) = &cli.dump_iodi {
        return dump_iodi(path);
    }

    if cli.skip_unsymbolicated && cli.input_type != Some(InputType::Lines) {
        warn!("'--skip-unsymbolicated' is not needed, it only works with '--input-type lines'");
    }

    let symbol_files = if let Some(dir) = &cli.artifacts {
        SymbolFiles::from_artifact_dir(dir)
    } else if let Some(target) = &cli.target {
        SymbolFiles::from_buck_target(target)?
    } else {
        return Err("Unable to find symbol files used to symbolicate input! Try passing --target or --artifacts.".into());
    };

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let mut buf = vec![];
    let Some(first_line) = read_line(&mut reader, &mut buf)? else {
        warn!("Empty input");
        return Ok(());
    };

    if cli.input_type == Some(InputType::Lines) {
        let class_map = read_class_map(&symbol_files.extracted_symbols)?;
        let mut symbolicator = LinesSymbolicator::new(&class_map, cli.skip_unsymbolicated);
        return pump(&mut symbolicator, &first_line, &mut reader, &mut out);
    }

    let symbol_maps = SymbolMaps::load(&symbol_files)?;
    let input_type = match cli.input_type {
        Some(kind) => kind,
        None if LogcatSymbolicator::is_likely_logcat(&first_line) => InputType::Logcat,
        None if DexdumpSymbolicator::is_likely_dexdump(&first_line) => InputType::Dexdump,
        None => {
            warn!("Could not figure out input kind, assuming logcat");
            InputType::Logcat
        }
    };
    let mut symbolicator: Box<dyn LineSymbolicator + '_> = match input_type {
        InputType::Dexdump => Box::new(DexdumpSymbolicator::new(&symbol_maps, cli.all_line_info)),
        _ => Box::new(LogcatSymbolicator::new(&symbol_maps)),
    };
    pump(symbolicator.as_mut(), &first_line, &mut reader, &mut out)
}
