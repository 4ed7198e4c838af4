//! CLI entry point for the memtrace replay binary.

use std::env;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::iter::Peekable;
use std::path::PathBuf;

use memtrace_core::{TraceConfig, TraceRange};
use memtrace_replay::{
    parse_number, parse_range, parse_script, run_replay, ReplayOptions, SharedWriter, DEFAULT_BASE,
};
#[cfg(test)]
use tempfile as _;
use thiserror as _;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

const USAGE_TEXT: &str = "\
Usage: memtrace-replay <command> [options]

Commands:
  run <image> -s <script> [options]  Replay a guest access script over an image

Options:
  -b, --base <addr>          Image load address (default: 0x40000000)
  -s, --script <file>        Access script (required)
      --trace-read [b:e]     Trace reads, optionally only inside [b, e]
      --trace-write [b:e]    Trace writes, optionally only inside [b, e]
  -o, --output <file>        Write trace lines to a file (default: stdout)
  -v, --verbose              Debug logging on stderr
  -h, --help                 Show this help message

Without --trace-read or --trace-write both directions are traced everywhere.

Examples:
  memtrace-replay run firmware.bin -s accesses.trace
  memtrace-replay run firmware.bin -s accesses.trace --trace-write 0x40000000:0x40000fff
";

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    image: PathBuf,
    script: PathBuf,
    base: u64,
    trace: TraceConfig,
    output: Option<PathBuf>,
    verbose: bool,
}

#[derive(Debug)]
enum ParseResult {
    Run(RunArgs),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "run" => parse_run_args(args).map(ParseResult::Run),
        other => Err(format!("unknown command: {other}")),
    }
}

/// Consumes the next argument only when it parses as a `b:e` window.
fn optional_range<I>(args: &mut Peekable<I>) -> TraceRange
where
    I: Iterator<Item = OsString>,
{
    let range = args
        .peek()
        .and_then(|next| parse_range(&next.to_string_lossy()));
    if range.is_some() {
        args.next();
    }
    range.unwrap_or(TraceRange::ALL)
}

#[allow(clippy::while_let_on_iterator)]
fn parse_run_args(args: impl Iterator<Item = OsString>) -> Result<RunArgs, String> {
    let mut args = args.peekable();
    let mut image: Option<PathBuf> = None;
    let mut script: Option<PathBuf> = None;
    let mut base = DEFAULT_BASE;
    let mut trace = TraceConfig::default();
    let mut output: Option<PathBuf> = None;
    let mut verbose = false;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            verbose = true;
            continue;
        }

        if arg == "-s" || arg == "--script" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --script".to_string())?;
            script = Some(PathBuf::from(value));
            continue;
        }

        if arg == "-o" || arg == "--output" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --output".to_string())?;
            output = Some(PathBuf::from(value));
            continue;
        }

        if arg == "-b" || arg == "--base" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --base".to_string())?;
            let text = value.to_string_lossy();
            base = parse_number(&text).ok_or_else(|| format!("invalid base address: {text}"))?;
            continue;
        }

        if arg == "--trace-read" {
            trace.read = Some(optional_range(&mut args));
            continue;
        }

        if arg == "--trace-write" {
            trace.write = Some(optional_range(&mut args));
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if image.is_some() {
            return Err("multiple image paths provided".to_string());
        }
        image = Some(PathBuf::from(arg));
    }

    let image = image.ok_or_else(|| "missing image path".to_string())?;
    let script = script.ok_or_else(|| "missing --script".to_string())?;
    if trace.is_disabled() {
        trace = TraceConfig::all();
    }
    Ok(RunArgs {
        image,
        script,
        base,
        trace,
        output,
        verbose,
    })
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn open_sink(output: Option<&PathBuf>) -> io::Result<Box<dyn Write>> {
    match output {
        Some(path) => Ok(Box::new(BufWriter::new(File::create(path)?))),
        None => Ok(Box::new(io::stdout())),
    }
}

fn run(args: &RunArgs) -> Result<(), i32> {
    let image = fs::read(&args.image).map_err(|e| {
        eprintln!("error: failed to read {}: {e}", args.image.display());
        1
    })?;
    let source = fs::read_to_string(&args.script).map_err(|e| {
        eprintln!("error: failed to read {}: {e}", args.script.display());
        1
    })?;
    let script = parse_script(&source).map_err(|e| {
        eprintln!("{}:{}: error: {e}", args.script.display(), e.line());
        1
    })?;
    let sink = open_sink(args.output.as_ref()).map_err(|e| {
        eprintln!("error: failed to open output: {e}");
        1
    })?;
    debug!(
        image = %args.image.display(),
        directives = script.len(),
        "starting replay"
    );

    let writer = SharedWriter::new(sink);
    let options = ReplayOptions {
        base: args.base,
        trace: args.trace,
    };
    let result = run_replay(&image, &script, &options, |_| writer.clone());

    if let Err(e) = writer.clone().flush() {
        eprintln!("error: failed to flush output: {e}");
        return Err(1);
    }

    result.map(|_| ()).map_err(|e| {
        error!(error = %e, "replay aborted");
        eprintln!("{}: error: {e}", args.script.display());
        1
    })
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Run(args)) => {
            init_logging(args.verbose);
            match run(&args) {
                Ok(()) => 0,
                Err(code) => code,
            }
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}
