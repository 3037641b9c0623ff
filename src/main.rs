use chrono::Local;
use clap::{Parser, Subcommand};
use log::info;
use squish::render::csv::HashWidth;
use squish::render::dump::{dump, DumpOptions};
use squish::render::{csv, mbox};
use squish::{decode_header, sqi, ByteSource, MboxOptions, Result, SquishError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "squish", version, about = "Read FidoNet Squish message bases")]
struct Cli {
    /// Log progress at info level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a CSV index of the messages, newest first
    Index {
        /// Message base, with or without the .sqd extension
        base: PathBuf,
        /// Accumulate fingerprints in 64 bits, as indexes built on LP64 hosts do
        #[arg(long)]
        wide_hash: bool,
    },
    /// Convert the messages to a Unix mbox file
    Mbox {
        input:  PathBuf,
        output: PathBuf,
        /// Write bytes above 0x7E unchanged instead of as =NNN
        #[arg(long)]
        keep_high_bit: bool,
        /// Copy control lines into each message body
        #[arg(long)]
        control_lines: bool,
    },
    /// Dump every header, frame and message record
    Dump {
        input: PathBuf,
        /// Emit JSON Lines instead of text
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the .sqi index for a base
    Sqi {
        input:  PathBuf,
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version also arrive here and are not failures.
            let code = match e.print() {
                Ok(()) if e.use_stderr() => 64,
                Ok(()) => 0,
                Err(_) => 74,
            };
            return ExitCode::from(code);
        }
    };

    env_logger::Builder::new()
        .filter_level(if cli.verbose { log::LevelFilter::Info } else { log::LevelFilter::Warn })
        .parse_default_env()
        .init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("squish: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {

        // ── Index ────────────────────────────────────────────────────────────
        Commands::Index { base, wide_hash } => {
            let path = resolve_base(&base);
            let mut source = open_source(&path)?;
            let header = decode_header(&mut source)?;
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            let width = if wide_hash { HashWidth::Bits64 } else { HashWidth::Bits32 };
            let rows = csv::render_index_in(&mut source, &header, &mut out, &Local, width)?;
            out.flush()?;
            info!("indexed {rows} message(s) from {}", path.display());
        }

        // ── Mbox ─────────────────────────────────────────────────────────────
        Commands::Mbox { input, output, keep_high_bit, control_lines } => {
            ensure_distinct(&input, &output)?;
            let mut source = open_source(&input)?;
            let header = decode_header(&mut source)?;
            let options = MboxOptions {
                strip_high_bit: !keep_high_bit,
                control_lines,
                ..MboxOptions::default()
            };
            let mut out = BufWriter::new(File::create(&output).map_err(|e| with_path(&output, e))?);
            let summary = mbox::export(&mut source, &header, &mut out, options)?;
            out.flush()?;
            println!("Converted {} message(s) to {}", summary.converted, output.display());
        }

        // ── Dump ─────────────────────────────────────────────────────────────
        Commands::Dump { input, json } => {
            let mut source = open_source(&input)?;
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            dump(&mut source, &mut out, &DumpOptions { json })?;
            out.flush()?;
        }

        // ── Sqi ──────────────────────────────────────────────────────────────
        Commands::Sqi { input, output } => {
            ensure_distinct(&input, &output)?;
            if output.exists() {
                return Err(SquishError::Usage(format!(
                    "{} already exists; delete it before rebuilding the index",
                    output.display()
                )));
            }
            let mut source = open_source(&input)?;
            let header = decode_header(&mut source)?;
            header.require_frame_header_size()?;
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&output)
                .map_err(|e| with_path(&output, e))?;
            let mut out = BufWriter::new(file);
            let records = sqi::write_index(&mut source, &header, &mut out)?;
            out.flush()?;
            println!("Wrote {records} index record(s) to {}", output.display());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Accept `name` or `name.sqd`.
fn resolve_base(base: &Path) -> PathBuf {
    let has_ext = base
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("sqd"));
    if has_ext {
        return base.to_path_buf();
    }
    let mut with_ext = base.as_os_str().to_owned();
    with_ext.push(".sqd");
    let with_ext = PathBuf::from(with_ext);
    if !with_ext.exists() && base.exists() {
        base.to_path_buf()
    } else {
        with_ext
    }
}

fn open_source(path: &Path) -> Result<ByteSource<BufReader<File>>> {
    let file = File::open(path).map_err(|e| with_path(path, e))?;
    Ok(ByteSource::new(BufReader::new(file))?)
}

fn ensure_distinct(input: &Path, output: &Path) -> Result<()> {
    let same = input == output
        || matches!((fs::canonicalize(input), fs::canonicalize(output)), (Ok(a), Ok(b)) if a == b);
    if same {
        return Err(SquishError::Usage(format!(
            "output file {} must not be the same as the input file",
            output.display()
        )));
    }
    Ok(())
}

fn with_path(path: &Path, e: io::Error) -> SquishError {
    SquishError::Io(io::Error::new(e.kind(), format!("{}: {e}", path.display())))
}
