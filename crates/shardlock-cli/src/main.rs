//! shardlock command-line entrypoint.
//!
//! - `shardlock encode <INPUT_DIR> [OUTPUT_DIR]...` - split a directory into
//!   N collections with K-of-N threshold security
//! - `shardlock decode <INPUT_DIR>... <OUTPUT_DIR>` - reconstruct the
//!   directory from any K collections
//!
//! Exit code 0 on success, 1 on any reported error.

#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use shardlock_engine::{DecodeOptions, EncodeOptions, SizeReport};
use shardlock_io::Format;
use shardlock_pad::{DEFAULT_CHUNK_SIZE, MAX_COLLECTIONS, MIN_COLLECTIONS};
use shardlock_rng::MultiRng;

/// K-of-N threshold one-time-pad archival codec.
#[derive(Parser)]
#[command(name = "shardlock")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable detailed debug output.
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a directory into N collections with K-of-N threshold security.
    ///
    /// Any K collections reconstruct the input; any K-1 are statistically
    /// indistinguishable from random noise. With several output directories
    /// the collection count is inferred from their number and one collection
    /// lands in each.
    ///
    /// Example: shardlock encode ./secrets ./out --copies 5 --required 3
    Encode(EncodeArgs),

    /// Reconstruct the original directory from K or more collections.
    ///
    /// Inputs may be collection directories, directories containing
    /// collections, or per-collection tar archives. The scheme parameters
    /// are recovered from the collections themselves.
    ///
    /// Example: shardlock decode ./out ./restored
    Decode(DecodeArgs),
}

#[derive(Args)]
struct EncodeArgs {
    /// Directory containing the data to encode.
    input_dir: PathBuf,

    /// One output directory, or one directory per collection.
    output_dirs: Vec<PathBuf>,

    /// Number of collections to create (2-26); inferred when several output
    /// directories are given.
    #[arg(long)]
    copies: Option<usize>,

    /// Minimum collections required for reconstruction (default 2, or the
    /// collection count when several output directories are given).
    #[arg(long)]
    required: Option<usize>,

    /// Output format for chunk files.
    #[arg(long, value_enum, default_value_t = FormatArg::Png)]
    format: FormatArg,

    /// Clear output directories if not empty.
    #[arg(long)]
    clear: bool,

    /// Maximum chunk size in bytes.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk: usize,

    /// Write individual chunk files instead of one tar per collection.
    #[arg(long)]
    files: bool,

    /// Compute and report sizes without writing output files.
    #[arg(long)]
    dryrun: bool,
}

#[derive(Args)]
struct DecodeArgs {
    /// Collection directories, followed by the output directory (which may
    /// be omitted with --dryrun).
    #[arg(required = true)]
    dirs: Vec<PathBuf>,

    /// Clear the output directory if not empty.
    #[arg(long)]
    clear: bool,

    /// Compute and report sizes without writing output files.
    #[arg(long)]
    dryrun: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Bin,
    Png,
}

impl From<FormatArg> for Format {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Bin => Self::Bin,
            FormatArg::Png => Self::Png,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for reports.
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match cli.command {
        Commands::Encode(args) => run_encode(args),
        Commands::Decode(args) => run_decode(args),
    }
}

fn run_encode(args: EncodeArgs) -> anyhow::Result<()> {
    let multi = args.output_dirs.len() > 1;
    let total = if multi {
        if let Some(copies) = args.copies {
            if copies != args.output_dirs.len() {
                bail!(
                    "number of output directories ({}) does not match --copies {}",
                    args.output_dirs.len(),
                    copies
                );
            }
        }
        args.output_dirs.len()
    } else {
        args.copies.unwrap_or(2)
    };
    let required = args.required.unwrap_or(if multi { total } else { 2 });

    if !(MIN_COLLECTIONS..=MAX_COLLECTIONS).contains(&total) {
        bail!("--copies must be between {MIN_COLLECTIONS} and {MAX_COLLECTIONS}, got {total}");
    }
    if required < MIN_COLLECTIONS {
        bail!("--required must be at least {MIN_COLLECTIONS}, got {required}");
    }
    if required > total {
        bail!("--required {required} cannot exceed the number of collections {total}");
    }
    if args.output_dirs.is_empty() && !args.dryrun {
        bail!("at least one output directory must be specified");
    }

    let mut options = EncodeOptions::new(args.input_dir, args.output_dirs);
    options.total = total;
    options.required = required;
    options.format = args.format.into();
    options.chunk_size = args.chunk;
    options.clear = args.clear;
    options.archive = !args.files;
    options.dry_run = args.dryrun;

    let rng = MultiRng::with_default_sources().context("entropy initialisation failed")?;
    let report = shardlock_engine::encode(&options, &rng).context("encode failed")?;

    if let Some(sizes) = &report.sizes {
        print_size_report(sizes);
    } else {
        println!(
            "encoded {} chunks into {} collections ({} ms)",
            report.chunks,
            report.collections.len(),
            report.elapsed_ms
        );
        for output in &report.collections {
            println!("  {}  {}", output.label, output.path.display());
        }
        if let Some(verification) = &report.png_verification {
            if verification.failures > 0 {
                println!(
                    "warning: {} of {} png wrappers failed verification",
                    verification.failures, verification.files
                );
            }
        }
    }
    Ok(())
}

fn run_decode(args: DecodeArgs) -> anyhow::Result<()> {
    let (input_dirs, output_dir) = if args.dirs.len() >= 2 {
        let mut dirs = args.dirs;
        let output = dirs
            .pop()
            .context("an output directory is required")?;
        (dirs, output)
    } else if args.dryrun {
        (args.dirs, PathBuf::from("dryrun-output"))
    } else {
        bail!("decode needs at least one input directory and an output directory");
    };

    let mut options = DecodeOptions::new(input_dirs, output_dir);
    options.clear = args.clear;
    options.dry_run = args.dryrun;

    let report = shardlock_engine::decode(&options).context("decode failed")?;

    if args.dryrun {
        println!("*** DRY RUN SIZE REPORT ***");
        println!("Collections found:        {}", report.collections.join(", "));
        println!("Decoded stream size:      {} bytes", report.decoded_bytes);
        println!("Decompressed output size: {} bytes", report.output_bytes);
        println!("***");
    } else {
        println!(
            "decoded {} chunks, restored {} files ({} ms)",
            report.chunks, report.files, report.elapsed_ms
        );
    }
    Ok(())
}

fn print_size_report(sizes: &SizeReport) {
    println!("*** DRY RUN SIZE REPORT ***");
    println!("Original input size:           {} bytes", sizes.input_bytes);
    println!(
        "Compressed input size:         {} bytes",
        sizes.compressed_bytes
    );
    println!("Compression ratio:             {:.2}%", sizes.compression_ratio());
    println!(
        "Each collection size:          {} bytes",
        sizes.each_collection_bytes()
    );
    println!(
        "Total size of all collections: {} bytes",
        sizes.total_collection_bytes
    );
    println!("Expansion ratio:               {:.2}%", sizes.expansion_ratio());
    println!("***");
}
