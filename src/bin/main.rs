use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use sm64_extract::extract::{ExtractOptions, Extractor, ScanEvent};
use sm64_extract::mio0::BackrefPolicy;
use sm64_extract::rom::Rom;
use sm64_extract::sequence;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sm64-extract", version)]
#[command(about = "Extract MIO0 blocks and audio sequences from SM64 ROMs", long_about = None)]
struct Cli {
    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a ROM for MIO0 blocks and write each one decompressed
    Mio0 {
        /// ROM image (.z64, .v64 or .n64)
        rom: PathBuf,

        /// Output directory [default: the ROM's directory]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Decode blocks on all cores
        #[arg(short, long)]
        parallel: bool,

        /// Fail blocks with back-references before the start of the output
        /// instead of clamping them
        #[arg(long)]
        strict_backrefs: bool,

        /// Only print the summary line
        #[arg(short, long)]
        quiet: bool,
    },

    /// Read the audio sequence bank
    Sequences {
        #[command(subcommand)]
        command: SequenceCommands,
    },
}

#[derive(Args)]
struct RomArgs {
    /// ROM image (.z64, .v64 or .n64)
    rom: PathBuf,

    /// Read the ROM even if its title isn't SUPER MARIO 64
    #[arg(long)]
    force: bool,
}

#[derive(Subcommand)]
enum SequenceCommands {
    /// List every sequence in the bank
    List {
        #[command(flatten)]
        rom: RomArgs,
    },

    /// Write hex dumps of sequences, one file each
    Dump {
        #[command(flatten)]
        rom: RomArgs,

        /// Output directory
        destination: PathBuf,

        /// Only dump this sequence id (hex, e.g. 0x1A)
        #[arg(long, value_parser = parse_id)]
        id: Option<usize>,
    },

    /// Write the byte range of every sequence
    Ranges {
        #[command(flatten)]
        rom: RomArgs,

        /// Output file [default: stdout]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_id(s: &str) -> Result<usize, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    usize::from_str_radix(digits, 16).map_err(|err| format!("invalid sequence id {:?}: {}", s, err))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn extract_mio0(
    rom_path: &Path,
    output: Option<PathBuf>,
    parallel: bool,
    strict_backrefs: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let rom = Rom::open(rom_path)?;
    if !quiet {
        println!(
            "Opened ROM: {}",
            rom_path.file_name().unwrap_or_default().to_string_lossy()
        );
    }

    let output_dir = output.unwrap_or_else(|| {
        rom_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let policy = if strict_backrefs {
        BackrefPolicy::Strict
    } else {
        BackrefPolicy::Clamp
    };
    let options = ExtractOptions::new(output_dir)
        .with_backref_policy(policy)
        .with_parallel(parallel);

    let report = Extractor::new(options).run(rom.as_bytes(), &mut |event: &ScanEvent| {
        // Rejections only show up in the trace log
        if !quiet && !matches!(event, ScanEvent::Rejected { .. }) {
            println!("{}", event);
        }
    });

    if quiet {
        println!("{}", report.summary());
    }

    Ok(())
}

fn open_sm64(args: &RomArgs) -> anyhow::Result<Rom> {
    let rom = Rom::open(&args.rom)?;
    if !args.force && !rom.looks_like_sm64() {
        bail!(
            "{} does not look like SM64 (title is {:?}); use --force to read it anyway",
            args.rom.display(),
            rom.title()
        );
    }
    Ok(rom)
}

impl SequenceCommands {
    fn execute(&self) -> anyhow::Result<()> {
        match self {
            SequenceCommands::List { rom } => {
                let rom = open_sm64(rom)?;
                let bank = sequence::parse(rom.as_bytes())?;
                if bank.entries.is_empty() {
                    println!("No sequences found.");
                }
                for entry in &bank.entries {
                    println!("{}", entry);
                }
            }
            SequenceCommands::Dump {
                rom,
                destination,
                id,
            } => {
                let rom = open_sm64(rom)?;
                let bank = sequence::parse(rom.as_bytes())?;
                std::fs::create_dir_all(destination)
                    .with_context(|| format!("creating {}", destination.display()))?;

                match id {
                    Some(id) => {
                        let entry = bank
                            .get(*id)
                            .with_context(|| format!("no sequence with id {:02X}", id))?;
                        let path = sequence::export_one(rom.as_bytes(), entry, destination)?;
                        println!("Saved: {}", path.display());
                    }
                    None => {
                        let written = sequence::export_all(rom.as_bytes(), &bank, destination);
                        println!(
                            "Exported {} sequences to {}",
                            written,
                            destination.display()
                        );
                    }
                }
            }
            SequenceCommands::Ranges { rom, output } => {
                let rom = open_sm64(rom)?;
                let bank = sequence::parse(rom.as_bytes())?;

                match output {
                    Some(path) => {
                        let mut file = BufWriter::new(
                            File::create(path)
                                .with_context(|| format!("creating {}", path.display()))?,
                        );
                        sequence::export_ranges(&bank.entries, &mut file)?;
                        file.flush()?;
                        println!("Saved ranges to {}", path.display());
                    }
                    None => {
                        let stdout = std::io::stdout();
                        sequence::export_ranges(&bank.entries, &mut stdout.lock())?;
                    }
                }
            }
        }

        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Mio0 {
            rom,
            output,
            parallel,
            strict_backrefs,
            quiet,
        } => extract_mio0(&rom, output, parallel, strict_backrefs, quiet),
        Commands::Sequences { command } => command.execute(),
    }
}
