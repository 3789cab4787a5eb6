//! htj2k CLI - HTJ2K code-block codec utility.
//!
//! Operates on single code-blocks: raw little-endian i32 coefficient
//! files on one side, HT codestream segments on the other. Useful for
//! inspecting and debugging block segments outside a full pipeline.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use htj2k_rs::htj2k::block_coder::{new_block_codec, BlockCodecKind};
use htj2k_rs::htj2k::segment::{self, ParsedSegment};

/// HTJ2K code-block entropy coder
#[derive(Parser)]
#[command(name = "htj2k")]
#[command(author = "htj2k-rs contributors")]
#[command(version)]
#[command(about = "Encode, decode, and inspect HTJ2K code-block segments", long_about = None)]
#[command(after_help = "EXAMPLES:
    htj2k encode -i block.i32 -o block.htseg -w 64 -H 64
    htj2k decode -i block.htseg -o block.i32 -w 64 -H 64
    htj2k info -i block.htseg

Coefficient files hold width*height little-endian i32 values in
row-major order.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a raw coefficient block into an HT segment
    #[command(visible_alias = "e")]
    Encode {
        /// Input raw coefficient file (little-endian i32)
        #[arg(short, long)]
        input: PathBuf,

        /// Output segment file
        #[arg(short, long)]
        output: PathBuf,

        /// Block width (power of two)
        #[arg(short, long)]
        width: usize,

        /// Block height (power of two)
        #[arg(short = 'H', long)]
        height: usize,

        /// Store the block uncompressed (Scup = 0 passthrough)
        #[arg(long)]
        raw: bool,
    },

    /// Decode an HT segment back into raw coefficients
    #[command(visible_alias = "d")]
    Decode {
        /// Input segment file
        #[arg(short, long)]
        input: PathBuf,

        /// Output raw coefficient file (little-endian i32)
        #[arg(short, long)]
        output: PathBuf,

        /// Block width (power of two)
        #[arg(short, long)]
        width: usize,

        /// Block height (power of two)
        #[arg(short = 'H', long)]
        height: usize,
    },

    /// Print the stream layout of an HT segment
    #[command(visible_alias = "i")]
    Info {
        /// Input segment file
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn read_coefficients(path: &PathBuf) -> Result<Vec<i32>, String> {
    let data = fs::read(path).map_err(|e| format!("reading {}: {}", path.display(), e))?;
    if data.len() % 4 != 0 {
        return Err(format!("{}: length is not a multiple of 4", path.display()));
    }
    Ok(data
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn write_coefficients(path: &PathBuf, coeffs: &[i32]) -> Result<(), String> {
    let mut out = Vec::with_capacity(coeffs.len() * 4);
    for &c in coeffs {
        out.extend_from_slice(&c.to_le_bytes());
    }
    fs::write(path, out).map_err(|e| format!("writing {}: {}", path.display(), e))
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Encode {
            input,
            output,
            width,
            height,
            raw,
        } => {
            let coeffs = read_coefficients(&input)?;
            let kind = if raw {
                BlockCodecKind::RawPassthrough
            } else {
                BlockCodecKind::HighThroughput
            };
            let codec = new_block_codec(kind, width, height).map_err(|e| e.to_string())?;
            let seg = codec.encode(&coeffs).map_err(|e| e.to_string())?;
            println!(
                "{}x{} block: {} coefficients -> {} byte segment",
                width,
                height,
                coeffs.len(),
                seg.len()
            );
            fs::write(&output, seg).map_err(|e| format!("writing {}: {}", output.display(), e))
        }
        Commands::Decode {
            input,
            output,
            width,
            height,
        } => {
            let seg = fs::read(&input).map_err(|e| format!("reading {}: {}", input.display(), e))?;
            let codec = new_block_codec(BlockCodecKind::HighThroughput, width, height)
                .map_err(|e| e.to_string())?;
            let coeffs = codec.decode(&seg).map_err(|e| e.to_string())?;
            println!(
                "{} byte segment -> {}x{} block ({} coefficients)",
                seg.len(),
                width,
                height,
                coeffs.len()
            );
            write_coefficients(&output, &coeffs)
        }
        Commands::Info { input } => {
            let seg = fs::read(&input).map_err(|e| format!("reading {}: {}", input.display(), e))?;
            match segment::parse(&seg).map_err(|e| e.to_string())? {
                ParsedSegment::Raw(data) => {
                    println!("raw passthrough segment (Scup = 0)");
                    println!("  coefficients: {} ({} bytes)", data.len() / 4, data.len());
                }
                ParsedSegment::Coded { mag_sgn, mel, vlc } => {
                    println!("coded segment, {} bytes total", seg.len());
                    println!("  MagSgn: {} bytes", mag_sgn.len());
                    println!("  MEL:    {} bytes", mel.len());
                    println!("  VLC:    {} bytes", vlc.len());
                    println!("  Scup:   {}", mel.len() + vlc.len());
                }
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            ExitCode::FAILURE
        }
    }
}
