// CLI front-end: feed a raw code image through the translator and inspect
// the result. The core library has no CLI surface of its own; this binary is
// a consumer for debugging and triage.
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ppurec_core::ir::{Builder, IrBuilder};
use ppurec_core::{CodeImage, Segment};

#[derive(Parser)]
#[command(name = "ppurec")]
#[command(about = "PPU static binary translator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Translate a raw big-endian code image and dump the IR module
    Translate {
        /// Path to the raw image (big-endian PowerPC words)
        #[arg(short, long)]
        image: PathBuf,

        /// Guest address the image is mapped at
        #[arg(short, long, value_parser = parse_address, default_value = "0x10000")]
        base: u32,

        /// Print the IR module after optimization
        #[arg(long)]
        dump_ir: bool,

        /// Print translation statistics as JSON
        #[arg(long)]
        stats: bool,
    },
    /// Analyze only: list discovered functions and their signatures
    Analyze {
        /// Path to the raw image (big-endian PowerPC words)
        #[arg(short, long)]
        image: PathBuf,

        /// Guest address the image is mapped at
        #[arg(short, long, value_parser = parse_address, default_value = "0x10000")]
        base: u32,
    },
}

fn parse_address(text: &str) -> Result<u32, String> {
    let trimmed = text.trim_start_matches("0x").trim_start_matches("0X");
    let radix = if trimmed.len() == text.len() { 10 } else { 16 };
    u32::from_str_radix(trimmed, radix).map_err(|e| format!("invalid address '{text}': {e}"))
}

fn load_segment(path: &PathBuf, base: u32) -> anyhow::Result<(CodeImage, Segment)> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    anyhow::ensure!(
        bytes.len() % 4 == 0,
        "image size {} is not a multiple of 4",
        bytes.len()
    );
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "segment".to_owned());
    let image = CodeImage::new(base, bytes);
    let mut segment = Segment::new(&name, base, image.len());
    segment.analyze(&image)?;
    Ok((image, segment))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Translate { image, base, dump_ir, stats } => {
            let (memory, mut segment) = load_segment(&image, base)?;
            let mut builder = Builder::new();
            let result = segment.recompile(&memory, &mut builder)?;
            if dump_ir {
                print!("{}", builder.dump());
            }
            if stats {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                log::info!(
                    "translated {} functions ({} blocks, {} instructions), {} rejected",
                    result.functions,
                    result.blocks,
                    result.guest_instructions,
                    result.rejected_functions
                );
            }
        }
        Commands::Analyze { image, base } => {
            let (_, segment) = load_segment(&image, base)?;
            for function in segment.functions.values() {
                println!(
                    "0x{:08X} {} blocks={} in={:?} out={:?}",
                    function.address,
                    function.name,
                    function.blocks.len(),
                    function.type_in,
                    function.type_out
                );
            }
        }
    }
    Ok(())
}
