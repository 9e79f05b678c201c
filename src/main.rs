//! Demo CLI: reads a textual instruction listing (`src/demo_format.rs`,
//! not any proprietary VM format — that loader is out of scope), runs
//! the decompiler, and prints the recovered statement tree. A
//! convenience for exercising the library, not a specified interface.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use vmdecompile::printer::{print_fragment, PrinterOptions};
use vmdecompile::{decompile, DecompileOptions};

#[derive(Parser)]
#[command(author, version, about = "Decompile a textual bytecode listing into pseudo-source")]
struct Args {
    /// Path to a demo-format instruction listing.
    input: PathBuf,

    /// Pre-GMLv2 bytecode mode: packed 2D array indices are decomposed.
    #[arg(long)]
    legacy_arrays: bool,

    /// Treat leftover data on the expression stack as fatal instead of a
    /// warning.
    #[arg(long)]
    no_leftover_data: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let name = args
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("entry")
        .to_string();

    let entry = vmdecompile::demo_format::parse(&name, &text)
        .with_context(|| format!("parsing {}", args.input.display()))?;

    let options = DecompileOptions {
        legacy_arrays: args.legacy_arrays,
        allow_leftover_data_on_stack: !args.no_leftover_data,
        ..DecompileOptions::default()
    };

    eprintln!("decompiling {name}...");
    let output = decompile(&entry, &options).context("decompiling entry")?;

    for warning in &output.warnings {
        eprintln!("warning: {warning}");
    }

    print!("{}", print_fragment(&output.ast, &PrinterOptions::default()));
    eprintln!("done.");
    Ok(())
}
