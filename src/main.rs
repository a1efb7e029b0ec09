//! qlie CLI - Command-line tool for extracting QLiE PACK game archives.
//!
//! This is the main entry point for the qlie command-line application.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use qlie::prelude::*;

/// qlie - QLiE PACK archive extraction tool
#[derive(Parser)]
#[command(name = "qlie")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract files from a PACK archive
    Extract {
        /// Path to the .pack file
        #[arg(short, long, env = "INPUT_PACK")]
        pack: PathBuf,

        /// Output directory
        #[arg(short, long, env = "OUTPUT_FOLDER")]
        output: PathBuf,

        /// Path to the fkey file (keyed encryption)
        #[arg(long)]
        fkey: Option<PathBuf>,

        /// Path to the game executable holding the embedded key
        /// (requires --fkey)
        #[arg(long)]
        game_exe: Option<PathBuf>,
    },

    /// List contents of a PACK archive
    List {
        /// Path to the .pack file
        #[arg(short, long, env = "INPUT_PACK")]
        pack: PathBuf,

        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            pack,
            output,
            fkey,
            game_exe,
        } => {
            cmd_extract(&pack, &output, fkey.as_deref(), game_exe.as_deref())?;
        }
        Commands::List { pack, detailed } => {
            cmd_list(&pack, detailed)?;
        }
    }

    Ok(())
}

fn load_keys(fkey: Option<&Path>, game_exe: Option<&Path>) -> Result<KeyMaterial> {
    let key1 = match fkey {
        Some(path) => fs::read(path).context("Failed to read fkey file")?,
        None => {
            if game_exe.is_some() {
                anyhow::bail!("--game-exe also requires --fkey");
            }
            return Ok(KeyMaterial::basic());
        }
    };

    match game_exe {
        Some(path) => {
            let exe_image = fs::read(path).context("Failed to read game executable")?;
            KeyMaterial::with_game_exe(key1, &exe_image)
                .context("Failed to locate the key in the executable")
        }
        None => Ok(KeyMaterial::with_file_key(key1)),
    }
}

fn cmd_extract(
    pack_path: &PathBuf,
    output: &PathBuf,
    fkey: Option<&Path>,
    game_exe: Option<&Path>,
) -> Result<()> {
    println!("Opening PACK archive: {}", pack_path.display());

    let keys = load_keys(fkey, game_exe)?;

    let start = Instant::now();
    let archive = PackArchive::open(pack_path).context("Failed to open PACK archive")?;

    println!(
        "Loaded {} entries (FilePackVer{}.0) in {:?}",
        archive.entry_count(),
        archive.version(),
        start.elapsed()
    );

    let pb = ProgressBar::new(archive.entry_count() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    fs::create_dir_all(output)?;

    let start = Instant::now();
    let mut written = 0usize;
    let mut failed = 0usize;
    for entry in archive.entries() {
        match archive.extract_entry(entry, &keys) {
            Ok(files) => {
                for file in files {
                    let output_path = output.join(file.output_path());
                    if let Some(parent) = output_path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(&output_path, file.data)?;
                    written += 1;
                }
            }
            Err(err) => {
                // A fault in one entry never aborts its siblings.
                pb.println(format!("warning: {}: {}", entry.name, err));
                failed += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message("Done");
    println!(
        "Wrote {} file(s) ({} entries failed) in {:?}",
        written,
        failed,
        start.elapsed()
    );

    Ok(())
}

fn cmd_list(pack_path: &PathBuf, detailed: bool) -> Result<()> {
    let archive = PackArchive::open(pack_path).context("Failed to open PACK archive")?;

    for entry in archive.entries() {
        if detailed {
            println!(
                "{:>12} {:>12} {}{} {}",
                entry.compressed_size,
                entry.original_size,
                if entry.is_encrypted { "E" } else { " " },
                if entry.is_compressed { "C" } else { " " },
                entry.name
            );
        } else {
            println!("{}", entry.name);
        }
    }

    println!("\nTotal: {} entries", archive.entry_count());

    Ok(())
}
