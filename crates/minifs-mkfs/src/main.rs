use std::path::PathBuf;

use clap::Parser;
use log::info;
use minifs::{FileSystem, BLOCK_COUNT, BLOCK_SIZE};

#[derive(Parser)]
#[command(author, version, about = "Formats a MiniFS image file")]
struct Cli {
    /// Path to the image file to create
    #[arg(short, long)]
    image: PathBuf,

    /// Overwrite the image if it already exists
    #[arg(short, long)]
    force: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if cli.image.exists() && !cli.force {
        eprintln!(
            "{} already exists; pass --force to overwrite",
            cli.image.display()
        );
        std::process::exit(1);
    }

    let mut fs = FileSystem::formatted();
    if let Err(e) = fs.save(&cli.image) {
        eprintln!("failed to write {}: {e}", cli.image.display());
        std::process::exit(1);
    }

    info!(
        "formatted {} ({} blocks, {} bytes/block)",
        cli.image.display(),
        BLOCK_COUNT,
        BLOCK_SIZE
    );
    println!(
        "Formatted {} ({} bytes, {} blocks)",
        cli.image.display(),
        BLOCK_COUNT as u64 * BLOCK_SIZE as u64,
        BLOCK_COUNT
    );
}
