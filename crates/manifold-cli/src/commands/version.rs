//! Show version information.

use anyhow::Result;
use colored::Colorize;
use manifold_core::{APP_NAME, VERSION};

pub fn execute(verbose: bool) -> Result<()> {
    println!(
        "{} {} ({}-{})",
        APP_NAME.cyan().bold(),
        VERSION,
        std::env::consts::ARCH,
        std::env::consts::OS
    );

    if verbose {
        println!("\nBuild Information:");
        println!("  Version: {}", VERSION);
        println!("  Target: {}", std::env::consts::ARCH);
        println!("  OS: {}", std::env::consts::OS);
        println!("  Rust Version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    Ok(())
}
