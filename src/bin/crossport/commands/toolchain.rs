//! `crossport toolchain` command
//!
//! Prints every toolchain variable the build would use and which layer
//! it was resolved from.

use anyhow::Result;

use super::Session;
use crate::cli::ToolchainArgs;
use crossport::sources::HttpFetcher;

pub fn execute(args: ToolchainArgs) -> Result<()> {
    let session = Session::load(&args.target)?;
    let fetcher = HttpFetcher::new()?;
    let pipeline = session.pipeline(&fetcher)?;

    let (ndk, toolchain) = if args.download {
        pipeline.resolve_toolchain()?
    } else {
        pipeline.locate_toolchain()?
    };

    if args.env {
        for (key, value) in toolchain.env() {
            println!("export {}={}", key, shell_quote(value));
        }
        return Ok(());
    }

    let config = pipeline.config();
    println!("NDK:       {}", ndk.root().display());
    if let Some(revision) = ndk.revision() {
        println!("Revision:  {}", revision);
    }
    println!("Target:    {} (API {})", config.target_triple(), config.api_level());
    println!("ABI:       {}", config.arch().android_abi());
    println!();

    for (key, var) in toolchain.resolved() {
        println!("{:<18} {:<9} {}", key, var.layer, var.value);
    }

    Ok(())
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
