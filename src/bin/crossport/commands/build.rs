//! `crossport build` command

use anyhow::Result;

use super::Session;
use crate::cli::BuildArgs;
use crossport::sources::HttpFetcher;

pub fn execute(args: BuildArgs) -> Result<()> {
    let mut session = Session::load(&args.target)?;
    if args.no_strip {
        session.settings.package.strip = Some(false);
    }

    let fetcher = HttpFetcher::new()?;
    let pipeline = session.pipeline(&fetcher)?;
    let report = pipeline.run()?;

    if !report.skipped.is_empty() {
        eprintln!("     Skipped {} (up to date)", report.skipped.join(", "));
    }
    if !report.built.is_empty() {
        eprintln!("       Built {}", report.built.join(", "));
    }
    eprintln!("    Finished {}", report.archive.display());

    Ok(())
}
