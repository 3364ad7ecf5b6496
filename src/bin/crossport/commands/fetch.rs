//! `crossport fetch` command

use anyhow::Result;

use super::Session;
use crate::cli::FetchArgs;
use crossport::sources::HttpFetcher;

pub fn execute(args: FetchArgs) -> Result<()> {
    let session = Session::load(&args.target)?;
    let fetcher = HttpFetcher::new()?;
    let pipeline = session.pipeline(&fetcher)?;

    for (component, archive) in pipeline.fetch_all()? {
        eprintln!("     Fetched {} -> {}", component, archive.display());
    }

    Ok(())
}
