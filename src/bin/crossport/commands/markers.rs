//! `crossport markers` command

use anyhow::{Context, Result};

use super::Session;
use crate::cli::{MarkersArgs, MarkersCommands, TargetArgs};
use crossport::builder::MarkerCache;
use crossport::core::WorkspaceLayout;

pub fn execute(args: MarkersArgs) -> Result<()> {
    match args.command {
        MarkersCommands::List(args) => {
            let markers = open(&args.target, args.host)?;
            let entries = markers
                .list()
                .with_context(|| format!("failed to read {}", markers.dir().display()))?;

            if entries.is_empty() {
                eprintln!("No components built in {}", markers.dir().display());
                return Ok(());
            }
            for (component, fingerprint) in entries {
                println!("{:<10} {}", component, fingerprint);
            }
        }
        MarkersCommands::Clear(args) => {
            let markers = open(&args.target, args.host)?;
            match args.component {
                Some(component) => {
                    markers
                        .clear_marker(&component)
                        .with_context(|| format!("failed to clear marker for {}", component))?;
                    eprintln!("     Cleared {}", component);
                }
                None => {
                    let count = markers.clear_all().with_context(|| {
                        format!("failed to clear {}", markers.dir().display())
                    })?;
                    eprintln!("     Cleared {} marker(s)", count);
                }
            }
        }
    }

    Ok(())
}

fn open(target: &TargetArgs, host: bool) -> Result<MarkerCache> {
    let session = Session::load(target)?;
    let layout = if host {
        WorkspaceLayout::host(session.settings.build.workspace())
    } else {
        session.layout()?
    };
    Ok(MarkerCache::new(layout.markers()))
}
