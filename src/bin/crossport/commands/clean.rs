//! `crossport clean` command

use anyhow::{Context, Result};

use super::Session;
use crate::cli::CleanArgs;
use crossport::util::fs::reset_dir;

pub fn execute(args: CleanArgs) -> Result<()> {
    let session = Session::load(&args.target)?;

    let dir = if args.all {
        // Remove the entire workspace
        session.settings.build.workspace()
    } else {
        // Default: only this target's tree
        session.layout()?.target_dir().to_path_buf()
    };

    reset_dir(&dir).with_context(|| format!("failed to remove {}", dir.display()))?;
    eprintln!("     Removed {}", dir.display());

    Ok(())
}
