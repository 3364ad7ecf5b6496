//! `crossport doctor` command

use anyhow::Result;

use super::Session;
use crate::cli::DoctorArgs;
use crossport::core::Recipes;
use crossport::ops::preflight::{check_host_python, check_host_tools, check_ndk};
use crossport::ops::{format_report, ndk_locator};

pub fn execute(args: DoctorArgs, verbose: bool) -> Result<()> {
    let session = Session::load(&args.target)?;
    let layout = session.layout()?;

    let mut report = check_host_tools();
    report.add(check_ndk(&ndk_locator(
        &session.settings,
        &layout,
        session.ndk_home.clone(),
    )));

    let recipes = Recipes::with_overrides(&session.settings.sources);
    report.add(check_host_python(&recipes.product_series()));

    // Print the formatted report
    print!("{}", format_report(&report, verbose));

    // Exit with error code if required checks failed
    if !report.all_required_passed() {
        std::process::exit(1);
    }

    Ok(())
}
