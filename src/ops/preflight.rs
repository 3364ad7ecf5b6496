//! Host prerequisite checks.
//!
//! A build refuses to start when any required host tool is missing, so
//! that a missing `perl` is reported up front rather than after twenty
//! minutes of compiling. The `doctor` command runs the same checks plus
//! informational ones about the NDK and the host interpreter.
//!
//! ## Checks Performed
//!
//! - host C compiler (cc, clang, gcc)
//! - make, tar, cmake, perl
//! - autoreconf (optional, only for sources without `configure`)
//! - pkg-config (optional)

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::builder::toolchain::NdkLocator;
use crate::ops::host_python::find_host_python;
use crate::util::process::{find_executable, tool_version};

/// Result of a single check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    /// Human-readable status message
    pub message: String,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
    pub duration: Duration,
    /// Whether a failure blocks a build
    pub required: bool,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            name: name.into(),
            passed: true,
            message: message.into(),
            path: None,
            version: None,
            duration: Duration::ZERO,
            required: true,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            passed: false,
            ..Self::pass(name, message)
        }
    }

    /// Mark this check as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Summary of all checks.
#[derive(Debug, Clone, Default)]
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
    pub total_duration: Duration,
}

impl PreflightReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, check: CheckResult) {
        self.checks.push(check);
    }

    pub fn all_required_passed(&self) -> bool {
        self.checks.iter().filter(|c| c.required).all(|c| c.passed)
    }

    /// Names of the required checks that failed.
    pub fn missing_required(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| c.required && !c.passed)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }
}

/// A host tool the build invokes, and the names it may go by.
struct ToolSpec {
    name: &'static str,
    candidates: &'static [&'static str],
    purpose: &'static str,
    required: bool,
}

const HOST_TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "C compiler",
        candidates: &["cc", "clang", "gcc"],
        purpose: "builds the host interpreter",
        required: true,
    },
    ToolSpec {
        name: "make",
        candidates: &["make", "gmake"],
        purpose: "drives every component build",
        required: true,
    },
    ToolSpec {
        name: "tar",
        candidates: &["tar"],
        purpose: "extracts .tar.xz and .tar.bz2 sources",
        required: true,
    },
    ToolSpec {
        name: "cmake",
        candidates: &["cmake"],
        purpose: "builds zlib",
        required: true,
    },
    ToolSpec {
        name: "perl",
        candidates: &["perl"],
        purpose: "runs OpenSSL's Configure",
        required: true,
    },
    ToolSpec {
        name: "autoreconf",
        candidates: &["autoreconf"],
        purpose: "bootstraps sources shipped without configure",
        required: false,
    },
    ToolSpec {
        name: "pkg-config",
        candidates: &["pkg-config", "pkgconf"],
        purpose: "lets configure find staged libraries",
        required: false,
    },
];

/// Check every host tool the pipeline shells out to.
pub fn check_host_tools() -> PreflightReport {
    let start = Instant::now();
    let mut report = PreflightReport::new();

    for spec in HOST_TOOLS {
        report.add(check_tool(spec));
    }

    report.total_duration = start.elapsed();
    report
}

fn check_tool(spec: &ToolSpec) -> CheckResult {
    let start = Instant::now();

    let found = spec
        .candidates
        .iter()
        .find_map(|name| find_executable(name).map(|path| (*name, path)));

    let result = match found {
        Some((name, path)) => CheckResult::pass(spec.name, format!("Found {}", name))
            .with_version(tool_version(&path))
            .with_path(path),
        None => CheckResult::fail(
            spec.name,
            format!(
                "Not found (tried {}); {}",
                spec.candidates.join(", "),
                spec.purpose
            ),
        ),
    };

    let result = result.with_duration(start.elapsed());
    if spec.required {
        result
    } else {
        result.optional()
    }
}

/// Whether an NDK is already available or will have to be downloaded.
pub fn check_ndk(locator: &NdkLocator) -> CheckResult {
    match locator.locate() {
        Some(ndk) => {
            let version = ndk.revision();
            CheckResult::pass("Android NDK", format!("Found at {}", ndk.root().display()))
                .with_path(ndk.root().to_path_buf())
                .with_version(version)
                .optional()
        }
        None => CheckResult::fail(
            "Android NDK",
            format!(
                "Not installed; NDK {} will be downloaded on first build",
                locator.version()
            ),
        )
        .optional(),
    }
}

/// Whether a host interpreter of `series` is already installed.
pub fn check_host_python(series: &str) -> CheckResult {
    match find_host_python(series) {
        Some(path) => CheckResult::pass("Host Python", format!("Found Python {}", series))
            .with_version(tool_version(&path))
            .with_path(path)
            .optional(),
        None => CheckResult::fail(
            "Host Python",
            format!("Python {} not found; it will be built from source", series),
        )
        .optional(),
    }
}

/// Render a report for the terminal.
pub fn format_report(report: &PreflightReport, verbose: bool) -> String {
    let mut output = String::new();

    output.push_str("Crossport Doctor\n");
    output.push_str("================\n\n");

    if verbose {
        output.push_str(&format!(
            "Host: {} ({})\n\n",
            std::env::consts::OS,
            std::env::consts::ARCH
        ));
    }

    output.push_str("Checks:\n");
    for check in &report.checks {
        let status = if check.passed { "[OK]" } else { "[!!]" };
        let required = if check.required { "" } else { " (optional)" };
        output.push_str(&format!("  {} {}{}\n", status, check.name, required));

        if verbose || !check.passed {
            output.push_str(&format!("      {}\n", check.message));
        }
        if verbose {
            if let Some(path) = &check.path {
                output.push_str(&format!("      Path: {}\n", path.display()));
            }
            if let Some(version) = &check.version {
                output.push_str(&format!("      Version: {}\n", version));
            }
        }
    }

    output.push_str(&format!(
        "\nSummary: {} passed, {} failed\n",
        report.passed_count(),
        report.failed_count()
    ));

    let missing = report.missing_required();
    if !missing.is_empty() {
        output.push_str(&format!(
            "\nMissing required tools: {}. Builds will not start until they are installed.\n",
            missing.join(", ")
        ));
    }

    output
}
