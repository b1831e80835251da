//! Harness for attribute-registered cases and test binaries.
//!
//! Free functions marked with `#[casekit::test]` or `#[casekit::bench]` are
//! collected into a distributed slice at link time. [`run_discovered`] turns
//! them into a [`Tester`] ordered by source position and runs it with the
//! command-line options of the binary.

use crate::args::TesterArgs;
use crate::case::{CaseFn, CaseKind, TestCase};
use crate::config::TesterConfig;
use crate::runner::Tester;
use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// A case registered through an attribute.
#[doc(hidden)]
pub struct DiscoveredCase {
    /// Function name
    pub name: &'static str,
    pub kind: CaseKind,
    pub repeat: usize,
    /// Wrapper adapting the free function to the fixture signature
    pub func: CaseFn<()>,
    pub file: &'static str,
    pub line: u32,
}

// Re-export linkme for the proc macro
#[doc(hidden)]
pub use linkme;

/// Distributed slice collecting all attribute-registered cases.
#[doc(hidden)]
#[linkme::distributed_slice]
pub static CASEKIT_CASES: [DiscoveredCase];

/// Discovered cases in source order. Link order is unspecified, so numbers
/// are assigned by file and line.
pub fn discovered() -> Vec<&'static DiscoveredCase> {
    let mut cases: Vec<_> = CASEKIT_CASES.iter().collect();
    cases.sort_by_key(|c| (c.file, c.line));
    cases
}

/// A tester holding every discovered case.
pub fn discovered_tester(name: &str, config: TesterConfig) -> Tester<()> {
    let mut tester = Tester::with_config(name, (), config);
    for case in discovered() {
        tester.register(
            TestCase::new(case.name, case.func)
                .kind(case.kind)
                .repeat(case.repeat),
        );
    }
    debug!(count = tester.registry().len(), "discovered cases");
    tester
}

/// Install a stderr log subscriber filtered by `CASEKIT_LOG`.
///
/// Does nothing when the program already installed one.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("CASEKIT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "casekit=debug" } else { "warn" })
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Parse the command line and run `tester` with it.
///
/// This is what the `main` of a fixture-based test binary calls.
pub fn run_tester<F>(tester: &mut Tester<F>) -> ExitCode {
    run_tester_with(tester, &TesterArgs::parse())
}

/// Run `tester` with already parsed arguments.
///
/// The environment is applied over the tester's configuration and `args`
/// over that. Configuration errors are reported before any case runs.
pub fn run_tester_with<F>(tester: &mut Tester<F>, args: &TesterArgs) -> ExitCode {
    match configure(tester, args) {
        Ok(()) if args.list => {
            tester.list();
            ExitCode::SUCCESS
        }
        Ok(()) => tester.run(),
        Err(err) => {
            tester.report_error(format!("{:#}", err));
            ExitCode::from(1)
        }
    }
}

fn configure<F>(tester: &mut Tester<F>, args: &TesterArgs) -> Result<()> {
    let config = tester
        .config()
        .clone()
        .with_env()
        .context("invalid CASEKIT_TEST_* environment")?;
    let config = args.apply(config)?;
    init_logging(config.verbose);
    tester.set_config(config);
    Ok(())
}

/// Run every discovered case as the suite `name`.
///
/// This is called by the `casekit::main!` macro.
pub fn run_discovered(name: &str) -> ExitCode {
    let mut tester = discovered_tester(name, TesterConfig::default());
    run_tester(&mut tester)
}
