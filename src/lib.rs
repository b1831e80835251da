//! # casekit
//!
//! A sequential runner for unit tests and micro-benchmarks.
//!
//! Cases are plain functions taking a shared fixture and a [`Context`]. They
//! are registered on a [`Tester`], which runs them one at a time in a plan
//! built from the command line: case selection, repetition, shuffling and
//! fixture setup/teardown around every repetition. Each planned entry ends
//! with one report line (`OK`, `FAIL`, `XFAIL`, `XPASS`, `SKIP`, `?` for a
//! case without checks, or `BENCH` with statistics) and the run ends with a
//! summary and an exit status.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use casekit::{cases, compare, verify, Context, Outcome, Tester};
//!
//! #[derive(Default)]
//! struct ParserTest;
//!
//! impl ParserTest {
//!     fn empty(&mut self, ctx: &mut Context) -> Outcome {
//!         verify!(ctx, "".parse::<u32>().is_err());
//!         Ok(())
//!     }
//!
//!     fn number(&mut self, ctx: &mut Context) -> Outcome {
//!         compare!(ctx, "42".parse::<u32>().ok(), Some(42));
//!         Ok(())
//!     }
//!
//!     fn throughput(&mut self, ctx: &mut Context) -> Outcome {
//!         ctx.benchmark(1000, || "12345".parse::<u32>());
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> std::process::ExitCode {
//!     let mut tester = Tester::new("ParserTest", ParserTest);
//!     tester
//!         .add_tests(cases![ParserTest::empty, ParserTest::number])
//!         .add_benchmarks(cases![ParserTest::throughput], 10);
//!     casekit::run_tester(&mut tester)
//! }
//! ```
//!
//! Free functions can be registered with attributes instead:
//!
//! ```rust,ignore
//! use casekit::{verify, Context, Outcome};
//!
//! #[casekit::test]
//! fn addition(ctx: &mut Context) -> Outcome {
//!     verify!(ctx, 1 + 1 == 2);
//!     Ok(())
//! }
//!
//! #[casekit::bench(cpu_time, repeat = 20)]
//! fn sorting(ctx: &mut Context) -> Outcome {
//!     let mut data: Vec<u32> = (0..1000).rev().collect();
//!     ctx.benchmark(1, || data.sort_unstable());
//!     Ok(())
//! }
//!
//! casekit::main!();
//! ```

mod args;
mod case;
mod clock;
mod config;
mod context;
mod error;
mod harness;
mod output;
mod plan;
mod report;
mod result;
mod runner;
mod stats;

pub use args::TesterArgs;
pub use case::{
    BenchmarkKind, BenchmarkUnits, CaseFn, CaseKind, FixtureFn, Named, Registry, TestCase,
};
pub use clock::{Clock, CpuClock, CycleCounter, TimerSource, WallClock};
pub use config::{parse_ordinals, TesterConfig};
pub use context::{Context, ExpectedFailure, Interrupt, Location, Outcome};
pub use error::ConfigError;
pub use harness::{
    discovered, discovered_tester, init_logging, run_discovered, run_tester, run_tester_with,
};
pub use output::{ColorPolicy, Line, Output, SharedBuffer, Stream};
pub use plan::{build_plan, EmptyPlan, PlanEntry};
pub use report::write_json;
pub use result::{BenchmarkRecord, CaseOutcome, CaseRecord, RunStatus, RunSummary};
pub use runner::Tester;
pub use stats::{reduce, BenchmarkStats, Deviation};

pub use casekit_macros::{bench, casekit_main as main, test};

#[doc(hidden)]
pub mod __private {
    pub use crate::harness::{linkme, DiscoveredCase, CASEKIT_CASES};
    use std::fmt::Debug;

    /// Equality and, only on mismatch, the debug rendering of both sides.
    pub fn compare_values<A, E>(actual: &A, expected: &E) -> (bool, Option<(String, String)>)
    where
        A: PartialEq<E> + Debug + ?Sized,
        E: Debug + ?Sized,
    {
        if actual == expected {
            (true, None)
        } else {
            (false, Some((format!("{:?}", actual), format!("{:?}", expected))))
        }
    }
}

/// Check that a boolean expression holds, returning from the case if not.
///
/// The enclosing function must return [`Outcome`].
///
/// ```rust,no_run
/// # use casekit::{verify, Context, Outcome};
/// fn case(_: &mut (), ctx: &mut Context) -> Outcome {
///     let v = vec![1, 2, 3];
///     verify!(ctx, v.contains(&2));
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! verify {
    ($ctx:expr, $cond:expr $(,)?) => {{
        let value: bool = $cond;
        $ctx.verify_at(
            ::core::stringify!($cond),
            value,
            $crate::Location::new(::core::file!(), ::core::line!()),
        )?;
    }};
}

/// Check that two values are equal, returning from the case if not.
///
/// On mismatch both values are printed with their `Debug` representation.
#[macro_export]
macro_rules! compare {
    ($ctx:expr, $actual:expr, $expected:expr $(,)?) => {{
        let (equal, values) = $crate::__private::compare_values(&$actual, &$expected);
        $ctx.compare_at(
            ::core::stringify!($actual),
            ::core::stringify!($expected),
            equal,
            values,
            $crate::Location::new(::core::file!(), ::core::line!()),
        )?;
    }};
}

/// Skip the current case with a formatted message.
#[macro_export]
macro_rules! skip {
    ($ctx:expr, $($arg:tt)+) => {
        return $ctx.skip(::std::format!($($arg)+))
    };
}

/// Build a list of [`Named`] case bodies from function paths.
///
/// ```rust,no_run
/// # use casekit::{cases, Context, Outcome, Tester};
/// struct Fixture;
/// impl Fixture {
///     fn first(&mut self, _: &mut Context) -> Outcome { Ok(()) }
///     fn second(&mut self, _: &mut Context) -> Outcome { Ok(()) }
/// }
/// let mut tester = Tester::new("Fixture", Fixture);
/// tester.add_tests(cases![Fixture::first, Fixture::second]);
/// ```
#[macro_export]
macro_rules! cases {
    ($($case:path),* $(,)?) => {
        [$($crate::Named::new(::core::stringify!($case), $case)),*]
    };
}
