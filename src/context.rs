//! Run state shared between the execution loop and running cases.
//!
//! A [`Context`] is handed to every case body. Checks, skips and benchmark
//! measurements go through it, and it holds the identity of the case being
//! run. The identity is only valid between the start and end of one planned
//! entry; the accessors panic outside of that window instead of returning a
//! stale value.

use crate::case::{CaseKind, TestCase};
use crate::clock::{Clock, TimerSource};
use crate::output::{Line, Output, Stream};
use crate::report::{self, Label};
use crate::result::{BenchmarkRecord, CaseOutcome};
use std::fmt;
use std::ops::{Deref, DerefMut};
use thiserror::Error;

/// What a case body returns. `Err` stops the remaining repetitions.
pub type Outcome = Result<(), Interrupt>;

/// Why a case body stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupt {
    /// A check failed, or an expected failure did not happen.
    #[error("check failed")]
    Failed,
    /// The case asked to be skipped.
    #[error("test case skipped")]
    Skipped,
}

/// Source position of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub file: &'static str,
    pub line: u32,
}

impl Location {
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }

    #[track_caller]
    pub fn caller() -> Self {
        let caller: &'static std::panic::Location<'static> = std::panic::Location::caller();
        Self {
            file: caller.file(),
            line: caller.line(),
        }
    }
}

/// The case currently executing a repetition.
#[derive(Debug)]
pub(crate) struct ActiveCase {
    pub(crate) kind: CaseKind,
    pub(crate) timer: TimerSource,
}

/// Mutable state of a run, passed to every case body.
pub struct Context {
    pub(crate) output: Output,
    pub(crate) test_name: String,
    /// Registry size, for padding case numbers.
    pub(crate) case_count: usize,

    pub(crate) test_case_id: Option<usize>,
    pub(crate) instance_id: Option<usize>,
    pub(crate) repeat_id: Option<usize>,
    pub(crate) registered_name: &'static str,

    pub(crate) check_count: usize,
    pub(crate) case_name: String,
    pub(crate) case_description: String,
    pub(crate) benchmark_name: String,
    /// Line of the last check in this repetition, 0 if none happened.
    pub(crate) case_line: u32,
    pub(crate) case_file: &'static str,
    pub(crate) active: Option<ActiveCase>,

    pub(crate) expected_failures_disabled: bool,
    pub(crate) expected_failure: Option<String>,
    /// Justification of the last expected failure that actually failed.
    pub(crate) expected_failure_seen: Option<String>,
    /// How and why the current entry was interrupted.
    pub(crate) interruption: Option<(CaseOutcome, String)>,

    pub(crate) benchmark_batch_size: usize,
    pub(crate) benchmark_result: u64,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("test_name", &self.test_name)
            .field("test_case_id", &self.test_case_id)
            .field("instance_id", &self.instance_id)
            .field("repeat_id", &self.repeat_id)
            .field("check_count", &self.check_count)
            .field("case_name", &self.case_name)
            .field("expected_failure", &self.expected_failure)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub(crate) fn new(test_name: String, output: Output) -> Self {
        Self {
            output,
            test_name,
            case_count: 0,
            test_case_id: None,
            instance_id: None,
            repeat_id: None,
            registered_name: "",
            check_count: 0,
            case_name: String::new(),
            case_description: String::new(),
            benchmark_name: String::new(),
            case_line: 0,
            case_file: "",
            active: None,
            expected_failures_disabled: false,
            expected_failure: None,
            expected_failure_seen: None,
            interruption: None,
            benchmark_batch_size: 0,
            benchmark_result: 0,
        }
    }

    // ------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------

    /// Record a boolean check. Use [`verify!`](crate::verify) instead of
    /// calling this directly.
    pub fn verify_at(&mut self, expression: &str, value: bool, location: Location) -> Outcome {
        self.register_check(location);

        match (self.expected_failure.clone(), value) {
            (None, true) => Ok(()),
            (Some(message), false) => {
                self.report_at(Stream::Log, CaseOutcome::XFail, location)
                    .newline()
                    .write("      ")
                    .write(&message)
                    .write("Expression")
                    .write(expression)
                    .write("failed.");
                self.expected_failure_seen = Some(message);
                Ok(())
            }
            (None, false) => {
                let detail = format!("Expression {} failed.", expression);
                self.fail_at(CaseOutcome::Fail, location, detail)
            }
            (Some(_), true) => {
                let detail = format!("Expression {} was expected to fail.", expression);
                self.fail_at(CaseOutcome::XPass, location, detail)
            }
        }
    }

    /// Record an equality check. Use [`compare!`](crate::compare) instead of
    /// calling this directly.
    ///
    /// `values` holds the debug renderings of both sides and is only needed
    /// when `equal` is false.
    pub fn compare_at(
        &mut self,
        actual: &str,
        expected: &str,
        equal: bool,
        values: Option<(String, String)>,
        location: Location,
    ) -> Outcome {
        self.register_check(location);

        match (self.expected_failure.clone(), equal) {
            (None, true) => Ok(()),
            (Some(message), false) => {
                self.report_at(Stream::Log, CaseOutcome::XFail, location)
                    .newline()
                    .write("      ")
                    .write(&message)
                    .write(actual)
                    .write("and")
                    .write(expected)
                    .write("failed the comparison.");
                self.expected_failure_seen = Some(message);
                Ok(())
            }
            (None, false) => {
                let (a, e) = values.unwrap_or_default();
                let detail = format!(
                    "Values {} and {} are not the same, actual is\n        {}\n        but expected\n        {}",
                    actual, expected, a, e
                );
                self.fail_at(CaseOutcome::Fail, location, detail)
            }
            (Some(_), true) => {
                let detail = format!(
                    "{} and {} were expected to fail the comparison.",
                    actual, expected
                );
                self.fail_at(CaseOutcome::XPass, location, detail)
            }
        }
    }

    /// Stop the current case and report it as skipped.
    ///
    /// ```rust,no_run
    /// # use casekit::{Context, Outcome};
    /// fn needs_gpu(_: &mut (), ctx: &mut Context) -> Outcome {
    ///     if std::env::var("GPU").is_err() {
    ///         return ctx.skip("no GPU available");
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub fn skip(&mut self, message: impl Into<String>) -> Outcome {
        let message = message.into();
        if self.active.is_none() {
            panic!("Context::skip(): can be called only from within a test case");
        }
        self.report(Stream::Log, CaseOutcome::Skip)
            .newline()
            .write("      ")
            .write(&message);
        self.interruption = Some((CaseOutcome::Skip, message));
        Err(Interrupt::Skipped)
    }

    fn fail_at(&mut self, outcome: CaseOutcome, location: Location, detail: String) -> Outcome {
        self.report_at(Stream::Error, outcome, location)
            .newline()
            .write("       ")
            .write(&detail);
        self.interruption = Some((outcome, detail));
        Err(Interrupt::Failed)
    }

    fn register_check(&mut self, location: Location) {
        if self.active.is_none() {
            panic!("using verification macros outside of test cases is not allowed");
        }
        self.check_count += 1;
        if self.case_name.is_empty() {
            self.case_name = self.registered_name.to_string();
        }
        self.case_file = location.file;
        self.case_line = location.line;
    }

    // ------------------------------------------------------------------
    // Expected failures
    // ------------------------------------------------------------------

    /// Mark every check made through the returned guard as expected to fail.
    ///
    /// ```rust,no_run
    /// # use casekit::{compare, Context, Outcome};
    /// fn rounding(_: &mut (), ctx: &mut Context) -> Outcome {
    ///     {
    ///         let mut xfail = ctx.expect_failure("float rounding is not exact yet");
    ///         compare!(xfail, 0.1 + 0.2, 0.3);
    ///     }
    ///     compare!(ctx, 1 + 1, 2);
    ///     Ok(())
    /// }
    /// ```
    pub fn expect_failure(&mut self, message: impl Into<String>) -> ExpectedFailure<'_> {
        self.expect_failure_if(message, true)
    }

    /// Like [`expect_failure`](Context::expect_failure), but a no-op when
    /// `enabled` is false.
    ///
    /// # Panics
    ///
    /// If another expected-failure scope is already active; scopes do not nest.
    pub fn expect_failure_if(
        &mut self,
        message: impl Into<String>,
        enabled: bool,
    ) -> ExpectedFailure<'_> {
        if self.expected_failure.is_some() {
            panic!("Context::expect_failure(): expected-failure scopes can't be nested");
        }
        if enabled && !self.expected_failures_disabled {
            self.expected_failure = Some(message.into());
        }
        ExpectedFailure { ctx: self }
    }

    pub fn is_expected_failure_active(&self) -> bool {
        self.expected_failure.is_some()
    }

    // ------------------------------------------------------------------
    // Benchmarks
    // ------------------------------------------------------------------

    /// Run `f` `batch_size` times and measure it with the case's timer.
    ///
    /// Only valid in wall-time, CPU-time, cycle and default benchmarks.
    #[track_caller]
    pub fn benchmark<R>(&mut self, batch_size: usize, mut f: impl FnMut() -> R) {
        self.start_benchmark(Location::caller(), batch_size);
        let clock = match self.active.as_mut().and_then(|a| a.timer.clock()) {
            Some(clock) => clock,
            None => panic!(
                "Context::benchmark(): the case has no built-in timer, \
                 use benchmark_with() or record_benchmark() in custom benchmarks"
            ),
        };
        self.benchmark_name = clock.name().to_string();
        clock.begin();
        for _ in 0..batch_size {
            std::hint::black_box(f());
        }
        self.benchmark_result = clock.end();
    }

    /// Run `f` `batch_size` times and measure it with a custom `clock`.
    #[track_caller]
    pub fn benchmark_with<C, R>(&mut self, clock: &mut C, batch_size: usize, mut f: impl FnMut() -> R)
    where
        C: Clock + ?Sized,
    {
        self.start_benchmark(Location::caller(), batch_size);
        if !clock.name().is_empty() {
            self.benchmark_name = clock.name().to_string();
        }
        clock.begin();
        for _ in 0..batch_size {
            std::hint::black_box(f());
        }
        self.benchmark_result = clock.end();
    }

    /// Record a measurement of `batch_size` operations taken elsewhere.
    #[track_caller]
    pub fn record_benchmark(&mut self, batch_size: usize, value: u64) {
        self.start_benchmark(Location::caller(), batch_size);
        self.benchmark_result = value;
    }

    fn start_benchmark(&mut self, location: Location, batch_size: usize) {
        match &self.active {
            None => panic!("using benchmark macros outside of test cases is not allowed"),
            Some(active) if !active.kind.is_benchmark() => {
                panic!("benchmark helpers can be used only in benchmark cases")
            }
            Some(_) => {}
        }
        self.register_check(location);
        self.benchmark_batch_size = batch_size;
    }

    // ------------------------------------------------------------------
    // Names and identity
    // ------------------------------------------------------------------

    pub fn set_test_name(&mut self, name: impl Into<String>) {
        self.test_name = name.into();
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    /// Override the name shown for the current case.
    pub fn set_test_case_name(&mut self, name: impl Into<String>) {
        self.case_name = name.into();
    }

    /// Name of the current case, empty until the first check.
    pub fn test_case_name(&self) -> &str {
        &self.case_name
    }

    /// Text shown in parentheses after the case name. Defaults to the
    /// instance id of instanced cases.
    pub fn set_test_case_description(&mut self, description: impl Into<String>) {
        self.case_description = description.into();
    }

    /// Name of the measured quantity shown after a benchmark result.
    pub fn set_benchmark_name(&mut self, name: impl Into<String>) {
        self.benchmark_name = name.into();
    }

    /// Total checks made so far in the run.
    pub fn check_count(&self) -> usize {
        self.check_count
    }

    /// 1-based number of the running case.
    ///
    /// # Panics
    ///
    /// Outside of a running case.
    pub fn test_case_id(&self) -> usize {
        match self.test_case_id {
            Some(id) => id,
            None => panic!("Context::test_case_id(): can be called only from within a test case"),
        }
    }

    /// Instance of the running instanced case.
    ///
    /// # Panics
    ///
    /// Outside of an instanced case.
    pub fn test_case_instance_id(&self) -> usize {
        match self.instance_id {
            Some(id) => id,
            None => panic!(
                "Context::test_case_instance_id(): can be called only from within an instanced test case"
            ),
        }
    }

    /// 0-based repetition of the running repeated case.
    ///
    /// # Panics
    ///
    /// Outside of a case that runs more than once.
    pub fn test_case_repeat_id(&self) -> usize {
        match self.repeat_id {
            Some(id) => id,
            None => panic!(
                "Context::test_case_repeat_id(): can be called only from within a repeated test case"
            ),
        }
    }

    /// The report streams, for extra diagnostics from inside a case.
    pub fn output(&mut self) -> &mut Output {
        &mut self.output
    }

    // ------------------------------------------------------------------
    // Execution loop hooks
    // ------------------------------------------------------------------

    pub(crate) fn begin_entry<F>(&mut self, ordinal: usize, case: &TestCase<F>) {
        self.test_case_id = Some(ordinal);
        self.instance_id = case.instance_id;
        self.repeat_id = None;
        self.registered_name = case.name;
        self.case_description = case
            .instance_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        self.case_name.clear();
        self.case_line = 0;
        self.benchmark_name.clear();
        self.expected_failure_seen = None;
        self.interruption = None;
    }

    pub(crate) fn begin_repetition(&mut self, repeat_id: Option<usize>, kind: CaseKind) {
        self.repeat_id = repeat_id;
        self.case_line = 0;
        self.case_name.clear();
        self.benchmark_batch_size = 0;
        self.benchmark_result = 0;
        self.active = Some(ActiveCase {
            kind,
            timer: TimerSource::for_kind(kind),
        });
    }

    pub(crate) fn end_repetition(&mut self) {
        self.active = None;
        // A scope leaked through mem::forget must not outlive its case.
        self.expected_failure = None;
    }

    pub(crate) fn reset_ids(&mut self) {
        self.test_case_id = None;
        self.instance_id = None;
        self.repeat_id = None;
        self.active = None;
    }

    fn split_label(&mut self) -> (&mut Output, Label<'_>) {
        let name = if self.case_name.is_empty() {
            self.registered_name
        } else {
            self.case_name.as_str()
        };
        let label = Label {
            id: self.test_case_id.unwrap_or(0),
            case_count: self.case_count,
            name,
            description: &self.case_description,
            repeat_id: self.repeat_id,
        };
        (&mut self.output, label)
    }

    /// Start a report line labelled with the current case.
    pub(crate) fn report(&mut self, stream: Stream, outcome: CaseOutcome) -> Line<'_> {
        let (output, label) = self.split_label();
        let mut line = output.line(stream);
        report::write_label(&mut line, outcome, &label);
        line
    }

    pub(crate) fn report_benchmark(&mut self, bench: &BenchmarkRecord) {
        let (output, label) = self.split_label();
        report::write_benchmark(&mut output.log(), &label, bench);
    }

    fn report_at(&mut self, stream: Stream, outcome: CaseOutcome, location: Location) -> Line<'_> {
        let mut line = self.report(stream, outcome);
        line.write("at")
            .write(location.file)
            .write("on line")
            .write(location.line);
        line
    }
}

/// Guard marking checks as expected to fail while it is alive.
///
/// Dereferences to the [`Context`], so checks are made through the guard.
/// Dropping it, on any path, turns the expectation off again.
pub struct ExpectedFailure<'a> {
    ctx: &'a mut Context,
}

impl Deref for ExpectedFailure<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        self.ctx
    }
}

impl DerefMut for ExpectedFailure<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx
    }
}

impl Drop for ExpectedFailure<'_> {
    fn drop(&mut self) {
        self.ctx.expected_failure = None;
    }
}
