//! The execution loop.

use crate::case::{BenchmarkKind, BenchmarkUnits, CaseKind, FixtureFn, Named, Registry, TestCase};
use crate::config::TesterConfig;
use crate::context::{Context, Interrupt, Outcome};
use crate::error::ConfigError;
use crate::output::{Output, Stream};
use crate::plan::{build_plan, resolve_kind, EmptyPlan, PlanEntry};
use crate::report;
use crate::result::{BenchmarkRecord, CaseOutcome, CaseRecord, RunStatus, RunSummary};
use crate::stats;
use std::any::Any;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;
use std::time::Instant;
use termcolor::Color;
use tracing::{debug, trace};

/// Runs the cases registered on a fixture of type `F`.
///
/// Every case receives the same fixture value; setup and teardown hooks
/// registered with a case run around each of its repetitions.
///
/// # Example
///
/// ```rust,no_run
/// use casekit::{cases, compare, Context, Outcome, Tester};
///
/// #[derive(Default)]
/// struct StackTest {
///     stack: Vec<u32>,
/// }
///
/// impl StackTest {
///     fn push(&mut self, ctx: &mut Context) -> Outcome {
///         self.stack.push(3);
///         compare!(ctx, self.stack.last(), Some(&3));
///         Ok(())
///     }
///
///     fn reset(&mut self) {
///         self.stack.clear();
///     }
/// }
///
/// fn main() -> std::process::ExitCode {
///     let mut tester = Tester::new("StackTest", StackTest::default());
///     tester.add_tests_with_setup(cases![StackTest::push], StackTest::reset, StackTest::reset);
///     tester.run()
/// }
/// ```
pub struct Tester<F> {
    fixture: F,
    registry: Registry<F>,
    config: TesterConfig,
    ctx: Context,
}

impl<F> Tester<F> {
    /// Create a tester with the default configuration.
    ///
    /// [`run_tester`](crate::run_tester) layers the environment and the
    /// command line over it.
    pub fn new(name: impl Into<String>, fixture: F) -> Self {
        Self::with_config(name, fixture, TesterConfig::default())
    }

    pub fn with_config(name: impl Into<String>, fixture: F, config: TesterConfig) -> Self {
        let output = Output::stdio(config.color);
        Self {
            fixture,
            registry: Registry::new(),
            config,
            ctx: Context::new(name.into(), output),
        }
    }

    /// Report somewhere other than stdout and stderr.
    pub fn with_output(mut self, output: Output) -> Self {
        self.ctx.output = output;
        self
    }

    pub fn config(&self) -> &TesterConfig {
        &self.config
    }

    /// Replace the configuration. A different color policy reopens the
    /// standard streams; an output installed with
    /// [`with_output`](Tester::with_output) is kept as is.
    pub fn set_config(&mut self, config: TesterConfig) {
        if config.color != self.config.color && self.ctx.output.is_stdio() {
            self.ctx.output = Output::stdio(config.color);
        }
        self.config = config;
    }

    pub fn fixture(&self) -> &F {
        &self.fixture
    }

    pub fn fixture_mut(&mut self) -> &mut F {
        &mut self.fixture
    }

    pub fn registry(&self) -> &Registry<F> {
        &self.registry
    }

    /// The run state, e.g. to rename the suite before running it.
    pub fn context(&mut self) -> &mut Context {
        &mut self.ctx
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a single descriptor and return its 1-based number.
    pub fn register(&mut self, case: TestCase<F>) -> usize {
        self.registry.register(case)
    }

    pub fn add_tests(&mut self, cases: impl IntoIterator<Item = Named<F>>) -> &mut Self {
        self.add_repeated_tests(cases, 1)
    }

    pub fn add_repeated_tests(
        &mut self,
        cases: impl IntoIterator<Item = Named<F>>,
        repeat_count: usize,
    ) -> &mut Self {
        for case in cases {
            self.registry
                .register(TestCase::new(case.name, case.body).repeat(repeat_count));
        }
        self
    }

    /// Register every case `instance_count` times, numbered from 0.
    pub fn add_instanced_tests(
        &mut self,
        cases: impl IntoIterator<Item = Named<F>>,
        instance_count: usize,
    ) -> &mut Self {
        for case in cases {
            for instance in 0..instance_count {
                self.registry
                    .register(TestCase::new(case.name, case.body).instance(instance));
            }
        }
        self
    }

    pub fn add_tests_with_setup(
        &mut self,
        cases: impl IntoIterator<Item = Named<F>>,
        setup: FixtureFn<F>,
        teardown: FixtureFn<F>,
    ) -> &mut Self {
        for case in cases {
            self.registry.register(
                TestCase::new(case.name, case.body)
                    .setup(setup)
                    .teardown(teardown),
            );
        }
        self
    }

    /// Register benchmarks measured with the run's configured timer.
    pub fn add_benchmarks(
        &mut self,
        cases: impl IntoIterator<Item = Named<F>>,
        repeat_count: usize,
    ) -> &mut Self {
        self.add_benchmarks_of(cases, repeat_count, CaseKind::DefaultBenchmark)
    }

    /// Register benchmarks that always use the given timer.
    pub fn add_timed_benchmarks(
        &mut self,
        cases: impl IntoIterator<Item = Named<F>>,
        repeat_count: usize,
        kind: BenchmarkKind,
    ) -> &mut Self {
        self.add_benchmarks_of(cases, repeat_count, kind.case_kind())
    }

    pub fn add_instanced_benchmarks(
        &mut self,
        cases: impl IntoIterator<Item = Named<F>>,
        repeat_count: usize,
        instance_count: usize,
    ) -> &mut Self {
        for case in cases {
            for instance in 0..instance_count {
                self.registry.register(
                    TestCase::new(case.name, case.body)
                        .kind(CaseKind::DefaultBenchmark)
                        .instance(instance)
                        .repeat(repeat_count),
                );
            }
        }
        self
    }

    /// Register benchmarks that measure on their own and report `units`.
    pub fn add_custom_benchmarks(
        &mut self,
        cases: impl IntoIterator<Item = Named<F>>,
        repeat_count: usize,
        units: BenchmarkUnits,
    ) -> &mut Self {
        self.add_benchmarks_of(cases, repeat_count, CaseKind::CustomBenchmark(units))
    }

    fn add_benchmarks_of(
        &mut self,
        cases: impl IntoIterator<Item = Named<F>>,
        repeat_count: usize,
        kind: CaseKind,
    ) -> &mut Self {
        for case in cases {
            self.registry.register(
                TestCase::new(case.name, case.body)
                    .kind(kind)
                    .repeat(repeat_count),
            );
        }
        self
    }

    // ------------------------------------------------------------------
    // Running
    // ------------------------------------------------------------------

    /// Print every registered case without running anything.
    pub fn list(&mut self) {
        let width = report::digits(self.registry.len());
        for (ordinal, case) in self.registry.iter() {
            let mut line = self.ctx.output.log();
            line.color(Some(Color::Blue), false)
                .write("[")
                .nospace()
                .color(Some(Color::Cyan), true)
                .write(format!("{:0width$}", ordinal, width = width))
                .nospace()
                .color(Some(Color::Blue), false)
                .write("]")
                .bold()
                .write(case.name())
                .nospace();
            match case.instance_id() {
                Some(instance) => line.write(format!("({})", instance)),
                None => line.write("()"),
            };
            line.reset().write(case.case_kind().label());
            if case.repeat_count() > 1 {
                line.write(format!("x{}", case.repeat_count()));
            }
        }
    }

    /// Run the suite and return the process exit status.
    ///
    /// Configuration errors are printed to the error stream and exit with 1.
    pub fn run(&mut self) -> ExitCode {
        match self.exec() {
            Ok(summary) => ExitCode::from(summary.exit_code()),
            Err(err) => {
                self.report_error(&err);
                ExitCode::from(1)
            }
        }
    }

    /// Print a run-stopping error to the error stream.
    pub(crate) fn report_error(&mut self, err: impl fmt::Display) {
        self.ctx
            .output
            .error()
            .color(Some(Color::Red), true)
            .write("error:")
            .reset()
            .write(err);
    }

    /// Run the suite.
    ///
    /// Fails only when the configuration is unusable or the JSON report
    /// could not be written; failing cases are part of the summary.
    pub fn exec(&mut self) -> Result<RunSummary, ConfigError> {
        self.config.validate()?;

        let started = Instant::now();
        self.ctx.case_count = self.registry.len();
        self.ctx.expected_failures_disabled = self.config.no_xfail;

        let mut summary = {
            let mut run = RunScope(&mut *self);
            match build_plan(run.registry.as_slice(), &run.config) {
                Ok(plan) => run.run_plan(&plan),
                Err(empty) => run.report_empty(empty),
            }
        };
        summary.duration = started.elapsed();

        if let Some(path) = &self.config.json_output {
            report::write_json(path, &summary)?;
        }
        Ok(summary)
    }

    fn report_empty(&mut self, empty: EmptyPlan) -> RunSummary {
        let ctx = &mut self.ctx;
        match empty {
            EmptyPlan::NoRemainingBenchmarks => {
                ctx.output
                    .log()
                    .bold()
                    .write("No remaining benchmarks to run in")
                    .write(&ctx.test_name)
                    .nospace()
                    .write(".");
            }
            EmptyPlan::NoRemainingTests => {
                ctx.output
                    .log()
                    .bold()
                    .write("No remaining tests to run in")
                    .write(&ctx.test_name)
                    .nospace()
                    .write(".");
            }
            EmptyPlan::NoCases => {
                ctx.output
                    .error()
                    .color(Some(Color::Red), true)
                    .write("No test cases to run in")
                    .write(&ctx.test_name)
                    .nospace()
                    .write("!");
            }
        }

        let status = if empty.is_expected() {
            RunStatus::NothingToRun
        } else {
            RunStatus::Empty
        };
        RunSummary::new(&ctx.test_name, status)
    }

    fn run_plan(&mut self, plan: &[PlanEntry<F>]) -> RunSummary {
        debug!(
            entries = plan.len(),
            registered = self.registry.len(),
            "built run plan"
        );

        let ctx = &mut self.ctx;
        ctx.output
            .log()
            .bold()
            .write("Starting")
            .write(&ctx.test_name)
            .write("with")
            .write(plan.len())
            .write("test cases...");

        let mut summary = RunSummary::new(&ctx.test_name, RunStatus::Completed);
        for entry in plan {
            let record = self.run_entry(entry);
            let failed = record.outcome.is_error();
            if failed {
                summary.error_count += 1;
            }
            if record.outcome == CaseOutcome::NoCheck {
                summary.no_check_count += 1;
            }
            summary.cases.push(record);

            if failed && self.config.abort_on_fail {
                summary.status = RunStatus::Aborted;
                break;
            }
        }

        summary.name = self.ctx.test_name.clone();
        summary.check_count = self.ctx.check_count;
        self.print_summary(&summary);
        summary
    }

    fn run_entry(&mut self, entry: &PlanEntry<F>) -> CaseRecord {
        let case = entry.case;
        let Some(body) = case.body else {
            unreachable!("planned cases always have a body")
        };
        let kind = resolve_kind(case.kind, &self.config);
        let repeat_count = case.repeat_count * self.config.repeat_every;

        self.ctx.begin_entry(entry.ordinal, &case);
        trace!(
            id = entry.ordinal,
            name = case.name,
            kind = kind.label(),
            repeat_count,
            "running case"
        );

        let mut measurements = Vec::with_capacity(if kind.is_benchmark() { repeat_count } else { 0 });
        for i in 0..repeat_count {
            let mut outcome = match case.setup {
                Some(setup) => self.call_hook(setup, "setup"),
                None => Ok(()),
            };

            if outcome.is_ok() {
                self.ctx.begin_repetition((repeat_count > 1).then_some(i), kind);
                let fixture = &mut self.fixture;
                let ctx = &mut self.ctx;
                let result = panic::catch_unwind(AssertUnwindSafe(|| body(fixture, ctx)));
                self.ctx.end_repetition();
                outcome = match result {
                    Ok(returned) => self.settle(returned),
                    Err(payload) => self.report_panic("panicked", payload.as_ref()),
                };
            }

            if let Some(teardown) = case.teardown {
                let torn_down = self.call_hook(teardown, "teardown");
                outcome = outcome.and(torn_down);
            }
            if kind.is_benchmark() {
                measurements.push(self.ctx.benchmark_result);
            }
            if outcome.is_err() {
                break;
            }
        }

        self.classify(entry.ordinal, kind, &measurements)
    }

    /// Run a setup or teardown hook, turning a panic into a failure.
    fn call_hook(&mut self, hook: FixtureFn<F>, phase: &str) -> Outcome {
        let fixture = &mut self.fixture;
        match panic::catch_unwind(AssertUnwindSafe(|| hook(fixture))) {
            Ok(()) => Ok(()),
            Err(payload) => self.report_panic(&format!("panicked in {}", phase), payload.as_ref()),
        }
    }

    /// Report an interruption the body returned without going through a
    /// check or [`Context::skip`].
    fn settle(&mut self, returned: Outcome) -> Outcome {
        let Err(interrupt) = returned else {
            return returned;
        };
        if self.ctx.interruption.is_some() {
            return returned;
        }

        let (outcome, stream, message) = match interrupt {
            Interrupt::Failed => (CaseOutcome::Fail, Stream::Error, "returned Interrupt::Failed"),
            Interrupt::Skipped => (CaseOutcome::Skip, Stream::Log, "returned Interrupt::Skipped"),
        };
        self.ctx
            .report(stream, outcome)
            .newline()
            .write("      ")
            .write(message);
        self.ctx.interruption = Some((outcome, message.to_string()));
        returned
    }

    /// Report a panic as a failure. The first interruption of an entry
    /// decides its outcome.
    fn report_panic(&mut self, what: &str, payload: &(dyn Any + Send)) -> Outcome {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());

        self.ctx
            .report(Stream::Error, CaseOutcome::Fail)
            .write(what)
            .newline()
            .write("      ")
            .write(&message);
        if self.ctx.interruption.is_none() {
            self.ctx.interruption = Some((CaseOutcome::Fail, format!("{}: {}", what, message)));
        }
        Err(Interrupt::Failed)
    }

    /// Decide and report the outcome of the entry that just ran.
    ///
    /// Failures and skips were already reported where they happened.
    fn classify(&mut self, ordinal: usize, kind: CaseKind, measurements: &[u64]) -> CaseRecord {
        let interruption = self.ctx.interruption.take();
        let expected_failure = self.ctx.expected_failure_seen.take();

        let (outcome, message, benchmark) = match interruption {
            Some((outcome, message)) => (outcome, Some(message), None),
            None if self.ctx.case_line == 0 => {
                self.ctx.report(Stream::Log, CaseOutcome::NoCheck);
                (CaseOutcome::NoCheck, None, None)
            }
            None if !kind.is_benchmark() || expected_failure.is_some() => match expected_failure {
                Some(message) => {
                    self.ctx
                        .report(Stream::Log, CaseOutcome::XFail)
                        .newline()
                        .write("      ")
                        .write(&message);
                    (CaseOutcome::XFail, Some(message), None)
                }
                None => {
                    self.ctx.report(Stream::Log, CaseOutcome::Ok);
                    (CaseOutcome::Ok, None, None)
                }
            },
            None => {
                let discard = self.config.benchmark_discard;
                let bench = BenchmarkRecord {
                    stats: stats::reduce(
                        measurements,
                        discard,
                        self.ctx.benchmark_batch_size,
                        self.config.benchmark_yellow,
                        self.config.benchmark_red,
                    ),
                    samples: measurements.len() - stats::discard_count(measurements.len(), discard),
                    batch_size: self.ctx.benchmark_batch_size,
                    units: kind.units(),
                    measured: self.ctx.benchmark_name.clone(),
                };
                self.ctx.report_benchmark(&bench);
                (CaseOutcome::Bench, None, Some(bench))
            }
        };

        CaseRecord {
            id: ordinal,
            name: if self.ctx.case_name.is_empty() {
                self.ctx.registered_name.to_string()
            } else {
                self.ctx.case_name.clone()
            },
            description: self.ctx.case_description.clone(),
            outcome,
            message,
            benchmark,
        }
    }

    fn print_summary(&mut self, summary: &RunSummary) {
        let mut line = self.ctx.output.log();
        if summary.status == RunStatus::Aborted {
            line.color(Some(Color::Red), true)
                .write("Aborted")
                .bold()
                .write(&summary.name)
                .color(Some(Color::Red), true)
                .write("after first failure")
                .bold()
                .write("out of")
                .write(summary.check_count)
                .write("checks so far.");
        } else {
            line.bold().write("Finished").write(&summary.name).write("with");
            if summary.error_count > 0 {
                line.color(Some(Color::Red), true);
            }
            line.write(summary.error_count).write("errors");
            if summary.error_count > 0 {
                line.bold();
            }
            line.write("out of").write(summary.check_count).write("checks.");
        }
        if summary.no_check_count > 0 {
            line.color(Some(Color::Yellow), true)
                .write(summary.no_check_count)
                .write("test cases didn't contain any checks!");
        }
    }
}

/// Mutable access to a tester for the duration of one run. The current
/// case identity is cleared when it goes away, unwinding included.
struct RunScope<'a, F>(&'a mut Tester<F>);

impl<F> Deref for RunScope<'_, F> {
    type Target = Tester<F>;

    fn deref(&self) -> &Tester<F> {
        self.0
    }
}

impl<F> DerefMut for RunScope<'_, F> {
    fn deref_mut(&mut self) -> &mut Tester<F> {
        self.0
    }
}

impl<F> Drop for RunScope<'_, F> {
    fn drop(&mut self) {
        self.0.ctx.reset_ids();
    }
}
