//! Test case descriptors and the registry that numbers them.

use crate::context::{Context, Outcome};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Body of a test case: gets the fixture and the run context.
pub type CaseFn<F> = fn(&mut F, &mut Context) -> Outcome;

/// Setup or teardown hook run around every repetition.
pub type FixtureFn<F> = fn(&mut F);

/// Units a benchmark measurement is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BenchmarkUnits {
    Nanoseconds,
    Cycles,
    Instructions,
    Bytes,
    Count,
}

/// Concrete timer used for cases registered as [`CaseKind::DefaultBenchmark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BenchmarkKind {
    #[default]
    WallTime,
    CpuTime,
    CpuCycles,
}

impl BenchmarkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BenchmarkKind::WallTime => "wall-time",
            BenchmarkKind::CpuTime => "cpu-time",
            BenchmarkKind::CpuCycles => "cpu-cycles",
        }
    }

    pub(crate) fn case_kind(self) -> CaseKind {
        match self {
            BenchmarkKind::WallTime => CaseKind::WallTimeBenchmark,
            BenchmarkKind::CpuTime => CaseKind::CpuTimeBenchmark,
            BenchmarkKind::CpuCycles => CaseKind::CpuCyclesBenchmark,
        }
    }
}

impl FromStr for BenchmarkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wall-time" => Ok(BenchmarkKind::WallTime),
            "cpu-time" => Ok(BenchmarkKind::CpuTime),
            "cpu-cycles" => Ok(BenchmarkKind::CpuCycles),
            other => Err(ConfigError::UnknownBenchmark(other.to_string())),
        }
    }
}

impl fmt::Display for BenchmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a registered case is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseKind {
    Test,
    /// Resolved to the run's configured [`BenchmarkKind`] right before execution.
    DefaultBenchmark,
    WallTimeBenchmark,
    CpuTimeBenchmark,
    CpuCyclesBenchmark,
    /// The case drives its own clock and reports values in the given units.
    CustomBenchmark(BenchmarkUnits),
}

impl CaseKind {
    pub fn is_benchmark(self) -> bool {
        !matches!(self, CaseKind::Test)
    }

    /// Units measurements of this kind are reported in.
    pub fn units(self) -> BenchmarkUnits {
        match self {
            CaseKind::Test | CaseKind::DefaultBenchmark => BenchmarkUnits::Count,
            CaseKind::WallTimeBenchmark | CaseKind::CpuTimeBenchmark => BenchmarkUnits::Nanoseconds,
            CaseKind::CpuCyclesBenchmark => BenchmarkUnits::Cycles,
            CaseKind::CustomBenchmark(units) => units,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            CaseKind::Test => "test",
            CaseKind::DefaultBenchmark => "benchmark",
            CaseKind::WallTimeBenchmark => "wall-time benchmark",
            CaseKind::CpuTimeBenchmark => "cpu-time benchmark",
            CaseKind::CpuCyclesBenchmark => "cpu-cycles benchmark",
            CaseKind::CustomBenchmark(_) => "custom benchmark",
        }
    }
}

/// Static description of one registered case.
///
/// A descriptor without a body is not selectable; the plan builder clears
/// the body of skipped cases on its own copy of the registry.
pub struct TestCase<F> {
    pub(crate) name: &'static str,
    pub(crate) kind: CaseKind,
    pub(crate) body: Option<CaseFn<F>>,
    pub(crate) setup: Option<FixtureFn<F>>,
    pub(crate) teardown: Option<FixtureFn<F>>,
    pub(crate) instance_id: Option<usize>,
    pub(crate) repeat_count: usize,
}

// Manual impls: every field is Copy regardless of `F`.
impl<F> Clone for TestCase<F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F> Copy for TestCase<F> {}

impl<F> fmt::Debug for TestCase<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("selectable", &self.body.is_some())
            .field("setup", &self.setup.is_some())
            .field("teardown", &self.teardown.is_some())
            .field("instance_id", &self.instance_id)
            .field("repeat_count", &self.repeat_count)
            .finish()
    }
}

impl<F> TestCase<F> {
    /// A plain test case run once.
    pub fn new(name: &'static str, body: CaseFn<F>) -> Self {
        Self {
            name,
            kind: CaseKind::Test,
            body: Some(body),
            setup: None,
            teardown: None,
            instance_id: None,
            repeat_count: 1,
        }
    }

    pub fn kind(mut self, kind: CaseKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn setup(mut self, setup: FixtureFn<F>) -> Self {
        self.setup = Some(setup);
        self
    }

    pub fn teardown(mut self, teardown: FixtureFn<F>) -> Self {
        self.teardown = Some(teardown);
        self
    }

    pub fn instance(mut self, id: usize) -> Self {
        self.instance_id = Some(id);
        self
    }

    /// Repeat every run of this case `count` times. Zero is treated as one.
    pub fn repeat(mut self, count: usize) -> Self {
        self.repeat_count = count.max(1);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn case_kind(&self) -> CaseKind {
        self.kind
    }

    pub fn instance_id(&self) -> Option<usize> {
        self.instance_id
    }

    pub fn repeat_count(&self) -> usize {
        self.repeat_count
    }

    pub fn is_selectable(&self) -> bool {
        self.body.is_some()
    }
}

/// A case body paired with its display name, usually built by [`cases!`](crate::cases).
pub struct Named<F> {
    pub name: &'static str,
    pub body: CaseFn<F>,
}

impl<F> Named<F> {
    /// Takes the last path segment of `path` as the name, so
    /// `"Self :: parses_empty"` becomes `"parses_empty"`.
    pub fn new(path: &'static str, body: CaseFn<F>) -> Self {
        let name = path.rsplit("::").next().unwrap_or(path).trim();
        Self { name, body }
    }
}

/// Ordered list of registered cases. Ordinals are 1-based and never change.
pub struct Registry<F> {
    cases: Vec<TestCase<F>>,
}

impl<F> Default for Registry<F> {
    fn default() -> Self {
        Self { cases: Vec::new() }
    }
}

impl<F> Registry<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a case and return its ordinal.
    pub fn register(&mut self, case: TestCase<F>) -> usize {
        self.cases.push(case);
        self.cases.len()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Case with the given 1-based ordinal.
    pub fn get(&self, ordinal: usize) -> Option<&TestCase<F>> {
        ordinal.checked_sub(1).and_then(|i| self.cases.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &TestCase<F>)> {
        self.cases.iter().enumerate().map(|(i, c)| (i + 1, c))
    }

    pub fn as_slice(&self) -> &[TestCase<F>] {
        &self.cases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut (), _: &mut Context) -> Outcome {
        Ok(())
    }

    #[test]
    fn should_assign_ordinals_in_registration_order() {
        let mut registry = Registry::new();
        assert_eq!(registry.register(TestCase::new("a", noop)), 1);
        assert_eq!(registry.register(TestCase::new("b", noop)), 2);
        assert_eq!(registry.get(2).map(|c| c.name()), Some("b"));
        assert!(registry.get(0).is_none());
        assert!(registry.get(3).is_none());
    }

    #[test]
    fn should_strip_path_when_naming_case() {
        let named = Named::<()>::new("Self :: parses_empty", noop);
        assert_eq!(named.name, "parses_empty");
        let plain = Named::<()>::new("standalone", noop);
        assert_eq!(plain.name, "standalone");
    }

    #[test]
    fn should_parse_benchmark_kind_when_known() {
        assert_eq!("cpu-time".parse::<BenchmarkKind>().unwrap(), BenchmarkKind::CpuTime);
        assert!(matches!(
            "gpu-time".parse::<BenchmarkKind>(),
            Err(ConfigError::UnknownBenchmark(_))
        ));
    }

    #[test]
    fn should_clamp_repeat_count_when_zero() {
        let case = TestCase::<()>::new("a", noop).repeat(0);
        assert_eq!(case.repeat_count(), 1);
    }
}
