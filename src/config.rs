//! Configuration for a test run.

use crate::case::BenchmarkKind;
use crate::error::ConfigError;
use crate::output::ColorPolicy;
use std::path::PathBuf;
use std::str::FromStr;

/// Resolved configuration for one run of a [`Tester`](crate::Tester).
#[derive(Debug, Clone)]
pub struct TesterConfig {
    /// Colored output.
    pub color: ColorPolicy,
    /// 1-based case numbers to leave out.
    pub skip: Vec<usize>,
    /// Leave out every plain test.
    pub skip_tests: bool,
    /// Leave out every benchmark.
    pub skip_benchmarks: bool,
    /// Run only these case numbers, in this order.
    pub only: Vec<usize>,
    /// Randomly permute the plan.
    pub shuffle: bool,
    /// Seed for the shuffle; drawn from entropy when unset.
    pub shuffle_seed: Option<u64>,
    /// Run every case this many times in a row.
    pub repeat_every: usize,
    /// Run the whole plan this many times.
    pub repeat_all: usize,
    /// Stop after the first failing case.
    pub abort_on_fail: bool,
    /// Turn every expected-failure scope into a no-op.
    pub no_xfail: bool,
    /// What a default benchmark measures.
    pub benchmark: BenchmarkKind,
    /// Leading measurements excluded from statistics.
    pub benchmark_discard: usize,
    /// Relative deviation above which a benchmark is flagged yellow.
    pub benchmark_yellow: f64,
    /// Relative deviation above which a benchmark is flagged red.
    pub benchmark_red: f64,
    /// Write a JSON report of the run here.
    pub json_output: Option<PathBuf>,
    /// Emit debug diagnostics.
    pub verbose: bool,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            color: ColorPolicy::Auto,
            skip: Vec::new(),
            skip_tests: false,
            skip_benchmarks: false,
            only: Vec::new(),
            shuffle: false,
            shuffle_seed: None,
            repeat_every: 1,
            repeat_all: 1,
            abort_on_fail: false,
            no_xfail: false,
            benchmark: BenchmarkKind::WallTime,
            benchmark_discard: 1,
            benchmark_yellow: 0.05,
            benchmark_red: 0.25,
            json_output: None,
            verbose: false,
        }
    }
}

impl TesterConfig {
    /// Create a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config with environment variables applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    /// Apply environment variables over this config.
    ///
    /// Supported variables:
    /// - `CASEKIT_TEST_COLOR`: `on`, `off` or `auto`
    /// - `CASEKIT_TEST_SKIP_TESTS`, `CASEKIT_TEST_SKIP_BENCHMARKS`: booleans
    /// - `CASEKIT_TEST_SHUFFLE`: boolean
    /// - `CASEKIT_TEST_SEED`: shuffle seed
    /// - `CASEKIT_TEST_REPEAT_EVERY`, `CASEKIT_TEST_REPEAT_ALL`: repeat counts
    /// - `CASEKIT_TEST_ABORT_ON_FAIL`, `CASEKIT_TEST_NO_XFAIL`: booleans
    /// - `CASEKIT_TEST_BENCHMARK`: `wall-time`, `cpu-time` or `cpu-cycles`
    /// - `CASEKIT_TEST_BENCHMARK_DISCARD`: leading samples to discard
    /// - `CASEKIT_TEST_BENCHMARK_YELLOW`, `CASEKIT_TEST_BENCHMARK_RED`: deviation thresholds
    /// - `CASEKIT_TEST_JSON`: path of the JSON report
    ///
    /// Unset variables keep the current value. A value that does not parse
    /// is an error, the same as the corresponding command-line option.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_vars(|name| std::env::var(name).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(v) = var("CASEKIT_TEST_COLOR") {
            self.color = v.parse()?;
        }
        if let Some(v) = var("CASEKIT_TEST_SKIP_TESTS") {
            self.skip_tests = flag(&v);
        }
        if let Some(v) = var("CASEKIT_TEST_SKIP_BENCHMARKS") {
            self.skip_benchmarks = flag(&v);
        }
        if let Some(v) = var("CASEKIT_TEST_SHUFFLE") {
            self.shuffle = flag(&v);
        }
        if let Some(v) = var("CASEKIT_TEST_SEED") {
            self.shuffle_seed = Some(number("CASEKIT_TEST_SEED", v)?);
        }
        if let Some(v) = var("CASEKIT_TEST_REPEAT_EVERY") {
            self.repeat_every = number("CASEKIT_TEST_REPEAT_EVERY", v)?;
        }
        if let Some(v) = var("CASEKIT_TEST_REPEAT_ALL") {
            self.repeat_all = number("CASEKIT_TEST_REPEAT_ALL", v)?;
        }
        if let Some(v) = var("CASEKIT_TEST_ABORT_ON_FAIL") {
            self.abort_on_fail = flag(&v);
        }
        if let Some(v) = var("CASEKIT_TEST_NO_XFAIL") {
            self.no_xfail = flag(&v);
        }
        if let Some(v) = var("CASEKIT_TEST_BENCHMARK") {
            self.benchmark = v.parse()?;
        }
        if let Some(v) = var("CASEKIT_TEST_BENCHMARK_DISCARD") {
            self.benchmark_discard = number("CASEKIT_TEST_BENCHMARK_DISCARD", v)?;
        }
        if let Some(v) = var("CASEKIT_TEST_BENCHMARK_YELLOW") {
            self.benchmark_yellow = number("CASEKIT_TEST_BENCHMARK_YELLOW", v)?;
        }
        if let Some(v) = var("CASEKIT_TEST_BENCHMARK_RED") {
            self.benchmark_red = number("CASEKIT_TEST_BENCHMARK_RED", v)?;
        }
        if let Some(v) = var("CASEKIT_TEST_JSON") {
            self.json_output = Some(PathBuf::from(v));
        }

        Ok(self)
    }

    /// Reject configurations no run can start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repeat_every == 0 {
            return Err(ConfigError::ZeroRepeat { option: "repeat-every" });
        }
        if self.repeat_all == 0 {
            return Err(ConfigError::ZeroRepeat { option: "repeat-all" });
        }
        for (option, value) in [
            ("benchmark-yellow", self.benchmark_yellow),
            ("benchmark-red", self.benchmark_red),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold { option, value });
            }
        }
        Ok(())
    }

    pub fn color(mut self, color: ColorPolicy) -> Self {
        self.color = color;
        self
    }

    pub fn skip(mut self, ordinals: impl IntoIterator<Item = usize>) -> Self {
        self.skip = ordinals.into_iter().collect();
        self
    }

    pub fn skip_tests(mut self, v: bool) -> Self {
        self.skip_tests = v;
        self
    }

    pub fn skip_benchmarks(mut self, v: bool) -> Self {
        self.skip_benchmarks = v;
        self
    }

    pub fn only(mut self, ordinals: impl IntoIterator<Item = usize>) -> Self {
        self.only = ordinals.into_iter().collect();
        self
    }

    pub fn shuffle(mut self, v: bool) -> Self {
        self.shuffle = v;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    pub fn repeat_every(mut self, n: usize) -> Self {
        self.repeat_every = n;
        self
    }

    pub fn repeat_all(mut self, n: usize) -> Self {
        self.repeat_all = n;
        self
    }

    pub fn abort_on_fail(mut self, v: bool) -> Self {
        self.abort_on_fail = v;
        self
    }

    pub fn no_xfail(mut self, v: bool) -> Self {
        self.no_xfail = v;
        self
    }

    pub fn benchmark(mut self, kind: BenchmarkKind) -> Self {
        self.benchmark = kind;
        self
    }

    pub fn benchmark_discard(mut self, n: usize) -> Self {
        self.benchmark_discard = n;
        self
    }

    pub fn benchmark_thresholds(mut self, yellow: f64, red: f64) -> Self {
        self.benchmark_yellow = yellow;
        self.benchmark_red = red;
        self
    }

    pub fn json_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.json_output = Some(path.into());
        self
    }

    pub fn verbose(mut self, v: bool) -> Self {
        self.verbose = v;
        self
    }
}

/// Parse a space-separated list of 1-based case numbers.
///
/// Zero and out-of-range numbers are kept here and ignored by the plan
/// builder; only tokens that are not numbers at all are rejected.
pub fn parse_ordinals(option: &'static str, list: &str) -> Result<Vec<usize>, ConfigError> {
    list.split_whitespace()
        .map(|token| {
            token.parse().map_err(|_| ConfigError::InvalidOrdinal {
                option,
                value: token.to_string(),
            })
        })
        .collect()
}

fn flag(value: &str) -> bool {
    !(value.is_empty()
        || value == "0"
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("off"))
}

fn number<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn should_use_defaults_when_env_not_set() {
        let cfg = TesterConfig::default();
        assert_eq!(cfg.repeat_every, 1);
        assert_eq!(cfg.repeat_all, 1);
        assert_eq!(cfg.benchmark, BenchmarkKind::WallTime);
        assert_eq!(cfg.benchmark_discard, 1);
        assert_eq!(cfg.benchmark_yellow, 0.05);
        assert_eq!(cfg.benchmark_red, 0.25);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn should_build_config_with_builder() {
        let cfg = TesterConfig::new()
            .only([2, 5])
            .skip([3])
            .repeat_every(3)
            .shuffle(true)
            .seed(7);

        assert_eq!(cfg.only, vec![2, 5]);
        assert_eq!(cfg.skip, vec![3]);
        assert_eq!(cfg.repeat_every, 3);
        assert!(cfg.shuffle);
        assert_eq!(cfg.shuffle_seed, Some(7));
    }

    #[test]
    fn should_reject_zero_repeat_counts() {
        let err = TesterConfig::new().repeat_all(0).validate().unwrap_err();
        assert!(matches!(err, ConfigError::ZeroRepeat { option: "repeat-all" }));
        let err = TesterConfig::new().repeat_every(0).validate().unwrap_err();
        assert!(matches!(err, ConfigError::ZeroRepeat { option: "repeat-every" }));
    }

    #[test]
    fn should_reject_negative_thresholds() {
        let err = TesterConfig::new()
            .benchmark_thresholds(-0.1, 0.25)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThreshold { .. }));
    }

    #[test]
    fn should_parse_ordinal_lists() {
        assert_eq!(parse_ordinals("only", "2 5").unwrap(), vec![2, 5]);
        assert_eq!(parse_ordinals("only", "  ").unwrap(), Vec::<usize>::new());
        assert!(parse_ordinals("skip", "1 two").is_err());
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn should_apply_environment_values_when_set() {
        let cfg = TesterConfig::new()
            .repeat_every(4)
            .with_vars(vars(&[
                ("CASEKIT_TEST_BENCHMARK", "cpu-cycles"),
                ("CASEKIT_TEST_REPEAT_ALL", "3"),
                ("CASEKIT_TEST_SHUFFLE", "1"),
                ("CASEKIT_TEST_NO_XFAIL", "off"),
                ("CASEKIT_TEST_COLOR", "off"),
            ]))
            .unwrap();

        assert_eq!(cfg.benchmark, BenchmarkKind::CpuCycles);
        assert_eq!(cfg.repeat_every, 4);
        assert_eq!(cfg.repeat_all, 3);
        assert!(cfg.shuffle);
        assert!(!cfg.no_xfail);
        assert_eq!(cfg.color, ColorPolicy::Off);
    }

    #[test]
    fn should_reject_unknown_benchmark_from_environment() {
        let err = TesterConfig::new()
            .with_vars(vars(&[("CASEKIT_TEST_BENCHMARK", "gpu-time")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBenchmark(ref v) if v == "gpu-time"));
    }

    #[test]
    fn should_reject_unparsable_number_from_environment() {
        let err = TesterConfig::new()
            .with_vars(vars(&[("CASEKIT_TEST_REPEAT_EVERY", "three")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv { name: "CASEKIT_TEST_REPEAT_EVERY", .. }
        ));
    }
}
