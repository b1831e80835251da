//! Command-line surface of a test binary.
//!
//! Every option is optional so that anything not given on the command line
//! keeps the value from the environment (see [`TesterConfig::with_env`]).

use crate::case::BenchmarkKind;
use crate::config::{parse_ordinals, TesterConfig};
use crate::output::ColorPolicy;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Parser)]
#[command(
    about = "Run the test cases and benchmarks of this suite",
    long_about = "
Runs every registered test case and benchmark in order, one at a time.

Example:
    my_test --only '2 5'                # Run only cases 2 and 5, in that order
    my_test --repeat-every 10           # Run every case 10 times in a row
    my_test --shuffle --seed 42         # Reproducible random order
    my_test --benchmark cpu-time        # Measure default benchmarks in CPU time
"
)]
pub struct TesterArgs {
    // ========================================================================
    // Output
    // ========================================================================
    /// Colored output
    #[arg(long, value_enum, value_name = "MODE")]
    pub color: Option<ColorPolicy>,

    /// List registered cases without running them
    #[arg(long)]
    pub list: bool,

    /// Write a JSON report of the run to this file
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Print internal diagnostics
    #[arg(long, short = 'v')]
    pub verbose: bool,

    // ========================================================================
    // Selection
    // ========================================================================
    /// Skip the given case numbers, e.g. "1 4"
    #[arg(long, value_name = "N1 N2...")]
    pub skip: Option<String>,

    /// Skip all plain tests
    #[arg(long)]
    pub skip_tests: bool,

    /// Skip all benchmarks
    #[arg(long)]
    pub skip_benchmarks: bool,

    /// Run only the given case numbers, in the given order
    #[arg(long, value_name = "N1 N2...")]
    pub only: Option<String>,

    /// Randomly shuffle the run order
    #[arg(long)]
    pub shuffle: bool,

    /// Seed for --shuffle
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    // ========================================================================
    // Execution
    // ========================================================================
    /// Repeat every case N times in a row
    #[arg(long, value_name = "N")]
    pub repeat_every: Option<usize>,

    /// Repeat the whole run N times
    #[arg(long, value_name = "N")]
    pub repeat_all: Option<usize>,

    /// Stop after the first failure
    #[arg(long)]
    pub abort_on_fail: bool,

    /// Treat expected failures as ordinary failures
    #[arg(long)]
    pub no_xfail: bool,

    // ========================================================================
    // Benchmarks
    // ========================================================================
    /// Timer for default benchmarks: wall-time, cpu-time or cpu-cycles
    #[arg(long, value_name = "TYPE")]
    pub benchmark: Option<String>,

    /// Number of leading measurements to discard
    #[arg(long, value_name = "N")]
    pub benchmark_discard: Option<usize>,

    /// Relative deviation above which results are flagged yellow
    #[arg(long, value_name = "N")]
    pub benchmark_yellow: Option<f64>,

    /// Relative deviation above which results are flagged red
    #[arg(long, value_name = "N")]
    pub benchmark_red: Option<f64>,

    /// Passed by `cargo bench`
    #[arg(long, hide = true)]
    pub bench: bool,
}

impl TesterArgs {
    /// Apply these arguments over the environment configuration.
    pub fn resolve(&self) -> Result<TesterConfig> {
        self.apply(TesterConfig::from_env()?)
    }

    /// Apply these arguments over `config`.
    pub fn apply(&self, mut config: TesterConfig) -> Result<TesterConfig> {
        if let Some(color) = self.color {
            config.color = color;
        }
        if let Some(list) = &self.skip {
            config.skip = parse_ordinals("skip", list)?;
        }
        if let Some(list) = &self.only {
            config.only = parse_ordinals("only", list)?;
        }
        config.skip_tests |= self.skip_tests;
        config.skip_benchmarks |= self.skip_benchmarks;
        config.shuffle |= self.shuffle;
        if let Some(seed) = self.seed {
            config.shuffle_seed = Some(seed);
        }
        if let Some(n) = self.repeat_every {
            config.repeat_every = n;
        }
        if let Some(n) = self.repeat_all {
            config.repeat_all = n;
        }
        config.abort_on_fail |= self.abort_on_fail;
        config.no_xfail |= self.no_xfail;
        if let Some(kind) = &self.benchmark {
            config.benchmark = kind
                .parse::<BenchmarkKind>()
                .context("invalid --benchmark")?;
        }
        if let Some(n) = self.benchmark_discard {
            config.benchmark_discard = n;
        }
        if let Some(x) = self.benchmark_yellow {
            config.benchmark_yellow = x;
        }
        if let Some(x) = self.benchmark_red {
            config.benchmark_red = x;
        }
        if let Some(path) = &self.json {
            config.json_output = Some(path.clone());
        }
        config.verbose |= self.verbose;

        config.validate().context("invalid test run configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    fn parse(args: &[&str]) -> TesterArgs {
        TesterArgs::try_parse_from(std::iter::once("suite").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn should_keep_config_when_no_flags_given() {
        let cfg = parse(&[]).apply(TesterConfig::new().repeat_every(4)).unwrap();
        assert_eq!(cfg.repeat_every, 4);
        assert!(cfg.only.is_empty());
    }

    #[test]
    fn should_override_config_with_given_flags() {
        let cfg = parse(&[
            "--only",
            "3 1",
            "--skip",
            "2",
            "--repeat-all",
            "2",
            "--shuffle",
            "--seed",
            "9",
            "--benchmark",
            "cpu-cycles",
            "--color",
            "off",
            "--bench",
        ])
        .apply(TesterConfig::new())
        .unwrap();

        assert_eq!(cfg.only, vec![3, 1]);
        assert_eq!(cfg.skip, vec![2]);
        assert_eq!(cfg.repeat_all, 2);
        assert!(cfg.shuffle);
        assert_eq!(cfg.shuffle_seed, Some(9));
        assert_eq!(cfg.benchmark, BenchmarkKind::CpuCycles);
        assert_eq!(cfg.color, ColorPolicy::Off);
    }

    #[test]
    fn should_reject_unknown_benchmark_type() {
        let err = parse(&["--benchmark", "gpu-time"])
            .apply(TesterConfig::new())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnknownBenchmark(_))
        ));
    }

    #[test]
    fn should_reject_zero_repeat_count() {
        let err = parse(&["--repeat-every", "0"])
            .apply(TesterConfig::new())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::ZeroRepeat { option: "repeat-every" })
        ));
    }

    #[test]
    fn should_reject_non_numeric_ordinals() {
        assert!(parse(&["--only", "1 x"]).apply(TesterConfig::new()).is_err());
    }
}
