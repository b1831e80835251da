//! Turning the registry and configuration into an ordered run plan.

use crate::case::{CaseKind, TestCase};
use crate::config::TesterConfig;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use tracing::debug;

/// One planned execution of a registered case.
pub struct PlanEntry<F> {
    /// 1-based registry number of the case.
    pub ordinal: usize,
    pub case: TestCase<F>,
}

impl<F> Clone for PlanEntry<F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F> Copy for PlanEntry<F> {}

impl<F> std::fmt::Debug for PlanEntry<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanEntry")
            .field("ordinal", &self.ordinal)
            .field("case", &self.case)
            .finish()
    }
}

/// Why a plan came out empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyPlan {
    /// Only benchmarks were left and they were skipped.
    NoRemainingBenchmarks,
    /// Only tests were left and they were skipped.
    NoRemainingTests,
    /// Nothing was registered or selected.
    NoCases,
}

impl EmptyPlan {
    /// Filtering by kind alone emptied the plan.
    pub fn is_expected(self) -> bool {
        !matches!(self, EmptyPlan::NoCases)
    }
}

/// Build the run plan from `cases` using the filters in `config`.
///
/// Works on a copy of the registry, so the registered descriptors keep their
/// bodies for the next run. Skipped cases are unselectable in that copy and
/// then drop out of selection:
///
/// 1. `skip_tests`/`skip_benchmarks` and the `skip` list disable cases;
///    out-of-range and zero numbers are ignored.
/// 2. A non-empty `only` list picks cases in its order (duplicates allowed,
///    disabled and out-of-range numbers ignored); otherwise every enabled
///    case is picked in registration order.
/// 3. The selection is repeated `repeat_all` times back to back.
/// 4. With `shuffle` the whole plan is permuted.
pub fn build_plan<F>(
    cases: &[TestCase<F>],
    config: &TesterConfig,
) -> Result<Vec<PlanEntry<F>>, EmptyPlan> {
    let mut working: Vec<TestCase<F>> = cases.to_vec();

    for case in &mut working {
        let is_benchmark = case.kind.is_benchmark();
        if (config.skip_tests && !is_benchmark) || (config.skip_benchmarks && is_benchmark) {
            case.body = None;
        }
    }
    for &ordinal in &config.skip {
        if let Some(case) = ordinal.checked_sub(1).and_then(|i| working.get_mut(i)) {
            case.body = None;
        }
    }

    let mut selection = Vec::with_capacity(working.len());
    if config.only.is_empty() {
        selection.extend(
            working
                .iter()
                .enumerate()
                .filter(|(_, case)| case.is_selectable())
                .map(|(i, case)| PlanEntry {
                    ordinal: i + 1,
                    case: *case,
                }),
        );
    } else {
        for &ordinal in &config.only {
            match ordinal.checked_sub(1).and_then(|i| working.get(i)) {
                Some(case) if case.is_selectable() => selection.push(PlanEntry {
                    ordinal,
                    case: *case,
                }),
                _ => debug!(ordinal, "ignoring unselectable case in --only"),
            }
        }
    }

    if selection.is_empty() {
        return Err(if config.skip_tests && !config.skip_benchmarks {
            EmptyPlan::NoRemainingBenchmarks
        } else if config.skip_benchmarks && !config.skip_tests {
            EmptyPlan::NoRemainingTests
        } else {
            EmptyPlan::NoCases
        });
    }

    let mut plan = Vec::with_capacity(selection.len() * config.repeat_all.max(1));
    for _ in 0..config.repeat_all.max(1) {
        plan.extend_from_slice(&selection);
    }

    if config.shuffle {
        let seed = config.shuffle_seed.unwrap_or_else(rand::random);
        debug!(seed, "shuffling run plan");
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        plan.shuffle(&mut rng);
    }

    Ok(plan)
}

/// Kind the execution loop actually runs `kind` as.
pub(crate) fn resolve_kind(kind: CaseKind, config: &TesterConfig) -> CaseKind {
    match kind {
        CaseKind::DefaultBenchmark => config.benchmark.case_kind(),
        other => other,
    }
}
