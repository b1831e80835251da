//! Benchmark timer sources.
//!
//! Uses the monotonic clock for wall time, the per-process CPU clock for CPU
//! time and RDTSC on x86_64 for cycles. Platforms without a cycle counter
//! report zero cycles.

use crate::case::CaseKind;
use std::time::Instant;

/// A begin/end measurement pair.
pub trait Clock {
    /// Name shown next to the measurement. Empty keeps whatever name the
    /// case set itself.
    fn name(&self) -> &str {
        ""
    }

    fn begin(&mut self);

    /// Value accumulated since the matching [`begin`](Clock::begin).
    fn end(&mut self) -> u64;
}

/// Elapsed wall-clock nanoseconds.
#[derive(Debug, Default)]
pub struct WallClock {
    start: Option<Instant>,
}

impl Clock for WallClock {
    fn name(&self) -> &str {
        "wall time"
    }

    fn begin(&mut self) {
        self.start = Some(Instant::now());
    }

    fn end(&mut self) -> u64 {
        self.start
            .take()
            .map(|s| s.elapsed().as_nanos() as u64)
            .unwrap_or(0)
    }
}

/// Nanoseconds of CPU time consumed by the whole process.
#[derive(Debug, Default)]
pub struct CpuClock {
    start: u64,
}

impl Clock for CpuClock {
    fn name(&self) -> &str {
        "CPU time"
    }

    fn begin(&mut self) {
        self.start = process_cpu_time();
    }

    fn end(&mut self) -> u64 {
        process_cpu_time().saturating_sub(self.start)
    }
}

/// Raw CPU cycles.
#[derive(Debug, Default)]
pub struct CycleCounter {
    start: u64,
}

impl Clock for CycleCounter {
    fn name(&self) -> &str {
        "CPU cycles"
    }

    fn begin(&mut self) {
        self.start = read_cycles();
    }

    fn end(&mut self) -> u64 {
        read_cycles().saturating_sub(self.start)
    }
}

/// Timer bound to a running case, picked from its resolved kind.
#[derive(Debug)]
pub enum TimerSource {
    WallTime(WallClock),
    CpuTime(CpuClock),
    CpuCycles(CycleCounter),
    /// The case measures on its own through
    /// [`Context::benchmark_with`](crate::Context::benchmark_with) or
    /// [`Context::record_benchmark`](crate::Context::record_benchmark).
    Custom,
    /// Plain tests have no timer.
    None,
}

impl TimerSource {
    /// Timer for a kind that has already had its default resolved.
    pub fn for_kind(kind: CaseKind) -> Self {
        match kind {
            CaseKind::Test => TimerSource::None,
            CaseKind::WallTimeBenchmark => TimerSource::WallTime(WallClock::default()),
            CaseKind::CpuTimeBenchmark => TimerSource::CpuTime(CpuClock::default()),
            CaseKind::CpuCyclesBenchmark => TimerSource::CpuCycles(CycleCounter::default()),
            CaseKind::CustomBenchmark(_) => TimerSource::Custom,
            CaseKind::DefaultBenchmark => {
                unreachable!("default benchmark kind must be resolved before binding a timer")
            }
        }
    }

    /// The built-in clock, if this source has one.
    pub fn clock(&mut self) -> Option<&mut dyn Clock> {
        match self {
            TimerSource::WallTime(c) => Some(c),
            TimerSource::CpuTime(c) => Some(c),
            TimerSource::CpuCycles(c) => Some(c),
            TimerSource::Custom | TimerSource::None => None,
        }
    }
}

#[cfg(unix)]
fn process_cpu_time() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable timespec and the clock id is a
    // constant supported on every unix libc exposes it for.
    let ret = unsafe { libc::clock_gettime(libc::CLOCK_PROCESS_CPUTIME_ID, &mut ts) };
    if ret != 0 {
        return 0;
    }
    (ts.tv_sec as u64)
        .saturating_mul(1_000_000_000)
        .saturating_add(ts.tv_nsec as u64)
}

#[cfg(not(unix))]
fn process_cpu_time() -> u64 {
    0
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn read_cycles() -> u64 {
    // SAFETY: RDTSC is available on every x86_64 CPU.
    unsafe { std::arch::x86_64::_rdtsc() }
}

#[cfg(not(target_arch = "x86_64"))]
#[inline(always)]
fn read_cycles() -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn should_measure_wall_time_in_nanoseconds() {
        let mut clock = WallClock::default();
        clock.begin();
        std::thread::sleep(Duration::from_millis(5));
        let ns = clock.end();
        assert!(ns >= 5_000_000);
        assert!(ns < 5_000_000_000);
    }

    #[test]
    fn should_return_zero_when_wall_clock_never_started() {
        assert_eq!(WallClock::default().end(), 0);
    }

    #[test]
    fn should_bind_timer_per_kind() {
        assert!(matches!(
            TimerSource::for_kind(CaseKind::WallTimeBenchmark),
            TimerSource::WallTime(_)
        ));
        assert!(matches!(
            TimerSource::for_kind(CaseKind::CustomBenchmark(crate::BenchmarkUnits::Bytes)),
            TimerSource::Custom
        ));
        assert!(TimerSource::for_kind(CaseKind::Test).clock().is_none());
        assert_eq!(
            TimerSource::for_kind(CaseKind::CpuTimeBenchmark)
                .clock()
                .map(|c| c.name().to_string()),
            Some("CPU time".to_string())
        );
    }

    #[test]
    #[should_panic(expected = "must be resolved")]
    fn should_panic_when_default_kind_unresolved() {
        let _ = TimerSource::for_kind(CaseKind::DefaultBenchmark);
    }
}
