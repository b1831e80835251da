//! Rendering of report lines and the JSON run report.

use crate::output::Line;
use crate::result::{BenchmarkRecord, CaseOutcome, RunSummary};
use crate::stats;
use std::path::Path;
use termcolor::Color;
use tracing::debug;

/// Identity part of a report line.
pub(crate) struct Label<'a> {
    pub(crate) id: usize,
    /// Registry size; the id is zero-padded to its digit count.
    pub(crate) case_count: usize,
    pub(crate) name: &'a str,
    pub(crate) description: &'a str,
    pub(crate) repeat_id: Option<usize>,
}

pub(crate) fn digits(mut n: usize) -> usize {
    let mut count = 1;
    while n >= 10 {
        n /= 10;
        count += 1;
    }
    count
}

fn status_colors(outcome: CaseOutcome) -> (Option<Color>, Option<Color>) {
    match outcome {
        CaseOutcome::Fail | CaseOutcome::XPass => (Some(Color::Red), None),
        CaseOutcome::XFail => (Some(Color::Yellow), None),
        CaseOutcome::NoCheck => (Some(Color::Yellow), Some(Color::Yellow)),
        CaseOutcome::Ok | CaseOutcome::Skip | CaseOutcome::Bench => (None, None),
    }
}

fn write_id(line: &mut Line<'_>, label: &Label<'_>) {
    line.color(Some(Color::Blue), false)
        .write("[")
        .nospace()
        .color(Some(Color::Cyan), true)
        .write(format!("{:0width$}", label.id, width = digits(label.case_count)))
        .nospace()
        .color(Some(Color::Blue), false)
        .write("]");
}

fn write_name(line: &mut Line<'_>, label: &Label<'_>, color: Option<Color>) {
    line.color(color, true).write(label.name).nospace();
    if label.description.is_empty() {
        line.write("()");
    } else {
        line.write("(")
            .nospace()
            .reset()
            .write(label.description)
            .nospace()
            .color(color, true)
            .write(")");
    }
}

/// `STATUS [07] name(description)@repeat`
pub(crate) fn write_label(line: &mut Line<'_>, outcome: CaseOutcome, label: &Label<'_>) {
    let (status_color, label_color) = status_colors(outcome);
    line.color(status_color, true).write(outcome.status());
    write_id(line, label);
    write_name(line, label, label_color);
    if let Some(repeat_id) = label.repeat_id {
        line.nospace().write("@").nospace().write(repeat_id + 1);
    }
    line.reset();
}

/// ` BENCH [07] 1.25 ± 0.03 µs name(description)@9x100 (wall time)`
pub(crate) fn write_benchmark(line: &mut Line<'_>, label: &Label<'_>, bench: &BenchmarkRecord) {
    let (mean, stddev, unit) = stats::scale(bench.stats.mean, bench.stats.stddev, bench.units);

    line.bold().write(CaseOutcome::Bench.status());
    write_id(line, label);
    line.color(bench.stats.deviation.color(), true)
        .write(format!("{:>7.2}", mean))
        .reset()
        .write("±")
        .write(format!("{:>6.2}", stddev));
    if !unit.is_empty() {
        line.write(unit);
    }
    write_name(line, label, None);
    line.nospace()
        .write("@")
        .nospace()
        .write(bench.samples)
        .nospace()
        .write("x")
        .nospace()
        .write(bench.batch_size);
    if !bench.measured.is_empty() {
        line.reset().write("(").nospace().write(&bench.measured).nospace().write(")");
    }
    line.reset();
}

/// Write `summary` as pretty-printed JSON to `path`, creating parent
/// directories as needed.
pub fn write_json(path: &Path, summary: &RunSummary) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(summary).map_err(std::io::Error::other)?;
    std::fs::write(path, json)?;
    debug!(path = %path.display(), cases = summary.cases.len(), "run report written");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::BenchmarkUnits;
    use crate::output::Output;
    use crate::result::{CaseRecord, RunStatus};
    use crate::stats::{BenchmarkStats, Deviation};

    fn label<'a>(description: &'a str, repeat_id: Option<usize>) -> Label<'a> {
        Label {
            id: 7,
            case_count: 120,
            name: "parses_numbers",
            description,
            repeat_id,
        }
    }

    #[test]
    fn should_pad_id_to_registry_width() {
        assert_eq!(digits(0), 1);
        assert_eq!(digits(9), 1);
        assert_eq!(digits(10), 2);
        assert_eq!(digits(120), 3);

        let (mut output, buffer) = Output::captured();
        write_label(&mut output.log(), CaseOutcome::Ok, &label("", None));
        assert_eq!(buffer.contents(), "    OK [007] parses_numbers()\n");
    }

    #[test]
    fn should_render_description_and_repeat() {
        let (mut output, buffer) = Output::captured();
        write_label(&mut output.error(), CaseOutcome::Fail, &label("3", Some(1)));
        assert_eq!(buffer.contents(), "  FAIL [007] parses_numbers(3)@2\n");
    }

    #[test]
    fn should_render_benchmark_line() {
        let bench = BenchmarkRecord {
            stats: BenchmarkStats {
                mean: 1500.0,
                stddev: 30.0,
                deviation: Deviation::Default,
            },
            samples: 9,
            batch_size: 100,
            units: BenchmarkUnits::Nanoseconds,
            measured: "wall time".to_string(),
        };
        let (mut output, buffer) = Output::captured();
        write_benchmark(&mut output.log(), &label("", None), &bench);
        assert_eq!(
            buffer.contents(),
            " BENCH [007]    1.50 ±   0.03 µs parses_numbers()@9x100 (wall time)\n"
        );
    }

    #[test]
    fn should_write_json_report_when_path_given() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.json");

        let mut summary = RunSummary::new("Suite", RunStatus::Completed);
        summary.check_count = 4;
        summary.cases.push(CaseRecord {
            id: 1,
            name: "a".to_string(),
            description: String::new(),
            outcome: CaseOutcome::Ok,
            message: None,
            benchmark: None,
        });
        write_json(&path, &summary).unwrap();

        let loaded = RunSummary::load(&path).unwrap();
        assert_eq!(loaded.name, "Suite");
        assert_eq!(loaded.check_count, 4);
        assert_eq!(loaded.cases[0].outcome, CaseOutcome::Ok);
    }
}
