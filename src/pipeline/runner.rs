//! Stage execution wrapper and run reporting.
//!
//! `StageRunner` is the uniform harness around each pipeline stage: it records
//! wall-clock start and end, emits a start line and an elapsed-time summary
//! line to both the tracing subscriber and the plain-text run log, and on
//! failure attaches the stage name and propagates the error unchanged. Stage
//! internals stay opaque; their duration and pass/fail status are visible in
//! the run log regardless.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{error, info};

use crate::error::PipelineError;

/// Append-only, timestamped plain-text run log inside the output directory.
pub struct RunLog {
    file: fs::File,
}

impl RunLog {
    /// Opens the run log for appending, creating it if needed.
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self { file })
    }

    /// Writes one timestamped line.
    pub fn line(&mut self, msg: &str) -> Result<(), PipelineError> {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.file, "[{stamp}] {msg}")?;
        self.file.flush()?;
        Ok(())
    }
}

/// Summary of one completed stage.
#[derive(Debug, Clone)]
pub struct StageReport {
    /// Stage name, fixed by the driver.
    pub stage: &'static str,
    /// Wall-clock duration of the stage.
    pub elapsed: Duration,
    /// Key counts recorded by the driver (label, value).
    pub counts: Vec<(&'static str, u64)>,
}

/// Accumulates per-stage summaries across the run.
///
/// Purely additive: the report never influences control flow.
#[derive(Debug, Default)]
pub struct RunReport {
    stages: Vec<StageReport>,
    started: Option<Instant>,
}

impl RunReport {
    /// Creates an empty report and starts the total-elapsed clock.
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            started: Some(Instant::now()),
        }
    }

    /// Completed stages, in execution order.
    pub fn stages(&self) -> &[StageReport] {
        &self.stages
    }

    fn push(&mut self, stage: &'static str, elapsed: Duration) {
        self.stages.push(StageReport {
            stage,
            elapsed,
            counts: Vec::new(),
        });
    }

    /// Attaches a key count to the most recently completed stage.
    pub fn note_count(&mut self, label: &'static str, value: u64) {
        if let Some(last) = self.stages.last_mut() {
            last.counts.push((label, value));
        }
    }

    /// Renders the final human-readable summary.
    pub fn render(&self) -> String {
        let mut out = String::from("Run summary:\n");
        for s in &self.stages {
            let counts = if s.counts.is_empty() {
                String::new()
            } else {
                let parts: Vec<String> = s
                    .counts
                    .iter()
                    .map(|(label, value)| format!("{label}={value}"))
                    .collect();
                format!(" ({})", parts.join(", "))
            };
            out.push_str(&format!(
                "  {}: {:.2} seconds{}\n",
                s.stage,
                s.elapsed.as_secs_f64(),
                counts
            ));
        }
        if let Some(started) = self.started {
            out.push_str(&format!(
                "Completed in {:.2} seconds",
                started.elapsed().as_secs_f64()
            ));
        }
        out
    }
}

/// Times and logs each stage invocation.
pub struct StageRunner {
    log: RunLog,
    report: RunReport,
}

impl StageRunner {
    /// Creates a runner writing to the given run log.
    pub fn new(log: RunLog) -> Self {
        Self {
            log,
            report: RunReport::new(),
        }
    }

    /// Invokes one stage, recording its duration and outcome.
    ///
    /// On success the return value passes through untouched. On failure the
    /// collaborator's error is propagated unchanged inside
    /// `PipelineError::Stage` with the stage name attached.
    pub fn run<T>(
        &mut self,
        stage: &'static str,
        f: impl FnOnce() -> anyhow::Result<T>,
    ) -> Result<T, PipelineError> {
        info!(stage, "starting stage");
        self.log.line(&format!("Starting {stage}"))?;
        let started = Instant::now();

        match f() {
            Ok(value) => {
                let elapsed = started.elapsed();
                info!(stage, elapsed_s = elapsed.as_secs_f64(), "stage complete");
                self.log.line(&format!(
                    "Completed {stage} in {:.2} seconds",
                    elapsed.as_secs_f64()
                ))?;
                self.report.push(stage, elapsed);
                Ok(value)
            }
            Err(source) => {
                error!(stage, %source, "stage failed");
                self.log.line(&format!("Stage {stage} failed: {source}"))?;
                Err(PipelineError::Stage { stage, source })
            }
        }
    }

    /// Attaches a key count to the most recently completed stage.
    pub fn note_count(&mut self, label: &'static str, value: u64) {
        self.report.note_count(label, value);
    }

    /// Writes a free-form timestamped line to the run log.
    pub fn log_line(&mut self, msg: &str) -> Result<(), PipelineError> {
        self.log.line(msg)
    }

    /// Writes the final summary to the log and returns the report.
    pub fn finish(mut self) -> Result<RunReport, PipelineError> {
        let summary = self.report.render();
        info!("{summary}");
        for line in summary.lines() {
            self.log.line(line)?;
        }
        Ok(self.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner_in(dir: &tempfile::TempDir) -> StageRunner {
        let log = RunLog::open(&dir.path().join("log.txt")).unwrap();
        StageRunner::new(log)
    }

    #[test]
    fn test_run_passes_value_through() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = runner_in(&dir);
        let value = runner.run("features", || Ok(42)).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_run_attaches_stage_name_to_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = runner_in(&dir);
        let err = runner
            .run("coverage", || -> anyhow::Result<()> {
                Err(anyhow::anyhow!("bad header"))
            })
            .unwrap_err();
        match err {
            PipelineError::Stage { stage, source } => {
                assert_eq!(stage, "coverage");
                assert_eq!(source.to_string(), "bad header");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_log_records_start_and_elapsed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = runner_in(&dir);
        runner.run("features", || Ok(())).unwrap();
        runner.finish().unwrap();

        let log = std::fs::read_to_string(dir.path().join("log.txt")).unwrap();
        assert!(log.contains("Starting features"));
        assert!(log.contains("Completed features in"));
        assert!(log.contains("Run summary"));
    }

    #[test]
    fn test_report_keeps_stage_order_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = runner_in(&dir);
        runner.run("features", || Ok(())).unwrap();
        runner.note_count("contigs", 10);
        runner.run("coverage", || Ok(())).unwrap();

        let report = runner.finish().unwrap();
        let stages: Vec<&str> = report.stages().iter().map(|s| s.stage).collect();
        assert_eq!(stages, vec!["features", "coverage"]);
        assert_eq!(report.stages()[0].counts, vec![("contigs", 10)]);
    }

    #[test]
    fn test_failed_stage_is_not_reported_as_completed() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = runner_in(&dir);
        runner.run("features", || Ok(())).unwrap();
        let _ = runner.run("coverage", || -> anyhow::Result<()> {
            Err(anyhow::anyhow!("boom"))
        });

        let report = runner.finish().unwrap();
        assert_eq!(report.stages().len(), 1);
        assert_eq!(report.stages()[0].stage, "features");
    }
}
