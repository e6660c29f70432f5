//! Batch run with progress, result files, summary table, and report.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use noir_core::{
    BatchEvent, BatchSummary, JobOutcome, JobPipeline, JobState, ReportEntry, ReportFormat,
    ReportWriter, StyleConfig,
};

use super::Origins;
use crate::cli::theme;

/// Run every eligible job with a progress bar on stderr.
pub async fn run_with_progress(
    pipeline: &JobPipeline,
    style: &StyleConfig,
    origins: &Origins,
) -> anyhow::Result<BatchSummary> {
    let progress = create_progress_bar();

    let summary = pipeline
        .run_batch(style, |event| match event {
            BatchEvent::Started { total } => {
                progress.set_length(total as u64);
                progress.set_message("starting...");
            }
            BatchEvent::JobStarted { id, .. } => {
                progress.set_message(origins.label(id));
            }
            BatchEvent::JobFinished { id, outcome, .. } => {
                if let JobOutcome::Failed { reason } = &outcome {
                    progress.println(format!(
                        "  {} {}: {}",
                        theme::fail_mark(),
                        origins.label(id),
                        reason
                    ));
                }
                progress.inc(1);
            }
            BatchEvent::Finished { .. } => progress.finish_and_clear(),
        })
        .await;

    if summary.is_err() {
        progress.finish_and_clear();
    }
    Ok(summary?)
}

/// Write every finished job's result into `output_dir` and build the report entries.
///
/// Results are named `<stem>-noir.<ext>` after the input file; a stem seen
/// twice in one run gets a numeric suffix instead of overwriting.
pub fn write_results(
    pipeline: &JobPipeline,
    output_dir: &Path,
    origins: &Origins,
) -> anyhow::Result<Vec<ReportEntry>> {
    let jobs = pipeline.jobs();
    if jobs.iter().any(|job| job.result().is_some()) {
        std::fs::create_dir_all(output_dir)?;
    }

    let mut taken = HashSet::new();
    let mut entries = Vec::with_capacity(jobs.len());
    for job in jobs {
        let output_path = match (job.state(), job.result()) {
            (JobState::Done, Some(result)) => {
                let path = unique_output_path(
                    output_dir,
                    &origins.stem(job.id()),
                    result.extension(),
                    &mut taken,
                );
                std::fs::write(&path, result.bytes())?;
                tracing::debug!("Wrote {} to {:?}", job.id(), path);
                Some(path)
            }
            _ => None,
        };
        let mut snapshot = job.snapshot();
        snapshot.name = origins.label(job.id());
        entries.push(ReportEntry {
            job: snapshot,
            output_path,
        });
    }
    Ok(entries)
}

/// `<dir>/<stem>-noir.<ext>`, or `<stem>-noir-<n>.<ext>` when already used this run.
pub fn unique_output_path(
    dir: &Path,
    stem: &str,
    ext: &str,
    taken: &mut HashSet<PathBuf>,
) -> PathBuf {
    let mut path = dir.join(format!("{stem}-noir.{ext}"));
    let mut n = 2;
    while !taken.insert(path.clone()) {
        path = dir.join(format!("{stem}-noir-{n}.{ext}"));
        n += 1;
    }
    path
}

/// Write the report to `path`, or to stdout when `path` is `-`.
pub fn write_report(
    path: &Path,
    format: ReportFormat,
    summary: &BatchSummary,
    entries: &[ReportEntry],
) -> anyhow::Result<()> {
    if path == Path::new("-") {
        let stdout = std::io::stdout();
        write_report_to(stdout.lock(), format, summary, entries)?;
    } else {
        let file = File::create(path)?;
        write_report_to(BufWriter::new(file), format, summary, entries)?;
        tracing::info!("Report written to {:?}", path);
    }
    Ok(())
}

fn write_report_to<W: Write>(
    writer: W,
    format: ReportFormat,
    summary: &BatchSummary,
    entries: &[ReportEntry],
) -> std::io::Result<()> {
    ReportWriter::new(writer, format, true).write_report(Some(summary), entries)
}

/// Create a progress bar for the batch run.
fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Print a formatted summary table after the batch.
pub fn print_summary(summary: &BatchSummary, entries: &[ReportEntry], elapsed: Duration) {
    let dim = theme::dim();

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    for entry in entries {
        match (&entry.output_path, &entry.job.failure_reason) {
            (Some(path), _) => eprintln!(
                "    {} {} {}",
                theme::ok_mark(),
                entry.job.name,
                dim.apply_to(format!("→ {}", path.display()))
            ),
            (None, Some(reason)) => eprintln!(
                "    {} {} {}",
                theme::fail_mark(),
                entry.job.name,
                dim.apply_to(reason)
            ),
            (None, None) => eprintln!(
                "    {} {} {}",
                dim.apply_to("·"),
                entry.job.name,
                dim.apply_to(entry.job.state.to_string())
            ),
        }
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Succeeded:    {:>8}", summary.succeeded);
    if summary.failed > 0 {
        eprintln!("    Failed:       {:>8}", summary.failed);
    }
    eprintln!("    Attempted:    {:>8}", summary.attempted);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("  ====================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_uses_noir_suffix() {
        let mut taken = HashSet::new();
        let path = unique_output_path(Path::new("out"), "portrait", "png", &mut taken);
        assert_eq!(path, PathBuf::from("out/portrait-noir.png"));
    }

    #[test]
    fn repeated_stem_gets_numbered() {
        let mut taken = HashSet::new();
        let dir = Path::new("out");
        let first = unique_output_path(dir, "a", "png", &mut taken);
        let second = unique_output_path(dir, "a", "png", &mut taken);
        let third = unique_output_path(dir, "a", "png", &mut taken);
        let other_ext = unique_output_path(dir, "a", "jpg", &mut taken);

        assert_eq!(first, dir.join("a-noir.png"));
        assert_eq!(second, dir.join("a-noir-2.png"));
        assert_eq!(third, dir.join("a-noir-3.png"));
        assert_eq!(other_ext, dir.join("a-noir.jpg"));
    }

    #[test]
    fn report_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let summary = BatchSummary::default();
        write_report(&path, ReportFormat::Json, &summary, &[]).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["summary"]["attempted"], 0);
        assert!(value["jobs"].as_array().unwrap().is_empty());
    }
}
