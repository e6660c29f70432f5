//! Batch reports in JSON or JSON Lines.
//!
//! JSON writes one document holding the summary and every job; JSONL writes
//! one job per line, for piping into line-oriented tools.

use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::pipeline::{BatchSummary, JobSnapshot};

/// Report format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Single JSON document
    #[default]
    Json,
    /// One JSON object per line (newline-delimited JSON)
    JsonLines,
}

/// One job's line in a report: its snapshot plus where its result was saved.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    #[serde(flatten)]
    pub job: JobSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report<'a> {
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a BatchSummary>,
    jobs: &'a [ReportEntry],
}

/// A writer that serializes reports to JSON or JSONL.
pub struct ReportWriter<W: Write> {
    writer: W,
    format: ReportFormat,
    pretty: bool,
}

impl<W: Write> ReportWriter<W> {
    /// `pretty` only affects the JSON format.
    pub fn new(writer: W, format: ReportFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
        }
    }

    /// Write a full report. JSONL omits the summary.
    pub fn write_report(
        &mut self,
        summary: Option<&BatchSummary>,
        entries: &[ReportEntry],
    ) -> io::Result<()> {
        match self.format {
            ReportFormat::Json => {
                let report = Report {
                    version: crate::VERSION,
                    summary,
                    jobs: entries,
                };
                if self.pretty {
                    serde_json::to_writer_pretty(&mut self.writer, &report)
                        .map_err(io::Error::other)?;
                } else {
                    serde_json::to_writer(&mut self.writer, &report).map_err(io::Error::other)?;
                }
                writeln!(self.writer)?;
            }
            ReportFormat::JsonLines => {
                for entry in entries {
                    serde_json::to_writer(&mut self.writer, entry).map_err(io::Error::other)?;
                    writeln!(self.writer)?;
                }
            }
        }
        self.writer.flush()
    }

    /// Consume the writer and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
