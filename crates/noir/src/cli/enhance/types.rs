//! CLI enum types for the enhance command: face strategy and report format.

use clap::ValueEnum;
use noir_core::ReportFormat;

/// How to settle images where several faces were found.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum FaceStrategy {
    /// Ask for each image (falls back to `largest` without a terminal)
    #[default]
    Prompt,
    /// Pick the face covering the most of the frame
    Largest,
    /// Pick the first face the locator reported
    First,
}

/// Supported report formats.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON document with summary and jobs
    #[default]
    Json,
    /// One JSON object per job (newline-delimited)
    Jsonl,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Jsonl => ReportFormat::JsonLines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_format_from_flag_value() {
        let jsonl = OutputFormat::from_str("JSONL", true).unwrap();
        assert_eq!(ReportFormat::from(jsonl), ReportFormat::JsonLines);
        assert_eq!(ReportFormat::from(OutputFormat::default()), ReportFormat::Json);
        assert!(OutputFormat::from_str("csv", true).is_err());
    }
}
