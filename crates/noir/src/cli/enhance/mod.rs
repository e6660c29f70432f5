//! The `noir enhance` command for batch portrait enhancement.

mod batch;
mod faces;
mod setup;
pub mod types;

pub use types::{FaceStrategy, OutputFormat};

use clap::Args;
use noir_core::imaging::FileDiscovery;
use noir_core::{Backdrop, ImageFile, JobId, JobPipeline, MasterStyle, StyleConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use batch::{print_summary, run_with_progress, write_report, write_results};
use faces::resolve_selections;
use setup::setup_enhance;

/// Arguments for the `enhance` command.
#[derive(Args, Debug)]
pub struct EnhanceArgs {
    /// Image files or directories to enhance
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Photographer style: signature, richard-avedon, peter-lindbergh
    #[arg(short, long)]
    pub style: Option<MasterStyle>,

    /// Backdrop: ai-choice, plain-light, plain-dark, subtle-gradient,
    /// textured-canvas, deep-void, or a colour like #1a1a1a
    #[arg(short, long)]
    pub background: Option<Backdrop>,

    /// Detail level from 0 (soft) to 100 (crisp)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub detail: Option<u8>,

    /// Let the model widen the canvas around a cramped subject
    #[arg(long)]
    pub negative_space: bool,

    /// Remove props the subject interacts with
    #[arg(long)]
    pub no_props: bool,

    /// What to do with images containing several faces
    #[arg(long, value_enum, default_value = "prompt")]
    pub faces: FaceStrategy,

    /// Directory for enhanced images (defaults to [general] output_dir)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Write a job report to this file ("-" for stdout)
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Store the effective style as the new preferences
    #[arg(long)]
    pub save_prefs: bool,
}

/// Manual Default impl for constructing EnhanceArgs outside of clap.
///
/// Values match the clap `#[arg(default_value = ...)]` annotations above.
impl Default for EnhanceArgs {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            style: None,
            background: None,
            detail: None,
            negative_space: false,
            no_props: false,
            faces: FaceStrategy::Prompt,
            output_dir: None,
            report: None,
            format: OutputFormat::Json,
            save_prefs: false,
        }
    }
}

/// Enhance context assembled by setup_enhance().
pub(crate) struct EnhanceContext {
    pub pipeline: JobPipeline,
    pub style: StyleConfig,
    pub output_dir: PathBuf,
}

/// The input path behind each job, for labels and output names.
#[derive(Debug)]
pub(crate) struct Origins(HashMap<JobId, PathBuf>);

impl Origins {
    fn new(ids: &[JobId], paths: &[PathBuf]) -> Self {
        Self(ids.iter().copied().zip(paths.iter().cloned()).collect())
    }

    /// File name shown to the user.
    pub fn label(&self, id: JobId) -> String {
        self.0
            .get(&id)
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.to_string())
    }

    /// Stem used to name the result file.
    pub fn stem(&self, id: JobId) -> String {
        self.0
            .get(&id)
            .and_then(|path| path.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.to_string())
    }
}

/// Execute the enhance command.
pub async fn execute(args: EnhanceArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let ctx = setup_enhance(&args, config_path)?;

    let files = FileDiscovery::new().discover_all(&args.inputs);
    if files.is_empty() {
        tracing::warn!("No supported image files found in {:?}", args.inputs);
        return Ok(());
    }
    tracing::info!(
        "Found {} image(s) ({:.1} MB)",
        files.len(),
        FileDiscovery::total_size(&files) as f64 / 1_000_000.0
    );

    let start_time = std::time::Instant::now();

    let mut images = Vec::with_capacity(files.len());
    for file in &files {
        images.push(ImageFile::read(&file.path).await?);
    }
    let paths: Vec<PathBuf> = files.into_iter().map(|file| file.path).collect();

    let spinner = crate::cli::spinner("Locating faces...");
    let ids = match ctx.pipeline.ingest(images).await {
        Ok(ids) => ids,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e.into());
        }
    };
    ctx.pipeline.settle().await;
    spinner.finish_and_clear();

    let origins = Origins::new(&ids, &paths);
    let status = ctx.pipeline.status();
    tracing::info!(
        "Detection finished: {} ready, {} need a face chosen, {} failed",
        status.ready,
        status.selection_needed,
        status.error
    );

    resolve_selections(&ctx.pipeline, args.faces, &origins).await?;

    let summary = run_with_progress(&ctx.pipeline, &ctx.style, &origins).await?;
    let entries = write_results(&ctx.pipeline, &ctx.output_dir, &origins)?;

    print_summary(&summary, &entries, start_time.elapsed());

    if let Some(report) = &args.report {
        write_report(report, args.format.into(), &summary, &entries)?;
    }

    if summary.failed > 0 && summary.succeeded == 0 {
        anyhow::bail!("All {} enhancement(s) failed", summary.failed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enhance_args_default_faces_is_prompt() {
        let args = EnhanceArgs::default();
        assert_eq!(args.faces, FaceStrategy::Prompt);
        assert!(matches!(args.format, OutputFormat::Json));
    }

    #[test]
    fn enhance_args_default_leaves_style_to_preferences() {
        let args = EnhanceArgs::default();
        assert!(args.style.is_none());
        assert!(args.background.is_none());
        assert!(args.detail.is_none());
        assert!(!args.negative_space);
        assert!(!args.no_props);
        assert!(!args.save_prefs);
    }

    fn job_id(raw: u64) -> JobId {
        serde_json::from_str(&raw.to_string()).unwrap()
    }

    #[test]
    fn origins_fall_back_to_job_id() {
        let ids = [job_id(1), job_id(2)];
        let origins = Origins::new(&ids[..1], &[PathBuf::from("shoot/anna.final.jpg")]);

        assert_eq!(origins.label(ids[0]), "anna.final.jpg");
        assert_eq!(origins.stem(ids[0]), "anna.final");
        assert_eq!(origins.label(ids[1]), "job-2");
    }
}
