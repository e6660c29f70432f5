//! The `noir refine` command: one-shot revision of an enhanced image.
//!
//! The target is adopted as a finished job as is; references are
//! size-bounded but otherwise sent whole, without face detection.

use clap::Args;
use noir_core::{ImageFile, RefineOptions};
use std::path::{Path, PathBuf};

/// Arguments for the `refine` command.
#[derive(Args, Debug)]
pub struct RefineArgs {
    /// Enhanced image to revise
    #[arg(required = true)]
    pub target: PathBuf,

    /// What to change, in plain words
    #[arg(short, long)]
    pub instruction: String,

    /// Image to borrow from (lighting, expression, detail); repeatable
    #[arg(short = 'r', long = "reference")]
    pub references: Vec<PathBuf>,

    /// Ask the model to analyze the image before editing
    #[arg(long)]
    pub think_harder: bool,

    /// Where to write the result (defaults to <output-dir>/<stem>-refined.<ext>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the refine command.
pub async fn execute(args: RefineArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    if args.instruction.trim().is_empty() {
        anyhow::bail!("The refinement instruction must not be empty");
    }
    for path in std::iter::once(&args.target).chain(&args.references) {
        if !path.is_file() {
            anyhow::bail!(
                "Input file does not exist: {:?}\n\n  Hint: Check the file path and try again.",
                path
            );
        }
    }

    let config = super::load_config(config_path)?;
    let pipeline = super::build_pipeline(&config)?;

    let target = ImageFile::read(&args.target).await?;
    let target_id = pipeline.adopt_enhanced(target);

    let reference_ids = if args.references.is_empty() {
        Vec::new()
    } else {
        let mut references = Vec::with_capacity(args.references.len());
        for path in &args.references {
            references.push(ImageFile::read(path).await?);
        }
        let spinner = super::spinner("Preparing references...");
        let ids = pipeline.adopt_references(references).await;
        spinner.finish_and_clear();
        ids?
    };
    tracing::debug!("Refining with {} reference(s)", reference_ids.len());

    let options = RefineOptions {
        think_harder: args.think_harder,
    };
    let spinner = super::spinner("Refining...");
    let result = pipeline
        .refine(target_id, &args.instruction, &reference_ids, options)
        .await;
    spinner.finish_and_clear();
    let result = result?;

    let output = args.output.clone().unwrap_or_else(|| {
        default_output_path(&config.output_dir(), &args.target, result.extension())
    });
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output, result.bytes())?;

    tracing::info!("Refined image written to {:?}", output);
    eprintln!("  {} {}", super::theme::ok_mark(), output.display());
    Ok(())
}

/// `<dir>/<target stem>-refined.<ext>`
fn default_output_path(dir: &Path, target: &Path, ext: &str) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    dir.join(format!("{stem}-refined.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_uses_target_stem() {
        let path = default_output_path(Path::new("out"), Path::new("shoot/anna-noir.png"), "png");
        assert_eq!(path, PathBuf::from("out/anna-noir-refined.png"));
    }

    #[tokio::test]
    async fn empty_instruction_is_rejected_before_any_work() {
        let args = RefineArgs {
            target: PathBuf::from("does-not-matter.png"),
            instruction: "   ".to_string(),
            references: Vec::new(),
            think_harder: false,
            output: None,
        };
        let err = execute(args, None).await.unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[tokio::test]
    async fn missing_target_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let args = RefineArgs {
            target: dir.path().join("absent.png"),
            instruction: "brighten".to_string(),
            references: Vec::new(),
            think_harder: false,
            output: None,
        };
        let err = execute(args, None).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
