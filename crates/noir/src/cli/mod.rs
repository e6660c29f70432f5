//! Command implementations for the `noir` binary.

pub mod config;
pub mod enhance;
pub mod prefs;
pub mod refine;
mod theme;

use std::path::Path;

use noir_core::{AdapterFactory, Config, JobPipeline};

/// Load configuration from `path` when given, else from the default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Config::load_from(path)?
        }
        None => Config::load()?,
    };
    Ok(config)
}

/// Build a pipeline backed by the configured Gemini models.
pub(crate) fn build_pipeline(config: &Config) -> anyhow::Result<JobPipeline> {
    let adapters = AdapterFactory::gemini(&config.gemini).map_err(|e| {
        anyhow::anyhow!("{e}\n\n  Hint: export GEMINI_API_KEY or set [gemini] api_key in the config file.")
    })?;
    Ok(JobPipeline::new(config, adapters))
}

/// A spinner on stderr for waits with no measurable progress.
pub(crate) fn spinner(message: &str) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Duration;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn explicit_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[crop]\npadding = 3.0\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.crop.padding, 3.0);
    }
}
