//! Enhance setup: config, preferences, style overrides, pipeline construction.

use noir_core::StyleConfig;
use std::path::Path;

use super::{EnhanceArgs, EnhanceContext};
use crate::cli::prefs::PreferenceStore;

/// Validate inputs, resolve the effective style, and build the pipeline.
pub fn setup_enhance(
    args: &EnhanceArgs,
    config_path: Option<&Path>,
) -> anyhow::Result<EnhanceContext> {
    if let Some(missing) = args.inputs.iter().find(|path| !path.exists()) {
        anyhow::bail!(
            "Input path does not exist: {:?}\n\n  Hint: Check the file path and try again.",
            missing
        );
    }

    let config = crate::cli::load_config(config_path)?;

    let prefs = PreferenceStore::open_default();
    let style = apply_overrides(prefs.load(), args);
    style.validate().map_err(anyhow::Error::msg)?;

    if args.save_prefs {
        prefs.save(&style)?;
        tracing::info!("Preferences saved to {:?}", prefs.path());
    }

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output_dir());

    let pipeline = crate::cli::build_pipeline(&config)?;

    Ok(EnhanceContext {
        pipeline,
        style,
        output_dir,
    })
}

/// Flags given on the command line win over stored preferences.
pub fn apply_overrides(mut style: StyleConfig, args: &EnhanceArgs) -> StyleConfig {
    if let Some(master) = args.style {
        style.master_style = master;
    }
    if let Some(background) = &args.background {
        style.background = background.clone();
    }
    if let Some(detail) = args.detail {
        style.detail_level = detail;
    }
    if args.negative_space {
        style.expand_negative_space = true;
    }
    if args.no_props {
        style.preserve_props = false;
    }
    style
}

#[cfg(test)]
mod tests {
    use super::*;
    use noir_core::{Backdrop, MasterStyle};

    #[test]
    fn no_flags_keeps_preferences() {
        let stored = StyleConfig {
            master_style: MasterStyle::RichardAvedon,
            detail_level: 70,
            ..StyleConfig::default()
        };
        let style = apply_overrides(stored.clone(), &EnhanceArgs::default());
        assert_eq!(style, stored);
    }

    #[test]
    fn flags_override_preferences() {
        let args = EnhanceArgs {
            style: Some(MasterStyle::PeterLindbergh),
            background: Some(Backdrop::DeepVoid),
            detail: Some(10),
            negative_space: true,
            no_props: true,
            ..EnhanceArgs::default()
        };
        let style = apply_overrides(StyleConfig::default(), &args);

        assert_eq!(style.master_style, MasterStyle::PeterLindbergh);
        assert_eq!(style.background, Backdrop::DeepVoid);
        assert_eq!(style.detail_level, 10);
        assert!(style.expand_negative_space);
        assert!(!style.preserve_props);
    }
}
