//! The `noir prefs` command and the style preference store.
//!
//! Preferences live in `preferences.toml` beside the config file. They are
//! loaded once at the start of a command and written back whenever they
//! change; edits go through `toml_edit` so comments a user adds survive.

use clap::{Args, Subcommand};
use noir_core::{Backdrop, Config, MasterStyle, StyleConfig};
use std::path::{Path, PathBuf};

/// Arguments for the `prefs` command.
#[derive(Args, Debug)]
pub struct PrefsArgs {
    #[command(subcommand)]
    pub command: PrefsCommand,
}

/// Subcommands for preference management.
#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
    /// Display the stored style preferences
    Show,

    /// Change one preference
    ///
    /// Keys: style, background, detail, negative-space, props
    Set {
        /// Preference name
        key: String,
        /// New value
        value: String,
    },

    /// Forget stored preferences and return to defaults
    Reset,

    /// Show preference file path
    Path,
}

/// Execute the prefs command.
pub async fn execute(args: PrefsArgs) -> anyhow::Result<()> {
    let store = PreferenceStore::open_default();

    match args.command {
        PrefsCommand::Show => {
            let style = store.load();
            println!("{}", toml::to_string_pretty(&style)?);
        }

        PrefsCommand::Set { key, value } => {
            let style = store.set(&key, &value)?;
            tracing::info!("Preference {} updated", key);
            println!("{}", toml::to_string_pretty(&style)?);
        }

        PrefsCommand::Reset => {
            if store.reset()? {
                println!("Preferences reset to defaults.");
            } else {
                println!("No stored preferences; defaults already in effect.");
            }
        }

        PrefsCommand::Path => {
            println!("{}", store.path().display());
        }
    }

    Ok(())
}

/// Load-at-start / save-on-change persistence of a [`StyleConfig`].
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub const FILE_NAME: &'static str = "preferences.toml";

    /// The store in the platform config directory.
    pub fn open_default() -> Self {
        Self::at(Config::config_dir().join(Self::FILE_NAME))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored preferences, or defaults when the file is missing or unusable.
    ///
    /// A damaged file never blocks a run; it is reported and ignored until the
    /// next save replaces it.
    pub fn load(&self) -> StyleConfig {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StyleConfig::default(),
            Err(e) => {
                tracing::warn!("Cannot read preferences at {:?}: {e}", self.path);
                return StyleConfig::default();
            }
        };

        match toml::from_str::<StyleConfig>(&content) {
            Ok(style) => match style.validate() {
                Ok(()) => style,
                Err(e) => {
                    tracing::warn!("Ignoring invalid preferences at {:?}: {e}", self.path);
                    StyleConfig::default()
                }
            },
            Err(e) => {
                tracing::warn!("Ignoring unparsable preferences at {:?}: {e}", self.path);
                StyleConfig::default()
            }
        }
    }

    /// Write every field of `style`, keeping unrelated keys and comments.
    pub fn save(&self, style: &StyleConfig) -> anyhow::Result<()> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let mut doc: toml_edit::DocumentMut = content.parse().unwrap_or_default();

        doc["master_style"] = toml_edit::value(style.master_style.id());
        doc["detail_level"] = toml_edit::value(i64::from(style.detail_level));
        doc["background"] = toml_edit::value(style.background.token());
        doc["expand_negative_space"] = toml_edit::value(style.expand_negative_space);
        doc["preserve_props"] = toml_edit::value(style.preserve_props);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, doc.to_string())?;
        tracing::debug!("Preferences saved to {:?}", self.path);
        Ok(())
    }

    /// Change one key and persist the result.
    pub fn set(&self, key: &str, value: &str) -> anyhow::Result<StyleConfig> {
        let mut style = self.load();
        apply_setting(&mut style, key, value)?;
        self.save(&style)?;
        Ok(style)
    }

    /// Delete the file. Returns whether anything was stored.
    pub fn reset(&self) -> anyhow::Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn apply_setting(style: &mut StyleConfig, key: &str, value: &str) -> anyhow::Result<()> {
    match key.trim().to_ascii_lowercase().replace('_', "-").as_str() {
        "style" | "master-style" => {
            style.master_style = value.parse::<MasterStyle>().map_err(anyhow::Error::msg)?;
        }
        "background" | "backdrop" => {
            style.background = value.parse::<Backdrop>().map_err(anyhow::Error::msg)?;
        }
        "detail" | "detail-level" => {
            let level: u8 = value
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("detail must be a number from 0 to 100"))?;
            style.detail_level = level;
        }
        "negative-space" | "expand-negative-space" => {
            style.expand_negative_space = parse_bool(value)?;
        }
        "props" | "preserve-props" => {
            style.preserve_props = parse_bool(value)?;
        }
        other => anyhow::bail!(
            "Unknown preference '{other}'\n\n  Hint: use one of style, background, detail, negative-space, props."
        ),
    }
    style.validate().map_err(anyhow::Error::msg)
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => anyhow::bail!("expected true or false, got '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, PreferenceStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::at(dir.path().join("nested").join("preferences.toml"));
        (dir, store)
    }

    #[test]
    fn missing_file_loads_defaults() {
        let (_dir, store) = store();
        assert_eq!(store.load(), StyleConfig::default());
    }

    #[test]
    fn save_then_load() {
        let (_dir, store) = store();
        let style = StyleConfig {
            master_style: MasterStyle::RichardAvedon,
            detail_level: 75,
            background: Backdrop::Color("#1a1a1a".to_string()),
            expand_negative_space: true,
            preserve_props: false,
        };
        store.save(&style).unwrap();
        assert_eq!(store.load(), style);
    }

    #[test]
    fn save_keeps_user_comments() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "# picked for the spring shoot\ndetail_level = 10\n").unwrap();

        store.set("detail", "55").unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.contains("# picked for the spring shoot"));
        assert_eq!(store.load().detail_level, 55);
    }

    #[test]
    fn set_rejects_bad_values_without_writing() {
        let (_dir, store) = store();
        assert!(store.set("detail", "150").is_err());
        assert!(store.set("style", "ansel-adams").is_err());
        assert!(store.set("props", "maybe").is_err());
        assert!(store.set("lens", "85mm").is_err());
        assert!(!store.path().exists());
    }

    #[test]
    fn set_accepts_aliases() {
        let (_dir, store) = store();
        store.set("master_style", "peter-lindbergh").unwrap();
        store.set("negative-space", "yes").unwrap();
        let style = store.set("background", "#FFF").unwrap();

        assert_eq!(style.master_style, MasterStyle::PeterLindbergh);
        assert!(style.expand_negative_space);
        assert_eq!(style.background, Backdrop::Color("#ffffff".to_string()));
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "master_style = [").unwrap();
        assert_eq!(store.load(), StyleConfig::default());

        std::fs::write(store.path(), "detail_level = 240\n").unwrap();
        assert_eq!(store.load(), StyleConfig::default());
    }

    #[test]
    fn reset_removes_file() {
        let (_dir, store) = store();
        assert!(!store.reset().unwrap());
        store.save(&StyleConfig::default()).unwrap();
        assert!(store.reset().unwrap());
        assert!(!store.path().exists());
    }
}
