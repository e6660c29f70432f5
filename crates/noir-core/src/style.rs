//! Style configuration passed to the enhancer on every call.
//!
//! The pipeline never loads or stores these values itself; callers own
//! persistence and hand a `StyleConfig` to each batch or enhancement call.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Master photographer style applied to lighting and mood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MasterStyle {
    /// Balanced, elegant studio lighting
    #[default]
    Signature,
    /// Hard key light, stark high contrast
    RichardAvedon,
    /// Soft natural light, cinematic and raw
    PeterLindbergh,
}

impl MasterStyle {
    pub const ALL: [MasterStyle; 3] = [
        MasterStyle::Signature,
        MasterStyle::RichardAvedon,
        MasterStyle::PeterLindbergh,
    ];

    pub fn id(self) -> &'static str {
        match self {
            MasterStyle::Signature => "signature",
            MasterStyle::RichardAvedon => "richard-avedon",
            MasterStyle::PeterLindbergh => "peter-lindbergh",
        }
    }
}

impl fmt::Display for MasterStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for MasterStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        MasterStyle::ALL
            .into_iter()
            .find(|style| style.id() == s)
            .ok_or_else(|| {
                format!(
                    "unknown master style '{s}' (expected one of: {})",
                    MasterStyle::ALL.map(|m| m.id()).join(", ")
                )
            })
    }
}

/// Studio backdrop behind the subject.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Backdrop {
    /// Let the model pick light, dark, or gradient
    #[default]
    AiChoice,
    PlainLight,
    PlainDark,
    SubtleGradient,
    TexturedCanvas,
    DeepVoid,
    /// Solid colour given as a normalized `#rrggbb` token
    Color(String),
}

impl Backdrop {
    const NAMED_IDS: [&'static str; 6] = [
        "ai-choice",
        "plain-light",
        "plain-dark",
        "subtle-gradient",
        "textured-canvas",
        "deep-void",
    ];

    /// The token used on the command line and in the preference file.
    pub fn token(&self) -> String {
        let id = match self {
            Backdrop::AiChoice => "ai-choice",
            Backdrop::PlainLight => "plain-light",
            Backdrop::PlainDark => "plain-dark",
            Backdrop::SubtleGradient => "subtle-gradient",
            Backdrop::TexturedCanvas => "textured-canvas",
            Backdrop::DeepVoid => "deep-void",
            Backdrop::Color(hex) => return hex.clone(),
        };
        id.to_string()
    }

    pub fn named_ids() -> impl Iterator<Item = &'static str> {
        Self::NAMED_IDS.into_iter()
    }
}

/// Normalize `#rgb` / `#rrggbb` to lowercase `#rrggbb`.
fn parse_hex_color(token: &str) -> Option<String> {
    let digits = token.strip_prefix('#')?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match digits.len() {
        6 => Some(format!("#{}", digits.to_ascii_lowercase())),
        3 => {
            let expanded: String = digits
                .chars()
                .flat_map(|c| [c, c])
                .collect::<String>()
                .to_ascii_lowercase();
            Some(format!("#{expanded}"))
        }
        _ => None,
    }
}

impl FromStr for Backdrop {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('#') {
            return parse_hex_color(s)
                .map(Backdrop::Color)
                .ok_or_else(|| format!("invalid colour token '{s}' (expected #rgb or #rrggbb)"));
        }
        let backdrop = match s.to_ascii_lowercase().as_str() {
            "ai-choice" => Backdrop::AiChoice,
            "plain-light" => Backdrop::PlainLight,
            "plain-dark" => Backdrop::PlainDark,
            "subtle-gradient" => Backdrop::SubtleGradient,
            "textured-canvas" => Backdrop::TexturedCanvas,
            "deep-void" => Backdrop::DeepVoid,
            _ => {
                return Err(format!(
                    "unknown background '{s}' (expected a colour like #1a1a1a or one of: {})",
                    Self::NAMED_IDS.join(", ")
                ))
            }
        };
        Ok(backdrop)
    }
}

impl TryFrom<String> for Backdrop {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Backdrop> for String {
    fn from(value: Backdrop) -> Self {
        value.token()
    }
}

impl fmt::Display for Backdrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

/// Detail level bands used by the prompt composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailBand {
    Soft,
    Natural,
    Crisp,
}

/// Everything the enhancer needs to know about the user's stylistic choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub master_style: MasterStyle,

    /// 0 = soft and smooth, 100 = crisp micro-texture
    pub detail_level: u8,

    pub background: Backdrop,

    /// Allow the model to widen the canvas around a cramped subject
    pub expand_negative_space: bool,

    /// Keep objects the subject interacts with (chairs, props)
    pub preserve_props: bool,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            master_style: MasterStyle::default(),
            detail_level: 30,
            background: Backdrop::default(),
            expand_negative_space: false,
            preserve_props: true,
        }
    }
}

impl StyleConfig {
    pub const MAX_DETAIL: u8 = 100;

    pub fn validate(&self) -> Result<(), String> {
        if self.detail_level > Self::MAX_DETAIL {
            return Err(format!(
                "detail_level must be between 0 and {}, got {}",
                Self::MAX_DETAIL,
                self.detail_level
            ));
        }
        Ok(())
    }

    pub fn detail_band(&self) -> DetailBand {
        match self.detail_level {
            0..=32 => DetailBand::Soft,
            33..=66 => DetailBand::Natural,
            _ => DetailBand::Crisp,
        }
    }
}
