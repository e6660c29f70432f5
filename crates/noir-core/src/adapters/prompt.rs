//! Instruction text sent to the image model.
//!
//! Fragments are selected from the style configuration and assembled into
//! one instruction. The wording can change freely; the selection cannot.

use crate::style::{Backdrop, DetailBand, MasterStyle, StyleConfig};

/// Instruction used by the face locator.
pub const FACE_DETECTION_PROMPT: &str = "Locate every human face in this image. \
For each face return an object with x, y, width and height giving its bounding box \
as fractions of the image width and height (0 to 1, origin top-left). \
Order faces from left to right. Return an empty array when there are no faces.";

pub fn background_instruction(background: &Backdrop) -> String {
    match background {
        Backdrop::AiChoice => "Pick the studio backdrop (light, dark or gradient) that best \
            suits this subject and the chosen lighting style."
            .to_string(),
        Backdrop::PlainLight => "Use a seamless studio backdrop in soft white or pale grey with \
            gentle depth, never a flat digital white."
            .to_string(),
        Backdrop::PlainDark => "Use a seamless studio backdrop in deep charcoal with gentle \
            depth, never a flat digital black."
            .to_string(),
        Backdrop::SubtleGradient => "Use a studio backdrop with a smooth, restrained gradient \
            through mid greys that draws the eye to the subject."
            .to_string(),
        Backdrop::TexturedCanvas => "Use a hand-painted canvas backdrop whose texture is only \
            visible on close inspection."
            .to_string(),
        Backdrop::DeepVoid => "Use pure black behind the subject, letting the light fall off \
            into darkness with no visible backdrop edges."
            .to_string(),
        Backdrop::Color(hex) => format!(
            "Use a seamless studio backdrop in the solid colour {hex}, rendered with gentle depth \
             rather than a flat fill."
        ),
    }
}

pub fn master_style_instruction(style: MasterStyle) -> &'static str {
    match style {
        MasterStyle::Signature => {
            "Light the subject with soft, directional studio light that sculpts the features. \
             The mood is calm, confident and timeless."
        }
        MasterStyle::RichardAvedon => {
            "Light the subject with a hard key light in the manner of Richard Avedon: crisp \
             shadows, bright highlights, a stark and graphic mood."
        }
        MasterStyle::PeterLindbergh => {
            "Light the subject with soft, natural-feeling light in the manner of Peter Lindbergh: \
             cinematic, rich mid-tones, an honest and slightly raw mood."
        }
    }
}

pub fn detail_instruction(band: DetailBand) -> &'static str {
    match band {
        DetailBand::Soft => "Keep the finish soft and smooth; tonal harmony matters more than sharpness.",
        DetailBand::Natural => "Keep the finish natural, with lifelike detail that is neither soft nor over-sharpened.",
        DetailBand::Crisp => "Make the finish crisp, bringing out micro-texture in skin, fabric and hair.",
    }
}

fn props_instruction(preserve_props: bool) -> &'static str {
    if preserve_props {
        "Treat anything the subject sits on, leans on or holds as part of the subject and keep it."
    } else {
        "Keep only the person; remove every other object, including ones the subject touches."
    }
}

const NEGATIVE_SPACE_INSTRUCTION: &str = "If the subject is cramped against the frame edges, \
extend the canvas just enough to give balanced breathing room, matching the backdrop. \
Do not rescale or change the existing content.";

/// Build the full enhancement instruction for `style`.
pub fn enhancement_prompt(style: &StyleConfig) -> String {
    let mut steps = vec![
        props_instruction(style.preserve_props).to_string(),
        "Remove the original background and any clutter around the subject.".to_string(),
        background_instruction(&style.background),
        "Add soft, physically plausible shadows that match the original light direction."
            .to_string(),
        format!(
            "{} {}",
            master_style_instruction(style.master_style),
            detail_instruction(style.detail_band())
        ),
        "Retouch skin while keeping pores and fine lines; it must never look airbrushed."
            .to_string(),
    ];
    if style.expand_negative_space {
        steps.push(NEGATIVE_SPACE_INSTRUCTION.to_string());
    }

    let numbered: Vec<String> = steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}", i + 1, step))
        .collect();

    format!(
        "Retouch this photograph into a high-end black and white studio portrait.\n\
         Never change the subject's face, identity, expression, pose or clothing, \
         and keep the original framing unless told otherwise below.\n\n\
         {}\n\n\
         Output a single clean black and white photograph with no text or watermark.",
        numbered.join("\n")
    )
}

/// Wrap a user instruction for the refiner.
pub fn refinement_prompt(instruction: &str, reference_count: usize, think_harder: bool) -> String {
    let mut prompt = String::new();
    if think_harder {
        prompt.push_str(
            "Before editing, study the image and the request carefully and plan the change \
             so the result is coherent with the existing lighting and tones.\n\n",
        );
    }
    prompt.push_str(
        "The first image is a finished black and white portrait. Apply only the following \
         change and keep everything else identical:\n",
    );
    prompt.push_str(instruction.trim());
    if reference_count > 0 {
        prompt.push_str(&format!(
            "\n\nThe {reference_count} image(s) after the first are references for this change."
        ));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhancement_prompt_reflects_style() {
        let style = StyleConfig {
            master_style: MasterStyle::RichardAvedon,
            detail_level: 90,
            background: Backdrop::Color("#112233".to_string()),
            expand_negative_space: false,
            preserve_props: true,
        };
        let prompt = enhancement_prompt(&style);
        assert!(prompt.contains("Richard Avedon"));
        assert!(prompt.contains("#112233"));
        assert!(prompt.contains(detail_instruction(DetailBand::Crisp)));
        assert!(prompt.contains("part of the subject"));
        assert!(!prompt.contains(NEGATIVE_SPACE_INSTRUCTION));
    }

    #[test]
    fn test_negative_space_appended_last() {
        let style = StyleConfig {
            expand_negative_space: true,
            ..StyleConfig::default()
        };
        let prompt = enhancement_prompt(&style);
        assert!(prompt.contains("7. If the subject is cramped"));
    }

    #[test]
    fn test_props_toggle_switches_instruction() {
        let style = StyleConfig {
            preserve_props: false,
            ..StyleConfig::default()
        };
        assert!(enhancement_prompt(&style).contains("Keep only the person"));
    }

    #[test]
    fn test_every_named_backdrop_has_distinct_instruction() {
        let mut seen = std::collections::HashSet::new();
        for id in Backdrop::named_ids() {
            let backdrop: Backdrop = id.parse().unwrap();
            assert!(seen.insert(background_instruction(&backdrop)), "{id}");
        }
    }

    #[test]
    fn test_refinement_prompt() {
        let plain = refinement_prompt("  brighten the left cheek ", 0, false);
        assert!(plain.ends_with("brighten the left cheek"));
        assert!(!plain.contains("references"));
        assert!(!plain.contains("Before editing"));

        let rich = refinement_prompt("match the jacket", 2, true);
        assert!(rich.starts_with("Before editing"));
        assert!(rich.contains("2 image(s)"));
    }
}
