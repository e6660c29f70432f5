//! Resolving images where the locator found more than one face.

use console::Term;
use dialoguer::Select;
use noir_core::{FaceRegion, JobPipeline, JobState};

use super::types::FaceStrategy;
use super::Origins;
use crate::cli::theme;

/// Pick a face for every job waiting on a selection.
///
/// `Prompt` asks once per job on a terminal; without one it behaves like
/// `Largest`. Crop failures are recorded on the job and reported here, not
/// returned, so one bad image doesn't stop the others.
pub async fn resolve_selections(
    pipeline: &JobPipeline,
    strategy: FaceStrategy,
    origins: &Origins,
) -> anyhow::Result<()> {
    let waiting: Vec<_> = pipeline
        .jobs()
        .into_iter()
        .filter(|job| job.state() == JobState::SelectionNeeded)
        .collect();
    if waiting.is_empty() {
        return Ok(());
    }

    let strategy = if strategy == FaceStrategy::Prompt && !Term::stderr().is_term() {
        tracing::warn!("No terminal for face selection; using the largest face");
        FaceStrategy::Largest
    } else {
        strategy
    };

    let theme = theme::noir_theme();
    for job in waiting {
        let label = origins.label(job.id());
        let index = match strategy {
            FaceStrategy::Largest => largest_face(job.faces()),
            FaceStrategy::First => 0,
            FaceStrategy::Prompt => {
                let items: Vec<String> = job
                    .faces()
                    .iter()
                    .enumerate()
                    .map(|(i, face)| describe_face(i, face))
                    .collect();
                let choice = Select::with_theme(&theme)
                    .with_prompt(format!("{} faces in {label}; which one?", items.len()))
                    .items(&items)
                    .default(largest_face(job.faces()))
                    .interact_opt()?;
                match choice {
                    Some(index) => index,
                    None => anyhow::bail!("Face selection cancelled"),
                }
            }
        };

        tracing::debug!(
            "Selected face {} of {} in {}",
            index + 1,
            job.faces().len(),
            label
        );
        if pipeline.select_face(job.id(), index).await? == JobState::Error {
            tracing::warn!("Could not crop the chosen face in {label}; using the full image");
        }
    }

    Ok(())
}

/// Index of the face with the largest area; ties go to the earlier face.
pub fn largest_face(faces: &[FaceRegion]) -> usize {
    faces
        .iter()
        .enumerate()
        .fold((0, f32::MIN), |(best, best_area), (i, face)| {
            if face.area() > best_area {
                (i, face.area())
            } else {
                (best, best_area)
            }
        })
        .0
}

/// One prompt line: position in the frame plus relative size.
pub fn describe_face(index: usize, face: &FaceRegion) -> String {
    let (cx, cy) = face.center();
    let horizontal = match cx {
        x if x < 0.33 => "left",
        x if x > 0.67 => "right",
        _ => "center",
    };
    let vertical = match cy {
        y if y < 0.33 => "top",
        y if y > 0.67 => "bottom",
        _ => "middle",
    };
    format!(
        "Face {} ({vertical} {horizontal}, {:.0}% of frame)",
        index + 1,
        face.area() * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn largest_face_by_area() {
        let faces = [
            FaceRegion::new(0.1, 0.1, 0.1, 0.1),
            FaceRegion::new(0.5, 0.2, 0.3, 0.3),
            FaceRegion::new(0.2, 0.6, 0.2, 0.2),
        ];
        assert_eq!(largest_face(&faces), 1);
    }

    #[test]
    fn largest_face_tie_prefers_first() {
        let faces = [
            FaceRegion::new(0.0, 0.0, 0.2, 0.2),
            FaceRegion::new(0.5, 0.5, 0.2, 0.2),
        ];
        assert_eq!(largest_face(&faces), 0);
    }

    #[test]
    fn describe_face_mentions_position_and_size() {
        let line = describe_face(1, &FaceRegion::new(0.7, 0.05, 0.2, 0.2));
        assert_eq!(line, "Face 2 (top right, 4% of frame)");
    }
}
