//! One uploaded image's processing record.
//!
//! Fields are private; the pipeline moves a job between states only through
//! the `pub(crate)` transitions below, each of which checks the current state
//! and keeps the file references consistent with it.

use serde::Serialize;

use crate::types::{DisplaySource, FaceRegion, ImageFile, JobId, JobState};

/// A job and everything known about it so far.
///
/// Cloning is cheap: image bytes are shared.
#[derive(Debug, Clone)]
pub struct ImageJob {
    id: JobId,
    source: ImageFile,
    crop: Option<ImageFile>,
    display: DisplaySource,
    faces: Vec<FaceRegion>,
    selected_face: Option<usize>,
    process_input: Option<ImageFile>,
    result: Option<ImageFile>,
    state: JobState,
    failure_reason: Option<String>,
}

impl ImageJob {
    pub(crate) fn new(id: JobId, source: ImageFile) -> Self {
        Self {
            id,
            source,
            crop: None,
            display: DisplaySource::Original,
            faces: Vec::new(),
            selected_face: None,
            process_input: None,
            result: None,
            state: JobState::Detecting,
            failure_reason: None,
        }
    }

    /// A job that starts out finished, for refining an existing result.
    pub(crate) fn finished(id: JobId, file: ImageFile) -> Self {
        Self {
            process_input: Some(file.clone()),
            result: Some(file.clone()),
            state: JobState::Done,
            ..Self::new(id, file)
        }
    }

    /// A job holding a preprocessed image that is only used as a reference.
    ///
    /// It skips detection and is sent whole.
    pub(crate) fn reference(id: JobId, file: ImageFile) -> Self {
        Self {
            process_input: Some(file.clone()),
            state: JobState::Ready,
            ..Self::new(id, file)
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// The preprocessed original.
    pub fn source(&self) -> &ImageFile {
        &self.source
    }

    pub fn crop(&self) -> Option<&ImageFile> {
        self.crop.as_ref()
    }

    pub fn display_source(&self) -> DisplaySource {
        self.display
    }

    /// The file the presentation layer should show for this job.
    pub fn display_file(&self) -> &ImageFile {
        match (self.display, &self.crop) {
            (DisplaySource::Crop, Some(crop)) => crop,
            _ => &self.source,
        }
    }

    pub fn faces(&self) -> &[FaceRegion] {
        &self.faces
    }

    pub fn selected_face(&self) -> Option<usize> {
        self.selected_face
    }

    /// The file sent for enhancement.
    pub fn process_input(&self) -> Option<&ImageFile> {
        self.process_input.as_ref()
    }

    pub fn result(&self) -> Option<&ImageFile> {
        self.result.as_ref()
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// The best available image of this job for use as a refinement reference:
    /// its result, else its process input, else its source.
    pub fn reference_image(&self) -> &ImageFile {
        self.result
            .as_ref()
            .or(self.process_input.as_ref())
            .unwrap_or(&self.source)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            name: self.source.name().to_string(),
            state: self.state,
            faces: self.faces.len(),
            selected_face: self.selected_face,
            display: self.display,
            failure_reason: self.failure_reason.clone(),
            result: self.result.as_ref().map(|r| r.name().to_string()),
        }
    }

    fn expect_state(&self, allowed: &[JobState], action: &str) -> Result<(), String> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(format!("cannot {action} {} while {}", self.id, self.state))
        }
    }

    // --- Transitions ---

    /// Detection found no face: enhance the whole image.
    pub(crate) fn no_faces_found(&mut self) -> Result<(), String> {
        self.expect_state(&[JobState::Detecting], "record faces for")?;
        self.faces.clear();
        self.process_input = Some(self.source.clone());
        self.state = JobState::Ready;
        Ok(())
    }

    /// Detection found several faces: wait for the user to choose.
    pub(crate) fn faces_need_selection(&mut self, faces: Vec<FaceRegion>) -> Result<(), String> {
        self.expect_state(&[JobState::Detecting], "record faces for")?;
        self.faces = faces;
        self.state = JobState::SelectionNeeded;
        Ok(())
    }

    /// Record the single detected face before cropping it.
    pub(crate) fn single_face_found(&mut self, face: FaceRegion) -> Result<(), String> {
        self.expect_state(&[JobState::Detecting], "record faces for")?;
        self.faces = vec![face];
        Ok(())
    }

    /// A crop around `index` is ready; the job can be enhanced.
    pub(crate) fn face_cropped(&mut self, index: usize, crop: ImageFile) -> Result<(), String> {
        self.expect_state(&[JobState::Detecting, JobState::SelectionNeeded], "crop")?;
        if index >= self.faces.len() {
            return Err(format!("face index {index} out of range for {}", self.id));
        }
        self.selected_face = Some(index);
        self.process_input = Some(crop.clone());
        self.crop = Some(crop);
        self.display = DisplaySource::Crop;
        self.state = JobState::Ready;
        Ok(())
    }

    /// Move to `error` from any state except `processing` and `done`.
    pub(crate) fn fail(&mut self, reason: impl Into<String>) -> Result<(), String> {
        self.expect_state(
            &[
                JobState::Detecting,
                JobState::SelectionNeeded,
                JobState::Ready,
                JobState::Error,
            ],
            "fail",
        )?;
        self.state = JobState::Error;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    /// Enter `processing` and hand back the file to enhance.
    ///
    /// A job that failed before it had a process input (detection or crop
    /// failure) falls back to its source. A previous result is dropped.
    pub(crate) fn begin_processing(&mut self) -> Result<ImageFile, String> {
        self.expect_state(&[JobState::Ready, JobState::Error, JobState::Done], "enhance")?;
        let input = self
            .process_input
            .get_or_insert_with(|| self.source.clone())
            .clone();
        self.state = JobState::Processing;
        self.failure_reason = None;
        self.result = None;
        Ok(input)
    }

    pub(crate) fn finish_processing(&mut self, result: ImageFile) -> Result<(), String> {
        self.expect_state(&[JobState::Processing], "finish")?;
        self.result = Some(result);
        self.state = JobState::Done;
        Ok(())
    }

    pub(crate) fn fail_processing(&mut self, reason: impl Into<String>) -> Result<(), String> {
        self.expect_state(&[JobState::Processing], "fail")?;
        self.state = JobState::Error;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    /// Swap in a refined result. State stays `done`.
    pub(crate) fn replace_result(&mut self, result: ImageFile) -> Result<(), String> {
        self.expect_state(&[JobState::Done], "refine")?;
        self.result = Some(result);
        Ok(())
    }
}

/// Serializable view of a job for reports and status output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub name: String,
    pub state: JobState,
    /// Number of detected faces
    pub faces: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_face: Option<usize>,
    pub display: DisplaySource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// File name of the enhanced result, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> ImageFile {
        ImageFile::new(name, "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0])
    }

    fn job() -> ImageJob {
        ImageJob::new(JobId::new(1), file("portrait.jpg"))
    }

    #[test]
    fn test_new_job_is_detecting() {
        let job = job();
        assert_eq!(job.state(), JobState::Detecting);
        assert!(job.process_input().is_none());
        assert_eq!(job.display_source(), DisplaySource::Original);
    }

    #[test]
    fn test_no_faces_uses_source() {
        let mut job = job();
        job.no_faces_found().unwrap();
        assert_eq!(job.state(), JobState::Ready);
        assert!(job.process_input().unwrap().same_bytes(job.source()));
        assert_eq!(job.selected_face(), None);
    }

    #[test]
    fn test_selection_then_crop() {
        let mut job = job();
        let faces = vec![
            FaceRegion::new(0.1, 0.1, 0.2, 0.2),
            FaceRegion::new(0.6, 0.1, 0.2, 0.2),
        ];
        job.faces_need_selection(faces).unwrap();
        assert_eq!(job.state(), JobState::SelectionNeeded);
        assert!(job.process_input().is_none());

        assert!(job.face_cropped(2, file("crop.jpg")).is_err());
        assert_eq!(job.state(), JobState::SelectionNeeded);

        job.face_cropped(1, file("crop.jpg")).unwrap();
        assert_eq!(job.state(), JobState::Ready);
        assert_eq!(job.selected_face(), Some(1));
        assert_eq!(job.display_source(), DisplaySource::Crop);
        assert_eq!(job.display_file().name(), "crop.jpg");
    }

    #[test]
    fn test_processing_round_trip() {
        let mut job = job();
        job.no_faces_found().unwrap();
        let input = job.begin_processing().unwrap();
        assert!(input.same_bytes(job.source()));
        assert_eq!(job.state(), JobState::Processing);

        job.finish_processing(file("out.png")).unwrap();
        assert_eq!(job.state(), JobState::Done);
        assert_eq!(job.result().unwrap().name(), "out.png");
        assert!(job.fail("late").is_err());
    }

    #[test]
    fn test_failure_cleared_on_retry() {
        let mut job = job();
        job.fail("Face detection failed.").unwrap();
        assert_eq!(job.failure_reason(), Some("Face detection failed."));

        let input = job.begin_processing().unwrap();
        assert!(input.same_bytes(job.source()));
        assert_eq!(job.failure_reason(), None);

        job.fail_processing("blocked").unwrap();
        assert_eq!(job.state(), JobState::Error);
        assert_eq!(job.failure_reason(), Some("blocked"));
    }

    #[test]
    fn test_failed_regeneration_drops_old_result() {
        let mut job = job();
        job.no_faces_found().unwrap();
        job.begin_processing().unwrap();
        job.finish_processing(file("first.png")).unwrap();

        job.begin_processing().unwrap();
        assert!(job.result().is_none());
        job.fail_processing("blocked").unwrap();
        assert_eq!(job.state(), JobState::Error);
        assert!(job.result().is_none());
        assert!(job.snapshot().result.is_none());
    }

    #[test]
    fn test_reference_job_is_ready_without_faces() {
        let job = ImageJob::reference(JobId::new(7), file("ref.jpg"));
        assert_eq!(job.state(), JobState::Ready);
        assert!(job.faces().is_empty());
        assert_eq!(job.display_source(), DisplaySource::Original);
        assert!(job.reference_image().same_bytes(job.source()));
    }

    #[test]
    fn test_cannot_enhance_pending_job() {
        let mut job = job();
        assert!(job.begin_processing().is_err());
        assert_eq!(job.state(), JobState::Detecting);
    }

    #[test]
    fn test_reference_image_preference() {
        let mut job = job();
        assert_eq!(job.reference_image().name(), "portrait.jpg");
        job.faces_need_selection(vec![
            FaceRegion::new(0.1, 0.1, 0.2, 0.2),
            FaceRegion::new(0.5, 0.1, 0.2, 0.2),
        ])
        .unwrap();
        job.face_cropped(0, file("crop.jpg")).unwrap();
        assert_eq!(job.reference_image().name(), "crop.jpg");
        job.begin_processing().unwrap();
        job.finish_processing(file("out.png")).unwrap();
        assert_eq!(job.reference_image().name(), "out.png");
    }

    #[test]
    fn test_replace_result_only_when_done() {
        let mut job = job();
        assert!(job.replace_result(file("x.png")).is_err());

        let mut done = ImageJob::finished(JobId::new(2), file("final.png"));
        done.replace_result(file("refined.png")).unwrap();
        assert_eq!(done.state(), JobState::Done);
        assert_eq!(done.result().unwrap().name(), "refined.png");
    }

    #[test]
    fn test_snapshot_serializes_state() {
        let mut job = job();
        job.fail("Face detection failed.").unwrap();
        let json = serde_json::to_value(job.snapshot()).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["state"], "error");
        assert_eq!(json["failure_reason"], "Face detection failed.");
        assert!(json.get("result").is_none());
    }
}
