//! Gemini backend using the `generateContent` REST API.
//!
//! One client serves all three adapter roles: the vision model locates faces
//! with a JSON response schema, and the image model enhances and refines with
//! `responseModalities: ["IMAGE"]`.

use super::prompt;
use super::provider::{Enhancer, FaceLocator, ImageInput, RefineRequest, Refiner};
use crate::config::GeminiConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::style::StyleConfig;
use crate::types::{extension_for_mime, FaceRegion, ImageFile};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Instant;

/// Candidate finish reasons that mean the model refused on policy grounds.
const BLOCKING_FINISH_REASONS: [&str; 5] = [
    "SAFETY",
    "PROHIBITED_CONTENT",
    "IMAGE_SAFETY",
    "BLOCKLIST",
    "SPII",
];

pub struct GeminiBackend {
    endpoint: String,
    api_key: String,
    image_model: String,
    vision_model: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(config: &GeminiConfig, api_key: &str) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            image_model: config.image_model.clone(),
            vision_model: config.vision_model.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, model)
    }

    /// POST a payload and parse the response body.
    ///
    /// Send failures and non-2xx statuses become `EnhancementTransport`.
    async fn generate(&self, model: &str, payload: &Value) -> PipelineResult<GenerateResponse> {
        let start = Instant::now();

        let resp = self
            .client
            .post(self.url(model))
            .header("x-goog-api-key", &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| PipelineError::EnhancementTransport {
                message: format!("Gemini request failed: {e}"),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let detail = summarize_error_body(&body);
            tracing::warn!("Gemini API error: status={}, body={}", status, detail);
            return Err(PipelineError::EnhancementTransport {
                message: format!("Gemini HTTP {status}: {detail}"),
                status_code: Some(status.as_u16()),
            });
        }

        let parsed: GenerateResponse =
            resp.json()
                .await
                .map_err(|e| PipelineError::EnhancementTransport {
                    message: format!("Failed to parse Gemini response: {e}"),
                    status_code: None,
                })?;

        tracing::debug!(
            target: "noir::gemini",
            model = model,
            candidates = parsed.candidates.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Gemini call finished"
        );
        Ok(parsed)
    }

    async fn generate_image(
        &self,
        images: &[&ImageFile],
        text: String,
        output_stem: &str,
    ) -> PipelineResult<ImageFile> {
        let mut parts: Vec<Value> = images.iter().map(|file| inline_part(file)).collect();
        parts.push(json!({ "text": text }));

        let payload = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": { "responseModalities": ["IMAGE"] },
        });

        let response = self.generate(&self.image_model, &payload).await?;
        let (mime_type, bytes) = extract_image(response)?;
        let name = format!("{}.{}", output_stem, extension_for_mime(&mime_type));
        Ok(ImageFile::new(name, mime_type, bytes))
    }
}

fn inline_part(file: &ImageFile) -> Value {
    let input = ImageInput::from_file(file);
    json!({ "inlineData": { "mimeType": input.media_type, "data": input.data } })
}

// --- Response types ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FaceBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl GenerateResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|content| content.parts.iter())
    }

    fn text(&self) -> String {
        self.parts()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Pull the first image out of a response, classifying why there is none.
fn extract_image(response: GenerateResponse) -> PipelineResult<(String, Vec<u8>)> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.clone())
    {
        return Err(PipelineError::EnhancementBlocked { reason });
    }

    let image = response
        .parts()
        .filter_map(|p| p.inline_data.as_ref())
        .find(|data| data.mime_type.starts_with("image/"));

    if let Some(data) = image {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&data.data)
            .map_err(|e| PipelineError::EnhancementTransport {
                message: format!("Invalid image data in Gemini response: {e}"),
                status_code: None,
            })?;
        return Ok((data.mime_type.clone(), bytes));
    }

    let blocked = response
        .candidates
        .iter()
        .filter_map(|c| c.finish_reason.as_deref())
        .find(|reason| BLOCKING_FINISH_REASONS.contains(reason));
    match blocked {
        Some(reason) => Err(PipelineError::EnhancementBlocked {
            reason: reason.to_string(),
        }),
        None => Err(PipelineError::EnhancementEmpty),
    }
}

/// Parse the face list from a JSON-mode response.
fn parse_faces(response: &GenerateResponse) -> Result<Vec<FaceRegion>, String> {
    let text = response.text();
    let body = strip_code_fence(&text);
    if body.is_empty() {
        return Err("empty response".to_string());
    }
    let boxes: Vec<FaceBox> =
        serde_json::from_str(body).map_err(|e| format!("malformed face list: {e}"))?;

    boxes
        .into_iter()
        .enumerate()
        .map(|(i, b)| {
            let region = FaceRegion::new(b.x, b.y, b.width, b.height);
            region
                .validate()
                .map(|()| region)
                .map_err(|e| format!("face {i}: {e}"))
        })
        .collect()
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(message) = value.pointer("/error/message").and_then(|v| v.as_str()) {
            return message.to_string();
        }
    }
    trimmed.chars().take(500).collect()
}

#[async_trait]
impl FaceLocator for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn locate_faces(&self, image: &ImageFile) -> PipelineResult<Vec<FaceRegion>> {
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [inline_part(image), { "text": prompt::FACE_DETECTION_PROMPT }],
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "x": { "type": "NUMBER" },
                            "y": { "type": "NUMBER" },
                            "width": { "type": "NUMBER" },
                            "height": { "type": "NUMBER" },
                        },
                        "required": ["x", "y", "width", "height"],
                    },
                },
            },
        });

        let response = self
            .generate(&self.vision_model, &payload)
            .await
            .map_err(|e| PipelineError::DetectionFailed {
                message: e.to_string(),
            })?;
        let faces =
            parse_faces(&response).map_err(|message| PipelineError::DetectionFailed { message })?;
        tracing::debug!("Gemini located {} face(s) in {}", faces.len(), image.name());
        Ok(faces)
    }
}

#[async_trait]
impl Enhancer for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn enhance(&self, image: &ImageFile, style: &StyleConfig) -> PipelineResult<ImageFile> {
        let text = prompt::enhancement_prompt(style);
        self.generate_image(&[image], text, &format!("{}-noir", image.stem()))
            .await
    }
}

#[async_trait]
impl Refiner for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn refine(&self, request: &RefineRequest) -> PipelineResult<ImageFile> {
        let text = prompt::refinement_prompt(
            &request.instruction,
            request.references.len(),
            request.options.think_harder,
        );
        let mut images = Vec::with_capacity(1 + request.references.len());
        images.push(&request.target);
        images.extend(request.references.iter());
        self.generate_image(&images, text, request.target.stem())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(value: Value) -> GenerateResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_extract_image_first_image_part() {
        let resp = response(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "here you go" },
                    { "inlineData": { "mimeType": "image/png", "data": "AQID" } },
                    { "inlineData": { "mimeType": "image/jpeg", "data": "BAUG" } }
                ]},
                "finishReason": "STOP"
            }]
        }));
        let (mime, bytes) = extract_image(resp).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[test]
    fn test_extract_image_prompt_block() {
        let resp = response(json!({ "promptFeedback": { "blockReason": "PROHIBITED_CONTENT" } }));
        match extract_image(resp).unwrap_err() {
            PipelineError::EnhancementBlocked { reason } => assert_eq!(reason, "PROHIBITED_CONTENT"),
            other => panic!("Expected EnhancementBlocked, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_image_finish_reason_block() {
        let resp = response(json!({
            "candidates": [{ "content": { "parts": [] }, "finishReason": "IMAGE_SAFETY" }]
        }));
        assert!(matches!(
            extract_image(resp).unwrap_err(),
            PipelineError::EnhancementBlocked { .. }
        ));
    }

    #[test]
    fn test_extract_image_text_only_is_empty() {
        let resp = response(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "I cannot draw that" }] },
                "finishReason": "STOP"
            }]
        }));
        assert!(matches!(
            extract_image(resp).unwrap_err(),
            PipelineError::EnhancementEmpty
        ));
        assert!(matches!(
            extract_image(GenerateResponse::default()).unwrap_err(),
            PipelineError::EnhancementEmpty
        ));
    }

    #[test]
    fn test_parse_faces_json_and_fenced() {
        let plain = response(json!({
            "candidates": [{ "content": { "parts": [{ "text":
                "[{\"x\":0.1,\"y\":0.2,\"width\":0.3,\"height\":0.4}]" }] } }]
        }));
        let faces = parse_faces(&plain).unwrap();
        assert_eq!(faces, vec![FaceRegion::new(0.1, 0.2, 0.3, 0.4)]);

        let fenced = response(json!({
            "candidates": [{ "content": { "parts": [{ "text": "```json\n[]\n```" }] } }]
        }));
        assert!(parse_faces(&fenced).unwrap().is_empty());
    }

    #[test]
    fn test_parse_faces_rejects_malformed() {
        let garbage = response(json!({
            "candidates": [{ "content": { "parts": [{ "text": "two faces!" }] } }]
        }));
        assert!(parse_faces(&garbage).is_err());

        let out_of_range = response(json!({
            "candidates": [{ "content": { "parts": [{ "text":
                "[{\"x\":0.9,\"y\":0.2,\"width\":0.5,\"height\":0.4}]" }] } }]
        }));
        assert!(parse_faces(&out_of_range).unwrap_err().contains("face 0"));

        assert!(parse_faces(&GenerateResponse::default()).is_err());
    }

    #[test]
    fn test_summarize_error_body() {
        let body = r#"{"error":{"code":429,"message":"Resource exhausted"}}"#;
        assert_eq!(summarize_error_body(body), "Resource exhausted");
        assert_eq!(summarize_error_body("   "), "empty response body");
        assert_eq!(summarize_error_body("bad gateway"), "bad gateway");
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let config = GeminiConfig {
            endpoint: "http://localhost:9000/v1beta/".to_string(),
            ..GeminiConfig::default()
        };
        let backend = GeminiBackend::new(&config, "k");
        assert_eq!(
            backend.url("m"),
            "http://localhost:9000/v1beta/models/m:generateContent"
        );
    }
}
