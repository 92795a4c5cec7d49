use crate::core::config::Config;
use crate::core::error::StoryError;
use crate::core::state::StoryText;
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Debug;
use std::time::Duration;
use url::Url;

/// Characters of story content used to describe the illustration.
pub const IMAGE_SNIPPET_CHARS: usize = 200;
pub const IMAGE_ASPECT_RATIO: &str = "16:9";

/// The three generation steps behind a story.
#[async_trait]
pub trait StoryGenerator: Send + Sync + Debug {
    async fn generate_story(
        &self,
        theme: &str,
        character: &str,
        setting: &str,
    ) -> Result<StoryText, StoryError>;

    /// Returns the illustration as a `data:` URI.
    async fn generate_image(&self, title: &str, content: &str) -> Result<String, StoryError>;

    /// Returns base64-encoded 16-bit PCM narration.
    async fn generate_audio(&self, content: &str) -> Result<String, StoryError>;
}

// --- Prompts ---

pub fn story_prompt(theme: &str, character: &str, setting: &str) -> String {
    format!(
        "Write a gentle, magical, and original bedtime story for a 5-year-old child.\n\
         Theme: {}\n\
         Main Character: {}\n\
         Setting: {}\n\n\
         The story should be about 300 words long, have a soothing tone, \
         and end with the character falling asleep happily.\n\
         Return the result in JSON format with 'title' and 'content' fields.",
        theme, character, setting
    )
}

pub fn image_prompt(title: &str, content: &str) -> String {
    let snippet: String = content.chars().take(IMAGE_SNIPPET_CHARS).collect();
    format!(
        "Whimsical, high-quality, storybook illustration for a children's book.\n\
         Style: Soft watercolor and dreamlike digital painting.\n\
         Subject: {}. Based on this snippet: {}.\n\
         Vibe: Soothing, magical, pastel colors, gentle lighting. No text.",
        title, snippet
    )
}

pub fn audio_prompt(content: &str) -> String {
    format!(
        "Read this bedtime story in a very calm, slow, and soothing way: {}",
        content
    )
}

// --- Wire types ---

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<Value>,
}

#[derive(Serialize, Debug)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug)]
struct GeminiPart {
    text: String,
}

impl GeminiRequest {
    fn new(prompt: String, generation_config: Value) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: Some(generation_config),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<GeminiError>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

impl GeminiResponse {
    fn first_parts(&self) -> &[GeminiPartResponse] {
        self.candidates
            .as_deref()
            .and_then(<[GeminiCandidate]>::first)
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Why the first candidate came back empty, for error messages.
    fn empty_reason(&self) -> String {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return format!("prompt blocked ({})", reason);
        }
        let finish = self
            .candidates
            .as_deref()
            .and_then(<[GeminiCandidate]>::first)
            .and_then(|c| c.finish_reason.as_deref())
            .unwrap_or("UNKNOWN");
        format!("finish reason: {}", finish)
    }

    fn first_inline_data(&self) -> Option<&InlineData> {
        self.first_parts().iter().find_map(|p| p.inline_data.as_ref())
    }
}

// --- Response extraction ---

pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json").trim_end_matches("```").trim().to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```").trim_end_matches("```").trim().to_string()
    } else {
        s.to_string()
    }
}

fn extract_story(response: &GeminiResponse) -> Result<StoryText, StoryError> {
    let text: String = response
        .first_parts()
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.trim().is_empty() {
        return Err(StoryError::MalformedResponse(format!(
            "no story text returned, {}",
            response.empty_reason()
        )));
    }

    let clean = strip_code_blocks(&text);
    serde_json::from_str::<StoryText>(&clean)
        .map_err(|e| StoryError::MalformedResponse(format!("{}. Body: {}", e, clean)))
}

fn extract_image_url(response: &GeminiResponse) -> Result<String, StoryError> {
    match response.first_inline_data() {
        Some(inline) if !inline.data.is_empty() => {
            debug!(
                "Received illustration ({}, {} base64 chars)",
                inline.mime_type.as_deref().unwrap_or("unknown type"),
                inline.data.len()
            );
            Ok(format!("data:image/png;base64,{}", inline.data))
        }
        _ => {
            warn!("Image response had no inline image, {}", response.empty_reason());
            Err(StoryError::NoImageReturned)
        }
    }
}

fn extract_audio(response: &GeminiResponse) -> Result<String, StoryError> {
    match response.first_inline_data() {
        Some(inline) if !inline.data.is_empty() => {
            debug!(
                "Received narration ({}, {} base64 chars)",
                inline.mime_type.as_deref().unwrap_or("unknown type"),
                inline.data.len()
            );
            Ok(inline.data.clone())
        }
        _ => {
            warn!("Speech response had no inline audio, {}", response.empty_reason());
            Err(StoryError::NoAudioReturned)
        }
    }
}

// --- Generation configs ---

fn story_generation_config() -> Value {
    json!({
        "responseMimeType": "application/json",
        "responseSchema": {
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING" },
                "content": { "type": "STRING" }
            },
            "required": ["title", "content"]
        }
    })
}

fn image_generation_config() -> Value {
    json!({
        "imageConfig": { "aspectRatio": IMAGE_ASPECT_RATIO }
    })
}

fn audio_generation_config(voice: &str) -> Value {
    json!({
        "responseModalities": ["AUDIO"],
        "speechConfig": {
            "voiceConfig": {
                "prebuiltVoiceConfig": { "voiceName": voice }
            }
        }
    })
}

// --- Client ---

#[derive(Debug, Clone)]
pub struct GeminiModels {
    pub story: String,
    pub image: String,
    pub audio: String,
}

pub struct GeminiClient {
    api_key: String,
    base_url: Url,
    models: GeminiModels,
    voice: String,
    client: reqwest::Client,
}

// The key stays out of logs.
impl Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url.as_str())
            .field("models", &self.models)
            .field("voice", &self.voice)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(
        api_key: &str,
        base_url: &str,
        models: GeminiModels,
        voice: &str,
        timeout: Duration,
    ) -> Result<Self, StoryError> {
        // A trailing slash keeps the version segment when joining model paths.
        let base = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&base)
            .map_err(|e| StoryError::Provider(format!("invalid base URL {}: {}", base_url, e)))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key: api_key.to_string(),
            base_url,
            models,
            voice: voice.to_string(),
            client,
        })
    }

    pub fn from_config(config: &Config, api_key: &str) -> Result<Self, StoryError> {
        Self::new(
            api_key,
            &config.base_url,
            GeminiModels {
                story: config.models.story.clone(),
                image: config.models.image.clone(),
                audio: config.models.audio.clone(),
            },
            &config.voice,
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    fn endpoint(&self, model: &str) -> Result<Url, StoryError> {
        self.base_url
            .join(&format!("models/{}:generateContent", model))
            .map_err(|e| StoryError::Provider(format!("invalid model name {}: {}", model, e)))
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GeminiRequest,
    ) -> Result<GeminiResponse, StoryError> {
        let url = self.endpoint(model)?;
        debug!("POST {}", url);

        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        debug!("{} responded {} ({} bytes)", model, status, body.len());

        parse_response(status, &body)
    }
}

fn parse_response(status: reqwest::StatusCode, body: &str) -> Result<GeminiResponse, StoryError> {
    let parsed = serde_json::from_str::<GeminiResponse>(body);

    if !status.is_success() {
        let message = parsed
            .ok()
            .and_then(|r| r.error)
            .map(|e| e.message)
            .unwrap_or_else(|| body.trim().to_string());
        return Err(StoryError::Provider(format!("HTTP {}: {}", status, message)));
    }

    let response = parsed.map_err(|e| {
        StoryError::Provider(format!("Failed to parse Gemini response: {}. Body: {}", e, body))
    })?;

    if let Some(err) = &response.error {
        return Err(StoryError::Provider(err.message.clone()));
    }
    Ok(response)
}

#[async_trait]
impl StoryGenerator for GeminiClient {
    async fn generate_story(
        &self,
        theme: &str,
        character: &str,
        setting: &str,
    ) -> Result<StoryText, StoryError> {
        let request = GeminiRequest::new(
            story_prompt(theme, character, setting),
            story_generation_config(),
        );
        let response = self.generate_content(&self.models.story, &request).await?;
        extract_story(&response)
    }

    async fn generate_image(&self, title: &str, content: &str) -> Result<String, StoryError> {
        let request = GeminiRequest::new(image_prompt(title, content), image_generation_config());
        let response = self.generate_content(&self.models.image, &request).await?;
        extract_image_url(&response)
    }

    async fn generate_audio(&self, content: &str) -> Result<String, StoryError> {
        let request =
            GeminiRequest::new(audio_prompt(content), audio_generation_config(&self.voice));
        let response = self.generate_content(&self.models.audio, &request).await?;
        extract_audio(&response)
    }
}
