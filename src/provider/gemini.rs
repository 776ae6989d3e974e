//! Gemini REST client.

use super::{GenerativeProvider, Part, ProcessingState, UploadedMedia};
use crate::config::GeminiSettings;
use crate::error::{RelayError, Result};
use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, Response};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Client for the Gemini `generateContent` and Files APIs.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn from_settings(settings: &GeminiSettings) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = settings.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http: builder.build()?,
            api_key: settings.api_key.clone().unwrap_or_default(),
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl GenerativeProvider for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn supports_remote_media(&self) -> bool {
        true
    }

    #[instrument(skip(self, parts), fields(model = %self.model, parts = parts.len()))]
    async fn generate(&self, parts: Vec<Part>) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: parts.into_iter().map(WirePart::from).collect(),
            }],
        };

        let response = self
            .http
            .post(self.url(&format!("v1beta/models/{}:generateContent", self.model)))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;
        let parsed: GenerateResponse = check(response).await?.json().await?;

        let text = parsed.text();
        if text.is_none() {
            if let Some(reason) = parsed
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.as_deref())
            {
                return Err(RelayError::Provider(format!("Response blocked: {}", reason)));
            }
        }

        let text = text.unwrap_or_default();
        debug!("Generated {} characters", text.chars().count());
        Ok(text)
    }

    #[instrument(skip(self, path), fields(mime_type = %mime_type))]
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<UploadedMedia> {
        let bytes = tokio::fs::read(path).await?;
        let size = bytes.len();

        let start = self
            .http
            .post(self.url("upload/v1beta/files"))
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&serde_json::json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let start = check(start).await?;
        let upload_url = upload_url(start.headers())?;

        let finished = self
            .http
            .post(upload_url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header("X-Goog-Upload-Offset", "0")
            .header(reqwest::header::CONTENT_LENGTH, size.to_string())
            .body(bytes)
            .send()
            .await?;
        let envelope: FileEnvelope = check(finished).await?.json().await?;

        let media = envelope.file.into_media();
        info!("Uploaded {} ({} bytes) as {}", display_name, size, media.name);
        Ok(media)
    }

    async fn get_file(&self, name: &str) -> Result<UploadedMedia> {
        let response = self
            .http
            .get(self.url(&format!("v1beta/{}", name)))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let file: FileResource = check(response).await?.json().await?;
        Ok(file.into_media())
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("v1beta/{}", name)))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

/// Pass 2xx responses through; turn anything else into a provider error.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    let message = if message.is_empty() {
        status.to_string()
    } else {
        message
    };
    Err(RelayError::Provider(format!("{} ({})", message, status.as_u16())))
}

fn upload_url(headers: &HeaderMap) -> Result<String> {
    headers
        .get(UPLOAD_URL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .ok_or_else(|| RelayError::Provider("Upload session URL missing from response".into()))
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FileData {
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    file_uri: String,
}

impl From<Part> for WirePart {
    fn from(part: Part) -> Self {
        match part {
            Part::Text(text) => WirePart {
                text: Some(text),
                file_data: None,
            },
            Part::FileData { uri, mime_type } => WirePart {
                text: None,
                file_data: Some(FileData {
                    mime_type,
                    file_uri: uri,
                }),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate, if it has any text parts.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let texts: Vec<&str> = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileEnvelope {
    file: FileResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    state: Option<String>,
}

impl FileResource {
    fn into_media(self) -> UploadedMedia {
        let state = match self.state.as_deref() {
            Some("ACTIVE") => ProcessingState::Active,
            Some("FAILED") => ProcessingState::Failed,
            _ => ProcessingState::Processing,
        };
        UploadedMedia {
            name: self.name,
            uri: self.uri,
            mime_type: self.mime_type,
            state,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}
