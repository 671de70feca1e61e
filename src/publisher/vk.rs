use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{PublishError, PublishedVideo, UploadRequest, VideoPublisher};
use crate::config::PublisherConfig;

/// VK description limit
const MAX_DESCRIPTION_CHARS: usize = 5000;

/// Uploads videos through the VK API: `video.save` reserves a slot and
/// returns an upload URL, then the file is posted to that URL.
pub struct VkPublisher {
    config: PublisherConfig,
    access_token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SaveResponse {
    upload_url: String,
    video_id: i64,
    owner_id: i64,
}

impl VkPublisher {
    pub fn new(config: PublisherConfig) -> Result<Self, PublishError> {
        let access_token = config
            .access_token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| PublishError::NotConfigured("VK access token is missing".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            access_token,
            client,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), method)
    }

    async fn save(&self, request: &UploadRequest) -> Result<SaveResponse, PublishError> {
        let mut form = vec![
            ("access_token", self.access_token.clone()),
            ("v", self.config.api_version.clone()),
            ("name", request.title.clone()),
            ("description", truncate_description(&request.description)),
            ("wallpost", if self.config.wallpost { "1" } else { "0" }.to_string()),
        ];
        if let Some(group_id) = self.config.group_id {
            form.push(("group_id", group_id.to_string()));
        }

        let response = self
            .client
            .post(self.method_url("video.save"))
            .form(&form)
            .send()
            .await?;

        let body = read_json(response).await?;
        let saved = vk_response(body)?;
        serde_json::from_value(saved)
            .map_err(|e| PublishError::InvalidResponse(format!("video.save: {}", e)))
    }

    async fn upload(&self, upload_url: &str, path: &Path) -> Result<(), PublishError> {
        let upload_url = Url::parse(upload_url)
            .map_err(|e| PublishError::InvalidResponse(format!("upload URL {}: {}", upload_url, e)))?;

        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());
        debug!("📦 Uploading {} bytes to {}", data.len(), upload_url.host_str().unwrap_or("?"));

        let part = Part::bytes(data).file_name(file_name).mime_str(mime_type(path))?;
        let form = Form::new().part("video_file", part);

        let response = self.client.post(upload_url).multipart(form).send().await?;
        let body = read_json(response).await?;
        upload_response(&body)
    }
}

#[async_trait]
impl VideoPublisher for VkPublisher {
    async fn publish(&self, request: &UploadRequest) -> Result<PublishedVideo, PublishError> {
        if !request.file_path.is_file() {
            return Err(PublishError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("video file not found: {}", request.file_path.display()),
            )));
        }

        info!("🎬 Publishing {} as \"{}\"", request.file_path.display(), request.title);
        let saved = self.save(request).await?;
        self.upload(&saved.upload_url, &request.file_path).await?;

        Ok(PublishedVideo {
            owner_id: saved.owner_id,
            video_id: saved.video_id,
            url: video_url(saved.owner_id, saved.video_id),
            post_url: None,
        })
    }
}

/// Public page of an uploaded video
pub fn video_url(owner_id: i64, video_id: i64) -> String {
    format!("https://vk.com/video{}_{}", owner_id, video_id)
}

async fn read_json(response: reqwest::Response) -> Result<Value, PublishError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PublishError::Status {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json()
        .await
        .map_err(|e| PublishError::InvalidResponse(e.to_string()))
}

/// Unwrap a VK method envelope: `{"response": ...}` or `{"error": {...}}`
fn vk_response(mut body: Value) -> Result<Value, PublishError> {
    if let Some(error) = body.get("error") {
        return Err(PublishError::Api {
            code: error.get("error_code").and_then(Value::as_i64).unwrap_or(0),
            message: error
                .get("error_msg")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    body.get_mut("response")
        .map(Value::take)
        .ok_or_else(|| PublishError::InvalidResponse("missing \"response\" field".to_string()))
}

/// The upload server answers with the stored size and hash, or an error string
fn upload_response(body: &Value) -> Result<(), PublishError> {
    if let Some(error) = body.get("error") {
        let message = match error {
            Value::String(message) => message.clone(),
            other => other.to_string(),
        };
        return Err(PublishError::Api { code: 0, message });
    }
    if body.get("video_hash").is_none() && body.get("size").is_none() {
        return Err(PublishError::InvalidResponse(format!("unexpected upload reply: {}", body)));
    }
    Ok(())
}

fn mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("webm") => "video/webm",
        _ => "video/mp4",
    }
}

fn truncate_description(description: &str) -> String {
    description.chars().take(MAX_DESCRIPTION_CHARS).collect()
}
