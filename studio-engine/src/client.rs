//! Client for the image-editor service.
//!
//! [`StudioApi`] is the seam the orchestrator and the publication controller
//! talk to; [`StudioApiClient`] implements it over HTTP. Only generation
//! requests are retried.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use studio_core::GenerationMeta;
use studio_renderer::ExportedFile;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::config::{RetryConfig, StudioConfig};

/// Errors that can occur when talking to the image-editor service.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The base URL provided by configuration is invalid.
    #[error("invalid service URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed (connection, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// JSON parsing failed unexpectedly.
    #[error("failed to parse service payload: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    /// Returns true for transient failures: transport errors, 5xx and 429.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidUrl(_) | Self::Json(_) => false,
        }
    }

    /// Whether the service rejected the content with its safety filter.
    #[must_use]
    pub fn is_moderated(&self) -> bool {
        matches!(self, Self::Status { body, .. } if mentions_moderation(body))
    }
}

pub(crate) fn mentions_moderation(text: &str) -> bool {
    let text = text.to_lowercase();
    text.contains("moderat") || text.contains("safety")
}

/// Status of a generation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    /// Queued.
    Pending,
    /// Running.
    Processing,
    /// Finished with an image.
    Completed,
    /// Finished without an image.
    Failed,
    /// Rejected by the content safety filter.
    Moderated,
    /// Any status this client does not know.
    #[serde(other)]
    Unknown,
}

/// Generation record returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    /// Server-assigned task ID.
    pub id: String,
    /// Outcome of the generation.
    pub generation_status: GenerationStatus,
    /// Result image.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Prompt as rewritten by the service.
    #[serde(default)]
    pub enhanced_prompt: Option<String>,
    /// Seed used.
    #[serde(default)]
    pub seed: Option<i64>,
    /// User comments.
    #[serde(default)]
    pub comments: Option<String>,
    /// User feedback.
    #[serde(default)]
    pub feedback: Option<String>,
    /// Failure detail.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl GenerationRecord {
    /// Whether the generation finished with an image.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.generation_status == GenerationStatus::Completed
    }

    /// Whether the content safety filter stopped the generation.
    #[must_use]
    pub fn is_moderated(&self) -> bool {
        self.generation_status == GenerationStatus::Moderated
            || self.error_message.as_deref().is_some_and(mentions_moderation)
    }

    /// Layer metadata carried by this record.
    #[must_use]
    pub fn meta(&self) -> GenerationMeta {
        GenerationMeta {
            task_id: self.id.clone(),
            enhanced_prompt: self.enhanced_prompt.clone(),
            seed: self.seed,
            comments: self.comments.clone(),
            feedback: self.feedback.clone(),
        }
    }
}

/// Kind of edit task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    /// Edit a single image.
    #[default]
    Edit,
    /// Apply a reference image's settings to another image.
    CopyEdit,
}

impl TaskKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Edit => "EDIT",
            Self::CopyEdit => "COPY_EDIT",
        }
    }
}

/// A prepared edit submission.
#[derive(Debug, Clone)]
pub struct EditImageRequest {
    /// The exported image.
    pub image: ExportedFile,
    /// Task kind.
    pub task_kind: TaskKind,
    /// Prompt text.
    pub prompt: String,
    /// Seed, for reproducible batches.
    pub seed: Option<i64>,
    /// Quality tags.
    pub quality_tags: Vec<String>,
    /// Background mode.
    pub background: Option<String>,
    /// Position mode.
    pub position: Option<String>,
    /// Catalog product.
    pub product_id: Option<String>,
    /// Catalog variant.
    pub variant_id: Option<String>,
    /// Task this edit derives from.
    pub parent_task_id: Option<String>,
}

impl EditImageRequest {
    fn to_form(&self) -> Result<Form, ApiError> {
        let image = Part::bytes(self.image.bytes.clone())
            .file_name(self.image.name.clone())
            .mime_str(&self.image.mime)?;
        let output_format = self
            .image
            .mime
            .strip_prefix("image/")
            .unwrap_or(&self.image.mime)
            .to_string();

        let mut form = Form::new()
            .part("image", image)
            .text("taskKind", self.task_kind.as_str())
            .text("prompt", self.prompt.clone())
            .text("outputFormat", output_format);
        if !self.quality_tags.is_empty() {
            form = form.text("qualityTags", self.quality_tags.join(","));
        }
        let optional = [
            ("seed", self.seed.map(|s| s.to_string())),
            ("background", self.background.clone()),
            ("position", self.position.clone()),
            ("productId", self.product_id.clone()),
            ("variantId", self.variant_id.clone()),
            ("parentTaskId", self.parent_task_id.clone()),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                form = form.text(name, value);
            }
        }
        Ok(form)
    }
}

/// Body of an add-media call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMediaRequest {
    /// Generated image to attach.
    pub image_url: String,
    /// Generation task the image came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Catalog variant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    /// Requested position in the media list.
    pub order: u32,
}

/// A product media entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    /// Media ID.
    pub id: String,
    /// Final URL of the media.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Final position.
    #[serde(default)]
    pub order: Option<u32>,
}

/// Body of a feedback update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackUpdate {
    /// User feedback.
    pub feedback: Option<String>,
    /// User comments.
    pub comments: Option<String>,
}

#[derive(Serialize)]
struct BulkDelete<'a> {
    ids: &'a [String],
}

/// Operations consumed from the image-editor service.
#[async_trait]
pub trait StudioApi: Send + Sync {
    /// Submit an image for generation.
    async fn edit_image(&self, request: EditImageRequest) -> Result<GenerationRecord, ApiError>;

    /// Attach an image to a product's media list.
    async fn add_media(
        &self,
        product_id: &str,
        request: &AddMediaRequest,
    ) -> Result<MediaRecord, ApiError>;

    /// Delete generated images by task ID.
    async fn delete_generated(&self, ids: &[String]) -> Result<(), ApiError>;

    /// Update the feedback fields of a generation.
    async fn update_feedback(
        &self,
        id: &str,
        update: &FeedbackUpdate,
    ) -> Result<GenerationRecord, ApiError>;

    /// Download an image.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError>;
}

/// HTTP implementation of [`StudioApi`].
#[derive(Clone)]
pub struct StudioApiClient {
    inner: Arc<InnerClient>,
}

struct InnerClient {
    http: Client,
    base: Url,
    token: Option<String>,
    retry_config: RetryConfig,
}

impl std::fmt::Debug for StudioApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudioApiClient")
            .field("base", &self.inner.base.as_str())
            .field("retry_config", &self.inner.retry_config)
            .finish_non_exhaustive()
    }
}

impl StudioApiClient {
    /// Create a client from the engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if the URL is malformed, or
    /// [`ApiError::Http`] if the HTTP client fails to build.
    pub fn new(config: &StudioConfig) -> Result<Self, ApiError> {
        let mut base =
            Url::parse(&config.api_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.api_url.clone()));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder()
            .user_agent(format!("catalog-studio/{}", studio_core::VERSION))
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(InnerClient {
                http,
                base,
                token: config.api_token.clone(),
                retry_config: config.retry.clone(),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.inner
            .base
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.inner.http.request(method, url);
        match &self.inner.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let config = &self.inner.retry_config;
        let max_attempts = config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = config.delay_for_attempt(attempt);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {}ms: {}",
                        operation,
                        attempt + 1,
                        max_attempts,
                        delay.as_millis(),
                        error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = check_status(response).await?.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl StudioApi for StudioApiClient {
    async fn edit_image(&self, request: EditImageRequest) -> Result<GenerationRecord, ApiError> {
        let url = &self.endpoint("image-editor/edit-image")?;
        let request = &request;
        self.with_retry("edit-image", || async move {
            let form = request.to_form()?;
            let response = self
                .request(Method::POST, url.clone())
                .multipart(form)
                .send()
                .await?;
            parse_json(response).await
        })
        .await
    }

    async fn add_media(
        &self,
        product_id: &str,
        request: &AddMediaRequest,
    ) -> Result<MediaRecord, ApiError> {
        let mut url = self.endpoint("products/")?;
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl("cannot-be-a-base URL".into()))?
            .pop_if_empty()
            .extend([product_id, "add-media"]);
        let response = self.request(Method::POST, url).json(request).send().await?;
        parse_json(response).await
    }

    async fn delete_generated(&self, ids: &[String]) -> Result<(), ApiError> {
        let url = self.endpoint("image-editor/generated")?;
        let response = self
            .request(Method::DELETE, url)
            .json(&BulkDelete { ids })
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn update_feedback(
        &self,
        id: &str,
        update: &FeedbackUpdate,
    ) -> Result<GenerationRecord, ApiError> {
        let mut url = self.endpoint("image-editor/generated/")?;
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl("cannot-be-a-base URL".into()))?
            .pop_if_empty()
            .push(id);
        let response = self.request(Method::PATCH, url).json(update).send().await?;
        parse_json(response).await
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let url = Url::parse(url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        let response = self.inner.http.get(url).send().await?;
        Ok(check_status(response).await?.bytes().await?.to_vec())
    }
}
